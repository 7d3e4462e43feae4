use crate::history::{ChatHistory, HistoryCollector};
use crate::llm_provider::{GenerationConfig, LLMProvider, MessageRole};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Summary of one streamed chat turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// The assistant message committed to history, if any fragment arrived
    pub reply: Option<String>,
    /// Fragments presented to the caller
    pub fragments: usize,
    /// Chunks dropped because they could not be decoded
    pub skipped: usize,
}

/// Conversation state for the interactive loop.
pub struct ChatSession {
    provider: Arc<dyn LLMProvider>,
    history: ChatHistory,
}

impl ChatSession {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            history: ChatHistory::new(),
        }
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    /// Run one chat turn: record the user message, stream the reply over a
    /// snapshot of the history and hand every fragment to `on_fragment` as
    /// it arrives. The collected reply is committed once the stream ends.
    pub async fn send<F>(&mut self, user_text: &str, mut on_fragment: F) -> TurnOutcome
    where
        F: FnMut(&str),
    {
        self.history.push(MessageRole::User, user_text);
        let snapshot = self.history.messages().to_vec();

        let mut collector = HistoryCollector::default();
        let mut skipped = 0;

        match self.provider.stream_chat(&snapshot).await {
            Ok(mut stream) => {
                while let Some(item) = stream.next().await {
                    match item {
                        Ok(fragment) => {
                            on_fragment(&fragment);
                            collector.collect(&fragment);
                        }
                        Err(e) => {
                            skipped += 1;
                            warn!("Skipping bad chunk: {}", e);
                        }
                    }
                }
            }
            Err(e) => {
                error!("Failed to start streaming: {}", e);
            }
        }

        let fragments = collector.fragment_count();
        let reply = collector.finalize(&mut self.history);
        debug!(fragments, skipped, committed = reply.is_some(), "Chat turn finished");

        TurnOutcome {
            reply,
            fragments,
            skipped,
        }
    }
}

/// One-shot, non-streaming completion of a rendered prompt.
/// Failures are logged and reported as `None`.
pub async fn complete_prompt(
    provider: &dyn LLMProvider,
    prompt: &str,
    config: &GenerationConfig,
) -> Option<String> {
    match provider.generate(prompt, config).await {
        Ok(response) => Some(response.content),
        Err(e) => {
            error!("Failed to get response: {}", e);
            None
        }
    }
}
