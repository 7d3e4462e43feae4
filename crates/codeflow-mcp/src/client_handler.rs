// ABOUTME: rmcp client handler answering server-initiated sampling with the local LLM
// ABOUTME: Also forwards progress notifications to the handler of the in-flight tool call

use crate::connection::{ProgressHandler, ProgressUpdate};
use codeflow_ai::{complete_prompt, GenerationConfig, LLMProvider};
use parking_lot::Mutex;
use rmcp::model::{
    ClientInfo, Content, CreateMessageRequestParam, CreateMessageResult,
    ProgressNotificationParam, RawContent, Role, SamplingMessage,
};
use rmcp::service::{NotificationContext, RequestContext};
use rmcp::{ClientHandler, ErrorData, RoleClient};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

/// Reply text sent back to the server when the LLM cannot be reached
pub const SAMPLING_FAILURE_REPLY: &str = r#"{"error": "LLM call failed."}"#;

/// Slot holding the progress handler of the tool call currently in flight
pub type ProgressSlot = Arc<Mutex<Option<ProgressHandler>>>;

/// Flatten a sampling request into a single completion prompt.
pub fn build_sampling_prompt(system_prompt: Option<&str>, messages: &[(String, String)]) -> String {
    let mut prompt = String::new();

    if let Some(system) = system_prompt.filter(|s| !s.is_empty()) {
        prompt.push_str(system);
        prompt.push_str("\n\n");
    }

    for (role, text) in messages {
        prompt.push_str(&format!("{}: {}\n", role, text));
    }

    prompt.push_str("\nReturn your answer as a JSON object.");
    prompt
}

fn role_label(role: &Role) -> String {
    serde_json::to_value(role)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "user".to_string())
}

fn content_text(content: &Content) -> String {
    match &content.raw {
        RawContent::Text(text) => text.text.clone(),
        _ => String::new(),
    }
}

#[derive(Clone)]
pub struct AgentClientHandler {
    llm: Arc<dyn LLMProvider>,
    progress: ProgressSlot,
    client_name: String,
}

impl AgentClientHandler {
    pub fn new(llm: Arc<dyn LLMProvider>, progress: ProgressSlot, client_name: impl Into<String>) -> Self {
        Self {
            llm,
            progress,
            client_name: client_name.into(),
        }
    }

    /// Complete a sampling request; LLM failure yields the fixed error reply
    pub async fn sample(&self, system_prompt: Option<&str>, messages: &[(String, String)]) -> String {
        let prompt = build_sampling_prompt(system_prompt, messages);
        debug!(messages = messages.len(), "Answering sampling request");

        complete_prompt(
            self.llm.as_ref(),
            &prompt,
            &GenerationConfig::with_temperature(0.0),
        )
        .await
        .unwrap_or_else(|| SAMPLING_FAILURE_REPLY.to_string())
    }

    pub fn report_progress(&self, update: ProgressUpdate) {
        let handler = self.progress.lock().clone();
        match handler {
            Some(handler) => handler(update),
            None => debug!(progress = update.progress, "Progress notification with no active call"),
        }
    }
}

impl ClientHandler for AgentClientHandler {
    fn create_message(
        &self,
        params: CreateMessageRequestParam,
        _context: RequestContext<RoleClient>,
    ) -> impl Future<Output = Result<CreateMessageResult, ErrorData>> + Send + '_ {
        async move {
            let messages: Vec<(String, String)> = params
                .messages
                .iter()
                .map(|m| (role_label(&m.role), content_text(&m.content)))
                .collect();

            let text = self.sample(params.system_prompt.as_deref(), &messages).await;
            info!(chars = text.len(), "Sampling request answered");

            Ok(CreateMessageResult {
                model: self.llm.model_name().to_string(),
                stop_reason: Some("endTurn".to_string()),
                message: SamplingMessage {
                    role: Role::Assistant,
                    content: Content::text(text),
                },
            })
        }
    }

    fn on_progress(
        &self,
        params: ProgressNotificationParam,
        _context: NotificationContext<RoleClient>,
    ) -> impl Future<Output = ()> + Send + '_ {
        async move {
            self.report_progress(ProgressUpdate {
                progress: params.progress as f64,
                total: params.total.map(|t| t as f64),
                message: params.message,
            });
        }
    }

    fn get_info(&self) -> ClientInfo {
        let mut info = ClientInfo::default();
        info.capabilities.sampling = Some(Default::default());
        info.client_info.name = self.client_name.clone();
        info.client_info.version = env!("CARGO_PKG_VERSION").to_string();
        info
    }
}
