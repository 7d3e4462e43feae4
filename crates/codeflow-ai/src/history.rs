// ABOUTME: Append-only conversation history owned by the chat session
// ABOUTME: Streamed replies are buffered by a collector and committed as one message

use crate::llm_provider::{Message, MessageRole};

/// Ordered conversation transcript. Only grows; callers read snapshots.
#[derive(Debug, Clone, Default)]
pub struct ChatHistory {
    messages: Vec<Message>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, role: MessageRole, content: impl Into<String>) {
        self.messages.push(Message::new(role, content));
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Immutable view handed to the LLM for one turn
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Buffers streamed fragments for a single reply.
#[derive(Debug)]
pub struct HistoryCollector {
    role: MessageRole,
    buffer: Vec<String>,
}

impl Default for HistoryCollector {
    fn default() -> Self {
        Self::new(MessageRole::Assistant)
    }
}

impl HistoryCollector {
    pub fn new(role: MessageRole) -> Self {
        Self {
            role,
            buffer: Vec::new(),
        }
    }

    pub fn collect(&mut self, fragment: &str) {
        self.buffer.push(fragment.to_string());
    }

    pub fn fragment_count(&self) -> usize {
        self.buffer.len()
    }

    /// Joins the buffered fragments and appends them to `history` as a
    /// single message. Nothing is appended when no fragment arrived.
    pub fn finalize(self, history: &mut ChatHistory) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }

        let full_message = self.buffer.concat();
        history.push(self.role, full_message.clone());
        Some(full_message)
    }
}
