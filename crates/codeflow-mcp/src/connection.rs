// ABOUTME: Transport-neutral view of the remote tool/prompt server
// ABOUTME: Replies are decoded once into these types at the protocol boundary

use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// One element of a tool or prompt reply. Non-text content has no text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub text: Option<String>,
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    pub fn non_text() -> Self {
        Self { text: None }
    }
}

/// Raw reply of a tool call before the remote error flag is interpreted
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCallReply {
    pub content: Vec<ContentItem>,
    pub is_error: bool,
}

impl ToolCallReply {
    pub fn ok(content: Vec<ContentItem>) -> Self {
        Self {
            content,
            is_error: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolInfo {
    pub name: String,
    pub description: Option<String>,
    /// JSON schema of the tool input (`properties`, `required`)
    pub input_schema: Map<String, Value>,
}

impl ToolInfo {
    /// Declared argument names in schema order
    pub fn property_names(&self) -> Vec<String> {
        self.input_schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_required(&self, property: &str) -> bool {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .is_some_and(|req| req.iter().any(|r| r.as_str() == Some(property)))
    }

    pub fn property_description(&self, property: &str) -> Option<&str> {
        self.input_schema
            .get("properties")?
            .get(property)?
            .get("description")?
            .as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptArgumentInfo {
    pub name: String,
    pub description: Option<String>,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptInfo {
    pub name: String,
    pub description: Option<String>,
    pub arguments: Vec<PromptArgumentInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessageText {
    pub role: String,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptReply {
    pub description: Option<String>,
    pub messages: Vec<PromptMessageText>,
}

impl PromptReply {
    /// Message texts joined by blank lines; messages without text are skipped
    pub fn extract_text(&self) -> String {
        self.messages
            .iter()
            .filter_map(|m| m.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Progress notification for an in-flight tool call
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub progress: f64,
    pub total: Option<f64>,
    pub message: Option<String>,
}

pub type ProgressHandler = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Remote server exposing tools and prompts
#[async_trait]
pub trait ToolServer: Send + Sync {
    /// Lightweight liveness round trip
    async fn ping(&self) -> Result<()>;

    async fn list_tools(&self) -> Result<Vec<ToolInfo>>;

    async fn list_prompts(&self) -> Result<Vec<PromptInfo>>;

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        progress: Option<ProgressHandler>,
    ) -> Result<ToolCallReply>;

    async fn get_prompt(&self, name: &str, arguments: Map<String, Value>) -> Result<PromptReply>;
}
