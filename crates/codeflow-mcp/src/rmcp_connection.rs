// ABOUTME: ToolServer implementation backed by an rmcp client session
// ABOUTME: Connects over streamable HTTP or a spawned stdio child process

use crate::client_handler::{AgentClientHandler, ProgressSlot};
use crate::connection::*;
use crate::{McpError, Result};
use async_trait::async_trait;
use codeflow_ai::LLMProvider;
use codeflow_core::McpConfig;
use parking_lot::Mutex;
use rmcp::model::{
    CallToolRequestParam, Content, GetPromptRequestParam, PromptMessage, PromptMessageContent,
    RawContent,
};
use rmcp::service::RunningService;
use rmcp::transport::{StreamableHttpClientTransport, TokioChildProcess};
use rmcp::{RoleClient, ServiceExt};
use serde_json::{Map, Value};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{info, warn};

fn decode_content(content: &Content) -> ContentItem {
    match &content.raw {
        RawContent::Text(text) => ContentItem::text(text.text.clone()),
        _ => ContentItem::non_text(),
    }
}

fn decode_prompt_message(message: &PromptMessage) -> PromptMessageText {
    let role = serde_json::to_value(&message.role)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    let text = match &message.content {
        PromptMessageContent::Text { text } => Some(text.clone()),
        _ => None,
    };
    PromptMessageText { role, text }
}

/// Clears the progress slot when the call finishes or is dropped
struct ProgressGuard<'a>(&'a ProgressSlot);

impl Drop for ProgressGuard<'_> {
    fn drop(&mut self) {
        *self.0.lock() = None;
    }
}

/// Live MCP session with the code-analysis server
pub struct RmcpConnection {
    service: RunningService<RoleClient, AgentClientHandler>,
    progress: ProgressSlot,
}

impl RmcpConnection {
    /// Open a session using the configured transport and log the server's tools.
    pub async fn connect(config: &McpConfig, llm: Arc<dyn LLMProvider>) -> Result<Self> {
        let progress: ProgressSlot = Arc::new(Mutex::new(None));
        let handler = AgentClientHandler::new(llm, progress.clone(), config.client_name.clone());

        let service = match config.transport.as_str() {
            "stdio" => {
                let program = config.command.as_deref().ok_or_else(|| {
                    McpError::Connection("stdio transport requires a command".to_string())
                })?;
                let mut cmd = Command::new(program);
                cmd.args(&config.args);

                let (transport, _stderr) = TokioChildProcess::builder(cmd)
                    .stderr(Stdio::null())
                    .spawn()
                    .map_err(|e| {
                        McpError::Connection(format!("failed to spawn '{}': {}", program, e))
                    })?;

                info!(command = program, "Connecting to MCP server over stdio");
                handler
                    .serve(transport)
                    .await
                    .map_err(|e| McpError::Connection(e.to_string()))?
            }
            _ => {
                info!(url = %config.server_url, "Connecting to MCP server over HTTP");
                let transport = StreamableHttpClientTransport::from_uri(config.server_url.clone());
                handler
                    .serve(transport)
                    .await
                    .map_err(|e| McpError::Connection(e.to_string()))?
            }
        };

        let connection = Self { service, progress };
        match connection.list_tools().await {
            Ok(tools) => {
                let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
                info!(count = names.len(), tools = ?names, "Connected to MCP server");
            }
            Err(e) => warn!("Connected, but listing tools failed: {}", e),
        }

        Ok(connection)
    }

    /// Close the session
    pub async fn close(self) {
        if let Err(e) = self.service.cancel().await {
            warn!("Error while closing MCP session: {}", e);
        }
    }
}

#[async_trait]
impl ToolServer for RmcpConnection {
    async fn ping(&self) -> Result<()> {
        self.service
            .list_tools(Default::default())
            .await
            .map(|_| ())
            .map_err(|e| McpError::Transport(e.to_string()))
    }

    async fn list_tools(&self) -> Result<Vec<ToolInfo>> {
        let tools = self
            .service
            .list_all_tools()
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;

        Ok(tools
            .into_iter()
            .map(|tool| ToolInfo {
                name: tool.name.to_string(),
                description: tool.description.map(|d| d.to_string()),
                input_schema: tool.input_schema.as_ref().clone(),
            })
            .collect())
    }

    async fn list_prompts(&self) -> Result<Vec<PromptInfo>> {
        let prompts = self
            .service
            .list_all_prompts()
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;

        Ok(prompts
            .into_iter()
            .map(|prompt| PromptInfo {
                name: prompt.name.to_string(),
                description: prompt.description.map(|d| d.to_string()),
                arguments: prompt
                    .arguments
                    .unwrap_or_default()
                    .into_iter()
                    .map(|arg| PromptArgumentInfo {
                        name: arg.name.to_string(),
                        description: arg.description.map(|d| d.to_string()),
                        required: arg.required.unwrap_or(false),
                    })
                    .collect(),
            })
            .collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        progress: Option<ProgressHandler>,
    ) -> Result<ToolCallReply> {
        *self.progress.lock() = progress;
        let _guard = ProgressGuard(&self.progress);

        let result = self
            .service
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: Some(arguments),
            })
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;

        Ok(ToolCallReply {
            content: result.content.iter().map(decode_content).collect(),
            is_error: result.is_error.unwrap_or(false),
        })
    }

    async fn get_prompt(&self, name: &str, arguments: Map<String, Value>) -> Result<PromptReply> {
        let result = self
            .service
            .get_prompt(GetPromptRequestParam {
                name: name.to_string(),
                arguments: (!arguments.is_empty()).then_some(arguments),
            })
            .await
            .map_err(|e| McpError::Transport(e.to_string()))?;

        Ok(PromptReply {
            description: result.description.map(|d| d.to_string()),
            messages: result.messages.iter().map(decode_prompt_message).collect(),
        })
    }
}
