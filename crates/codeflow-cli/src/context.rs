use codeflow_ai::{GenerationConfig, LLMProvider};
use codeflow_core::CodeFlowConfig;
use codeflow_mcp::{RmcpConnection, TaskRunner, ToolServer};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Shared handles for one agent run. The MCP session is opened on first use
/// and reused afterwards.
pub struct AppContext {
    pub config: CodeFlowConfig,
    pub llm: Arc<dyn LLMProvider>,
    server: OnceCell<Arc<dyn ToolServer>>,
}

impl AppContext {
    pub fn new(config: CodeFlowConfig, llm: Arc<dyn LLMProvider>) -> Self {
        Self {
            config,
            llm,
            server: OnceCell::new(),
        }
    }

    #[cfg(test)]
    pub fn with_server(config: CodeFlowConfig, llm: Arc<dyn LLMProvider>, server: Arc<dyn ToolServer>) -> Self {
        Self {
            config,
            llm,
            server: OnceCell::new_with(Some(server)),
        }
    }

    pub async fn server(&self) -> codeflow_mcp::Result<&Arc<dyn ToolServer>> {
        self.server
            .get_or_try_init(|| async {
                let connection = RmcpConnection::connect(&self.config.mcp, self.llm.clone()).await?;
                Ok(Arc::new(connection) as Arc<dyn ToolServer>)
            })
            .await
    }

    pub async fn tasks(&self) -> codeflow_mcp::Result<TaskRunner> {
        let server = self.server().await?;
        Ok(TaskRunner::new(server.clone()).with_timeout(self.tool_timeout()))
    }

    pub fn tool_timeout(&self) -> Option<Duration> {
        self.config.mcp.tool_timeout_secs.map(Duration::from_secs)
    }

    /// Settings for one-shot prompt runs
    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig::with_temperature(self.config.llm.temperature)
    }
}
