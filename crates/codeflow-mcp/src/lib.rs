// ABOUTME: Remote tool/prompt access for the CodeFlow agent
// ABOUTME: Safe calls, reply normalization, tasks and workflows over an MCP session

pub mod client_handler;
pub mod connection;
pub mod debug_logger;
pub mod error;
pub mod normalizer;
pub mod rmcp_connection;
pub mod safe_call;
pub mod tasks;
pub mod workflows;

pub use client_handler::{build_sampling_prompt, AgentClientHandler, SAMPLING_FAILURE_REPLY};
pub use connection::*;
pub use debug_logger::DebugLogger;
pub use error::{McpError, Result, WorkflowError, WorkflowResult};
pub use rmcp_connection::RmcpConnection;
pub use tasks::{DocumentInfo, PromptPair, SourceContent, TaskRunner};
pub use workflows::{find_workflow, run_workflow, workflows, WorkflowDescriptor, WorkflowParams};
