use thiserror::Error;

#[derive(Error, Debug)]
pub enum McpError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timeout: {0}")]
    RequestTimeout(String),

    #[error("Tool '{tool}' reported an error: {message}")]
    ToolError { tool: String, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, McpError>;

/// Failure of a multi-step workflow. No partial result accompanies it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Workflow '{workflow}' failed at step '{step}'")]
    StepFailed { workflow: String, step: String },

    #[error("Workflow '{workflow}' requires a non-empty '{param}' parameter")]
    MissingParameter { workflow: String, param: String },

    #[error("Unknown workflow: {0}")]
    UnknownWorkflow(String),
}

pub type WorkflowResult<T> = std::result::Result<T, WorkflowError>;
