use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodeFlowError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

pub type Result<T> = std::result::Result<T, CodeFlowError>;
