// ABOUTME: Core configuration and error types shared by every CodeFlow crate
// ABOUTME: Loads .codeflow.toml, .env files and CODEFLOW_* overrides

pub mod config_manager;
pub mod error;

pub use config_manager::*;
pub use error::*;
