use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration for the CodeFlow agent
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CodeFlowConfig {
    /// Local LLM (Ollama) settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Remote analysis server settings
    #[serde(default)]
    pub mcp: McpConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// LLM configuration for chat and prompt runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Ollama URL
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Model identifier (e.g., "deepseek-coder-v2:latest")
    #[serde(default = "default_model")]
    pub model: String,

    /// Temperature for non-streaming generation
    #[serde(default)]
    pub temperature: f32,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            ollama_url: default_ollama_url(),
            model: default_model(),
            temperature: 0.0,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

/// Connection settings for the MCP tool/prompt server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// Transport: "http" (streamable HTTP) or "stdio" (spawned child process)
    #[serde(default = "default_transport")]
    pub transport: String,

    /// Server endpoint for the http transport
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Server executable for the stdio transport
    #[serde(default)]
    pub command: Option<String>,

    /// Arguments passed to `command`
    #[serde(default)]
    pub args: Vec<String>,

    /// Per tool call timeout; unset means wait for the server
    #[serde(default)]
    pub tool_timeout_secs: Option<u64>,

    /// Name announced to the server during initialization
    #[serde(default = "default_client_name")]
    pub client_name: String,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            server_url: default_server_url(),
            command: None,
            args: vec![],
            tool_timeout_secs: None,
            client_name: default_client_name(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory holding the log file (defaults to the working directory)
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Log file name
    #[serde(default = "default_log_file")]
    pub file_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
            file_name: default_log_file(),
        }
    }
}

impl LoggingConfig {
    pub fn log_dir(&self) -> PathBuf {
        self.directory.clone().unwrap_or_else(|| {
            std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
        })
    }
}

// Default value functions
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_model() -> String {
    "deepseek-coder-v2:latest".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    300
}
fn default_transport() -> String {
    "http".to_string()
}
fn default_server_url() -> String {
    "http://localhost:9000/mcp".to_string()
}
fn default_client_name() -> String {
    "codeflow-agent".to_string()
}
fn default_log_level() -> String {
    "debug".to_string()
}
fn default_log_file() -> String {
    "codeflow.log".to_string()
}

/// Configuration manager with layered sources
pub struct ConfigManager {
    config: CodeFlowConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (.env file)
    /// 2. Config file (.codeflow.toml)
    /// 3. Defaults
    ///
    /// The result is validated.
    pub fn load() -> Result<Self, ConfigError> {
        let manager = Self::load_from(None)?;
        Self::validate_config(manager.config())?;
        Ok(manager)
    }

    /// Like [`ConfigManager::load`], but an explicit path replaces the config
    /// file search and must exist. Nothing is validated, so callers can apply
    /// their own overrides through [`ConfigManager::config_mut`] and then run
    /// [`ConfigManager::validate_config`] once.
    pub fn load_from(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_dotenv();

        let (config, config_path) = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.display().to_string()));
                }
                (Self::read_toml_file(path)?, Some(path.to_path_buf()))
            }
            None => Self::load_config_file()?,
        };

        let config = Self::apply_env_overrides(config);

        info!(
            config_file = config_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "NONE (defaults)".to_string()),
            model = %config.llm.model,
            ollama_url = %config.llm.ollama_url,
            transport = %config.mcp.transport,
            "Configuration loaded"
        );

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Load .env file if it exists
    fn load_dotenv() {
        if Path::new(".env").exists() {
            if let Err(e) = dotenv::from_filename(".env") {
                warn!("Failed to load .env file: {}", e);
            }
            return;
        }

        if let Some(home) = dirs::home_dir() {
            let home_env = home.join(".codeflow.env");
            if home_env.exists() {
                if let Err(e) = dotenv::from_path(&home_env) {
                    warn!("Failed to load .codeflow.env: {}", e);
                }
            }
        }
    }

    /// Search order:
    /// 1. ./.codeflow.toml
    /// 2. ~/.codeflow/config.toml
    /// 3. Use defaults
    fn load_config_file() -> Result<(CodeFlowConfig, Option<PathBuf>), ConfigError> {
        let local_config = Path::new(".codeflow.toml");
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".codeflow").join("config.toml");
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        Ok((CodeFlowConfig::default(), None))
    }

    fn read_toml_file(path: &Path) -> Result<CodeFlowConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn apply_env_overrides(mut config: CodeFlowConfig) -> CodeFlowConfig {
        // LLM
        if let Ok(url) = std::env::var("CODEFLOW_OLLAMA_URL") {
            config.llm.ollama_url = url;
        }
        if let Ok(model) = std::env::var("CODEFLOW_MODEL") {
            config.llm.model = model;
        }
        if let Ok(temp) = std::env::var("CODEFLOW_TEMPERATURE") {
            if let Ok(t) = temp.parse() {
                config.llm.temperature = t;
            }
        }
        if let Ok(timeout) = std::env::var("CODEFLOW_LLM_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                config.llm.timeout_secs = secs;
            }
        }

        // MCP server
        if let Ok(url) = std::env::var("CODEFLOW_MCP_URL") {
            config.mcp.server_url = url;
        }
        if let Ok(transport) = std::env::var("CODEFLOW_MCP_TRANSPORT") {
            config.mcp.transport = transport.to_lowercase();
        }
        if let Ok(command) = std::env::var("CODEFLOW_MCP_COMMAND") {
            config.mcp.command = Some(command);
        }
        if let Ok(timeout) = std::env::var("CODEFLOW_TOOL_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                config.mcp.tool_timeout_secs = Some(secs);
            }
        }

        // Logging
        if let Ok(level) = std::env::var("CODEFLOW_LOG_LEVEL") {
            config.logging.level = level.to_lowercase();
        }
        if let Ok(dir) = std::env::var("CODEFLOW_LOG_DIR") {
            config.logging.directory = Some(PathBuf::from(dir));
        }

        config
    }

    /// Validate configuration
    pub fn validate_config(config: &CodeFlowConfig) -> Result<(), ConfigError> {
        Url::parse(&config.llm.ollama_url).map_err(|e| {
            ConfigError::ValidationError(format!(
                "Invalid Ollama URL '{}': {}",
                config.llm.ollama_url, e
            ))
        })?;

        if config.llm.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "LLM model name must not be empty".to_string(),
            ));
        }

        match config.mcp.transport.as_str() {
            "http" => {
                Url::parse(&config.mcp.server_url).map_err(|e| {
                    ConfigError::ValidationError(format!(
                        "Invalid MCP server URL '{}': {}",
                        config.mcp.server_url, e
                    ))
                })?;
            }
            "stdio" => {
                if config
                    .mcp
                    .command
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or_default()
                    .is_empty()
                {
                    return Err(ConfigError::ValidationError(
                        "The stdio transport requires mcp.command".to_string(),
                    ));
                }
            }
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid MCP transport: {}. Must be one of: http, stdio",
                    other
                )))
            }
        }

        match config.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    other
                )))
            }
        }

        Ok(())
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &CodeFlowConfig {
        &self.config
    }

    /// Mutable access for command-line overrides applied after loading
    pub fn config_mut(&mut self) -> &mut CodeFlowConfig {
        &mut self.config
    }

    /// Get the path to the config file that was loaded, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Create a default config file
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let config = CodeFlowConfig::default();
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::ReadError(e.to_string()))?;
            }
        }

        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Ok(())
    }
}
