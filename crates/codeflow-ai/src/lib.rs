pub mod history;
pub mod llm_provider;
pub mod ollama_client;
pub mod session;

pub use history::{ChatHistory, HistoryCollector};
pub use llm_provider::*;
pub use ollama_client::{parse_stream_line, OllamaClient, OllamaConfig};
pub use session::{complete_prompt, ChatSession, TurnOutcome};
