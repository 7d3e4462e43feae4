use crate::llm_provider::*;
use anyhow::anyhow;
use async_trait::async_trait;
use codeflow_core::LlmConfig;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tokio_util::codec::{AnyDelimiterCodec, FramedRead};
use tokio_util::io::StreamReader;
use tracing::{debug, info};

/// Connection settings for a local Ollama server
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub model_name: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            model_name: "deepseek-coder-v2:latest".to_string(),
            base_url: "http://localhost:11434".to_string(),
            timeout: Duration::from_secs(300),
        }
    }
}

impl From<&LlmConfig> for OllamaConfig {
    fn from(config: &LlmConfig) -> Self {
        Self {
            model_name: config.model.clone(),
            base_url: config.ollama_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// Ollama API request structure for chat completions
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

/// Body of a non-streaming reply
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    #[serde(default)]
    eval_count: Option<usize>,
    #[serde(default)]
    prompt_eval_count: Option<usize>,
}

/// One NDJSON line of a streaming reply
#[derive(Debug, Deserialize)]
struct OllamaStreamChunk {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    error: Option<String>,
}

/// Decode one line of an Ollama chat stream.
///
/// Returns `Ok(None)` for lines that carry no text (blank keep-alives, the
/// terminating `done` record) and `Err` for lines that are not a valid chunk
/// or that report a server-side error.
pub fn parse_stream_line(line: &str) -> LLMResult<Option<String>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let chunk: OllamaStreamChunk =
        serde_json::from_str(line).map_err(|e| anyhow!("Malformed stream chunk: {}", e))?;

    if let Some(error) = chunk.error {
        return Err(anyhow!("Ollama reported an error mid-stream: {}", error));
    }

    Ok(chunk
        .message
        .map(|m| m.content)
        .filter(|content| !content.is_empty()))
}

/// Chat client for a local Ollama model
pub struct OllamaClient {
    client: Client,
    config: OllamaConfig,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(OllamaConfig::from(config))
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.config.base_url)
    }
}

#[async_trait]
impl LLMProvider for OllamaClient {
    async fn generate_chat(
        &self,
        messages: &[Message],
        config: &GenerationConfig,
    ) -> LLMResult<LLMResponse> {
        let start_time = Instant::now();
        let request = OllamaRequest {
            model: &self.config.model_name,
            messages,
            stream: false,
            options: Some(OllamaOptions {
                temperature: config.temperature,
                num_predict: config.max_tokens,
                stop: config.stop.clone(),
            }),
        };

        debug!(
            model = %self.config.model_name,
            messages = messages.len(),
            "Sending chat request to Ollama"
        );

        let response = timeout(
            self.config.timeout,
            self.client.post(self.chat_url()).json(&request).send(),
        )
        .await
        .map_err(|_| anyhow!("Ollama request timeout after {:?}", self.config.timeout))?
        .map_err(|e| anyhow!("Ollama request failed: {}", e))?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("Ollama API error: {}", error_text));
        }

        let response_data: OllamaResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse Ollama response: {}", e))?;

        info!(
            "Ollama chat completed: {}ms, completion: {} tokens",
            start_time.elapsed().as_millis(),
            response_data.eval_count.unwrap_or(0)
        );

        Ok(LLMResponse {
            content: response_data.message.content,
            prompt_tokens: response_data.prompt_eval_count,
            completion_tokens: response_data.eval_count,
            model: self.config.model_name.clone(),
        })
    }

    async fn stream_chat(&self, messages: &[Message]) -> LLMResult<ChatStream> {
        let request = OllamaRequest {
            model: &self.config.model_name,
            messages,
            stream: true,
            options: None,
        };

        let response = timeout(
            self.config.timeout,
            self.client.post(self.chat_url()).json(&request).send(),
        )
        .await
        .map_err(|_| anyhow!("Ollama stream did not start within {:?}", self.config.timeout))?
        .map_err(|e| anyhow!("Failed to start streaming: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("Ollama API error ({}): {}", status, error_text));
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other));
        // Split on raw bytes so one undecodable line cannot end the stream
        let lines = FramedRead::new(
            StreamReader::new(body),
            AnyDelimiterCodec::new(b"\n".to_vec(), Vec::new()),
        );

        let fragments = lines.filter_map(|line| async move {
            match line {
                Ok(bytes) => match String::from_utf8(bytes.to_vec()) {
                    Ok(line) => parse_stream_line(&line).transpose(),
                    Err(e) => Some(Err(anyhow!("Stream chunk is not valid UTF-8: {}", e))),
                },
                Err(e) => Some(Err(anyhow!("Failed to read stream chunk: {}", e))),
            }
        });

        Ok(fragments.boxed())
    }

    async fn is_available(&self) -> bool {
        let probe = timeout(
            Duration::from_secs(5),
            self.client
                .get(format!("{}/api/tags", self.config.base_url))
                .send(),
        )
        .await;

        matches!(probe, Ok(Ok(response)) if response.status().is_success())
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}
