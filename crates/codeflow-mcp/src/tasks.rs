// ABOUTME: Single-purpose remote operations with fixed tool names and argument mappings
// ABOUTME: Each task is one safe remote call plus at most one normalization pass

use crate::connection::{ContentItem, ToolServer};
use crate::normalizer::{
    all_texts, first_structured_or_text, first_text, parse_first_structured, parse_structured,
};
use crate::safe_call;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// Document metadata returned by the server. All server fields are kept.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentInfo {
    fields: Map<String, Value>,
}

impl DocumentInfo {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Non-empty `language` field
    pub fn language(&self) -> Option<&str> {
        self.fields
            .get("language")
            .and_then(Value::as_str)
            .filter(|l| !l.is_empty())
    }

    /// The document info object extended with the file's content
    pub fn into_record(mut self, filecontent: SourceContent) -> Value {
        self.fields
            .insert("filecontent".to_string(), Value::String(filecontent.0));
        Value::Object(self.fields)
    }
}

/// Text of one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceContent(pub String);

impl SourceContent {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Prompt pair used for flow extraction; both parts are non-empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system_prompt: String,
    pub llm_prompt: String,
}

impl PromptPair {
    /// Validate the server reply shape. Either key missing or empty is a fault.
    pub fn from_value(value: &Value) -> Option<Self> {
        let field = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        };
        Some(Self {
            system_prompt: field("system_prompt")?,
            llm_prompt: field("llm_prompt")?,
        })
    }
}

/// Runs the individual remote tasks against one server
#[derive(Clone)]
pub struct TaskRunner {
    server: Arc<dyn ToolServer>,
    tool_timeout: Option<Duration>,
}

impl TaskRunner {
    pub fn new(server: Arc<dyn ToolServer>) -> Self {
        Self {
            server,
            tool_timeout: None,
        }
    }

    pub fn with_timeout(mut self, tool_timeout: Option<Duration>) -> Self {
        self.tool_timeout = tool_timeout;
        self
    }

    /// Call the tool and keep the raw reply. `identity` arguments name a
    /// repository, file or language and must be non-empty; `content`
    /// arguments carry text and are sent as they are.
    async fn invoke(
        &self,
        tool: &str,
        identity: &[(&str, &str)],
        content: &[(&str, &str)],
    ) -> Option<Vec<ContentItem>> {
        if let Some((key, _)) = identity.iter().find(|(_, value)| value.trim().is_empty()) {
            warn!(tool, argument = *key, "Refusing to call tool with an empty argument");
            return None;
        }

        let arguments: Map<String, Value> = identity
            .iter()
            .chain(content)
            .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
            .collect();

        safe_call::call_tool(self.server.as_ref(), tool, arguments, self.tool_timeout, None)
            .await
            .ok()
    }

    /// Ask the server to fetch a repository; returns its name
    pub async fn fetch_repository(&self, repo_url: &str) -> Option<String> {
        let content = self
            .invoke("fetch_repository", &[("repo_url", repo_url)], &[])
            .await?;
        first_text(&content)
    }

    /// Classification as JSON, or the raw text when the server answers in prose
    pub async fn classify_repository(&self, repository: &str) -> Option<Value> {
        let content = self
            .invoke("classify_repository", &[("repository_name", repository)], &[])
            .await?;
        first_structured_or_text(&content, "classify_repository")
    }

    pub async fn list_processed_files(&self, repository: &str) -> Option<Vec<String>> {
        let content = self
            .invoke("processed_repository", &[("repository", repository)], &[])
            .await?;

        if let Some(Value::Array(entries)) = first_text(&content)
            .as_deref()
            .and_then(|text| serde_json::from_str::<Value>(text).ok())
        {
            return Some(
                entries
                    .into_iter()
                    .filter_map(|entry| entry.as_str().map(str::to_string))
                    .collect(),
            );
        }

        let files = all_texts(&content)
            .into_iter()
            .enumerate()
            .filter_map(|(index, text)| {
                if text.is_none() {
                    warn!(index, "Processed file entry has no text, skipping");
                }
                text
            })
            .collect();
        Some(files)
    }

    pub async fn get_document_info(&self, repository: &str, filename: &str) -> Option<DocumentInfo> {
        let content = self
            .invoke(
                "get_document_info",
                &[("repository", repository), ("filename", filename)],
                &[],
            )
            .await?;

        match parse_first_structured(&content, "get_document_info")? {
            Value::Object(fields) => Some(DocumentInfo::new(fields)),
            other => {
                error!(
                    repository,
                    filename,
                    "Document info is not a JSON object: {}",
                    other
                );
                None
            }
        }
    }

    pub async fn retrieve_file_content(&self, repository: &str, filename: &str) -> Option<SourceContent> {
        let content = self
            .invoke(
                "retrieve_file_content",
                &[("repository_name", repository), ("filename", filename)],
                &[],
            )
            .await?;
        first_text(&content).map(SourceContent)
    }

    /// Language-specific extraction prompts for one source file
    pub async fn get_language_specific_prompt(
        &self,
        language: &str,
        source: &SourceContent,
        repository: &str,
        filename: &str,
    ) -> Option<PromptPair> {
        let content = self
            .invoke(
                "extract_language_specific_flow",
                &[
                    ("language", language),
                    ("repository_name", repository),
                    ("filename", filename),
                ],
                &[("source_code", source.as_str())],
            )
            .await?;

        let value = parse_first_structured(&content, "extract_language_specific_flow")?;
        let pair = PromptPair::from_value(&value);
        if pair.is_none() {
            error!(
                language,
                filename, "Prompt reply is missing a non-empty system_prompt or llm_prompt"
            );
        }
        pair
    }

    pub async fn extract_flow_with_prompt(&self, prompts: &PromptPair) -> Option<Value> {
        let content = self
            .invoke(
                "extract_flow_with_prompt",
                &[],
                &[
                    ("system_prompt", prompts.system_prompt.as_str()),
                    ("llm_prompt", prompts.llm_prompt.as_str()),
                ],
            )
            .await?;
        let text = first_text(&content)?;
        parse_structured(&text, "extract_flow_with_prompt")
    }

    /// Map files the server produced for a repository
    pub async fn get_map_files(&self, repository: &str) -> Option<Value> {
        let content = self
            .invoke("get_map_files", &[("repository", repository)], &[])
            .await?;
        first_structured_or_text(&content, "get_map_files")
    }

    /// Call-graph edges found in one file
    pub async fn extract_edges(&self, repository: &str, filename: &str) -> Option<Value> {
        let content = self
            .invoke(
                "find_edges",
                &[("repository", repository), ("filename", filename)],
                &[],
            )
            .await?;
        first_structured_or_text(&content, "find_edges")
    }

    /// Flow of one file using the server's default prompts
    pub async fn extract_flow(&self, repository: &str, filename: &str) -> Option<Value> {
        let content = self
            .invoke(
                "extract_flow",
                &[("repository", repository), ("filename", filename)],
                &[],
            )
            .await?;
        first_structured_or_text(&content, "extract_flow")
    }

    pub async fn return_workspace(&self) -> Option<Value> {
        let content = self.invoke("return_workspace", &[], &[]).await?;
        first_structured_or_text(&content, "return_workspace")
    }

    /// Classification of a single document
    pub async fn classify_document(&self, repository: &str, filename: &str) -> Option<Value> {
        let content = self
            .invoke(
                "file_classification",
                &[("repository_name", repository), ("filename", filename)],
                &[],
            )
            .await?;
        first_structured_or_text(&content, "file_classification")
    }
}
