// ABOUTME: Failure-contained wrappers around remote tool calls and prompt fetches
// ABOUTME: Every fault becomes an Err value; intent and outcome are always logged

use crate::connection::{ContentItem, ProgressHandler, PromptReply, ToolServer};
use crate::debug_logger::DebugLogger;
use crate::normalizer::{all_texts, first_text};
use crate::{McpError, Result};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{error, info};

/// Invoke a remote tool.
///
/// Transport faults, timeout expiry and tool-reported errors are all returned
/// as `Err`; success yields the raw content items for the caller to
/// normalize. Nothing is retried.
pub async fn call_tool(
    server: &dyn ToolServer,
    name: &str,
    arguments: Map<String, Value>,
    timeout: Option<Duration>,
    progress: Option<ProgressHandler>,
) -> Result<Vec<ContentItem>> {
    let traced_args = Value::Object(arguments.clone());
    info!(tool = name, "Calling tool");
    DebugLogger::log_tool_start(name, &traced_args);

    let call = server.call_tool(name, arguments, progress);
    let reply = match timeout {
        Some(limit) => tokio::time::timeout(limit, call).await.unwrap_or_else(|_| {
            Err(McpError::RequestTimeout(format!(
                "tool '{}' did not answer within {:?}",
                name, limit
            )))
        }),
        None => call.await,
    };

    let outcome = reply.and_then(|reply| {
        if reply.is_error {
            Err(McpError::ToolError {
                tool: name.to_string(),
                message: first_text(&reply.content)
                    .unwrap_or_else(|| "no error detail".to_string()),
            })
        } else {
            Ok(reply.content)
        }
    });

    match &outcome {
        Ok(content) => {
            info!(tool = name, items = content.len(), "Tool call succeeded");
            DebugLogger::log_tool_finish(name, &all_texts(content));
        }
        Err(e) => {
            error!(tool = name, error = %e, "Tool call failed");
            DebugLogger::log_tool_error(name, &traced_args, &e.to_string());
        }
    }

    outcome
}

/// Fetch a rendered prompt under the same contract as [`call_tool`]
pub async fn get_prompt(
    server: &dyn ToolServer,
    name: &str,
    arguments: Map<String, Value>,
) -> Result<PromptReply> {
    let traced_args = Value::Object(arguments.clone());
    info!(prompt = name, "Getting prompt");

    let outcome = server.get_prompt(name, arguments).await;

    match &outcome {
        Ok(reply) => {
            info!(prompt = name, messages = reply.messages.len(), "Prompt fetched");
            DebugLogger::log_prompt_fetch(name, &traced_args, reply.messages.len(), None);
        }
        Err(e) => {
            error!(prompt = name, error = %e, "Prompt call failed");
            DebugLogger::log_prompt_fetch(name, &traced_args, 0, Some(&e.to_string()));
        }
    }

    outcome
}
