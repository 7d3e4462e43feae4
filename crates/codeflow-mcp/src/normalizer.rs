// ABOUTME: Turns raw content items into text or structured JSON payloads
// ABOUTME: Every accessor tolerates empty or missing content and never panics

use crate::connection::ContentItem;
use serde_json::Value;
use tracing::{debug, warn};

/// Text of the first item, if there is one and it carries text
pub fn first_text(items: &[ContentItem]) -> Option<String> {
    items.first().and_then(|item| item.text.clone())
}

/// Index-aligned texts; `None` marks an item without text
pub fn all_texts(items: &[ContentItem]) -> Vec<Option<String>> {
    items.iter().map(|item| item.text.clone()).collect()
}

/// Decode `text` as JSON. Malformed input is logged under `context`.
pub fn parse_structured(text: &str, context: &str) -> Option<Value> {
    match serde_json::from_str(text) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(context, error = %e, "JSON parsing failed");
            None
        }
    }
}

pub fn parse_first_structured(items: &[ContentItem], context: &str) -> Option<Value> {
    let text = first_text(items)?;
    parse_structured(&text, context)
}

/// Index-aligned decode of every item; missing or malformed texts give `None`
pub fn parse_all_structured(items: &[ContentItem], context: &str) -> Vec<Option<Value>> {
    all_texts(items)
        .into_iter()
        .map(|text| text.and_then(|t| parse_structured(&t, context)))
        .collect()
}

/// JSON value of the first text, or the raw text as a JSON string when it
/// is not JSON. Used for replies that may be either prose or structured.
pub fn first_structured_or_text(items: &[ContentItem], context: &str) -> Option<Value> {
    let text = first_text(items)?;
    match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(_) => {
            debug!(context, "Reply is not JSON, keeping raw text");
            Some(Value::String(text))
        }
    }
}
