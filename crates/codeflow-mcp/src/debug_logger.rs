// ABOUTME: JSONL trace of remote tool calls and prompt fetches
// ABOUTME: Enabled with CODEFLOW_DEBUG=1; written under CODEFLOW_DEBUG_DIR or ./.codeflow/debug

use chrono::Utc;
use parking_lot::{const_mutex, Mutex};
use serde_json::Value as JsonValue;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

/// Global debug logger instance
static DEBUG_LOGGER: Mutex<Option<DebugLogger>> = const_mutex(None);

/// Append-only trace of what was sent to and received from the server
pub struct DebugLogger {
    file: File,
    log_path: PathBuf,
}

impl DebugLogger {
    /// Current trace file path, if tracing is enabled
    pub fn current_log_path() -> Option<PathBuf> {
        DEBUG_LOGGER.lock().as_ref().map(|l| l.log_path.clone())
    }

    /// Initialize the global debug logger from the environment
    pub fn init() {
        let enabled = std::env::var("CODEFLOW_DEBUG")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        if !enabled {
            return;
        }

        let log_dir = std::env::var("CODEFLOW_DEBUG_DIR")
            .ok()
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::current_dir()
                    .unwrap_or_else(|_| PathBuf::from("."))
                    .join(".codeflow")
                    .join("debug")
            });

        if let Err(e) = std::fs::create_dir_all(&log_dir) {
            warn!("Failed to create debug directory {}: {}", log_dir.display(), e);
            return;
        }

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let log_path = log_dir.join(format!("tool_trace_{}.jsonl", timestamp));

        match OpenOptions::new().create(true).append(true).open(&log_path) {
            Ok(file) => {
                info!("Debug tracing enabled: {}", log_path.display());
                *DEBUG_LOGGER.lock() = Some(DebugLogger { file, log_path });
            }
            Err(e) => warn!("Failed to open debug log file: {}", e),
        }
    }

    pub fn is_enabled() -> bool {
        DEBUG_LOGGER.lock().is_some()
    }

    pub fn log_tool_start(tool_name: &str, arguments: &JsonValue) {
        Self::write_entry(|| {
            serde_json::json!({
                "timestamp": Utc::now().to_rfc3339(),
                "event": "tool_call_start",
                "tool": tool_name,
                "arguments": arguments,
            })
        });
    }

    pub fn log_tool_finish(tool_name: &str, texts: &[Option<String>]) {
        Self::write_entry(|| {
            serde_json::json!({
                "timestamp": Utc::now().to_rfc3339(),
                "event": "tool_call_finish",
                "tool": tool_name,
                "content": texts,
                "items": texts.len(),
            })
        });
    }

    pub fn log_tool_error(tool_name: &str, arguments: &JsonValue, error: &str) {
        Self::write_entry(|| {
            serde_json::json!({
                "timestamp": Utc::now().to_rfc3339(),
                "event": "tool_call_error",
                "tool": tool_name,
                "arguments": arguments,
                "error": error,
            })
        });
    }

    /// Prompt fetch outcome; `error` is set when the fetch failed
    pub fn log_prompt_fetch(prompt_name: &str, arguments: &JsonValue, messages: usize, error: Option<&str>) {
        Self::write_entry(|| {
            serde_json::json!({
                "timestamp": Utc::now().to_rfc3339(),
                "event": "prompt_fetch",
                "prompt": prompt_name,
                "arguments": arguments,
                "messages": messages,
                "success": error.is_none(),
                "error": error,
            })
        });
    }

    /// Entries are only built when tracing is on
    fn write_entry(build: impl FnOnce() -> JsonValue) {
        let mut guard = DEBUG_LOGGER.lock();
        if let Some(logger) = guard.as_mut() {
            if let Ok(json_line) = serde_json::to_string(&build()) {
                let _ = writeln!(logger.file, "{}", json_line);
                let _ = logger.file.flush();
            }
        }
    }

    #[cfg(test)]
    fn reset() {
        *DEBUG_LOGGER.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use std::path::Path;

    fn setup_temp_logger(dir: &Path) -> PathBuf {
        DebugLogger::reset();
        std::env::set_var("CODEFLOW_DEBUG", "1");
        std::env::set_var("CODEFLOW_DEBUG_DIR", dir);
        DebugLogger::init();
        DebugLogger::current_log_path().expect("log path")
    }

    fn teardown() {
        DebugLogger::reset();
        std::env::remove_var("CODEFLOW_DEBUG");
        std::env::remove_var("CODEFLOW_DEBUG_DIR");
    }

    fn read_events(path: &Path) -> Vec<JsonValue> {
        let data = fs::read_to_string(path).unwrap();
        data.lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    #[serial]
    fn tool_start_finish_logged_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = setup_temp_logger(dir.path());

        let args = serde_json::json!({"repo_url": "https://example.com/r.git"});
        DebugLogger::log_tool_start("fetch_repository", &args);
        DebugLogger::log_tool_finish("fetch_repository", &[Some("r".to_string())]);

        let events = read_events(&path);
        teardown();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["event"], "tool_call_start");
        assert_eq!(events[0]["tool"], "fetch_repository");
        assert_eq!(events[1]["event"], "tool_call_finish");
        assert_eq!(events[1]["content"][0], "r");
    }

    #[test]
    #[serial]
    fn errors_and_prompt_fetches_are_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let path = setup_temp_logger(dir.path());

        let args = serde_json::json!({});
        DebugLogger::log_tool_error("classify_repository", &args, "timeout");
        DebugLogger::log_prompt_fetch("explain", &args, 0, Some("not found"));

        let events = read_events(&path);
        teardown();

        assert_eq!(events[0]["event"], "tool_call_error");
        assert_eq!(events[0]["error"], "timeout");
        assert_eq!(events[1]["event"], "prompt_fetch");
        assert_eq!(events[1]["success"], false);
    }

    #[test]
    #[serial]
    fn disabled_logger_writes_nothing() {
        teardown();
        DebugLogger::init();

        assert!(!DebugLogger::is_enabled());
        DebugLogger::log_tool_start("noop", &serde_json::json!({}));
        assert!(DebugLogger::current_log_path().is_none());
    }
}
