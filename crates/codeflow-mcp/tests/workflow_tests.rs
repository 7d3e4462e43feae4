use async_trait::async_trait;
use codeflow_mcp::*;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Canned reply for one tool
#[derive(Clone)]
enum Reply {
    Text(&'static str),
    Items(Vec<Option<&'static str>>),
    Fail,
}

/// Mock MCP server recording every tool call in order
#[derive(Default)]
struct MockToolServer {
    replies: HashMap<&'static str, Reply>,
    calls: Mutex<Vec<(String, Map<String, Value>)>>,
}

impl MockToolServer {
    fn new(replies: &[(&'static str, Reply)]) -> Arc<Self> {
        Arc::new(Self {
            replies: replies.iter().cloned().collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn called_tools(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }

    fn arguments_of(&self, tool: &str) -> Option<Map<String, Value>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(n, _)| n == tool)
            .map(|(_, args)| args.clone())
    }
}

#[async_trait]
impl ToolServer for MockToolServer {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<ToolInfo>> {
        Ok(Vec::new())
    }

    async fn list_prompts(&self) -> Result<Vec<PromptInfo>> {
        Ok(Vec::new())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        _progress: Option<ProgressHandler>,
    ) -> Result<ToolCallReply> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments));

        match self.replies.get(name) {
            Some(Reply::Text(text)) => Ok(ToolCallReply::ok(vec![ContentItem::text(*text)])),
            Some(Reply::Items(items)) => Ok(ToolCallReply::ok(
                items
                    .iter()
                    .map(|t| ContentItem {
                        text: t.map(str::to_string),
                    })
                    .collect(),
            )),
            Some(Reply::Fail) | None => Err(McpError::Transport(format!("{} unavailable", name))),
        }
    }

    async fn get_prompt(&self, name: &str, _arguments: Map<String, Value>) -> Result<PromptReply> {
        Err(McpError::Protocol(format!("no prompt {}", name)))
    }
}

fn params(pairs: &[(&str, &str)]) -> WorkflowParams {
    pairs.iter().copied().collect()
}

const DOC_INFO: &str = r#"{"language":"python","repository":"demo","filename":"main.py"}"#;
const PROMPTS: &str = r#"{"system_prompt":"S","llm_prompt":"L"}"#;
const FLOW: &str = r#"{"flow":[{"step":1,"call":"print"}]}"#;

fn full_flow_server() -> Arc<MockToolServer> {
    MockToolServer::new(&[
        ("get_document_info", Reply::Text(DOC_INFO)),
        ("retrieve_file_content", Reply::Text("print(1)")),
        ("extract_language_specific_flow", Reply::Text(PROMPTS)),
        ("extract_flow_with_prompt", Reply::Text(FLOW)),
    ])
}

#[tokio::test]
async fn extract_document_flow_returns_flow_for_the_prompt_pair() {
    let server = full_flow_server();
    let tasks = TaskRunner::new(server.clone());

    let result = run_workflow(
        &tasks,
        "extract-document-flow",
        &params(&[("repository_name", "demo"), ("filename", "main.py")]),
    )
    .await
    .unwrap();

    assert_eq!(result, serde_json::from_str::<Value>(FLOW).unwrap());
    assert_eq!(
        server.called_tools(),
        vec![
            "get_document_info",
            "retrieve_file_content",
            "extract_language_specific_flow",
            "extract_flow_with_prompt",
        ]
    );

    let prompt_args = server.arguments_of("extract_language_specific_flow").unwrap();
    assert_eq!(prompt_args["language"], "python");
    assert_eq!(prompt_args["source_code"], "print(1)");
    assert_eq!(prompt_args["repository_name"], "demo");

    let flow_args = server.arguments_of("extract_flow_with_prompt").unwrap();
    assert_eq!(Value::Object(flow_args), json!({"system_prompt": "S", "llm_prompt": "L"}));
}

#[tokio::test]
async fn extract_document_flow_stops_after_failed_document_info() {
    let server = MockToolServer::new(&[("get_document_info", Reply::Fail)]);
    let tasks = TaskRunner::new(server.clone());

    let err = run_workflow(
        &tasks,
        "extract-document-flow",
        &params(&[("repository_name", "demo"), ("filename", "main.py")]),
    )
    .await
    .unwrap_err();

    assert_eq!(
        err,
        WorkflowError::StepFailed {
            workflow: "extract-document-flow".into(),
            step: "get_document_info".into(),
        }
    );
    assert_eq!(server.called_tools(), vec!["get_document_info"]);
}

#[tokio::test]
async fn extract_document_flow_aborts_without_language() {
    let server = MockToolServer::new(&[
        ("get_document_info", Reply::Text(r#"{"repository":"demo"}"#)),
        ("retrieve_file_content", Reply::Text("print(1)")),
    ]);
    let tasks = TaskRunner::new(server.clone());

    let err = run_workflow(
        &tasks,
        "extract-document-flow",
        &params(&[("repository_name", "demo"), ("filename", "main.py")]),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, WorkflowError::StepFailed { ref step, .. } if step == "language"));
    assert_eq!(server.called_tools(), vec!["get_document_info"]);
}

#[tokio::test]
async fn incomplete_prompt_pair_is_a_failed_step() {
    let server = MockToolServer::new(&[
        ("get_document_info", Reply::Text(DOC_INFO)),
        ("retrieve_file_content", Reply::Text("print(1)")),
        ("extract_language_specific_flow", Reply::Text(r#"{"system_prompt":"S"}"#)),
        ("extract_flow_with_prompt", Reply::Text(FLOW)),
    ]);
    let tasks = TaskRunner::new(server.clone());

    let err = run_workflow(
        &tasks,
        "extract-document-flow",
        &params(&[("repository_name", "demo"), ("filename", "main.py")]),
    )
    .await
    .unwrap_err();

    assert!(
        matches!(err, WorkflowError::StepFailed { ref step, .. } if step == "get_language_specific_prompt")
    );
    assert!(!server.called_tools().contains(&"extract_flow_with_prompt".to_string()));
}

#[tokio::test]
async fn document_info_with_content_merges_file_content() {
    let server = MockToolServer::new(&[
        ("get_document_info", Reply::Text(r#"{"language":"python"}"#)),
        ("retrieve_file_content", Reply::Text("print(1)")),
    ]);
    let tasks = TaskRunner::new(server);

    let result = run_workflow(
        &tasks,
        "document-info-with-content",
        &params(&[("repository_name", "demo"), ("filename", "main.py")]),
    )
    .await
    .unwrap();

    assert_eq!(result, json!({"language": "python", "filecontent": "print(1)"}));
}

#[tokio::test]
async fn document_info_with_content_requires_both_parts() {
    let server = MockToolServer::new(&[
        ("get_document_info", Reply::Text(r#"{"language":"python"}"#)),
        ("retrieve_file_content", Reply::Fail),
    ]);
    let tasks = TaskRunner::new(server);

    let err = run_workflow(
        &tasks,
        "document-info-with-content",
        &params(&[("repository_name", "demo"), ("filename", "main.py")]),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, WorkflowError::StepFailed { ref step, .. } if step == "retrieve_file_content"));
}

#[tokio::test]
async fn fetch_and_classify_passes_repository_name_along() {
    let server = MockToolServer::new(&[
        ("fetch_repository", Reply::Text("demo")),
        ("classify_repository", Reply::Text("A Flask web service")),
    ]);
    let tasks = TaskRunner::new(server.clone());

    let result = run_workflow(
        &tasks,
        "fetch-and-classify",
        &params(&[("repo_url", "https://example.com/demo.git")]),
    )
    .await
    .unwrap();

    assert_eq!(
        result,
        json!({"repository": "demo", "classification": "A Flask web service"})
    );
    assert_eq!(
        server.arguments_of("classify_repository").unwrap()["repository_name"],
        "demo"
    );
}

#[tokio::test]
async fn failed_fetch_skips_classification() {
    let server = MockToolServer::new(&[
        ("fetch_repository", Reply::Fail),
        ("classify_repository", Reply::Text("{}")),
    ]);
    let tasks = TaskRunner::new(server.clone());

    let err = run_workflow(
        &tasks,
        "fetch-and-classify",
        &params(&[("repo_url", "https://example.com/demo.git")]),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, WorkflowError::StepFailed { ref step, .. } if step == "fetch_repository"));
    assert_eq!(server.called_tools(), vec!["fetch_repository"]);
}

#[tokio::test]
async fn fetch_classify_and_list_files_collects_file_list() {
    let server = MockToolServer::new(&[
        ("fetch_repository", Reply::Text("demo")),
        ("classify_repository", Reply::Text(r#"{"type":"cli"}"#)),
        ("processed_repository", Reply::Text(r#"["main.py","util.py"]"#)),
    ]);
    let tasks = TaskRunner::new(server.clone());

    let result = run_workflow(
        &tasks,
        "fetch-classify-and-list-files",
        &params(&[("repo_url", "https://example.com/demo.git")]),
    )
    .await
    .unwrap();

    assert_eq!(
        result,
        json!({
            "repository": "demo",
            "classification": {"type": "cli"},
            "files": ["main.py", "util.py"],
        })
    );
    assert_eq!(
        server.arguments_of("processed_repository").unwrap()["repository"],
        "demo"
    );
}

#[tokio::test]
async fn missing_parameter_is_rejected_before_any_call() {
    let server = full_flow_server();
    let tasks = TaskRunner::new(server.clone());

    let err = run_workflow(
        &tasks,
        "extract-document-flow",
        &params(&[("repository_name", "demo"), ("filename", "  ")]),
    )
    .await
    .unwrap_err();

    assert_eq!(
        err,
        WorkflowError::MissingParameter {
            workflow: "extract-document-flow".into(),
            param: "filename".into(),
        }
    );
    assert!(server.called_tools().is_empty());
}

#[tokio::test]
async fn unknown_workflow_is_reported() {
    let tasks = TaskRunner::new(MockToolServer::new(&[]));
    let err = run_workflow(&tasks, "does-not-exist", &WorkflowParams::new())
        .await
        .unwrap_err();
    assert_eq!(err, WorkflowError::UnknownWorkflow("does-not-exist".into()));
}

#[tokio::test]
async fn list_processed_files_falls_back_to_one_entry_per_item() {
    let server = MockToolServer::new(&[(
        "processed_repository",
        Reply::Items(vec![Some("a.py"), None, Some("b.py")]),
    )]);
    let tasks = TaskRunner::new(server);

    assert_eq!(
        tasks.list_processed_files("demo").await,
        Some(vec!["a.py".to_string(), "b.py".to_string()])
    );
}

#[tokio::test]
async fn tasks_refuse_empty_arguments_without_calling_the_server() {
    let server = full_flow_server();
    let tasks = TaskRunner::new(server.clone());

    assert_eq!(tasks.get_document_info("demo", "").await, None);
    assert_eq!(tasks.fetch_repository("").await, None);
    assert!(server.called_tools().is_empty());
}

#[tokio::test]
async fn document_info_must_be_an_object() {
    let server = MockToolServer::new(&[("get_document_info", Reply::Text(r#"["python"]"#))]);
    let tasks = TaskRunner::new(server);

    assert_eq!(tasks.get_document_info("demo", "main.py").await, None);
}

/// Captures formatted log output for the current thread
#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogCapture {
    fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

#[tokio::test]
async fn failed_classification_aborts_and_reports_the_fetched_repository() {
    let logs = LogCapture::default();
    let _guard = logs.install();

    let server = MockToolServer::new(&[
        ("fetch_repository", Reply::Text("demo")),
        ("classify_repository", Reply::Fail),
    ]);
    let tasks = TaskRunner::new(server.clone());

    let err = run_workflow(
        &tasks,
        "fetch-and-classify",
        &params(&[("repo_url", "https://example.com/demo.git")]),
    )
    .await
    .unwrap_err();

    assert_eq!(
        err,
        WorkflowError::StepFailed {
            workflow: "fetch-and-classify".into(),
            step: "classify_repository".into(),
        }
    );
    assert_eq!(server.called_tools(), vec!["fetch_repository", "classify_repository"]);

    let output = logs.contents();
    assert!(output.contains("left in place"), "log was: {}", output);
    assert!(output.contains("repository=\"demo\"") || output.contains("repository=demo"));
}

#[tokio::test]
async fn failed_file_listing_aborts_after_classification() {
    let logs = LogCapture::default();
    let _guard = logs.install();

    let server = MockToolServer::new(&[
        ("fetch_repository", Reply::Text("demo")),
        ("classify_repository", Reply::Text(r#"{"type":"cli"}"#)),
        ("processed_repository", Reply::Fail),
    ]);
    let tasks = TaskRunner::new(server.clone());

    let err = run_workflow(
        &tasks,
        "fetch-classify-and-list-files",
        &params(&[("repo_url", "https://example.com/demo.git")]),
    )
    .await
    .unwrap_err();

    assert_eq!(
        err,
        WorkflowError::StepFailed {
            workflow: "fetch-classify-and-list-files".into(),
            step: "list_processed_files".into(),
        }
    );
    assert_eq!(
        server.called_tools(),
        vec!["fetch_repository", "classify_repository", "processed_repository"]
    );
    assert!(logs.contents().contains("left in place"));
}

#[tokio::test]
async fn blank_source_file_is_still_sent_for_prompts() {
    let server = MockToolServer::new(&[
        ("get_document_info", Reply::Text(DOC_INFO)),
        ("retrieve_file_content", Reply::Text("\n")),
        ("extract_language_specific_flow", Reply::Text(PROMPTS)),
        ("extract_flow_with_prompt", Reply::Text(FLOW)),
    ]);
    let tasks = TaskRunner::new(server.clone());

    let result = run_workflow(
        &tasks,
        "extract-document-flow",
        &params(&[("repository_name", "demo"), ("filename", "empty.py")]),
    )
    .await
    .unwrap();

    assert_eq!(result, serde_json::from_str::<Value>(FLOW).unwrap());
    assert_eq!(
        server.arguments_of("extract_language_specific_flow").unwrap()["source_code"],
        "\n"
    );
}

#[tokio::test]
async fn language_prompt_still_requires_a_language() {
    let server = full_flow_server();
    let tasks = TaskRunner::new(server.clone());

    let source = SourceContent("print(1)".into());
    assert_eq!(
        tasks.get_language_specific_prompt(" ", &source, "demo", "main.py").await,
        None
    );
    assert!(server.called_tools().is_empty());
}

#[tokio::test]
async fn repository_inspection_tasks_use_their_tools() {
    let server = MockToolServer::new(&[
        ("get_map_files", Reply::Text(r#"["main.map"]"#)),
        ("find_edges", Reply::Text(r#"[{"from":"main","to":"helper"}]"#)),
        ("extract_flow", Reply::Text(FLOW)),
        ("return_workspace", Reply::Text("/srv/workspace")),
        ("file_classification", Reply::Text("entry point")),
    ]);
    let tasks = TaskRunner::new(server.clone());

    assert_eq!(tasks.get_map_files("demo").await, Some(json!(["main.map"])));
    assert_eq!(
        tasks.extract_edges("demo", "main.py").await,
        Some(json!([{"from": "main", "to": "helper"}]))
    );
    assert_eq!(
        tasks.extract_flow("demo", "main.py").await,
        Some(serde_json::from_str::<Value>(FLOW).unwrap())
    );
    assert_eq!(tasks.return_workspace().await, Some(json!("/srv/workspace")));
    assert_eq!(
        tasks.classify_document("demo", "main.py").await,
        Some(json!("entry point"))
    );

    assert_eq!(
        server.called_tools(),
        vec![
            "get_map_files",
            "find_edges",
            "extract_flow",
            "return_workspace",
            "file_classification",
        ]
    );
    assert_eq!(
        Value::Object(server.arguments_of("get_map_files").unwrap()),
        json!({"repository": "demo"})
    );
    assert_eq!(
        Value::Object(server.arguments_of("find_edges").unwrap()),
        json!({"repository": "demo", "filename": "main.py"})
    );
    assert_eq!(
        Value::Object(server.arguments_of("extract_flow").unwrap()),
        json!({"repository": "demo", "filename": "main.py"})
    );
    assert!(server.arguments_of("return_workspace").unwrap().is_empty());
    assert_eq!(
        Value::Object(server.arguments_of("file_classification").unwrap()),
        json!({"repository_name": "demo", "filename": "main.py"})
    );
}

#[tokio::test]
async fn repository_inspection_tasks_return_none_on_failure() {
    let server = MockToolServer::new(&[("find_edges", Reply::Fail)]);
    let tasks = TaskRunner::new(server.clone());

    assert_eq!(tasks.extract_edges("demo", "main.py").await, None);
    assert_eq!(tasks.classify_document("demo", "").await, None);
    assert_eq!(server.called_tools(), vec!["find_edges"]);
}
