// ABOUTME: Registry of multi-step workflows composed from remote tasks
// ABOUTME: Steps run strictly in order; the first failed step aborts the workflow

use crate::error::{WorkflowError, WorkflowResult};
use crate::tasks::TaskRunner;
use futures::future::BoxFuture;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{error, info, warn};

/// String parameters supplied by the operator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkflowParams {
    values: BTreeMap<String, String>,
}

impl WorkflowParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Parse a `key=value` pair as given on the command line
    pub fn parse_pair(pair: &str) -> Option<(String, String)> {
        let (key, value) = pair.split_once('=')?;
        let key = key.trim();
        (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
    }

    fn required(&self, workflow: &str, key: &str) -> WorkflowResult<&str> {
        self.get(key)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| WorkflowError::MissingParameter {
                workflow: workflow.to_string(),
                param: key.to_string(),
            })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for WorkflowParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

type WorkflowFn =
    for<'a> fn(&'a TaskRunner, &'a WorkflowParams) -> BoxFuture<'a, WorkflowResult<Value>>;

/// A named, parameterized orchestration over tasks
pub struct WorkflowDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    /// Parameter names in prompt order
    pub params: &'static [&'static str],
    entry: WorkflowFn,
}

impl WorkflowDescriptor {
    /// Validate every declared parameter, then run the steps.
    pub async fn run(&self, tasks: &TaskRunner, params: &WorkflowParams) -> WorkflowResult<Value> {
        for param in self.params {
            params.required(self.name, param)?;
        }

        info!(workflow = self.name, "Starting workflow");
        let result = (self.entry)(tasks, params).await;
        match &result {
            Ok(_) => info!(workflow = self.name, "Workflow completed"),
            Err(e) => error!(workflow = self.name, error = %e, "Workflow aborted"),
        }
        result
    }
}

impl std::fmt::Debug for WorkflowDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowDescriptor")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

static WORKFLOWS: &[WorkflowDescriptor] = &[
    WorkflowDescriptor {
        name: "fetch-and-classify",
        description: "Fetch a repository and classify it.",
        params: &["repo_url"],
        entry: |t, p| Box::pin(fetch_and_classify(t, p)),
    },
    WorkflowDescriptor {
        name: "fetch-classify-and-list-files",
        description: "Fetch and classify a repository, then list its processed files.",
        params: &["repo_url"],
        entry: |t, p| Box::pin(fetch_classify_and_list_files(t, p)),
    },
    WorkflowDescriptor {
        name: "document-info-with-content",
        description: "Get a document's metadata together with its content.",
        params: &["repository_name", "filename"],
        entry: |t, p| Box::pin(document_info_with_content(t, p)),
    },
    WorkflowDescriptor {
        name: "extract-document-flow",
        description: "Extract the logical flow of one document using language-specific prompts.",
        params: &["repository_name", "filename"],
        entry: |t, p| Box::pin(extract_document_flow(t, p)),
    },
];

/// All registered workflows in display order
pub fn workflows() -> &'static [WorkflowDescriptor] {
    WORKFLOWS
}

pub fn find_workflow(name: &str) -> Option<&'static WorkflowDescriptor> {
    WORKFLOWS.iter().find(|w| w.name == name)
}

/// Look up a workflow by name and run it
pub async fn run_workflow(
    tasks: &TaskRunner,
    name: &str,
    params: &WorkflowParams,
) -> WorkflowResult<Value> {
    let workflow =
        find_workflow(name).ok_or_else(|| WorkflowError::UnknownWorkflow(name.to_string()))?;
    workflow.run(tasks, params).await
}

fn step<T>(workflow: &str, step: &str, outcome: Option<T>) -> WorkflowResult<T> {
    outcome.ok_or_else(|| WorkflowError::StepFailed {
        workflow: workflow.to_string(),
        step: step.to_string(),
    })
}

/// A fetched repository stays on the server when a later step fails.
fn note_orphaned_fetch(workflow: &str, repository: &str) {
    warn!(
        workflow,
        repository, "Repository was fetched but the workflow aborted; it is left in place"
    );
}

async fn fetch_and_classify(tasks: &TaskRunner, params: &WorkflowParams) -> WorkflowResult<Value> {
    const NAME: &str = "fetch-and-classify";
    let repo_url = params.required(NAME, "repo_url")?;

    let repository = step(NAME, "fetch_repository", tasks.fetch_repository(repo_url).await)?;
    let classification = step(
        NAME,
        "classify_repository",
        tasks.classify_repository(&repository).await,
    )
    .inspect_err(|_| note_orphaned_fetch(NAME, &repository))?;

    Ok(json!({
        "repository": repository,
        "classification": classification,
    }))
}

async fn fetch_classify_and_list_files(
    tasks: &TaskRunner,
    params: &WorkflowParams,
) -> WorkflowResult<Value> {
    const NAME: &str = "fetch-classify-and-list-files";
    let repo_url = params.required(NAME, "repo_url")?;

    let repository = step(NAME, "fetch_repository", tasks.fetch_repository(repo_url).await)?;
    let classification = step(
        NAME,
        "classify_repository",
        tasks.classify_repository(&repository).await,
    )
    .inspect_err(|_| note_orphaned_fetch(NAME, &repository))?;
    let files = step(
        NAME,
        "list_processed_files",
        tasks.list_processed_files(&repository).await,
    )
    .inspect_err(|_| note_orphaned_fetch(NAME, &repository))?;

    Ok(json!({
        "repository": repository,
        "classification": classification,
        "files": files,
    }))
}

async fn document_info_with_content(
    tasks: &TaskRunner,
    params: &WorkflowParams,
) -> WorkflowResult<Value> {
    const NAME: &str = "document-info-with-content";
    let repository = params.required(NAME, "repository_name")?;
    let filename = params.required(NAME, "filename")?;

    let info = step(
        NAME,
        "get_document_info",
        tasks.get_document_info(repository, filename).await,
    )?;
    let content = step(
        NAME,
        "retrieve_file_content",
        tasks.retrieve_file_content(repository, filename).await,
    )?;

    Ok(info.into_record(content))
}

async fn extract_document_flow(
    tasks: &TaskRunner,
    params: &WorkflowParams,
) -> WorkflowResult<Value> {
    const NAME: &str = "extract-document-flow";
    let repository = params.required(NAME, "repository_name")?;
    let filename = params.required(NAME, "filename")?;

    let info = step(
        NAME,
        "get_document_info",
        tasks.get_document_info(repository, filename).await,
    )?;
    let language = step(NAME, "language", info.language().map(str::to_string))?;
    let source = step(
        NAME,
        "retrieve_file_content",
        tasks.retrieve_file_content(repository, filename).await,
    )?;
    let prompts = step(
        NAME,
        "get_language_specific_prompt",
        tasks
            .get_language_specific_prompt(&language, &source, repository, filename)
            .await,
    )?;
    step(
        NAME,
        "extract_flow_with_prompt",
        tasks.extract_flow_with_prompt(&prompts).await,
    )
}
