use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use scribe_core::config::AppConfig;
use scribe_core::error::{Result, ScribeError};
use scribe_core::event::EventBus;
use scribe_core::traits::GenerationService;
use scribe_engine::{BranchFailure, Executor, RunTrace};

use crate::workflow::{Workflow, WorkflowContext, WorkflowRegistry};
use crate::x_post::{self, IdeaRequest, IdeasResponse, XPostInput, XPostResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Success,
    Error,
}

/// Why a run was refused or failed. Not serialized; transports map it to
/// their own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    UnknownWorkflow,
    RunFailed,
}

impl ErrorKind {
    pub fn of(error: &ScribeError) -> Self {
        match error {
            ScribeError::InvalidInput(_) | ScribeError::Json(_) => ErrorKind::InvalidInput,
            ScribeError::UnknownWorkflow(_) => ErrorKind::UnknownWorkflow,
            _ => ErrorKind::RunFailed,
        }
    }
}

/// Tagged result of one workflow invocation. An error response never
/// carries a result.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResponse {
    pub status: WorkflowStatus,
    pub workflow: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// RFC 3339 start time of the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<RunTrace>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<BranchFailure>,
    #[serde(skip)]
    pub error_kind: Option<ErrorKind>,
}

impl WorkflowResponse {
    fn error(workflow: &str, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status: WorkflowStatus::Error,
            workflow: workflow.to_string(),
            run_id: None,
            started_at: None,
            result: None,
            trace: None,
            message: Some(message.into()),
            failures: vec![],
            error_kind: Some(kind),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == WorkflowStatus::Success
    }
}

/// Listing entry for one workflow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowInfo {
    pub name: String,
    pub description: String,
    pub required_inputs: Vec<String>,
    pub nodes: Vec<String>,
}

/// Runs registered workflows by name.
pub struct WorkflowService {
    ctx: WorkflowContext,
    registry: WorkflowRegistry,
    executor: Executor,
}

impl WorkflowService {
    /// Build every built-in workflow graph. A graph that fails to freeze is a
    /// configuration error.
    pub fn new(generation: Arc<dyn GenerationService>, config: Arc<AppConfig>) -> Result<Self> {
        let events = Arc::new(EventBus::default());
        let executor = Executor::from_config(&config.engine).with_events(events.clone());
        let ctx = WorkflowContext::new(generation, config, events);
        let registry = WorkflowRegistry::with_builtins(&ctx)
            .map_err(|e| ScribeError::Config(format!("invalid workflow graph: {}", e)))?;
        info!(workflows = registry.len(), "Workflows ready");
        Ok(Self {
            ctx,
            registry,
            executor,
        })
    }

    /// Bus carrying node and refinement progress for every run.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.ctx.events
    }

    pub fn list(&self) -> Vec<WorkflowInfo> {
        self.registry
            .list()
            .map(|w| WorkflowInfo {
                name: w.name().to_string(),
                description: w.description().to_string(),
                required_inputs: w.graph().required_inputs(),
                nodes: w.graph().node_names().to_vec(),
            })
            .collect()
    }

    pub async fn run(&self, name: &str, fields: Value, include_trace: bool) -> WorkflowResponse {
        self.run_with_cancel(name, fields, include_trace, CancellationToken::new())
            .await
    }

    /// Run `name` with caller-supplied initial fields.
    pub async fn run_with_cancel(
        &self,
        name: &str,
        fields: Value,
        include_trace: bool,
        cancel: CancellationToken,
    ) -> WorkflowResponse {
        let Some(workflow) = self.registry.get(name) else {
            return WorkflowResponse::error(
                name,
                ErrorKind::UnknownWorkflow,
                ScribeError::UnknownWorkflow(name.to_string()).to_string(),
            );
        };

        let initial = match seed(workflow.as_ref(), fields) {
            Ok(state) => state,
            Err(e) => {
                warn!(workflow = %name, error = %e, "Rejected workflow input");
                return WorkflowResponse::error(name, ErrorKind::of(&e), e.to_string());
            }
        };

        match self
            .executor
            .run_with_cancel(workflow.graph(), initial, cancel)
            .await
        {
            Ok(out) => match workflow.output(&out.state) {
                Ok(result) => WorkflowResponse {
                    status: WorkflowStatus::Success,
                    workflow: name.to_string(),
                    run_id: Some(out.run_id.to_string()),
                    started_at: Some(out.started_at.to_rfc3339()),
                    result: Some(result),
                    trace: include_trace.then_some(out.trace),
                    message: None,
                    failures: vec![],
                    error_kind: None,
                },
                Err(e) => WorkflowResponse::error(name, ErrorKind::RunFailed, e.to_string()),
            },
            Err(failure) => {
                let mut response =
                    WorkflowResponse::error(name, ErrorKind::RunFailed, failure.to_string());
                if include_trace {
                    response.trace = Some(failure.trace);
                }
                response.failures = failure.failures;
                response
            }
        }
    }

    /// Refine an X post directly, outside the graph executor.
    pub async fn x_post(&self, input: XPostInput) -> Result<XPostResponse> {
        x_post::generate_post(&self.ctx, input).await
    }

    pub async fn ideas(&self, request: IdeaRequest) -> Result<IdeasResponse> {
        x_post::generate_ideas(&self.ctx, request).await
    }
}

/// Seed a run and check that the graph's required inputs are all present.
fn seed(workflow: &dyn Workflow, fields: Value) -> Result<scribe_engine::WorkflowState> {
    let Value::Object(fields) = fields else {
        return Err(ScribeError::InvalidInput(
            "workflow input must be a JSON object".to_string(),
        ));
    };
    let state = workflow.seed(fields)?;
    let missing: Vec<String> = workflow
        .graph()
        .required_inputs()
        .into_iter()
        .filter(|key| !state.contains(key))
        .collect();
    if !missing.is_empty() {
        return Err(ScribeError::InvalidInput(format!(
            "missing required input(s): {}",
            missing.join(", ")
        )));
    }
    Ok(state)
}
