use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use serde_json::{Map, Value};

use scribe_core::config::AppConfig;
use scribe_core::error::{Result, ScribeError};
use scribe_core::event::EventBus;
use scribe_core::traits::GenerationService;
use scribe_engine::{FrozenGraph, GraphDefinitionError, Node, StateUpdate, WorkflowState};

/// A named, runnable workflow.
pub trait Workflow: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn graph(&self) -> &FrozenGraph;

    /// Validate caller fields, apply defaults, and build the initial state.
    fn seed(&self, fields: Map<String, Value>) -> Result<WorkflowState>;

    /// Extract the caller-facing result from a finished run's state.
    fn output(&self, state: &WorkflowState) -> Result<Value>;
}

/// Services shared by every node body.
#[derive(Clone)]
pub struct WorkflowContext {
    pub generation: Arc<dyn GenerationService>,
    pub config: Arc<AppConfig>,
    pub events: Arc<EventBus>,
}

impl WorkflowContext {
    pub fn new(
        generation: Arc<dyn GenerationService>,
        config: Arc<AppConfig>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            generation,
            config,
            events,
        }
    }
}

/// Build a node from an async fn that takes the shared context and a state
/// snapshot.
pub(crate) fn step<F, Fut>(ctx: &WorkflowContext, name: &str, body: F) -> Node
where
    F: Fn(WorkflowContext, Arc<WorkflowState>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<StateUpdate>> + Send + 'static,
{
    let ctx = ctx.clone();
    Node::new(name, move |state: Arc<WorkflowState>| body(ctx.clone(), state))
}

/// Registry of available workflows.
pub struct WorkflowRegistry {
    workflows: BTreeMap<String, Arc<dyn Workflow>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self {
            workflows: BTreeMap::new(),
        }
    }

    /// Register a workflow, replacing any with the same name.
    pub fn register(&mut self, workflow: impl Workflow) {
        let name = workflow.name().to_string();
        self.workflows.insert(name, Arc::new(workflow));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Workflow>> {
        self.workflows.get(name).cloned()
    }

    /// Registered workflows in name order.
    pub fn list(&self) -> impl Iterator<Item = &Arc<dyn Workflow>> {
        self.workflows.values()
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }

    /// Registry with every built-in workflow, wired to `ctx`.
    pub fn with_builtins(ctx: &WorkflowContext) -> std::result::Result<Self, GraphDefinitionError> {
        let mut registry = Self::new();
        registry.register(crate::repurpose::RepurposeWorkflow::new(ctx)?);
        registry.register(crate::blog::BlogWorkflow::new(ctx)?);
        registry.register(crate::x_post::XPostWorkflow::new(ctx)?);
        registry.register(crate::image_prompt::ImagePromptWorkflow::new(ctx)?);
        Ok(registry)
    }
}

impl Default for WorkflowRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-empty trimmed string field, or `InvalidInput`.
pub(crate) fn require_str(fields: &Map<String, Value>, key: &str) -> Result<String> {
    match fields.get(key).and_then(Value::as_str).map(str::trim) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(ScribeError::InvalidInput(format!(
            "'{}' is required and must be a non-empty string",
            key
        ))),
    }
}

/// String field or `default` when absent or blank.
pub(crate) fn str_or(fields: &Map<String, Value>, key: &str, default: &str) -> String {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
        .to_string()
}

/// Value of `key` in a finished state, or an error naming the missing key.
pub(crate) fn final_value(state: &WorkflowState, key: &str) -> Result<Value> {
    state.get(key).cloned().ok_or_else(|| {
        ScribeError::MalformedOutput(format!("run finished without producing '{}'", key))
    })
}
