use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

use scribe_core::error::Result;

use super::state::{StateUpdate, WorkflowState};

/// Body of a node: an async function from a state snapshot to a partial update.
///
/// Implemented for any `Fn(Arc<WorkflowState>) -> impl Future`, so most
/// nodes are plain closures that capture whatever services they need.
pub trait NodeHandler: Send + Sync + 'static {
    fn call(&self, state: Arc<WorkflowState>) -> BoxFuture<'static, Result<StateUpdate>>;
}

impl<F, Fut> NodeHandler for F
where
    F: Fn(Arc<WorkflowState>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<StateUpdate>> + Send + 'static,
{
    fn call(&self, state: Arc<WorkflowState>) -> BoxFuture<'static, Result<StateUpdate>> {
        Box::pin(self(state))
    }
}

/// A named step in a workflow graph.
///
/// `deps` must all have completed at least once in the current run before
/// the node may start. `outputs` is the exhaustive list of keys the node may
/// write; `reads` documents the keys it consumes.
#[derive(Clone)]
pub struct Node {
    name: String,
    deps: Vec<String>,
    reads: Vec<String>,
    outputs: Vec<String>,
    handler: Arc<dyn NodeHandler>,
}

impl Node {
    pub fn new(name: impl Into<String>, handler: impl NodeHandler) -> Self {
        Self {
            name: name.into(),
            deps: vec![],
            reads: vec![],
            outputs: vec![],
            handler: Arc::new(handler),
        }
    }

    /// Set the dependency set.
    pub fn with_deps<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deps = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Set the keys this node reads.
    pub fn with_reads<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reads = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Set the keys this node may write.
    pub fn with_outputs<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn deps(&self) -> &[String] {
        &self.deps
    }

    pub fn reads(&self) -> &[String] {
        &self.reads
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub(crate) fn invoke(&self, state: Arc<WorkflowState>) -> BoxFuture<'static, Result<StateUpdate>> {
        self.handler.call(state)
    }

    /// First key in `update` that this node did not declare.
    pub(crate) fn undeclared_key<'u>(&self, update: &'u StateUpdate) -> Option<&'u str> {
        update.keys().find(|k| !self.outputs.iter().any(|o| o == k))
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("deps", &self.deps)
            .field("reads", &self.reads)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}
