use std::sync::Arc;

use crate::error::WorkflowError;

use super::state::WorkflowState;

/// An unconditional edge: `to` is triggered every time `from` completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Routing function of a conditional edge. Returns the name of one declared
/// candidate; the set of names is fixed when the edge is built.
pub type RouteFn = Arc<dyn Fn(&WorkflowState) -> &'static str + Send + Sync>;

/// An edge whose successor is picked from `candidates` by inspecting the
/// state merged after `from` completes.
#[derive(Clone)]
pub struct ConditionalEdge {
    from: String,
    candidates: Vec<String>,
    router: RouteFn,
    bound: Option<String>,
}

impl ConditionalEdge {
    pub fn new<F, I, S>(from: impl Into<String>, router: F, candidates: I) -> Self
    where
        F: Fn(&WorkflowState) -> &'static str + Send + Sync + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            from: from.into(),
            candidates: candidates.into_iter().map(Into::into).collect(),
            router: Arc::new(router),
            bound: None,
        }
    }

    /// Name the state key that bounds any loop this edge closes (e.g. a
    /// revision counter the router checks). Loops without one are linted.
    pub fn bounded_by(mut self, key: impl Into<String>) -> Self {
        self.bound = Some(key.into());
        self
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn bound(&self) -> Option<&str> {
        self.bound.as_deref()
    }

    /// Pick the successor for `state`.
    pub fn resolve(&self, state: &WorkflowState) -> Result<&str, WorkflowError> {
        let choice = (self.router)(state);
        self.candidates
            .iter()
            .find(|c| c.as_str() == choice)
            .map(String::as_str)
            .ok_or_else(|| WorkflowError::Routing {
                node: self.from.clone(),
                returned: choice.to_string(),
                candidates: self.candidates.clone(),
            })
    }
}

impl std::fmt::Debug for ConditionalEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionalEdge")
            .field("from", &self.from)
            .field("candidates", &self.candidates)
            .field("bound", &self.bound)
            .finish_non_exhaustive()
    }
}
