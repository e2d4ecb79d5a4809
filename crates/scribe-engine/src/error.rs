use serde::Serialize;
use thiserror::Error;

use crate::graph::{RunTrace, WorkflowState};

/// Defects in a graph definition, reported by `GraphSpec::freeze`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphDefinitionError {
    #[error("Duplicate node: {0}")]
    DuplicateNode(String),

    #[error("Unknown node '{name}' referenced by {referenced_by}")]
    UnknownNode { referenced_by: String, name: String },

    #[error("Conditional edge from '{0}' declares no candidates")]
    EmptyCandidates(String),

    #[error("Node '{0}' has more than one conditional edge")]
    DuplicateConditionalEdge(String),

    #[error("Join '{0}' declares no predecessors")]
    EmptyJoin(String),

    #[error("Node '{0}' is declared as a join more than once")]
    DuplicateJoin(String),

    #[error("Graph has no start node")]
    MissingStart,

    #[error("Graph has no terminal node")]
    MissingTerminal,

    #[error("Terminal '{terminal}' is not reachable from start '{start}'")]
    TerminalUnreachable { start: String, terminal: String },

    #[error("Cycle without a conditional edge: {}", .0.join(" -> "))]
    UnconditionalCycle(Vec<String>),
}

/// Run-time failures of a single workflow run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("Routing from '{node}' returned '{returned}', expected one of [{}]", .candidates.join(", "))]
    Routing {
        node: String,
        returned: String,
        candidates: Vec<String>,
    },

    #[error("Node '{node}' (invocation {invocation}) failed: {message}")]
    NodeExecution {
        node: String,
        invocation: u32,
        message: String,
    },

    #[error("Node '{node}' wrote undeclared key '{key}'")]
    UndeclaredOutput { node: String, key: String },

    #[error("Join '{join}' can never run: predecessor(s) failed: {}", .failed.join(", "))]
    JoinNeverSatisfied { join: String, failed: Vec<String> },

    #[error("Run stalled before reaching the terminal node (pending: [{}])", .pending.join(", "))]
    TerminalNotReached { pending: Vec<String> },

    #[error("Run cancelled")]
    Cancelled,
}

/// One failed node invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchFailure {
    pub node: String,
    pub invocation: u32,
    pub message: String,
}

/// A failed run.
///
/// `state` is the last consistently merged state and `trace` covers every
/// invocation that completed. Both are diagnostics only.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct RunFailure {
    #[source]
    pub error: WorkflowError,
    pub failures: Vec<BranchFailure>,
    pub state: WorkflowState,
    pub trace: RunTrace,
}

impl RunFailure {
    /// Names of the nodes that failed, in the order they failed.
    pub fn failed_nodes(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.node.as_str()).collect()
    }
}
