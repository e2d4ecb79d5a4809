//! Workflow engine: a concurrent graph executor over a shared key/value
//! state, and a bounded generate → evaluate → optimize refinement loop.

pub mod error;
pub mod graph;
pub mod refinement;

pub use error::{BranchFailure, GraphDefinitionError, RunFailure, WorkflowError};
pub use graph::{
    ConditionalEdge, Executor, FrozenGraph, GraphSpec, Node, RunOutput, RunTrace, StateUpdate,
    TraceEntry, WorkflowState,
};
pub use refinement::{
    FeedbackEntry, IterationRecord, OptimizeRequest, RefinementController, RefinementOutcome,
    RefinementStrategy, StopReason, Verdict,
};
