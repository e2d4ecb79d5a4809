//! Graph execution engine: concurrent workflow orchestration.
//!
//! A workflow is a `GraphSpec` of `Node`s connected by unconditional edges,
//! dependency sets, join barriers and conditional routing. `freeze()`
//! validates it into an immutable `FrozenGraph` that can be shared across
//! runs.
//!
//! The `Executor` drives a `FrozenGraph` from its start node: every node
//! whose dependencies are satisfied runs concurrently against a snapshot of
//! the `WorkflowState`, and its `StateUpdate` is merged per key once it
//! completes. The run ends when the terminal node completes.

pub mod edge;
pub mod executor;
pub mod node;
pub mod spec;
pub mod state;

pub use edge::{ConditionalEdge, Edge};
pub use executor::{Executor, RunOutput, RunTrace, TraceEntry};
pub use node::{Node, NodeHandler};
pub use spec::{FrozenGraph, GraphSpec};
pub use state::{StateUpdate, WorkflowState};
