//! Bounded generate → evaluate → optimize loop.
//!
//! Refinement is a plain loop with an explicit round counter, not a graph
//! cycle: it always ends after at most `max_rounds` rounds.

mod controller;
mod verdict;

pub use controller::{
    FeedbackEntry, IterationRecord, OptimizeRequest, RefinementController, RefinementOutcome,
    RefinementStrategy, StopReason,
};
pub use verdict::Verdict;
