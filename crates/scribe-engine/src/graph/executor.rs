use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use scribe_core::config::{EngineConfig, FailurePolicy};
use scribe_core::event::EventBus;
use scribe_core::types::{RunId, WorkflowEvent};

use crate::error::{BranchFailure, RunFailure, WorkflowError};

use super::node::Node;
use super::spec::FrozenGraph;
use super::state::{StateUpdate, WorkflowState};

/// One completed node invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEntry {
    pub node: String,
    /// 1-based count of dispatches of this node within the run.
    pub invocation: u32,
    /// Logical clock value when the invocation was dispatched.
    pub started_seq: u64,
    /// Logical clock value when its output was merged.
    pub completed_seq: u64,
    pub elapsed_ms: u64,
    pub keys_written: Vec<String>,
}

/// Completed invocations of a run, in completion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RunTrace {
    entries: Vec<TraceEntry>,
}

impl RunTrace {
    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    /// Node names in completion order (repeats for revisited nodes).
    pub fn nodes(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.node.as_str()).collect()
    }

    pub fn entry(&self, node: &str, invocation: u32) -> Option<&TraceEntry> {
        self.entries
            .iter()
            .find(|e| e.node == node && e.invocation == invocation)
    }

    /// Number of completed invocations of `node`.
    pub fn count(&self, node: &str) -> usize {
        self.entries.iter().filter(|e| e.node == node).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub run_id: RunId,
    pub state: WorkflowState,
    pub trace: RunTrace,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Runs frozen graphs.
///
/// The executor is stateless between runs: everything a run needs lives in
/// the coordinator loop of `run_with_cancel`. Node bodies run as tokio tasks
/// against an `Arc` snapshot of the state; only the coordinator merges, so
/// no lock is ever held across a node's await points.
#[derive(Clone, Default)]
pub struct Executor {
    max_concurrency: Option<usize>,
    failure_policy: FailurePolicy,
    events: Option<Arc<EventBus>>,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        let mut executor = Self::new().with_failure_policy(config.failure_policy);
        if let Some(limit) = config.max_concurrency {
            executor = executor.with_max_concurrency(limit);
        }
        executor
    }

    /// Cap the number of concurrently running nodes (minimum 1).
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit.max(1));
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub async fn run(
        &self,
        graph: &FrozenGraph,
        initial: WorkflowState,
    ) -> Result<RunOutput, RunFailure> {
        self.run_with_cancel(graph, initial, CancellationToken::new())
            .await
    }

    /// Run `graph` until its terminal node completes, a node fails, or
    /// `cancel` fires.
    pub async fn run_with_cancel(
        &self,
        graph: &FrozenGraph,
        initial: WorkflowState,
        cancel: CancellationToken,
    ) -> Result<RunOutput, RunFailure> {
        let run_id = RunId::new();
        let started_at = Utc::now();
        let started = Instant::now();
        info!(run_id = %run_id, graph = %graph.name(), "Workflow run started");
        self.publish(WorkflowEvent::RunStarted {
            run_id: run_id.clone(),
            workflow: graph.name().to_string(),
        });

        let mut run = RunState::new(graph, initial);
        let mut tasks: JoinSet<TaskOutcome> = JoinSet::new();
        run.trigger(graph.start());

        let result = loop {
            if run.first_error.is_none() {
                self.dispatch_ready(&mut run, &mut tasks, &run_id);
            }

            if tasks.is_empty() {
                break match run.first_error.take() {
                    Some(error) => Err(error),
                    None => Err(WorkflowError::TerminalNotReached {
                        pending: run.pending.iter().cloned().collect(),
                    }),
                };
            }

            let joined = tokio::select! {
                _ = cancel.cancelled() => {
                    tasks.shutdown().await;
                    break Err(WorkflowError::Cancelled);
                }
                joined = tasks.join_next() => joined,
            };

            let outcome = match joined {
                Some(Ok(outcome)) => outcome,
                Some(Err(join_err)) => {
                    // Node panics are caught inside the task; this is an abort
                    error!(error = %join_err, "Node task ended abnormally");
                    continue;
                }
                None => continue,
            };

            match self.settle(&mut run, outcome, &run_id) {
                Settled::Continue => {}
                Settled::Terminal => {
                    tasks.abort_all();
                    break Ok(());
                }
                Settled::Failed(error) => {
                    if self.failure_policy == FailurePolicy::FailFast {
                        tasks.abort_all();
                        break Err(error);
                    }
                    // Drain: stop dispatching and keep collecting failures
                    if run.first_error.is_none() {
                        run.first_error = Some(error);
                    }
                }
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        self.publish(WorkflowEvent::RunFinished {
            run_id: run_id.clone(),
            succeeded: result.is_ok(),
            elapsed_ms,
        });

        match result {
            Ok(()) => {
                info!(
                    run_id = %run_id,
                    graph = %graph.name(),
                    nodes = run.trace.len(),
                    elapsed_ms,
                    "Workflow run complete"
                );
                Ok(RunOutput {
                    run_id,
                    state: run.state,
                    trace: run.trace,
                    started_at,
                    elapsed_ms,
                })
            }
            Err(error) => {
                let error = classify(graph, error, &run.failures);
                warn!(run_id = %run_id, graph = %graph.name(), error = %error, "Workflow run failed");
                Err(RunFailure {
                    error,
                    failures: run.failures,
                    state: run.state,
                    trace: run.trace,
                })
            }
        }
    }

    fn dispatch_ready(
        &self,
        run: &mut RunState<'_>,
        tasks: &mut JoinSet<TaskOutcome>,
        run_id: &RunId,
    ) {
        let capacity = match self.max_concurrency {
            Some(limit) => limit.saturating_sub(run.in_flight.len()),
            None => usize::MAX,
        };

        for name in run.take_ready(capacity) {
            let Some(node) = run.graph.node(&name).cloned() else {
                continue;
            };
            let invocation = run.mark_dispatched(&name);
            run.clock += 1;
            let started_seq = run.clock;
            let snapshot = Arc::new(run.state.clone());

            debug!(node = %name, invocation, started_seq, "Dispatching node");
            self.publish(WorkflowEvent::NodeStarted {
                run_id: run_id.clone(),
                node: name.clone(),
                invocation,
            });

            tasks.spawn(run_node(node, invocation, started_seq, snapshot));
        }
    }

    /// Fold a finished task into the run.
    fn settle(&self, run: &mut RunState<'_>, outcome: TaskOutcome, run_id: &RunId) -> Settled {
        let TaskOutcome {
            node,
            invocation,
            started_seq,
            elapsed_ms,
            result,
        } = outcome;
        run.in_flight.remove(node.name());
        let name = node.name().to_string();

        let update = match result {
            Ok(update) => match node.undeclared_key(&update) {
                None => update,
                Some(key) => {
                    let error = WorkflowError::UndeclaredOutput {
                        node: name.clone(),
                        key: key.to_string(),
                    };
                    return self.fail(run, &name, invocation, error, run_id);
                }
            },
            Err(message) => {
                let error = WorkflowError::NodeExecution {
                    node: name.clone(),
                    invocation,
                    message,
                };
                return self.fail(run, &name, invocation, error, run_id);
            }
        };

        run.clock += 1;
        let keys_written = run.state.apply(update);
        *run.completions.entry(name.clone()).or_default() += 1;
        debug!(node = %name, invocation, keys = ?keys_written, "Merged node output");
        run.trace.entries.push(TraceEntry {
            node: name.clone(),
            invocation,
            started_seq,
            completed_seq: run.clock,
            elapsed_ms,
            keys_written,
        });
        self.publish(WorkflowEvent::NodeCompleted {
            run_id: run_id.clone(),
            node: name.clone(),
            invocation,
            elapsed_ms,
        });

        if run.first_error.is_some() {
            // Draining after a failure: record, but start nothing new
            return Settled::Continue;
        }
        if name == run.graph.terminal() {
            return Settled::Terminal;
        }

        let graph = run.graph;
        for next in graph.triggered_by(&name) {
            run.trigger(next);
        }
        if let Some(edge) = graph.conditional_from(&name) {
            match edge.resolve(&run.state) {
                Ok(next) => {
                    debug!(from = %name, to = %next, "Conditional edge resolved");
                    run.trigger(next);
                }
                Err(error) => return Settled::Failed(error),
            }
        }
        Settled::Continue
    }

    fn fail(
        &self,
        run: &mut RunState<'_>,
        name: &str,
        invocation: u32,
        error: WorkflowError,
        run_id: &RunId,
    ) -> Settled {
        warn!(node = %name, invocation, error = %error, "Node failed");
        self.publish(WorkflowEvent::NodeFailed {
            run_id: run_id.clone(),
            node: name.to_string(),
            invocation,
            error: error.to_string(),
        });
        let message = match &error {
            WorkflowError::NodeExecution { message, .. } => message.clone(),
            other => other.to_string(),
        };
        run.failures.push(BranchFailure {
            node: name.to_string(),
            invocation,
            message,
        });
        Settled::Failed(error)
    }

    fn publish(&self, event: WorkflowEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

/// A node failure that starves a join is reported as the join's failure,
/// naming every failed predecessor of that join.
fn classify(
    graph: &FrozenGraph,
    error: WorkflowError,
    failures: &[BranchFailure],
) -> WorkflowError {
    let node = match &error {
        WorkflowError::NodeExecution { node, .. } | WorkflowError::UndeclaredOutput { node, .. } => {
            node
        }
        _ => return error,
    };
    let Some(join) = graph.joins_fed_by(node).next() else {
        return error;
    };
    let preds = graph.join_predecessors(join).unwrap_or_default();
    let mut failed: Vec<String> = failures
        .iter()
        .filter(|f| preds.contains(&f.node))
        .map(|f| f.node.clone())
        .collect();
    failed.sort();
    failed.dedup();
    WorkflowError::JoinNeverSatisfied {
        join: join.to_string(),
        failed,
    }
}

enum Settled {
    Continue,
    Terminal,
    Failed(WorkflowError),
}

/// Bookkeeping for one run. Owned by the coordinator loop only.
struct RunState<'g> {
    graph: &'g FrozenGraph,
    state: WorkflowState,
    trace: RunTrace,
    /// Triggered nodes waiting to become ready, in trigger order.
    pending: VecDeque<String>,
    in_flight: HashSet<String>,
    /// Successful completions per node.
    completions: HashMap<String, u32>,
    /// Dispatches per node.
    invocations: HashMap<String, u32>,
    /// For each join: predecessor completion counts at its last dispatch.
    consumed: HashMap<String, HashMap<String, u32>>,
    failures: Vec<BranchFailure>,
    first_error: Option<WorkflowError>,
    clock: u64,
}

impl<'g> RunState<'g> {
    fn new(graph: &'g FrozenGraph, state: WorkflowState) -> Self {
        Self {
            graph,
            state,
            trace: RunTrace::default(),
            pending: VecDeque::new(),
            in_flight: HashSet::new(),
            completions: HashMap::new(),
            invocations: HashMap::new(),
            consumed: HashMap::new(),
            failures: vec![],
            first_error: None,
            clock: 0,
        }
    }

    /// Enqueue a node; repeated triggers of a pending node coalesce.
    fn trigger(&mut self, name: &str) {
        if !self.pending.iter().any(|p| p == name) {
            self.pending.push_back(name.to_string());
        }
    }

    fn completed(&self, name: &str) -> u32 {
        self.completions.get(name).copied().unwrap_or(0)
    }

    fn is_ready(&self, name: &str) -> bool {
        if self.in_flight.contains(name) {
            return false;
        }
        let Some(node) = self.graph.node(name) else {
            return false;
        };
        if node.deps().iter().any(|d| self.completed(d) == 0) {
            return false;
        }
        match self.graph.join_predecessors(name) {
            Some(preds) => {
                let consumed = self.consumed.get(name);
                preds.iter().all(|p| {
                    let seen = consumed.and_then(|c| c.get(p)).copied().unwrap_or(0);
                    self.completed(p) > seen
                })
            }
            None => true,
        }
    }

    /// Remove up to `capacity` ready nodes from the pending queue.
    fn take_ready(&mut self, capacity: usize) -> Vec<String> {
        let mut ready = Vec::new();
        let mut i = 0;
        while i < self.pending.len() && ready.len() < capacity {
            if self.is_ready(&self.pending[i]) {
                if let Some(name) = self.pending.remove(i) {
                    // One invocation per node at a time
                    self.in_flight.insert(name.clone());
                    ready.push(name);
                }
            } else {
                i += 1;
            }
        }
        ready
    }

    /// Record a dispatch; returns the invocation number.
    fn mark_dispatched(&mut self, name: &str) -> u32 {
        if let Some(preds) = self.graph.join_predecessors(name) {
            let snapshot: HashMap<String, u32> = preds
                .iter()
                .map(|p| (p.clone(), self.completed(p)))
                .collect();
            self.consumed.insert(name.to_string(), snapshot);
        }
        let count = self.invocations.entry(name.to_string()).or_default();
        *count += 1;
        *count
    }
}

struct TaskOutcome {
    node: Arc<Node>,
    invocation: u32,
    started_seq: u64,
    elapsed_ms: u64,
    result: Result<StateUpdate, String>,
}

async fn run_node(
    node: Arc<Node>,
    invocation: u32,
    started_seq: u64,
    snapshot: Arc<WorkflowState>,
) -> TaskOutcome {
    let start = Instant::now();
    let body = node.clone();
    let result = AssertUnwindSafe(async move { body.invoke(snapshot).await })
        .catch_unwind()
        .await;

    let result = match result {
        Ok(Ok(update)) => Ok(update),
        Ok(Err(e)) => Err(e.to_string()),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "node panicked".to_string());
            error!(node = %node.name(), invocation, panic = %message, "Node panicked");
            Err(format!("panic: {}", message))
        }
    };

    TaskOutcome {
        node,
        invocation,
        started_seq,
        elapsed_ms: start.elapsed().as_millis() as u64,
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ConditionalEdge, GraphSpec};
    use scribe_core::error::{Result, ScribeError};
    use serde_json::json;
    use futures::future::BoxFuture;
    use std::time::Duration;

    type Ready = std::future::Ready<Result<StateUpdate>>;

    fn writes(
        key: &'static str,
        value: &'static str,
    ) -> impl Fn(Arc<WorkflowState>) -> Ready + Send + Sync + 'static {
        move |_| std::future::ready(Ok(StateUpdate::new().set_str(key, value)))
    }

    fn sleepy(
        key: &'static str,
        ms: u64,
    ) -> impl Fn(Arc<WorkflowState>) -> BoxFuture<'static, Result<StateUpdate>> + Send + Sync + 'static
    {
        move |_| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok::<_, ScribeError>(StateUpdate::new().set_str(key, "done"))
            })
        }
    }

    #[tokio::test]
    async fn test_linear_run_merges_in_order() {
        let mut spec = GraphSpec::new("linear");
        spec.add_node(Node::new("plan", writes("plan", "p")).with_outputs(["plan"]))
            .add_node(
                Node::new("draft", |s: Arc<WorkflowState>| async move {
                    let plan = s.str_or_empty("plan").to_string();
                    Ok::<_, ScribeError>(StateUpdate::new().set_str("draft", format!("{}+draft", plan)))
                })
                .with_outputs(["draft"]),
            )
            .add_edge("plan", "draft")
            .set_start("plan")
            .set_terminal("draft");
        let graph = spec.freeze().unwrap();

        let out = Executor::new()
            .run(&graph, WorkflowState::new().with("topic", json!("X")))
            .await
            .unwrap();
        assert_eq!(out.state.get_str("draft"), Some("p+draft"));
        assert_eq!(out.state.get_str("topic"), Some("X"));
        assert_eq!(out.trace.nodes(), vec!["plan", "draft"]);
        assert_eq!(out.trace.entries()[1].keys_written, vec!["draft"]);
    }

    #[tokio::test]
    async fn test_undeclared_output_fails_run() {
        let mut spec = GraphSpec::new("g");
        spec.add_node(Node::new("a", writes("sneaky", "x")).with_outputs(["allowed"]))
            .set_start("a")
            .set_terminal("a");
        let graph = spec.freeze().unwrap();

        let failure = Executor::new()
            .run(&graph, WorkflowState::new())
            .await
            .unwrap_err();
        assert_eq!(
            failure.error,
            WorkflowError::UndeclaredOutput {
                node: "a".into(),
                key: "sneaky".into()
            }
        );
        assert!(failure.state.get("sneaky").is_none());
    }

    #[tokio::test]
    async fn test_node_error_is_node_execution() {
        let mut spec = GraphSpec::new("g");
        spec.add_node(Node::new("a", |_: Arc<WorkflowState>| async {
            Err::<StateUpdate, _>(ScribeError::Generation("HTTP 503: busy".into()))
        }))
        .set_start("a")
        .set_terminal("a");
        let graph = spec.freeze().unwrap();

        let failure = Executor::new()
            .run(&graph, WorkflowState::new())
            .await
            .unwrap_err();
        match failure.error {
            WorkflowError::NodeExecution {
                node,
                invocation,
                message,
            } => {
                assert_eq!(node, "a");
                assert_eq!(invocation, 1);
                assert!(message.contains("503"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_panicking_node_is_reported() {
        let mut spec = GraphSpec::new("g");
        spec.add_node(Node::new("boom", |_: Arc<WorkflowState>| async {
            if true {
                panic!("kaboom");
            }
            Ok::<_, ScribeError>(StateUpdate::new())
        }))
        .set_start("boom")
        .set_terminal("boom");
        let graph = spec.freeze().unwrap();

        let failure = Executor::new()
            .run(&graph, WorkflowState::new())
            .await
            .unwrap_err();
        assert_eq!(failure.failed_nodes(), vec!["boom"]);
        assert!(failure.failures[0].message.contains("kaboom"));
    }

    #[tokio::test]
    async fn test_stalled_run_reports_terminal_not_reached() {
        // "end" depends on "never", which nothing triggers
        let mut spec = GraphSpec::new("g");
        spec.add_node(Node::new("start", writes("a", "1")).with_outputs(["a"]))
            .add_node(Node::new("never", writes("b", "1")).with_outputs(["b"]))
            .add_node(Node::new("end", writes("c", "1")).with_deps(["never"]).with_outputs(["c"]))
            .add_edge("start", "end")
            .set_start("start")
            .set_terminal("end");
        let graph = spec.freeze().unwrap();

        let failure = Executor::new()
            .run(&graph, WorkflowState::new())
            .await
            .unwrap_err();
        assert_eq!(
            failure.error,
            WorkflowError::TerminalNotReached {
                pending: vec!["end".into()]
            }
        );
        assert_eq!(failure.state.get_str("a"), Some("1"));
    }

    #[tokio::test]
    async fn test_concurrency_limit_serializes_branches() {
        let mut spec = GraphSpec::new("fan");
        spec.add_node(Node::new("start", writes("seed", "1")).with_outputs(["seed"]));
        for name in ["b1", "b2", "b3"] {
            spec.add_node(Node::new(name, sleepy(name, 10)).with_outputs([name]))
                .add_edge("start", name);
        }
        spec.add_node(Node::new("join", writes("done", "1")).with_outputs(["done"]))
            .add_join(["b1", "b2", "b3"], "join")
            .set_start("start")
            .set_terminal("join");
        let graph = spec.freeze().unwrap();

        let out = Executor::new()
            .with_max_concurrency(1)
            .run(&graph, WorkflowState::new())
            .await
            .unwrap();

        // With one slot, each branch starts after the previous one merged
        let entries = out.trace.entries();
        for pair in entries.windows(2) {
            assert!(pair[1].started_seq > pair[0].completed_seq);
        }
        assert_eq!(out.trace.nodes(), vec!["start", "b1", "b2", "b3", "join"]);
    }

    #[tokio::test]
    async fn test_cancellation() {
        let mut spec = GraphSpec::new("g");
        spec.add_node(Node::new("slow", sleepy("slow", 5_000)).with_outputs(["slow"]))
            .set_start("slow")
            .set_terminal("slow");
        let graph = spec.freeze().unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let failure = Executor::new()
            .run_with_cancel(&graph, WorkflowState::new(), cancel)
            .await
            .unwrap_err();
        assert_eq!(failure.error, WorkflowError::Cancelled);
        assert!(failure.trace.is_empty());
    }

    #[tokio::test]
    async fn test_back_edge_revisits_as_fresh_invocation() {
        let mut spec = GraphSpec::new("loop");
        spec.add_node(
            Node::new("work", |s: Arc<WorkflowState>| async move {
                let n = s.get_u64("count").unwrap_or(0);
                Ok::<_, ScribeError>(StateUpdate::new().set("count", json!(n + 1)))
            })
            .with_outputs(["count"]),
        )
        .add_node(Node::new("finish", writes("result", "ok")).with_outputs(["result"]))
        .add_conditional_edge(
            ConditionalEdge::new(
                "work",
                |s: &WorkflowState| {
                    if s.get_u64("count").unwrap_or(0) < 3 {
                        "work"
                    } else {
                        "finish"
                    }
                },
                ["work", "finish"],
            )
            .bounded_by("count"),
        )
        .set_start("work")
        .set_terminal("finish");
        let graph = spec.freeze().unwrap();

        let out = Executor::new().run(&graph, WorkflowState::new()).await.unwrap();
        assert_eq!(out.state.get_u64("count"), Some(3));
        assert_eq!(out.trace.count("work"), 3);
        assert_eq!(out.trace.entry("work", 3).map(|e| e.invocation), Some(3));
        assert_eq!(out.trace.nodes().last(), Some(&"finish"));
    }

    #[tokio::test]
    async fn test_events_published() {
        let bus = Arc::new(EventBus::new(32));
        let mut rx = bus.subscribe();

        let mut spec = GraphSpec::new("evented");
        spec.add_node(Node::new("only", writes("k", "v")).with_outputs(["k"]))
            .set_start("only")
            .set_terminal("only");
        let graph = spec.freeze().unwrap();

        Executor::new()
            .with_events(bus.clone())
            .run(&graph, WorkflowState::new())
            .await
            .unwrap();

        let mut kinds = vec![];
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event {
                WorkflowEvent::RunStarted { .. } => "run_started",
                WorkflowEvent::NodeStarted { .. } => "node_started",
                WorkflowEvent::NodeCompleted { .. } => "node_completed",
                WorkflowEvent::NodeFailed { .. } => "node_failed",
                WorkflowEvent::RoundCompleted { .. } => "round",
                WorkflowEvent::RunFinished { succeeded, .. } => {
                    assert!(succeeded);
                    "run_finished"
                }
            });
        }
        assert_eq!(
            kinds,
            vec!["run_started", "node_started", "node_completed", "run_finished"]
        );
    }
}
