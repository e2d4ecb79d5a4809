use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use scribe_core::config::FailurePolicy;
use scribe_core::error::ScribeError;
use scribe_engine::{
    ConditionalEdge, Executor, GraphSpec, Node, StateUpdate, WorkflowError, WorkflowState,
};

/// A node that sleeps, then writes `value` under its own name.
fn branch(name: &'static str, ms: u64) -> Node {
    Node::new(name, move |_: Arc<WorkflowState>| async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok::<_, ScribeError>(StateUpdate::new().set_str(name, format!("{}-out", name)))
    })
    .with_outputs([name])
}

fn failing(name: &'static str, ms: u64) -> Node {
    Node::new(name, move |_: Arc<WorkflowState>| async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Err::<StateUpdate, _>(ScribeError::Generation(format!("{} backend down", name)))
    })
    .with_outputs([name])
}

fn seed() -> Node {
    Node::new("start", |_: Arc<WorkflowState>| async {
        Ok::<_, ScribeError>(StateUpdate::new().set_str("seed", "s"))
    })
    .with_outputs(["seed"])
}

fn collect() -> Node {
    Node::new("collect", |s: Arc<WorkflowState>| async move {
        let joined = ["b1", "b2", "b3"]
            .iter()
            .map(|k| s.str_or_empty(k))
            .collect::<Vec<_>>()
            .join(",");
        Ok::<_, ScribeError>(StateUpdate::new().set_str("joined", joined))
    })
    .with_reads(["b1", "b2", "b3"])
    .with_outputs(["joined"])
}

/// start fans out to three branches that join into `collect`.
fn fan_out(b1: Node, b2: Node, b3: Node) -> GraphSpec {
    let mut spec = GraphSpec::new("fan_out");
    spec.add_node(seed())
        .add_node(b1)
        .add_node(b2)
        .add_node(b3)
        .add_node(collect())
        .add_edge("start", "b1")
        .add_edge("start", "b2")
        .add_edge("start", "b3")
        .add_join(["b1", "b2", "b3"], "collect")
        .set_start("start")
        .set_terminal("collect");
    spec
}

#[tokio::test]
async fn join_waits_for_every_branch() {
    let graph = fan_out(branch("b1", 30), branch("b2", 5), branch("b3", 15))
        .freeze()
        .unwrap();
    let out = Executor::new().run(&graph, WorkflowState::new()).await.unwrap();

    assert_eq!(out.state.get_str("joined"), Some("b1-out,b2-out,b3-out"));

    let join = out.trace.entry("collect", 1).unwrap();
    for b in ["b1", "b2", "b3"] {
        let entry = out.trace.entry(b, 1).unwrap();
        assert!(join.started_seq > entry.completed_seq, "{} finished after join started", b);
    }
    assert_eq!(out.trace.nodes().last(), Some(&"collect"));
}

#[tokio::test]
async fn concurrent_branches_merge_independently() {
    let graph = fan_out(branch("b1", 10), branch("b2", 10), branch("b3", 10))
        .freeze()
        .unwrap();
    let out = Executor::new()
        .run(&graph, WorkflowState::new().with("topic", json!("launch")))
        .await
        .unwrap();

    for b in ["b1", "b2", "b3"] {
        assert_eq!(out.state.get_str(b), Some(format!("{}-out", b).as_str()));
        assert_eq!(out.trace.entry(b, 1).unwrap().keys_written, vec![b]);
    }
    assert_eq!(out.state.get_str("topic"), Some("launch"));
    assert_eq!(out.state.get_str("seed"), Some("s"));
}

#[tokio::test]
async fn branch_failure_names_the_starved_join() {
    let graph = fan_out(branch("b1", 5), failing("b2", 5), branch("b3", 5))
        .freeze()
        .unwrap();
    let failure = Executor::new()
        .run(&graph, WorkflowState::new())
        .await
        .unwrap_err();

    assert_eq!(
        failure.error,
        WorkflowError::JoinNeverSatisfied {
            join: "collect".into(),
            failed: vec!["b2".into()],
        }
    );
    assert_eq!(failure.failed_nodes(), vec!["b2"]);
    assert!(failure.failures[0].message.contains("backend down"));
    assert!(failure.state.get("joined").is_none());
    assert_eq!(failure.state.get_str("seed"), Some("s"));
}

#[tokio::test]
async fn undeclared_write_in_a_branch_starves_the_join() {
    let rogue = Node::new("b3", |_: Arc<WorkflowState>| async {
        Ok::<_, ScribeError>(StateUpdate::new().set_str("b3", "ok").set_str("extra", "x"))
    })
    .with_outputs(["b3"]);
    let graph = fan_out(branch("b1", 5), branch("b2", 5), rogue)
        .freeze()
        .unwrap();
    let failure = Executor::new()
        .run(&graph, WorkflowState::new())
        .await
        .unwrap_err();

    assert_eq!(
        failure.error,
        WorkflowError::JoinNeverSatisfied {
            join: "collect".into(),
            failed: vec!["b3".into()],
        }
    );
    assert!(failure.state.get("extra").is_none());
    assert!(failure.state.get("joined").is_none());
}

#[tokio::test]
async fn fail_fast_stops_at_first_failure() {
    let graph = fan_out(failing("b1", 1), failing("b2", 30), branch("b3", 60))
        .freeze()
        .unwrap();
    let failure = Executor::new()
        .with_failure_policy(FailurePolicy::FailFast)
        .run(&graph, WorkflowState::new())
        .await
        .unwrap_err();

    assert_eq!(failure.failed_nodes(), vec!["b1"]);
    assert_eq!(failure.trace.count("b3"), 0);
}

#[tokio::test]
async fn drain_policy_collects_all_failures() {
    let graph = fan_out(failing("b1", 1), failing("b2", 20), branch("b3", 40))
        .freeze()
        .unwrap();
    let failure = Executor::new()
        .with_failure_policy(FailurePolicy::DrainInFlight)
        .run(&graph, WorkflowState::new())
        .await
        .unwrap_err();

    assert_eq!(failure.failed_nodes(), vec!["b1", "b2"]);
    assert_eq!(
        failure.error,
        WorkflowError::JoinNeverSatisfied {
            join: "collect".into(),
            failed: vec!["b1".into(), "b2".into()],
        }
    );
    // The surviving branch still merged
    assert_eq!(failure.trace.count("b3"), 1);
    assert_eq!(failure.state.get_str("b3"), Some("b3-out"));
    assert_eq!(failure.trace.count("collect"), 0);
}

#[tokio::test]
async fn routing_to_undeclared_candidate_keeps_merged_state() {
    let mut spec = GraphSpec::new("review");
    spec.add_node(
        Node::new("review", |_: Arc<WorkflowState>| async {
            Ok::<_, ScribeError>(StateUpdate::new().set_str("report", "needs work"))
        })
        .with_outputs(["report"]),
    )
    .add_node(branch("publish", 1))
    .add_conditional_edge(ConditionalEdge::new(
        "review",
        |_: &WorkflowState| "archive",
        ["publish"],
    ))
    .set_start("review")
    .set_terminal("publish");
    let graph = spec.freeze().unwrap();

    let failure = Executor::new()
        .run(&graph, WorkflowState::new())
        .await
        .unwrap_err();
    assert_eq!(
        failure.error,
        WorkflowError::Routing {
            node: "review".into(),
            returned: "archive".into(),
            candidates: vec!["publish".into()],
        }
    );
    assert_eq!(failure.state.get_str("report"), Some("needs work"));
    assert_eq!(failure.trace.nodes(), vec!["review"]);
}

#[tokio::test]
async fn terminal_completion_abandons_other_branches() {
    let mut spec = GraphSpec::new("race");
    spec.add_node(seed())
        .add_node(branch("fast", 1))
        .add_node(branch("slow", 5_000))
        .add_edge("start", "fast")
        .add_edge("start", "slow")
        .set_start("start")
        .set_terminal("fast");
    let graph = spec.freeze().unwrap();

    let out = tokio::time::timeout(
        Duration::from_secs(2),
        Executor::new().run(&graph, WorkflowState::new()),
    )
    .await
    .expect("run should end when the terminal completes")
    .unwrap();

    assert_eq!(out.state.get_str("fast"), Some("fast-out"));
    assert!(out.state.get("slow").is_none());
    assert_eq!(out.trace.count("slow"), 0);
}

#[tokio::test]
async fn revisited_fan_out_rearms_the_join() {
    let mut spec = GraphSpec::new("rounds");
    spec.add_node(
        Node::new("fan", |s: Arc<WorkflowState>| async move {
            let round = s.get_u64("round").unwrap_or(0) + 1;
            Ok::<_, ScribeError>(StateUpdate::new().set("round", json!(round)))
        })
        .with_outputs(["round"]),
    );
    for (name, ms) in [("a", 1u64), ("b", 15)] {
        spec.add_node(
            Node::new(name, move |s: Arc<WorkflowState>| async move {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                let round = s.get_u64("round").unwrap_or(0);
                Ok::<_, ScribeError>(StateUpdate::new().set_str(name, format!("{}{}", name, round)))
            })
            .with_outputs([name]),
        )
        .add_edge("fan", name);
    }
    spec.add_node(
        Node::new("merge", |s: Arc<WorkflowState>| async move {
            let merged = format!("{}|{}", s.str_or_empty("a"), s.str_or_empty("b"));
            Ok::<_, ScribeError>(StateUpdate::new().set_str("merged", merged))
        })
        .with_outputs(["merged"]),
    )
    .add_node(branch("done", 1))
    .add_join(["a", "b"], "merge")
    .add_conditional_edge(
        ConditionalEdge::new(
            "merge",
            |s: &WorkflowState| {
                if s.get_u64("round").unwrap_or(0) < 2 {
                    "fan"
                } else {
                    "done"
                }
            },
            ["fan", "done"],
        )
        .bounded_by("round"),
    )
    .set_start("fan")
    .set_terminal("done");
    let graph = spec.freeze().unwrap();
    assert!(graph.lints().is_empty());

    let out = Executor::new().run(&graph, WorkflowState::new()).await.unwrap();
    assert_eq!(out.trace.count("fan"), 2);
    assert_eq!(out.trace.count("merge"), 2);
    assert_eq!(out.state.get_str("merged"), Some("a2|b2"));

    // Second merge only after both second-round branches
    let merge2 = out.trace.entry("merge", 2).unwrap();
    assert!(merge2.started_seq > out.trace.entry("a", 2).unwrap().completed_seq);
    assert!(merge2.started_seq > out.trace.entry("b", 2).unwrap().completed_seq);
}
