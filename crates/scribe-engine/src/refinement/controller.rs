use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Serialize;
use tracing::{debug, info, warn};

use scribe_core::config::RefinementConfig;
use scribe_core::error::{Result, ScribeError};
use scribe_core::event::EventBus;
use scribe_core::types::{FeedbackItem, RunId, StructuredOutput, WorkflowEvent};

use super::verdict::Verdict;

/// Everything the optimize step gets to work with.
#[derive(Debug, Clone, Copy)]
pub struct OptimizeRequest<'a> {
    pub round: u32,
    /// This round's generated artifact.
    pub latest: &'a str,
    pub verdict: &'a Verdict,
    /// Human feedback selected for this round.
    pub feedback: &'a [FeedbackItem],
    /// Best artifact from earlier rounds.
    pub previous_best: Option<&'a str>,
}

/// Domain half of a refinement loop: how to generate, evaluate and optimize
/// one kind of artifact. The controller owns the loop and all defaulting.
pub trait RefinementStrategy: Send + Sync {
    type Input: Send + Sync;

    /// Produce a candidate. `previous` is the best artifact so far (none on
    /// round 1).
    fn generate<'a>(
        &'a self,
        input: &'a Self::Input,
        round: u32,
        previous: Option<&'a str>,
    ) -> BoxFuture<'a, Result<String>>;

    /// Judge a candidate. Output that isn't a usable verdict object is fine;
    /// the controller substitutes a default.
    fn evaluate<'a>(
        &'a self,
        input: &'a Self::Input,
        round: u32,
        artifact: &'a str,
    ) -> BoxFuture<'a, Result<StructuredOutput>>;

    fn optimize<'a>(
        &'a self,
        input: &'a Self::Input,
        request: OptimizeRequest<'a>,
    ) -> BoxFuture<'a, Result<String>>;
}

/// One completed round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationRecord {
    pub round: u32,
    pub generated: String,
    pub verdict: Verdict,
    pub feedback: Vec<FeedbackItem>,
    /// Artifact carried into the next round. Equal to `generated` when the
    /// optimizer failed or returned nothing.
    pub optimized: String,
    pub optimizer_fallback: bool,
}

/// One message in the combined evaluator/human feedback thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackEntry {
    /// `"evaluator"` or `"human:<author>"`.
    pub source: String,
    pub round: u32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    Approved { round: u32 },
    RoundCap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefinementOutcome {
    /// Tags this run's `RoundCompleted` events.
    pub run_id: RunId,
    pub final_artifact: String,
    pub iterations: Vec<IterationRecord>,
    pub feedback_thread: Vec<FeedbackEntry>,
    pub stop_reason: StopReason,
}

/// Drives a `RefinementStrategy` for a bounded number of rounds.
#[derive(Clone)]
pub struct RefinementController {
    approval_threshold: u8,
    events: Option<Arc<EventBus>>,
}

impl RefinementController {
    pub fn new(approval_threshold: u8) -> Self {
        Self {
            approval_threshold,
            events: None,
        }
    }

    pub fn from_config(config: &RefinementConfig) -> Self {
        Self::new(config.approval_threshold)
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn approval_threshold(&self) -> u8 {
        self.approval_threshold
    }

    /// Run up to `max_rounds` rounds, stopping early at the first round whose
    /// verdict is approving with a score at or above the threshold.
    ///
    /// Evaluate and optimize failures are absorbed per round. A generate
    /// failure ends the run, since the round has nothing to work on.
    pub async fn run<S: RefinementStrategy>(
        &self,
        strategy: &S,
        input: &S::Input,
        max_rounds: u32,
        feedback: &[FeedbackItem],
    ) -> Result<RefinementOutcome> {
        if max_rounds == 0 {
            return Err(ScribeError::InvalidInput(
                "max_rounds must be at least 1".to_string(),
            ));
        }

        let run_id = RunId::new();
        debug!(run_id = %run_id, max_rounds, "Refinement started");
        let mut iterations: Vec<IterationRecord> = Vec::new();
        let mut thread = Vec::new();
        let mut best: Option<String> = None;
        let mut stop_reason = StopReason::RoundCap;

        for round in 1..=max_rounds {
            let generated = strategy.generate(input, round, best.as_deref()).await?;
            if generated.trim().is_empty() {
                return Err(ScribeError::Generation(format!(
                    "generator returned empty output in round {}",
                    round
                )));
            }

            let verdict = match strategy.evaluate(input, round, &generated).await {
                Ok(output) => Verdict::from_output(&output),
                Err(e) => {
                    warn!(round, error = %e, "Evaluation failed, using default verdict");
                    Verdict::fallback(e.to_string())
                }
            };
            if verdict.malformed {
                debug!(round, "Evaluator output unparseable, using default verdict");
            }

            let selected: Vec<FeedbackItem> = feedback
                .iter()
                .filter(|f| f.applies_to(round))
                .cloned()
                .collect();

            let request = OptimizeRequest {
                round,
                latest: &generated,
                verdict: &verdict,
                feedback: &selected,
                previous_best: best.as_deref(),
            };
            let (optimized, optimizer_fallback) = match strategy.optimize(input, request).await {
                Ok(text) if !text.trim().is_empty() => (text, false),
                Ok(_) => {
                    debug!(round, "Optimizer returned nothing, keeping generated artifact");
                    (generated.clone(), true)
                }
                Err(e) => {
                    warn!(round, error = %e, "Optimization failed, keeping generated artifact");
                    (generated.clone(), true)
                }
            };

            thread.push(FeedbackEntry {
                source: "evaluator".to_string(),
                round,
                message: verdict.observations.clone(),
                score: Some(verdict.score),
            });
            thread.extend(selected.iter().map(|f| FeedbackEntry {
                source: format!("human:{}", f.author),
                round,
                message: f.message.clone(),
                score: None,
            }));

            let passed = verdict.passes(self.approval_threshold);
            info!(
                round,
                score = verdict.score,
                verdict = %verdict.label,
                approved = passed,
                "Refinement round complete"
            );
            if let Some(events) = &self.events {
                events.publish(WorkflowEvent::RoundCompleted {
                    run_id: run_id.clone(),
                    round,
                    score: verdict.score,
                    approved: passed,
                });
            }

            best = Some(optimized.clone());
            iterations.push(IterationRecord {
                round,
                generated,
                verdict,
                feedback: selected,
                optimized,
                optimizer_fallback,
            });

            if passed {
                stop_reason = StopReason::Approved { round };
                break;
            }
        }

        let final_artifact = best.unwrap_or_default();
        Ok(RefinementOutcome {
            run_id,
            final_artifact,
            iterations,
            feedback_thread: thread,
            stop_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Strategy with canned evaluator replies. Generates "draft-N" and
    /// optimizes to "post-N" unless told otherwise.
    struct Canned {
        evaluations: Mutex<VecDeque<Result<StructuredOutput>>>,
        optimizer: fn(u32) -> Result<String>,
        seen_previous: Mutex<Vec<Option<String>>>,
        seen_feedback: Mutex<Vec<Vec<String>>>,
    }

    impl Canned {
        fn new(evaluations: Vec<Result<StructuredOutput>>) -> Self {
            Self {
                evaluations: Mutex::new(evaluations.into()),
                optimizer: |round| Ok(format!("post-{}", round)),
                seen_previous: Mutex::new(vec![]),
                seen_feedback: Mutex::new(vec![]),
            }
        }

        fn with_optimizer(mut self, optimizer: fn(u32) -> Result<String>) -> Self {
            self.optimizer = optimizer;
            self
        }
    }

    impl RefinementStrategy for Canned {
        type Input = String;

        fn generate<'a>(
            &'a self,
            _input: &'a String,
            round: u32,
            previous: Option<&'a str>,
        ) -> BoxFuture<'a, Result<String>> {
            self.seen_previous
                .lock()
                .unwrap()
                .push(previous.map(str::to_string));
            Box::pin(async move { Ok(format!("draft-{}", round)) })
        }

        fn evaluate<'a>(
            &'a self,
            _input: &'a String,
            _round: u32,
            _artifact: &'a str,
        ) -> BoxFuture<'a, Result<StructuredOutput>> {
            let next = self
                .evaluations
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(StructuredOutput::Raw("exhausted".into())));
            Box::pin(async move { next })
        }

        fn optimize<'a>(
            &'a self,
            _input: &'a String,
            request: OptimizeRequest<'a>,
        ) -> BoxFuture<'a, Result<String>> {
            self.seen_feedback
                .lock()
                .unwrap()
                .push(request.feedback.iter().map(|f| f.message.clone()).collect());
            let result = (self.optimizer)(request.round);
            Box::pin(async move { result })
        }
    }

    fn verdict(label: &str, score: u8) -> Result<StructuredOutput> {
        Ok(StructuredOutput::Structured(json!({
            "verdict": label,
            "score": score,
            "observations": format!("{} at {}", label, score),
            "action_items": []
        })))
    }

    #[tokio::test]
    async fn test_stops_at_first_approving_round() {
        let strategy = Canned::new(vec![verdict("REVISE", 2), verdict("APPROVED", 5)]);
        let controller = RefinementController::new(4);

        let outcome = controller
            .run(&strategy, &"X".to_string(), 2, &[])
            .await
            .unwrap();

        assert_eq!(outcome.iterations.len(), 2);
        assert_eq!(outcome.final_artifact, "post-2");
        assert_eq!(outcome.stop_reason, StopReason::Approved { round: 2 });
        assert_eq!(outcome.iterations[0].verdict.score, 2);
        assert!(outcome.iterations[1].verdict.approved);
        // Round 2 generated from round 1's optimized artifact
        assert_eq!(
            *strategy.seen_previous.lock().unwrap(),
            vec![None, Some("post-1".to_string())]
        );
    }

    #[tokio::test]
    async fn test_early_approval_skips_remaining_rounds() {
        let strategy = Canned::new(vec![verdict("APPROVED", 4), verdict("APPROVED", 5)]);
        let outcome = RefinementController::new(4)
            .run(&strategy, &"X".to_string(), 5, &[])
            .await
            .unwrap();
        assert_eq!(outcome.iterations.len(), 1);
        assert_eq!(outcome.final_artifact, "post-1");
    }

    #[tokio::test]
    async fn test_round_cap_without_approval() {
        let strategy = Canned::new(vec![verdict("REVISE", 5)]);
        let outcome = RefinementController::new(4)
            .run(&strategy, &"X".to_string(), 1, &[])
            .await
            .unwrap();
        assert_eq!(outcome.iterations.len(), 1);
        assert_eq!(outcome.final_artifact, "post-1");
        assert_eq!(outcome.stop_reason, StopReason::RoundCap);
    }

    #[tokio::test]
    async fn test_malformed_evaluation_does_not_abort_round() {
        let strategy = Canned::new(vec![Ok(StructuredOutput::from_text("not json"))]);
        let outcome = RefinementController::new(4)
            .run(&strategy, &"X".to_string(), 1, &[])
            .await
            .unwrap();

        let record = &outcome.iterations[0];
        assert_eq!(record.verdict.label, "REVISE");
        assert_eq!(record.verdict.score, 3);
        assert_eq!(record.verdict.observations, "not json");
        assert_eq!(record.optimized, "post-1");
        assert_eq!(outcome.feedback_thread[0].message, "not json");
        assert_eq!(outcome.feedback_thread[0].score, Some(3));
    }

    #[tokio::test]
    async fn test_evaluator_error_uses_default_verdict() {
        let strategy = Canned::new(vec![Err(ScribeError::Generation("HTTP 429".into()))]);
        let outcome = RefinementController::new(4)
            .run(&strategy, &"X".to_string(), 1, &[])
            .await
            .unwrap();
        let verdict = &outcome.iterations[0].verdict;
        assert!(!verdict.approved);
        assert_eq!(verdict.score, 3);
        assert!(verdict.observations.contains("HTTP 429"));
    }

    #[tokio::test]
    async fn test_optimizer_fallback_keeps_generated() {
        let strategy = Canned::new(vec![verdict("REVISE", 2), verdict("REVISE", 2)])
            .with_optimizer(|round| {
                if round == 1 {
                    Ok("   ".to_string())
                } else {
                    Err(ScribeError::Generation("timeout".into()))
                }
            });
        let outcome = RefinementController::new(4)
            .run(&strategy, &"X".to_string(), 2, &[])
            .await
            .unwrap();

        assert!(outcome.iterations.iter().all(|r| r.optimizer_fallback));
        assert_eq!(outcome.iterations[0].optimized, "draft-1");
        assert_eq!(outcome.final_artifact, "draft-2");
    }

    #[tokio::test]
    async fn test_zero_rounds_rejected() {
        let strategy = Canned::new(vec![]);
        let err = RefinementController::new(4)
            .run(&strategy, &"X".to_string(), 0, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ScribeError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_feedback_selected_per_round() {
        let strategy = Canned::new(vec![verdict("REVISE", 1), verdict("REVISE", 1)]);
        let feedback = vec![
            FeedbackItem::new("ana", "always"),
            FeedbackItem::new("li", "only second").for_round(2),
        ];
        let outcome = RefinementController::new(4)
            .run(&strategy, &"X".to_string(), 2, &feedback)
            .await
            .unwrap();

        assert_eq!(
            *strategy.seen_feedback.lock().unwrap(),
            vec![
                vec!["always".to_string()],
                vec!["always".to_string(), "only second".to_string()]
            ]
        );
        let sources: Vec<_> = outcome
            .feedback_thread
            .iter()
            .map(|e| (e.round, e.source.as_str()))
            .collect();
        assert_eq!(
            sources,
            vec![
                (1, "evaluator"),
                (1, "human:ana"),
                (2, "evaluator"),
                (2, "human:ana"),
                (2, "human:li")
            ]
        );
    }

    #[tokio::test]
    async fn test_round_events() {
        let bus = Arc::new(EventBus::new(8));
        let mut rx = bus.subscribe();
        let strategy = Canned::new(vec![verdict("APPROVED", 5)]);
        RefinementController::new(4)
            .with_events(bus.clone())
            .run(&strategy, &"X".to_string(), 3, &[])
            .await
            .unwrap();
        match rx.try_recv().unwrap() {
            WorkflowEvent::RoundCompleted {
                round,
                score,
                approved,
                ..
            } => {
                assert_eq!((round, score, approved), (1, 5, true));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_round_events_carry_their_run_id() {
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let controller = RefinementController::new(5).with_events(bus.clone());
        let revising = Canned::new(vec![verdict("REVISE", 2), verdict("REVISE", 3)]);
        let approving = Canned::new(vec![verdict("APPROVED", 5)]);
        let first = controller
            .run(&revising, &"A".to_string(), 2, &[])
            .await
            .unwrap();
        let second = controller
            .run(&approving, &"B".to_string(), 2, &[])
            .await
            .unwrap();
        assert_ne!(first.run_id, second.run_id);

        let mut seen = vec![];
        while let Ok(WorkflowEvent::RoundCompleted { run_id, round, .. }) = rx.try_recv() {
            seen.push((run_id, round));
        }
        assert_eq!(
            seen,
            vec![
                (first.run_id.clone(), 1),
                (first.run_id.clone(), 2),
                (second.run_id.clone(), 1),
            ]
        );
    }
}
