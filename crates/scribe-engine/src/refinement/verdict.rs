use serde::{Deserialize, Serialize};
use serde_json::Value;

use scribe_core::types::StructuredOutput;

const DEFAULT_LABEL: &str = "REVISE";
const DEFAULT_SCORE: u8 = 3;
const MIN_SCORE: u8 = 1;
const MAX_SCORE: u8 = 5;

/// An evaluator's judgement of one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Raw verdict label, e.g. "APPROVED" or "REVISE".
    pub label: String,
    pub approved: bool,
    /// Score on a 1..=5 scale.
    pub score: u8,
    pub observations: String,
    pub action_items: Vec<String>,
    /// True when the evaluator output could not be parsed and this verdict
    /// is the conservative default.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub malformed: bool,
}

impl Verdict {
    /// The "needs revision" verdict used when evaluation output is unusable.
    /// `raw` is surfaced unchanged as the observations.
    pub fn fallback(raw: impl Into<String>) -> Self {
        Self {
            label: DEFAULT_LABEL.to_string(),
            approved: false,
            score: DEFAULT_SCORE,
            observations: raw.into(),
            action_items: vec![],
            malformed: true,
        }
    }

    /// Build a verdict from evaluator output. Never fails: missing fields take
    /// their defaults and unparseable output yields `Verdict::fallback`.
    pub fn from_output(output: &StructuredOutput) -> Self {
        match output {
            StructuredOutput::Raw(text) => Self::fallback(text.clone()),
            StructuredOutput::Structured(Value::Object(fields)) => {
                let label = fields
                    .get("verdict")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .unwrap_or(DEFAULT_LABEL)
                    .to_string();
                let approved = label.to_lowercase().starts_with("approve");
                Self {
                    approved,
                    label,
                    score: fields.get("score").map(parse_score).unwrap_or(DEFAULT_SCORE),
                    observations: fields
                        .get("observations")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    action_items: fields
                        .get("action_items")
                        .map(parse_items)
                        .unwrap_or_default(),
                    malformed: false,
                }
            }
            StructuredOutput::Structured(other) => Self::fallback(other.to_string()),
        }
    }

    /// Whether this verdict ends refinement at `threshold`. Both signals
    /// must pass.
    pub fn passes(&self, threshold: u8) -> bool {
        self.approved && self.score >= threshold
    }

    /// Plain-text summary for optimizer prompts.
    pub fn summary(&self) -> String {
        let items = if self.action_items.is_empty() {
            "None".to_string()
        } else {
            self.action_items.join(", ")
        };
        format!(
            "Verdict: {}\nScore: {}\nObservations: {}\nAction items: {}",
            self.label, self.score, self.observations, items
        )
    }
}

fn parse_score(value: &Value) -> u8 {
    let raw = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
        _ => None,
    };
    match raw {
        Some(n) => n.clamp(MIN_SCORE as i64, MAX_SCORE as i64) as u8,
        None => DEFAULT_SCORE,
    }
}

fn parse_items(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s.clone()],
        _ => vec![],
    }
}
