use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique workflow run identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Output shape requested from the generation backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Text,
    Json,
}

/// A single request to the generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    #[serde(default)]
    pub response_format: ResponseFormat,
    /// Overrides the configured model id for this request only.
    #[serde(default)]
    pub model: Option<String>,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: 0.7,
            max_output_tokens: 1024,
            response_format: ResponseFormat::Text,
            model: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Request a JSON object response.
    pub fn json(mut self) -> Self {
        self.response_format = ResponseFormat::Json;
        self
    }
}

/// What came back from a structured generation request.
///
/// Extraction happens once, at the service boundary. Call sites match on
/// the variant instead of re-parsing text.
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredOutput {
    Structured(serde_json::Value),
    Raw(String),
}

impl StructuredOutput {
    /// Parse generated text, tolerating markdown code fences and prose
    /// around a single JSON object.
    pub fn from_text(text: &str) -> Self {
        let candidate = extract_json(text);
        match serde_json::from_str::<serde_json::Value>(candidate) {
            Ok(value) if value.is_object() || value.is_array() => Self::Structured(value),
            _ => Self::Raw(text.to_string()),
        }
    }

    pub fn as_structured(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Structured(v) => Some(v),
            Self::Raw(_) => None,
        }
    }

    /// String field of a structured object, if present.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.as_structured()
            .and_then(|v| v.get(key))
            .and_then(|v| v.as_str())
    }
}

/// Extract JSON from a response that may contain markdown code fences.
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            return after[..end].trim();
        }
    }
    if trimmed.starts_with('[') {
        return trimmed;
    }
    if let Some(start) = trimmed.find('{') {
        if let Some(end) = trimmed.rfind('}') {
            if end > start {
                return &trimmed[start..=end];
            }
        }
    }
    trimmed
}

/// Externally supplied guidance for the refinement loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    #[serde(default = "default_feedback_author")]
    pub author: String,
    pub message: String,
    /// Round this applies to; `None` applies to every round.
    #[serde(default, alias = "iteration")]
    pub round: Option<u32>,
}

fn default_feedback_author() -> String {
    "strategist".to_string()
}

impl FeedbackItem {
    pub fn new(author: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            message: message.into(),
            round: None,
        }
    }

    pub fn for_round(mut self, round: u32) -> Self {
        self.round = Some(round);
        self
    }

    pub fn applies_to(&self, round: u32) -> bool {
        self.round.map_or(true, |r| r == round)
    }
}

/// Workflow event broadcast to all subscribers.
#[derive(Debug, Clone)]
pub enum WorkflowEvent {
    RunStarted {
        run_id: RunId,
        workflow: String,
    },
    NodeStarted {
        run_id: RunId,
        node: String,
        invocation: u32,
    },
    NodeCompleted {
        run_id: RunId,
        node: String,
        invocation: u32,
        elapsed_ms: u64,
    },
    NodeFailed {
        run_id: RunId,
        node: String,
        invocation: u32,
        error: String,
    },
    /// One refinement round finished.
    RoundCompleted {
        run_id: RunId,
        round: u32,
        score: u8,
        approved: bool,
    },
    RunFinished {
        run_id: RunId,
        succeeded: bool,
        elapsed_ms: u64,
    },
}
