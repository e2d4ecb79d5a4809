use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScribeError {
    // Generation errors
    #[error("Generation request failed: {0}")]
    Generation(String),

    #[error("Generation timed out after {timeout_secs}s")]
    GenerationTimeout { timeout_secs: u64 },

    #[error("Generation provider not supported: {0}")]
    UnsupportedProvider(String),

    #[error("Malformed structured output: {0}")]
    MalformedOutput(String),

    // Request errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown workflow: {0}")]
    UnknownWorkflow(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScribeError {
    /// Whether this error came from the generation backend.
    pub fn is_generation(&self) -> bool {
        matches!(
            self,
            ScribeError::Generation(_) | ScribeError::GenerationTimeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ScribeError>;
