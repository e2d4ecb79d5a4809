use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScribeError};

/// Top-level Scribe configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub fallback_models: Vec<ModelConfig>,
    #[serde(default)]
    pub roles: RoleModels,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub refinement: RefinementConfig,
    #[serde(default)]
    pub blog: BlogConfig,
    #[serde(default)]
    pub gateway: Option<GatewayConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_top_p")]
    pub top_p: f32,
    /// Per-request timeout handed to the HTTP client.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    #[serde(default)]
    pub extra_headers: HashMap<String, String>,
}

impl ModelConfig {
    pub fn new(provider: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model_id: model_id.into(),
            api_key: None,
            base_url: None,
            top_p: default_top_p(),
            timeout_secs: default_timeout_secs(),
            retry: None,
            extra_headers: HashMap::new(),
        }
    }
}

fn default_provider() -> String { "groq".to_string() }
fn default_top_p() -> f32 { 0.9 }
fn default_timeout_secs() -> u64 { 60 }

/// Retry configuration for generation requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 1000 }
fn default_max_backoff() -> u64 { 30000 }

/// Model identifiers used by each workflow step.
///
/// These travel as the per-request `model` override, so a single provider
/// connection can serve a large drafting model and a small grading model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleModels {
    #[serde(default = "default_generator_model")]
    pub generator: String,
    #[serde(default = "default_evaluator_model")]
    pub evaluator: String,
    #[serde(default = "default_optimizer_model")]
    pub optimizer: String,
    /// Cheap model for extraction-style steps.
    #[serde(default = "default_fast_model")]
    pub fast: String,
}

impl Default for RoleModels {
    fn default() -> Self {
        Self {
            generator: default_generator_model(),
            evaluator: default_evaluator_model(),
            optimizer: default_optimizer_model(),
            fast: default_fast_model(),
        }
    }
}

fn default_generator_model() -> String { "llama-3.3-70b-versatile".to_string() }
fn default_evaluator_model() -> String { "llama-3.1-8b-instant".to_string() }
fn default_optimizer_model() -> String { "llama-3.3-70b-versatile".to_string() }
fn default_fast_model() -> String { "llama-3.1-8b-instant".to_string() }

/// What the executor does with the rest of a run after a node fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort every other in-flight node and fail immediately.
    #[default]
    FailFast,
    /// Stop dispatching, let in-flight nodes finish, report every failure.
    DrainInFlight,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on concurrently running nodes (None = unbounded).
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementConfig {
    #[serde(default = "default_approval_threshold")]
    pub approval_threshold: u8,
    #[serde(default = "default_max_rounds")]
    pub default_max_rounds: u32,
    #[serde(default = "default_max_rounds_limit")]
    pub max_rounds_limit: u32,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            approval_threshold: default_approval_threshold(),
            default_max_rounds: default_max_rounds(),
            max_rounds_limit: default_max_rounds_limit(),
        }
    }
}

fn default_approval_threshold() -> u8 { 4 }
fn default_max_rounds() -> u32 { 2 }
fn default_max_rounds_limit() -> u32 { 5 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogConfig {
    /// Editor passes allowed before the draft is accepted as-is.
    #[serde(default = "default_max_revisions")]
    pub max_revisions: u32,
    #[serde(default = "default_word_count")]
    pub word_count: u32,
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            max_revisions: default_max_revisions(),
            word_count: default_word_count(),
        }
    }
}

fn default_max_revisions() -> u32 { 2 }
fn default_word_count() -> u32 { 1000 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Bearer token required on every route except health.
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            token: None,
        }
    }
}

fn default_bind() -> String { "127.0.0.1:8000".to_string() }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| ScribeError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| ScribeError::Config(e.to_string()))
    }

    /// Config with every optional section at its default.
    pub fn with_model(model: ModelConfig) -> Self {
        Self {
            model,
            fallback_models: vec![],
            roles: RoleModels::default(),
            engine: EngineConfig::default(),
            refinement: RefinementConfig::default(),
            blog: BlogConfig::default(),
            gateway: None,
        }
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                // Keep original if env var not set
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}
