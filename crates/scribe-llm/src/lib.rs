pub mod providers;
pub mod retry;

use std::sync::Arc;

use scribe_core::config::{AppConfig, ModelConfig};
use scribe_core::error::{Result, ScribeError};
use scribe_core::traits::GenerationService;

pub use providers::openai::OpenAiClient;
pub use providers::presets::{all_preset_names, apply_preset_defaults, get_preset};
pub use retry::RetryingClient;

/// Create a generation client based on the provider name.
///
/// Every supported provider speaks the OpenAI chat-completions dialect; an
/// unknown provider is accepted only when it names an explicit `base_url`.
pub fn create_client(config: &ModelConfig) -> Result<Box<dyn GenerationService>> {
    let mut config = config.clone();
    apply_preset_defaults(&mut config);
    if get_preset(&config.provider).is_none() && config.base_url.is_none() {
        return Err(ScribeError::UnsupportedProvider(config.provider));
    }
    Ok(Box::new(OpenAiClient::new(config)?))
}

/// Build the generation service for an app config: primary client, wrapped
/// with retry and fallbacks when either is configured.
pub fn build_service(config: &AppConfig) -> Result<Arc<dyn GenerationService>> {
    let primary = create_client(&config.model)?;
    if config.fallback_models.is_empty() && config.model.retry.is_none() {
        return Ok(Arc::from(primary));
    }

    let retry_config = config.model.retry.clone().unwrap_or_default();
    let fallbacks = config
        .fallback_models
        .iter()
        .map(|mc| Ok((format!("{}/{}", mc.provider, mc.model_id), create_client(mc)?)))
        .collect::<Result<Vec<_>>>()?;

    Ok(Arc::new(RetryingClient::new(primary, fallbacks, retry_config)))
}
