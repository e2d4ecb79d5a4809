use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{info, warn};

use scribe_core::config::RetryConfig;
use scribe_core::error::{Result, ScribeError};
use scribe_core::traits::GenerationService;
use scribe_core::types::CompletionRequest;

/// A generation client that retries failed requests and falls back to alternative providers.
pub struct RetryingClient {
    primary: Box<dyn GenerationService>,
    /// (label, client) pairs tried in order once the primary is exhausted.
    fallbacks: Vec<(String, Box<dyn GenerationService>)>,
    retry_config: RetryConfig,
}

impl RetryingClient {
    pub fn new(
        primary: Box<dyn GenerationService>,
        fallbacks: Vec<(String, Box<dyn GenerationService>)>,
        retry_config: RetryConfig,
    ) -> Self {
        Self {
            primary,
            fallbacks,
            retry_config,
        }
    }
}

/// Status code of an `HTTP <status>: <body>` error from a provider client.
fn http_status(msg: &str) -> Option<u16> {
    msg.strip_prefix("HTTP ")?.get(..3)?.parse().ok()
}

fn is_retryable(e: &ScribeError) -> bool {
    match e {
        ScribeError::Generation(msg) => match http_status(msg) {
            Some(status) => matches!(status, 429 | 500 | 502 | 503 | 504),
            None => msg.contains("timeout") || msg.contains("connection"),
        },
        ScribeError::GenerationTimeout { .. } => true,
        _ => false,
    }
}

fn calculate_backoff(attempt: u32, config: &RetryConfig) -> Duration {
    let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
    let ms = config
        .initial_backoff_ms
        .saturating_mul(factor)
        .min(config.max_backoff_ms);
    // Add jitter: 0.8x to 1.2x
    let jitter = 0.8 + rand::random::<f64>() * 0.4;
    Duration::from_millis((ms as f64 * jitter) as u64)
}

impl GenerationService for RetryingClient {
    fn complete(&self, request: CompletionRequest) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let max_retries = self.retry_config.max_retries;

            let mut last_err = None;
            for attempt in 0..=max_retries {
                match self.primary.complete(request.clone()).await {
                    Ok(text) => return Ok(text),
                    Err(e) => {
                        if is_retryable(&e) && attempt < max_retries {
                            let backoff = calculate_backoff(attempt, &self.retry_config);
                            warn!(
                                attempt = attempt + 1,
                                max_retries,
                                backoff_ms = backoff.as_millis() as u64,
                                error = %e,
                                "Retrying generation request"
                            );
                            tokio::time::sleep(backoff).await;
                            last_err = Some(e);
                            continue;
                        }
                        last_err = Some(e);
                        break;
                    }
                }
            }

            // Primary exhausted; fallbacks use their own configured model
            if !self.fallbacks.is_empty() {
                info!("Primary generation service exhausted, trying fallbacks");
            }
            let mut fallback_request = request;
            fallback_request.model = None;
            for (label, client) in &self.fallbacks {
                match client.complete(fallback_request.clone()).await {
                    Ok(text) => {
                        info!(model = %label, "Fell back to alternative model");
                        return Ok(text);
                    }
                    Err(e) => {
                        warn!(model = %label, error = %e, "Fallback model also failed");
                    }
                }
            }

            Err(last_err
                .unwrap_or_else(|| ScribeError::Generation("All providers failed".into())))
        })
    }
}
