use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use scribe_core::config::ModelConfig;
use scribe_core::error::{Result, ScribeError};
use scribe_core::traits::GenerationService;
use scribe_core::types::{CompletionRequest, ResponseFormat};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible client. Works with OpenAI, Ollama, Groq, OpenRouter, etc.
pub struct OpenAiClient {
    http: Client,
    config: ModelConfig,
}

impl OpenAiClient {
    pub fn new(config: ModelConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ScribeError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }
}

// Request types
#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OaiMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OaiResponseFormat>,
}

#[derive(Serialize)]
struct OaiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct OaiResponseFormat {
    r#type: &'static str,
}

// Response types
#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

fn build_body<'a>(config: &'a ModelConfig, request: &'a CompletionRequest) -> ChatRequest<'a> {
    let mut messages = Vec::with_capacity(2);
    // Single-prompt steps send no system message
    if !request.system.is_empty() {
        messages.push(OaiMessage {
            role: "system",
            content: &request.system,
        });
    }
    messages.push(OaiMessage {
        role: "user",
        content: &request.user,
    });

    ChatRequest {
        model: request.model.as_deref().unwrap_or(&config.model_id),
        messages,
        max_tokens: request.max_output_tokens,
        temperature: request.temperature,
        top_p: config.top_p,
        stream: false,
        response_format: match request.response_format {
            ResponseFormat::Json => Some(OaiResponseFormat {
                r#type: "json_object",
            }),
            ResponseFormat::Text => None,
        },
    }
}

/// Pull the first choice's text out of a response body.
fn parse_response(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| ScribeError::Generation(format!("unreadable response: {}", e)))?;

    if let Some(usage) = &parsed.usage {
        debug!(
            input_tokens = usage.prompt_tokens,
            output_tokens = usage.completion_tokens,
            "Generation usage"
        );
    }

    Ok(parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .unwrap_or_default())
}

impl GenerationService for OpenAiClient {
    fn complete(&self, request: CompletionRequest) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let base_url = self.config.base_url.as_deref().unwrap_or(OPENAI_API_URL);
            let body = build_body(&self.config, &request);

            let mut req = self.http.post(base_url).json(&body);

            if let Some(api_key) = &self.config.api_key {
                req = req.header("Authorization", format!("Bearer {}", api_key));
            }

            // Apply extra headers from config (set by presets or user)
            for (k, v) in &self.config.extra_headers {
                req = req.header(k.as_str(), v.as_str());
            }

            let response = req.send().await.map_err(|e| {
                if e.is_timeout() {
                    ScribeError::GenerationTimeout {
                        timeout_secs: self.config.timeout_secs,
                    }
                } else {
                    ScribeError::Generation(e.to_string())
                }
            })?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown".to_string());
                return Err(ScribeError::Generation(format!("HTTP {}: {}", status, body)));
            }

            let text = response
                .text()
                .await
                .map_err(|e| ScribeError::Generation(e.to_string()))?;
            parse_response(&text)
        })
    }
}
