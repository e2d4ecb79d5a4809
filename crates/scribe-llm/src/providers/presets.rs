use std::collections::HashMap;

use scribe_core::config::ModelConfig;

/// A named provider preset for OpenAI-compatible APIs.
pub struct ProviderPreset {
    pub default_base_url: &'static str,
    pub needs_api_key: bool,
    pub extra_headers: &'static [(&'static str, &'static str)],
}

/// Look up a provider preset by name.
pub fn get_preset(provider: &str) -> Option<ProviderPreset> {
    match provider {
        "openai" => Some(ProviderPreset {
            default_base_url: "https://api.openai.com/v1/chat/completions",
            needs_api_key: true,
            extra_headers: &[],
        }),
        "ollama" => Some(ProviderPreset {
            default_base_url: "http://localhost:11434/v1/chat/completions",
            needs_api_key: false,
            extra_headers: &[],
        }),
        "groq" => Some(ProviderPreset {
            default_base_url: "https://api.groq.com/openai/v1/chat/completions",
            needs_api_key: true,
            extra_headers: &[],
        }),
        "openrouter" => Some(ProviderPreset {
            default_base_url: "https://openrouter.ai/api/v1/chat/completions",
            needs_api_key: true,
            extra_headers: &[("X-Title", "Scribe")],
        }),
        "together" => Some(ProviderPreset {
            default_base_url: "https://api.together.xyz/v1/chat/completions",
            needs_api_key: true,
            extra_headers: &[],
        }),
        "fireworks" => Some(ProviderPreset {
            default_base_url: "https://api.fireworks.ai/inference/v1/chat/completions",
            needs_api_key: true,
            extra_headers: &[],
        }),
        "cerebras" => Some(ProviderPreset {
            default_base_url: "https://api.cerebras.ai/v1/chat/completions",
            needs_api_key: true,
            extra_headers: &[],
        }),
        "xai" => Some(ProviderPreset {
            default_base_url: "https://api.x.ai/v1/chat/completions",
            needs_api_key: true,
            extra_headers: &[],
        }),
        "mistral" => Some(ProviderPreset {
            default_base_url: "https://api.mistral.ai/v1/chat/completions",
            needs_api_key: true,
            extra_headers: &[],
        }),
        "deepseek" => Some(ProviderPreset {
            default_base_url: "https://api.deepseek.com/v1/chat/completions",
            needs_api_key: true,
            extra_headers: &[],
        }),
        _ => None,
    }
}

/// Build extra headers from a preset + user config overrides.
pub fn build_extra_headers(
    preset: &ProviderPreset,
    user_headers: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut headers: HashMap<String, String> = preset
        .extra_headers
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    // User overrides take precedence
    for (k, v) in user_headers {
        headers.insert(k.clone(), v.clone());
    }
    headers
}

/// Fill `base_url` and headers from the provider preset, keeping anything
/// the user set explicitly.
pub fn apply_preset_defaults(config: &mut ModelConfig) {
    if let Some(preset) = get_preset(&config.provider) {
        if config.base_url.is_none() {
            config.base_url = Some(preset.default_base_url.to_string());
        }
        config.extra_headers = build_extra_headers(&preset, &config.extra_headers);
    }
}

/// List all known preset provider names.
pub fn all_preset_names() -> &'static [&'static str] {
    &[
        "openai",
        "ollama",
        "groq",
        "openrouter",
        "together",
        "fireworks",
        "cerebras",
        "xai",
        "mistral",
        "deepseek",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_listed_preset_resolves() {
        for name in all_preset_names() {
            assert!(get_preset(name).is_some(), "missing preset {}", name);
        }
        assert!(get_preset("nope").is_none());
    }

    #[test]
    fn test_apply_preset_fills_base_url() {
        let mut config = ModelConfig::new("groq", "llama-3.3-70b-versatile");
        apply_preset_defaults(&mut config);
        assert_eq!(
            config.base_url.as_deref(),
            Some("https://api.groq.com/openai/v1/chat/completions")
        );
    }

    #[test]
    fn test_apply_preset_keeps_user_values() {
        let mut config = ModelConfig::new("openrouter", "meta-llama/llama-3.1-8b");
        config.base_url = Some("http://proxy.local/v1/chat/completions".into());
        config
            .extra_headers
            .insert("X-Title".into(), "My App".into());
        apply_preset_defaults(&mut config);
        assert_eq!(
            config.base_url.as_deref(),
            Some("http://proxy.local/v1/chat/completions")
        );
        assert_eq!(config.extra_headers.get("X-Title").map(String::as_str), Some("My App"));
    }
}
