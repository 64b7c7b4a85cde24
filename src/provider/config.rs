//! Provider configuration

use serde::{Deserialize, Serialize};

/// Configuration for an OpenAI-compatible provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Display name for the provider (also the auth.json lookup key)
    pub name: String,
    /// API base URL (e.g., "https://api.openai.com/v1")
    pub base_url: String,
    /// Environment variable name for the API key
    pub api_key_env: String,
    /// Default model to use
    pub default_model: String,
    /// Explicit API key, takes precedence over env and auth.json
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Maximum tokens in the response
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    120
}

impl ProviderConfig {
    /// Create an OpenRouter provider config
    pub fn openrouter() -> Self {
        Self::custom(
            "OpenRouter",
            "https://openrouter.ai/api/v1",
            "OPENROUTER_API_KEY",
            "anthropic/claude-sonnet-4",
        )
    }

    /// Create an OpenAI provider config
    pub fn openai() -> Self {
        Self::custom("OpenAI", "https://api.openai.com/v1", "OPENAI_API_KEY", "gpt-4o")
    }

    /// Create an Anthropic provider config (via their OpenAI-compatible endpoint)
    pub fn anthropic() -> Self {
        Self::custom(
            "Anthropic",
            "https://api.anthropic.com/v1",
            "ANTHROPIC_API_KEY",
            "claude-sonnet-4-20250514",
        )
    }

    /// Create a custom provider config (e.g., LM Studio, vLLM)
    pub fn custom(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key_env: impl Into<String>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            api_key_env: api_key_env.into(),
            default_model: default_model.into(),
            api_key: None,
            temperature: Some(0.7),
            max_tokens: Some(4096),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Chat completions endpoint for this provider
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completions_url_handles_trailing_slash() {
        let config = ProviderConfig::custom("lm", "http://localhost:1234/v1/", "LM_KEY", "m");
        assert_eq!(config.completions_url(), "http://localhost:1234/v1/chat/completions");
    }

    #[test]
    fn test_presets() {
        assert_eq!(ProviderConfig::openai().api_key_env, "OPENAI_API_KEY");
        assert_eq!(ProviderConfig::openrouter().timeout_secs, 120);
    }
}
