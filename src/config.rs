//! Configuration for collab-agent

use crate::auth::AuthConfig;
use crate::provider::ProviderConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Web search used for prompt enrichment
    pub search: SearchConfig,

    /// Project directory (prompt overrides are looked up here)
    pub working_dir: PathBuf,

    /// Directory for the conversation database, logs and REPL history
    pub data_dir: PathBuf,

    /// Logging settings
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider type (openrouter, openai, anthropic, custom)
    pub provider: LlmProvider,

    /// API key (can also be set via environment variable or auth.json)
    pub api_key: Option<String>,

    /// Base URL for the API (for custom endpoints like LM Studio)
    pub base_url: Option<String>,

    /// Model name/ID
    pub model: String,

    /// Maximum tokens for response
    pub max_tokens: Option<u32>,

    /// Temperature for sampling
    pub temperature: Option<f32>,

    /// HTTP timeout for a single chat call
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LlmProvider {
    #[default]
    OpenRouter,
    OpenAI,
    Anthropic,
    /// Custom OpenAI-compatible endpoint (e.g., LM Studio, vLLM)
    Custom,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::OpenRouter => "openrouter",
            LlmProvider::OpenAI => "openai",
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::Custom => "custom",
        }
    }

    /// Infer provider type from an auth.json / CLI name
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "openrouter" => LlmProvider::OpenRouter,
            "openai" => LlmProvider::OpenAI,
            "anthropic" => LlmProvider::Anthropic,
            _ => LlmProvider::Custom,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// SearXNG instance URL
    pub searxng_url: String,

    /// Maximum number of results folded into a prompt
    pub max_results: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Directory for log files
    pub log_dir: PathBuf,

    /// Enable verbose (console + debug) logging
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            llm: LlmConfig::default(),
            search: SearchConfig::default(),
            working_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            telemetry: TelemetryConfig {
                log_dir: data_dir.join("logs"),
                verbose: false,
            },
            data_dir,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenRouter,
            api_key: None,
            base_url: None,
            model: "anthropic/claude-sonnet-4".to_string(),
            max_tokens: Some(4096),
            temperature: Some(0.7),
            timeout_secs: 120,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            searxng_url: std::env::var("SEARXNG_URL")
                .unwrap_or_else(|_| "http://localhost:8082".to_string()),
            max_results: 5,
        }
    }
}

/// Default data directory: $XDG_DATA_HOME/collab-agent, else ~/.collab-agent
pub fn default_data_dir() -> PathBuf {
    if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg_data).join("collab-agent")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".collab-agent")
    } else {
        PathBuf::from(".collab-agent")
    }
}

impl Config {
    /// Config for a custom OpenAI-compatible endpoint (LM Studio, vLLM, ...)
    pub fn custom_endpoint(base_url: &str, model: &str, working_dir: PathBuf) -> Self {
        Self {
            llm: LlmConfig {
                provider: LlmProvider::Custom,
                // Local servers accept any key
                api_key: Some("lm-studio".to_string()),
                base_url: Some(base_url.to_string()),
                model: model.to_string(),
                ..LlmConfig::default()
            },
            working_dir,
            ..Self::default()
        }
    }

    /// Config for OpenRouter
    pub fn openrouter(model: &str, working_dir: PathBuf) -> Self {
        Self {
            llm: LlmConfig {
                provider: LlmProvider::OpenRouter,
                api_key: std::env::var("OPENROUTER_API_KEY").ok(),
                model: model.to_string(),
                ..LlmConfig::default()
            },
            working_dir,
            ..Self::default()
        }
    }

    /// Create config from a provider name in auth.json
    pub fn from_provider(provider: &str, model: &str, working_dir: PathBuf) -> anyhow::Result<Self> {
        let auth = AuthConfig::load()?;

        let entry = auth
            .get(provider)
            .ok_or_else(|| anyhow::anyhow!("Provider '{}' not found in auth.json", provider))?;

        let llm_provider = if entry.base_url().is_some() {
            LlmProvider::Custom
        } else {
            LlmProvider::from_name(provider)
        };

        Ok(Self {
            llm: LlmConfig {
                provider: llm_provider,
                api_key: Some(entry.api_key().to_string()),
                base_url: entry.base_url().map(String::from),
                model: model.to_string(),
                ..LlmConfig::default()
            },
            working_dir,
            ..Self::default()
        })
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.telemetry.verbose = verbose;
        self
    }

    /// Set the data directory; logs move with it
    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        self.telemetry.log_dir = data_dir.join("logs");
        self.data_dir = data_dir;
        self
    }

    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.llm.api_key = Some(api_key);
        self
    }

    pub fn with_searxng_url(mut self, url: impl Into<String>) -> Self {
        self.search.searxng_url = url.into();
        self
    }

    /// Path of the SQLite conversation database
    pub fn conversation_db_path(&self) -> PathBuf {
        self.data_dir.join("conversations.db")
    }

    /// Build the provider config used by the chat client
    pub fn provider_config(&self) -> ProviderConfig {
        let mut provider = match self.llm.provider {
            LlmProvider::OpenRouter => ProviderConfig::openrouter(),
            LlmProvider::OpenAI => ProviderConfig::openai(),
            LlmProvider::Anthropic => ProviderConfig::anthropic(),
            LlmProvider::Custom => ProviderConfig::custom(
                "custom",
                "http://localhost:1234/v1",
                "COLLAB_AGENT_API_KEY",
                &self.llm.model,
            ),
        };

        if let Some(base_url) = &self.llm.base_url {
            provider.base_url = base_url.clone();
        }
        provider.default_model = self.llm.model.clone();
        provider.api_key = self.llm.api_key.clone();
        provider.temperature = self.llm.temperature;
        provider.max_tokens = self.llm.max_tokens;
        provider.timeout_secs = self.llm.timeout_secs;
        provider
    }

    /// List available providers from auth.json
    pub fn list_providers() -> anyhow::Result<Vec<String>> {
        let auth = AuthConfig::load()?;
        Ok(auth.providers().into_iter().map(String::from).collect())
    }
}
