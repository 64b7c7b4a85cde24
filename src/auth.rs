//! Provider credentials
//!
//! `auth.json` maps a provider name to its key and, for self-hosted
//! endpoints, a base URL:
//!
//! ```json
//! { "openrouter": { "type": "api", "key": "sk-or-..." },
//!   "lm-studio":  { "type": "api", "key": "x", "base_url": "http://localhost:1234/v1" } }
//! ```
//!
//! Lookup order for the file: `$XDG_DATA_HOME/collab-agent/auth.json`, then
//! the platform data dir (`~/.local/share/collab-agent/auth.json` on Linux).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const AUTH_FILE: &str = "auth.json";
const APP_DIR: &str = "collab-agent";

/// Providers tried, in order, when the model name gives no usable hint
const FALLBACK_PROVIDERS: [&str; 3] = ["openrouter", "lm-studio", "lmstudio"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthEntry {
    Api {
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
}

impl AuthEntry {
    pub fn api_key(&self) -> &str {
        let AuthEntry::Api { key, .. } = self;
        key
    }

    /// Set for self-hosted OpenAI-compatible servers
    pub fn base_url(&self) -> Option<&str> {
        let AuthEntry::Api { base_url, .. } = self;
        base_url.as_deref()
    }
}

/// Contents of `auth.json`, keyed by provider name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthConfig {
    pub providers: HashMap<String, AuthEntry>,
}

impl AuthConfig {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// A missing file is an empty config; a malformed one is an error
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// First existing candidate, else the platform default location
    pub fn config_path() -> anyhow::Result<PathBuf> {
        let xdg = std::env::var_os("XDG_DATA_HOME").map(|d| PathBuf::from(d).join(APP_DIR));
        let platform = dirs::data_dir().map(|d| d.join(APP_DIR));

        let candidates: Vec<PathBuf> = [xdg, platform]
            .into_iter()
            .flatten()
            .map(|dir| dir.join(AUTH_FILE))
            .collect();

        Ok(candidates
            .iter()
            .find(|path| path.exists())
            .or_else(|| candidates.last())
            .cloned()
            .unwrap_or_else(|| PathBuf::from(".collab-agent").join(AUTH_FILE)))
    }

    /// Exact name first, then a case-insensitive match
    pub fn get(&self, provider: &str) -> Option<&AuthEntry> {
        self.providers.get(provider).or_else(|| {
            self.providers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(provider))
                .map(|(_, entry)| entry)
        })
    }

    pub fn api_key(&self, provider: &str) -> Option<&str> {
        self.get(provider).map(AuthEntry::api_key)
    }

    pub fn base_url(&self, provider: &str) -> Option<&str> {
        self.get(provider).and_then(AuthEntry::base_url)
    }

    /// Provider names, sorted
    pub fn providers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Pick credentials for a model id like `anthropic/claude-sonnet-4`.
    ///
    /// The prefix before the slash is tried as a provider name, then the
    /// common gateway names.
    pub fn for_model(&self, model: &str) -> Option<&AuthEntry> {
        let hint = model.split('/').next().filter(|h| !h.is_empty() && *h != model);

        hint.into_iter()
            .chain(FALLBACK_PROVIDERS)
            .find_map(|name| self.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AuthConfig {
        serde_json::from_str(
            r#"{
                "OpenRouter": {"type": "api", "key": "sk-or"},
                "lm-studio": {"type": "api", "key": "local", "base_url": "http://localhost:1234/v1"},
                "anthropic": {"type": "api", "key": "sk-ant"}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_auth_config() {
        let config = sample();
        assert_eq!(config.api_key("lm-studio"), Some("local"));
        assert_eq!(config.base_url("lm-studio"), Some("http://localhost:1234/v1"));
        assert_eq!(config.base_url("anthropic"), None);
        assert_eq!(config.providers(), vec!["OpenRouter", "anthropic", "lm-studio"]);
    }

    #[test]
    fn test_get_is_case_insensitive() {
        assert_eq!(sample().api_key("openrouter"), Some("sk-or"));
        assert!(sample().get("mistral").is_none());
    }

    #[test]
    fn test_for_model_prefers_prefix() {
        let config = sample();
        assert_eq!(config.for_model("anthropic/claude-sonnet-4").map(AuthEntry::api_key), Some("sk-ant"));
        // Unknown prefix and bare model names fall back to the gateway
        assert_eq!(config.for_model("meta/llama-3").map(AuthEntry::api_key), Some("sk-or"));
        assert_eq!(config.for_model("qwen2.5-coder").map(AuthEntry::api_key), Some("sk-or"));
        assert!(AuthConfig::default().for_model("gpt-4o").is_none());
    }

    #[test]
    fn test_entry_roundtrip_keeps_tag() {
        let entry = AuthEntry::Api {
            key: "k".into(),
            base_url: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json, serde_json::json!({"type": "api", "key": "k"}));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = AuthConfig::load_from(&temp.path().join(AUTH_FILE)).unwrap();
        assert!(config.providers().is_empty());
    }

    #[test]
    fn test_malformed_file_is_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join(AUTH_FILE);
        std::fs::write(&path, "{ not json").unwrap();
        assert!(AuthConfig::load_from(&path).is_err());
    }
}
