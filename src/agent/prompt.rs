//! System prompt registry for agents
//!
//! Each agent ships with a default prompt (`src/prompts/<agent>.txt`).
//! Users can override any of them at runtime or through YAML files loaded by
//! [`super::config_loader`]. Lookups never return an empty prompt.

use super::config_loader::load_prompt_overrides;
use super::id::AgentId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Get the built-in system prompt for an agent
pub fn get_default_prompt(agent: AgentId) -> &'static str {
    match agent {
        AgentId::CodeGen => include_str!("../prompts/code-gen.txt"),
        AgentId::CodeReview => include_str!("../prompts/code-review.txt"),
        AgentId::Security => include_str!("../prompts/security.txt"),
        AgentId::Performance => include_str!("../prompts/performance.txt"),
        AgentId::Architecture => include_str!("../prompts/architecture.txt"),
        AgentId::TestGen => include_str!("../prompts/test-gen.txt"),
        AgentId::Docs => include_str!("../prompts/docs.txt"),
        AgentId::BugFix => include_str!("../prompts/bug-fix.txt"),
        AgentId::Refactor => include_str!("../prompts/refactor.txt"),
        AgentId::Search => include_str!("../prompts/search.txt"),
    }
}

/// Result of resolving a prompt by agent name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptLookup {
    /// Agent whose prompt was returned
    pub agent: AgentId,
    /// The system prompt text
    pub text: String,
    /// True when the requested name was unknown and the default agent was used
    pub used_fallback: bool,
}

/// Default and user-overridden system prompts, keyed by agent
#[derive(Debug, Default)]
pub struct PromptRegistry {
    overrides: RwLock<HashMap<AgentId, String>>,
}

impl PromptRegistry {
    /// Create a registry with built-in prompts only
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry and load overrides from the global and project
    /// prompt directories (project overrides global)
    pub fn new_with_config(working_dir: &Path) -> Self {
        let registry = Self::new();
        registry.load_overrides(working_dir);
        registry
    }

    /// Load override files on top of whatever is already set.
    /// Returns how many overrides were applied.
    pub fn load_overrides(&self, working_dir: &Path) -> usize {
        let overrides = load_prompt_overrides(working_dir);
        let count = overrides.len();
        for (agent, prompt) in overrides {
            debug!(agent = %agent, "Loaded prompt override");
            self.set_override(agent, prompt);
        }
        count
    }

    /// System prompt for an agent: the override if one is set, else the default
    pub fn system_prompt(&self, agent: AgentId) -> String {
        if let Some(prompt) = self.overrides.read().get(&agent) {
            return prompt.clone();
        }
        get_default_prompt(agent).trim().to_string()
    }

    /// Resolve a prompt from an agent name.
    ///
    /// Unknown names fall back to the default agent. The fallback is logged
    /// and reported through [`PromptLookup::used_fallback`].
    pub fn resolve(&self, name: &str) -> PromptLookup {
        match name.parse::<AgentId>() {
            Ok(agent) => PromptLookup {
                agent,
                text: self.system_prompt(agent),
                used_fallback: false,
            },
            Err(_) => {
                warn!(
                    requested = name,
                    fallback = %AgentId::DEFAULT,
                    "Unknown agent requested, using default prompt"
                );
                PromptLookup {
                    agent: AgentId::DEFAULT,
                    text: self.system_prompt(AgentId::DEFAULT),
                    used_fallback: true,
                }
            }
        }
    }

    /// Override an agent's prompt. Blank prompts clear the override instead.
    pub fn set_override(&self, agent: AgentId, prompt: impl Into<String>) {
        let prompt = prompt.into();
        let trimmed = prompt.trim();
        if trimmed.is_empty() {
            self.clear_override(agent);
            return;
        }
        self.overrides.write().insert(agent, trimmed.to_string());
    }

    /// Remove an override, restoring the default prompt
    pub fn clear_override(&self, agent: AgentId) -> bool {
        self.overrides.write().remove(&agent).is_some()
    }

    /// Whether an agent currently has a user override
    pub fn has_override(&self, agent: AgentId) -> bool {
        self.overrides.read().contains_key(&agent)
    }
}
