//! Agent personas
//!
//! Agents are a closed set of personas ([`AgentId`]). An agent is nothing
//! more than a system prompt; the [`PromptRegistry`] maps each one to its
//! built-in prompt or a user override loaded from YAML:
//! - Global: ~/.config/collab-agent/prompts/<agent>.yaml
//! - Project: .collab-agent/prompts/<agent>.yaml

mod config_loader;
mod id;
pub mod prompt;

pub use config_loader::{
    global_override_path, load_prompt_overrides, project_override_path, save_override_file,
    PromptOverrideFile,
};
pub use id::{title_case, AgentId, ParseAgentError};
pub use prompt::{get_default_prompt, PromptLookup, PromptRegistry};
