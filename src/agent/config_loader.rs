//! Prompt override loader
//!
//! Loads system prompt overrides from YAML files:
//! - Global: ~/.config/collab-agent/prompts/<agent>.yaml (XDG_CONFIG_HOME)
//! - Project: .collab-agent/prompts/<agent>.yaml
//!
//! Project overrides replace global overrides for the same agent.

use super::id::AgentId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Contents of a prompt override file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptOverrideFile {
    /// Replacement system prompt
    pub prompt: String,
    /// Free-form note about why the override exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Load all prompt overrides from global and project directories
///
/// Priority: project overrides replace global overrides
pub fn load_prompt_overrides(working_dir: &Path) -> HashMap<AgentId, String> {
    let mut overrides = HashMap::new();

    if let Some(global_dir) = global_prompt_dir() {
        load_overrides_from_dir(&global_dir, &mut overrides);
    }

    load_overrides_from_dir(&project_prompt_dir(working_dir), &mut overrides);

    overrides
}

/// Global prompt directory, XDG_CONFIG_HOME or ~/.config
fn global_prompt_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("collab-agent").join("prompts"))
}

fn project_prompt_dir(working_dir: &Path) -> PathBuf {
    working_dir.join(".collab-agent").join("prompts")
}

/// Load every .yaml/.yml file in a directory; the file stem names the agent
fn load_overrides_from_dir(dir: &Path, overrides: &mut HashMap<AgentId, String>) {
    if !dir.is_dir() {
        return;
    }

    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return,
    };

    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();

        let ext = path.extension().and_then(|e| e.to_str());
        if !matches!(ext, Some("yaml") | Some("yml")) {
            continue;
        }

        let agent = match path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::parse::<AgentId>)
        {
            Some(Ok(agent)) => agent,
            Some(Err(e)) => {
                warn!(path = %path.display(), error = %e, "Skipping prompt override");
                continue;
            }
            None => continue,
        };

        match load_override_file(&path) {
            Ok(file) => {
                overrides.insert(agent, file.prompt);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load prompt override");
            }
        }
    }
}

/// Load a single prompt override from a YAML file
fn load_override_file(path: &Path) -> Result<PromptOverrideFile, String> {
    let content =
        std::fs::read_to_string(path).map_err(|e| format!("Failed to read file: {}", e))?;

    serde_yaml::from_str(&content).map_err(|e| format!("Failed to parse YAML: {}", e))
}

/// Save a prompt override to a YAML file
pub fn save_override_file(path: &Path, file: &PromptOverrideFile) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create directory: {}", e))?;
    }

    let content =
        serde_yaml::to_string(file).map_err(|e| format!("Failed to serialize override: {}", e))?;

    std::fs::write(path, content).map_err(|e| format!("Failed to write file: {}", e))
}

/// Path where a project-level override for `agent` would be saved
pub fn project_override_path(working_dir: &Path, agent: AgentId) -> PathBuf {
    project_prompt_dir(working_dir).join(format!("{}.yaml", agent))
}

/// Path where a global override for `agent` would be saved
pub fn global_override_path(agent: AgentId) -> Option<PathBuf> {
    global_prompt_dir().map(|d| d.join(format!("{}.yaml", agent)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_empty_dir() {
        let temp = TempDir::new().unwrap();
        let mut overrides = HashMap::new();
        load_overrides_from_dir(temp.path(), &mut overrides);
        assert!(overrides.is_empty());
    }

    #[test]
    fn test_load_single_override() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("docs.yaml"),
            "prompt: \"Document everything in French.\"\n",
        )
        .unwrap();

        let mut overrides = HashMap::new();
        load_overrides_from_dir(temp.path(), &mut overrides);
        assert_eq!(overrides.len(), 1);
        assert_eq!(
            overrides.get(&AgentId::Docs).map(String::as_str),
            Some("Document everything in French.")
        );
    }

    #[test]
    fn test_unknown_agent_and_bad_yaml_are_skipped() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("wizard.yaml"), "prompt: magic\n").unwrap();
        std::fs::write(temp.path().join("security.yaml"), "prompt: [unclosed\n").unwrap();
        std::fs::write(temp.path().join("notes.txt"), "prompt: ignored\n").unwrap();

        let mut overrides = HashMap::new();
        load_overrides_from_dir(temp.path(), &mut overrides);
        assert!(overrides.is_empty());
    }

    #[test]
    fn test_save_and_load_project_override() {
        let temp = TempDir::new().unwrap();
        let path = project_override_path(temp.path(), AgentId::TestGen);

        let file = PromptOverrideFile {
            prompt: "Only write property-based tests.".to_string(),
            description: Some("team convention".to_string()),
        };
        save_override_file(&path, &file).unwrap();

        assert_eq!(load_override_file(&path).unwrap(), file);

        let overrides = load_prompt_overrides(temp.path());
        assert_eq!(
            overrides.get(&AgentId::TestGen).map(String::as_str),
            Some("Only write property-based tests.")
        );
    }
}
