//! Agent identifiers
//!
//! Every persona the assistant can route to is a variant of [`AgentId`].
//! The wire name (kebab-case) is what gets stored, logged and accepted on
//! the command line; the display name is what shows up in synthesized output.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of an agent persona
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentId {
    CodeGen,
    CodeReview,
    Security,
    Performance,
    Architecture,
    TestGen,
    Docs,
    BugFix,
    Refactor,
    Search,
}

impl AgentId {
    /// All known agents, in listing order
    pub const ALL: [AgentId; 10] = [
        AgentId::CodeGen,
        AgentId::CodeReview,
        AgentId::Security,
        AgentId::Performance,
        AgentId::Architecture,
        AgentId::TestGen,
        AgentId::Docs,
        AgentId::BugFix,
        AgentId::Refactor,
        AgentId::Search,
    ];

    /// Agent used when nothing more specific applies
    pub const DEFAULT: AgentId = AgentId::CodeGen;

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentId::CodeGen => "code-gen",
            AgentId::CodeReview => "code-review",
            AgentId::Security => "security",
            AgentId::Performance => "performance",
            AgentId::Architecture => "architecture",
            AgentId::TestGen => "test-gen",
            AgentId::Docs => "docs",
            AgentId::BugFix => "bug-fix",
            AgentId::Refactor => "refactor",
            AgentId::Search => "search",
        }
    }

    /// Title-cased wire name, e.g. `bug-fix` -> `Bug Fix`
    pub fn display_name(&self) -> String {
        title_case(self.as_str())
    }

    /// Short description shown in agent listings
    pub fn description(&self) -> &'static str {
        match self {
            AgentId::CodeGen => "Writes new code from a description.",
            AgentId::CodeReview => "Reviews code for correctness, style and maintainability.",
            AgentId::Security => "Audits code and designs for security weaknesses.",
            AgentId::Performance => "Finds bottlenecks and proposes optimizations.",
            AgentId::Architecture => "Designs system structure, components and interfaces.",
            AgentId::TestGen => "Writes unit and integration tests.",
            AgentId::Docs => "Writes documentation, READMEs and code comments.",
            AgentId::BugFix => "Diagnoses defects and produces fixes.",
            AgentId::Refactor => "Restructures and modernizes existing code.",
            AgentId::Search => "Researches prior art, APIs and known issues.",
        }
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a known agent
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown agent: {0}")]
pub struct ParseAgentError(pub String);

impl FromStr for AgentId {
    type Err = ParseAgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        AgentId::ALL
            .iter()
            .copied()
            .find(|agent| agent.as_str() == normalized)
            .ok_or_else(|| ParseAgentError(s.to_string()))
    }
}

/// Title-case a kebab-case name
pub fn title_case(name: &str) -> String {
    name.split(['-', '_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_wire_names() {
        for agent in AgentId::ALL {
            assert_eq!(agent.as_str().parse::<AgentId>().unwrap(), agent);
        }
    }

    #[test]
    fn test_parse_is_lenient_about_case_and_underscores() {
        assert_eq!("Test_Gen".parse::<AgentId>().unwrap(), AgentId::TestGen);
        assert_eq!(" docs ".parse::<AgentId>().unwrap(), AgentId::Docs);
    }

    #[test]
    fn test_parse_unknown() {
        let err = "wizard".parse::<AgentId>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown agent: wizard");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(AgentId::BugFix.display_name(), "Bug Fix");
        assert_eq!(AgentId::Docs.display_name(), "Docs");
        assert_eq!(AgentId::CodeGen.display_name(), "Code Gen");
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&AgentId::TestGen).unwrap();
        assert_eq!(json, "\"test-gen\"");
        let parsed: AgentId = serde_json::from_str("\"bug-fix\"").unwrap();
        assert_eq!(parsed, AgentId::BugFix);
    }
}
