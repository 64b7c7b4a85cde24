//! Collaboration patterns
//!
//! A pattern is a named, fixed pipeline of agents. Patterns are static
//! configuration; [`validate_patterns`] checks them once at startup.

use crate::agent::AgentId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Name of a collaboration pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternName {
    FullStackDevelopment,
    LegacyModernization,
    CodeReview,
    BugInvestigation,
}

impl PatternName {
    pub const ALL: [PatternName; 4] = [
        PatternName::FullStackDevelopment,
        PatternName::LegacyModernization,
        PatternName::CodeReview,
        PatternName::BugInvestigation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatternName::FullStackDevelopment => "full-stack-development",
            PatternName::LegacyModernization => "legacy-modernization",
            PatternName::CodeReview => "code-review",
            PatternName::BugInvestigation => "bug-investigation",
        }
    }

    /// The static pattern definition
    pub fn pattern(&self) -> CollaborationPattern {
        match self {
            PatternName::FullStackDevelopment => CollaborationPattern {
                name: *self,
                description: "Design, implement, secure, test and document a complete application.",
                required_agents: &[
                    AgentId::Architecture,
                    AgentId::CodeGen,
                    AgentId::Security,
                    AgentId::TestGen,
                    AgentId::Docs,
                ],
                execution_mode: ExecutionMode::Sequential,
                dependencies: &[
                    (AgentId::CodeGen, &[AgentId::Architecture]),
                    (AgentId::Security, &[AgentId::CodeGen]),
                    (AgentId::TestGen, &[AgentId::CodeGen]),
                    (AgentId::Docs, &[AgentId::Architecture, AgentId::CodeGen]),
                ],
            },
            PatternName::LegacyModernization => CollaborationPattern {
                name: *self,
                description: "Plan and carry out the modernization of a legacy codebase.",
                required_agents: &[
                    AgentId::Architecture,
                    AgentId::Refactor,
                    AgentId::TestGen,
                    AgentId::Docs,
                ],
                execution_mode: ExecutionMode::Sequential,
                dependencies: &[
                    (AgentId::Refactor, &[AgentId::Architecture]),
                    (AgentId::TestGen, &[AgentId::Refactor]),
                    (AgentId::Docs, &[AgentId::Architecture, AgentId::Refactor]),
                ],
            },
            PatternName::CodeReview => CollaborationPattern {
                name: *self,
                description: "Review code for quality, security and performance.",
                required_agents: &[AgentId::CodeReview, AgentId::Security, AgentId::Performance],
                execution_mode: ExecutionMode::Parallel,
                dependencies: &[],
            },
            PatternName::BugInvestigation => CollaborationPattern {
                name: *self,
                description: "Research, fix, test and profile a reported defect.",
                required_agents: &[
                    AgentId::Search,
                    AgentId::BugFix,
                    AgentId::TestGen,
                    AgentId::Performance,
                ],
                execution_mode: ExecutionMode::Sequential,
                dependencies: &[
                    (AgentId::BugFix, &[AgentId::Search]),
                    (AgentId::TestGen, &[AgentId::BugFix]),
                    (AgentId::Performance, &[AgentId::BugFix]),
                ],
            },
        }
    }
}

impl fmt::Display for PatternName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown collaboration pattern: {0}")]
pub struct ParsePatternError(pub String);

impl FromStr for PatternName {
    type Err = ParsePatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        PatternName::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| ParsePatternError(s.to_string()))
    }
}

/// How the agents of a pattern relate to each other.
///
/// Steps of a plan always run one at a time; `Parallel` only records that
/// the agents do not need each other's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Sequential,
    Parallel,
}

/// Static definition of a collaboration pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollaborationPattern {
    pub name: PatternName,
    pub description: &'static str,
    /// Agents in execution order
    pub required_agents: &'static [AgentId],
    pub execution_mode: ExecutionMode,
    /// Agent -> agents whose output it depends on
    pub dependencies: &'static [(AgentId, &'static [AgentId])],
}

impl CollaborationPattern {
    /// Dependencies as an ordered map
    pub fn dependency_map(&self) -> IndexMap<AgentId, Vec<AgentId>> {
        self.dependencies
            .iter()
            .map(|(agent, deps)| (*agent, deps.to_vec()))
            .collect()
    }

    /// Agents this agent depends on (empty if none)
    pub fn depends_on(&self, agent: AgentId) -> &'static [AgentId] {
        self.dependencies
            .iter()
            .find(|(a, _)| *a == agent)
            .map(|(_, deps)| *deps)
            .unwrap_or(&[])
    }

    /// Check that the pattern is internally consistent
    pub fn validate(&self) -> Result<(), PatternValidationError> {
        let name = self.name;

        if self.required_agents.is_empty() {
            return Err(PatternValidationError::NoAgents(name));
        }

        let mut seen = HashSet::new();
        for agent in self.required_agents {
            if !seen.insert(*agent) {
                return Err(PatternValidationError::DuplicateAgent { pattern: name, agent: *agent });
            }
        }

        let position = |agent: AgentId| self.required_agents.iter().position(|a| *a == agent);

        for (agent, deps) in self.dependencies {
            let agent_pos = position(*agent).ok_or(PatternValidationError::UnknownAgent {
                pattern: name,
                agent: *agent,
            })?;
            for dep in *deps {
                let dep_pos = position(*dep).ok_or(PatternValidationError::UnknownAgent {
                    pattern: name,
                    agent: *dep,
                })?;
                if dep_pos >= agent_pos {
                    return Err(PatternValidationError::DependencyOrder {
                        pattern: name,
                        agent: *agent,
                        dependency: *dep,
                    });
                }
            }
        }

        Ok(())
    }
}

/// Serializable view of a pattern, for listings
#[derive(Debug, Clone, Serialize)]
pub struct PatternSummary {
    pub name: PatternName,
    pub description: &'static str,
    pub agents: Vec<AgentId>,
    pub execution_mode: ExecutionMode,
    pub dependencies: IndexMap<AgentId, Vec<AgentId>>,
}

impl From<CollaborationPattern> for PatternSummary {
    fn from(pattern: CollaborationPattern) -> Self {
        Self {
            name: pattern.name,
            description: pattern.description,
            agents: pattern.required_agents.to_vec(),
            execution_mode: pattern.execution_mode,
            dependencies: pattern.dependency_map(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternValidationError {
    #[error("Pattern '{0}' has no agents")]
    NoAgents(PatternName),
    #[error("Pattern '{pattern}' lists agent '{agent}' twice")]
    DuplicateAgent { pattern: PatternName, agent: AgentId },
    #[error("Pattern '{pattern}' references agent '{agent}' outside its required agents")]
    UnknownAgent { pattern: PatternName, agent: AgentId },
    #[error("Pattern '{pattern}': '{agent}' depends on '{dependency}' which does not run before it")]
    DependencyOrder {
        pattern: PatternName,
        agent: AgentId,
        dependency: AgentId,
    },
}

/// Validate every built-in pattern
pub fn validate_patterns() -> Result<(), PatternValidationError> {
    PatternName::ALL.iter().try_for_each(|name| name.pattern().validate())
}
