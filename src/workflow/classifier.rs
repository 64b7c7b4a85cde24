//! Task classifier
//!
//! Decides from free text whether a request goes to one agent or to a
//! collaboration pattern. This is a priority cascade over keyword rules,
//! not a scored classifier: the first matching rule wins, so the order of
//! [`RULES`] is part of the behavior.

use super::pattern::PatternName;
use crate::agent::AgentId;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// How much coordination a task needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
        })
    }
}

/// Result of classifying a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskClassification {
    pub complexity: Complexity,
    /// Set only for multi-agent routes
    pub pattern: Option<PatternName>,
    /// Agents to involve, in execution order
    pub agents: Vec<AgentId>,
    /// True when no rule matched and the default agent was chosen
    pub used_fallback: bool,
}

impl TaskClassification {
    /// Route straight to a single agent (explicit persona selection)
    pub fn single(agent: AgentId) -> Self {
        Self {
            complexity: Complexity::Simple,
            pattern: None,
            agents: vec![agent],
            used_fallback: false,
        }
    }

    fn for_pattern(pattern: PatternName, complexity: Complexity) -> Self {
        Self {
            complexity,
            pattern: Some(pattern),
            agents: pattern.pattern().required_agents.to_vec(),
            used_fallback: false,
        }
    }

    fn fallback() -> Self {
        Self {
            used_fallback: true,
            ..Self::single(AgentId::DEFAULT)
        }
    }

    pub fn is_collaborative(&self) -> bool {
        self.agents.len() > 1
    }
}

/// Where a matching rule routes the task
#[derive(Debug, Clone, Copy)]
enum Route {
    Pattern(PatternName, Complexity),
    Agent(AgentId),
}

/// A rule matches when every group has at least one keyword in the input
struct Rule {
    groups: &'static [&'static [&'static str]],
    route: Route,
}

impl Rule {
    fn matches(&self, input: &str) -> bool {
        self.groups
            .iter()
            .all(|group| group.iter().any(|keyword| input.contains(keyword)))
    }
}

const RULES: &[Rule] = &[
    // Multi-agent patterns
    Rule {
        groups: &[&["full stack", "full-stack", "entire application", "complete system"]],
        route: Route::Pattern(PatternName::FullStackDevelopment, Complexity::Complex),
    },
    Rule {
        groups: &[&["legacy", "modernize", "migrate"]],
        route: Route::Pattern(PatternName::LegacyModernization, Complexity::Complex),
    },
    Rule {
        groups: &[&["review"], &["security", "performance"]],
        route: Route::Pattern(PatternName::CodeReview, Complexity::Moderate),
    },
    Rule {
        groups: &[&["bug", "error", "issue"]],
        route: Route::Pattern(PatternName::BugInvestigation, Complexity::Moderate),
    },
    // Single agents
    Rule {
        groups: &[&["test"]],
        route: Route::Agent(AgentId::TestGen),
    },
    Rule {
        groups: &[&["document", "docs", "readme", "comment"]],
        route: Route::Agent(AgentId::Docs),
    },
    Rule {
        groups: &[&["security", "vulnerab", "secure"]],
        route: Route::Agent(AgentId::Security),
    },
    Rule {
        groups: &[&["performance", "optimiz", "slow"]],
        route: Route::Agent(AgentId::Performance),
    },
    Rule {
        groups: &[&["refactor", "clean up", "restructure"]],
        route: Route::Agent(AgentId::Refactor),
    },
    Rule {
        groups: &[&["review"]],
        route: Route::Agent(AgentId::CodeReview),
    },
    Rule {
        groups: &[&["architect", "design", "structure"]],
        route: Route::Agent(AgentId::Architecture),
    },
    Rule {
        groups: &[&["search", "look up", "research"]],
        route: Route::Agent(AgentId::Search),
    },
    Rule {
        groups: &[&["fix", "debug"]],
        route: Route::Agent(AgentId::BugFix),
    },
];

/// Classify a task description
pub fn classify(input: &str) -> TaskClassification {
    let lowered = input.to_lowercase();

    let Some(rule) = RULES.iter().find(|rule| rule.matches(&lowered)) else {
        debug!(fallback = %AgentId::DEFAULT, "No classification rule matched, using default agent");
        return TaskClassification::fallback();
    };

    let classification = match rule.route {
        Route::Pattern(pattern, complexity) => TaskClassification::for_pattern(pattern, complexity),
        Route::Agent(agent) => TaskClassification::single(agent),
    };

    debug!(
        complexity = %classification.complexity,
        pattern = ?classification.pattern,
        agents = ?classification.agents,
        "Classified task"
    );
    classification
}
