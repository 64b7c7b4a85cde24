//! Workflow event types
//!
//! These events are emitted while a plan runs and consumed by output
//! adapters (the REPL, JSON logs). The engine never prints anything itself;
//! everything a front end shows about progress comes through here.

use crate::agent::AgentId;
use crate::message::TokenUsage;
use crate::workflow::{Complexity, PatternName, PlanId};
use serde::Serialize;
use tokio::sync::mpsc;

/// Events emitted during workflow execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// A plan was built from a classification
    PlanCreated {
        plan_id: PlanId,
        complexity: Complexity,
        pattern: Option<PatternName>,
        agents: Vec<AgentId>,
    },
    /// An agent is about to be called
    StepStarted {
        plan_id: PlanId,
        index: usize,
        total: usize,
        agent: AgentId,
    },
    /// An agent returned and its output was recorded
    StepCompleted {
        plan_id: PlanId,
        index: usize,
        agent: AgentId,
        output: String,
        usage: Option<TokenUsage>,
    },
    /// An agent call failed; the plan did not advance
    StepFailed {
        plan_id: PlanId,
        index: usize,
        agent: AgentId,
        error: String,
    },
    /// Every step ran and the final document is ready
    WorkflowComplete {
        plan_id: PlanId,
        final_output: String,
        usage: TokenUsage,
    },
}

impl WorkflowEvent {
    pub fn plan_id(&self) -> PlanId {
        match self {
            WorkflowEvent::PlanCreated { plan_id, .. }
            | WorkflowEvent::StepStarted { plan_id, .. }
            | WorkflowEvent::StepCompleted { plan_id, .. }
            | WorkflowEvent::StepFailed { plan_id, .. }
            | WorkflowEvent::WorkflowComplete { plan_id, .. } => *plan_id,
        }
    }
}

/// Sending half handed to the engine
pub type EventSender = mpsc::UnboundedSender<WorkflowEvent>;

/// Send an event if anyone is listening. A dropped receiver is not an error.
pub(crate) fn emit(events: Option<&EventSender>, event: WorkflowEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}
