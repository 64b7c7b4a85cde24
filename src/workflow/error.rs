//! Error types for the workflow engine

use super::plan::PlanId;
use crate::agent::AgentId;
use crate::provider::ChatError;
use thiserror::Error;

/// Errors that can occur while building or driving a workflow plan
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The classifier produced no agents
    #[error("Invalid classification: no agents to run")]
    InvalidClassification,

    /// The chat call for a step failed; the step was not recorded
    #[error("Agent '{agent}' failed: {source}")]
    ChatClient {
        agent: AgentId,
        #[source]
        source: ChatError,
    },

    #[error("Workflow {0} is already complete")]
    WorkflowAlreadyComplete(PlanId),

    #[error("Workflow plan not found: {0}")]
    PlanNotFound(PlanId),

    #[error("Workflow {plan_id} has no step {index}")]
    StepNotFound { plan_id: PlanId, index: usize },

    /// Another caller advanced the plan while this step was in flight
    #[error("Step {index} of workflow {plan_id} was already executed")]
    StaleStep { plan_id: PlanId, index: usize },

    #[error("Synthesis failed: {0}")]
    Synthesis(String),
}

impl From<handlebars::RenderError> for WorkflowError {
    fn from(err: handlebars::RenderError) -> Self {
        WorkflowError::Synthesis(err.to_string())
    }
}

/// Result type alias for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;
