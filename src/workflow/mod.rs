//! Multi-agent workflow
//!
//! A task is classified into a single agent or a collaboration pattern,
//! turned into a plan of sequential steps, and driven by the engine until a
//! synthesized document is produced.

mod classifier;
mod engine;
mod error;
mod pattern;
mod plan;
mod synthesis;
mod transcript;

pub use classifier::{classify, Complexity, TaskClassification};
pub use engine::WorkflowEngine;
pub use error::{WorkflowError, WorkflowResult};
pub use pattern::{
    validate_patterns, CollaborationPattern, ExecutionMode, ParsePatternError, PatternName,
    PatternSummary, PatternValidationError,
};
pub use plan::{
    PendingStep, PlanId, PlanState, StepOutcome, WorkflowPlan, WorkflowProgress, WorkflowStep,
};
pub use synthesis::Synthesizer;
pub use transcript::{Transcript, TranscriptEntry};
