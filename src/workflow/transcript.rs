//! Transcript - context handed from earlier steps to later ones
//!
//! Each step of a plan sees the raw task plus everything the agents before
//! it produced. The transcript is an immutable accumulator: it is folded
//! from completed steps and rendered into the prompt, never mutated in place.

use super::plan::WorkflowStep;
use crate::agent::AgentId;

/// One prior agent output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub agent: AgentId,
    pub output: String,
}

/// Ordered outputs of the steps executed so far
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a transcript extended with one more output
    pub fn with_entry(mut self, agent: AgentId, output: impl Into<String>) -> Self {
        self.entries.push(TranscriptEntry {
            agent,
            output: output.into(),
        });
        self
    }

    /// Fold the executed steps (those with output) in step order
    pub fn from_steps(steps: &[WorkflowStep]) -> Self {
        steps.iter().fold(Self::new(), |transcript, step| match &step.output_text {
            Some(output) => transcript.with_entry(step.agent, output.as_str()),
            None => transcript,
        })
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the prompt for the next step.
    ///
    /// With no prior outputs the task is returned unchanged. Otherwise every
    /// prior output is prepended under its agent label, blank-line separated.
    pub fn enrich(&self, task: &str) -> String {
        if self.entries.is_empty() {
            return task.to_string();
        }

        let mut parts = Vec::with_capacity(self.entries.len() + 2);
        parts.push("Previous agent outputs:".to_string());
        for entry in &self.entries {
            parts.push(format!("[{}]\n{}", entry.agent, entry.output));
        }
        parts.push(format!("Task:\n{}", task));

        parts.join("\n\n")
    }
}
