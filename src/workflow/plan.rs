//! Workflow plan model
//!
//! A plan is the execution record for one task: an ordered list of steps,
//! one per agent, and a cursor pointing at the next step to run.
//!
//! # State machine
//!
//! ```text
//! Building ──execute──▶ InProgress ──execute──▶ ... ──execute──▶ Complete
//! (index 0)             (0 < index < len)                         (index == len)
//! ```
//!
//! Transitions only happen through [`WorkflowPlan::record_output`], one step
//! at a time, and never go backwards. `final_output` is set exactly when the
//! plan reaches `Complete`.

use super::classifier::{Complexity, TaskClassification};
use super::error::{WorkflowError, WorkflowResult};
use super::pattern::PatternName;
use super::synthesis::Synthesizer;
use super::transcript::Transcript;
use crate::agent::AgentId;
use crate::message::TokenUsage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique plan identifier
pub type PlanId = Uuid;

/// One agent's turn in a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub agent: AgentId,
    /// The original task description, before enrichment
    pub input_text: String,
    /// Set once, when the step executes
    pub output_text: Option<String>,
    pub usage: Option<TokenUsage>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowStep {
    pub fn new(agent: AgentId, input_text: impl Into<String>) -> Self {
        Self {
            agent,
            input_text: input_text.into(),
            output_text: None,
            usage: None,
            completed_at: None,
        }
    }

    pub fn is_executed(&self) -> bool {
        self.output_text.is_some()
    }
}

/// Lifecycle state derived from the step cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanState {
    Building,
    InProgress,
    Complete,
}

/// Execution record for one task run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowPlan {
    pub id: PlanId,
    pub complexity: Complexity,
    pub pattern: Option<PatternName>,
    pub created_at: DateTime<Utc>,
    steps: Vec<WorkflowStep>,
    current_step_index: usize,
    final_output: Option<String>,
}

/// The prompt to send for the step at `index`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingStep {
    pub plan_id: PlanId,
    pub index: usize,
    pub agent: AgentId,
    /// Raw task with prior outputs prepended
    pub prompt: String,
}

/// What a successful step execution reports back
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub step_output: String,
    pub is_complete: bool,
    pub next_agent: Option<AgentId>,
    pub usage: Option<TokenUsage>,
}

/// Read-only progress snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowProgress {
    pub plan_id: PlanId,
    pub state: PlanState,
    pub current_step: usize,
    pub total_steps: usize,
    pub completed_agents: Vec<AgentId>,
    pub next_agent: Option<AgentId>,
    pub is_complete: bool,
}

impl WorkflowPlan {
    /// Build a plan with one step per classified agent
    pub fn new(user_input: &str, classification: &TaskClassification) -> WorkflowResult<Self> {
        if classification.agents.is_empty() {
            return Err(WorkflowError::InvalidClassification);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            complexity: classification.complexity,
            pattern: classification.pattern,
            created_at: Utc::now(),
            steps: classification
                .agents
                .iter()
                .map(|agent| WorkflowStep::new(*agent, user_input))
                .collect(),
            current_step_index: 0,
            final_output: None,
        })
    }

    pub fn steps(&self) -> &[WorkflowStep] {
        &self.steps
    }

    pub fn current_step_index(&self) -> usize {
        self.current_step_index
    }

    pub fn final_output(&self) -> Option<&str> {
        self.final_output.as_deref()
    }

    pub fn is_complete(&self) -> bool {
        self.current_step_index == self.steps.len()
    }

    pub fn state(&self) -> PlanState {
        if self.is_complete() {
            PlanState::Complete
        } else if self.current_step_index == 0 {
            PlanState::Building
        } else {
            PlanState::InProgress
        }
    }

    /// Agent of the step that runs next, if any
    pub fn next_agent(&self) -> Option<AgentId> {
        self.steps.get(self.current_step_index).map(|s| s.agent)
    }

    /// Agents used by this plan, in order
    pub fn agents(&self) -> Vec<AgentId> {
        self.steps.iter().map(|s| s.agent).collect()
    }

    /// Sum of reported token usage across executed steps
    pub fn total_usage(&self) -> TokenUsage {
        self.steps
            .iter()
            .filter_map(|s| s.usage)
            .fold(TokenUsage::default(), |acc, u| acc + u)
    }

    /// Prepare the next step: its agent and enriched prompt
    pub fn next_step(&self) -> WorkflowResult<PendingStep> {
        if self.is_complete() {
            return Err(WorkflowError::WorkflowAlreadyComplete(self.id));
        }

        let index = self.current_step_index;
        let step = self.steps.get(index).ok_or(WorkflowError::StepNotFound {
            plan_id: self.id,
            index,
        })?;

        let transcript = Transcript::from_steps(&self.steps[..index]);

        Ok(PendingStep {
            plan_id: self.id,
            index,
            agent: step.agent,
            prompt: transcript.enrich(&step.input_text),
        })
    }

    /// Record the output of step `index` and advance the cursor.
    ///
    /// `index` must be the current step; anything else means another caller
    /// got there first. When the last step is recorded the final document is
    /// synthesized. If synthesis fails the plan is left as it was.
    pub fn record_output(
        &mut self,
        index: usize,
        output: String,
        usage: Option<TokenUsage>,
        synthesizer: &Synthesizer,
    ) -> WorkflowResult<StepOutcome> {
        if self.is_complete() {
            return Err(WorkflowError::WorkflowAlreadyComplete(self.id));
        }
        if index != self.current_step_index {
            return Err(WorkflowError::StaleStep {
                plan_id: self.id,
                index,
            });
        }

        let plan_id = self.id;
        let step = self
            .steps
            .get_mut(index)
            .ok_or(WorkflowError::StepNotFound { plan_id, index })?;
        if step.is_executed() {
            return Err(WorkflowError::StaleStep { plan_id, index });
        }

        step.output_text = Some(output.clone());
        step.usage = usage;
        step.completed_at = Some(Utc::now());
        self.current_step_index += 1;

        if self.is_complete() {
            match synthesizer.render(&self.steps) {
                Ok(document) => self.final_output = Some(document),
                Err(e) => {
                    self.current_step_index -= 1;
                    let step = &mut self.steps[index];
                    step.output_text = None;
                    step.usage = None;
                    step.completed_at = None;
                    return Err(e);
                }
            }
        }

        Ok(StepOutcome {
            step_output: output,
            is_complete: self.is_complete(),
            next_agent: self.next_agent(),
            usage,
        })
    }

    pub fn progress(&self) -> WorkflowProgress {
        WorkflowProgress {
            plan_id: self.id,
            state: self.state(),
            current_step: self.current_step_index,
            total_steps: self.steps.len(),
            completed_agents: self.steps[..self.current_step_index]
                .iter()
                .map(|s| s.agent)
                .collect(),
            next_agent: self.next_agent(),
            is_complete: self.is_complete(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::classifier::classify;

    fn synthesizer() -> Synthesizer {
        Synthesizer::new().unwrap()
    }

    #[test]
    fn test_new_plan_has_one_step_per_agent() {
        let classification = classify("build a full stack blog");
        let plan = WorkflowPlan::new("build a full stack blog", &classification).unwrap();

        assert_eq!(plan.steps().len(), classification.agents.len());
        assert_eq!(plan.current_step_index(), 0);
        assert_eq!(plan.state(), PlanState::Building);
        assert!(plan.final_output().is_none());
        assert!(plan.steps().iter().all(|s| s.input_text == "build a full stack blog"));
        assert!(plan.steps().iter().all(|s| s.output_text.is_none()));
    }

    #[test]
    fn test_empty_classification_is_rejected() {
        let classification = TaskClassification {
            agents: Vec::new(),
            ..TaskClassification::single(AgentId::CodeGen)
        };
        assert!(matches!(
            WorkflowPlan::new("x", &classification),
            Err(WorkflowError::InvalidClassification)
        ));
    }

    #[test]
    fn test_first_step_prompt_is_raw_task() {
        let plan = WorkflowPlan::new("task", &classify("full stack app")).unwrap();
        let pending = plan.next_step().unwrap();
        assert_eq!(pending.index, 0);
        assert_eq!(pending.agent, AgentId::Architecture);
        assert_eq!(pending.prompt, "task");
    }

    #[test]
    fn test_state_transitions() {
        let synth = synthesizer();
        let mut plan = WorkflowPlan::new("t", &classify("review for performance")).unwrap();
        assert_eq!(plan.steps().len(), 3);

        let outcome = plan.record_output(0, "looks ok".into(), None, &synth).unwrap();
        assert_eq!(plan.state(), PlanState::InProgress);
        assert!(!outcome.is_complete);
        assert_eq!(outcome.next_agent, Some(AgentId::Security));

        let pending = plan.next_step().unwrap();
        assert!(pending.prompt.contains("[code-review]\nlooks ok"));
        assert!(pending.prompt.ends_with("Task:\nt"));

        plan.record_output(1, "no injection".into(), None, &synth).unwrap();
        let outcome = plan
            .record_output(2, "O(n)".into(), Some(TokenUsage { input: 3, output: 4 }), &synth)
            .unwrap();
        assert!(outcome.is_complete);
        assert_eq!(outcome.next_agent, None);
        assert_eq!(plan.state(), PlanState::Complete);
        assert!(plan.final_output().unwrap().contains("## Performance"));
        assert_eq!(plan.total_usage(), TokenUsage { input: 3, output: 4 });
    }

    #[test]
    fn test_complete_plan_rejects_more_work() {
        let synth = synthesizer();
        let mut plan = WorkflowPlan::new("t", &TaskClassification::single(AgentId::Docs)).unwrap();
        plan.record_output(0, "done".into(), None, &synth).unwrap();

        assert!(matches!(plan.next_step(), Err(WorkflowError::WorkflowAlreadyComplete(_))));
        assert!(matches!(
            plan.record_output(0, "again".into(), None, &synth),
            Err(WorkflowError::WorkflowAlreadyComplete(_))
        ));
        assert_eq!(plan.steps()[0].output_text.as_deref(), Some("done"));
    }

    #[test]
    fn test_stale_index_is_rejected() {
        let synth = synthesizer();
        let mut plan = WorkflowPlan::new("t", &classify("there is a bug")).unwrap();
        plan.record_output(0, "first".into(), None, &synth).unwrap();

        let err = plan.record_output(0, "late".into(), None, &synth).unwrap_err();
        assert!(matches!(err, WorkflowError::StaleStep { index: 0, .. }));
        assert_eq!(plan.steps()[0].output_text.as_deref(), Some("first"));
        assert_eq!(plan.current_step_index(), 1);
    }

    #[test]
    fn test_progress_reports_completed_agents() {
        let synth = synthesizer();
        let mut plan = WorkflowPlan::new("t", &classify("there is a bug")).unwrap();
        plan.record_output(0, "a".into(), None, &synth).unwrap();
        plan.record_output(1, "b".into(), None, &synth).unwrap();

        let progress = plan.progress();
        assert_eq!(progress.current_step, 2);
        assert_eq!(progress.total_steps, 4);
        assert_eq!(progress.completed_agents, vec![AgentId::Search, AgentId::BugFix]);
        assert_eq!(progress.next_agent, Some(AgentId::TestGen));
        assert!(!progress.is_complete);
        assert_eq!(progress, plan.progress());
    }
}
