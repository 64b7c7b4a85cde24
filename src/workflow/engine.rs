//! Workflow engine
//!
//! Owns the active plans and drives them one step at a time. The chat call
//! for a step happens without holding the plan lock, so a slow model never
//! blocks progress queries. When the call returns the lock is re-taken and
//! the output is recorded only if the plan is still at that step.

use super::classifier::TaskClassification;
use super::error::{WorkflowError, WorkflowResult};
use super::plan::{PendingStep, PlanId, StepOutcome, WorkflowPlan, WorkflowProgress};
use super::synthesis::Synthesizer;
use crate::events::{emit, EventSender, WorkflowEvent};
use crate::message::ChatMessage;
use crate::provider::{ChatClient, ChatError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub struct WorkflowEngine {
    plans: RwLock<HashMap<PlanId, WorkflowPlan>>,
    client: Arc<dyn ChatClient>,
    synthesizer: Synthesizer,
}

impl WorkflowEngine {
    pub fn new(client: Arc<dyn ChatClient>) -> WorkflowResult<Self> {
        Ok(Self {
            plans: RwLock::new(HashMap::new()),
            client,
            synthesizer: Synthesizer::new()?,
        })
    }

    /// Build and register a plan for `user_input`; returns a snapshot
    pub async fn create_plan(
        &self,
        user_input: &str,
        classification: &TaskClassification,
    ) -> WorkflowResult<WorkflowPlan> {
        let plan = WorkflowPlan::new(user_input, classification)?;

        info!(
            plan_id = %plan.id,
            pattern = ?plan.pattern,
            steps = plan.steps().len(),
            "Created workflow plan"
        );
        self.plans.write().await.insert(plan.id, plan.clone());
        Ok(plan)
    }

    /// Run the next pending step of a plan
    pub async fn execute_next_step(&self, plan_id: PlanId) -> WorkflowResult<StepOutcome> {
        self.execute_step(plan_id, None).await
    }

    async fn execute_step(
        &self,
        plan_id: PlanId,
        events: Option<&EventSender>,
    ) -> WorkflowResult<StepOutcome> {
        let (pending, total) = {
            let plans = self.plans.read().await;
            let plan = plans
                .get(&plan_id)
                .ok_or(WorkflowError::PlanNotFound(plan_id))?;
            (plan.next_step()?, plan.steps().len())
        };
        let PendingStep {
            index,
            agent,
            prompt,
            ..
        } = pending;

        debug!(plan_id = %plan_id, index, agent = %agent, "Executing workflow step");
        emit(
            events,
            WorkflowEvent::StepStarted {
                plan_id,
                index,
                total,
                agent,
            },
        );

        // Blank output is a failed step, whatever the client
        let result = self
            .client
            .chat(&[ChatMessage::user(prompt)], agent)
            .await
            .and_then(|response| {
                if response.content.trim().is_empty() {
                    Err(ChatError::EmptyContent { agent })
                } else {
                    Ok(response)
                }
            });
        let response = match result {
            Ok(response) => response,
            Err(source) => {
                warn!(plan_id = %plan_id, index, agent = %agent, error = %source, "Workflow step failed");
                emit(
                    events,
                    WorkflowEvent::StepFailed {
                        plan_id,
                        index,
                        agent,
                        error: source.to_string(),
                    },
                );
                return Err(WorkflowError::ChatClient { agent, source });
            }
        };

        let mut plans = self.plans.write().await;
        let plan = plans
            .get_mut(&plan_id)
            .ok_or(WorkflowError::PlanNotFound(plan_id))?;
        let outcome =
            plan.record_output(index, response.content, response.usage, &self.synthesizer)?;

        emit(
            events,
            WorkflowEvent::StepCompleted {
                plan_id,
                index,
                agent,
                output: outcome.step_output.clone(),
                usage: outcome.usage,
            },
        );
        if let Some(final_output) = plan.final_output().filter(|_| outcome.is_complete) {
            info!(plan_id = %plan_id, "Workflow complete");
            emit(
                events,
                WorkflowEvent::WorkflowComplete {
                    plan_id,
                    final_output: final_output.to_string(),
                    usage: plan.total_usage(),
                },
            );
        }

        Ok(outcome)
    }

    /// Run every remaining step and return the completed plan.
    ///
    /// Stops at the first failing step; the plan stays registered at that
    /// step so the caller can retry or clear it.
    pub async fn run_to_completion(
        &self,
        plan_id: PlanId,
        events: Option<&EventSender>,
    ) -> WorkflowResult<WorkflowPlan> {
        loop {
            let outcome = self.execute_step(plan_id, events).await?;
            if outcome.is_complete {
                break;
            }
        }
        self.plan(plan_id).await
    }

    pub async fn progress(&self, plan_id: PlanId) -> WorkflowResult<WorkflowProgress> {
        self.plans
            .read()
            .await
            .get(&plan_id)
            .map(WorkflowPlan::progress)
            .ok_or(WorkflowError::PlanNotFound(plan_id))
    }

    /// Snapshot of a plan
    pub async fn plan(&self, plan_id: PlanId) -> WorkflowResult<WorkflowPlan> {
        self.plans
            .read()
            .await
            .get(&plan_id)
            .cloned()
            .ok_or(WorkflowError::PlanNotFound(plan_id))
    }

    /// Drop a plan. Later operations on it return `PlanNotFound`.
    pub async fn clear(&self, plan_id: PlanId) -> WorkflowResult<()> {
        self.plans
            .write()
            .await
            .remove(&plan_id)
            .ok_or(WorkflowError::PlanNotFound(plan_id))?;
        debug!(plan_id = %plan_id, "Cleared workflow plan");
        Ok(())
    }

    pub async fn active_plans(&self) -> Vec<PlanId> {
        self.plans.read().await.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentId;
    use crate::message::TokenUsage;
    use crate::provider::ChatResponse;
    use crate::workflow::classifier::classify;
    use crate::workflow::plan::PlanState;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    /// Answers with `<agent>:<prompt length>`
    struct EchoClient {
        calls: AtomicUsize,
    }

    impl EchoClient {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ChatClient for EchoClient {
        async fn chat(
            &self,
            messages: &[ChatMessage],
            agent: AgentId,
        ) -> Result<ChatResponse, ChatError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let prompt = &messages[0].content;
            Ok(ChatResponse {
                content: format!("{}:{}", agent, prompt.len()),
                usage: Some(TokenUsage {
                    input: prompt.len() as u64,
                    output: 1,
                }),
                model: None,
            })
        }
    }

    /// Fails while `failing` is set
    struct FlakyClient {
        failing: AtomicBool,
    }

    #[async_trait]
    impl ChatClient for FlakyClient {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            agent: AgentId,
        ) -> Result<ChatResponse, ChatError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(ChatError::Api {
                    status: 503,
                    message: "overloaded".into(),
                });
            }
            Ok(ChatResponse {
                content: format!("{} ok", agent),
                usage: None,
                model: None,
            })
        }
    }

    /// Answers with whitespace until `blank` is cleared
    struct BlankClient {
        blank: AtomicBool,
    }

    #[async_trait]
    impl ChatClient for BlankClient {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            agent: AgentId,
        ) -> Result<ChatResponse, ChatError> {
            let content = if self.blank.load(Ordering::SeqCst) {
                "  \n".to_string()
            } else {
                format!("{} ok", agent)
            };
            Ok(ChatResponse {
                content,
                usage: None,
                model: None,
            })
        }
    }

    /// Records every prompt it receives
    struct RecordingClient {
        prompts: parking_lot::Mutex<Vec<(AgentId, String)>>,
    }

    #[async_trait]
    impl ChatClient for RecordingClient {
        async fn chat(
            &self,
            messages: &[ChatMessage],
            agent: AgentId,
        ) -> Result<ChatResponse, ChatError> {
            self.prompts.lock().push((agent, messages[0].content.clone()));
            Ok(ChatResponse {
                content: format!("output of {}", agent),
                usage: None,
                model: None,
            })
        }
    }

    #[tokio::test]
    async fn test_single_agent_task() {
        let client = EchoClient::new();
        let engine = WorkflowEngine::new(client.clone()).unwrap();
        let input = "generate a function to reverse a string";
        let id = engine.create_plan(input, &classify(input)).await.unwrap().id;

        let outcome = engine.execute_next_step(id).await.unwrap();
        assert!(outcome.is_complete);
        assert_eq!(outcome.next_agent, None);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);

        let plan = engine.plan(id).await.unwrap();
        assert_eq!(plan.state(), PlanState::Complete);
        let final_output = plan.final_output().unwrap();
        assert!(final_output.starts_with("## Code Gen\n\ncode-gen:"));
        assert!(final_output.ends_with("1 specialized agent collaborated on this response: Code Gen."));
    }

    #[tokio::test]
    async fn test_bug_investigation_passes_context_forward() {
        let client = Arc::new(RecordingClient {
            prompts: parking_lot::Mutex::new(Vec::new()),
        });
        let engine = WorkflowEngine::new(client.clone()).unwrap();
        let input = "Fix this bug: null pointer in getUser()";
        let id = engine.create_plan(input, &classify(input)).await.unwrap().id;

        let plan = engine.run_to_completion(id, None).await.unwrap();
        assert!(plan.is_complete());

        let prompts = client.prompts.lock();
        let agents: Vec<AgentId> = prompts.iter().map(|(a, _)| *a).collect();
        assert_eq!(
            agents,
            vec![AgentId::Search, AgentId::BugFix, AgentId::TestGen, AgentId::Performance]
        );
        assert_eq!(prompts[0].1, input);
        assert!(prompts[1].1.contains("[search]\noutput of search"));
        assert!(prompts[3].1.contains("[search]\noutput of search\n\n[bug-fix]\noutput of bug-fix\n\n[test-gen]"));
        assert!(prompts[3].1.ends_with(&format!("Task:\n{}", input)));

        let final_output = plan.final_output().unwrap();
        let positions: Vec<usize> = ["## Search", "## Bug Fix", "## Test Gen", "## Performance"]
            .iter()
            .map(|heading| final_output.find(heading).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(final_output.contains("4 specialized agents collaborated on this response: Search, Bug Fix, Test Gen, Performance."));
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_idempotent() {
        let engine = WorkflowEngine::new(EchoClient::new()).unwrap();
        let id = engine
            .create_plan("review for security", &classify("review for security"))
            .await
            .unwrap()
            .id;

        let mut last = engine.progress(id).await.unwrap();
        assert_eq!(last.state, PlanState::Building);
        assert_eq!(last.total_steps, 3);

        for _ in 0..3 {
            engine.execute_next_step(id).await.unwrap();
            let progress = engine.progress(id).await.unwrap();
            assert_eq!(progress, engine.progress(id).await.unwrap());
            assert_eq!(progress.current_step, last.current_step + 1);
            last = progress;
        }
        assert!(last.is_complete);
        assert_eq!(last.next_agent, None);
    }

    #[tokio::test]
    async fn test_complete_plan_rejects_execution() {
        let engine = WorkflowEngine::new(EchoClient::new()).unwrap();
        let id = engine
            .create_plan("hello", &TaskClassification::single(AgentId::Docs))
            .await
            .unwrap()
            .id;
        engine.execute_next_step(id).await.unwrap();

        let err = engine.execute_next_step(id).await.unwrap_err();
        assert!(matches!(err, WorkflowError::WorkflowAlreadyComplete(p) if p == id));
    }

    #[tokio::test]
    async fn test_failed_step_leaves_plan_untouched() {
        let client = Arc::new(FlakyClient {
            failing: AtomicBool::new(false),
        });
        let engine = WorkflowEngine::new(client.clone()).unwrap();
        let id = engine
            .create_plan("there is a bug", &classify("there is a bug"))
            .await
            .unwrap()
            .id;

        engine.execute_next_step(id).await.unwrap();
        let before = engine.plan(id).await.unwrap();

        client.failing.store(true, Ordering::SeqCst);
        let err = engine.execute_next_step(id).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::ChatClient {
                agent: AgentId::BugFix,
                source: ChatError::Api { status: 503, .. }
            }
        ));
        assert_eq!(engine.plan(id).await.unwrap(), before);

        client.failing.store(false, Ordering::SeqCst);
        let outcome = engine.execute_next_step(id).await.unwrap();
        assert_eq!(outcome.step_output, "bug-fix ok");
        assert_eq!(engine.progress(id).await.unwrap().current_step, 2);
    }

    #[tokio::test]
    async fn test_blank_output_fails_step() {
        let client = Arc::new(BlankClient {
            blank: AtomicBool::new(true),
        });
        let engine = WorkflowEngine::new(client.clone()).unwrap();
        let input = "Fix this bug: null pointer in getUser()";
        let id = engine.create_plan(input, &classify(input)).await.unwrap().id;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let err = engine.run_to_completion(id, Some(&tx)).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::ChatClient {
                agent: AgentId::Search,
                source: ChatError::EmptyContent { agent: AgentId::Search }
            }
        ));
        rx.recv().await.unwrap();
        assert!(matches!(rx.recv().await.unwrap(), WorkflowEvent::StepFailed { index: 0, .. }));

        let plan = engine.plan(id).await.unwrap();
        assert_eq!(plan.current_step_index(), 0);
        assert_eq!(plan.steps()[0].output_text, None);

        client.blank.store(false, Ordering::SeqCst);
        let outcome = engine.execute_next_step(id).await.unwrap();
        assert_eq!(outcome.step_output, "search ok");
        assert_eq!(engine.progress(id).await.unwrap().current_step, 1);
    }

    #[tokio::test]
    async fn test_clear_removes_plan() {
        let engine = WorkflowEngine::new(EchoClient::new()).unwrap();
        let id = engine
            .create_plan("x", &TaskClassification::single(AgentId::CodeGen))
            .await
            .unwrap()
            .id;
        assert_eq!(engine.active_plans().await, vec![id]);

        engine.clear(id).await.unwrap();
        assert!(engine.active_plans().await.is_empty());
        assert!(matches!(
            engine.execute_next_step(id).await,
            Err(WorkflowError::PlanNotFound(_))
        ));
        assert!(matches!(engine.progress(id).await, Err(WorkflowError::PlanNotFound(_))));
        assert!(matches!(engine.clear(id).await, Err(WorkflowError::PlanNotFound(_))));
    }

    #[tokio::test]
    async fn test_create_plan_returns_snapshot() {
        let engine = WorkflowEngine::new(EchoClient::new()).unwrap();
        let snapshot = engine
            .create_plan("full stack shop", &classify("full stack shop"))
            .await
            .unwrap();

        assert_eq!(snapshot.steps().len(), 5);
        assert_eq!(snapshot.current_step_index(), 0);
        assert_eq!(engine.plan(snapshot.id).await.unwrap(), snapshot);
    }

    #[tokio::test]
    async fn test_unknown_plan_is_not_found() {
        let engine = WorkflowEngine::new(EchoClient::new()).unwrap();
        let id = uuid::Uuid::new_v4();
        assert!(matches!(
            engine.execute_next_step(id).await,
            Err(WorkflowError::PlanNotFound(p)) if p == id
        ));
    }

    #[tokio::test]
    async fn test_run_emits_events_in_order() {
        let engine = WorkflowEngine::new(EchoClient::new()).unwrap();
        let input = "review the API for performance";
        let id = engine.create_plan(input, &classify(input)).await.unwrap().id;

        let (tx, mut rx) = mpsc::unbounded_channel();
        engine.run_to_completion(id, Some(&tx)).await.unwrap();
        drop(tx);

        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            assert_eq!(event.plan_id(), id);
            kinds.push(match event {
                WorkflowEvent::StepStarted { .. } => "started",
                WorkflowEvent::StepCompleted { .. } => "completed",
                WorkflowEvent::WorkflowComplete { .. } => "done",
                _ => "other",
            });
        }
        assert_eq!(
            kinds,
            vec!["started", "completed", "started", "completed", "started", "completed", "done"]
        );
    }

    #[tokio::test]
    async fn test_plans_are_independent() {
        let engine = WorkflowEngine::new(EchoClient::new()).unwrap();
        let a = engine.create_plan("a", &classify("there is a bug")).await.unwrap().id;
        let b = engine.create_plan("b", &classify("full stack app")).await.unwrap().id;
        assert_ne!(a, b);

        engine.execute_next_step(a).await.unwrap();
        assert_eq!(engine.progress(a).await.unwrap().current_step, 1);
        assert_eq!(engine.progress(b).await.unwrap().current_step, 0);
    }
}
