//! Request pipeline used by the CLI
//!
//! classify → (optional web search) → plan → run → persist.

use crate::agent::{AgentId, PromptRegistry};
use crate::config::Config;
use crate::events::{emit, EventSender, WorkflowEvent};
use crate::message::TokenUsage;
use crate::provider::{ChatClient, ProviderClient};
use crate::search::{enrich_prompt, WebSearch};
use crate::store::{ConversationStore, NewConversation, SqliteConversationStore};
use crate::workflow::{
    classify, PlanId, TaskClassification, WorkflowEngine, WorkflowError, WorkflowPlan, WorkflowStep,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Per-request switches
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Skip classification and use this agent alone
    pub agent: Option<AgentId>,
    /// Fold SearXNG results into the task first
    pub web_search: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssistantReply {
    pub plan_id: PlanId,
    pub classification: TaskClassification,
    pub output: String,
    /// None when no store is configured or saving failed
    pub conversation_id: Option<Uuid>,
    pub usage: TokenUsage,
}

/// A request whose workflow stopped at a failing step.
///
/// The plan is already cleared from the engine; the steps that finished
/// before the failure are kept here.
#[derive(Debug, thiserror::Error)]
#[error("workflow {plan_id} stopped at step {failed_index}")]
pub struct RequestFailed {
    pub plan_id: PlanId,
    pub failed_index: usize,
    pub completed: Vec<WorkflowStep>,
    #[source]
    pub source: WorkflowError,
}

pub struct Assistant {
    config: Config,
    engine: WorkflowEngine,
    search: WebSearch,
    store: Option<Arc<dyn ConversationStore>>,
}

impl Assistant {
    pub fn new(
        config: Config,
        client: Arc<dyn ChatClient>,
        store: Option<Arc<dyn ConversationStore>>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            search: WebSearch::from_config(&config.search),
            engine: WorkflowEngine::new(client)?,
            config,
            store,
        })
    }

    /// Wire up the real provider, prompt overrides and SQLite history
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let prompts = Arc::new(PromptRegistry::new_with_config(&config.working_dir));
        let client = ProviderClient::new(config.provider_config(), prompts)?;
        let store = SqliteConversationStore::open(&config.conversation_db_path())?;
        Self::new(config, Arc::new(client), Some(Arc::new(store)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &WorkflowEngine {
        &self.engine
    }

    pub fn store(&self) -> Option<&Arc<dyn ConversationStore>> {
        self.store.as_ref()
    }

    /// Answer one request end to end.
    ///
    /// A failing step clears the plan and returns [`RequestFailed`] with the
    /// outputs produced so far.
    pub async fn handle(
        &self,
        input: &str,
        options: &RequestOptions,
        events: Option<&EventSender>,
    ) -> anyhow::Result<AssistantReply> {
        let start = Instant::now();

        let classification = match options.agent {
            Some(agent) => TaskClassification::single(agent),
            None => classify(input),
        };

        let task = if options.web_search {
            self.enrich_with_search(input).await
        } else {
            input.to_string()
        };

        let plan_id = self.engine.create_plan(&task, &classification).await?.id;
        emit(
            events,
            WorkflowEvent::PlanCreated {
                plan_id,
                complexity: classification.complexity,
                pattern: classification.pattern,
                agents: classification.agents.clone(),
            },
        );

        let plan = match self.engine.run_to_completion(plan_id, events).await {
            Ok(plan) => plan,
            Err(source) => return Err(self.abandon(plan_id, source).await.into()),
        };
        let output = plan.final_output().unwrap_or_default().to_string();
        let usage = plan.total_usage();

        let conversation_id = self.persist(input, options, &classification, &plan, &output);

        self.engine.clear(plan_id).await?;

        info!(
            plan_id = %plan_id,
            agents = classification.agents.len(),
            input_tokens = usage.input,
            output_tokens = usage.output,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request complete"
        );

        Ok(AssistantReply {
            plan_id,
            classification,
            output,
            conversation_id,
            usage,
        })
    }

    /// Collect the finished steps of a failed plan, then drop it
    async fn abandon(&self, plan_id: PlanId, source: WorkflowError) -> RequestFailed {
        let (failed_index, completed) = match self.engine.plan(plan_id).await {
            Ok(plan) => (
                plan.current_step_index(),
                plan.steps()
                    .iter()
                    .filter(|step| step.output_text.is_some())
                    .cloned()
                    .collect(),
            ),
            Err(_) => (0, Vec::new()),
        };

        if let Err(e) = self.engine.clear(plan_id).await {
            debug!(plan_id = %plan_id, error = %e, "Failed plan was already gone");
        }
        warn!(plan_id = %plan_id, failed_index, error = %source, "Request failed");

        RequestFailed {
            plan_id,
            failed_index,
            completed,
            source,
        }
    }

    /// Search failures are logged and the task goes out unenriched
    async fn enrich_with_search(&self, input: &str) -> String {
        match self.search.search(input).await {
            Ok(results) => enrich_prompt(input, &results),
            Err(e) => {
                warn!(error = %e, "Web search failed, continuing without results");
                input.to_string()
            }
        }
    }

    fn persist(
        &self,
        input: &str,
        options: &RequestOptions,
        classification: &TaskClassification,
        plan: &WorkflowPlan,
        output: &str,
    ) -> Option<Uuid> {
        let store = self.store.as_ref()?;

        let conversation = NewConversation {
            user_input: input.to_string(),
            agent_type: agent_type(classification),
            ai_output: output.to_string(),
            metadata: json!({
                "plan_id": plan.id,
                "complexity": classification.complexity,
                "pattern": classification.pattern,
                "agents": classification.agents,
                "used_fallback": classification.used_fallback,
                "web_search": options.web_search,
                "usage": plan.total_usage(),
            }),
        };

        match store.save_conversation(conversation) {
            Ok(record) => Some(record.id),
            Err(e) => {
                warn!(plan_id = %plan.id, error = %e, "Failed to save conversation");
                None
            }
        }
    }
}

/// Agent wire name for single-agent plans, `collaborative:<pattern>` otherwise
pub fn agent_type(classification: &TaskClassification) -> String {
    match (classification.pattern, classification.agents.as_slice()) {
        (Some(pattern), _) => format!("collaborative:{}", pattern),
        (None, [agent]) => agent.to_string(),
        (None, agents) => format!(
            "collaborative:{}",
            agents.iter().map(|a| a.as_str()).collect::<Vec<_>>().join("+")
        ),
    }
}
