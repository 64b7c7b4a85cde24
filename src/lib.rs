//! Collab Agent - multi-agent coding assistant
//!
//! This crate provides:
//! - A keyword classifier routing tasks to one agent or a collaboration pattern
//! - A workflow engine running agents in sequence with shared context
//! - An OpenAI-compatible chat client with per-agent system prompts
//! - SQLite conversation history and SearXNG prompt enrichment
//! - CLI/REPL interface

pub mod assistant;
pub mod auth;
pub mod config;
pub mod message;
pub mod search;
pub mod store;
pub mod telemetry;

// Agent system
pub mod agent;
pub mod events;
pub mod provider;
pub mod workflow;

pub use assistant::{Assistant, AssistantReply, RequestFailed, RequestOptions};
pub use auth::AuthConfig;
pub use config::Config;
pub use telemetry::LogGuard;

pub use agent::{AgentId, PromptRegistry};
pub use events::{EventSender, WorkflowEvent};
pub use message::{ChatMessage, Role, TokenUsage};
pub use provider::{ChatClient, ChatError, ChatResponse, ProviderClient, ProviderConfig};
pub use store::{ConversationRecord, ConversationStore, SqliteConversationStore};
pub use workflow::{classify, TaskClassification, WorkflowEngine, WorkflowError, WorkflowPlan};
