//! OpenAI-compatible chat client
//!
//! Builds requests with async-openai's types and sends them over raw HTTP,
//! so that servers which only loosely follow the OpenAI response schema
//! (LM Studio, llama.cpp, vLLM) still parse.

use super::ProviderConfig;
use crate::agent::{AgentId, PromptRegistry};
use crate::auth::AuthConfig;
use crate::message::{ChatMessage, TokenUsage};
use async_openai::error::OpenAIError;
use async_openai::types::CreateChatCompletionRequestArgs;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Errors from the chat client
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Provider configuration error: {0}")]
    Config(String),
    #[error("Failed to build request: {0}")]
    Build(#[from] OpenAIError),
    #[error("API request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Failed to parse response: {0}")]
    Parse(String),
    #[error("Empty response from agent '{agent}'")]
    EmptyContent { agent: AgentId },
}

/// Normalized chat completion result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatResponse {
    pub content: String,
    pub usage: Option<TokenUsage>,
    pub model: Option<String>,
}

/// Anything that can answer a list of messages on behalf of an agent
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send `messages` as `agent`. The agent selects the system prompt.
    async fn chat(&self, messages: &[ChatMessage], agent: AgentId)
        -> Result<ChatResponse, ChatError>;
}

/// OpenAI-compatible client wrapper
#[derive(Clone)]
pub struct ProviderClient {
    config: ProviderConfig,
    prompts: Arc<PromptRegistry>,
    http_client: reqwest::Client,
    api_key: String,
}

impl ProviderClient {
    /// Create a new provider client from config
    pub fn new(config: ProviderConfig, prompts: Arc<PromptRegistry>) -> Result<Self, ChatError> {
        let api_key = Self::get_api_key(&config)?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            prompts,
            http_client,
            api_key,
        })
    }

    /// Resolve the API key: explicit config, then environment, then auth.json
    fn get_api_key(config: &ProviderConfig) -> Result<String, ChatError> {
        if let Some(key) = &config.api_key {
            return Ok(key.clone());
        }

        let _ = dotenvy::dotenv();

        if let Ok(key) = std::env::var(&config.api_key_env) {
            return Ok(key);
        }

        let auth = AuthConfig::load().unwrap_or_default();
        if let Some(key) = auth.api_key(&config.name.to_lowercase()) {
            return Ok(key.to_string());
        }

        Err(ChatError::Config(format!(
            "{} not found in environment or auth.json",
            config.api_key_env
        )))
    }

    /// Get the provider config
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Prepend the agent's system prompt to the conversation
    fn with_system_prompt(&self, messages: &[ChatMessage], agent: AgentId) -> Vec<ChatMessage> {
        let mut full = Vec::with_capacity(messages.len() + 1);
        full.push(ChatMessage::system(self.prompts.system_prompt(agent)));
        full.extend_from_slice(messages);
        full
    }

    #[allow(deprecated)]
    fn build_request(
        &self,
        messages: &[ChatMessage],
    ) -> Result<async_openai::types::CreateChatCompletionRequest, ChatError> {
        let request_messages = messages
            .iter()
            .map(ChatMessage::to_request)
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(self.config.default_model.clone())
            .messages(request_messages);
        if let Some(temperature) = self.config.temperature {
            builder.temperature(temperature);
        }
        if let Some(max_tokens) = self.config.max_tokens {
            builder.max_tokens(max_tokens);
        }

        Ok(builder.build()?)
    }
}

#[async_trait]
impl ChatClient for ProviderClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        agent: AgentId,
    ) -> Result<ChatResponse, ChatError> {
        let request = self.build_request(&self.with_system_prompt(messages, agent))?;

        let start = std::time::Instant::now();
        tracing::info!(
            target: "llm",
            agent = %agent,
            model = %self.config.default_model,
            message_count = messages.len() + 1,
            "Starting LLM call"
        );

        let response = self
            .http_client
            .post(self.config.completions_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "llm", agent = %agent, error = %e, "LLM call failed");
                ChatError::Request(e)
            })?;

        let elapsed = start.elapsed();

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            tracing::error!(
                target: "llm",
                agent = %agent,
                status = %status,
                error = %text,
                elapsed_ms = elapsed.as_millis() as u64,
                "LLM call returned error"
            );
            return Err(ChatError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ChatError::Parse(e.to_string()))?;

        let parsed = parse_completion(&body, agent)?;

        tracing::info!(
            target: "llm",
            agent = %agent,
            model = %self.config.default_model,
            elapsed_ms = elapsed.as_millis() as u64,
            input_tokens = parsed.usage.map(|u| u.input),
            output_tokens = parsed.usage.map(|u| u.output),
            "LLM call completed"
        );

        Ok(parsed)
    }
}

/// Extract content, usage and model from a chat completion body
pub fn parse_completion(
    body: &serde_json::Value,
    agent: AgentId,
) -> Result<ChatResponse, ChatError> {
    let choice = body
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| ChatError::Parse("No choices in response".to_string()))?;

    let content = choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .trim();

    if content.is_empty() {
        return Err(ChatError::EmptyContent { agent });
    }

    let usage = body.get("usage").and_then(|u| {
        Some(TokenUsage {
            input: u.get("prompt_tokens")?.as_u64()?,
            output: u.get("completion_tokens")?.as_u64()?,
        })
    });

    let model = body
        .get("model")
        .and_then(|m| m.as_str())
        .map(|m| m.to_string());

    Ok(ChatResponse {
        content: content.to_string(),
        usage,
        model,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_client() -> ProviderClient {
        let mut config = ProviderConfig::custom("test", "http://localhost:9/v1", "UNUSED", "m-1");
        config.api_key = Some("sk-test".to_string());
        ProviderClient::new(config, Arc::new(PromptRegistry::new())).unwrap()
    }

    #[test]
    fn test_parse_completion() {
        let body = json!({
            "model": "gpt-4o",
            "choices": [{"message": {"role": "assistant", "content": "  fn main() {}  "}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 4, "total_tokens": 16}
        });
        let parsed = parse_completion(&body, AgentId::CodeGen).unwrap();
        assert_eq!(parsed.content, "fn main() {}");
        assert_eq!(parsed.usage, Some(TokenUsage { input: 12, output: 4 }));
        assert_eq!(parsed.model.as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn test_parse_completion_without_usage() {
        let body = json!({"choices": [{"message": {"content": "ok"}}]});
        let parsed = parse_completion(&body, AgentId::Docs).unwrap();
        assert_eq!(parsed.usage, None);
        assert_eq!(parsed.model, None);
    }

    #[test]
    fn test_parse_completion_empty_content() {
        let body = json!({"choices": [{"message": {"content": "   "}}]});
        let err = parse_completion(&body, AgentId::Security).unwrap_err();
        assert!(matches!(err, ChatError::EmptyContent { agent: AgentId::Security }));

        let body = json!({"choices": [{"message": {"content": null}}]});
        assert!(matches!(
            parse_completion(&body, AgentId::Security),
            Err(ChatError::EmptyContent { .. })
        ));
    }

    #[test]
    fn test_parse_completion_no_choices() {
        let err = parse_completion(&json!({"choices": []}), AgentId::CodeGen).unwrap_err();
        assert!(matches!(err, ChatError::Parse(_)));
    }

    #[test]
    fn test_system_prompt_is_prepended() {
        let client = test_client();
        let messages = client.with_system_prompt(&[ChatMessage::user("hi")], AgentId::TestGen);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, crate::message::Role::System);
        assert_eq!(
            messages[0].content,
            client.prompts.system_prompt(AgentId::TestGen)
        );
        assert_eq!(messages[1], ChatMessage::user("hi"));
    }

    #[test]
    fn test_build_request_serializes_openai_shape() {
        let client = test_client();
        let request = client
            .build_request(&client.with_system_prompt(&[ChatMessage::user("hi")], AgentId::Docs))
            .unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "m-1");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "hi");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_request_error() {
        let client = test_client();
        let err = client
            .chat(&[ChatMessage::user("hi")], AgentId::CodeGen)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Request(_)));
    }
}
