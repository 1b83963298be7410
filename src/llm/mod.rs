pub mod providers;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hosted AI provider types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
}

/// LLM client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: AiProvider,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl LlmConfig {
    /// Client configuration for a provider, filling in the provider's
    /// default model when none is configured
    pub fn for_provider(provider: AiProvider, api_key: String, model: &str) -> Self {
        let model = if model.is_empty() {
            match provider {
                AiProvider::OpenAi => "gpt-4o-mini".to_string(),
                AiProvider::Anthropic => "claude-3-haiku-20240307".to_string(),
            }
        } else {
            model.to_string()
        };

        Self {
            provider,
            api_key,
            model,
            max_tokens: 1000,
            temperature: 0.3,
            timeout_seconds: 60,
        }
    }
}

/// Chat message for LLM communication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// LLM response
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub tokens_used: Option<u32>,
}

/// Failure modes of the AI analysis path. Both degrade the analyzer to
/// the rule-based path; neither is surfaced as a per-video error.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI provider unavailable: {0}")]
    Unavailable(String),

    #[error("AI response malformed: {0}")]
    Malformed(String),
}

/// Trait for LLM providers
#[async_trait]
pub trait Llm: Send + Sync {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<LlmResponse>;
    fn provider_type(&self) -> AiProvider;
}

/// Create LLM instance based on configuration
pub fn create_llm(config: &LlmConfig) -> Result<Box<dyn Llm>> {
    match config.provider {
        AiProvider::OpenAi => Ok(Box::new(providers::OpenAiProvider::new(config.clone())?)),
        AiProvider::Anthropic => Ok(Box::new(providers::AnthropicProvider::new(config.clone())?)),
    }
}
