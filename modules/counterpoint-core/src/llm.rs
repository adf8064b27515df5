//! Trait seams for the remote model providers, plus the OpenRouter-backed
//! implementations used in production. Tests substitute deterministic mocks.

use std::sync::Arc;

use ai_client::OpenRouter;
use async_trait::async_trait;
use counterpoint_common::{Config, CounterpointError, TokenUsage};

/// One structured completion together with its token cost.
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub content: String,
    pub usage: TokenUsage,
}

/// A JSON-mode chat model. Transport-level retry lives below this trait;
/// an `Err` here means the call failed even after that retry.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete_json(
        &self,
        model: &str,
        system: &str,
        user: &str,
    ) -> Result<ChatOutcome, CounterpointError>;
}

/// Embeds query text into the same space as the stored chunk embeddings.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CounterpointError>;
}

// --- OpenRouter-backed implementations ---

/// Production chat model over OpenRouter.
#[derive(Clone)]
pub struct ModelClient {
    client: OpenRouter,
}

impl ModelClient {
    pub fn new(api_key: &str) -> Self {
        let client = OpenRouter::new(api_key).with_app_name("counterpoint");
        Self { client }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.openrouter_api_key)
    }
}

#[async_trait]
impl ChatModel for ModelClient {
    async fn complete_json(
        &self,
        model: &str,
        system: &str,
        user: &str,
    ) -> Result<ChatOutcome, CounterpointError> {
        let completion = self
            .client
            .complete_json(model, system, user)
            .await
            .map_err(|e| CounterpointError::LlmCall(e.to_string()))?;

        Ok(ChatOutcome {
            content: completion.content,
            usage: TokenUsage::new(
                completion.usage.prompt_tokens,
                completion.usage.completion_tokens,
            ),
        })
    }
}

/// Production query embedder over OpenRouter.
#[derive(Clone)]
pub struct QueryEmbedder {
    client: OpenRouter,
    model: String,
}

impl QueryEmbedder {
    pub fn new(api_key: &str, model: impl Into<String>) -> Self {
        let client = OpenRouter::new(api_key).with_app_name("counterpoint");
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.openrouter_api_key, &config.embedding_model)
    }
}

#[async_trait]
impl TextEmbedder for QueryEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CounterpointError> {
        self.client
            .embed(&self.model, text)
            .await
            .map_err(|e| CounterpointError::Retrieval(format!("query embedding failed: {e}")))
    }
}

/// Convenience alias used throughout the pipeline.
pub type SharedChatModel = Arc<dyn ChatModel>;
pub type SharedEmbedder = Arc<dyn TextEmbedder>;
