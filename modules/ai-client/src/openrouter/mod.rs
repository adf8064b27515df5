mod client;
pub(crate) mod types;

pub use types::Usage;

use anyhow::{anyhow, Result};

use client::OpenRouterClient;
use types::{ChatRequest, WireMessage};

/// A JSON-mode completion together with its token accounting.
#[derive(Debug, Clone)]
pub struct JsonCompletion {
    pub content: String,
    pub usage: Usage,
}

/// OpenRouter-backed model access: JSON-mode chat completions and embeddings.
///
/// Cheap to clone; construct once per process and share.
#[derive(Clone)]
pub struct OpenRouter {
    api_key: String,
    base_url: Option<String>,
    app_name: Option<String>,
    temperature: f32,
}

impl OpenRouter {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            app_name: None,
            temperature: 0.7,
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| anyhow!("OPENROUTER_API_KEY environment variable not set"))?;
        Ok(Self::new(api_key))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn client(&self) -> OpenRouterClient {
        let mut client = OpenRouterClient::new(&self.api_key);
        if let Some(ref url) = self.base_url {
            client = client.with_base_url(url);
        }
        if let Some(ref name) = self.app_name {
            client = client.with_app_name(name);
        }
        client
    }

    /// One JSON-mode chat completion. Returns the raw content string so the
    /// caller owns parsing (and any re-prompt on malformed output), plus the
    /// provider-reported token usage.
    pub async fn complete_json(
        &self,
        model: &str,
        system: &str,
        user: &str,
    ) -> Result<JsonCompletion> {
        let request = ChatRequest::new(model)
            .message(WireMessage::system(system))
            .message(WireMessage::user(user))
            .temperature(self.temperature)
            .json_mode();

        let response = self.client().chat(&request).await?;

        let usage = response.usage.unwrap_or_default();
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| anyhow!("empty response from model {model}"))?;

        Ok(JsonCompletion { content, usage })
    }

    /// Embed a single text.
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client()
            .embed(model, serde_json::Value::String(text.to_string()))
            .await?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| anyhow!("no embedding in response"))
    }

    /// Embed multiple texts in one call.
    pub async fn embed_batch(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let input = serde_json::Value::Array(
            texts
                .iter()
                .map(|t| serde_json::Value::String(t.clone()))
                .collect(),
        );

        let response = self.client().embed(model, input).await?;

        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}
