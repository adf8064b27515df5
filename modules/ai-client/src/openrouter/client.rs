use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use tracing::{debug, warn};

use super::types::*;

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1";

/// Fixed per-request timeout. Remote calls that exceed it are treated as
/// transient and retried once.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Backoff before the single transient retry.
const RETRY_BACKOFF: Duration = Duration::from_secs(2);

pub(crate) struct OpenRouterClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
    app_name: Option<String>,
}

impl OpenRouterClient {
    pub fn new(api_key: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            api_key: api_key.to_string(),
            http,
            base_url: OPENROUTER_API_URL.to_string(),
            app_name: None,
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    pub fn with_app_name(mut self, name: &str) -> Self {
        self.app_name = Some(name.to_string());
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(ref name) = self.app_name {
            if let Ok(val) = HeaderValue::from_str(name) {
                headers.insert("X-Title", val);
            }
        }

        Ok(headers)
    }

    /// POST a JSON body, retrying once with backoff on transient failures
    /// (timeout, connect error, 408/429/5xx). Bounded retry, not a loop.
    async fn post_with_retry<B: serde::Serialize>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<reqwest::Response> {
        let mut attempts = 0u8;
        loop {
            attempts += 1;
            let result = self
                .http
                .post(url)
                .headers(self.headers()?)
                .json(body)
                .send()
                .await;

            match result {
                Ok(response) if !is_transient_status(response.status()) => return Ok(response),
                Ok(response) if attempts >= 2 => {
                    let status = response.status();
                    let error_text = response.text().await.unwrap_or_default();
                    return Err(anyhow!(
                        "OpenRouter transient error persisted after retry ({status}): {error_text}"
                    ));
                }
                Ok(response) => {
                    warn!(status = %response.status(), "transient OpenRouter status, retrying once");
                }
                Err(e) if attempts >= 2 || !is_transient_error(&e) => {
                    return Err(anyhow!("OpenRouter request failed: {e}"));
                }
                Err(e) => {
                    warn!(error = %e, "transient OpenRouter transport error, retrying once");
                }
            }

            tokio::time::sleep(RETRY_BACKOFF).await;
        }
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %request.model, "OpenRouter chat request");

        let response = self.post_with_retry(&url, request).await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!("OpenRouter API error ({status}): {error_text}"));
        }

        Ok(response.json().await?)
    }

    pub async fn embed(&self, model: &str, input: serde_json::Value) -> Result<EmbeddingResponse> {
        let url = format!("{}/embeddings", self.base_url);

        let request = EmbeddingRequest {
            model: model.to_string(),
            input,
        };

        debug!(model, "OpenRouter embedding request");

        let response = self.post_with_retry(&url, &request).await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;
            return Err(anyhow!(
                "OpenRouter embedding error ({status}): {error_text}"
            ));
        }

        Ok(response.json().await?)
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

fn is_transient_error(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect()
}
