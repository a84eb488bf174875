use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::config::ModelConfig;

const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
const AI21_BASE_URL: &str = "https://api.ai21.com/studio/v1";

/// One completion request, independent of the vendor wire format.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Persona preamble with context filled in.
    pub system: String,
    /// The user's message for this turn.
    pub user: String,
    /// Name the persona answers under, for prompt-style APIs.
    pub speaker: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stop: Vec<String>,
}

impl CompletionRequest {
    /// Flatten into a single prompt ending where the persona should speak.
    pub fn as_prompt(&self) -> String {
        format!("{}\nUser: {}\n{}:", self.system, self.user, self.speaker)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("empty completion")]
    Empty,
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// A remote completion backend.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Short vendor name, used in logs.
    fn name(&self) -> &str;

    /// Complete `request` with `model`. Returns the raw completion text.
    async fn complete(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<String, ProviderError>;
}

/// Send a JSON body with bearer auth and return the parsed 2xx response.
async fn post_json(
    client: &Client,
    url: &str,
    api_key: &str,
    body: &serde_json::Value,
) -> Result<serde_json::Value, ProviderError> {
    let response = client
        .post(url)
        .header("Authorization", format!("Bearer {api_key}"))
        .header("content-type", "application/json")
        .json(body)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::Status { status, body });
    }

    response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| ProviderError::Malformed(e.to_string()))
}

fn non_empty(text: Option<&str>, what: &str) -> Result<String, ProviderError> {
    let text = text.ok_or_else(|| ProviderError::Malformed(format!("missing {what}")))?;
    if text.trim().is_empty() {
        return Err(ProviderError::Empty);
    }
    Ok(text.to_string())
}

/// OpenAI-compatible chat completions (OpenRouter by default).
pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenRouterProvider {
    pub fn new(client: Client, api_key: String, base_url: Option<String>) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.unwrap_or_else(|| OPENROUTER_BASE_URL.into()),
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn complete(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<String, ProviderError> {
        let mut body = serde_json::json!({
            "model": model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });
        if !request.stop.is_empty() {
            body["stop"] = serde_json::json!(request.stop);
        }

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        debug!(model, %url, "openrouter request");
        let parsed = post_json(&self.client, &url, &self.api_key, &body).await?;

        let text = parsed
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|t| t.as_str());
        non_empty(text, "choices[0].message.content")
    }
}

/// AI21 Studio prompt completions.
pub struct Ai21Provider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl Ai21Provider {
    pub fn new(client: Client, api_key: String, base_url: Option<String>) -> Self {
        Self {
            client,
            api_key,
            base_url: base_url.unwrap_or_else(|| AI21_BASE_URL.into()),
        }
    }
}

#[async_trait]
impl CompletionProvider for Ai21Provider {
    fn name(&self) -> &str {
        "ai21"
    }

    async fn complete(
        &self,
        model: &str,
        request: &CompletionRequest,
    ) -> Result<String, ProviderError> {
        let body = serde_json::json!({
            "model": model,
            "prompt": request.as_prompt(),
            "temperature": request.temperature,
            "maxTokens": request.max_tokens,
            "stopSequences": request.stop,
        });

        let url = format!("{}/jamba-instruct/complete", self.base_url.trim_end_matches('/'));
        debug!(model, %url, "ai21 request");
        let parsed = post_json(&self.client, &url, &self.api_key, &body).await?;

        let text = parsed
            .get("completions")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.get("data"))
            .and_then(|d| d.get("text"))
            .and_then(|t| t.as_str());
        non_empty(text, "completions[0].data.text")
    }
}

/// Create a provider for one configured candidate.
pub fn from_config(
    config: &ModelConfig,
    client: Client,
) -> anyhow::Result<Box<dyn CompletionProvider>> {
    let api_key = config.api_key.clone().ok_or_else(|| {
        anyhow::anyhow!(
            "no API key for model '{}' ({}). Set {} or run `dedkolya key set {}`.",
            config.id,
            config.provider,
            crate::config::api_key_env(&config.provider).unwrap_or("the provider key"),
            config.provider,
        )
    })?;

    match config.provider.as_str() {
        "openrouter" => Ok(Box::new(OpenRouterProvider::new(
            client,
            api_key,
            config.base_url.clone(),
        ))),
        "ai21" => Ok(Box::new(Ai21Provider::new(
            client,
            api_key,
            config.base_url.clone(),
        ))),
        other => anyhow::bail!("unknown provider: {other}"),
    }
}
