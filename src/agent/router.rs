use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::Client;
use tracing::{info, warn};

use super::providers::{self, CompletionProvider, CompletionRequest, ProviderError};
use crate::config::AgentConfig;

/// One entry in the ordered fallback list.
#[derive(Clone)]
pub struct Candidate {
    pub model: String,
    pub provider: Arc<dyn CompletionProvider>,
}

impl Candidate {
    pub fn new(model: impl Into<String>, provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            model: model.into(),
            provider,
        }
    }
}

impl std::fmt::Debug for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Candidate")
            .field("model", &self.model)
            .field("provider", &self.provider.name())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Success {
        text: String,
        model: String,
        attempts: usize,
    },
    /// Every candidate failed.
    Unavailable { attempts: usize },
}

/// Tries candidates in list order until one returns a usable completion.
///
/// Every call starts from the head of the list. The last successful model is
/// kept for display only.
pub struct ModelRouter {
    candidates: Vec<Candidate>,
    timeout: Duration,
    last_success: Mutex<Option<String>>,
}

impl ModelRouter {
    pub fn new(candidates: Vec<Candidate>, timeout: Duration) -> Self {
        Self {
            candidates,
            timeout,
            last_success: Mutex::new(None),
        }
    }

    /// Build candidates from config. Models without an API key are skipped.
    pub fn from_config(config: &AgentConfig) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder().timeout(timeout).build()?;

        let mut candidates = Vec::with_capacity(config.models.len());
        for model in &config.models {
            match providers::from_config(model, client.clone()) {
                Ok(provider) => candidates.push(Candidate::new(&model.id, Arc::from(provider))),
                Err(e) => warn!(model = %model.id, "skipping candidate: {e}"),
            }
        }

        if candidates.is_empty() {
            warn!("no usable candidate models, every reply will be a fallback line");
        } else {
            info!(count = candidates.len(), "model router ready");
        }

        Ok(Self::new(candidates, timeout))
    }

    pub async fn complete(&self, request: &CompletionRequest) -> RouteOutcome {
        let mut attempts = 0;

        for candidate in &self.candidates {
            attempts += 1;
            let call = candidate.provider.complete(&candidate.model, request);
            let result = match tokio::time::timeout(self.timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(self.timeout)),
            };

            match result {
                Ok(text) if !text.trim().is_empty() => {
                    info!(model = %candidate.model, attempts, "completion succeeded");
                    self.remember(&candidate.model);
                    return RouteOutcome::Success {
                        text,
                        model: candidate.model.clone(),
                        attempts,
                    };
                }
                Ok(_) => warn!(
                    model = %candidate.model,
                    provider = candidate.provider.name(),
                    "empty completion, trying next candidate"
                ),
                Err(e) => warn!(
                    model = %candidate.model,
                    provider = candidate.provider.name(),
                    "completion failed, trying next candidate: {e}"
                ),
            }
        }

        warn!(attempts, "all candidate models failed");
        RouteOutcome::Unavailable { attempts }
    }

    pub fn last_model(&self) -> Option<String> {
        self.last_success
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn models(&self) -> Vec<String> {
        self.candidates.iter().map(|c| c.model.clone()).collect()
    }

    fn remember(&self, model: &str) {
        let mut last = self
            .last_success
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last = Some(model.to_string());
    }
}
