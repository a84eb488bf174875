pub mod providers;
pub mod router;

use std::sync::{Arc, Mutex};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use crate::config::AgentConfig;
use crate::memory::{ContextAssembler, FactExtractor};
use crate::persona::Persona;
use crate::store::{FactStore, Stores};
use crate::types::Reply;

pub use providers::{CompletionProvider, CompletionRequest, ProviderError};
pub use router::{Candidate, ModelRouter, RouteOutcome};

/// Generation parameters passed through to every candidate.
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub stop: Vec<String>,
    pub history_turns: usize,
}

impl From<&AgentConfig> for GenerationParams {
    fn from(config: &AgentConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            stop: config.stop.clone(),
            history_turns: config.history_turns,
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::from(&AgentConfig::default())
    }
}

/// Turns one user message into a reply.
///
/// Order of work for a turn:
/// 1. a recognised fact short-circuits with an acknowledgement
/// 2. mood from trigger words (or the random source)
/// 3. context from stored facts, related topic notes and recent turns
/// 4. candidate models in order
/// 5. an in-character fallback line if none answered
///
/// Never fails: every turn ends in one of the three reply sources.
pub struct ResponseGenerator {
    extractor: FactExtractor,
    persona: Arc<Persona>,
    context: ContextAssembler,
    router: ModelRouter,
    facts: Arc<dyn FactStore>,
    params: GenerationParams,
    rng: Mutex<StdRng>,
}

impl ResponseGenerator {
    pub fn new(
        extractor: FactExtractor,
        persona: Arc<Persona>,
        router: ModelRouter,
        stores: Stores,
        params: GenerationParams,
    ) -> Self {
        Self::with_rng(
            extractor,
            persona,
            router,
            stores,
            params,
            StdRng::from_entropy(),
        )
    }

    /// Same as [`ResponseGenerator::new`] with an explicit random source for
    /// untriggered moods.
    pub fn with_rng(
        extractor: FactExtractor,
        persona: Arc<Persona>,
        router: ModelRouter,
        stores: Stores,
        params: GenerationParams,
        rng: StdRng,
    ) -> Self {
        let context = ContextAssembler::new(
            stores.facts.clone(),
            stores.log,
            persona.labels().clone(),
        )
        .with_knowledge(stores.knowledge);
        Self {
            extractor,
            persona,
            context,
            router,
            facts: stores.facts,
            params,
            rng: Mutex::new(rng),
        }
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    pub async fn generate(&self, user_id: &str, text: &str) -> Reply {
        if let Some(fact) = self.extractor.extract(self.facts.as_ref(), user_id, text).await {
            info!(user_id, kind = %fact.kind, "learned fact");
            return Reply::learned(self.persona.acknowledge(&fact));
        }

        let mood = {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            self.persona.mood_engine().determine(text, &mut *rng)
        };
        debug!(user_id, %mood, "mood determined");

        let context = self
            .context
            .assemble_turn(user_id, text, self.params.history_turns)
            .await;
        let request = CompletionRequest {
            system: self.persona.system_prompt(mood, &context),
            user: text.to_string(),
            speaker: self.persona.name().to_string(),
            temperature: self.params.temperature,
            max_tokens: self.params.max_tokens,
            stop: self.params.stop.clone(),
        };

        match self.router.complete(&request).await {
            RouteOutcome::Success { text, model, .. } => Reply::generated(text, mood, model),
            RouteOutcome::Unavailable { attempts } => {
                info!(user_id, attempts, "answering with a fallback line");
                Reply::fallback(self.persona.fallback().pick(user_id, text), mood)
            }
        }
    }
}
