use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::agent::{GenerationParams, ModelRouter, ResponseGenerator};
use crate::config::{DedConfig, StorageBackend};
use crate::memory::FactExtractor;
use crate::persona::Persona;
use crate::store::{
    FactStore, InteractionLog, KnowledgeBase, MemoryStore, SqliteStore, Storage, Stores,
};
use crate::types::{FactKind, Mood, Reply};

/// Runs turns for the gateway and the CLI and records them in the log.
pub struct ChatService {
    generator: ResponseGenerator,
    storage: Arc<dyn Storage>,
}

impl ChatService {
    pub fn new(generator: ResponseGenerator, storage: Arc<dyn Storage>) -> Self {
        Self { generator, storage }
    }

    /// Wire storage, persona, extractor and router from config.
    pub async fn from_config(config: &DedConfig) -> anyhow::Result<Self> {
        let persona = Arc::new(Persona::from_config(
            &config.persona,
            config.agent.fallback_seed,
        )?);
        let extractor = FactExtractor::from_config(&config.persona.fact_rules)?;
        let router = ModelRouter::from_config(&config.agent)?;
        let params = GenerationParams::from(&config.agent);
        debug!(
            fact_rules = extractor.rules().len(),
            fallback_lines = persona.fallback().lines().len(),
            "persona ready"
        );

        match config.storage.backend {
            StorageBackend::Memory => {
                info!("using in-memory storage, nothing will be persisted");
                let store = Arc::new(MemoryStore::new());
                Ok(Self::with_store(store, extractor, persona, router, params))
            }
            StorageBackend::Sqlite => {
                let url = &config.storage.database_url;
                if let Some(dir) = crate::fs_util::sqlite_parent_dir(url) {
                    crate::fs_util::ensure_private_dir(&dir)?;
                }
                let store = Arc::new(SqliteStore::connect(url).await?);
                Ok(Self::with_store(store, extractor, persona, router, params))
            }
        }
    }

    /// Build the generator over a single backend serving every store role.
    pub fn with_store<S: Storage + 'static>(
        store: Arc<S>,
        extractor: FactExtractor,
        persona: Arc<Persona>,
        router: ModelRouter,
        params: GenerationParams,
    ) -> Self {
        let generator = ResponseGenerator::new(
            extractor,
            persona,
            router,
            Stores::shared(store.clone()),
            params,
        );
        Self::new(generator, store)
    }

    pub fn generator(&self) -> &ResponseGenerator {
        &self.generator
    }

    /// Generate a reply and append the turn to the interaction log.
    ///
    /// A failed append is logged; the reply is still returned.
    pub async fn handle(&self, user_id: &str, text: &str) -> Reply {
        let reply = self.generator.generate(user_id, text).await;

        if let Err(e) = self
            .storage
            .append_interaction(user_id, text, &reply.reply, reply.mood, Utc::now())
            .await
        {
            warn!(user_id, source = %reply.source, "failed to record interaction: {e}");
        }

        info!(user_id, source = %reply.source, mood = %reply.mood, "turn complete");
        reply
    }

    /// Store a free-form fact about the user.
    pub async fn remember(&self, user_id: &str, fact: &str) -> anyhow::Result<String> {
        let fact = fact.trim();
        if fact.is_empty() {
            anyhow::bail!("fact must not be empty");
        }
        self.storage
            .append_fact(user_id, FactKind::Freeform, fact, Utc::now())
            .await?;
        Ok(format!("Окей, курва, запомнил: {fact}"))
    }

    /// Add an entry to the shared knowledge base.
    pub async fn teach(&self, topic: &str, fact: &str) -> anyhow::Result<String> {
        let (topic, fact) = (topic.trim(), fact.trim());
        if topic.is_empty() || fact.is_empty() {
            anyhow::bail!("topic and fact must not be empty");
        }
        self.storage.add_knowledge(topic, fact, Utc::now()).await?;
        Ok(format!("Записал в базу знаний: {topic} - {fact}"))
    }

    pub async fn current_mood(&self, user_id: &str) -> anyhow::Result<Mood> {
        Ok(self.storage.current_mood(user_id).await?)
    }
}
