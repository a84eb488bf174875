pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::types::{Fact, FactKind, Interaction, Knowledge, Mood};

pub use sqlite::SqliteStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Append-only facts about users.
#[async_trait]
pub trait FactStore: Send + Sync {
    async fn append_fact(
        &self,
        user_id: &str,
        kind: FactKind,
        value: &str,
        recorded_at: DateTime<Utc>,
    ) -> Result<Fact, StoreError>;

    /// All facts for a user, oldest first.
    async fn list_facts(&self, user_id: &str) -> Result<Vec<Fact>, StoreError>;
}

/// Append-only dialogue log.
#[async_trait]
pub trait InteractionLog: Send + Sync {
    async fn append_interaction(
        &self,
        user_id: &str,
        user_message: &str,
        bot_response: &str,
        mood: Mood,
        occurred_at: DateTime<Utc>,
    ) -> Result<Interaction, StoreError>;

    /// Up to `limit` interactions for a user, newest first.
    async fn list_recent_interactions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<Interaction>, StoreError>;

    /// Mood of the latest interaction, `Neutral` when the user has none.
    async fn current_mood(&self, user_id: &str) -> Result<Mood, StoreError> {
        let latest = self.list_recent_interactions(user_id, 1).await?;
        Ok(latest.first().map(|i| i.mood).unwrap_or_default())
    }
}

/// Topic notes taught by operators.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    async fn add_knowledge(
        &self,
        topic: &str,
        fact: &str,
        recorded_at: DateTime<Utc>,
    ) -> Result<Knowledge, StoreError>;

    /// Notes whose topic contains `topic` (case-insensitive), newest first.
    async fn related_knowledge(
        &self,
        topic: &str,
        limit: usize,
    ) -> Result<Vec<Knowledge>, StoreError>;
}

/// Everything a storage backend provides.
pub trait Storage: FactStore + InteractionLog + KnowledgeBase {}

impl<T: FactStore + InteractionLog + KnowledgeBase> Storage for T {}

/// Store handles for each role the generator reads and writes.
#[derive(Clone)]
pub struct Stores {
    pub facts: Arc<dyn FactStore>,
    pub log: Arc<dyn InteractionLog>,
    pub knowledge: Arc<dyn KnowledgeBase>,
}

impl Stores {
    /// One backend serving every role.
    pub fn shared<S: Storage + 'static>(store: Arc<S>) -> Self {
        Self {
            facts: store.clone(),
            log: store.clone(),
            knowledge: store,
        }
    }
}

/// In-process store. Nothing survives a restart; used for tests and for
/// `storage.backend = "memory"`.
#[derive(Default)]
pub struct MemoryStore {
    facts: RwLock<HashMap<String, Vec<Fact>>>,
    interactions: RwLock<HashMap<String, Vec<Interaction>>>,
    knowledge: RwLock<Vec<Knowledge>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FactStore for MemoryStore {
    async fn append_fact(
        &self,
        user_id: &str,
        kind: FactKind,
        value: &str,
        recorded_at: DateTime<Utc>,
    ) -> Result<Fact, StoreError> {
        let fact = Fact {
            user_id: user_id.to_string(),
            kind,
            value: value.to_string(),
            recorded_at,
        };
        self.facts
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .push(fact.clone());
        Ok(fact)
    }

    async fn list_facts(&self, user_id: &str) -> Result<Vec<Fact>, StoreError> {
        Ok(self
            .facts
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl InteractionLog for MemoryStore {
    async fn append_interaction(
        &self,
        user_id: &str,
        user_message: &str,
        bot_response: &str,
        mood: Mood,
        occurred_at: DateTime<Utc>,
    ) -> Result<Interaction, StoreError> {
        let interaction = Interaction {
            user_id: user_id.to_string(),
            occurred_at,
            user_message: user_message.to_string(),
            bot_response: bot_response.to_string(),
            mood,
        };
        self.interactions
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .push(interaction.clone());
        Ok(interaction)
    }

    async fn list_recent_interactions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<Interaction>, StoreError> {
        let interactions = self.interactions.read().await;
        let Some(log) = interactions.get(user_id) else {
            return Ok(Vec::new());
        };

        // Same order as the SQLite backend: time, then insertion.
        let mut ordered: Vec<(usize, &Interaction)> = log.iter().enumerate().collect();
        ordered.sort_by(|(ia, a), (ib, b)| (b.occurred_at, ib).cmp(&(a.occurred_at, ia)));
        Ok(ordered
            .into_iter()
            .take(limit)
            .map(|(_, interaction)| interaction.clone())
            .collect())
    }
}

#[async_trait]
impl KnowledgeBase for MemoryStore {
    async fn add_knowledge(
        &self,
        topic: &str,
        fact: &str,
        recorded_at: DateTime<Utc>,
    ) -> Result<Knowledge, StoreError> {
        let note = Knowledge {
            topic: topic.to_string(),
            fact: fact.to_string(),
            recorded_at,
        };
        self.knowledge.write().await.push(note.clone());
        Ok(note)
    }

    async fn related_knowledge(
        &self,
        topic: &str,
        limit: usize,
    ) -> Result<Vec<Knowledge>, StoreError> {
        let needle = topic.to_lowercase();
        let knowledge = self.knowledge.read().await;
        let mut matches: Vec<(usize, &Knowledge)> = knowledge
            .iter()
            .enumerate()
            .filter(|(_, k)| k.topic.to_lowercase().contains(&needle))
            .collect();
        matches.sort_by(|(ia, a), (ib, b)| (b.recorded_at, ib).cmp(&(a.recorded_at, ia)));
        Ok(matches
            .into_iter()
            .take(limit)
            .map(|(_, note)| note.clone())
            .collect())
    }
}
