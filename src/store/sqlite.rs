//! SQLite storage backend.
//!
//! Raw sqlx queries with private row structs mapped into domain types.
//! Timestamps are stored as fixed-width RFC 3339 text so that lexical order
//! matches chronological order; the autoincrement id breaks ties.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use super::{FactStore, InteractionLog, KnowledgeBase, StoreError};
use crate::types::{Fact, FactKind, Interaction, Knowledge, Mood};

/// SQLite-backed implementation of every storage trait.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `database_url` and run
    /// migrations.
    ///
    /// `sqlite::memory:` URLs get a single long-lived connection, since every
    /// new connection to an in-memory database starts empty.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let in_memory = database_url.contains(":memory:");

        let mut options = SqliteConnectOptions::from_str(database_url)?
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };

        let pool = pool_options.connect_with(options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!(database_url, "sqlite store ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("invalid timestamp '{s}': {e}")))
}

// ---------------------------------------------------------------------------
// Private row types
// ---------------------------------------------------------------------------

struct FactRow {
    user_id: String,
    kind: String,
    value: String,
    recorded_at: String,
}

impl FactRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            user_id: row.try_get("user_id")?,
            kind: row.try_get("kind")?,
            value: row.try_get("value")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }

    fn into_fact(self) -> Result<Fact, StoreError> {
        let kind = FactKind::from_str(&self.kind).map_err(StoreError::Corrupt)?;
        Ok(Fact {
            user_id: self.user_id,
            kind,
            value: self.value,
            recorded_at: parse_ts(&self.recorded_at)?,
        })
    }
}

struct InteractionRow {
    user_id: String,
    occurred_at: String,
    user_message: String,
    bot_response: String,
    mood: String,
}

impl InteractionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            user_id: row.try_get("user_id")?,
            occurred_at: row.try_get("occurred_at")?,
            user_message: row.try_get("user_message")?,
            bot_response: row.try_get("bot_response")?,
            mood: row.try_get("mood")?,
        })
    }

    fn into_interaction(self) -> Result<Interaction, StoreError> {
        let mood = Mood::from_str(&self.mood).map_err(StoreError::Corrupt)?;
        Ok(Interaction {
            user_id: self.user_id,
            occurred_at: parse_ts(&self.occurred_at)?,
            user_message: self.user_message,
            bot_response: self.bot_response,
            mood,
        })
    }
}

// ---------------------------------------------------------------------------
// Trait implementations
// ---------------------------------------------------------------------------

#[async_trait]
impl FactStore for SqliteStore {
    async fn append_fact(
        &self,
        user_id: &str,
        kind: FactKind,
        value: &str,
        recorded_at: DateTime<Utc>,
    ) -> Result<Fact, StoreError> {
        sqlx::query(
            "INSERT INTO user_facts (user_id, kind, value, recorded_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(value)
        .bind(format_ts(recorded_at))
        .execute(&self.pool)
        .await?;

        Ok(Fact {
            user_id: user_id.to_string(),
            kind,
            value: value.to_string(),
            recorded_at,
        })
    }

    async fn list_facts(&self, user_id: &str) -> Result<Vec<Fact>, StoreError> {
        let rows = sqlx::query(
            "SELECT user_id, kind, value, recorded_at FROM user_facts \
             WHERE user_id = ? ORDER BY recorded_at ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut facts = Vec::with_capacity(rows.len());
        for row in &rows {
            facts.push(FactRow::from_row(row)?.into_fact()?);
        }
        Ok(facts)
    }
}

#[async_trait]
impl InteractionLog for SqliteStore {
    async fn append_interaction(
        &self,
        user_id: &str,
        user_message: &str,
        bot_response: &str,
        mood: Mood,
        occurred_at: DateTime<Utc>,
    ) -> Result<Interaction, StoreError> {
        sqlx::query(
            "INSERT INTO sessions (user_id, occurred_at, user_message, bot_response, mood) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(format_ts(occurred_at))
        .bind(user_message)
        .bind(bot_response)
        .bind(mood.as_str())
        .execute(&self.pool)
        .await?;

        Ok(Interaction {
            user_id: user_id.to_string(),
            occurred_at,
            user_message: user_message.to_string(),
            bot_response: bot_response.to_string(),
            mood,
        })
    }

    async fn list_recent_interactions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<Interaction>, StoreError> {
        let rows = sqlx::query(
            "SELECT user_id, occurred_at, user_message, bot_response, mood FROM sessions \
             WHERE user_id = ? ORDER BY occurred_at DESC, id DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut interactions = Vec::with_capacity(rows.len());
        for row in &rows {
            interactions.push(InteractionRow::from_row(row)?.into_interaction()?);
        }
        Ok(interactions)
    }
}

#[async_trait]
impl KnowledgeBase for SqliteStore {
    async fn add_knowledge(
        &self,
        topic: &str,
        fact: &str,
        recorded_at: DateTime<Utc>,
    ) -> Result<Knowledge, StoreError> {
        sqlx::query(
            "INSERT INTO general_knowledge (topic, topic_key, fact, recorded_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(topic)
        .bind(topic.to_lowercase())
        .bind(fact)
        .bind(format_ts(recorded_at))
        .execute(&self.pool)
        .await?;

        Ok(Knowledge {
            topic: topic.to_string(),
            fact: fact.to_string(),
            recorded_at,
        })
    }

    async fn related_knowledge(
        &self,
        topic: &str,
        limit: usize,
    ) -> Result<Vec<Knowledge>, StoreError> {
        let rows = sqlx::query(
            "SELECT topic, fact, recorded_at FROM general_knowledge \
             WHERE instr(topic_key, ?) > 0 ORDER BY recorded_at DESC, id DESC LIMIT ?",
        )
        .bind(topic.to_lowercase())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut notes = Vec::with_capacity(rows.len());
        for row in &rows {
            let recorded_at: String = row.try_get("recorded_at")?;
            notes.push(Knowledge {
                topic: row.try_get("topic")?,
                fact: row.try_get("fact")?,
                recorded_at: parse_ts(&recorded_at)?,
            });
        }
        Ok(notes)
    }
}
