//! Message persistence.
//!
//! Two append-only logs: raw messages, written synchronously when a message
//! arrives, and translation sets, written later by the background fan-out.
//! They are correlated by `message_id` as a plain value with no foreign key,
//! so a raw message may exist without its translation set.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::Row;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: String,
    pub original: String,
    pub source_lang: String,
    pub timestamp: DateTime<Utc>,
}

/// A raw message before the store assigns its id.
#[derive(Debug, Clone)]
pub struct NewRawMessage {
    pub original: String,
    pub source_lang: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationSet {
    pub message_id: String,
    pub translations: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a raw message and return it with its generated id.
    async fn insert_raw(&self, message: NewRawMessage) -> Result<RawMessage>;

    /// Append a complete translation set.
    async fn insert_translation_set(&self, set: &TranslationSet) -> Result<()>;

    /// All raw messages, newest first.
    async fn list_raw(&self) -> Result<Vec<RawMessage>>;

    /// The translation set written for a message, if it exists yet.
    async fn find_translation_set(&self, message_id: &str) -> Result<Option<TranslationSet>>;
}

/// In-process store, used when no database is configured and in tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryLogs>,
}

#[derive(Default)]
struct MemoryLogs {
    next_id: u64,
    raw: Vec<RawMessage>,
    translated: Vec<TranslationSet>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn logs(&self) -> Result<std::sync::MutexGuard<'_, MemoryLogs>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("Message store lock poisoned"))
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn insert_raw(&self, message: NewRawMessage) -> Result<RawMessage> {
        let mut logs = self.logs()?;
        logs.next_id += 1;

        let raw = RawMessage {
            id: logs.next_id.to_string(),
            original: message.original,
            source_lang: message.source_lang,
            timestamp: message.timestamp,
        };
        logs.raw.push(raw.clone());
        Ok(raw)
    }

    async fn insert_translation_set(&self, set: &TranslationSet) -> Result<()> {
        self.logs()?.translated.push(set.clone());
        Ok(())
    }

    async fn list_raw(&self) -> Result<Vec<RawMessage>> {
        let mut messages = self.logs()?.raw.clone();
        // Stable sort keeps insertion order for equal timestamps; reverse it
        messages.reverse();
        messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(messages)
    }

    async fn find_translation_set(&self, message_id: &str) -> Result<Option<TranslationSet>> {
        Ok(self
            .logs()?
            .translated
            .iter()
            .find(|set| set.message_id == message_id)
            .cloned())
    }
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and create the tables if they do not exist yet.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        let store = Self { pool };
        store.init_schema().await?;
        info!("✓ Connected to PostgreSQL");
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages_raw (
                id BIGSERIAL PRIMARY KEY,
                original TEXT NOT NULL,
                source_lang TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create messages_raw table")?;

        // message_id is a plain value: the set may lag behind or never arrive
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS messages_translated (
                id BIGSERIAL PRIMARY KEY,
                message_id TEXT NOT NULL,
                translations JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create messages_translated table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_translated_message_id
             ON messages_translated (message_id)",
        )
        .execute(&self.pool)
        .await
        .context("Failed to create messages_translated index")?;

        Ok(())
    }
}

#[async_trait]
impl MessageStore for PgStore {
    async fn insert_raw(&self, message: NewRawMessage) -> Result<RawMessage> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO messages_raw (original, source_lang, created_at)
             VALUES ($1, $2, $3)
             RETURNING id",
        )
        .bind(&message.original)
        .bind(&message.source_lang)
        .bind(message.timestamp)
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert raw message")?;

        Ok(RawMessage {
            id: id.to_string(),
            original: message.original,
            source_lang: message.source_lang,
            timestamp: message.timestamp,
        })
    }

    async fn insert_translation_set(&self, set: &TranslationSet) -> Result<()> {
        sqlx::query(
            "INSERT INTO messages_translated (message_id, translations, created_at)
             VALUES ($1, $2, $3)",
        )
        .bind(&set.message_id)
        .bind(Json(&set.translations))
        .bind(set.timestamp)
        .execute(&self.pool)
        .await
        .context("Failed to insert translation set")?;

        Ok(())
    }

    async fn list_raw(&self) -> Result<Vec<RawMessage>> {
        let rows = sqlx::query(
            "SELECT id, original, source_lang, created_at
             FROM messages_raw
             ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list raw messages")?;

        rows.iter()
            .map(|row| -> Result<RawMessage> {
                Ok(RawMessage {
                    id: row.try_get::<i64, _>("id")?.to_string(),
                    original: row.try_get("original")?,
                    source_lang: row.try_get("source_lang")?,
                    timestamp: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn find_translation_set(&self, message_id: &str) -> Result<Option<TranslationSet>> {
        let row = sqlx::query(
            "SELECT message_id, translations, created_at
             FROM messages_translated
             WHERE message_id = $1
             ORDER BY id
             LIMIT 1",
        )
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch translation set")?;

        row.map(|row| -> Result<TranslationSet> {
            let Json(translations) =
                row.try_get::<Json<BTreeMap<String, String>>, _>("translations")?;
            Ok(TranslationSet {
                message_id: row.try_get("message_id")?,
                translations,
                timestamp: row.try_get("created_at")?,
            })
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_message(text: &str, lang: &str, timestamp: DateTime<Utc>) -> NewRawMessage {
        NewRawMessage {
            original: text.to_string(),
            source_lang: lang.to_string(),
            timestamp,
        }
    }

    #[tokio::test]
    async fn test_insert_raw_assigns_unique_ids() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let first = store.insert_raw(new_message("Hello", "en", now)).await.unwrap();
        let second = store.insert_raw(new_message("Kumusta", "fil", now)).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(first.original, "Hello");
        assert_eq!(second.source_lang, "fil");
    }

    #[tokio::test]
    async fn test_list_raw_newest_first() {
        let store = MemoryStore::new();
        let now = Utc::now();

        store
            .insert_raw(new_message("older", "en", now - Duration::minutes(5)))
            .await
            .unwrap();
        store.insert_raw(new_message("newest", "en", now)).await.unwrap();
        store
            .insert_raw(new_message("middle", "en", now - Duration::minutes(1)))
            .await
            .unwrap();

        let originals: Vec<_> = store
            .list_raw()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.original)
            .collect();

        assert_eq!(originals, vec!["newest", "middle", "older"]);
    }

    #[tokio::test]
    async fn test_list_raw_same_timestamp_latest_insert_first() {
        let store = MemoryStore::new();
        let now = Utc::now();

        store.insert_raw(new_message("first", "en", now)).await.unwrap();
        store.insert_raw(new_message("second", "en", now)).await.unwrap();

        let messages = store.list_raw().await.unwrap();
        assert_eq!(messages[0].original, "second");
        assert_eq!(messages[1].original, "first");
    }

    #[tokio::test]
    async fn test_translation_set_absent_until_written() {
        let store = MemoryStore::new();
        let raw = store
            .insert_raw(new_message("Hello", "en", Utc::now()))
            .await
            .unwrap();

        assert!(store.find_translation_set(&raw.id).await.unwrap().is_none());

        let set = TranslationSet {
            message_id: raw.id.clone(),
            translations: BTreeMap::from([
                ("en".to_string(), "Hello".to_string()),
                ("fil".to_string(), "Kumusta".to_string()),
            ]),
            timestamp: Utc::now(),
        };
        store.insert_translation_set(&set).await.unwrap();

        let found = store
            .find_translation_set(&raw.id)
            .await
            .unwrap()
            .expect("set should exist");
        assert_eq!(found, set);
    }

    #[tokio::test]
    async fn test_translation_set_not_linked_structurally() {
        let store = MemoryStore::new();

        // No raw message with this id exists; the store accepts it anyway
        let set = TranslationSet {
            message_id: "orphan".to_string(),
            translations: BTreeMap::new(),
            timestamp: Utc::now(),
        };
        store.insert_translation_set(&set).await.unwrap();

        assert!(store.find_translation_set("orphan").await.unwrap().is_some());
        assert!(store.list_raw().await.unwrap().is_empty());
    }

    #[test]
    fn test_raw_message_serialization() {
        let message = RawMessage {
            id: "42".to_string(),
            original: "Kumusta ka?".to_string(),
            source_lang: "fil".to_string(),
            timestamp: Utc::now(),
        };

        let json = serde_json::to_string(&message).expect("serialize");
        let restored: RawMessage = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(message, restored);
    }
}
