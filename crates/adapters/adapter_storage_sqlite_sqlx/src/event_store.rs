//! `SQLite` implementation of [`EventStore`].

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use minihub_app::ports::EventStore;
use minihub_domain::error::MiniHubError;
use minihub_domain::event::Event;
use minihub_domain::id::EventId;

use crate::error::StorageError;

struct Wrapper(Event);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Event> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let topic: String = row.try_get("topic")?;
        let payload_json: String = row.try_get("payload")?;
        let published_at: String = row.try_get("published_at")?;

        let id = EventId::from_str(&id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let payload: serde_json::Value = serde_json::from_str(&payload_json)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let published_at = chrono::DateTime::parse_from_rfc3339(&published_at)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?
            .to_utc();

        Ok(Self(Event {
            id,
            topic,
            payload,
            published_at,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO events (id, topic, payload, published_at)
    VALUES (?, ?, ?, ?)
";

const SELECT_BY_ID: &str = "SELECT * FROM events WHERE id = ?";
const SELECT_RECENT: &str = "SELECT * FROM events ORDER BY published_at DESC LIMIT ?";

/// `SQLite`-backed event store.
#[derive(Clone)]
pub struct SqliteEventStore {
    pool: SqlitePool,
}

impl SqliteEventStore {
    /// Create a new event store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl EventStore for SqliteEventStore {
    async fn store(&self, event: Event) -> Result<Event, MiniHubError> {
        let payload_json = serde_json::to_string(&event.payload).map_err(StorageError::from)?;

        sqlx::query(INSERT)
            .bind(event.id.to_string())
            .bind(&event.topic)
            .bind(&payload_json)
            .bind(event.published_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(event)
    }

    async fn get_by_id(&self, id: EventId) -> Result<Option<Event>, MiniHubError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(Wrapper::maybe(row))
    }

    async fn get_recent(&self, limit: usize) -> Result<Vec<Event>, MiniHubError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_RECENT)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    /// Loads the most recent `limit * 4` rows (bounded) and filters them by
    /// topic pattern in-process, since `SQLite` has no native glob that
    /// maps onto the single-segment-wildcard semantics of
    /// [`Event::matches_topic_pattern`].
    async fn find_by_topic_pattern(
        &self,
        pattern: &str,
        limit: usize,
    ) -> Result<Vec<Event>, MiniHubError> {
        let scan_limit = i64::try_from(limit.saturating_mul(4).max(200)).unwrap_or(i64::MAX);
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_RECENT)
            .bind(scan_limit)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows
            .into_iter()
            .map(|w| w.0)
            .filter(|event| event.matches_topic_pattern(pattern))
            .take(limit)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;

    async fn setup() -> SqliteEventStore {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SqliteEventStore::new(db.pool().clone())
    }

    #[tokio::test]
    async fn should_store_and_retrieve_event_by_id() {
        let store = setup().await;
        let event = Event::new("entity/abc/state", serde_json::json!({"on": true}));
        let id = event.id;

        store.store(event).await.unwrap();

        let fetched = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.topic, "entity/abc/state");
        assert_eq!(fetched.payload["on"], true);
    }

    #[tokio::test]
    async fn should_return_none_when_event_not_found() {
        let store = setup().await;
        let result = store.get_by_id(EventId::new()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn should_get_recent_events_ordered_newest_first() {
        let store = setup().await;

        let e1 = Event::new("entity/abc/state", serde_json::json!({}));
        let e1_id = e1.id;
        store.store(e1).await.unwrap();

        let e2 = Event::new("device/abc/lifecycle", serde_json::json!({}));
        let e2_id = e2.id;
        store.store(e2).await.unwrap();

        let recent = store.get_recent(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, e2_id);
        assert_eq!(recent[1].id, e1_id);
    }

    #[tokio::test]
    async fn should_respect_limit_on_get_recent() {
        let store = setup().await;
        for _ in 0..5 {
            store
                .store(Event::new("discovery/found", serde_json::json!({})))
                .await
                .unwrap();
        }

        let recent = store.get_recent(3).await.unwrap();
        assert_eq!(recent.len(), 3);
    }

    #[tokio::test]
    async fn should_find_events_by_exact_topic_pattern() {
        let store = setup().await;
        store
            .store(Event::new("entity/abc/state", serde_json::json!({})))
            .await
            .unwrap();
        store
            .store(Event::new("entity/def/state", serde_json::json!({})))
            .await
            .unwrap();
        store
            .store(Event::new("discovery/found", serde_json::json!({})))
            .await
            .unwrap();

        let matches = store
            .find_by_topic_pattern("entity/*/state", 10)
            .await
            .unwrap();
        assert_eq!(matches.len(), 2);
    }

    #[tokio::test]
    async fn should_preserve_event_payload_through_roundtrip() {
        let store = setup().await;
        let event = Event::new(
            "entity/abc/attributes",
            serde_json::json!({"key": "brightness", "old": 100, "new": 200}),
        );
        let id = event.id;

        store.store(event).await.unwrap();

        let fetched = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.payload["key"], "brightness");
        assert_eq!(fetched.payload["old"], 100);
        assert_eq!(fetched.payload["new"], 200);
    }
}
