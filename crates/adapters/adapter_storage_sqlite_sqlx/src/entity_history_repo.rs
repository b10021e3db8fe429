//! `SQLite` implementation of [`HistorySink`].
//!
//! Writes are never applied synchronously: [`append`](HistorySink::append)
//! drops the record into a bounded in-memory buffer and returns immediately,
//! and a background task drains it into `SQLite` in batches. This keeps a
//! burst of state changes from blocking the registry service on disk I/O.
//! When the buffer itself fills up (the writer is outrunning the flush
//! task) the oldest buffered record is dropped and a `history/overflow`
//! event is published, mirroring the event bus's own drop-oldest policy.

use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use minihub_app::persistence::{retry_until_ok, PersistenceHealth};
use minihub_app::ports::{EventPublisher, HistorySink};
use minihub_domain::entity::AttributeValue;
use minihub_domain::entity_state_history::EntityStateHistory;
use minihub_domain::error::MiniHubError;
use minihub_domain::event::Event;
use minihub_domain::id::{EntityId, EntityStateHistoryId};

use crate::error::StorageError;

/// Maximum records flushed to `SQLite` in a single batch.
pub const MAX_BATCH_SIZE: usize = 500;
/// Upper bound on time a record can sit in the buffer before being flushed.
pub const FLUSH_INTERVAL: Duration = Duration::from_millis(250);
/// Bounded in-memory buffer capacity before oldest records are dropped.
pub const BUFFER_CAPACITY: usize = 50_000;

struct Wrapper(EntityStateHistory);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let entity_id: String = row.try_get("entity_id")?;
        let value_json: String = row.try_get("value")?;
        let attributes_json: String = row.try_get("attributes")?;
        let recorded_at: String = row.try_get("recorded_at")?;

        let id = EntityStateHistoryId::from_str(&id)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let entity_id =
            EntityId::from_str(&entity_id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let value: serde_json::Value =
            serde_json::from_str(&value_json).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let attributes: HashMap<String, AttributeValue> = serde_json::from_str(&attributes_json)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let recorded_at = chrono::DateTime::parse_from_rfc3339(&recorded_at)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?
            .to_utc();

        Ok(Self(EntityStateHistory {
            id,
            entity_id,
            value,
            attributes,
            recorded_at,
        }))
    }
}

const SELECT_BY_ENTITY: &str =
    "SELECT * FROM entity_state_history WHERE entity_id = ? ORDER BY recorded_at DESC LIMIT ?";

struct Buffer {
    queue: Mutex<VecDeque<EntityStateHistory>>,
    notify: Notify,
    dropped: AtomicU64,
}

/// `SQLite`-backed, batch-flushed history sink.
pub struct SqliteEntityHistoryRepository<EP> {
    pool: SqlitePool,
    buffer: Arc<Buffer>,
    publisher: Arc<EP>,
    health: PersistenceHealth,
}

// Manual impl: cloning only needs to bump the `Arc`/pool handles, so it
// shouldn't require `EP: Clone`.
impl<EP> Clone for SqliteEntityHistoryRepository<EP> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            buffer: Arc::clone(&self.buffer),
            publisher: Arc::clone(&self.publisher),
            health: self.health.clone(),
        }
    }
}

impl<EP> SqliteEntityHistoryRepository<EP>
where
    EP: EventPublisher + Send + Sync + 'static,
{
    /// Create a new sink using the given connection pool. `publisher` reports
    /// both buffer overflows and persistence degradation; call
    /// [`spawn_flush_loop`](Self::spawn_flush_loop) once to start the
    /// background writer.
    #[must_use]
    pub fn new(pool: SqlitePool, publisher: EP, health: PersistenceHealth) -> Self {
        Self {
            pool,
            buffer: Arc::new(Buffer {
                queue: Mutex::new(VecDeque::with_capacity(BUFFER_CAPACITY.min(1024))),
                notify: Notify::new(),
                dropped: AtomicU64::new(0),
            }),
            publisher: Arc::new(publisher),
            health,
        }
    }

    /// Start the background task that drains the buffer into `SQLite`
    /// every [`FLUSH_INTERVAL`] or whenever [`MAX_BATCH_SIZE`] records have
    /// accumulated, whichever comes first. A batch that fails to flush
    /// retries indefinitely with backoff (see [`retry_until_ok`]) rather
    /// than being dropped. The returned handle runs until aborted; the
    /// supervisor is responsible for its lifetime.
    pub fn spawn_flush_loop(&self) -> JoinHandle<()> {
        let pool = self.pool.clone();
        let buffer = Arc::clone(&self.buffer);
        let publisher = Arc::clone(&self.publisher);
        let health = self.health.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = buffer.notify.notified() => {}
                    () = tokio::time::sleep(FLUSH_INTERVAL) => {}
                }
                let batch = drain_batch(&buffer);
                if batch.is_empty() {
                    continue;
                }
                retry_until_ok(&health, publisher.as_ref(), || flush_batch(&pool, &batch)).await;
            }
        })
    }
}

fn drain_batch(buffer: &Buffer) -> Vec<EntityStateHistory> {
    let mut queue = buffer.queue.lock().expect("history buffer mutex poisoned");
    let take = queue.len().min(MAX_BATCH_SIZE);
    queue.drain(..take).collect()
}

async fn flush_batch(pool: &SqlitePool, batch: &[EntityStateHistory]) -> Result<(), StorageError> {
    let mut tx = pool.begin().await?;
    for record in batch {
        let attributes_json = serde_json::to_string(&record.attributes)?;
        sqlx::query(
            "INSERT INTO entity_state_history (id, entity_id, value, attributes, recorded_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(record.entity_id.to_string())
        .bind(record.value.to_string())
        .bind(&attributes_json)
        .bind(record.recorded_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

impl<EP> HistorySink for SqliteEntityHistoryRepository<EP>
where
    EP: EventPublisher + Send + Sync + 'static,
{
    async fn append(&self, record: EntityStateHistory) -> Result<(), MiniHubError> {
        let dropped = {
            let mut queue = self.buffer.queue.lock().expect("history buffer mutex poisoned");
            let dropped = if queue.len() >= BUFFER_CAPACITY {
                queue.pop_front();
                Some(self.buffer.dropped.fetch_add(1, Ordering::Relaxed) + 1)
            } else {
                None
            };
            queue.push_back(record);
            dropped
        };
        self.buffer.notify.notify_one();

        if let Some(dropped) = dropped {
            let publisher = Arc::clone(&self.publisher);
            let _ = publisher.publish(Event::history_overflow(dropped)).await;
        }
        Ok(())
    }

    async fn find_by_entity(
        &self,
        entity_id: EntityId,
        limit: usize,
    ) -> Result<Vec<EntityStateHistory>, MiniHubError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_ENTITY)
            .bind(entity_id.to_string())
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use minihub_domain::device::{Device, Protocol};
    use minihub_domain::entity::{DriverKey, Entity, EntityKind};
    use std::sync::Mutex as StdMutex;

    #[derive(Default, Clone)]
    struct RecordingPublisher {
        events: Arc<StdMutex<Vec<Event>>>,
    }

    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, event: Event) -> Result<(), MiniHubError> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    async fn setup() -> (SqliteEntityHistoryRepository<RecordingPublisher>, EntityId) {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        let pool = db.pool().clone();

        let device = Device::builder()
            .protocol(Protocol::Esphome)
            .fingerprint("fp")
            .name("Device")
            .build()
            .unwrap();
        sqlx::query(
            "INSERT INTO devices (id, protocol, fingerprint, name, created_at, last_seen) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(device.id.to_string())
        .bind(device.protocol.as_str())
        .bind(&device.fingerprint)
        .bind(&device.name)
        .bind(device.created_at.to_rfc3339())
        .bind(device.last_seen.to_rfc3339())
        .execute(&pool)
        .await
        .unwrap();

        let entity = Entity::builder()
            .device_id(device.id)
            .driver_key(DriverKey::Index(1))
            .kind(EntityKind::Sensor)
            .friendly_name("Sensor")
            .build()
            .unwrap();
        sqlx::query(
            "INSERT INTO entities (id, device_id, driver_key, kind, capability, friendly_name, created_at) VALUES (?, ?, '{}', ?, '{}', ?, ?)",
        )
        .bind(entity.id.to_string())
        .bind(device.id.to_string())
        .bind(entity.kind.as_str())
        .bind(&entity.friendly_name)
        .bind(entity.created_at.to_rfc3339())
        .execute(&pool)
        .await
        .unwrap();

        (
            SqliteEntityHistoryRepository::new(pool, RecordingPublisher::default(), PersistenceHealth::new()),
            entity.id,
        )
    }

    #[tokio::test]
    async fn should_flush_appended_records_to_sqlite() {
        let (repo, entity_id) = setup().await;
        let _flush = repo.spawn_flush_loop();

        repo.append(
            EntityStateHistory::builder()
                .entity_id(entity_id)
                .value(serde_json::json!({"temp": 21.5}))
                .build(),
        )
        .await
        .unwrap();

        tokio::time::sleep(FLUSH_INTERVAL * 2).await;

        let found = repo.find_by_entity(entity_id, 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, serde_json::json!({"temp": 21.5}));
    }

    #[tokio::test]
    async fn should_return_empty_when_no_history_flushed_yet() {
        let (repo, entity_id) = setup().await;
        let found = repo.find_by_entity(entity_id, 10).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn should_drop_oldest_and_publish_overflow_when_buffer_full() {
        let (repo, entity_id) = setup().await;
        {
            let mut queue = repo.buffer.queue.lock().unwrap();
            for _ in 0..BUFFER_CAPACITY {
                queue.push_back(
                    EntityStateHistory::builder()
                        .entity_id(entity_id)
                        .value(serde_json::json!(0))
                        .build(),
                );
            }
        }

        repo.append(
            EntityStateHistory::builder()
                .entity_id(entity_id)
                .value(serde_json::json!(1))
                .build(),
        )
        .await
        .unwrap();

        assert_eq!(repo.buffer.dropped.load(Ordering::Relaxed), 1);
        let events = repo.publisher.events.lock().unwrap();
        assert!(events.iter().any(|e| e.topic == "history/overflow"));
    }
}
