//! `SQLite` implementation of [`LatestStateSink`].
//!
//! One row per entity, overwritten on every accepted update — the
//! single-row-per-entity sink described by the storage port's doc comment.

use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use minihub_app::persistence::{retry_until_ok, PersistenceHealth};
use minihub_app::ports::{EventPublisher, LatestStateSink};
use minihub_domain::entity::{AttributeValue, EntityState};
use minihub_domain::error::MiniHubError;
use minihub_domain::id::EntityId;

use crate::error::StorageError;

struct Wrapper(EntityState);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let entity_id: String = row.try_get("entity_id")?;
        let value_json: String = row.try_get("value")?;
        let attributes_json: String = row.try_get("attributes")?;
        let updated_at: String = row.try_get("updated_at")?;

        let entity_id =
            EntityId::from_str(&entity_id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let value: serde_json::Value =
            serde_json::from_str(&value_json).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let attributes: HashMap<String, AttributeValue> = serde_json::from_str(&attributes_json)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let updated_at = chrono::DateTime::parse_from_rfc3339(&updated_at)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?
            .to_utc();

        Ok(Self(
            EntityState::new(entity_id, value, updated_at).with_attributes(attributes),
        ))
    }
}

const UPSERT: &str = r"
    INSERT INTO entity_state (entity_id, value, attributes, updated_at)
    VALUES (?, ?, ?, ?)
    ON CONFLICT(entity_id) DO UPDATE SET
        value = excluded.value,
        attributes = excluded.attributes,
        updated_at = excluded.updated_at
";

const SELECT_BY_ID: &str = "SELECT * FROM entity_state WHERE entity_id = ?";
const SELECT_ALL: &str = "SELECT * FROM entity_state";

/// `SQLite`-backed latest-state sink. Upserts retry indefinitely with
/// backoff through `health` on failure rather than surfacing the error to
/// the registry service; reads are not retried, since a transient read
/// failure is meaningful to the caller immediately.
pub struct SqliteEntityStateRepository<EP> {
    pool: SqlitePool,
    publisher: Arc<EP>,
    health: PersistenceHealth,
}

// Manual impl: only the `Arc`/pool handles and the shared health flag need
// to be bumped, so this shouldn't require `EP: Clone`.
impl<EP> Clone for SqliteEntityStateRepository<EP> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            publisher: Arc::clone(&self.publisher),
            health: self.health.clone(),
        }
    }
}

impl<EP> SqliteEntityStateRepository<EP>
where
    EP: EventPublisher + Send + Sync + 'static,
{
    /// Create a new sink using the given connection pool. `publisher` and
    /// `health` are used to report and track persistence degradation.
    #[must_use]
    pub fn new(pool: SqlitePool, publisher: EP, health: PersistenceHealth) -> Self {
        Self {
            pool,
            publisher: Arc::new(publisher),
            health,
        }
    }
}

impl<EP> LatestStateSink for SqliteEntityStateRepository<EP>
where
    EP: EventPublisher + Send + Sync + 'static,
{
    fn upsert(&self, state: EntityState) -> impl Future<Output = Result<(), MiniHubError>> + Send {
        let pool = self.pool.clone();
        let publisher = Arc::clone(&self.publisher);
        let health = self.health.clone();
        async move {
            let value_json = serde_json::to_string(&state.value).map_err(StorageError::from)?;
            let attributes_json =
                serde_json::to_string(&state.attributes).map_err(StorageError::from)?;

            retry_until_ok(&health, publisher.as_ref(), || {
                let pool = pool.clone();
                let value_json = value_json.clone();
                let attributes_json = attributes_json.clone();
                let updated_at = state.updated_at.to_rfc3339();
                let entity_id = state.entity_id.to_string();
                async move {
                    sqlx::query(UPSERT)
                        .bind(entity_id)
                        .bind(value_json)
                        .bind(attributes_json)
                        .bind(updated_at)
                        .execute(&pool)
                        .await
                        .map_err(StorageError::from)
                }
            })
            .await;

            Ok(())
        }
    }

    fn get(
        &self,
        entity_id: EntityId,
    ) -> impl Future<Output = Result<Option<EntityState>, MiniHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(entity_id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|w| w.0))
        }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<EntityState>, MiniHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }
}
