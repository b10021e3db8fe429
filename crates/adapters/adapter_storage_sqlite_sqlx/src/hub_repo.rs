//! `SQLite` implementation of [`HubRepository`].

use std::future::Future;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use minihub_app::ports::HubRepository;
use minihub_domain::error::MiniHubError;
use minihub_domain::hub::Hub;

use crate::error::StorageError;

struct Wrapper(Hub);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let last_seen: String = row.try_get("last_seen")?;
        let online: i64 = row.try_get("online")?;
        let created_at: String = row.try_get("created_at")?;

        let last_seen = chrono::DateTime::parse_from_rfc3339(&last_seen)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?
            .to_utc();
        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?
            .to_utc();

        Ok(Self(Hub {
            id,
            last_seen,
            online: online != 0,
            created_at,
        }))
    }
}

const SELECT_BY_ID: &str = "SELECT * FROM hubs WHERE id = ?";
const UPSERT: &str = r"
    INSERT INTO hubs (id, created_at, last_seen, online)
    VALUES (?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET last_seen = excluded.last_seen, online = excluded.online
";

/// `SQLite`-backed hub registration/heartbeat repository.
#[derive(Clone)]
pub struct SqliteHubRepository {
    pool: SqlitePool,
}

impl SqliteHubRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl HubRepository for SqliteHubRepository {
    fn get(&self, id: &str) -> impl Future<Output = Result<Option<Hub>, MiniHubError>> + Send {
        let pool = self.pool.clone();
        let id = id.to_string();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(id)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;
            Ok(row.map(|w| w.0))
        }
    }

    fn upsert(&self, hub: Hub) -> impl Future<Output = Result<Hub, MiniHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(UPSERT)
                .bind(&hub.id)
                .bind(hub.created_at.to_rfc3339())
                .bind(hub.last_seen.to_rfc3339())
                .bind(hub.online)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;
            Ok(hub)
        }
    }
}
