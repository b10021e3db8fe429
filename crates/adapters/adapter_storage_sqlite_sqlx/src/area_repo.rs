//! `SQLite` implementation of [`AreaRepository`].

use std::future::Future;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use minihub_app::ports::AreaRepository;
use minihub_domain::area::Area;
use minihub_domain::error::MiniHubError;
use minihub_domain::id::AreaId;

use crate::error::StorageError;

/// Wrapper for converting database rows into domain [`Area`].
struct Wrapper(Area);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Area> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let name: String = row.try_get("name")?;
        let parent_id: Option<String> = row.try_get("parent_id")?;

        let id = AreaId::from_str(&id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let parent_id = parent_id
            .map(|s| AreaId::from_str(&s))
            .transpose()
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(Area {
            id,
            name,
            parent_id,
        }))
    }
}

const INSERT: &str = "INSERT INTO areas (id, name, parent_id) VALUES (?, ?, ?)";
const SELECT_BY_ID: &str = "SELECT * FROM areas WHERE id = ?";
const SELECT_ALL: &str = "SELECT * FROM areas";
const UPDATE: &str = "UPDATE areas SET name = ?, parent_id = ? WHERE id = ?";
const DELETE_BY_ID: &str = "DELETE FROM areas WHERE id = ?";

/// `SQLite`-backed area repository.
#[derive(Clone)]
pub struct SqliteAreaRepository {
    pool: SqlitePool,
}

impl SqliteAreaRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl AreaRepository for SqliteAreaRepository {
    fn create(&self, area: Area) -> impl Future<Output = Result<Area, MiniHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(INSERT)
                .bind(area.id.to_string())
                .bind(&area.name)
                .bind(area.parent_id.map(|id| id.to_string()))
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(area)
        }
    }

    fn get_by_id(
        &self,
        id: AreaId,
    ) -> impl Future<Output = Result<Option<Area>, MiniHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Area>, MiniHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn update(&self, area: Area) -> impl Future<Output = Result<Area, MiniHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(UPDATE)
                .bind(&area.name)
                .bind(area.parent_id.map(|id| id.to_string()))
                .bind(area.id.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(area)
        }
    }

    fn delete(&self, id: AreaId) -> impl Future<Output = Result<(), MiniHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(DELETE_BY_ID)
                .bind(id.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }
}
