//! `SQLite` implementation of [`EntityRepository`].

use std::future::Future;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use minihub_app::ports::EntityRepository;
use minihub_domain::entity::{CapabilityDescriptor, DriverKey, Entity, EntityKind};
use minihub_domain::error::MiniHubError;
use minihub_domain::id::{DeviceId, EntityId};

use crate::error::StorageError;

struct Wrapper(Entity);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Entity> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let device_id: String = row.try_get("device_id")?;
        let driver_key_json: String = row.try_get("driver_key")?;
        let kind: String = row.try_get("kind")?;
        let capability_json: String = row.try_get("capability")?;
        let friendly_name: String = row.try_get("friendly_name")?;
        let created_at: String = row.try_get("created_at")?;
        let deactivated_at: Option<String> = row.try_get("deactivated_at")?;

        let id = EntityId::from_str(&id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let device_id =
            DeviceId::from_str(&device_id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let driver_key: DriverKey = serde_json::from_str(&driver_key_json)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let kind: EntityKind =
            serde_json::from_str(&format!("\"{kind}\"")).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let capability: CapabilityDescriptor = serde_json::from_str(&capability_json)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?
            .to_utc();
        let deactivated_at = deactivated_at
            .map(|s| chrono::DateTime::parse_from_rfc3339(&s).map(|dt| dt.to_utc()))
            .transpose()
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(Entity {
            id,
            device_id,
            driver_key,
            kind,
            capability,
            friendly_name,
            created_at,
            deactivated_at,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO entities
        (id, device_id, driver_key, kind, capability, friendly_name, created_at, deactivated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
";

const SELECT_BY_ID: &str = "SELECT * FROM entities WHERE id = ?";
const SELECT_ALL: &str = "SELECT * FROM entities";
const SELECT_BY_DEVICE_ID: &str = "SELECT * FROM entities WHERE device_id = ?";
const UPDATE: &str = r"
    UPDATE entities
    SET driver_key = ?, kind = ?, capability = ?, friendly_name = ?, deactivated_at = ?
    WHERE id = ?
";
const DELETE_BY_ID: &str = "DELETE FROM entities WHERE id = ?";

/// `SQLite`-backed entity repository.
#[derive(Clone)]
pub struct SqliteEntityRepository {
    pool: SqlitePool,
}

impl SqliteEntityRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl EntityRepository for SqliteEntityRepository {
    fn create(&self, entity: Entity) -> impl Future<Output = Result<Entity, MiniHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let driver_key_json = serde_json::to_string(&entity.driver_key).map_err(StorageError::from)?;
            let capability_json =
                serde_json::to_string(&entity.capability).map_err(StorageError::from)?;

            sqlx::query(INSERT)
                .bind(entity.id.to_string())
                .bind(entity.device_id.to_string())
                .bind(&driver_key_json)
                .bind(entity.kind.as_str())
                .bind(&capability_json)
                .bind(&entity.friendly_name)
                .bind(entity.created_at.to_rfc3339())
                .bind(entity.deactivated_at.map(|ts| ts.to_rfc3339()))
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(entity)
        }
    }

    fn get_by_id(
        &self,
        id: EntityId,
    ) -> impl Future<Output = Result<Option<Entity>, MiniHubError>> + Send {
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

    fn get_all(&self) -> impl Future<Output = Result<Vec<Entity>, MiniHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn find_by_device_id(
        &self,
        device_id: DeviceId,
    ) -> impl Future<Output = Result<Vec<Entity>, MiniHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_BY_DEVICE_ID)
                .bind(device_id.to_string())
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn update(&self, entity: Entity) -> impl Future<Output = Result<Entity, MiniHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let driver_key_json = serde_json::to_string(&entity.driver_key).map_err(StorageError::from)?;
            let capability_json =
                serde_json::to_string(&entity.capability).map_err(StorageError::from)?;

            sqlx::query(UPDATE)
                .bind(&driver_key_json)
                .bind(entity.kind.as_str())
                .bind(&capability_json)
                .bind(&entity.friendly_name)
                .bind(entity.deactivated_at.map(|ts| ts.to_rfc3339()))
                .bind(entity.id.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(entity)
        }
    }

    fn delete(&self, id: EntityId) -> impl Future<Output = Result<(), MiniHubError>> + Send {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use minihub_domain::device::{Device, Protocol};

    async fn setup() -> (SqliteEntityRepository, DeviceId) {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        let pool = db.pool().clone();

        let device = Device::builder()
            .protocol(Protocol::Esphome)
            .fingerprint("AA:BB:CC")
            .name("Test Device")
            .build()
            .unwrap();
        let device_id = device.id;
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

        (SqliteEntityRepository::new(pool), device_id)
    }

    fn test_entity(device_id: DeviceId) -> Entity {
        Entity::builder()
            .device_id(device_id)
            .driver_key(DriverKey::Index(3))
            .kind(EntityKind::Light)
            .friendly_name("Kitchen Light")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_create_and_retrieve_entity_when_valid() {
        let (repo, device_id) = setup().await;
        let entity = test_entity(device_id);
        let id = entity.id;

        repo.create(entity).await.unwrap();

        let fetched = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.driver_key, DriverKey::Index(3));
        assert_eq!(fetched.kind, EntityKind::Light);
        assert!(fetched.is_active());
    }

    #[tokio::test]
    async fn should_return_none_when_entity_not_found() {
        let (repo, _) = setup().await;
        let result = repo.get_by_id(EntityId::new()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn should_find_entities_by_device_id() {
        let (repo, device_id) = setup().await;
        repo.create(test_entity(device_id)).await.unwrap();
        repo.create(
            Entity::builder()
                .device_id(device_id)
                .driver_key(DriverKey::Text("sensor/1".to_string()))
                .kind(EntityKind::Sensor)
                .friendly_name("Temperature")
                .build()
                .unwrap(),
        )
        .await
        .unwrap();

        let found = repo.find_by_device_id(device_id).await.unwrap();
        assert_eq!(found.len(), 2);

        let none = repo.find_by_device_id(DeviceId::new()).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn should_preserve_capability_descriptor_through_roundtrip() {
        let (repo, device_id) = setup().await;
        let capability = CapabilityDescriptor::default()
            .with_feature("brightness")
            .with_range("brightness", 0.0, 1.0);
        let entity = Entity::builder()
            .device_id(device_id)
            .driver_key(DriverKey::Index(1))
            .kind(EntityKind::Light)
            .capability(capability)
            .friendly_name("Light")
            .build()
            .unwrap();
        let id = entity.id;

        repo.create(entity).await.unwrap();

        let fetched = repo.get_by_id(id).await.unwrap().unwrap();
        assert!(fetched.capability.has_feature("brightness"));
        assert_eq!(fetched.capability.ranges["brightness"].max, 1.0);
    }

    #[tokio::test]
    async fn should_deactivate_entity_through_update() {
        let (repo, device_id) = setup().await;
        let mut entity = test_entity(device_id);
        let id = entity.id;
        repo.create(entity.clone()).await.unwrap();

        let now = minihub_domain::time::now();
        entity.deactivate(now);
        repo.update(entity).await.unwrap();

        let fetched = repo.get_by_id(id).await.unwrap().unwrap();
        assert!(!fetched.is_active());
    }

    #[tokio::test]
    async fn should_delete_entity_when_exists() {
        let (repo, device_id) = setup().await;
        let entity = test_entity(device_id);
        let id = entity.id;
        repo.create(entity).await.unwrap();

        repo.delete(id).await.unwrap();

        let result = repo.get_by_id(id).await.unwrap();
        assert!(result.is_none());
    }
}
