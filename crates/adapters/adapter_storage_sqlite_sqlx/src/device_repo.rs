//! `SQLite` implementation of [`DeviceRepository`].

use std::future::Future;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use minihub_app::ports::DeviceRepository;
use minihub_domain::device::{Device, Protocol};
use minihub_domain::error::MiniHubError;
use minihub_domain::id::{AreaId, DeviceId};

use crate::error::StorageError;

struct Wrapper(Device);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Device> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let protocol: String = row.try_get("protocol")?;
        let fingerprint: String = row.try_get("fingerprint")?;
        let name: String = row.try_get("name")?;
        let address: Option<String> = row.try_get("address")?;
        let port: Option<i64> = row.try_get("port")?;
        let manufacturer: Option<String> = row.try_get("manufacturer")?;
        let model: Option<String> = row.try_get("model")?;
        let firmware: Option<String> = row.try_get("firmware")?;
        let area_id: Option<String> = row.try_get("area_id")?;
        let created_at: String = row.try_get("created_at")?;
        let last_seen: String = row.try_get("last_seen")?;

        let id = DeviceId::from_str(&id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let protocol =
            Protocol::from_str(&protocol).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let area_id = area_id
            .map(|s| AreaId::from_str(&s))
            .transpose()
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?
            .to_utc();
        let last_seen = chrono::DateTime::parse_from_rfc3339(&last_seen)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?
            .to_utc();

        Ok(Self(Device {
            id,
            protocol,
            fingerprint,
            name,
            address,
            port: port.map(|p| p as u16),
            manufacturer,
            model,
            firmware,
            area_id,
            created_at,
            last_seen,
        }))
    }
}

const INSERT: &str = r"
    INSERT INTO devices
        (id, protocol, fingerprint, name, address, port, manufacturer, model, firmware, area_id, created_at, last_seen)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";

const SELECT_BY_ID: &str = "SELECT * FROM devices WHERE id = ?";
const SELECT_ALL: &str = "SELECT * FROM devices";
const SELECT_BY_PROTOCOL_FINGERPRINT: &str =
    "SELECT * FROM devices WHERE protocol = ? AND fingerprint = ?";
const UPDATE: &str = r"
    UPDATE devices
    SET name = ?, address = ?, port = ?, manufacturer = ?, model = ?, firmware = ?, area_id = ?, last_seen = ?
    WHERE id = ?
";
const DELETE_BY_ID: &str = "DELETE FROM devices WHERE id = ?";

/// `SQLite`-backed device repository.
#[derive(Clone)]
pub struct SqliteDeviceRepository {
    pool: SqlitePool,
}

impl SqliteDeviceRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl DeviceRepository for SqliteDeviceRepository {
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, MiniHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(INSERT)
                .bind(device.id.to_string())
                .bind(device.protocol.as_str())
                .bind(&device.fingerprint)
                .bind(&device.name)
                .bind(&device.address)
                .bind(device.port.map(i64::from))
                .bind(&device.manufacturer)
                .bind(&device.model)
                .bind(&device.firmware)
                .bind(device.area_id.map(|id| id.to_string()))
                .bind(device.created_at.to_rfc3339())
                .bind(device.last_seen.to_rfc3339())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(device)
        }
    }

    fn get_by_id(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, MiniHubError>> + Send {
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

    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, MiniHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn find_by_protocol_fingerprint(
        &self,
        protocol: Protocol,
        fingerprint: &str,
    ) -> impl Future<Output = Result<Option<Device>, MiniHubError>> + Send {
        let pool = self.pool.clone();
        let fingerprint = fingerprint.to_string();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_PROTOCOL_FINGERPRINT)
                .bind(protocol.as_str())
                .bind(&fingerprint)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn update(&self, device: Device) -> impl Future<Output = Result<Device, MiniHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(UPDATE)
                .bind(&device.name)
                .bind(&device.address)
                .bind(device.port.map(i64::from))
                .bind(&device.manufacturer)
                .bind(&device.model)
                .bind(&device.firmware)
                .bind(device.area_id.map(|id| id.to_string()))
                .bind(device.last_seen.to_rfc3339())
                .bind(device.id.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(device)
        }
    }

    fn delete(&self, id: DeviceId) -> impl Future<Output = Result<(), MiniHubError>> + Send {
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

    async fn setup() -> SqliteDeviceRepository {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SqliteDeviceRepository::new(db.pool().clone())
    }

    fn test_device() -> Device {
        Device::builder()
            .protocol(Protocol::Esphome)
            .fingerprint("AA:BB:CC:DD:EE:FF")
            .name("Kitchen Sensor")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_create_and_retrieve_device_when_valid() {
        let repo = setup().await;
        let device = test_device();
        let id = device.id;

        repo.create(device).await.unwrap();

        let fetched = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.protocol, Protocol::Esphome);
        assert_eq!(fetched.fingerprint, "AA:BB:CC:DD:EE:FF");
    }

    #[tokio::test]
    async fn should_return_none_when_device_not_found() {
        let repo = setup().await;
        let result = repo.get_by_id(DeviceId::new()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn should_find_device_by_protocol_and_fingerprint() {
        let repo = setup().await;
        let device = test_device();
        let id = device.id;
        repo.create(device).await.unwrap();

        let found = repo
            .find_by_protocol_fingerprint(Protocol::Esphome, "AA:BB:CC:DD:EE:FF")
            .await
            .unwrap();
        assert_eq!(found.unwrap().id, id);

        let missing = repo
            .find_by_protocol_fingerprint(Protocol::Hue, "AA:BB:CC:DD:EE:FF")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn should_list_all_devices() {
        let repo = setup().await;
        repo.create(test_device()).await.unwrap();
        repo.create(
            Device::builder()
                .protocol(Protocol::Hue)
                .fingerprint("bridge-1")
                .name("Hue Bridge")
                .build()
                .unwrap(),
        )
        .await
        .unwrap();

        let all = repo.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn should_update_device_when_exists() {
        let repo = setup().await;
        let mut device = test_device();
        let id = device.id;
        repo.create(device.clone()).await.unwrap();

        device.name = "Renamed Sensor".to_string();
        repo.update(device).await.unwrap();

        let fetched = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Renamed Sensor");
    }

    #[tokio::test]
    async fn should_delete_device_when_exists() {
        let repo = setup().await;
        let device = test_device();
        let id = device.id;
        repo.create(device).await.unwrap();

        repo.delete(id).await.unwrap();

        let result = repo.get_by_id(id).await.unwrap();
        assert!(result.is_none());
    }
}
