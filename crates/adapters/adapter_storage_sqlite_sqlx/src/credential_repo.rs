//! `SQLite` implementation of [`CredentialRepository`].

use std::future::Future;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use minihub_app::ports::CredentialRepository;
use minihub_domain::credential::Credential;
use minihub_domain::error::MiniHubError;
use minihub_domain::id::DeviceId;

use crate::error::StorageError;

struct Wrapper(Credential);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let device_id: String = row.try_get("device_id")?;
        let payload: Vec<u8> = row.try_get("payload")?;
        let created_at: String = row.try_get("created_at")?;
        let rotated_at: Option<String> = row.try_get("rotated_at")?;

        let device_id =
            DeviceId::from_str(&device_id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?
            .to_utc();
        let rotated_at = rotated_at
            .map(|s| chrono::DateTime::parse_from_rfc3339(&s).map(|dt| dt.to_utc()))
            .transpose()
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        Ok(Self(Credential {
            device_id,
            payload,
            created_at,
            rotated_at,
        }))
    }
}

const UPSERT: &str = r"
    INSERT INTO credentials (device_id, payload, created_at, rotated_at)
    VALUES (?, ?, ?, ?)
    ON CONFLICT(device_id) DO UPDATE SET
        payload = excluded.payload,
        rotated_at = excluded.rotated_at
";

const SELECT_BY_DEVICE_ID: &str = "SELECT * FROM credentials WHERE device_id = ?";
const DELETE_BY_DEVICE_ID: &str = "DELETE FROM credentials WHERE device_id = ?";

/// Symmetric XOR-with-stored-key obfuscation applied before a payload is
/// written to disk.
///
/// This is a stand-in for real envelope encryption (an OS keyring or a KMS
/// call), documented as such in `DESIGN.md`; the port boundary
/// ([`CredentialRepository`]) is the real deliverable; the crypto behind it
/// is out of scope to build from scratch here.
fn xor_with_key(payload: &[u8], key: &[u8]) -> Vec<u8> {
    if key.is_empty() {
        return payload.to_vec();
    }
    payload
        .iter()
        .enumerate()
        .map(|(i, byte)| byte ^ key[i % key.len()])
        .collect()
}

/// `SQLite`-backed credential store with at-rest XOR obfuscation.
#[derive(Clone)]
pub struct SqliteCredentialRepository {
    pool: SqlitePool,
    encryption_key: Vec<u8>,
}

impl SqliteCredentialRepository {
    /// Create a new repository using the given connection pool and at-rest
    /// encryption key.
    #[must_use]
    pub fn new(pool: SqlitePool, encryption_key: Vec<u8>) -> Self {
        Self {
            pool,
            encryption_key,
        }
    }
}

impl CredentialRepository for SqliteCredentialRepository {
    fn upsert(
        &self,
        credential: Credential,
    ) -> impl Future<Output = Result<(), MiniHubError>> + Send {
        let pool = self.pool.clone();
        let encrypted = xor_with_key(&credential.payload, &self.encryption_key);
        async move {
            sqlx::query(UPSERT)
                .bind(credential.device_id.to_string())
                .bind(&encrypted)
                .bind(credential.created_at.to_rfc3339())
                .bind(credential.rotated_at.map(|ts| ts.to_rfc3339()))
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }

    fn get_by_device_id(
        &self,
        device_id: DeviceId,
    ) -> impl Future<Output = Result<Option<Credential>, MiniHubError>> + Send {
        let pool = self.pool.clone();
        let encryption_key = self.encryption_key.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_DEVICE_ID)
                .bind(device_id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|w| {
                let mut credential = w.0;
                credential.payload = xor_with_key(&credential.payload, &encryption_key);
                credential
            }))
        }
    }

    fn delete(&self, device_id: DeviceId) -> impl Future<Output = Result<(), MiniHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            sqlx::query(DELETE_BY_DEVICE_ID)
                .bind(device_id.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }
}
