//! `SQLite` implementation of [`CommandRepository`].

use std::future::Future;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use minihub_app::ports::command_queue::RemoteCommandQueue;
use minihub_app::ports::CommandRepository;
use minihub_domain::command::{CapabilityTag, Command, CommandStatus};
use minihub_domain::error::MiniHubError;
use minihub_domain::id::{CommandId, DeviceId, EntityId};

use crate::error::StorageError;

struct Wrapper(Command);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let device_id: String = row.try_get("device_id")?;
        let entity_id: Option<String> = row.try_get("entity_id")?;
        let capability: String = row.try_get("capability")?;
        let value_json: String = row.try_get("value")?;
        let status: String = row.try_get("status")?;
        let error: Option<String> = row.try_get("error")?;
        let coalesced: Option<i64> = row.try_get("coalesced")?;
        let created_at: String = row.try_get("created_at")?;
        let processed_at: Option<String> = row.try_get("processed_at")?;

        let id = CommandId::from_str(&id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let device_id =
            DeviceId::from_str(&device_id).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let entity_id = entity_id
            .map(|s| EntityId::from_str(&s))
            .transpose()
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let capability: CapabilityTag = serde_json::from_str(&format!("\"{capability}\""))
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let value: serde_json::Value =
            serde_json::from_str(&value_json).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?
            .to_utc();
        let processed_at = processed_at
            .map(|s| chrono::DateTime::parse_from_rfc3339(&s).map(|dt| dt.to_utc()))
            .transpose()
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

        let status = match status.as_str() {
            "pending" => CommandStatus::Pending,
            "processing" => CommandStatus::Processing,
            "completed" => CommandStatus::Completed {
                coalesced: coalesced.unwrap_or(0) != 0,
            },
            "failed" => CommandStatus::Failed {
                error: error.unwrap_or_default(),
            },
            other => {
                return Err(sqlx::Error::Decode(
                    format!("unknown command status: {other}").into(),
                ));
            }
        };

        Ok(Self(Command {
            id,
            device_id,
            entity_id,
            capability,
            value,
            status,
            created_at,
            processed_at,
        }))
    }
}

fn status_label(status: &CommandStatus) -> &'static str {
    match status {
        CommandStatus::Pending => "pending",
        CommandStatus::Processing => "processing",
        CommandStatus::Completed { .. } => "completed",
        CommandStatus::Failed { .. } => "failed",
    }
}

fn status_columns(status: &CommandStatus) -> (Option<String>, Option<i64>) {
    match status {
        CommandStatus::Completed { coalesced } => (None, Some(i64::from(*coalesced))),
        CommandStatus::Failed { error } => (Some(error.clone()), None),
        CommandStatus::Pending | CommandStatus::Processing => (None, None),
    }
}

const INSERT: &str = r"
    INSERT INTO commands
        (id, device_id, entity_id, capability, value, status, error, coalesced, created_at, processed_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
";

const SELECT_BY_ID: &str = "SELECT * FROM commands WHERE id = ?";
const SELECT_PENDING_FOR_DEVICE: &str =
    "SELECT * FROM commands WHERE device_id = ? AND status = 'pending' ORDER BY created_at ASC";
const SELECT_PENDING_ALL: &str =
    "SELECT * FROM commands WHERE status = 'pending' ORDER BY created_at ASC LIMIT ?";
const CAS_UPDATE: &str = r"
    UPDATE commands
    SET status = ?, error = ?, coalesced = ?, processed_at = ?
    WHERE id = ? AND status = ?
";

/// `SQLite`-backed command queue with CAS-based status transitions.
#[derive(Clone)]
pub struct SqliteCommandRepository {
    pool: SqlitePool,
}

impl SqliteCommandRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl CommandRepository for SqliteCommandRepository {
    fn enqueue(
        &self,
        command: Command,
    ) -> impl Future<Output = Result<Command, MiniHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let value_json = serde_json::to_string(&command.value).map_err(StorageError::from)?;
            let (error, coalesced) = status_columns(&command.status);

            sqlx::query(INSERT)
                .bind(command.id.to_string())
                .bind(command.device_id.to_string())
                .bind(command.entity_id.map(|id| id.to_string()))
                .bind(command.capability.as_str())
                .bind(&value_json)
                .bind(status_label(&command.status))
                .bind(error)
                .bind(coalesced)
                .bind(command.created_at.to_rfc3339())
                .bind(command.processed_at.map(|ts| ts.to_rfc3339()))
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(command)
        }
    }

    fn get_by_id(
        &self,
        id: CommandId,
    ) -> impl Future<Output = Result<Option<Command>, MiniHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|w| w.0))
        }
    }

    fn find_pending_for_device(
        &self,
        device_id: DeviceId,
    ) -> impl Future<Output = Result<Vec<Command>, MiniHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_PENDING_FOR_DEVICE)
                .bind(device_id.to_string())
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    fn compare_and_swap(
        &self,
        expected: &Command,
        command: Command,
    ) -> impl Future<Output = Result<bool, MiniHubError>> + Send {
        let pool = self.pool.clone();
        let expected_label = status_label(&expected.status);
        async move {
            let (error, coalesced) = status_columns(&command.status);

            let result = sqlx::query(CAS_UPDATE)
                .bind(status_label(&command.status))
                .bind(error)
                .bind(coalesced)
                .bind(command.processed_at.map(|ts| ts.to_rfc3339()))
                .bind(command.id.to_string())
                .bind(expected_label)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(result.rows_affected() == 1)
        }
    }
}

/// Lets [`SqliteCommandRepository`] double as the command consumer's
/// [`RemoteCommandQueue`] in local-only mode (no remote store configured):
/// commands submitted through the HTTP API land straight in this table, so
/// the consumer can source them from here instead of a remote queue service.
///
/// `acknowledge` is a no-op — the consumer already persists the terminal
/// status via `compare_and_swap` before calling it — and `subscribe` keeps
/// the default "unsupported" behavior, so local-only mode always runs in
/// poll mode.
impl RemoteCommandQueue for SqliteCommandRepository {
    fn poll(
        &self,
        max: usize,
    ) -> impl Future<Output = Result<Vec<Command>, MiniHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_PENDING_ALL)
                .bind(i64::try_from(max).unwrap_or(i64::MAX))
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(rows.into_iter().map(|w| w.0).collect())
        }
    }

    async fn acknowledge(&self, _command: &Command) -> Result<(), MiniHubError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use minihub_domain::device::{Device, Protocol};

    async fn setup() -> (SqliteCommandRepository, DeviceId) {
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

        (SqliteCommandRepository::new(pool), device.id)
    }

    fn test_command(device_id: DeviceId) -> Command {
        Command::builder()
            .device_id(device_id)
            .capability(CapabilityTag::OnOff)
            .value(serde_json::json!({"on": true}))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_enqueue_and_retrieve_command() {
        let (repo, device_id) = setup().await;
        let command = test_command(device_id);
        let id = command.id;

        repo.enqueue(command).await.unwrap();

        let fetched = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.id, id);
        assert_eq!(fetched.status, CommandStatus::Pending);
    }

    #[tokio::test]
    async fn should_find_pending_commands_for_device_oldest_first() {
        let (repo, device_id) = setup().await;
        let c1 = test_command(device_id);
        let c1_id = c1.id;
        repo.enqueue(c1).await.unwrap();
        let c2 = test_command(device_id);
        repo.enqueue(c2).await.unwrap();

        let pending = repo.find_pending_for_device(device_id).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, c1_id);
    }

    #[tokio::test]
    async fn should_succeed_cas_when_status_matches_expected() {
        let (repo, device_id) = setup().await;
        let command = test_command(device_id);
        let id = command.id;
        repo.enqueue(command.clone()).await.unwrap();

        let mut processing = command.clone();
        processing.mark_processing().unwrap();

        let applied = repo
            .compare_and_swap(&command, processing)
            .await
            .unwrap();
        assert!(applied);

        let fetched = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(fetched.status, CommandStatus::Processing);
    }

    #[tokio::test]
    async fn should_fail_cas_when_status_does_not_match_expected() {
        let (repo, device_id) = setup().await;
        let command = test_command(device_id);
        repo.enqueue(command.clone()).await.unwrap();

        let mut already_processing = command.clone();
        already_processing.mark_processing().unwrap();
        repo.compare_and_swap(&command, already_processing.clone())
            .await
            .unwrap();

        // Second claim attempt still expects `pending`; it should lose the race.
        let mut retry = command.clone();
        retry.mark_processing().unwrap();
        let applied = repo.compare_and_swap(&command, retry).await.unwrap();
        assert!(!applied);
    }

    #[tokio::test]
    async fn should_transition_to_completed_with_coalesced_flag() {
        let (repo, device_id) = setup().await;
        let command = test_command(device_id);
        let id = command.id;
        repo.enqueue(command.clone()).await.unwrap();

        let mut processing = command.clone();
        processing.mark_processing().unwrap();
        repo.compare_and_swap(&command, processing.clone())
            .await
            .unwrap();

        let mut completed = processing.clone();
        completed
            .mark_completed(true, minihub_domain::time::now())
            .unwrap();
        repo.compare_and_swap(&processing, completed)
            .await
            .unwrap();

        let fetched = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(
            fetched.status,
            CommandStatus::Completed { coalesced: true }
        );
    }

    #[tokio::test]
    async fn should_poll_pending_commands_across_all_devices_oldest_first() {
        let (repo, device_id) = setup().await;
        let c1 = test_command(device_id);
        let c1_id = c1.id;
        repo.enqueue(c1).await.unwrap();
        let mut c2 = test_command(device_id);
        c2.mark_processing().unwrap();
        repo.enqueue(c2).await.unwrap();
        let c3 = test_command(device_id);
        let c3_id = c3.id;
        repo.enqueue(c3).await.unwrap();

        let pending = RemoteCommandQueue::poll(&repo, 10).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, c1_id);
        assert_eq!(pending[1].id, c3_id);
    }

    #[tokio::test]
    async fn should_respect_poll_limit() {
        let (repo, device_id) = setup().await;
        repo.enqueue(test_command(device_id)).await.unwrap();
        repo.enqueue(test_command(device_id)).await.unwrap();

        let pending = RemoteCommandQueue::poll(&repo, 1).await.unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn should_treat_acknowledge_as_a_no_op() {
        let (repo, device_id) = setup().await;
        let command = test_command(device_id);
        repo.enqueue(command.clone()).await.unwrap();

        RemoteCommandQueue::acknowledge(&repo, &command).await.unwrap();

        let fetched = repo.get_by_id(command.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, CommandStatus::Pending);
    }
}
