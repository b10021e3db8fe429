//! # minihub-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the repository port traits defined in `minihub-app::ports::storage`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `minihub-app` (for port traits) and `minihub-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod area_repo;
mod command_repo;
mod credential_repo;
mod device_repo;
mod entity_history_repo;
mod entity_repo;
mod entity_state_repo;
mod error;
mod event_store;
mod hub_repo;
mod pool;

pub use area_repo::SqliteAreaRepository;
pub use command_repo::SqliteCommandRepository;
pub use credential_repo::SqliteCredentialRepository;
pub use device_repo::SqliteDeviceRepository;
pub use entity_history_repo::SqliteEntityHistoryRepository;
pub use entity_repo::SqliteEntityRepository;
pub use entity_state_repo::SqliteEntityStateRepository;
pub use error::StorageError;
pub use event_store::SqliteEventStore;
pub use hub_repo::SqliteHubRepository;
pub use pool::{Config, Database};
