//! Storage ports — repository traits for persistence.
//!
//! Split along the specification's two-sink design for entity values: a
//! single latest-state row per entity (`LatestStateSink`) and an
//! append-only history stream (`HistorySink`), backed by different
//! durability guarantees in the concrete adapter.

use std::future::Future;

use minihub_domain::area::Area;
use minihub_domain::command::Command;
use minihub_domain::credential::Credential;
use minihub_domain::device::{Device, Protocol};
use minihub_domain::entity::{Entity, EntityState};
use minihub_domain::entity_state_history::EntityStateHistory;
use minihub_domain::error::MiniHubError;
use minihub_domain::hub::Hub;
use minihub_domain::id::{AreaId, CommandId, DeviceId, EntityId};

/// CRUD for [`Area`] records.
pub trait AreaRepository {
    fn create(&self, area: Area) -> impl Future<Output = Result<Area, MiniHubError>> + Send;

    fn get_by_id(
        &self,
        id: AreaId,
    ) -> impl Future<Output = Result<Option<Area>, MiniHubError>> + Send;

    fn get_all(&self) -> impl Future<Output = Result<Vec<Area>, MiniHubError>> + Send;

    fn update(&self, area: Area) -> impl Future<Output = Result<Area, MiniHubError>> + Send;

    fn delete(&self, id: AreaId) -> impl Future<Output = Result<(), MiniHubError>> + Send;
}

/// CRUD for [`Device`] records, keyed by identity and by the
/// `(protocol, fingerprint)` natural key used for upsert-on-rediscovery.
pub trait DeviceRepository {
    fn create(&self, device: Device) -> impl Future<Output = Result<Device, MiniHubError>> + Send;

    fn get_by_id(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, MiniHubError>> + Send;

    fn get_all(&self) -> impl Future<Output = Result<Vec<Device>, MiniHubError>> + Send;

    fn find_by_protocol_fingerprint(
        &self,
        protocol: Protocol,
        fingerprint: &str,
    ) -> impl Future<Output = Result<Option<Device>, MiniHubError>> + Send;

    fn update(&self, device: Device) -> impl Future<Output = Result<Device, MiniHubError>> + Send;

    fn delete(&self, id: DeviceId) -> impl Future<Output = Result<(), MiniHubError>> + Send;
}

/// CRUD for [`Entity`] records.
pub trait EntityRepository {
    fn create(&self, entity: Entity) -> impl Future<Output = Result<Entity, MiniHubError>> + Send;

    fn get_by_id(
        &self,
        id: EntityId,
    ) -> impl Future<Output = Result<Option<Entity>, MiniHubError>> + Send;

    fn get_all(&self) -> impl Future<Output = Result<Vec<Entity>, MiniHubError>> + Send;

    fn find_by_device_id(
        &self,
        device_id: DeviceId,
    ) -> impl Future<Output = Result<Vec<Entity>, MiniHubError>> + Send;

    fn update(&self, entity: Entity) -> impl Future<Output = Result<Entity, MiniHubError>> + Send;

    fn delete(&self, id: EntityId) -> impl Future<Output = Result<(), MiniHubError>> + Send;
}

/// Single-row-per-entity latest state, overwritten on every update.
///
/// Never drops a write under backpressure; the bounded buffer and
/// drop-oldest policy apply only to [`HistorySink`].
pub trait LatestStateSink {
    fn upsert(
        &self,
        state: EntityState,
    ) -> impl Future<Output = Result<(), MiniHubError>> + Send;

    fn get(
        &self,
        entity_id: EntityId,
    ) -> impl Future<Output = Result<Option<EntityState>, MiniHubError>> + Send;

    fn get_all(&self) -> impl Future<Output = Result<Vec<EntityState>, MiniHubError>> + Send;
}

/// Append-only time-series of observed entity values.
pub trait HistorySink {
    fn append(
        &self,
        record: EntityStateHistory,
    ) -> impl Future<Output = Result<(), MiniHubError>> + Send;

    fn find_by_entity(
        &self,
        entity_id: EntityId,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<EntityStateHistory>, MiniHubError>> + Send;
}

/// Queue and CAS-update access to [`Command`] records.
pub trait CommandRepository {
    fn enqueue(
        &self,
        command: Command,
    ) -> impl Future<Output = Result<Command, MiniHubError>> + Send;

    fn get_by_id(
        &self,
        id: CommandId,
    ) -> impl Future<Output = Result<Option<Command>, MiniHubError>> + Send;

    /// Pending commands for a device, oldest first.
    fn find_pending_for_device(
        &self,
        device_id: DeviceId,
    ) -> impl Future<Output = Result<Vec<Command>, MiniHubError>> + Send;

    /// Atomically replace `expected` with `command` only if the stored
    /// status still matches `expected`'s status. Returns `false` when
    /// another writer already advanced the record (lost the race).
    fn compare_and_swap(
        &self,
        expected: &Command,
        command: Command,
    ) -> impl Future<Output = Result<bool, MiniHubError>> + Send;
}

/// CRUD over the single credential a device may hold.
pub trait CredentialRepository {
    fn upsert(
        &self,
        credential: Credential,
    ) -> impl Future<Output = Result<(), MiniHubError>> + Send;

    fn get_by_device_id(
        &self,
        device_id: DeviceId,
    ) -> impl Future<Output = Result<Option<Credential>, MiniHubError>> + Send;

    fn delete(&self, device_id: DeviceId) -> impl Future<Output = Result<(), MiniHubError>> + Send;
}

/// Registration and heartbeat persistence for this daemon's own hub identity.
pub trait HubRepository {
    /// Fetch this daemon's hub record, if one has ever been registered.
    fn get(&self, id: &str) -> impl Future<Output = Result<Option<Hub>, MiniHubError>> + Send;

    /// Insert or update the hub record (registration and every heartbeat
    /// both go through this single upsert).
    fn upsert(&self, hub: Hub) -> impl Future<Output = Result<Hub, MiniHubError>> + Send;
}
