//! Registry service — device/entity upsert and state application.
//!
//! Supersedes the separate `DeviceService`/`EntityService` use-cases with a
//! single service that owns the specification's registry invariants:
//! upsert-by-natural-key for devices, re-enumeration-deactivates-the-old-
//! entity for entities, and per-entity serialized, timestamp-monotonic
//! state application.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;

use minihub_domain::device::Device;
use minihub_domain::entity::{Entity, EntityKind, EntityState};
use minihub_domain::error::{MiniHubError, NotFoundError};
use minihub_domain::event::Event;
use minihub_domain::id::{AreaId, DeviceId, EntityId};

use crate::ports::{DeviceRepository, EntityRepository, EventPublisher, HistorySink, LatestStateSink};

/// Application service owning device/entity registration and state.
pub struct RegistryService<DR, ER, LS, HS, EP> {
    device_repo: DR,
    entity_repo: ER,
    latest_state: LS,
    history: HS,
    publisher: EP,
    /// One lock per entity so concurrent state applications for the same
    /// entity serialize, while different entities proceed in parallel.
    entity_locks: AsyncMutex<HashMap<EntityId, Arc<AsyncMutex<()>>>>,
    /// Count of snapshots discarded by [`Self::apply_state`] as stale.
    discarded_late: AtomicU64,
}

impl<DR, ER, LS, HS, EP> RegistryService<DR, ER, LS, HS, EP>
where
    DR: DeviceRepository,
    ER: EntityRepository,
    LS: LatestStateSink,
    HS: HistorySink,
    EP: EventPublisher,
{
    /// Create a new service backed by the given repositories, sinks, and publisher.
    pub fn new(device_repo: DR, entity_repo: ER, latest_state: LS, history: HS, publisher: EP) -> Self {
        Self {
            device_repo,
            entity_repo,
            latest_state,
            history,
            publisher,
            entity_locks: AsyncMutex::new(HashMap::new()),
            discarded_late: AtomicU64::new(0),
        }
    }

    /// Number of state snapshots discarded so far as stale (observed at or
    /// before the `updated_at` already stored for their entity).
    pub fn discarded_late_count(&self) -> u64 {
        self.discarded_late.load(Ordering::Relaxed)
    }

    /// Create or refresh a device by its `(protocol, fingerprint)` natural key.
    ///
    /// # Errors
    ///
    /// Returns [`MiniHubError::Validation`] if invariants fail, or a
    /// storage error propagated from the repository.
    #[tracing::instrument(skip(self, device), fields(device_name = %device.name))]
    pub async fn upsert_device(&self, device: Device) -> Result<Device, MiniHubError> {
        device.validate()?;
        if let Some(mut existing) = self
            .device_repo
            .find_by_protocol_fingerprint(device.protocol, &device.fingerprint)
            .await?
        {
            existing.refresh(device.name, device.address, device.port, device.last_seen);
            let updated = self.device_repo.update(existing).await?;
            let _ = self
                .publisher
                .publish(Event::device_lifecycle(
                    updated.id,
                    serde_json::json!({"event": "refreshed"}),
                ))
                .await;
            return Ok(updated);
        }
        let created = self.device_repo.create(device).await?;
        let _ = self
            .publisher
            .publish(Event::device_lifecycle(
                created.id,
                serde_json::json!({"event": "discovered"}),
            ))
            .await;
        Ok(created)
    }

    /// Look up a device by id.
    ///
    /// # Errors
    ///
    /// Returns [`MiniHubError::NotFound`] when no device with `id` exists.
    pub async fn get_device(&self, id: DeviceId) -> Result<Device, MiniHubError> {
        self.device_repo.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Device",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// List all devices.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_devices(&self) -> Result<Vec<Device>, MiniHubError> {
        self.device_repo.get_all().await
    }

    /// Devices assigned to the given room (area).
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn query_devices_by_room(&self, area_id: AreaId) -> Result<Vec<Device>, MiniHubError> {
        Ok(self
            .device_repo
            .get_all()
            .await?
            .into_iter()
            .filter(|device| device.area_id == Some(area_id))
            .collect())
    }

    /// Reconcile a fresh enumeration of a device's entities against what's
    /// stored: entities no longer reported are deactivated, new ones are
    /// created, unchanged ones are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`MiniHubError::Validation`] if invariants fail, or a
    /// storage error propagated from the repository.
    #[tracing::instrument(skip(self, enumerated), fields(device_id = %device_id, count = enumerated.len()))]
    pub async fn enumerate_entities(
        &self,
        device_id: DeviceId,
        enumerated: Vec<Entity>,
    ) -> Result<Vec<Entity>, MiniHubError> {
        let existing = self.entity_repo.find_by_device_id(device_id).await?;
        let now = minihub_domain::time::now();

        let mut seen_keys = std::collections::HashSet::new();
        let mut result = Vec::with_capacity(enumerated.len());
        for mut entity in enumerated {
            entity.validate()?;
            entity.device_id = device_id;
            seen_keys.insert(entity.driver_key.clone());
            if let Some(current) = existing
                .iter()
                .find(|e| e.is_active() && e.driver_key == entity.driver_key)
            {
                result.push(current.clone());
                continue;
            }
            let created = self.entity_repo.create(entity).await?;
            let _ = self
                .publisher
                .publish(Event::device_lifecycle(
                    device_id,
                    serde_json::json!({"event": "entity_created", "entity_id": created.id}),
                ))
                .await;
            result.push(created);
        }

        for stale in existing
            .into_iter()
            .filter(|e| e.is_active() && !seen_keys.contains(&e.driver_key))
        {
            let mut stale = stale;
            stale.deactivate(now);
            self.entity_repo.update(stale).await?;
        }

        Ok(result)
    }

    /// Create or refresh a single entity discovered outside a full
    /// re-enumeration pass (e.g. an adapter noticing a new resource between
    /// enumerations). Matched against the existing active entity for the
    /// same `(device_id, driver_key)`; a match returns it unchanged (kind
    /// and capability are fixed at construction, see [`Entity`]), otherwise
    /// a new entity is created.
    ///
    /// # Errors
    ///
    /// Returns [`MiniHubError::Validation`] if invariants fail, or a
    /// storage error propagated from the repository.
    #[tracing::instrument(skip(self, entity), fields(device_id = %entity.device_id))]
    pub async fn upsert_entity(&self, entity: Entity) -> Result<Entity, MiniHubError> {
        entity.validate()?;
        let existing = self.entity_repo.find_by_device_id(entity.device_id).await?;
        if let Some(current) = existing
            .iter()
            .find(|e| e.is_active() && e.driver_key == entity.driver_key)
        {
            return Ok(current.clone());
        }
        let created = self.entity_repo.create(entity).await?;
        let _ = self
            .publisher
            .publish(Event::device_lifecycle(
                created.device_id,
                serde_json::json!({"event": "entity_created", "entity_id": created.id}),
            ))
            .await;
        Ok(created)
    }

    /// Look up an entity by id.
    ///
    /// # Errors
    ///
    /// Returns [`MiniHubError::NotFound`] when no entity with `id` exists.
    pub async fn get_entity(&self, id: EntityId) -> Result<Entity, MiniHubError> {
        self.entity_repo.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Entity",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// List all entities.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_entities(&self) -> Result<Vec<Entity>, MiniHubError> {
        self.entity_repo.get_all().await
    }

    /// Every entity belonging to this hub's home.
    ///
    /// This daemon manages exactly one home (no multi-home partitioning is
    /// modeled), so this is the full registry view; kept as its own named
    /// read path rather than folded into [`Self::list_entities`] so callers
    /// spell out which of the three specified query shapes they mean.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn query_by_home(&self) -> Result<Vec<Entity>, MiniHubError> {
        self.list_entities().await
    }

    /// Entities of the given kind.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn query_by_kind(&self, kind: EntityKind) -> Result<Vec<Entity>, MiniHubError> {
        Ok(self
            .entity_repo
            .get_all()
            .await?
            .into_iter()
            .filter(|entity| entity.kind == kind)
            .collect())
    }

    /// Entities whose owning device is assigned to the given room (area).
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from either repository.
    pub async fn query_by_room(&self, area_id: AreaId) -> Result<Vec<Entity>, MiniHubError> {
        let device_ids: std::collections::HashSet<DeviceId> = self
            .device_repo
            .get_all()
            .await?
            .into_iter()
            .filter(|device| device.area_id == Some(area_id))
            .map(|device| device.id)
            .collect();
        Ok(self
            .entity_repo
            .get_all()
            .await?
            .into_iter()
            .filter(|entity| device_ids.contains(&entity.device_id))
            .collect())
    }

    async fn lock_for(&self, entity_id: EntityId) -> Arc<AsyncMutex<()>> {
        let mut locks = self.entity_locks.lock().await;
        Arc::clone(
            locks
                .entry(entity_id)
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    /// Apply an observed state snapshot.
    ///
    /// Serialized per entity so concurrent pushes/polls for the same
    /// entity can't interleave; a snapshot observed strictly before what's
    /// already stored is discarded as stale, counted, and published on
    /// `state/discarded_late`. On accept, appends to history (subject to
    /// the history sink's own overflow policy), upserts the latest-state
    /// sink, and unconditionally publishes `entity/<id>/state` — the
    /// specification's publish-on-accept rule carries no value-changed
    /// qualifier, and gating it on `.value` alone would silently swallow
    /// attribute-only updates (e.g. a brightness or color-temperature change
    /// that adapters route entirely through `.attributes`).
    ///
    /// Returns whether the update was applied (`false` for a discarded
    /// stale snapshot).
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from either sink.
    #[tracing::instrument(skip(self, state), fields(entity_id = %state.entity_id))]
    pub async fn apply_state(&self, state: EntityState) -> Result<bool, MiniHubError> {
        let lock = self.lock_for(state.entity_id).await;
        let _guard = lock.lock().await;

        let previous = self.latest_state.get(state.entity_id).await?;
        let should_apply = previous
            .as_ref()
            .is_none_or(|p| p.should_replace_with(state.updated_at));
        if !should_apply {
            self.discarded_late.fetch_add(1, Ordering::Relaxed);
            let _ = self
                .publisher
                .publish(Event::state_discarded_late(state.entity_id))
                .await;
            return Ok(false);
        }

        self.history
            .append(
                minihub_domain::entity_state_history::EntityStateHistory::builder()
                    .entity_id(state.entity_id)
                    .value(state.value.clone())
                    .attributes(state.attributes.clone())
                    .recorded_at(state.updated_at)
                    .build(),
            )
            .await?;

        self.latest_state.upsert(state.clone()).await?;

        let _ = self
            .publisher
            .publish(Event::entity_state(
                state.entity_id,
                serde_json::json!({"value": state.value, "attributes": state.attributes}),
            ))
            .await;

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minihub_domain::device::Protocol;
    use minihub_domain::entity::{CapabilityDescriptor, DriverKey, EntityKind};
    use std::sync::Mutex;

    #[derive(Default)]
    struct InMemoryDeviceRepo {
        store: Mutex<HashMap<DeviceId, Device>>,
    }

    impl DeviceRepository for InMemoryDeviceRepo {
        async fn create(&self, device: Device) -> Result<Device, MiniHubError> {
            self.store.lock().unwrap().insert(device.id, device.clone());
            Ok(device)
        }

        async fn get_by_id(&self, id: DeviceId) -> Result<Option<Device>, MiniHubError> {
            Ok(self.store.lock().unwrap().get(&id).cloned())
        }

        async fn get_all(&self) -> Result<Vec<Device>, MiniHubError> {
            Ok(self.store.lock().unwrap().values().cloned().collect())
        }

        async fn find_by_protocol_fingerprint(
            &self,
            protocol: Protocol,
            fingerprint: &str,
        ) -> Result<Option<Device>, MiniHubError> {
            Ok(self
                .store
                .lock()
                .unwrap()
                .values()
                .find(|d| d.protocol == protocol && d.fingerprint == fingerprint)
                .cloned())
        }

        async fn update(&self, device: Device) -> Result<Device, MiniHubError> {
            self.store.lock().unwrap().insert(device.id, device.clone());
            Ok(device)
        }

        async fn delete(&self, id: DeviceId) -> Result<(), MiniHubError> {
            self.store.lock().unwrap().remove(&id);
            Ok(())
        }
    }

    #[derive(Default)]
    struct InMemoryEntityRepo {
        store: Mutex<HashMap<EntityId, Entity>>,
    }

    impl EntityRepository for InMemoryEntityRepo {
        async fn create(&self, entity: Entity) -> Result<Entity, MiniHubError> {
            self.store.lock().unwrap().insert(entity.id, entity.clone());
            Ok(entity)
        }

        async fn get_by_id(&self, id: EntityId) -> Result<Option<Entity>, MiniHubError> {
            Ok(self.store.lock().unwrap().get(&id).cloned())
        }

        async fn get_all(&self) -> Result<Vec<Entity>, MiniHubError> {
            Ok(self.store.lock().unwrap().values().cloned().collect())
        }

        async fn find_by_device_id(&self, device_id: DeviceId) -> Result<Vec<Entity>, MiniHubError> {
            Ok(self
                .store
                .lock()
                .unwrap()
                .values()
                .filter(|e| e.device_id == device_id)
                .cloned()
                .collect())
        }

        async fn update(&self, entity: Entity) -> Result<Entity, MiniHubError> {
            self.store.lock().unwrap().insert(entity.id, entity.clone());
            Ok(entity)
        }

        async fn delete(&self, id: EntityId) -> Result<(), MiniHubError> {
            self.store.lock().unwrap().remove(&id);
            Ok(())
        }
    }

    #[derive(Default)]
    struct InMemoryLatestState {
        store: Mutex<HashMap<EntityId, EntityState>>,
    }

    impl LatestStateSink for InMemoryLatestState {
        async fn upsert(&self, state: EntityState) -> Result<(), MiniHubError> {
            self.store.lock().unwrap().insert(state.entity_id, state);
            Ok(())
        }

        async fn get(&self, entity_id: EntityId) -> Result<Option<EntityState>, MiniHubError> {
            Ok(self.store.lock().unwrap().get(&entity_id).cloned())
        }

        async fn get_all(&self) -> Result<Vec<EntityState>, MiniHubError> {
            Ok(self.store.lock().unwrap().values().cloned().collect())
        }
    }

    #[derive(Default)]
    struct InMemoryHistory {
        records: Mutex<Vec<minihub_domain::entity_state_history::EntityStateHistory>>,
    }

    impl HistorySink for InMemoryHistory {
        async fn append(
            &self,
            record: minihub_domain::entity_state_history::EntityStateHistory,
        ) -> Result<(), MiniHubError> {
            self.records.lock().unwrap().push(record);
            Ok(())
        }

        async fn find_by_entity(
            &self,
            entity_id: EntityId,
            limit: usize,
        ) -> Result<Vec<minihub_domain::entity_state_history::EntityStateHistory>, MiniHubError> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.entity_id == entity_id)
                .take(limit)
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct SpyPublisher {
        events: Mutex<Vec<Event>>,
    }

    impl EventPublisher for SpyPublisher {
        async fn publish(&self, event: Event) -> Result<(), MiniHubError> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    fn make_service() -> RegistryService<
        InMemoryDeviceRepo,
        InMemoryEntityRepo,
        InMemoryLatestState,
        InMemoryHistory,
        SpyPublisher,
    > {
        RegistryService::new(
            InMemoryDeviceRepo::default(),
            InMemoryEntityRepo::default(),
            InMemoryLatestState::default(),
            InMemoryHistory::default(),
            SpyPublisher::default(),
        )
    }

    fn valid_device() -> Device {
        Device::builder()
            .name("Hue Bridge")
            .protocol(Protocol::Hue)
            .fingerprint("bridge-001")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_create_device_on_first_upsert() {
        let svc = make_service();
        let device = valid_device();
        let id = device.id;

        let created = svc.upsert_device(device).await.unwrap();
        assert_eq!(created.id, id);
    }

    #[tokio::test]
    async fn should_refresh_existing_device_on_rediscovery() {
        let svc = make_service();
        let device = valid_device();
        let created = svc.upsert_device(device).await.unwrap();
        let original_id = created.id;

        let rediscovered = Device::builder()
            .name("Hue Bridge v2")
            .protocol(Protocol::Hue)
            .fingerprint("bridge-001")
            .build()
            .unwrap();

        let result = svc.upsert_device(rediscovered).await.unwrap();
        assert_eq!(result.id, original_id);
        assert_eq!(result.name, "Hue Bridge v2");

        let all = svc.list_devices().await.unwrap();
        assert_eq!(all.len(), 1);
    }

    fn make_entity(driver_key: DriverKey) -> Entity {
        Entity::builder()
            .friendly_name("Light")
            .driver_key(driver_key)
            .kind(EntityKind::Light)
            .capability(CapabilityDescriptor::default())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_deactivate_entities_no_longer_reported_on_reenumeration() {
        let svc = make_service();
        let device = svc.upsert_device(valid_device()).await.unwrap();

        let first_pass = svc
            .enumerate_entities(device.id, vec![make_entity(DriverKey::Index(1))])
            .await
            .unwrap();
        assert_eq!(first_pass.len(), 1);

        let second_pass = svc
            .enumerate_entities(device.id, vec![make_entity(DriverKey::Index(2))])
            .await
            .unwrap();
        assert_eq!(second_pass.len(), 1);

        let all = svc.entity_repo.get_all().await.unwrap();
        assert_eq!(all.len(), 2);
        let old = all.iter().find(|e| e.driver_key == DriverKey::Index(1)).unwrap();
        assert!(!old.is_active());
    }

    #[tokio::test]
    async fn should_apply_newer_state_and_publish_change() {
        let svc = make_service();
        let entity_id = EntityId::new();
        let t0 = minihub_domain::time::now();

        let first = svc
            .apply_state(EntityState::new(entity_id, serde_json::json!({"on": false}), t0))
            .await
            .unwrap();
        assert!(first);

        let t1 = t0 + chrono::Duration::seconds(1);
        let second = svc
            .apply_state(EntityState::new(entity_id, serde_json::json!({"on": true}), t1))
            .await
            .unwrap();
        assert!(second);

        let latest = svc.latest_state.get(entity_id).await.unwrap().unwrap();
        assert_eq!(latest.value, serde_json::json!({"on": true}));

        let events = svc.publisher.events.lock().unwrap();
        assert_eq!(events.iter().filter(|e| e.topic.ends_with("/state")).count(), 2);
    }

    #[tokio::test]
    async fn should_discard_state_older_than_what_is_stored() {
        let svc = make_service();
        let entity_id = EntityId::new();
        let t0 = minihub_domain::time::now();

        svc.apply_state(EntityState::new(entity_id, serde_json::json!({"on": true}), t0))
            .await
            .unwrap();

        let earlier = t0 - chrono::Duration::seconds(5);
        let applied = svc
            .apply_state(EntityState::new(entity_id, serde_json::json!({"on": false}), earlier))
            .await
            .unwrap();
        assert!(!applied);

        let latest = svc.latest_state.get(entity_id).await.unwrap().unwrap();
        assert_eq!(latest.value, serde_json::json!({"on": true}));

        assert_eq!(svc.discarded_late_count(), 1);
        let events = svc.publisher.events.lock().unwrap();
        assert!(events.iter().any(|e| e.topic == "state/discarded_late"));
    }

    #[tokio::test]
    async fn should_publish_state_event_on_every_accepted_update_even_when_value_is_unchanged() {
        let svc = make_service();
        let entity_id = EntityId::new();
        let t0 = minihub_domain::time::now();
        svc.apply_state(EntityState::new(entity_id, serde_json::json!(1), t0))
            .await
            .unwrap();

        let t1 = t0 + chrono::Duration::seconds(1);
        svc.apply_state(EntityState::new(entity_id, serde_json::json!(1), t1))
            .await
            .unwrap();

        let events = svc.publisher.events.lock().unwrap();
        assert_eq!(events.iter().filter(|e| e.topic.ends_with("/state")).count(), 2);
    }

    #[tokio::test]
    async fn should_publish_state_event_for_an_attribute_only_change() {
        let svc = make_service();
        let entity_id = EntityId::new();
        let t0 = minihub_domain::time::now();
        svc.apply_state(EntityState::new(entity_id, serde_json::json!({"on": true}), t0))
            .await
            .unwrap();

        // Same `.value`, but a brightness-only update routed through
        // `.attributes` — this must still publish.
        let t1 = t0 + chrono::Duration::seconds(1);
        let mut next = EntityState::new(entity_id, serde_json::json!({"on": true}), t1);
        next.attributes
            .insert("brightness".to_string(), minihub_domain::entity::AttributeValue::Float(0.5));
        svc.apply_state(next).await.unwrap();

        let events = svc.publisher.events.lock().unwrap();
        assert_eq!(events.iter().filter(|e| e.topic.ends_with("/state")).count(), 2);
    }

    #[tokio::test]
    async fn should_filter_entities_by_kind() {
        let svc = make_service();
        let device = svc.upsert_device(valid_device()).await.unwrap();
        svc.enumerate_entities(
            device.id,
            vec![
                make_entity(DriverKey::Index(1)),
                Entity::builder()
                    .friendly_name("CO2")
                    .driver_key(DriverKey::Index(2))
                    .kind(EntityKind::Sensor)
                    .capability(CapabilityDescriptor::default())
                    .build()
                    .unwrap(),
            ],
        )
        .await
        .unwrap();

        let lights = svc.query_by_kind(EntityKind::Light).await.unwrap();
        assert_eq!(lights.len(), 1);
        assert_eq!(lights[0].kind, EntityKind::Light);

        let sensors = svc.query_by_kind(EntityKind::Sensor).await.unwrap();
        assert_eq!(sensors.len(), 1);
        assert_eq!(sensors[0].kind, EntityKind::Sensor);
    }

    #[tokio::test]
    async fn should_filter_entities_and_devices_by_room() {
        let svc = make_service();
        let area = minihub_domain::id::AreaId::new();
        let in_room = Device::builder()
            .name("Hallway Lamp")
            .protocol(Protocol::Virtual)
            .fingerprint("lamp-1")
            .area_id(area)
            .build()
            .unwrap();
        let elsewhere = Device::builder()
            .name("Garage Sensor")
            .protocol(Protocol::Virtual)
            .fingerprint("sensor-1")
            .build()
            .unwrap();

        let in_room = svc.upsert_device(in_room).await.unwrap();
        let elsewhere = svc.upsert_device(elsewhere).await.unwrap();
        svc.enumerate_entities(in_room.id, vec![make_entity(DriverKey::Index(1))])
            .await
            .unwrap();
        svc.enumerate_entities(elsewhere.id, vec![make_entity(DriverKey::Index(1))])
            .await
            .unwrap();

        let room_devices = svc.query_devices_by_room(area).await.unwrap();
        assert_eq!(room_devices.len(), 1);
        assert_eq!(room_devices[0].id, in_room.id);

        let room_entities = svc.query_by_room(area).await.unwrap();
        assert_eq!(room_entities.len(), 1);
        assert_eq!(room_entities[0].device_id, in_room.id);
    }

    #[tokio::test]
    async fn should_return_every_entity_for_query_by_home() {
        let svc = make_service();
        let device = svc.upsert_device(valid_device()).await.unwrap();
        svc.enumerate_entities(device.id, vec![make_entity(DriverKey::Index(1))])
            .await
            .unwrap();

        let home = svc.query_by_home().await.unwrap();
        assert_eq!(home.len(), 1);
    }
}
