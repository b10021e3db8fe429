//! Adapter context service — the concrete [`AdapterContext`] the
//! composition root hands to every protocol adapter, wiring adapter
//! callbacks back into the registry service, the command repository, and
//! the event bus.

use std::sync::Arc;

use minihub_domain::command::{Command, CommandStatus};
use minihub_domain::device::Device;
use minihub_domain::entity::{Entity, EntityState};
use minihub_domain::error::MiniHubError;
use minihub_domain::event::Event;

use crate::ports::adapter::AdapterContext;
use crate::ports::{
    CommandRepository, DeviceRepository, EntityRepository, EventPublisher, HistorySink,
    LatestStateSink,
};
use crate::services::registry_service::RegistryService;

/// Fans adapter callbacks out to the registry service (device/entity/state),
/// the command repository (result reporting), and the event bus (lifecycle
/// events). Cheap to clone — everything it owns is either an `Arc` or the
/// event publisher handle itself, which adapters clone freely to hand to
/// background subscription tasks.
pub struct AdapterContextService<DR, ER, LS, HS, EP, CR> {
    registry: Arc<RegistryService<DR, ER, LS, HS, EP>>,
    command_repo: Arc<CR>,
    publisher: EP,
}

impl<DR, ER, LS, HS, EP, CR> Clone for AdapterContextService<DR, ER, LS, HS, EP, CR>
where
    EP: Clone,
{
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            command_repo: Arc::clone(&self.command_repo),
            publisher: self.publisher.clone(),
        }
    }
}

impl<DR, ER, LS, HS, EP, CR> AdapterContextService<DR, ER, LS, HS, EP, CR> {
    /// Build a context over a shared registry service, a shared command
    /// repository, and an event publisher handle.
    pub fn new(
        registry: Arc<RegistryService<DR, ER, LS, HS, EP>>,
        command_repo: Arc<CR>,
        publisher: EP,
    ) -> Self {
        Self {
            registry,
            command_repo,
            publisher,
        }
    }
}

impl<DR, ER, LS, HS, EP, CR> AdapterContext for AdapterContextService<DR, ER, LS, HS, EP, CR>
where
    DR: DeviceRepository + Send + Sync + 'static,
    ER: EntityRepository + Send + Sync + 'static,
    LS: LatestStateSink + Send + Sync + 'static,
    HS: HistorySink + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + Clone + 'static,
    CR: CommandRepository + Send + Sync + 'static,
{
    async fn upsert_device(&self, device: Device) -> Result<Device, MiniHubError> {
        self.registry.upsert_device(device).await
    }

    async fn upsert_entity(&self, entity: Entity) -> Result<Entity, MiniHubError> {
        self.registry.upsert_entity(entity).await
    }

    async fn apply_state(&self, state: EntityState) -> Result<(), MiniHubError> {
        self.registry.apply_state(state).await.map(|_applied| ())
    }

    /// Records the adapter-reported outcome against whatever status is
    /// currently stored (not a caller-supplied `expected`, since the
    /// command may already have moved through `processing` under the
    /// consumer's own CAS) and publishes `command/<id>/result`.
    async fn report_command_result(&self, command: Command) -> Result<(), MiniHubError> {
        if let Some(current) = self.command_repo.get_by_id(command.id).await? {
            let _ = self
                .command_repo
                .compare_and_swap(&current, command.clone())
                .await;
        }

        let payload = match &command.status {
            CommandStatus::Completed { coalesced } => {
                serde_json::json!({"status": "completed", "coalesced": coalesced})
            }
            CommandStatus::Failed { error } => {
                serde_json::json!({"status": "failed", "error": error})
            }
            CommandStatus::Processing => serde_json::json!({"status": "processing"}),
            CommandStatus::Pending => serde_json::json!({"status": "pending"}),
        };
        let _ = self
            .publisher
            .publish(Event::command_result(command.id, payload))
            .await;
        Ok(())
    }

    async fn publish_event(&self, event: Event) -> Result<(), MiniHubError> {
        self.publisher.publish(event).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    use minihub_domain::device::Protocol;
    use minihub_domain::id::{CommandId, DeviceId, EntityId};

    use super::*;

    #[derive(Default)]
    struct InMemoryDeviceRepo {
        store: StdMutex<HashMap<DeviceId, Device>>,
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
        store: StdMutex<HashMap<EntityId, Entity>>,
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
        store: StdMutex<HashMap<EntityId, EntityState>>,
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
        records: StdMutex<Vec<minihub_domain::entity_state_history::EntityStateHistory>>,
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
        ) -> Result<Vec<minihub_domain::entity_state_history::EntityStateHistory>, MiniHubError>
        {
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

    #[derive(Clone, Default)]
    struct SpyPublisher {
        events: Arc<StdMutex<Vec<Event>>>,
    }

    impl EventPublisher for SpyPublisher {
        async fn publish(&self, event: Event) -> Result<(), MiniHubError> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    #[derive(Default)]
    struct InMemoryCommandRepo {
        commands: StdMutex<HashMap<CommandId, Command>>,
    }

    impl CommandRepository for InMemoryCommandRepo {
        async fn enqueue(&self, command: Command) -> Result<Command, MiniHubError> {
            self.commands.lock().unwrap().insert(command.id, command.clone());
            Ok(command)
        }

        async fn get_by_id(&self, id: CommandId) -> Result<Option<Command>, MiniHubError> {
            Ok(self.commands.lock().unwrap().get(&id).cloned())
        }

        async fn find_pending_for_device(
            &self,
            _device_id: DeviceId,
        ) -> Result<Vec<Command>, MiniHubError> {
            Ok(Vec::new())
        }

        async fn compare_and_swap(
            &self,
            expected: &Command,
            command: Command,
        ) -> Result<bool, MiniHubError> {
            let mut commands = self.commands.lock().unwrap();
            match commands.get(&expected.id) {
                Some(current) if current.status == expected.status => {
                    commands.insert(command.id, command);
                    Ok(true)
                }
                Some(_) => Ok(false),
                None => Ok(false),
            }
        }
    }

    fn make_context() -> AdapterContextService<
        InMemoryDeviceRepo,
        InMemoryEntityRepo,
        InMemoryLatestState,
        InMemoryHistory,
        SpyPublisher,
        InMemoryCommandRepo,
    > {
        let registry = Arc::new(RegistryService::new(
            InMemoryDeviceRepo::default(),
            InMemoryEntityRepo::default(),
            InMemoryLatestState::default(),
            InMemoryHistory::default(),
            SpyPublisher::default(),
        ));
        AdapterContextService::new(
            registry,
            Arc::new(InMemoryCommandRepo::default()),
            SpyPublisher::default(),
        )
    }

    fn sample_device() -> Device {
        Device::builder()
            .protocol(Protocol::Virtual)
            .fingerprint("fixture")
            .name("lamp")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_upsert_device_through_the_registry() {
        let ctx = make_context();
        let device = ctx.upsert_device(sample_device()).await.unwrap();
        assert_eq!(ctx.registry.list_devices().await.unwrap().len(), 1);
        assert_eq!(device.fingerprint, "fixture");
    }

    #[tokio::test]
    async fn should_record_and_publish_reported_command_result() {
        let ctx = make_context();
        let command = Command::builder()
            .device_id(DeviceId::new())
            .build()
            .unwrap();
        ctx.command_repo.enqueue(command.clone()).await.unwrap();

        let mut completed = command.clone();
        completed.mark_processing().unwrap();
        completed
            .mark_completed(true, minihub_domain::time::now())
            .unwrap();
        ctx.report_command_result(completed.clone()).await.unwrap();

        let stored = ctx.command_repo.get_by_id(command.id).await.unwrap().unwrap();
        assert!(matches!(
            stored.status,
            CommandStatus::Completed { coalesced: true }
        ));
        let events = ctx.publisher.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["status"], "completed");
        assert_eq!(events[0].payload["coalesced"], true);
    }

    #[tokio::test]
    async fn should_publish_arbitrary_lifecycle_event() {
        let ctx = make_context();
        ctx.publish_event(Event::new("device/auth_lost", serde_json::json!({})))
            .await
            .unwrap();
        let events = ctx.publisher.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].topic, "device/auth_lost");
    }
}
