//! Command queue consumer — the daemon's most delicate subsystem. Sweeps
//! pending commands from the remote queue at startup, then drives it in one
//! of two operating modes, claiming each command via compare-and-swap before
//! dispatching it to the adapter owning the target device.
//!
//! The dual push/pull operating mode the specification describes is driven
//! from here: [`run`](CommandConsumer::run) first tries
//! [`subscribe`](RemoteCommandQueue::subscribe) and, while that channel
//! stays open, dispatches commands as they arrive with no poll delay. If the
//! subscription is unsupported, fails to open, or the channel closes, the
//! consumer falls back to polling [`poll`](RemoteCommandQueue::poll) on an
//! interval — no queued command is lost across the transition, since the
//! channel closing is the only trigger and polling resumes immediately
//! after. While polling, the consumer periodically retries `subscribe` and
//! upgrades back to push mode (cancelling the poll ticker) the moment it
//! succeeds again. Each transition publishes a `command_consumer/mode`
//! event. Translating a raw capability string into a
//! [`CapabilityTag`](minihub_domain::command::CapabilityTag) happens
//! wherever a `Command` is deserialized off the wire, upstream of this
//! port; by the time either `poll` or `subscribe` hands a `Command` here,
//! its capability is already a typed, valid tag.
//!
//! Every command with an entity reference passes through
//! [`CommandGate`](crate::command_gate::CommandGate) before it reaches the
//! adapter, which is what actually gives each entity FIFO ordering,
//! scrubbable-capability coalescing, and a rate ceiling (§4.2) — this
//! module owns announcing arrival order and reporting the gate's verdict,
//! not the bookkeeping itself.
//!
//! Before any of that, [`process`](Self::process) claims the command via
//! [`RemoteCommandQueue::claim`] — a conditional `pending → processing`
//! update against the *remote* row. That, not the local
//! [`CommandRepository::compare_and_swap`] call further down, is the
//! process-wide guarantee that at most one hub instance ever dispatches a
//! given command: two daemons each polling their own local storage against
//! the same shared remote queue only ever race on the remote row.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};

use minihub_domain::command::Command;
use minihub_domain::error::MiniHubError;
use minihub_domain::event::Event;

use crate::command_gate::{CommandGate, GateOutcome, Ticket};
use crate::ports::adapter::ProtocolAdapter;
use crate::ports::command_queue::RemoteCommandQueue;
use crate::ports::event_bus::EventPublisher;
use crate::ports::storage::{CommandRepository, DeviceRepository};
use crate::registry::AdapterRegistry;

/// Default remote-queue poll interval, used whenever push mode isn't
/// available.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// How often the consumer retries opening a push subscription while it's
/// stuck in poll mode.
const DEFAULT_RESUBSCRIBE_INTERVAL: Duration = Duration::from_secs(30);
/// Default global concurrency ceiling across in-flight command dispatches.
const DEFAULT_CONCURRENCY: usize = 64;
/// Upper bound on commands pulled in the startup sweep.
const SWEEP_BATCH_SIZE: usize = 10_000;
/// Per-poll batch size once steady state is reached.
const POLL_BATCH_SIZE: usize = 256;

/// Which transport the consumer is currently reading commands from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsumerMode {
    Push,
    Polling,
}

impl ConsumerMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Polling => "pull",
        }
    }
}

/// Drives commands from the remote queue to the adapter that owns their
/// target device.
pub struct CommandConsumer<DR, CR, A, Q, EP> {
    device_repo: DR,
    command_repo: CR,
    registry: Arc<AdapterRegistry<A>>,
    queue: Q,
    publisher: EP,
    poll_interval: Duration,
    resubscribe_interval: Duration,
    concurrency: Arc<Semaphore>,
    gate: Arc<CommandGate>,
}

impl<DR, CR, A, Q, EP> CommandConsumer<DR, CR, A, Q, EP>
where
    DR: DeviceRepository + Send + Sync + 'static,
    CR: CommandRepository + Send + Sync + 'static,
    A: ProtocolAdapter + 'static,
    Q: RemoteCommandQueue + Send + Sync + 'static,
    EP: EventPublisher + Send + Sync + 'static,
{
    /// Build a consumer over the given repositories, adapter registry,
    /// remote queue, and event publisher.
    #[must_use]
    pub fn new(
        device_repo: DR,
        command_repo: CR,
        registry: Arc<AdapterRegistry<A>>,
        queue: Q,
        publisher: EP,
    ) -> Self {
        Self {
            device_repo,
            command_repo,
            registry,
            queue,
            publisher,
            poll_interval: DEFAULT_POLL_INTERVAL,
            resubscribe_interval: DEFAULT_RESUBSCRIBE_INTERVAL,
            concurrency: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
            gate: Arc::new(CommandGate::new()),
        }
    }

    /// Override the default 2s poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Override the default 30s interval the consumer waits between retries
    /// to re-open a push subscription while stuck in poll mode.
    #[must_use]
    pub fn with_resubscribe_interval(mut self, interval: Duration) -> Self {
        self.resubscribe_interval = interval;
        self
    }

    /// Override the default 64-command global concurrency ceiling.
    #[must_use]
    pub fn with_concurrency(mut self, permits: usize) -> Self {
        self.concurrency = Arc::new(Semaphore::new(permits.max(1)));
        self
    }

    /// Override the default 10/s per-entity dispatch rate ceiling enforced
    /// by the command gate.
    #[must_use]
    pub fn with_rate_limit_per_s(mut self, per_s: u32) -> Self {
        self.gate = Arc::new(CommandGate::new().with_rate_limit_per_s(per_s));
        self
    }

    /// Pull one batch from the remote queue and dispatch every command it
    /// contains, subject to the concurrency ceiling. Returns the number of
    /// commands pulled. Used both for the startup sweep and each steady
    /// state poll tick.
    #[tracing::instrument(skip(self))]
    async fn poll_and_dispatch(self: &Arc<Self>, max: usize) -> Result<usize, MiniHubError> {
        let commands = self.queue.poll(max).await?;
        let count = commands.len();

        let mut handles = Vec::with_capacity(count);
        for command in commands {
            let ticket = self.announce(&command).await;
            let consumer = Arc::clone(self);
            handles.push(tokio::spawn(async move {
                consumer.process(command, ticket).await
            }));
        }

        for handle in handles {
            if let Err(join_error) = handle.await {
                tracing::error!(%join_error, "command dispatch task panicked");
            }
        }

        Ok(count)
    }

    /// Run the startup sweep: drain every currently pending command before
    /// entering steady-state polling, so commands queued while the daemon
    /// was down are never lost.
    #[tracing::instrument(skip(self))]
    pub async fn startup_sweep(self: &Arc<Self>) -> Result<usize, MiniHubError> {
        let swept = self.poll_and_dispatch(SWEEP_BATCH_SIZE).await?;
        tracing::info!(swept, "startup command sweep complete");
        Ok(swept)
    }

    /// Run the steady-state loop until `shutdown` resolves, switching
    /// between push and pull mode as the remote queue's push transport
    /// comes and goes.
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::oneshot::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        let mut resubscribe = tokio::time::interval(self.resubscribe_interval);

        let mut mode = ConsumerMode::Polling;
        let mut push_rx: Option<mpsc::Receiver<Command>> = None;
        if let Ok(rx) = self.queue.subscribe().await {
            tracing::info!("command consumer opened push subscription");
            mode = ConsumerMode::Push;
            push_rx = Some(rx);
            self.announce_mode(mode).await;
        }

        loop {
            match (mode, push_rx.as_mut()) {
                (ConsumerMode::Push, Some(rx)) => {
                    tokio::select! {
                        received = rx.recv() => {
                            match received {
                                Some(command) => {
                                    let ticket = self.announce(&command).await;
                                    let consumer = Arc::clone(&self);
                                    tokio::spawn(async move { consumer.process(command, ticket).await });
                                }
                                None => {
                                    tracing::warn!("command push subscription closed, falling back to poll mode");
                                    mode = ConsumerMode::Polling;
                                    push_rx = None;
                                    self.announce_mode(mode).await;
                                }
                            }
                        }
                        _ = &mut shutdown => {
                            tracing::info!("command consumer shutting down");
                            return;
                        }
                    }
                }
                _ => {
                    tokio::select! {
                        _ = ticker.tick() => {
                            if let Err(error) = self.poll_and_dispatch(POLL_BATCH_SIZE).await {
                                tracing::error!(%error, "command queue poll failed");
                            }
                        }
                        _ = resubscribe.tick() => {
                            if let Ok(rx) = self.queue.subscribe().await {
                                tracing::info!("command consumer upgraded back to push mode");
                                mode = ConsumerMode::Push;
                                push_rx = Some(rx);
                                self.announce_mode(mode).await;
                            }
                        }
                        _ = &mut shutdown => {
                            tracing::info!("command consumer shutting down");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn announce_mode(self: &Arc<Self>, mode: ConsumerMode) {
        let _ = self
            .publisher
            .publish(Event::command_consumer_mode(mode.as_str()))
            .await;
    }

    /// Register a command's arrival with the per-entity command gate, in
    /// the order it was pulled off the queue. Must be called before the
    /// command is handed to a concurrently spawned [`process`](Self::process)
    /// task, so that coalescing sees commands in the order they actually
    /// arrived rather than the order their tasks happen to be scheduled.
    async fn announce(self: &Arc<Self>, command: &Command) -> Ticket {
        match command.entity_id {
            Some(entity_id) => self.gate.announce(entity_id, command).await,
            None => None,
        }
    }

    /// Claim, dispatch, and terminally resolve a single command pulled from
    /// the remote queue.
    ///
    /// Claims the command on the *remote* queue first — a conditional
    /// `pending → processing` PATCH against the shared row — before any
    /// local bookkeeping. That remote claim, not the local repository's CAS
    /// below it, is what makes "at most one hub instance executes any
    /// command" hold when two daemon processes both poll the same row: the
    /// local `command_repo` only ever sees this process's own commands, so
    /// it can't detect a sibling hub instance racing on the same remote row.
    ///
    /// Once claimed, acquires a concurrency permit for the duration of the
    /// dispatch, then routes the actual device write through the per-entity
    /// [`CommandGate`] (§4.2): FIFO order per entity, scrubbable-capability
    /// coalescing against `ticket`, and a per-entity rate ceiling. A
    /// command the gate coalesces away never reaches the adapter and is
    /// completed here with `coalesced: true`.
    async fn process(self: Arc<Self>, command: Command, ticket: Ticket) {
        match self.queue.claim(&command).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(command_id = %command.id, "command already claimed by another hub instance");
                return;
            }
            Err(error) => {
                tracing::error!(command_id = %command.id, %error, "failed to claim command on remote queue");
                return;
            }
        }

        let _permit = match self.concurrency.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        if let Err(error) = self.command_repo.enqueue(command.clone()).await {
            tracing::warn!(command_id = %command.id, %error, "failed to record command locally, dispatching anyway");
        }

        let pending = command.clone();
        let mut processing = command;
        if let Err(error) = processing.mark_processing() {
            tracing::error!(command_id = %processing.id, %error, "command already left the pending state");
            return;
        }
        match self
            .command_repo
            .compare_and_swap(&pending, processing.clone())
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(command_id = %processing.id, "command already claimed locally by another task");
                return;
            }
            Err(error) => {
                tracing::error!(command_id = %processing.id, %error, "failed to claim command locally");
                return;
            }
        }

        let device = match self.device_repo.get_by_id(processing.device_id).await {
            Ok(Some(device)) => device,
            Ok(None) => {
                self.resolve_failed(processing, "device_not_found").await;
                return;
            }
            Err(error) => {
                tracing::error!(command_id = %processing.id, %error, "failed to look up command's device");
                return;
            }
        };

        let Some(entity_id) = processing.entity_id else {
            match self.registry.dispatch_command(&device, &processing).await {
                Ok(()) => self.resolve_completed(processing, false).await,
                Err(error) => self.resolve_failed(processing, &error.to_string()).await,
            }
            return;
        };

        let dispatch_command = processing.clone();
        let registry = Arc::clone(&self.registry);
        let outcome = self
            .gate
            .run(entity_id, &processing, ticket, move || async move {
                registry.dispatch_command(&device, &dispatch_command).await
            })
            .await;

        match outcome {
            GateOutcome::Dispatched(Ok(())) => self.resolve_completed(processing, false).await,
            GateOutcome::Dispatched(Err(error)) => {
                self.resolve_failed(processing, &error.to_string()).await;
            }
            GateOutcome::Coalesced => self.resolve_completed(processing, true).await,
        }
    }

    /// Transition a claimed command to `completed`, report it, and
    /// acknowledge it off the remote queue. `coalesced` marks a command
    /// that the entity gate merged into a later one instead of dispatching
    /// on its own.
    async fn resolve_completed(self: &Arc<Self>, processing: Command, coalesced: bool) {
        let now = minihub_domain::time::now();
        let mut completed = processing.clone();
        if let Err(error) = completed.mark_completed(coalesced, now) {
            tracing::error!(command_id = %completed.id, %error, "completed command had invalid state");
            return;
        }
        let _ = self
            .command_repo
            .compare_and_swap(&processing, completed.clone())
            .await;
        let _ = self
            .publisher
            .publish(Event::command_result(
                completed.id,
                serde_json::json!({"status": "completed", "coalesced": coalesced}),
            ))
            .await;
        let _ = self.queue.acknowledge(&completed).await;
    }

    /// Transition a claimed command to `failed` with `reason`, report it,
    /// and acknowledge it off the remote queue. We do not retry on our own
    /// — a publisher wanting retry re-enqueues a new command.
    async fn resolve_failed(self: &Arc<Self>, processing: Command, reason: &str) {
        let now = minihub_domain::time::now();
        let mut failed = processing.clone();
        if failed.mark_failed(reason, now).is_err() {
            return;
        }
        let _ = self
            .command_repo
            .compare_and_swap(&processing, failed.clone())
            .await;
        let _ = self
            .publisher
            .publish(Event::command_result(
                failed.id,
                serde_json::json!({"status": "failed", "error": reason}),
            ))
            .await;
        let _ = self.queue.acknowledge(&failed).await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    use minihub_domain::command::CapabilityTag;
    use minihub_domain::device::{Device, Protocol};
    use minihub_domain::entity::{Entity, EntityState};
    use minihub_domain::id::DeviceId;

    use super::*;
    use crate::ports::adapter::AdapterContext;

    #[derive(Default)]
    struct InMemoryDeviceRepo {
        devices: StdMutex<HashMap<DeviceId, Device>>,
    }

    impl DeviceRepository for InMemoryDeviceRepo {
        async fn create(&self, device: Device) -> Result<Device, MiniHubError> {
            self.devices.lock().unwrap().insert(device.id, device.clone());
            Ok(device)
        }

        async fn get_by_id(&self, id: DeviceId) -> Result<Option<Device>, MiniHubError> {
            Ok(self.devices.lock().unwrap().get(&id).cloned())
        }

        async fn get_all(&self) -> Result<Vec<Device>, MiniHubError> {
            Ok(self.devices.lock().unwrap().values().cloned().collect())
        }

        async fn find_by_protocol_fingerprint(
            &self,
            _protocol: Protocol,
            _fingerprint: &str,
        ) -> Result<Option<Device>, MiniHubError> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct InMemoryCommandRepo {
        commands: StdMutex<HashMap<minihub_domain::id::CommandId, Command>>,
    }

    impl CommandRepository for InMemoryCommandRepo {
        async fn enqueue(&self, command: Command) -> Result<Command, MiniHubError> {
            let mut commands = self.commands.lock().unwrap();
            if commands.contains_key(&command.id) {
                return Err(minihub_domain::error::ValidationError::CapabilityValueOutOfRange {
                    capability: command.capability.to_string(),
                    value: "duplicate command id".to_string(),
                }
                .into());
            }
            commands.insert(command.id, command.clone());
            Ok(command)
        }

        async fn get_by_id(
            &self,
            id: minihub_domain::id::CommandId,
        ) -> Result<Option<Command>, MiniHubError> {
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
                None => {
                    commands.insert(command.id, command);
                    Ok(true)
                }
            }
        }
    }

    #[derive(Default)]
    struct NoopContext;

    impl AdapterContext for NoopContext {
        async fn upsert_device(&self, device: Device) -> Result<Device, MiniHubError> {
            Ok(device)
        }

        async fn upsert_entity(&self, entity: Entity) -> Result<Entity, MiniHubError> {
            Ok(entity)
        }

        async fn apply_state(&self, _state: EntityState) -> Result<(), MiniHubError> {
            Ok(())
        }

        async fn report_command_result(&self, _command: Command) -> Result<(), MiniHubError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeAdapter {
        fail: bool,
    }

    impl ProtocolAdapter for FakeAdapter {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn initialize(&mut self, _ctx: &impl AdapterContext) -> Result<(), MiniHubError> {
            Ok(())
        }

        async fn connect(&mut self, _device: &Device) -> Result<(), MiniHubError> {
            Ok(())
        }

        async fn enumerate_entities(
            &mut self,
            _device: &Device,
        ) -> Result<Vec<Entity>, MiniHubError> {
            Ok(Vec::new())
        }

        async fn subscribe_state(
            &mut self,
            _device: &Device,
            _ctx: impl AdapterContext + Clone + 'static,
        ) -> Result<(), MiniHubError> {
            Ok(())
        }

        async fn send_command(
            &mut self,
            _device: &Device,
            _command: &Command,
        ) -> Result<(), MiniHubError> {
            if self.fail {
                Err(minihub_domain::error::ValidationError::CapabilityValueOutOfRange {
                    capability: "on_off".to_string(),
                    value: "bad".to_string(),
                }
                .into())
            } else {
                Ok(())
            }
        }

        async fn shutdown(&mut self, _device: &Device) -> Result<(), MiniHubError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeQueue {
        commands: StdMutex<Vec<Command>>,
        acknowledged: StdMutex<Vec<Command>>,
    }

    impl RemoteCommandQueue for FakeQueue {
        async fn poll(&self, max: usize) -> Result<Vec<Command>, MiniHubError> {
            let mut commands = self.commands.lock().unwrap();
            let drained: Vec<_> = commands.drain(..commands.len().min(max)).collect();
            Ok(drained)
        }

        async fn acknowledge(&self, command: &Command) -> Result<(), MiniHubError> {
            self.acknowledged.lock().unwrap().push(command.clone());
            Ok(())
        }
    }

    /// A remote queue shared by more than one [`CommandConsumer`] (simulating
    /// more than one hub instance), whose `claim` enforces a real
    /// `pending → processing` CAS against rows it — not any single
    /// consumer's local repository — owns.
    #[derive(Default)]
    struct SharedRemoteQueue {
        commands: StdMutex<Vec<Command>>,
        claimed: StdMutex<std::collections::HashSet<minihub_domain::id::CommandId>>,
        acknowledged: StdMutex<Vec<Command>>,
    }

    impl RemoteCommandQueue for SharedRemoteQueue {
        async fn poll(&self, max: usize) -> Result<Vec<Command>, MiniHubError> {
            // Unlike `FakeQueue`, polling doesn't drain: two consumers sharing
            // this queue must both be able to see (and race on claiming) the
            // same still-`pending` row.
            let commands = self.commands.lock().unwrap();
            Ok(commands.iter().take(max).cloned().collect())
        }

        async fn acknowledge(&self, command: &Command) -> Result<(), MiniHubError> {
            self.acknowledged.lock().unwrap().push(command.clone());
            Ok(())
        }

        async fn claim(&self, command: &Command) -> Result<bool, MiniHubError> {
            Ok(self.claimed.lock().unwrap().insert(command.id))
        }
    }

    #[tokio::test]
    async fn should_dispatch_a_shared_command_exactly_once_across_two_consumer_instances() {
        let device = sample_device();
        let queue = Arc::new(SharedRemoteQueue::default());
        let command = sample_command(device.id);
        queue.commands.lock().unwrap().push(command.clone());

        let make_consumer = || {
            let device_repo = InMemoryDeviceRepo::default();
            device_repo.devices.lock().unwrap().insert(device.id, device.clone());
            let registry = Arc::new(AdapterRegistry::new(vec![(
                Protocol::Virtual,
                FakeAdapter::default(),
            )]));
            Arc::new(CommandConsumer::new(
                device_repo,
                InMemoryCommandRepo::default(),
                registry,
                Arc::clone(&queue),
                SpyPublisher::default(),
            ))
        };

        let hub_a = make_consumer();
        let hub_b = make_consumer();

        let (swept_a, swept_b) = tokio::join!(hub_a.startup_sweep(), hub_b.startup_sweep());
        swept_a.unwrap();
        swept_b.unwrap();

        // Both hub instances saw the same pending row, but only one of them
        // could win the remote claim, so the queue sees exactly one
        // acknowledgement for it.
        assert_eq!(queue.acknowledged.lock().unwrap().len(), 1);
    }

    /// A queue whose push subscription can be toggled on/off mid-test, to
    /// exercise the downgrade-then-upgrade transition.
    #[derive(Default)]
    struct PushCapableQueue {
        commands: StdMutex<Vec<Command>>,
        acknowledged: StdMutex<Vec<Command>>,
        push_available: StdMutex<bool>,
        push_tx: StdMutex<Option<mpsc::Sender<Command>>>,
    }

    impl PushCapableQueue {
        fn set_push_available(&self, available: bool) {
            *self.push_available.lock().unwrap() = available;
            if !available {
                // Dropping the sender closes the open subscription's channel.
                self.push_tx.lock().unwrap().take();
            }
        }

        fn push(&self, command: Command) {
            let sender = self.push_tx.lock().unwrap().clone();
            if let Some(sender) = sender {
                let _ = sender.try_send(command);
            } else {
                self.commands.lock().unwrap().push(command);
            }
        }
    }

    impl RemoteCommandQueue for PushCapableQueue {
        async fn poll(&self, max: usize) -> Result<Vec<Command>, MiniHubError> {
            let mut commands = self.commands.lock().unwrap();
            let drained: Vec<_> = commands.drain(..commands.len().min(max)).collect();
            Ok(drained)
        }

        async fn acknowledge(&self, command: &Command) -> Result<(), MiniHubError> {
            self.acknowledged.lock().unwrap().push(command.clone());
            Ok(())
        }

        async fn subscribe(&self) -> Result<mpsc::Receiver<Command>, MiniHubError> {
            if !*self.push_available.lock().unwrap() {
                return Err(minihub_domain::error::MiniHubError::Storage(Box::new(
                    std::io::Error::new(std::io::ErrorKind::Unsupported, "push disabled"),
                )));
            }
            let (tx, rx) = mpsc::channel(16);
            *self.push_tx.lock().unwrap() = Some(tx);
            Ok(rx)
        }
    }

    #[derive(Default)]
    struct SpyPublisher {
        events: StdMutex<Vec<Event>>,
    }

    impl EventPublisher for SpyPublisher {
        async fn publish(&self, event: Event) -> Result<(), MiniHubError> {
            self.events.lock().unwrap().push(event);
            Ok(())
        }
    }

    fn sample_device() -> Device {
        Device::builder()
            .protocol(Protocol::Virtual)
            .fingerprint("fixture")
            .name("lamp")
            .build()
            .unwrap()
    }

    fn sample_command(device_id: DeviceId) -> Command {
        Command::builder()
            .device_id(device_id)
            .capability(CapabilityTag::OnOff)
            .value(serde_json::json!(true))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_complete_a_command_dispatched_successfully() {
        let device = sample_device();
        let device_repo = InMemoryDeviceRepo::default();
        device_repo.create(device.clone()).await.unwrap();
        let command_repo = InMemoryCommandRepo::default();
        let registry = Arc::new(AdapterRegistry::new(vec![(
            Protocol::Virtual,
            FakeAdapter::default(),
        )]));
        let queue = FakeQueue::default();
        let command = sample_command(device.id);
        queue.commands.lock().unwrap().push(command.clone());
        let publisher = SpyPublisher::default();
        let consumer = Arc::new(CommandConsumer::new(
            device_repo,
            command_repo,
            registry,
            queue,
            publisher,
        ));

        let swept = consumer.startup_sweep().await.unwrap();

        assert_eq!(swept, 1);
        assert_eq!(consumer.queue.acknowledged.lock().unwrap().len(), 1);
        let acked = &consumer.queue.acknowledged.lock().unwrap()[0];
        assert!(matches!(
            acked.status,
            minihub_domain::command::CommandStatus::Completed { coalesced: false }
        ));
        let events = consumer.publisher.events.lock().unwrap();
        assert_eq!(events.iter().filter(|e| e.topic == "command/result").count(), 1);
    }

    #[tokio::test]
    async fn should_fail_a_command_whose_device_is_unknown() {
        let device_repo = InMemoryDeviceRepo::default();
        let command_repo = InMemoryCommandRepo::default();
        let registry = Arc::new(AdapterRegistry::new(vec![(
            Protocol::Virtual,
            FakeAdapter::default(),
        )]));
        let queue = FakeQueue::default();
        let command = sample_command(DeviceId::new());
        queue.commands.lock().unwrap().push(command.clone());
        let publisher = SpyPublisher::default();
        let consumer = Arc::new(CommandConsumer::new(
            device_repo,
            command_repo,
            registry,
            queue,
            publisher,
        ));

        consumer.startup_sweep().await.unwrap();

        let acked = &consumer.queue.acknowledged.lock().unwrap()[0];
        assert!(matches!(
            &acked.status,
            minihub_domain::command::CommandStatus::Failed { error } if error == "device_not_found"
        ));
    }

    #[tokio::test]
    async fn should_fail_a_command_when_the_adapter_errors() {
        let device = sample_device();
        let device_repo = InMemoryDeviceRepo::default();
        device_repo.create(device.clone()).await.unwrap();
        let command_repo = InMemoryCommandRepo::default();
        let registry = Arc::new(AdapterRegistry::new(vec![(
            Protocol::Virtual,
            FakeAdapter { fail: true },
        )]));
        let queue = FakeQueue::default();
        let command = sample_command(device.id);
        queue.commands.lock().unwrap().push(command.clone());
        let publisher = SpyPublisher::default();
        let consumer = Arc::new(CommandConsumer::new(
            device_repo,
            command_repo,
            registry,
            queue,
            publisher,
        ));

        consumer.startup_sweep().await.unwrap();

        let acked = &consumer.queue.acknowledged.lock().unwrap()[0];
        assert!(matches!(
            acked.status,
            minihub_domain::command::CommandStatus::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn should_skip_a_command_already_claimed_by_another_consumer() {
        let device = sample_device();
        let device_repo = InMemoryDeviceRepo::default();
        device_repo.create(device.clone()).await.unwrap();
        let command_repo = InMemoryCommandRepo::default();
        let mut already_processing = sample_command(device.id);
        already_processing.mark_processing().unwrap();
        command_repo
            .enqueue(already_processing.clone())
            .await
            .unwrap();
        let registry = Arc::new(AdapterRegistry::new(vec![(
            Protocol::Virtual,
            FakeAdapter::default(),
        )]));
        let queue = FakeQueue::default();
        // The command pulled off the queue is still `pending`, but the local
        // repository already has it as `processing` under the same id, so
        // the claiming CAS should lose the race.
        let mut pulled = already_processing.clone();
        pulled.status = minihub_domain::command::CommandStatus::Pending;
        queue.commands.lock().unwrap().push(pulled);
        let publisher = SpyPublisher::default();
        let consumer = Arc::new(CommandConsumer::new(
            device_repo,
            command_repo,
            registry,
            queue,
            publisher,
        ));

        consumer.startup_sweep().await.unwrap();

        assert!(consumer.queue.acknowledged.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_dispatch_over_push_then_downgrade_and_reupgrade_to_poll() {
        let device = sample_device();
        let device_repo = InMemoryDeviceRepo::default();
        device_repo.create(device.clone()).await.unwrap();
        let command_repo = InMemoryCommandRepo::default();
        let registry = Arc::new(AdapterRegistry::new(vec![(
            Protocol::Virtual,
            FakeAdapter::default(),
        )]));
        let queue = PushCapableQueue::default();
        queue.set_push_available(true);
        let publisher = SpyPublisher::default();
        let consumer = Arc::new(
            CommandConsumer::new(device_repo, command_repo, registry, queue, publisher)
                .with_poll_interval(Duration::from_millis(20))
                .with_resubscribe_interval(Duration::from_millis(40)),
        );

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let handle = tokio::spawn(Arc::clone(&consumer).run(shutdown_rx));

        // Give the consumer a moment to open its push subscription, then
        // dispatch a command purely over the push channel.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let first = sample_command(device.id);
        consumer.queue.push(first.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(consumer.queue.acknowledged.lock().unwrap().len(), 1);

        // Downgrade: the push transport disappears, the command still in
        // flight goes through the polling fallback instead.
        consumer.queue.set_push_available(false);
        tokio::time::sleep(Duration::from_millis(40)).await;
        let second = sample_command(device.id);
        consumer.queue.commands.lock().unwrap().push(second.clone());
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(consumer.queue.acknowledged.lock().unwrap().len(), 2);

        // Re-upgrade: push becomes available again, the consumer notices on
        // its next resubscribe attempt and switches back.
        consumer.queue.set_push_available(true);
        tokio::time::sleep(Duration::from_millis(80)).await;
        let third = sample_command(device.id);
        consumer.queue.push(third.clone());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(consumer.queue.acknowledged.lock().unwrap().len(), 3);

        let _ = shutdown_tx.send(());
        handle.await.unwrap();

        let events = consumer.publisher.events.lock().unwrap();
        let modes: Vec<_> = events
            .iter()
            .filter(|e| e.topic == "command_consumer/mode")
            .map(|e| e.payload["mode"].as_str().unwrap().to_string())
            .collect();
        assert!(modes.contains(&"push".to_string()));
        assert!(modes.contains(&"pull".to_string()));
    }
}
