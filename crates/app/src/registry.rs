//! Adapter registry — static protocol-tag-to-adapter mapping, lifecycle
//! orchestration, and command routing.
//!
//! Generalizes the teacher's ad-hoc integration list (a `Vec<Box<dyn
//! Integration>>` the bin crate would have driven directly) into a typed
//! registry the application layer owns. [`ProtocolAdapter::subscribe_state`]
//! takes a generic context parameter, so the trait isn't object-safe; the
//! registry is generic over a single adapter type `A` instead, and the
//! composition root supplies a concrete enum that dispatches across
//! protocols internally (see the `minihubd` bin crate's `Adapter` type).

use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;

use minihub_domain::command::Command;
use minihub_domain::device::{Device, Protocol};
use minihub_domain::entity::Entity;
use minihub_domain::error::{MiniHubError, NotFoundError};

use crate::ports::adapter::{AdapterContext, DiscoveredDevice, ProtocolAdapter};

/// Bounded drain window applied to each adapter during shutdown, after
/// which it is abandoned rather than awaited further.
const DEFAULT_SHUTDOWN_DRAIN: Duration = Duration::from_secs(5);

/// Static mapping from protocol tag to adapter instance.
///
/// Each adapter is wrapped in its own [`tokio::sync::Mutex`] so the registry
/// can hand out `&self` access (needed to be shared across the discovery
/// manager, command consumer, and HTTP surface) while still driving the
/// `&mut self` methods `ProtocolAdapter` requires.
pub struct AdapterRegistry<A> {
    entries: Vec<(Protocol, AsyncMutex<A>)>,
    shutdown_drain: Duration,
}

impl<A> AdapterRegistry<A>
where
    A: ProtocolAdapter,
{
    /// Build a registry from `(protocol, adapter)` pairs. Order is
    /// significant: adapters are initialized in the order given and shut
    /// down in reverse.
    #[must_use]
    pub fn new(adapters: Vec<(Protocol, A)>) -> Self {
        Self {
            entries: adapters
                .into_iter()
                .map(|(protocol, adapter)| (protocol, AsyncMutex::new(adapter)))
                .collect(),
            shutdown_drain: DEFAULT_SHUTDOWN_DRAIN,
        }
    }

    /// Override the per-adapter shutdown drain window (default 5s).
    #[must_use]
    pub fn with_shutdown_drain(mut self, drain: Duration) -> Self {
        self.shutdown_drain = drain;
        self
    }

    fn find(&self, protocol: Protocol) -> Result<&AsyncMutex<A>, MiniHubError> {
        self.entries
            .iter()
            .find(|(p, _)| *p == protocol)
            .map(|(_, adapter)| adapter)
            .ok_or_else(|| {
                NotFoundError {
                    entity: "ProtocolAdapter",
                    id: protocol.as_str().to_string(),
                }
                .into()
            })
    }

    /// Initialize every registered adapter in parallel. A failure in one
    /// adapter is logged and does not prevent the others from starting.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn initialize_all(&self, ctx: &impl AdapterContext) {
        let outcomes = futures::future::join_all(self.entries.iter().map(|(protocol, adapter)| {
            let protocol = *protocol;
            async move {
                let mut guard = adapter.lock().await;
                (protocol, guard.initialize(ctx).await)
            }
        }))
        .await;

        for (protocol, outcome) in outcomes {
            if let Err(error) = outcome {
                tracing::error!(protocol = protocol.as_str(), %error, "adapter failed to initialize");
            }
        }
    }

    /// Run discovery on every registered adapter in parallel, returning the
    /// devices found. A failure in one adapter is logged and does not
    /// prevent the others from reporting.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn discover_all(&self, ctx: &impl AdapterContext) -> Vec<DiscoveredDevice> {
        let outcomes = futures::future::join_all(self.entries.iter().map(|(protocol, adapter)| {
            let protocol = *protocol;
            async move {
                let mut guard = adapter.lock().await;
                (protocol, guard.discover(ctx).await)
            }
        }))
        .await;

        let mut discovered = Vec::new();
        for (protocol, outcome) in outcomes {
            match outcome {
                Ok(devices) => discovered.extend(devices),
                Err(error) => {
                    tracing::warn!(protocol = protocol.as_str(), %error, "adapter discovery failed");
                }
            }
        }
        discovered
    }

    /// Open a session with `device` via its protocol's adapter.
    pub async fn connect(&self, device: &Device) -> Result<(), MiniHubError> {
        self.find(device.protocol)?.lock().await.connect(device).await
    }

    /// Run the pairing handshake for `device` via its protocol's adapter.
    pub async fn pair(
        &self,
        device: &Device,
        ctx: &impl AdapterContext,
    ) -> Result<(), MiniHubError> {
        self.find(device.protocol)?.lock().await.pair(device, ctx).await
    }

    /// Enumerate the entities `device` exposes via its protocol's adapter.
    pub async fn enumerate_entities(&self, device: &Device) -> Result<Vec<Entity>, MiniHubError> {
        self.find(device.protocol)?
            .lock()
            .await
            .enumerate_entities(device)
            .await
    }

    /// Start streaming state for `device` via its protocol's adapter.
    pub async fn subscribe_state(
        &self,
        device: &Device,
        ctx: impl AdapterContext + Clone + 'static,
    ) -> Result<(), MiniHubError> {
        self.find(device.protocol)?
            .lock()
            .await
            .subscribe_state(device, ctx)
            .await
    }

    /// Actively poll for state on `device` via its protocol's adapter.
    pub async fn poll_state(
        &self,
        device: &Device,
        ctx: &impl AdapterContext,
    ) -> Result<(), MiniHubError> {
        self.find(device.protocol)?
            .lock()
            .await
            .poll_state(device, ctx)
            .await
    }

    /// Route `command` to `device`'s protocol adapter for dispatch.
    ///
    /// # Errors
    ///
    /// Returns [`MiniHubError::NotFound`] if no adapter is registered for
    /// `device.protocol`, or the error the adapter's `send_command` returns.
    #[tracing::instrument(skip(self, device, command), fields(protocol = device.protocol.as_str(), device_id = %device.id, command_id = %command.id))]
    pub async fn dispatch_command(
        &self,
        device: &Device,
        command: &Command,
    ) -> Result<(), MiniHubError> {
        self.find(device.protocol)?
            .lock()
            .await
            .send_command(device, command)
            .await
    }

    /// Shut down every registered adapter in reverse registration order,
    /// each bounded by the configured drain window. An adapter that doesn't
    /// finish within the window is abandoned, not awaited further.
    #[tracing::instrument(skip(self, devices))]
    pub async fn shutdown_all(&self, devices: &[Device]) {
        for (protocol, adapter) in self.entries.iter().rev() {
            let mut guard = adapter.lock().await;
            for device in devices.iter().filter(|d| d.protocol == *protocol) {
                match tokio::time::timeout(self.shutdown_drain, guard.shutdown(device)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(error)) => {
                        tracing::warn!(protocol = protocol.as_str(), device_id = %device.id, %error, "adapter shutdown returned an error");
                    }
                    Err(_) => {
                        tracing::warn!(protocol = protocol.as_str(), device_id = %device.id, "adapter shutdown timed out, abandoning");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use minihub_domain::device::Protocol;
    use minihub_domain::entity::EntityState;

    use super::*;

    #[derive(Clone, Default)]
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
        name: &'static str,
        init_calls: Arc<AtomicUsize>,
        send_calls: Arc<AtomicUsize>,
        shutdown_order: Option<Arc<AsyncMutex<Vec<&'static str>>>>,
        fail_init: bool,
    }

    impl ProtocolAdapter for FakeAdapter {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn initialize(&mut self, _ctx: &impl AdapterContext) -> Result<(), MiniHubError> {
            self.init_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_init {
                return Err(NotFoundError {
                    entity: "Fixture",
                    id: "boom".to_string(),
                }
                .into());
            }
            Ok(())
        }

        async fn connect(&mut self, _device: &Device) -> Result<(), MiniHubError> {
            Ok(())
        }

        async fn enumerate_entities(&mut self, _device: &Device) -> Result<Vec<Entity>, MiniHubError> {
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
            self.send_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn shutdown(&mut self, _device: &Device) -> Result<(), MiniHubError> {
            if let Some(order) = &self.shutdown_order {
                order.lock().await.push(self.name);
            }
            Ok(())
        }
    }

    fn device(protocol: Protocol, fingerprint: &str) -> Device {
        Device::builder()
            .protocol(protocol)
            .fingerprint(fingerprint)
            .name("fixture")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_initialize_all_adapters_even_if_one_fails() {
        let ok_calls = Arc::new(AtomicUsize::new(0));
        let failing_calls = Arc::new(AtomicUsize::new(0));
        let registry = AdapterRegistry::new(vec![
            (
                Protocol::Virtual,
                FakeAdapter {
                    name: "virtual",
                    init_calls: ok_calls.clone(),
                    ..Default::default()
                },
            ),
            (
                Protocol::Mqtt,
                FakeAdapter {
                    name: "mqtt",
                    init_calls: failing_calls.clone(),
                    fail_init: true,
                    ..Default::default()
                },
            ),
        ]);

        registry.initialize_all(&NoopContext).await;

        assert_eq!(ok_calls.load(Ordering::SeqCst), 1);
        assert_eq!(failing_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn should_route_command_to_the_adapter_matching_device_protocol() {
        let send_calls = Arc::new(AtomicUsize::new(0));
        let registry = AdapterRegistry::new(vec![(
            Protocol::Hue,
            FakeAdapter {
                name: "hue",
                send_calls: send_calls.clone(),
                ..Default::default()
            },
        )]);

        let device = device(Protocol::Hue, "bridge-1");
        let command = Command::builder().device_id(device.id).build().unwrap();

        registry.dispatch_command(&device, &command).await.unwrap();

        assert_eq!(send_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn should_return_not_found_when_no_adapter_registered_for_protocol() {
        let registry: AdapterRegistry<FakeAdapter> = AdapterRegistry::new(Vec::new());
        let device = device(Protocol::Esphome, "esp-1");
        let command = Command::builder().device_id(device.id).build().unwrap();

        let result = registry.dispatch_command(&device, &command).await;
        assert!(matches!(result, Err(MiniHubError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_shut_down_adapters_in_reverse_registration_order() {
        let order = Arc::new(AsyncMutex::new(Vec::new()));
        let registry = AdapterRegistry::new(vec![
            (
                Protocol::Virtual,
                FakeAdapter {
                    name: "virtual",
                    shutdown_order: Some(order.clone()),
                    ..Default::default()
                },
            ),
            (
                Protocol::Hue,
                FakeAdapter {
                    name: "hue",
                    shutdown_order: Some(order.clone()),
                    ..Default::default()
                },
            ),
        ]);

        let devices = vec![
            device(Protocol::Virtual, "v1"),
            device(Protocol::Hue, "h1"),
        ];
        registry.shutdown_all(&devices).await;

        let recorded = order.lock().await;
        assert_eq!(*recorded, vec!["hue", "virtual"]);
    }
}
