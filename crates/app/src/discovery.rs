//! Discovery manager — aggregates per-adapter discovery with the
//! protocol-agnostic mDNS browser, deduplicates by `(protocol, fingerprint)`,
//! and tracks device presence.
//!
//! Classifying ambiguous mDNS services (an HTTP service whose hostname hints
//! at a particular protocol) is the browser implementation's job, not this
//! manager's: the [`MdnsBrowser`] port already hands back typed
//! [`DiscoveredDevice`] values, so by the time they reach here every
//! descriptor already carries its resolved `protocol`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;

use minihub_domain::device::Protocol;
use minihub_domain::error::MiniHubError;
use minihub_domain::event::Event;
use minihub_domain::id::DeviceId;
use minihub_domain::time::Timestamp;

use crate::ports::adapter::{AdapterContext, DiscoveredDevice, ProtocolAdapter};
use crate::ports::discovery::MdnsBrowser;
use crate::ports::event_bus::EventPublisher;
use crate::registry::AdapterRegistry;

/// Default grace window: how long a device can go unseen before a
/// `device/lost` lifecycle event is published.
const DEFAULT_GRACE_WINDOW: Duration = Duration::from_secs(60);

struct Presence {
    device_id: DeviceId,
    last_seen: Timestamp,
    lost: bool,
}

/// Aggregates discovery across every protocol adapter plus the
/// protocol-agnostic mDNS browser.
pub struct DiscoveryManager<A, M, EP> {
    registry: Arc<AdapterRegistry<A>>,
    mdns: AsyncMutex<M>,
    publisher: EP,
    grace_window: Duration,
    presence: AsyncMutex<HashMap<(Protocol, String), Presence>>,
}

impl<A, M, EP> DiscoveryManager<A, M, EP>
where
    A: ProtocolAdapter,
    M: MdnsBrowser,
    EP: EventPublisher,
{
    /// Build a discovery manager over the given adapter registry and mDNS
    /// browser.
    #[must_use]
    pub fn new(registry: Arc<AdapterRegistry<A>>, mdns: M, publisher: EP) -> Self {
        Self {
            registry,
            mdns: AsyncMutex::new(mdns),
            publisher,
            grace_window: DEFAULT_GRACE_WINDOW,
            presence: AsyncMutex::new(HashMap::new()),
        }
    }

    /// Override the default 60s lost-device grace window.
    #[must_use]
    pub fn with_grace_window(mut self, window: Duration) -> Self {
        self.grace_window = window;
        self
    }

    /// Run one discovery pass: poll every adapter plus the mDNS browser,
    /// persist and announce devices seen for the first time, refresh
    /// `last_seen` for reappearing devices without re-announcing them, and
    /// publish `device/lost` for devices that have aged out of the grace
    /// window. Returns the devices discovered for the first time this pass.
    #[tracing::instrument(skip(self, ctx))]
    pub async fn poll_once(
        &self,
        ctx: &(impl AdapterContext + Clone),
    ) -> Result<Vec<DiscoveredDevice>, MiniHubError> {
        let mut batch = self.registry.discover_all(ctx).await;
        batch.extend(self.mdns.lock().await.poll_once().await?);

        let mut newly_found = Vec::new();
        let now = minihub_domain::time::now();
        let mut presence = self.presence.lock().await;

        for descriptor in batch {
            let key = (descriptor.device.protocol, descriptor.device.fingerprint.clone());
            if let Some(existing) = presence.get_mut(&key) {
                existing.last_seen = now;
                let was_lost = existing.lost;
                existing.lost = false;
                let persisted = ctx.upsert_device(descriptor.device.clone()).await?;
                if was_lost {
                    let _ = self
                        .publisher
                        .publish(Event::discovery_found(serde_json::json!({
                            "device_id": persisted.id,
                            "protocol": persisted.protocol.as_str(),
                            "fingerprint": persisted.fingerprint,
                        })))
                        .await;
                }
                continue;
            }

            let persisted = ctx.upsert_device(descriptor.device.clone()).await?;
            for entity in descriptor.entities.iter().cloned() {
                ctx.upsert_entity(entity).await?;
            }
            presence.insert(
                key,
                Presence {
                    device_id: persisted.id,
                    last_seen: now,
                    lost: false,
                },
            );
            let _ = self
                .publisher
                .publish(Event::discovery_found(serde_json::json!({
                    "device_id": persisted.id,
                    "protocol": persisted.protocol.as_str(),
                    "fingerprint": persisted.fingerprint,
                })))
                .await;
            newly_found.push(DiscoveredDevice {
                device: persisted,
                entities: descriptor.entities,
            });
        }

        for presence in presence.values_mut() {
            if presence.lost {
                continue;
            }
            let unseen_for = now.signed_duration_since(presence.last_seen);
            let grace = chrono::Duration::from_std(self.grace_window)
                .unwrap_or_else(|_| chrono::Duration::seconds(i64::MAX));
            if unseen_for > grace {
                presence.lost = true;
                let _ = self
                    .publisher
                    .publish(Event::device_lifecycle(
                        presence.device_id,
                        serde_json::json!({"event": "lost"}),
                    ))
                    .await;
            }
        }

        Ok(newly_found)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use minihub_domain::device::Device;
    use minihub_domain::entity::{Entity, EntityState};
    use minihub_domain::command::Command;

    use super::*;

    #[derive(Clone, Default)]
    struct RecordingContext {
        upserted: Arc<StdMutex<Vec<Device>>>,
    }

    impl AdapterContext for RecordingContext {
        async fn upsert_device(&self, device: Device) -> Result<Device, MiniHubError> {
            self.upserted.lock().unwrap().push(device.clone());
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
    struct FixedMdns {
        batches: StdMutex<Vec<Vec<DiscoveredDevice>>>,
    }

    impl MdnsBrowser for FixedMdns {
        async fn poll_once(&mut self) -> Result<Vec<DiscoveredDevice>, MiniHubError> {
            Ok(self.batches.lock().unwrap().pop().unwrap_or_default())
        }
    }

    #[derive(Default)]
    struct NoAdapters;

    impl ProtocolAdapter for NoAdapters {
        fn name(&self) -> &'static str {
            "noop"
        }

        async fn initialize(&mut self, _ctx: &impl AdapterContext) -> Result<(), MiniHubError> {
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

        async fn send_command(&mut self, _device: &Device, _command: &Command) -> Result<(), MiniHubError> {
            Ok(())
        }

        async fn shutdown(&mut self, _device: &Device) -> Result<(), MiniHubError> {
            Ok(())
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

    fn descriptor(fingerprint: &str) -> DiscoveredDevice {
        DiscoveredDevice {
            device: Device::builder()
                .protocol(Protocol::Hue)
                .fingerprint(fingerprint)
                .name("bridge")
                .build()
                .unwrap(),
            entities: Vec::new(),
        }
    }

    #[tokio::test]
    async fn should_persist_and_announce_a_device_seen_for_the_first_time() {
        let registry = Arc::new(AdapterRegistry::<NoAdapters>::new(Vec::new()));
        let mdns = FixedMdns {
            batches: StdMutex::new(vec![vec![descriptor("bridge-1")]]),
        };
        let publisher = SpyPublisher::default();
        let manager = DiscoveryManager::new(registry, mdns, publisher);
        let ctx = RecordingContext::default();

        let found = manager.poll_once(&ctx).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(ctx.upserted.lock().unwrap().len(), 1);
        let events = manager.publisher.events.lock().unwrap();
        assert_eq!(events.iter().filter(|e| e.topic == "discovery/found").count(), 1);
    }

    #[tokio::test]
    async fn should_not_reannounce_a_device_seen_again() {
        let registry = Arc::new(AdapterRegistry::<NoAdapters>::new(Vec::new()));
        let mdns = FixedMdns {
            batches: StdMutex::new(vec![vec![descriptor("bridge-1")], vec![descriptor("bridge-1")]]),
        };
        let publisher = SpyPublisher::default();
        let manager = DiscoveryManager::new(registry, mdns, publisher);
        let ctx = RecordingContext::default();

        manager.poll_once(&ctx).await.unwrap();
        let second = manager.poll_once(&ctx).await.unwrap();

        assert!(second.is_empty());
        let events = manager.publisher.events.lock().unwrap();
        assert_eq!(events.iter().filter(|e| e.topic == "discovery/found").count(), 1);
        assert_eq!(ctx.upserted.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn should_publish_device_lost_after_grace_window_elapses() {
        let registry = Arc::new(AdapterRegistry::<NoAdapters>::new(Vec::new()));
        let mdns = FixedMdns {
            batches: StdMutex::new(vec![vec![descriptor("bridge-1")]]),
        };
        let publisher = SpyPublisher::default();
        let manager = DiscoveryManager::new(registry, mdns, publisher)
            .with_grace_window(Duration::from_millis(0));
        let ctx = RecordingContext::default();

        manager.poll_once(&ctx).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        // second pass with nothing new reported by either source
        manager.mdns.lock().await.batches.lock().unwrap().push(Vec::new());
        manager.poll_once(&ctx).await.unwrap();

        let events = manager.publisher.events.lock().unwrap();
        assert!(events.iter().any(|e| e.topic.ends_with("/lifecycle")
            && e.payload["event"] == "lost"));
    }

    #[tokio::test]
    async fn should_reannounce_a_device_after_it_was_lost() {
        let registry = Arc::new(AdapterRegistry::<NoAdapters>::new(Vec::new()));
        let mdns = FixedMdns {
            batches: StdMutex::new(vec![vec![descriptor("bridge-1")]]),
        };
        let publisher = SpyPublisher::default();
        let manager = DiscoveryManager::new(registry, mdns, publisher)
            .with_grace_window(Duration::from_millis(0));
        let ctx = RecordingContext::default();

        manager.poll_once(&ctx).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        manager.mdns.lock().await.batches.lock().unwrap().push(Vec::new());
        manager.poll_once(&ctx).await.unwrap();
        {
            let events = manager.publisher.events.lock().unwrap();
            assert!(events.iter().any(|e| e.topic.ends_with("/lifecycle")
                && e.payload["event"] == "lost"));
        }

        manager.mdns.lock().await.batches.lock().unwrap().push(vec![descriptor("bridge-1")]);
        let found_again = manager.poll_once(&ctx).await.unwrap();

        assert!(found_again.is_empty());
        let events = manager.publisher.events.lock().unwrap();
        assert_eq!(events.iter().filter(|e| e.topic == "discovery/found").count(), 2);
    }
}
