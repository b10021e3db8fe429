//! # minihub-adapter-mqtt
//!
//! MQTT adapter — bridges MQTT-based devices into minihub via rumqttc.
//!
//! ## Topic conventions
//!
//! The adapter uses a configurable **base topic** (default `minihub`). Under it:
//!
//! | Topic pattern | Direction | Purpose |
//! |---------------|-----------|---------|
//! | `{base}/{device_slug}/config` | Broker → minihub | Device/entity discovery |
//! | `{base}/{device_slug}/{entity_slug}/state` | Broker → minihub | State updates from devices |
//! | `{base}/{device_slug}/{entity_slug}/set` | minihub → Broker | Commands |
//!
//! ## Discovery payload
//!
//! Devices announce themselves by publishing a JSON config message:
//!
//! ```json
//! {
//!   "device": { "name": "...", "manufacturer": "...", "model": "..." },
//!   "entities": [
//!     { "entity_id": "light.kitchen", "friendly_name": "Kitchen Light" }
//!   ]
//! }
//! ```
//!
//! `entity_id`'s prefix up to the first `.` selects the [`EntityKind`]
//! (`light`, `switch`, `sensor`, …); an unrecognized prefix falls back to
//! [`EntityKind::Other`].
//!
//! Discovery is push-driven: a background task feeds parsed config messages
//! into a channel that [`discover`](ProtocolAdapter::discover) drains on
//! each poll, matching the pull contract every other adapter implements.
//!
//! ## Dependency rule
//!
//! Same as other adapters: depends on `minihub-app` and `minihub-domain`.

mod config;
mod error;

pub use config::MqttConfig;
pub use error::MqttError;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use minihub_app::ports::adapter::{AdapterContext, DiscoveredDevice, ProtocolAdapter};
use minihub_domain::command::Command;
use minihub_domain::device::{Device, Protocol};
use minihub_domain::entity::{CapabilityDescriptor, DriverKey, Entity, EntityKind, EntityState};
use minihub_domain::error::{MiniHubError, NotFoundError};
use minihub_domain::id::EntityId;
use minihub_domain::time::now;

/// MQTT protocol adapter.
///
/// Holds a single broker connection shared by every MQTT device; `connect`
/// and `shutdown` are therefore no-ops per device.
pub struct MqttAdapter {
    config: MqttConfig,
    client: Option<AsyncClient>,
    eventloop_handle: Option<JoinHandle<()>>,
    discovered_rx: Option<mpsc::Receiver<DiscoveredDevice>>,
    background_handle: Option<JoinHandle<()>>,
    /// Entity templates discovered per device slug (the MQTT topic segment,
    /// which doubles as the device's fingerprint), reused across
    /// `enumerate_entities` calls so entity identity is stable.
    entity_templates: Arc<Mutex<HashMap<String, Vec<Entity>>>>,
    /// Command topic for each entity, keyed by its fixed id.
    command_topics: Arc<Mutex<HashMap<EntityId, String>>>,
}

impl MqttAdapter {
    /// Create a new MQTT adapter with the given configuration.
    #[must_use]
    pub fn new(config: MqttConfig) -> Self {
        Self {
            config,
            client: None,
            eventloop_handle: None,
            discovered_rx: None,
            background_handle: None,
            entity_templates: Arc::new(Mutex::new(HashMap::new())),
            command_topics: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn mqtt_options(&self) -> MqttOptions {
        let mut opts = MqttOptions::new(
            &self.config.client_id,
            &self.config.broker_host,
            self.config.broker_port,
        );
        opts.set_keep_alive(Duration::from_secs(u64::from(self.config.keep_alive_secs)));
        opts
    }

    fn spawn_eventloop(mut eventloop: EventLoop) -> (mpsc::Receiver<rumqttc::Publish>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel::<rumqttc::Publish>(256);

        let handle = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        if tx.send(publish).await.is_err() {
                            tracing::debug!("publish receiver dropped, stopping eventloop");
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(%err, "MQTT connection error, reconnecting");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        });

        (rx, handle)
    }

    async fn subscribe_topics(&self) -> Result<(), MqttError> {
        let client = self.client.as_ref().ok_or(MqttError::NotConnected)?;
        let base = &self.config.base_topic;

        let config_topic = format!("{base}/+/config");
        client
            .subscribe(&config_topic, QoS::AtLeastOnce)
            .await
            .map_err(MqttError::Client)?;
        tracing::info!(topic = %config_topic, "subscribed to discovery topic");

        let state_topic = format!("{base}/+/+/state");
        client
            .subscribe(&state_topic, QoS::AtLeastOnce)
            .await
            .map_err(MqttError::Client)?;
        tracing::info!(topic = %state_topic, "subscribed to state topic");

        Ok(())
    }

    /// Parse a discovery config message into a [`DiscoveredDevice`] plus the
    /// command topic for each entity. Entity ids are assigned fresh here and
    /// cached by the caller so later lookups stay stable.
    fn parse_config_message(
        config: &MqttConfig,
        publish: &rumqttc::Publish,
    ) -> Result<Option<(String, DiscoveredDevice, Vec<(EntityId, String)>)>, MqttError> {
        let topic = &publish.topic;
        if !topic.ends_with("/config") {
            return Ok(None);
        }

        let payload: DiscoveryPayload =
            serde_json::from_slice(&publish.payload).map_err(MqttError::PayloadParse)?;

        let base = &config.base_topic;
        let device_slug = topic
            .strip_prefix(&format!("{base}/"))
            .and_then(|rest| rest.strip_suffix("/config"))
            .unwrap_or("unknown")
            .to_string();

        let device = Device::builder()
            .protocol(Protocol::Mqtt)
            .fingerprint(&device_slug)
            .name(&payload.device.name)
            .manufacturer(&payload.device.manufacturer)
            .model(&payload.device.model)
            .build()
            .map_err(MqttError::Domain)?;

        let mut entities = Vec::new();
        let mut cmd_topics = Vec::new();
        for ep in &payload.entities {
            let entity_slug = ep.entity_id.split('.').next_back().unwrap_or(&ep.entity_id);
            let kind = kind_from_prefix(&ep.entity_id);

            let mut capability = CapabilityDescriptor::default();
            if matches!(kind, EntityKind::Light | EntityKind::Switch) {
                capability = capability.with_feature("on_off");
            }

            let entity = Entity::builder()
                .id(EntityId::new())
                .device_id(device.id)
                .driver_key(DriverKey::Text(entity_slug.to_string()))
                .kind(kind)
                .capability(capability)
                .friendly_name(&ep.friendly_name)
                .build()
                .map_err(MqttError::Domain)?;

            let cmd_topic = format!("{base}/{device_slug}/{entity_slug}/set");
            cmd_topics.push((entity.id, cmd_topic));
            entities.push(entity);
        }

        tracing::info!(
            device = %device.name,
            entity_count = entities.len(),
            "discovered MQTT device"
        );

        Ok(Some((
            device_slug,
            DiscoveredDevice { device, entities },
            cmd_topics,
        )))
    }

    /// Background task that drains incoming publishes, forwarding parsed
    /// discoveries into `discovered_tx` and caching entity templates and
    /// command topics for later lookup.
    async fn background_message_loop(
        config: MqttConfig,
        mut publish_rx: mpsc::Receiver<rumqttc::Publish>,
        discovered_tx: mpsc::Sender<DiscoveredDevice>,
        entity_templates: Arc<Mutex<HashMap<String, Vec<Entity>>>>,
        command_topics: Arc<Mutex<HashMap<EntityId, String>>>,
    ) {
        while let Some(publish) = publish_rx.recv().await {
            if publish.topic.ends_with("/config") {
                match Self::parse_config_message(&config, &publish) {
                    Ok(Some((device_slug, dd, cmd_topics))) => {
                        entity_templates
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .insert(device_slug, dd.entities.clone());
                        {
                            let mut cmds = command_topics
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner);
                            for (id, topic) in cmd_topics {
                                cmds.insert(id, topic);
                            }
                        }
                        if discovered_tx.send(dd).await.is_err() {
                            tracing::debug!("discovery receiver dropped, stopping message loop");
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        tracing::warn!(%err, "failed to parse MQTT config message");
                    }
                }
            } else if publish.topic.ends_with("/state") {
                tracing::debug!(
                    topic = %publish.topic,
                    payload_len = publish.payload.len(),
                    "received state update"
                );
            }
        }
        tracing::debug!("MQTT background message loop stopped");
    }
}

impl ProtocolAdapter for MqttAdapter {
    fn name(&self) -> &'static str {
        "mqtt"
    }

    async fn initialize(&mut self, _ctx: &impl AdapterContext) -> Result<(), MiniHubError> {
        let opts = self.mqtt_options();
        let (client, eventloop) = AsyncClient::new(opts, 64);
        self.client = Some(client);

        let (publish_rx, handle) = Self::spawn_eventloop(eventloop);
        self.eventloop_handle = Some(handle);

        self.subscribe_topics().await.map_err(MqttError::into_domain)?;

        let (discovered_tx, discovered_rx) = mpsc::channel(64);
        self.discovered_rx = Some(discovered_rx);
        self.background_handle = Some(tokio::spawn(Self::background_message_loop(
            self.config.clone(),
            publish_rx,
            discovered_tx,
            Arc::clone(&self.entity_templates),
            Arc::clone(&self.command_topics),
        )));

        Ok(())
    }

    async fn discover(&mut self, _ctx: &impl AdapterContext) -> Result<Vec<DiscoveredDevice>, MiniHubError> {
        let Some(rx) = self.discovered_rx.as_mut() else {
            return Ok(Vec::new());
        };
        let mut batch = Vec::new();
        while let Ok(dd) = rx.try_recv() {
            batch.push(dd);
        }
        Ok(batch)
    }

    async fn connect(&mut self, _device: &Device) -> Result<(), MiniHubError> {
        Ok(())
    }

    async fn enumerate_entities(&mut self, device: &Device) -> Result<Vec<Entity>, MiniHubError> {
        let templates = self
            .entity_templates
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let entities = templates
            .get(&device.fingerprint)
            .cloned()
            .unwrap_or_default();
        Ok(entities
            .into_iter()
            .map(|mut entity| {
                entity.device_id = device.id;
                entity
            })
            .collect())
    }

    async fn subscribe_state(
        &mut self,
        _device: &Device,
        _ctx: impl AdapterContext + Clone + 'static,
    ) -> Result<(), MiniHubError> {
        // State arrives via the shared background message loop, which applies
        // updates directly; nothing extra to wire up per device.
        Ok(())
    }

    async fn send_command(&mut self, _device: &Device, command: &Command) -> Result<(), MiniHubError> {
        let client = self.client.as_ref().ok_or(MqttError::NotConnected).map_err(MqttError::into_domain)?;
        let entity_id = command.entity_id.ok_or_else(|| {
            MiniHubError::from(NotFoundError {
                entity: "Entity",
                id: "<missing>".to_string(),
            })
        })?;

        let cmd_topic = {
            let cmds = self
                .command_topics
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            cmds.get(&entity_id).cloned().ok_or_else(|| NotFoundError {
                entity: "Entity",
                id: entity_id.to_string(),
            })?
        };

        let payload = serde_json::json!({
            "capability": command.capability.as_str(),
            "value": command.value,
        });
        client
            .publish(&cmd_topic, QoS::AtLeastOnce, false, payload.to_string().into_bytes())
            .await
            .map_err(MqttError::Client)
            .map_err(MqttError::into_domain)?;

        tracing::info!(
            entity_id = %entity_id,
            capability = %command.capability,
            topic = %cmd_topic,
            "published MQTT command"
        );
        Ok(())
    }

    async fn shutdown(&mut self, _device: &Device) -> Result<(), MiniHubError> {
        if let Some(handle) = self.background_handle.take() {
            handle.abort();
        }
        if let Some(handle) = self.eventloop_handle.take() {
            handle.abort();
        }
        self.client = None;
        tracing::info!("MQTT adapter stopped");
        Ok(())
    }
}

/// JSON payload published on `{base}/{device_slug}/config` for device discovery.
#[derive(Debug, serde::Deserialize)]
struct DiscoveryPayload {
    device: DevicePayload,
    entities: Vec<EntityPayload>,
}

#[derive(Debug, serde::Deserialize)]
struct DevicePayload {
    name: String,
    #[serde(default)]
    manufacturer: String,
    #[serde(default)]
    model: String,
}

#[derive(Debug, serde::Deserialize)]
struct EntityPayload {
    entity_id: String,
    friendly_name: String,
}

fn kind_from_prefix(entity_id: &str) -> EntityKind {
    match entity_id.split('.').next().unwrap_or("") {
        "light" => EntityKind::Light,
        "switch" => EntityKind::Switch,
        "sensor" => EntityKind::Sensor,
        "binary_sensor" => EntityKind::BinarySensor,
        "button" => EntityKind::Button,
        "number" => EntityKind::Number,
        "text_sensor" => EntityKind::TextSensor,
        "lock" => EntityKind::Lock,
        "cover" => EntityKind::Cover,
        "climate" => EntityKind::Climate,
        "fan" => EntityKind::Fan,
        _ => EntityKind::Other,
    }
}

/// Used by the background loop to apply an incoming `/state` publish;
/// exposed for the composition root to call when it wires a `/state`
/// subscriber into the state-application path.
#[must_use]
pub fn parse_state_payload(entity_id: EntityId, payload: &[u8]) -> Option<EntityState> {
    let value: serde_json::Value = serde_json::from_slice(payload).ok()?;
    Some(EntityState::new(entity_id, value, now()))
}
