//! # minihub-adapter-esphome
//!
//! ESPHome adapter — speaks the native API over a plain TCP connection: a
//! plaintext Hello/Connect handshake, a `DeviceInfo` query, a `ListEntities*`
//! enumeration pass, then `SubscribeStates` for a continuous stream of state
//! frames pushed by the device.
//!
//! Each device gets its own TCP connection, opened in [`connect`](ProtocolAdapter::connect)
//! and torn down in [`shutdown`](ProtocolAdapter::shutdown). `discover` is a
//! no-op here: finding ESPHome devices on the network is the mDNS browser's
//! job, not this adapter's — it only ever sees devices the discovery manager
//! has already classified as `esphome`.
//!
//! ## Dependency rule
//!
//! Depends on `minihub-app` (port traits) and `minihub-domain` only, plus
//! `tokio`/`tokio-util`/`bytes`/`futures` for the framed TCP connection.

mod codec;
pub mod config;
mod error;
pub mod proto;

pub use config::EsphomeConfig;
pub use error::EsphomeError;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};

use minihub_app::ports::adapter::{AdapterContext, ProtocolAdapter};
use minihub_domain::command::{CapabilityTag, Command};
use minihub_domain::device::Device;
use minihub_domain::entity::{
    AttributeValue, CapabilityDescriptor, DriverKey, Entity, EntityKind, EntityState,
};
use minihub_domain::error::{MiniHubError, NotFoundError, ValidationError};
use minihub_domain::id::{DeviceId, EntityId};
use minihub_domain::time::now;

use codec::{EsphomeCodec, Frame};
use proto::{message_type as mt, ListedEntity, ListedEntityKind, StateUpdate};

type Reader = FramedRead<OwnedReadHalf, EsphomeCodec>;
type Writer = FramedWrite<OwnedWriteHalf, EsphomeCodec>;
type SharedWriter = Arc<tokio::sync::Mutex<Writer>>;

struct Connection {
    reader: Option<Reader>,
    writer: SharedWriter,
    /// Driver key -> entity, populated by `enumerate_entities`.
    entities: Arc<Mutex<HashMap<u32, Entity>>>,
    /// Entity id -> (driver key, kind), for routing outgoing commands.
    routing: Arc<Mutex<HashMap<EntityId, (u32, EntityKind)>>>,
    reader_task: Option<tokio::task::JoinHandle<()>>,
}

/// ESPHome protocol adapter.
#[derive(Default)]
pub struct EsphomeAdapter {
    config: EsphomeConfig,
    connections: HashMap<DeviceId, Connection>,
}

impl EsphomeAdapter {
    #[must_use]
    pub fn new(config: EsphomeConfig) -> Self {
        Self {
            config,
            connections: HashMap::new(),
        }
    }

    fn connection(&self, device_id: DeviceId) -> Result<&Connection, MiniHubError> {
        self.connections.get(&device_id).ok_or_else(|| {
            NotFoundError {
                entity: "Device",
                id: device_id.to_string(),
            }
            .into()
        })
    }

    async fn write_frame(writer: &SharedWriter, frame: Frame) -> Result<(), EsphomeError> {
        let mut guard = writer.lock().await;
        guard.send(frame).await
    }

    async fn read_frame(reader: &mut Reader, deadline: Duration) -> Result<Frame, EsphomeError> {
        match timeout(deadline, reader.next()).await {
            Ok(Some(frame)) => frame,
            Ok(None) => Err(EsphomeError::Protocol("connection closed".to_string())),
            Err(_) => Err(EsphomeError::Timeout),
        }
    }

    async fn handshake(
        reader: &mut Reader,
        writer: &SharedWriter,
        config: &EsphomeConfig,
    ) -> Result<(), EsphomeError> {
        let deadline = Duration::from_secs(u64::from(config.connect_timeout_secs));

        Self::write_frame(writer, Frame::new(mt::HELLO_REQUEST, proto::hello_request("minihub"))).await?;
        let hello = Self::read_frame(reader, deadline).await?;
        if hello.message_type != mt::HELLO_RESPONSE {
            return Err(EsphomeError::Protocol(
                "expected HelloResponse during handshake".to_string(),
            ));
        }

        let password = config.password.as_deref().unwrap_or("");
        Self::write_frame(writer, Frame::new(mt::CONNECT_REQUEST, proto::connect_request(password))).await?;
        let connect = Self::read_frame(reader, deadline).await?;
        if connect.message_type != mt::CONNECT_RESPONSE {
            return Err(EsphomeError::Protocol(
                "expected ConnectResponse during handshake".to_string(),
            ));
        }
        if proto::is_connect_response_invalid(&connect.payload) {
            return Err(EsphomeError::InvalidPassword);
        }

        Ok(())
    }

    fn entity_kind_and_descriptor(kind: ListedEntityKind, unit: &str) -> (EntityKind, CapabilityDescriptor) {
        match kind {
            ListedEntityKind::BinarySensor => (EntityKind::BinarySensor, CapabilityDescriptor::default()),
            ListedEntityKind::Sensor => {
                let mut capability = CapabilityDescriptor::default();
                if !unit.is_empty() {
                    capability = capability.with_unit_of_measurement(unit);
                }
                (EntityKind::Sensor, capability)
            }
            ListedEntityKind::Switch => (
                EntityKind::Switch,
                CapabilityDescriptor::default().with_feature("on_off"),
            ),
            ListedEntityKind::Light => (
                EntityKind::Light,
                CapabilityDescriptor::default()
                    .with_feature("on_off")
                    .with_feature("brightness")
                    .with_range("brightness", 0.0, 1.0),
            ),
        }
    }

    fn build_entity(device_id: DeviceId, listed: &ListedEntity) -> Result<Entity, MiniHubError> {
        let (kind, capability) = Self::entity_kind_and_descriptor(listed.kind, &listed.unit_of_measurement);
        let friendly_name = if listed.name.is_empty() {
            listed.object_id.clone()
        } else {
            listed.name.clone()
        };
        Entity::builder()
            .id(EntityId::new())
            .device_id(device_id)
            .driver_key(DriverKey::Index(listed.key))
            .kind(kind)
            .capability(capability)
            .friendly_name(friendly_name)
            .build()
    }

    fn state_from_update(entity_id: EntityId, update: &StateUpdate) -> EntityState {
        match update.kind {
            ListedEntityKind::BinarySensor | ListedEntityKind::Switch => {
                EntityState::new(entity_id, serde_json::json!(update.bool_state), now())
            }
            ListedEntityKind::Sensor => {
                EntityState::new(entity_id, serde_json::json!(update.float_state), now())
            }
            ListedEntityKind::Light => {
                let mut attributes = std::collections::HashMap::new();
                if let Some(brightness) = update.brightness {
                    attributes.insert(
                        "brightness".to_string(),
                        AttributeValue::Float(f64::from(brightness)),
                    );
                }
                EntityState::new(entity_id, serde_json::json!(update.bool_state), now())
                    .with_attributes(attributes)
            }
        }
    }

    /// Background task that drains state/ping frames for as long as the
    /// connection stays open, applying each state update and answering the
    /// device's keepalive pings.
    async fn reader_loop(
        mut reader: Reader,
        writer: SharedWriter,
        entities: Arc<Mutex<HashMap<u32, Entity>>>,
        session_timeout: Duration,
        ctx: impl AdapterContext + Clone + 'static,
    ) {
        loop {
            let frame = match timeout(session_timeout, reader.next()).await {
                Ok(Some(Ok(frame))) => frame,
                Ok(Some(Err(err))) => {
                    tracing::warn!(%err, "ESPHome frame decode error, closing session");
                    break;
                }
                Ok(None) => {
                    tracing::debug!("ESPHome connection closed by device");
                    break;
                }
                Err(_) => {
                    tracing::warn!("ESPHome session timed out waiting for a frame");
                    break;
                }
            };

            let kind = match frame.message_type {
                mt::BINARY_SENSOR_STATE_RESPONSE => Some(ListedEntityKind::BinarySensor),
                mt::SENSOR_STATE_RESPONSE => Some(ListedEntityKind::Sensor),
                mt::SWITCH_STATE_RESPONSE => Some(ListedEntityKind::Switch),
                mt::LIGHT_STATE_RESPONSE => Some(ListedEntityKind::Light),
                mt::PING_REQUEST => {
                    let _ = Self::write_frame(&writer, Frame::new(mt::PING_RESPONSE, proto::empty())).await;
                    None
                }
                mt::DISCONNECT_REQUEST => {
                    tracing::debug!("ESPHome device requested disconnect");
                    break;
                }
                _ => None,
            };

            let Some(kind) = kind else { continue };
            let Some(update) = StateUpdate::decode(kind, &frame.payload) else {
                continue;
            };
            let entity = entities
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&update.key)
                .cloned();
            let Some(entity) = entity else {
                tracing::debug!(key = update.key, "state update for unknown entity key");
                continue;
            };
            let state = Self::state_from_update(entity.id, &update);
            if let Err(err) = ctx.apply_state(state).await {
                tracing::warn!(%err, "failed to apply ESPHome state update");
            }
        }
    }
}

impl ProtocolAdapter for EsphomeAdapter {
    fn name(&self) -> &'static str {
        "esphome"
    }

    async fn initialize(&mut self, _ctx: &impl AdapterContext) -> Result<(), MiniHubError> {
        Ok(())
    }

    async fn connect(&mut self, device: &Device) -> Result<(), MiniHubError> {
        let host = device.address.as_deref().ok_or_else(|| {
            EsphomeError::Protocol("device has no network address".to_string())
        }).map_err(EsphomeError::into_domain)?;
        let port = device.port.unwrap_or(6053);
        let addr = format!("{host}:{port}");
        let connect_deadline = Duration::from_secs(u64::from(self.config.connect_timeout_secs));
        let stream = timeout(connect_deadline, TcpStream::connect(&addr))
            .await
            .map_err(|_| EsphomeError::Timeout)
            .map_err(EsphomeError::into_domain)?
            .map_err(EsphomeError::Io)
            .map_err(EsphomeError::into_domain)?;

        let (read_half, write_half) = stream.into_split();
        let mut reader = FramedRead::new(read_half, EsphomeCodec);
        let writer: SharedWriter = Arc::new(tokio::sync::Mutex::new(FramedWrite::new(write_half, EsphomeCodec)));

        Self::handshake(&mut reader, &writer, &self.config)
            .await
            .map_err(EsphomeError::into_domain)?;

        Self::write_frame(&writer, Frame::new(mt::DEVICE_INFO_REQUEST, proto::empty()))
            .await
            .map_err(EsphomeError::into_domain)?;
        let info = Self::read_frame(&mut reader, connect_deadline)
            .await
            .map_err(EsphomeError::into_domain)?;
        if info.message_type == mt::DEVICE_INFO_RESPONSE {
            let (name, mac, model, manufacturer, version) = proto::decode_device_info(&info.payload);
            tracing::info!(%name, %mac, %model, %manufacturer, %version, "connected to ESPHome device");
        }

        self.connections.insert(
            device.id,
            Connection {
                reader: Some(reader),
                writer,
                entities: Arc::new(Mutex::new(HashMap::new())),
                routing: Arc::new(Mutex::new(HashMap::new())),
                reader_task: None,
            },
        );
        Ok(())
    }

    async fn enumerate_entities(&mut self, device: &Device) -> Result<Vec<Entity>, MiniHubError> {
        let deadline = Duration::from_secs(u64::from(self.config.connect_timeout_secs));

        let (mut reader, writer) = {
            let conn = self.connections.get_mut(&device.id).ok_or_else(|| NotFoundError {
                entity: "Device",
                id: device.id.to_string(),
            })?;
            let reader = conn
                .reader
                .take()
                .ok_or_else(|| EsphomeError::NotConnected)
                .map_err(EsphomeError::into_domain)?;
            (reader, Arc::clone(&conn.writer))
        };

        Self::write_frame(&writer, Frame::new(mt::LIST_ENTITIES_REQUEST, proto::empty()))
            .await
            .map_err(EsphomeError::into_domain)?;

        let mut entities = Vec::new();
        let mut listed = Vec::new();
        loop {
            let frame = Self::read_frame(&mut reader, deadline)
                .await
                .map_err(EsphomeError::into_domain)?;
            let kind = match frame.message_type {
                mt::LIST_ENTITIES_BINARY_SENSOR_RESPONSE => Some(ListedEntityKind::BinarySensor),
                mt::LIST_ENTITIES_SENSOR_RESPONSE => Some(ListedEntityKind::Sensor),
                mt::LIST_ENTITIES_SWITCH_RESPONSE => Some(ListedEntityKind::Switch),
                mt::LIST_ENTITIES_LIGHT_RESPONSE => Some(ListedEntityKind::Light),
                mt::LIST_ENTITIES_DONE_RESPONSE => break,
                _ => None,
            };
            if let Some(kind) = kind {
                if let Some(le) = ListedEntity::decode(kind, &frame.payload) {
                    listed.push(le);
                }
            }
        }

        let conn = self.connections.get_mut(&device.id).ok_or_else(|| NotFoundError {
            entity: "Device",
            id: device.id.to_string(),
        })?;
        conn.reader = Some(reader);

        {
            let mut entity_map = conn.entities.lock().unwrap_or_else(PoisonError::into_inner);
            let mut routing = conn.routing.lock().unwrap_or_else(PoisonError::into_inner);
            for le in &listed {
                let entity = Self::build_entity(device.id, le)?;
                routing.insert(entity.id, (le.key, entity.kind));
                entity_map.insert(le.key, entity.clone());
                entities.push(entity);
            }
        }

        Ok(entities)
    }

    async fn subscribe_state(
        &mut self,
        device: &Device,
        ctx: impl AdapterContext + Clone + 'static,
    ) -> Result<(), MiniHubError> {
        let conn = self.connections.get_mut(&device.id).ok_or_else(|| NotFoundError {
            entity: "Device",
            id: device.id.to_string(),
        })?;
        let reader = conn
            .reader
            .take()
            .ok_or_else(|| EsphomeError::NotConnected)
            .map_err(EsphomeError::into_domain)?;
        let writer = Arc::clone(&conn.writer);

        Self::write_frame(&writer, Frame::new(mt::SUBSCRIBE_STATES_REQUEST, proto::empty()))
            .await
            .map_err(EsphomeError::into_domain)?;

        let entities = Arc::clone(&conn.entities);
        let session_timeout = Duration::from_secs(u64::from(self.config.session_timeout_secs));
        conn.reader_task = Some(tokio::spawn(Self::reader_loop(
            reader,
            writer,
            entities,
            session_timeout,
            ctx,
        )));
        Ok(())
    }

    async fn send_command(&mut self, device: &Device, command: &Command) -> Result<(), MiniHubError> {
        let entity_id = command.entity_id.ok_or_else(|| {
            MiniHubError::from(NotFoundError {
                entity: "Entity",
                id: "<missing>".to_string(),
            })
        })?;

        let conn = self.connection(device.id)?;
        let (key, kind) = {
            let routing = conn.routing.lock().unwrap_or_else(PoisonError::into_inner);
            *routing.get(&entity_id).ok_or_else(|| NotFoundError {
                entity: "Entity",
                id: entity_id.to_string(),
            })?
        };

        let frame = match (kind, command.capability) {
            (EntityKind::Switch, CapabilityTag::OnOff) => {
                let state = command.value.as_bool().unwrap_or(false);
                Frame::new(mt::SWITCH_COMMAND_REQUEST, proto::switch_command(key, state))
            }
            (EntityKind::Light, CapabilityTag::OnOff) => {
                let state = command.value.as_bool().unwrap_or(false);
                Frame::new(mt::LIGHT_COMMAND_REQUEST, proto::light_command(key, Some(state), None))
            }
            (EntityKind::Light, CapabilityTag::Brightness) => {
                let brightness = command.value.as_f64().unwrap_or(0.0) as f32;
                Frame::new(
                    mt::LIGHT_COMMAND_REQUEST,
                    proto::light_command(key, Some(true), Some(brightness)),
                )
            }
            _ => {
                return Err(ValidationError::UnknownCapability(command.capability.to_string()).into());
            }
        };

        Self::write_frame(&conn.writer, frame)
            .await
            .map_err(EsphomeError::into_domain)
    }

    async fn shutdown(&mut self, device: &Device) -> Result<(), MiniHubError> {
        if let Some(conn) = self.connections.remove(&device.id) {
            if let Some(task) = conn.reader_task {
                task.abort();
            }
            let _ = Self::write_frame(
                &conn.writer,
                Frame::new(mt::DISCONNECT_REQUEST, proto::empty()),
            )
            .await;
            tracing::info!(device = %device.name, "ESPHome connection closed");
        }
        Ok(())
    }
}
