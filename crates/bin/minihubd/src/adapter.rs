//! Concrete adapter dispatch type.
//!
//! [`minihub_app::registry::AdapterRegistry`] is generic over a single
//! adapter type because [`ProtocolAdapter::subscribe_state`] takes a generic
//! `ctx` parameter, which makes the trait not object-safe. `Adapter` is the
//! concrete type the composition root instantiates the registry with: one
//! variant per protocol, each method matching on `self` and forwarding to
//! the real adapter.

use minihub_app::ports::adapter::{AdapterContext, DiscoveredDevice, ProtocolAdapter};
use minihub_domain::command::Command;
use minihub_domain::device::Device;
use minihub_domain::entity::Entity;
use minihub_domain::error::MiniHubError;

use minihub_adapter_ble::BleAdapter;
use minihub_adapter_esphome::EsphomeAdapter;
use minihub_adapter_hue::HueAdapter;
use minihub_adapter_mqtt::MqttAdapter;
use minihub_adapter_storage_sqlite_sqlx::SqliteCredentialRepository;
use minihub_adapter_virtual::VirtualAdapter;

/// One variant per supported protocol, wrapping that protocol's adapter.
pub enum Adapter {
    Esphome(EsphomeAdapter),
    Hue(Box<HueAdapter<SqliteCredentialRepository>>),
    Mqtt(MqttAdapter),
    Ble(BleAdapter),
    Virtual(VirtualAdapter),
}

impl ProtocolAdapter for Adapter {
    fn name(&self) -> &'static str {
        match self {
            Self::Esphome(adapter) => adapter.name(),
            Self::Hue(adapter) => adapter.name(),
            Self::Mqtt(adapter) => adapter.name(),
            Self::Ble(adapter) => adapter.name(),
            Self::Virtual(adapter) => adapter.name(),
        }
    }

    async fn initialize(&mut self, ctx: &impl AdapterContext) -> Result<(), MiniHubError> {
        match self {
            Self::Esphome(adapter) => adapter.initialize(ctx).await,
            Self::Hue(adapter) => adapter.initialize(ctx).await,
            Self::Mqtt(adapter) => adapter.initialize(ctx).await,
            Self::Ble(adapter) => adapter.initialize(ctx).await,
            Self::Virtual(adapter) => adapter.initialize(ctx).await,
        }
    }

    async fn discover(
        &mut self,
        ctx: &impl AdapterContext,
    ) -> Result<Vec<DiscoveredDevice>, MiniHubError> {
        match self {
            Self::Esphome(adapter) => adapter.discover(ctx).await,
            Self::Hue(adapter) => adapter.discover(ctx).await,
            Self::Mqtt(adapter) => adapter.discover(ctx).await,
            Self::Ble(adapter) => adapter.discover(ctx).await,
            Self::Virtual(adapter) => adapter.discover(ctx).await,
        }
    }

    async fn connect(&mut self, device: &Device) -> Result<(), MiniHubError> {
        match self {
            Self::Esphome(adapter) => adapter.connect(device).await,
            Self::Hue(adapter) => adapter.connect(device).await,
            Self::Mqtt(adapter) => adapter.connect(device).await,
            Self::Ble(adapter) => adapter.connect(device).await,
            Self::Virtual(adapter) => adapter.connect(device).await,
        }
    }

    async fn pair(
        &mut self,
        device: &Device,
        ctx: &impl AdapterContext,
    ) -> Result<(), MiniHubError> {
        match self {
            Self::Esphome(adapter) => adapter.pair(device, ctx).await,
            Self::Hue(adapter) => adapter.pair(device, ctx).await,
            Self::Mqtt(adapter) => adapter.pair(device, ctx).await,
            Self::Ble(adapter) => adapter.pair(device, ctx).await,
            Self::Virtual(adapter) => adapter.pair(device, ctx).await,
        }
    }

    async fn enumerate_entities(&mut self, device: &Device) -> Result<Vec<Entity>, MiniHubError> {
        match self {
            Self::Esphome(adapter) => adapter.enumerate_entities(device).await,
            Self::Hue(adapter) => adapter.enumerate_entities(device).await,
            Self::Mqtt(adapter) => adapter.enumerate_entities(device).await,
            Self::Ble(adapter) => adapter.enumerate_entities(device).await,
            Self::Virtual(adapter) => adapter.enumerate_entities(device).await,
        }
    }

    async fn subscribe_state(
        &mut self,
        device: &Device,
        ctx: impl AdapterContext + Clone + 'static,
    ) -> Result<(), MiniHubError> {
        match self {
            Self::Esphome(adapter) => adapter.subscribe_state(device, ctx).await,
            Self::Hue(adapter) => adapter.subscribe_state(device, ctx).await,
            Self::Mqtt(adapter) => adapter.subscribe_state(device, ctx).await,
            Self::Ble(adapter) => adapter.subscribe_state(device, ctx).await,
            Self::Virtual(adapter) => adapter.subscribe_state(device, ctx).await,
        }
    }

    async fn send_command(&mut self, device: &Device, command: &Command) -> Result<(), MiniHubError> {
        match self {
            Self::Esphome(adapter) => adapter.send_command(device, command).await,
            Self::Hue(adapter) => adapter.send_command(device, command).await,
            Self::Mqtt(adapter) => adapter.send_command(device, command).await,
            Self::Ble(adapter) => adapter.send_command(device, command).await,
            Self::Virtual(adapter) => adapter.send_command(device, command).await,
        }
    }

    async fn poll_state(
        &mut self,
        device: &Device,
        ctx: &impl AdapterContext,
    ) -> Result<(), MiniHubError> {
        match self {
            Self::Esphome(adapter) => adapter.poll_state(device, ctx).await,
            Self::Hue(adapter) => adapter.poll_state(device, ctx).await,
            Self::Mqtt(adapter) => adapter.poll_state(device, ctx).await,
            Self::Ble(adapter) => adapter.poll_state(device, ctx).await,
            Self::Virtual(adapter) => adapter.poll_state(device, ctx).await,
        }
    }

    async fn shutdown(&mut self, device: &Device) -> Result<(), MiniHubError> {
        match self {
            Self::Esphome(adapter) => adapter.shutdown(device).await,
            Self::Hue(adapter) => adapter.shutdown(device).await,
            Self::Mqtt(adapter) => adapter.shutdown(device).await,
            Self::Ble(adapter) => adapter.shutdown(device).await,
            Self::Virtual(adapter) => adapter.shutdown(device).await,
        }
    }
}
