//! Protocol adapter port — the uniform contract every protocol driver
//! (ESPHome, Hue, MQTT, BLE, virtual) implements.
//!
//! Generalizes the teacher's `Integration` lifecycle into the fuller
//! discover/connect/pair/enumerate/subscribe/command/poll contract the
//! daemon's registry and command consumer drive every adapter through.

use std::future::Future;

use minihub_domain::command::Command;
use minihub_domain::device::Device;
use minihub_domain::entity::{Entity, EntityState};
use minihub_domain::error::MiniHubError;
use minihub_domain::event::Event;

/// Context handed to an adapter so it can persist discoveries, apply state,
/// and publish events without knowing the concrete services behind them.
pub trait AdapterContext: Send + Sync {
    /// Persist a discovered or refreshed device (upsert by
    /// `(protocol, fingerprint)`).
    fn upsert_device(
        &self,
        device: Device,
    ) -> impl Future<Output = Result<Device, MiniHubError>> + Send;

    /// Persist a discovered or re-enumerated entity.
    fn upsert_entity(
        &self,
        entity: Entity,
    ) -> impl Future<Output = Result<Entity, MiniHubError>> + Send;

    /// Apply an observed state snapshot, discarding it if `updated_at` is
    /// not newer than what is already stored.
    fn apply_state(&self, state: EntityState) -> impl Future<Output = Result<(), MiniHubError>> + Send;

    /// Report the outcome of a dispatched command.
    fn report_command_result(
        &self,
        command: Command,
    ) -> impl Future<Output = Result<(), MiniHubError>> + Send;

    /// Publish a lifecycle event (`device/auth_lost`, `device/paired`,
    /// `device/unreachable`, pairing progress like `waiting_for_button`, …)
    /// that doesn't fit `upsert_device`/`apply_state`/`report_command_result`.
    /// Default is a no-op so existing `AdapterContext` implementations don't
    /// need to change unless they care about these events.
    fn publish_event(&self, _event: Event) -> impl Future<Output = Result<(), MiniHubError>> + Send {
        async { Ok(()) }
    }
}

/// A device discovered on the wire, not yet persisted.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DiscoveredDevice {
    pub device: Device,
    pub entities: Vec<Entity>,
}

/// Uniform contract for a protocol driver.
///
/// The registry and discovery manager call these methods in the order
/// listed; adapters that don't support a phase (e.g. a protocol with no
/// pairing step) implement it as a no-op via the provided defaults.
pub trait ProtocolAdapter: Send + Sync {
    /// Unique name identifying this adapter (`"esphome"`, `"hue"`, …).
    fn name(&self) -> &'static str;

    /// One-time setup performed before any discovery or connection attempt.
    fn initialize(
        &mut self,
        ctx: &impl AdapterContext,
    ) -> impl Future<Output = Result<(), MiniHubError>> + Send;

    /// Passively or actively discover candidate devices on the network.
    ///
    /// Default is a no-op for adapters that are handed devices directly
    /// (e.g. the virtual adapter's static fixture list).
    fn discover(
        &mut self,
        _ctx: &impl AdapterContext,
    ) -> impl Future<Output = Result<Vec<DiscoveredDevice>, MiniHubError>> + Send {
        async { Ok(Vec::new()) }
    }

    /// Open a session with a previously discovered device.
    fn connect(
        &mut self,
        device: &Device,
    ) -> impl Future<Output = Result<(), MiniHubError>> + Send;

    /// Perform the protocol's pairing handshake, if any (Hue's link-button
    /// flow). Default is a no-op for protocols with no pairing step. Takes
    /// `ctx` so a multi-step handshake can surface progress (e.g.
    /// `waiting_for_button`) via [`AdapterContext::publish_event`] before it
    /// resolves.
    fn pair(
        &mut self,
        _device: &Device,
        _ctx: &impl AdapterContext,
    ) -> impl Future<Output = Result<(), MiniHubError>> + Send {
        async { Ok(()) }
    }

    /// Enumerate the entities a connected device exposes.
    fn enumerate_entities(
        &mut self,
        device: &Device,
    ) -> impl Future<Output = Result<Vec<Entity>, MiniHubError>> + Send;

    /// Start streaming state updates for a connected device, forwarding
    /// them to `ctx`. Returns once the subscription is established; the
    /// adapter keeps forwarding in the background.
    fn subscribe_state(
        &mut self,
        device: &Device,
        ctx: impl AdapterContext + Clone + 'static,
    ) -> impl Future<Output = Result<(), MiniHubError>> + Send;

    /// Dispatch a command to a connected device.
    fn send_command(
        &mut self,
        device: &Device,
        command: &Command,
    ) -> impl Future<Output = Result<(), MiniHubError>> + Send;

    /// Actively poll for state on adapters that don't push (Hue).
    /// Default is a no-op for push-based adapters.
    fn poll_state(
        &mut self,
        _device: &Device,
        _ctx: &impl AdapterContext,
    ) -> impl Future<Output = Result<(), MiniHubError>> + Send {
        async { Ok(()) }
    }

    /// Release any resources held for `device` (background tasks, sockets).
    fn shutdown(&mut self, device: &Device) -> impl Future<Output = Result<(), MiniHubError>> + Send;
}
