//! # minihub-adapter-virtual
//!
//! Virtual/demo protocol adapter that provides simulated devices for testing
//! and demonstration purposes.
//!
//! ## Provided devices
//!
//! | Device | Entity kind | Behaviour |
//! |--------|-------------|-----------|
//! | Virtual Light | `light` | Responds to the `on_off` capability |
//! | Virtual Sensor | `sensor` | Read-only, reports a fixed temperature |
//! | Virtual Switch | `switch` | Responds to the `on_off` capability |
//!
//! Every virtual device is discovered once at [`initialize`](ProtocolAdapter::initialize)
//! time — there is no network to poll, so `discover` is a no-op and
//! `subscribe_state` never needs to push anything beyond the initial value.
//!
//! ## Dependency rule
//!
//! Depends on `minihub-app` (port traits) and `minihub-domain` only.

mod devices;

use std::collections::HashMap;

use minihub_app::ports::adapter::{AdapterContext, ProtocolAdapter};
use minihub_domain::command::Command;
use minihub_domain::device::Device;
use minihub_domain::entity::Entity;
use minihub_domain::error::{MiniHubError, NotFoundError};
use minihub_domain::id::{DeviceId, EntityId};

use devices::{VirtualDevice, VirtualLight, VirtualSensor, VirtualSwitch};

/// Virtual protocol adapter backed by a fixed set of simulated devices.
pub struct VirtualAdapter {
    devices: HashMap<DeviceId, VirtualDevice>,
}

impl Default for VirtualAdapter {
    fn default() -> Self {
        let light = VirtualLight::default();
        let sensor = VirtualSensor::default();
        let switch = VirtualSwitch::default();

        let mut devices = HashMap::new();
        devices.insert(light.device_id(), VirtualDevice::Light(light));
        devices.insert(sensor.device_id(), VirtualDevice::Sensor(sensor));
        devices.insert(switch.device_id(), VirtualDevice::Switch(switch));

        Self { devices }
    }
}

impl VirtualAdapter {
    fn find(&self, device_id: DeviceId) -> Result<&VirtualDevice, MiniHubError> {
        self.devices.get(&device_id).ok_or_else(|| {
            NotFoundError {
                entity: "Device",
                id: device_id.to_string(),
            }
            .into()
        })
    }
}

impl ProtocolAdapter for VirtualAdapter {
    fn name(&self) -> &'static str {
        "virtual"
    }

    async fn initialize(&mut self, ctx: &impl AdapterContext) -> Result<(), MiniHubError> {
        for vdev in self.devices.values() {
            let (device, entity) = vdev.descriptor()?;
            let device = ctx.upsert_device(device).await?;
            let entity = Entity { device_id: device.id, ..entity };
            ctx.upsert_entity(entity).await?;
        }
        Ok(())
    }

    async fn connect(&mut self, _device: &Device) -> Result<(), MiniHubError> {
        Ok(())
    }

    async fn enumerate_entities(&mut self, device: &Device) -> Result<Vec<Entity>, MiniHubError> {
        let vdev = self.find(device.id)?;
        let (_, entity) = vdev.descriptor()?;
        Ok(vec![entity])
    }

    async fn subscribe_state(
        &mut self,
        device: &Device,
        ctx: impl AdapterContext + Clone + 'static,
    ) -> Result<(), MiniHubError> {
        let vdev = self.find(device.id)?;
        ctx.apply_state(vdev.state()).await
    }

    async fn send_command(&mut self, device: &Device, command: &Command) -> Result<(), MiniHubError> {
        let vdev = self.find(device.id)?;
        vdev.apply_command(command)?;
        Ok(())
    }

    async fn shutdown(&mut self, _device: &Device) -> Result<(), MiniHubError> {
        Ok(())
    }
}

impl VirtualAdapter {
    /// Check whether this adapter owns the given device.
    #[must_use]
    pub fn owns_device(&self, device_id: DeviceId) -> bool {
        self.devices.contains_key(&device_id)
    }
}
