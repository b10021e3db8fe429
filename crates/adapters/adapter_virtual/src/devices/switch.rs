//! Virtual switch — responds to the `on_off` capability.

use std::sync::Mutex;

use minihub_domain::device::{Device, Protocol};
use minihub_domain::entity::{CapabilityDescriptor, DriverKey, Entity, EntityKind, EntityState};
use minihub_domain::error::{MiniHubError, ValidationError};
use minihub_domain::id::{DeviceId, EntityId};
use minihub_domain::time::now;

/// A simulated switch that responds to `on_off`.
pub struct VirtualSwitch {
    device_id: DeviceId,
    entity_id: EntityId,
    on: Mutex<bool>,
}

impl Default for VirtualSwitch {
    fn default() -> Self {
        Self {
            device_id: DeviceId::new(),
            entity_id: EntityId::new(),
            on: Mutex::new(false),
        }
    }
}

impl VirtualSwitch {
    /// The fixed entity id for this switch.
    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    /// The fixed device id for this switch.
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Produce the [`Device`] and [`Entity`] descriptors.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the builder fails.
    pub fn descriptor(&self) -> Result<(Device, Entity), MiniHubError> {
        let device = Device::builder()
            .id(self.device_id)
            .protocol(Protocol::Virtual)
            .fingerprint("virtual-switch")
            .name("Virtual Switch")
            .manufacturer("minihub")
            .model("VSwitch-1")
            .build()?;

        let entity = Entity::builder()
            .id(self.entity_id)
            .device_id(self.device_id)
            .driver_key(DriverKey::Index(0))
            .kind(EntityKind::Switch)
            .capability(CapabilityDescriptor::default().with_feature("on_off"))
            .friendly_name("Virtual Switch")
            .build()?;

        Ok((device, entity))
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> EntityState {
        let on = self.locked();
        EntityState::new(self.entity_id, serde_json::json!(on), now())
    }

    /// Apply an `on_off` command, returning the resulting state snapshot.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the command's value isn't a boolean.
    pub fn apply_on_off(&self, value: &serde_json::Value) -> Result<EntityState, MiniHubError> {
        let on = value.as_bool().ok_or_else(|| {
            ValidationError::CapabilityValueOutOfRange {
                capability: "on_off".to_string(),
                value: value.to_string(),
            }
        })?;
        *self.locked_mut() = on;
        Ok(self.state())
    }

    fn locked(&self) -> bool {
        *self
            .on
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn locked_mut(&self) -> std::sync::MutexGuard<'_, bool> {
        self.on
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
