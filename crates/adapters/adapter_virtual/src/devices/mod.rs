//! Virtual device implementations — light, sensor, switch.
//!
//! Each virtual device holds a fixed [`DeviceId`] and [`EntityId`] so they
//! remain stable across restarts of the adapter.

mod light;
mod sensor;
mod switch;

pub use light::VirtualLight;
pub use sensor::VirtualSensor;
pub use switch::VirtualSwitch;

use minihub_domain::command::{CapabilityTag, Command};
use minihub_domain::device::Device;
use minihub_domain::entity::{Entity, EntityState};
use minihub_domain::error::{MiniHubError, ValidationError};
use minihub_domain::id::{DeviceId, EntityId};

/// Wrapper enum for the concrete virtual device types.
pub enum VirtualDevice {
    Light(VirtualLight),
    Sensor(VirtualSensor),
    Switch(VirtualSwitch),
}

impl VirtualDevice {
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        match self {
            Self::Light(d) => d.device_id(),
            Self::Sensor(d) => d.device_id(),
            Self::Switch(d) => d.device_id(),
        }
    }

    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        match self {
            Self::Light(d) => d.entity_id(),
            Self::Sensor(d) => d.entity_id(),
            Self::Switch(d) => d.entity_id(),
        }
    }

    /// Create the [`Device`] and [`Entity`] descriptors for registration.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the builder fails.
    pub fn descriptor(&self) -> Result<(Device, Entity), MiniHubError> {
        match self {
            Self::Light(d) => d.descriptor(),
            Self::Sensor(d) => d.descriptor(),
            Self::Switch(d) => d.descriptor(),
        }
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> EntityState {
        match self {
            Self::Light(d) => d.state(),
            Self::Sensor(d) => d.state(),
            Self::Switch(d) => d.state(),
        }
    }

    /// Apply a command, returning the resulting state snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownCapability`] for a sensor (read-only)
    /// or any capability a device doesn't support.
    pub fn apply_command(&self, command: &Command) -> Result<EntityState, MiniHubError> {
        match (self, command.capability) {
            (Self::Light(d), CapabilityTag::OnOff) => d.apply_on_off(&command.value),
            (Self::Switch(d), CapabilityTag::OnOff) => d.apply_on_off(&command.value),
            _ => Err(ValidationError::UnknownCapability(command.capability.to_string()).into()),
        }
    }
}
