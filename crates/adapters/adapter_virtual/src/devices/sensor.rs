//! Virtual temperature sensor — read-only, reports a fixed value.

use minihub_domain::device::{Device, Protocol};
use minihub_domain::entity::{
    AttributeValue, CapabilityDescriptor, DriverKey, Entity, EntityKind, EntityState,
};
use minihub_domain::error::MiniHubError;
use minihub_domain::id::{DeviceId, EntityId};
use minihub_domain::time::now;

/// A simulated temperature sensor.
///
/// Sensors do not accept commands — they only expose a read-only value and
/// attributes (`unit`).
pub struct VirtualSensor {
    device_id: DeviceId,
    entity_id: EntityId,
}

impl Default for VirtualSensor {
    fn default() -> Self {
        Self {
            device_id: DeviceId::new(),
            entity_id: EntityId::new(),
        }
    }
}

impl VirtualSensor {
    /// The fixed entity id for this sensor.
    #[must_use]
    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    /// The fixed device id for this sensor.
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
            .fingerprint("virtual-sensor")
            .name("Virtual Sensor")
            .manufacturer("minihub")
            .model("VSensor-1")
            .build()?;

        let entity = Entity::builder()
            .id(self.entity_id)
            .device_id(self.device_id)
            .driver_key(DriverKey::Index(0))
            .kind(EntityKind::Sensor)
            .capability(CapabilityDescriptor::default().with_unit_of_measurement("\u{b0}C"))
            .friendly_name("Virtual Temperature")
            .build()?;

        Ok((device, entity))
    }

    /// Current state snapshot: a fixed reading of 21.5.
    #[must_use]
    pub fn state(&self) -> EntityState {
        EntityState::new(self.entity_id, serde_json::json!(21.5), now()).with_attributes(
            [("unit".to_string(), AttributeValue::String("\u{b0}C".to_string()))]
                .into_iter()
                .collect(),
        )
    }
}
