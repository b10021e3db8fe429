//! Entity — a single typed capability owned by exactly one device.
//!
//! Kind and capability descriptor are fixed at construction and never
//! mutated in place: re-enumeration that would change either creates a new
//! entity and deactivates the old one (see `minihub_app::services::registry_service`).

mod attribute_value;
mod capability;
mod driver_key;
mod kind;
mod state;

pub use attribute_value::AttributeValue;
pub use capability::{CapabilityDescriptor, CapabilityRange};
pub use driver_key::DriverKey;
pub use kind::EntityKind;
pub use state::EntityState;

use serde::{Deserialize, Serialize};

use crate::error::{MiniHubError, ValidationError};
use crate::id::{DeviceId, EntityId};
use crate::time::Timestamp;

/// A single typed capability owned by exactly one device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub device_id: DeviceId,
    /// Driver-local key used by the adapter to address this entity on the device.
    pub driver_key: DriverKey,
    pub kind: EntityKind,
    pub capability: CapabilityDescriptor,
    pub friendly_name: String,
    pub created_at: Timestamp,
    /// Set when re-enumeration replaced this entity with a new one; a
    /// deactivated entity is retained for history but no longer addressable.
    pub deactivated_at: Option<Timestamp>,
}

impl Entity {
    /// Create a builder for constructing an [`Entity`].
    #[must_use]
    pub fn builder() -> EntityBuilder {
        EntityBuilder::default()
    }

    /// Whether this entity is still live (not superseded by a replacement).
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.deactivated_at.is_none()
    }

    /// Mark this entity as superseded by a replacement created during
    /// re-enumeration.
    pub fn deactivate(&mut self, at: Timestamp) {
        self.deactivated_at = Some(at);
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`MiniHubError::Validation`] when `friendly_name` is empty or
    /// `driver_key` is an empty string key.
    pub fn validate(&self) -> Result<(), MiniHubError> {
        if self.friendly_name.is_empty() {
            return Err(ValidationError::EmptyFriendlyName.into());
        }
        if matches!(&self.driver_key, DriverKey::Text(s) if s.is_empty()) {
            return Err(ValidationError::EmptyDriverKey.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Entity`].
#[derive(Debug, Default)]
pub struct EntityBuilder {
    id: Option<EntityId>,
    device_id: Option<DeviceId>,
    driver_key: Option<DriverKey>,
    kind: Option<EntityKind>,
    capability: Option<CapabilityDescriptor>,
    friendly_name: Option<String>,
}

impl EntityBuilder {
    #[must_use]
    pub fn id(mut self, id: EntityId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn device_id(mut self, device_id: DeviceId) -> Self {
        self.device_id = Some(device_id);
        self
    }

    #[must_use]
    pub fn driver_key(mut self, driver_key: DriverKey) -> Self {
        self.driver_key = Some(driver_key);
        self
    }

    #[must_use]
    pub fn kind(mut self, kind: EntityKind) -> Self {
        self.kind = Some(kind);
        self
    }

    #[must_use]
    pub fn capability(mut self, capability: CapabilityDescriptor) -> Self {
        self.capability = Some(capability);
        self
    }

    #[must_use]
    pub fn friendly_name(mut self, name: impl Into<String>) -> Self {
        self.friendly_name = Some(name.into());
        self
    }

    /// Consume the builder, validate, and return an [`Entity`].
    ///
    /// # Errors
    ///
    /// Returns [`MiniHubError::Validation`] if required fields are missing or empty.
    pub fn build(self) -> Result<Entity, MiniHubError> {
        let now = crate::time::now();
        let entity = Entity {
            id: self.id.unwrap_or_default(),
            device_id: self.device_id.unwrap_or_default(),
            driver_key: self.driver_key.unwrap_or(DriverKey::Index(0)),
            kind: self.kind.unwrap_or(EntityKind::Other),
            capability: self.capability.unwrap_or_default(),
            friendly_name: self.friendly_name.unwrap_or_default(),
            created_at: now,
            deactivated_at: None,
        };
        entity.validate()?;
        Ok(entity)
    }
}
