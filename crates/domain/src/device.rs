//! Device — a physical or logical endpoint that exposes one or more entities.

use serde::{Deserialize, Serialize};

use crate::error::{MiniHubError, ValidationError};
use crate::id::{AreaId, DeviceId};
use crate::time::Timestamp;

/// The wire protocol a device speaks.
///
/// Closed set matching the adapters this workspace ships. Adding a new
/// protocol means adding a variant here and a matching adapter crate; the
/// "future additions" the daemon is meant to grow into (Matter, Zigbee,
/// generic HTTP/SSE) are not wired up yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Esphome,
    Hue,
    Mqtt,
    Ble,
    Virtual,
}

impl Protocol {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Esphome => "esphome",
            Self::Hue => "hue",
            Self::Mqtt => "mqtt",
            Self::Ble => "ble",
            Self::Virtual => "virtual",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Protocol {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "esphome" => Ok(Self::Esphome),
            "hue" => Ok(Self::Hue),
            "mqtt" => Ok(Self::Mqtt),
            "ble" => Ok(Self::Ble),
            "virtual" => Ok(Self::Virtual),
            other => Err(ValidationError::UnknownCapability(other.to_string())),
        }
    }
}

/// A physical or logical endpoint that exposes one or more entities.
///
/// Invariant: `(protocol, fingerprint)` is unique across all devices; the
/// registry enforces this at upsert time by looking up the existing record
/// before inserting (see `minihub_app::services::registry_service`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub protocol: Protocol,
    /// Driver-supplied stable identifier that survives IP changes and renames
    /// (MAC address, bridge-unique-id, pairing id).
    pub fingerprint: String,
    pub name: String,
    pub address: Option<String>,
    pub port: Option<u16>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub firmware: Option<String>,
    pub area_id: Option<AreaId>,
    pub created_at: Timestamp,
    pub last_seen: Timestamp,
}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`MiniHubError::Validation`] when `name` or `fingerprint` is empty.
    pub fn validate(&self) -> Result<(), MiniHubError> {
        if self.name.is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        if self.fingerprint.is_empty() {
            return Err(ValidationError::EmptyFingerprint.into());
        }
        Ok(())
    }

    /// Refresh mutable discovery fields in place, preserving identity.
    /// Used by the registry on re-discovery of an already-known device.
    pub fn refresh(
        &mut self,
        name: String,
        address: Option<String>,
        port: Option<u16>,
        seen_at: Timestamp,
    ) {
        self.name = name;
        self.address = address;
        self.port = port;
        self.last_seen = seen_at;
    }
}

/// Step-by-step builder for [`Device`].
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    id: Option<DeviceId>,
    protocol: Option<Protocol>,
    fingerprint: Option<String>,
    name: Option<String>,
    address: Option<String>,
    port: Option<u16>,
    manufacturer: Option<String>,
    model: Option<String>,
    firmware: Option<String>,
    area_id: Option<AreaId>,
    created_at: Option<Timestamp>,
    last_seen: Option<Timestamp>,
}

impl DeviceBuilder {
    #[must_use]
    pub fn id(mut self, id: DeviceId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    #[must_use]
    pub fn fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    #[must_use]
    pub fn manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn firmware(mut self, firmware: impl Into<String>) -> Self {
        self.firmware = Some(firmware.into());
        self
    }

    #[must_use]
    pub fn area_id(mut self, area_id: AreaId) -> Self {
        self.area_id = Some(area_id);
        self
    }

    #[must_use]
    pub fn created_at(mut self, created_at: Timestamp) -> Self {
        self.created_at = Some(created_at);
        self
    }

    #[must_use]
    pub fn last_seen(mut self, last_seen: Timestamp) -> Self {
        self.last_seen = Some(last_seen);
        self
    }

    /// Consume the builder, validate, and return a [`Device`].
    ///
    /// # Errors
    ///
    /// Returns [`MiniHubError::Validation`] if `name` or `fingerprint` is missing or empty.
    pub fn build(self) -> Result<Device, MiniHubError> {
        let now = crate::time::now();
        let device = Device {
            id: self.id.unwrap_or_default(),
            protocol: self.protocol.unwrap_or(Protocol::Virtual),
            fingerprint: self.fingerprint.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            address: self.address,
            port: self.port,
            manufacturer: self.manufacturer,
            model: self.model,
            firmware: self.firmware,
            area_id: self.area_id,
            created_at: self.created_at.unwrap_or(now),
            last_seen: self.last_seen.unwrap_or(now),
        };
        device.validate()?;
        Ok(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Device {
        Device::builder()
            .name("Hue Bridge")
            .protocol(Protocol::Hue)
            .fingerprint("bridge-001")
            .build()
            .unwrap()
    }

    #[test]
    fn should_build_valid_device_when_name_and_fingerprint_provided() {
        let device = valid();
        assert_eq!(device.name, "Hue Bridge");
        assert_eq!(device.protocol, Protocol::Hue);
        assert!(device.manufacturer.is_none());
        assert!(device.area_id.is_none());
    }

    #[test]
    fn should_return_validation_error_when_name_is_empty() {
        let result = Device::builder().fingerprint("x").build();
        assert!(matches!(
            result,
            Err(MiniHubError::Validation(ValidationError::EmptyName))
        ));
    }

    #[test]
    fn should_return_validation_error_when_fingerprint_is_empty() {
        let result = Device::builder().name("Bridge").build();
        assert!(matches!(
            result,
            Err(MiniHubError::Validation(ValidationError::EmptyFingerprint))
        ));
    }

    #[test]
    fn should_build_device_with_all_optional_fields() {
        let area = AreaId::new();
        let device = Device::builder()
            .name("Motion Sensor")
            .protocol(Protocol::Ble)
            .fingerprint("A4:C1:38:5B:0E:DF")
            .manufacturer("Aqara")
            .model("RTCGQ11LM")
            .area_id(area)
            .build()
            .unwrap();

        assert_eq!(device.manufacturer.as_deref(), Some("Aqara"));
        assert_eq!(device.model.as_deref(), Some("RTCGQ11LM"));
        assert_eq!(device.area_id, Some(area));
    }

    #[test]
    fn should_roundtrip_through_serde_json() {
        let device = valid();
        let json = serde_json::to_string(&device).unwrap();
        let parsed: Device = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, device.id);
        assert_eq!(parsed.protocol, device.protocol);
        assert_eq!(parsed.fingerprint, device.fingerprint);
    }

    #[test]
    fn should_refresh_mutable_fields_in_place_preserving_identity() {
        let mut device = valid();
        let id = device.id;
        let later = crate::time::now();
        device.refresh(
            "Hue Bridge v2".to_string(),
            Some("10.0.0.5".to_string()),
            None,
            later,
        );
        assert_eq!(device.id, id);
        assert_eq!(device.name, "Hue Bridge v2");
        assert_eq!(device.address.as_deref(), Some("10.0.0.5"));
        assert_eq!(device.last_seen, later);
    }

    #[test]
    fn should_roundtrip_protocol_through_display_and_from_str() {
        for p in [
            Protocol::Esphome,
            Protocol::Hue,
            Protocol::Mqtt,
            Protocol::Ble,
            Protocol::Virtual,
        ] {
            let text = p.to_string();
            let parsed: Protocol = text.parse().unwrap();
            assert_eq!(p, parsed);
        }
    }
}
