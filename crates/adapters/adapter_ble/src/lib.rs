//! # minihub-adapter-ble
//!
//! BLE protocol adapter — passively scans for sensor advertisements (PVVX /
//! ATC1441 temperature-humidity sensors) and, when enabled, actively reads
//! Mi Flora plant sensors over GATT.
//!
//! ## Discovery model
//!
//! Unlike ESPHome or Hue, BLE sensors hold no persistent session: passive
//! sensors broadcast their reading in every advertisement, and Mi Flora
//! sensors must be connected to, read, and disconnected from on every poll.
//! There is nothing to `subscribe_state` to, so a scan runs both at
//! `discover` time (to find new devices) and at `poll_state` time (to
//! refresh an already-known one).
//!
//! ## Currently supported formats
//!
//! | Format | UUID | Payload length | Endianness |
//! |--------|------|----------------|------------|
//! | PVVX custom | `0x181A` | 19 bytes | Little-endian |
//! | ATC1441 original | `0x181A` | 13 bytes | Big-endian |
//! | Mi Flora (GATT) | `0xFE95` (advertisement) | 16+7 bytes (GATT reads) | Little-endian |
//!
//! ## Dependency rule
//!
//! Same as other adapters: depends on `minihub-app` and `minihub-domain`,
//! plus `btleplug` for the platform BLE stack.

mod config;
mod error;
mod gatt;
mod miflora;
pub mod parser;

pub use config::BleConfig;
pub use error::BleError;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::Manager;
use tokio_stream::StreamExt as _;

use minihub_app::ports::adapter::{AdapterContext, DiscoveredDevice, ProtocolAdapter};
use minihub_domain::command::Command;
use minihub_domain::device::{Device, Protocol};
use minihub_domain::entity::{AttributeValue, CapabilityDescriptor, DriverKey, Entity, EntityKind, EntityState};
use minihub_domain::error::{MiniHubError, NotFoundError, ValidationError};
use minihub_domain::id::EntityId;
use minihub_domain::time::now;

use miflora::MifloraReading;
use parser::SensorReading;

/// One observation produced by a single scan pass.
enum Sighting {
    Passive { mac: String, reading: SensorReading },
    Miflora { mac: String, reading: MifloraReading },
}

impl Sighting {
    fn mac(&self) -> &str {
        match self {
            Self::Passive { mac, .. } | Self::Miflora { mac, .. } => mac,
        }
    }

    fn is_miflora(&self) -> bool {
        matches!(self, Self::Miflora { .. })
    }
}

/// Cached identity for a device already seen by this adapter instance, keyed
/// by MAC address (the device fingerprint).
#[derive(Clone)]
struct KnownDevice {
    entity: Entity,
    is_miflora: bool,
}

/// BLE protocol adapter.
///
/// Caches one [`Entity`] template per MAC address so the same [`EntityId`]
/// survives repeated discovery and enumeration passes — the adapter has no
/// durable storage of its own, so this is the only thing standing between a
/// sensor and a fresh entity every time it is rediscovered.
pub struct BleAdapter {
    config: BleConfig,
    known: Mutex<HashMap<String, KnownDevice>>,
}

impl BleAdapter {
    #[must_use]
    pub fn new(config: BleConfig) -> Self {
        Self {
            config,
            known: Mutex::new(HashMap::new()),
        }
    }

    fn passes_filter(filter: &[String], mac: &str) -> bool {
        filter.is_empty() || filter.iter().any(|f| f.eq_ignore_ascii_case(mac))
    }

    fn cached_entity(&self, mac_str: &str, is_miflora: bool) -> Result<Entity, MiniHubError> {
        let mut known = self
            .known
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if let Some(existing) = known.get(mac_str) {
            return Ok(existing.entity.clone());
        }

        let (friendly_name, capability) = if is_miflora {
            (format!("Mi Flora {mac_str}"), CapabilityDescriptor::default())
        } else {
            (
                format!("BLE Temp/Humidity {mac_str}"),
                CapabilityDescriptor::default().with_unit_of_measurement("\u{b0}C"),
            )
        };

        let entity = Entity::builder()
            .id(EntityId::new())
            .driver_key(DriverKey::Text(mac_str.to_string()))
            .kind(EntityKind::Sensor)
            .capability(capability)
            .friendly_name(friendly_name)
            .build()?;

        known.insert(
            mac_str.to_string(),
            KnownDevice {
                entity: entity.clone(),
                is_miflora,
            },
        );
        Ok(entity)
    }

    fn is_miflora_mac(&self, mac_str: &str) -> Option<bool> {
        self.known
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(mac_str)
            .map(|record| record.is_miflora)
    }

    /// Build the `(Device, Entity)` pair for an observed MAC, reusing the
    /// cached entity id if this MAC has been seen before.
    fn build_discovered(&self, sighting: &Sighting) -> Result<DiscoveredDevice, MiniHubError> {
        let mac_str = sighting.mac();
        let is_miflora = sighting.is_miflora();

        let device = if is_miflora {
            Device::builder()
                .protocol(Protocol::Ble)
                .fingerprint(mac_str)
                .name(format!("Mi Flora {mac_str}"))
                .manufacturer("Xiaomi")
                .model("HHCCJCY01")
                .build()?
        } else {
            Device::builder()
                .protocol(Protocol::Ble)
                .fingerprint(mac_str)
                .name(format!("LYWSD03MMC {mac_str}"))
                .manufacturer("Xiaomi")
                .model("LYWSD03MMC")
                .build()?
        };

        let mut entity = self.cached_entity(mac_str, is_miflora)?;
        entity.device_id = device.id;

        Ok(DiscoveredDevice {
            device,
            entities: vec![entity],
        })
    }

    fn state_for(entity_id: EntityId, sighting: &Sighting) -> EntityState {
        match sighting {
            Sighting::Passive { reading, .. } => EntityState::new(
                entity_id,
                serde_json::json!(reading.temperature),
                now(),
            )
            .with_attributes(
                [
                    ("humidity".to_string(), AttributeValue::Float(reading.humidity)),
                    (
                        "battery_level".to_string(),
                        AttributeValue::Int(i64::from(reading.battery_level)),
                    ),
                    (
                        "battery_voltage".to_string(),
                        AttributeValue::Float(reading.battery_voltage),
                    ),
                ]
                .into_iter()
                .collect(),
            ),
            Sighting::Miflora { reading, .. } => EntityState::new(
                entity_id,
                serde_json::json!(reading.sensor.temperature),
                now(),
            )
            .with_attributes(
                [
                    ("light".to_string(), AttributeValue::Int(i64::from(reading.sensor.light))),
                    (
                        "moisture".to_string(),
                        AttributeValue::Int(i64::from(reading.sensor.moisture)),
                    ),
                    (
                        "conductivity".to_string(),
                        AttributeValue::Int(i64::from(reading.sensor.conductivity)),
                    ),
                    (
                        "battery_level".to_string(),
                        AttributeValue::Int(i64::from(reading.firmware.battery_level)),
                    ),
                    (
                        "firmware".to_string(),
                        AttributeValue::String(reading.firmware.firmware_version.clone()),
                    ),
                ]
                .into_iter()
                .collect(),
            ),
        }
    }

    /// Run a single passive/active scan pass.
    ///
    /// When `only_mac` is set, the scan still listens to every advertisement
    /// but only reports a sighting for that MAC — used by `poll_state` to
    /// refresh one already-known device without adopting strangers.
    async fn scan(&self, duration: Duration, only_mac: Option<&str>) -> Result<Vec<Sighting>, BleError> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let central = adapters.into_iter().next().ok_or(BleError::NotAvailable)?;

        let mut events = central.events().await?;

        let mut services = vec![parser::SERVICE_UUID_181A];
        if self.config.miflora_enabled {
            services.push(miflora::SERVICE_UUID_FE95);
        }
        central.start_scan(ScanFilter { services }).await?;

        let deadline = tokio::time::Instant::now() + duration;
        let mut seen: HashMap<String, Sighting> = HashMap::new();

        while tokio::time::Instant::now() < deadline {
            let remaining = deadline - tokio::time::Instant::now();
            match tokio::time::timeout(remaining, events.next()).await {
                Ok(Some(CentralEvent::ServiceDataAdvertisement { id, service_data })) => {
                    for (uuid, data) in &service_data {
                        if *uuid == parser::SERVICE_UUID_181A {
                            let Ok(reading) = parser::parse_service_data(*uuid, data) else {
                                continue;
                            };
                            let mac_str = parser::format_mac(reading.mac);
                            if let Some(target) = only_mac {
                                if !mac_str.eq_ignore_ascii_case(target) {
                                    continue;
                                }
                            } else if !Self::passes_filter(&self.config.device_filter, &mac_str) {
                                tracing::debug!(mac = %mac_str, "filtered out by device_filter");
                                continue;
                            }
                            seen.insert(
                                mac_str.clone(),
                                Sighting::Passive { mac: mac_str, reading },
                            );
                        } else if *uuid == miflora::SERVICE_UUID_FE95 && self.config.miflora_enabled {
                            let Ok(mac) = miflora::parse_mibeacon_mac(data) else {
                                continue;
                            };
                            let mac_str = parser::format_mac(mac);
                            if let Some(target) = only_mac {
                                if !mac_str.eq_ignore_ascii_case(target) {
                                    continue;
                                }
                            } else if !Self::passes_filter(&self.config.miflora_filter, &mac_str) {
                                tracing::debug!(mac = %mac_str, "filtered out by miflora_filter");
                                continue;
                            }
                            if seen.contains_key(&mac_str) {
                                continue;
                            }

                            let Ok(peripheral) = central.peripheral(&id).await else {
                                continue;
                            };
                            let connect_timeout =
                                Duration::from_secs(u64::from(self.config.miflora_connect_timeout_secs));
                            match tokio::time::timeout(connect_timeout, gatt::read_miflora(&peripheral)).await {
                                Ok(Ok(reading)) => {
                                    seen.insert(mac_str.clone(), Sighting::Miflora { mac: mac_str, reading });
                                }
                                Ok(Err(err)) => {
                                    tracing::warn!(%err, mac = %mac_str, "Mi Flora GATT read failed");
                                }
                                Err(_) => {
                                    tracing::warn!(mac = %mac_str, "Mi Flora GATT read timed out");
                                }
                            }
                        }
                    }
                }
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => break,
            }
        }

        central.stop_scan().await?;
        Ok(seen.into_values().collect())
    }
}

impl ProtocolAdapter for BleAdapter {
    fn name(&self) -> &'static str {
        "ble"
    }

    async fn initialize(&mut self, _ctx: &impl AdapterContext) -> Result<(), MiniHubError> {
        Ok(())
    }

    async fn discover(&mut self, _ctx: &impl AdapterContext) -> Result<Vec<DiscoveredDevice>, MiniHubError> {
        let duration = Duration::from_secs(u64::from(self.config.scan_duration_secs));
        let sightings = self.scan(duration, None).await.map_err(BleError::into_domain)?;

        tracing::info!(count = sightings.len(), "BLE discovery complete");

        sightings
            .iter()
            .map(|sighting| self.build_discovered(sighting))
            .collect()
    }

    async fn connect(&mut self, _device: &Device) -> Result<(), MiniHubError> {
        Ok(())
    }

    async fn enumerate_entities(&mut self, device: &Device) -> Result<Vec<Entity>, MiniHubError> {
        let is_miflora = self.is_miflora_mac(&device.fingerprint).ok_or_else(|| NotFoundError {
            entity: "Device",
            id: device.fingerprint.clone(),
        })?;
        let mut entity = self.cached_entity(&device.fingerprint, is_miflora)?;
        entity.device_id = device.id;
        Ok(vec![entity])
    }

    async fn subscribe_state(
        &mut self,
        _device: &Device,
        _ctx: impl AdapterContext + Clone + 'static,
    ) -> Result<(), MiniHubError> {
        Ok(())
    }

    async fn send_command(&mut self, _device: &Device, command: &Command) -> Result<(), MiniHubError> {
        Err(ValidationError::UnknownCapability(command.capability.to_string()).into())
    }

    async fn poll_state(&mut self, device: &Device, ctx: &impl AdapterContext) -> Result<(), MiniHubError> {
        let duration = Duration::from_secs(u64::from(self.config.scan_duration_secs));
        let sightings = self
            .scan(duration, Some(&device.fingerprint))
            .await
            .map_err(BleError::into_domain)?;

        let Some(sighting) = sightings.into_iter().next() else {
            tracing::debug!(mac = %device.fingerprint, "BLE device not seen this poll");
            return Ok(());
        };

        let is_miflora = sighting.is_miflora();
        let entity = self.cached_entity(&device.fingerprint, is_miflora)?;
        let state = Self::state_for(entity.id, &sighting);
        ctx.apply_state(state).await
    }

    async fn shutdown(&mut self, _device: &Device) -> Result<(), MiniHubError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_pass_filter_when_empty() {
        assert!(BleAdapter::passes_filter(&[], "A4:C1:38:5B:0E:DF"));
    }

    #[test]
    fn should_pass_filter_when_mac_matches_case_insensitively() {
        let filter = vec!["A4:C1:38:5B:0E:DF".to_string()];
        assert!(BleAdapter::passes_filter(&filter, "a4:c1:38:5b:0e:df"));
    }

    #[test]
    fn should_reject_filter_when_mac_not_listed() {
        let filter = vec!["A4:C1:38:AA:BB:CC".to_string()];
        assert!(!BleAdapter::passes_filter(&filter, "A4:C1:38:5B:0E:DF"));
    }

    #[test]
    fn should_cache_entity_and_reuse_id_across_calls() {
        let adapter = BleAdapter::new(BleConfig::default());
        let first = adapter.cached_entity("A4:C1:38:5B:0E:DF", false).unwrap();
        let second = adapter.cached_entity("A4:C1:38:5B:0E:DF", false).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.kind, EntityKind::Sensor);
    }

    #[test]
    fn should_distinguish_miflora_from_passive_in_cache() {
        let adapter = BleAdapter::new(BleConfig::default());
        let passive = adapter.cached_entity("A4:C1:38:5B:0E:DF", false).unwrap();
        let miflora = adapter.cached_entity("C4:7C:8D:6A:12:34", true).unwrap();
        assert_ne!(passive.id, miflora.id);
        assert!(adapter.is_miflora_mac("C4:7C:8D:6A:12:34").unwrap());
        assert!(!adapter.is_miflora_mac("A4:C1:38:5B:0E:DF").unwrap());
    }

    #[test]
    fn should_build_discovered_device_for_passive_sensor() {
        let adapter = BleAdapter::new(BleConfig::default());
        let sighting = Sighting::Passive {
            mac: "A4:C1:38:5B:0E:DF".to_string(),
            reading: SensorReading {
                mac: [0xA4, 0xC1, 0x38, 0x5B, 0x0E, 0xDF],
                temperature: 23.1,
                humidity: 45.0,
                battery_level: 87,
                battery_voltage: 3.05,
            },
        };

        let dd = adapter.build_discovered(&sighting).unwrap();
        assert_eq!(dd.device.name, "LYWSD03MMC A4:C1:38:5B:0E:DF");
        assert_eq!(dd.device.manufacturer.as_deref(), Some("Xiaomi"));
        assert_eq!(dd.device.fingerprint, "A4:C1:38:5B:0E:DF");
        assert_eq!(dd.entities.len(), 1);
        assert_eq!(dd.entities[0].device_id, dd.device.id);
    }

    #[test]
    fn should_build_discovered_device_for_miflora() {
        let adapter = BleAdapter::new(BleConfig::default());
        let sighting = Sighting::Miflora {
            mac: "C4:7C:8D:6A:12:34".to_string(),
            reading: MifloraReading {
                mac: [0xC4, 0x7C, 0x8D, 0x6A, 0x12, 0x34],
                sensor: miflora::MifloraSensorData {
                    temperature: 20.1,
                    light: 82_386,
                    moisture: 56,
                    conductivity: 1561,
                },
                firmware: miflora::MifloraFirmware {
                    battery_level: 99,
                    firmware_version: "3.1.8".to_string(),
                },
            },
        };

        let dd = adapter.build_discovered(&sighting).unwrap();
        assert_eq!(dd.device.name, "Mi Flora C4:7C:8D:6A:12:34");
        assert_eq!(dd.device.model.as_deref(), Some("HHCCJCY01"));
    }

    #[test]
    fn should_build_passive_state_with_attributes() {
        let sighting = Sighting::Passive {
            mac: "A4:C1:38:5B:0E:DF".to_string(),
            reading: SensorReading {
                mac: [0xA4, 0xC1, 0x38, 0x5B, 0x0E, 0xDF],
                temperature: 23.1,
                humidity: 45.0,
                battery_level: 87,
                battery_voltage: 3.05,
            },
        };
        let entity_id = EntityId::new();
        let state = BleAdapter::state_for(entity_id, &sighting);
        assert_eq!(state.value, serde_json::json!(23.1));
        assert_eq!(
            state.attributes.get("humidity"),
            Some(&AttributeValue::Float(45.0))
        );
    }

    #[tokio::test]
    async fn should_return_not_found_for_unknown_device_on_enumerate() {
        let mut adapter = BleAdapter::new(BleConfig::default());
        let device = Device::builder()
            .protocol(Protocol::Ble)
            .fingerprint("ghost")
            .name("ghost")
            .build()
            .unwrap();
        let result = adapter.enumerate_entities(&device).await;
        assert!(matches!(result, Err(MiniHubError::NotFound(_))));
    }

    #[tokio::test]
    async fn should_reject_send_command() {
        let mut adapter = BleAdapter::new(BleConfig::default());
        let device = Device::builder()
            .protocol(Protocol::Ble)
            .fingerprint("A4:C1:38:5B:0E:DF")
            .name("sensor")
            .build()
            .unwrap();
        let command = Command::builder()
            .device_id(device.id)
            .capability(minihub_domain::command::CapabilityTag::OnOff)
            .value(serde_json::json!(true))
            .build()
            .unwrap();
        let result = adapter.send_command(&device, &command).await;
        assert!(matches!(result, Err(MiniHubError::Validation(_))));
    }

    #[tokio::test]
    async fn should_shutdown_without_error() {
        let mut adapter = BleAdapter::new(BleConfig::default());
        let device = Device::builder()
            .protocol(Protocol::Ble)
            .fingerprint("A4:C1:38:5B:0E:DF")
            .name("sensor")
            .build()
            .unwrap();
        assert!(adapter.shutdown(&device).await.is_ok());
    }
}
