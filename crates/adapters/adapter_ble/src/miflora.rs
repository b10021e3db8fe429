//! Mi Flora (HHCCJCY01) payload parsers.
//!
//! Mi Flora plant sensors require active GATT connections to read data.
//! This module provides:
//!
//! - GATT characteristic UUID constants (`CMD_CHAR`, `DATA_CHAR`, `FIRMWARE_CHAR`)
//! - The MiBeacon service-data UUID used to spot a Mi Flora advertisement
//!   before connecting
//! - Pure parser functions for the 16-byte sensor DATA and 7-byte FIRMWARE payloads

use crate::error::{BleError, PayloadParseError};

/// Service-data UUID carried by Xiaomi MiBeacon advertisements, including
/// Mi Flora's. Used only to recognise a device worth connecting to — the
/// actual reading comes from the GATT characteristics below.
pub const SERVICE_UUID_FE95: uuid::Uuid =
    uuid::Uuid::from_u128(0x0000_FE95_0000_1000_8000_0080_5F9B_34FB);

/// GATT characteristic UUID for the Mi Flora CMD register (write `[0xa0, 0x1f]` to activate).
pub const CMD_CHAR: uuid::Uuid = uuid::Uuid::from_u128(0x0000_1a00_0000_1000_8000_0080_5f9b_34fb);

/// GATT characteristic UUID for the Mi Flora DATA register (16-byte sensor payload).
pub const DATA_CHAR: uuid::Uuid = uuid::Uuid::from_u128(0x0000_1a01_0000_1000_8000_0080_5f9b_34fb);

/// GATT characteristic UUID for the Mi Flora FIRMWARE register (7-byte battery + version).
pub const FIRMWARE_CHAR: uuid::Uuid =
    uuid::Uuid::from_u128(0x0000_1a02_0000_1000_8000_0080_5f9b_34fb);

const MIBEACON_MIN_LEN: usize = 13;
const MIBEACON_MAC_OFFSET: usize = 7;
const DATA_LEN: usize = 16;
const FIRMWARE_LEN: usize = 7;

/// Parsed sensor data from the 16-byte DATA characteristic.
#[derive(Debug, Clone, PartialEq)]
pub struct MifloraSensorData {
    /// Temperature in degrees Celsius.
    pub temperature: f64,
    /// Light intensity in lux.
    pub light: u32,
    /// Soil moisture percentage (0–100).
    pub moisture: u8,
    /// Soil conductivity in µS/cm.
    pub conductivity: u16,
}

/// Parsed firmware info from the 7-byte FIRMWARE characteristic.
#[derive(Debug, Clone, PartialEq)]
pub struct MifloraFirmware {
    /// Battery level percentage (0–100).
    pub battery_level: u8,
    /// Firmware version string (e.g. `"3.1.8"`).
    pub firmware_version: String,
}

/// Combined reading from a single Mi Flora device.
#[derive(Debug, Clone, PartialEq)]
pub struct MifloraReading {
    /// Device MAC address (6 bytes).
    pub mac: [u8; 6],
    /// Sensor data from the DATA characteristic.
    pub sensor: MifloraSensorData,
    /// Firmware info from the FIRMWARE characteristic.
    pub firmware: MifloraFirmware,
}

/// Extract the 6-byte MAC address from a `MiBeacon` `0xFE95` service data payload.
///
/// The `MiBeacon` protocol stores the MAC at bytes 7–12 in reverse order.
/// On macOS, `peripheral.address()` returns a zeroed address, so this
/// function provides a reliable cross-platform alternative.
///
/// # Errors
///
/// Returns [`BleError::PayloadParse`] when the payload is shorter than 13 bytes.
pub fn parse_mibeacon_mac(data: &[u8]) -> Result<[u8; 6], BleError> {
    if data.len() < MIBEACON_MIN_LEN {
        return Err(BleError::PayloadParse(PayloadParseError::WrongLength {
            format: "MiBeacon",
            expected: MIBEACON_MIN_LEN,
            actual: data.len(),
        }));
    }

    let raw = &data[MIBEACON_MAC_OFFSET..MIBEACON_MAC_OFFSET + 6];
    Ok([raw[5], raw[4], raw[3], raw[2], raw[1], raw[0]])
}

/// Parse the 16-byte DATA characteristic payload (little-endian).
///
/// | Bytes | Type | Field |
/// |-------|------|-------|
/// | 0–1 | i16 LE (×0.1 °C) | Temperature |
/// | 2 | — | Padding |
/// | 3–6 | u32 LE (lux) | Light |
/// | 7 | u8 (%) | Moisture |
/// | 8–9 | u16 LE (µS/cm) | Conductivity |
/// | 10–15 | — | Reserved |
///
/// # Errors
///
/// Returns [`BleError::PayloadParse`] when the slice length is not 16.
pub fn parse_sensor_data(data: &[u8]) -> Result<MifloraSensorData, BleError> {
    if data.len() != DATA_LEN {
        return Err(BleError::PayloadParse(PayloadParseError::WrongLength {
            format: "Mi Flora DATA",
            expected: DATA_LEN,
            actual: data.len(),
        }));
    }

    let temp_raw = i16::from_le_bytes([data[0], data[1]]);
    let light = u32::from_le_bytes([data[3], data[4], data[5], data[6]]);
    let moisture = data[7];
    let conductivity = u16::from_le_bytes([data[8], data[9]]);

    Ok(MifloraSensorData {
        temperature: f64::from(temp_raw) * 0.1,
        light,
        moisture,
        conductivity,
    })
}

/// Parse the 7-byte FIRMWARE characteristic payload.
///
/// | Bytes | Type | Field |
/// |-------|------|-------|
/// | 0 | u8 (%) | Battery level |
/// | 1 | — | Separator |
/// | 2–6 | ASCII | Firmware version |
///
/// # Errors
///
/// Returns [`BleError::PayloadParse`] when the slice length is not 7.
pub fn parse_firmware(data: &[u8]) -> Result<MifloraFirmware, BleError> {
    if data.len() != FIRMWARE_LEN {
        return Err(BleError::PayloadParse(PayloadParseError::WrongLength {
            format: "Mi Flora FIRMWARE",
            expected: FIRMWARE_LEN,
            actual: data.len(),
        }));
    }

    let battery_level = data[0];
    let firmware_version = String::from_utf8_lossy(&data[2..7]).into_owned();

    Ok(MifloraFirmware {
        battery_level,
        firmware_version,
    })
}
