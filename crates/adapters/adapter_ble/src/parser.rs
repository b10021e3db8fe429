//! BLE advertisement payload parsers for ATC/PVVX firmware formats.
//!
//! Pure functions operating on raw `&[u8]` slices — no BLE dependency needed.
//! The two supported formats share UUID `0x181A` and are disambiguated by
//! payload length:
//!
//! - **PVVX custom** (19 bytes, little-endian)
//! - **ATC1441 original** (16 bytes, big-endian)

use crate::error::{BleError, PayloadParseError};

/// UUID used by both PVVX and ATC1441 advertisement formats.
pub const SERVICE_UUID_181A: uuid::Uuid =
    uuid::Uuid::from_u128(0x0000_181A_0000_1000_8000_0080_5F9B_34FB);

const PVVX_LEN: usize = 19;
const ATC1441_LEN: usize = 13;

/// Parsed sensor reading from a BLE advertisement.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    /// Device MAC address (6 bytes).
    pub mac: [u8; 6],
    /// Temperature in degrees Celsius.
    pub temperature: f64,
    /// Relative humidity in percent.
    pub humidity: f64,
    /// Battery level (0–100 %).
    pub battery_level: u8,
    /// Battery voltage in volts.
    pub battery_voltage: f64,
}

/// Dispatch to the correct parser based on UUID and payload length.
///
/// # Errors
///
/// Returns [`BleError::PayloadParse`] when the UUID is unrecognised or the
/// payload length does not match any known format.
pub fn parse_service_data(uuid: uuid::Uuid, data: &[u8]) -> Result<SensorReading, BleError> {
    if uuid != SERVICE_UUID_181A {
        return Err(BleError::PayloadParse(PayloadParseError::UnsupportedUuid(
            uuid,
        )));
    }

    match data.len() {
        PVVX_LEN => parse_pvvx(data),
        ATC1441_LEN => parse_atc1441(data),
        other => Err(BleError::PayloadParse(
            PayloadParseError::UnexpectedLength { actual: other },
        )),
    }
}

/// Parse a 19-byte PVVX custom-format payload (little-endian).
///
/// | Offset | Field | Type |
/// |--------|-------|------|
/// | 0–5 | MAC | 6 bytes LE |
/// | 6–7 | Temperature | i16 LE, x0.01 C |
/// | 8–9 | Humidity | u16 LE, x0.01 % |
/// | 10–11 | Battery voltage | u16 LE, mV |
/// | 12 | Battery level | u8, 0–100 % |
/// | 13 | Counter | u8 |
/// | 14 | Flags | u8 |
///
/// Bytes 15-18 are reserved/padding in the 19-byte frame.
///
/// # Errors
///
/// Returns [`BleError::PayloadParse`] when the slice length is not 19.
pub fn parse_pvvx(data: &[u8]) -> Result<SensorReading, BleError> {
    if data.len() != PVVX_LEN {
        return Err(BleError::PayloadParse(PayloadParseError::WrongLength {
            format: "PVVX",
            expected: PVVX_LEN,
            actual: data.len(),
        }));
    }

    let mut mac = [0u8; 6];
    mac.copy_from_slice(&data[0..6]);

    let temp_raw = i16::from_le_bytes([data[6], data[7]]);
    let hum_raw = u16::from_le_bytes([data[8], data[9]]);
    let batt_mv = u16::from_le_bytes([data[10], data[11]]);
    let batt_level = data[12];

    Ok(SensorReading {
        mac,
        temperature: f64::from(temp_raw) * 0.01,
        humidity: f64::from(hum_raw) * 0.01,
        battery_level: batt_level,
        battery_voltage: f64::from(batt_mv) * 0.001,
    })
}

/// Parse a 13-byte ATC1441 original-format payload (big-endian).
///
/// | Offset | Field | Type |
/// |--------|-------|------|
/// | 0–5 | MAC | 6 bytes BE |
/// | 6–7 | Temperature | i16 BE, x0.1 C |
/// | 8 | Humidity | u8, % |
/// | 9 | Battery level | u8, % |
/// | 10–11 | Battery voltage | u16 BE, mV |
/// | 12 | Counter | u8 |
///
/// # Errors
///
/// Returns [`BleError::PayloadParse`] when the slice length is not 13.
pub fn parse_atc1441(data: &[u8]) -> Result<SensorReading, BleError> {
    if data.len() != ATC1441_LEN {
        return Err(BleError::PayloadParse(PayloadParseError::WrongLength {
            format: "ATC1441",
            expected: ATC1441_LEN,
            actual: data.len(),
        }));
    }

    let mut mac = [0u8; 6];
    mac.copy_from_slice(&data[0..6]);

    let temp_raw = i16::from_be_bytes([data[6], data[7]]);
    let humidity = data[8];
    let batt_level = data[9];
    let batt_mv = u16::from_be_bytes([data[10], data[11]]);

    Ok(SensorReading {
        mac,
        temperature: f64::from(temp_raw) * 0.1,
        humidity: f64::from(humidity),
        battery_level: batt_level,
        battery_voltage: f64::from(batt_mv) * 0.001,
    })
}

/// Format a 6-byte MAC as a colon-separated hex string (e.g. `"A4:C1:38:5B:0E:DF"`).
#[must_use]
pub fn format_mac(mac: [u8; 6]) -> String {
    format!(
        "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}

/// Normalise a MAC to a lowercase slug suitable for entity IDs (e.g. `"a4c1385b0edf"`).
#[must_use]
pub fn mac_slug(mac: [u8; 6]) -> String {
    format!(
        "{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}
