//! Protobuf-shaped message encoding for the ESPHome native API.
//!
//! Messages are plain structs; there is no `.proto` schema or code generator
//! involved, just the wire primitives (varint-tagged fields, length-delimited
//! strings, little-endian fixed32) that the real protocol uses, enough to
//! round-trip the fields minihub cares about. Unknown field numbers are
//! skipped rather than rejected, matching the native API's own forward
//! compatibility rule.

use std::collections::HashMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Read a protobuf varint starting at `buf[0]`. Returns the decoded value and
/// the number of bytes consumed, or `None` if `buf` ends before a
/// terminating byte (high bit clear) is found.
pub fn decode_varint(buf: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    for (i, byte) in buf.iter().enumerate().take(10) {
        value |= u64::from(byte & 0x7F) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

/// Append `value` to `buf` as a protobuf varint.
pub fn encode_varint(mut value: u64, buf: &mut BytesMut) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf.put_u8(byte);
            break;
        }
        buf.put_u8(byte | 0x80);
    }
}

#[derive(Debug, Clone)]
enum FieldValue {
    Varint(u64),
    Fixed32([u8; 4]),
    Bytes(Bytes),
}

/// A decoded message body, keyed by field number.
///
/// Repeated fields are not supported (the messages used here never repeat a
/// field); the last occurrence of a field number wins, which is also the
/// standard protobuf merge rule for scalar fields.
#[derive(Debug, Default)]
pub struct Fields(HashMap<u32, FieldValue>);

impl Fields {
    /// Parse `payload` into a field map, skipping any field whose wire type
    /// we don't recognise rather than failing outright.
    #[must_use]
    pub fn parse(payload: &[u8]) -> Self {
        let mut map = HashMap::new();
        let mut pos = 0usize;
        while pos < payload.len() {
            let Some((tag, n)) = decode_varint(&payload[pos..]) else {
                break;
            };
            pos += n;
            let field_no = (tag >> 3) as u32;
            let wire_type = tag & 0x7;
            match wire_type {
                0 => {
                    let Some((value, n)) = decode_varint(&payload[pos..]) else {
                        break;
                    };
                    pos += n;
                    map.insert(field_no, FieldValue::Varint(value));
                }
                5 => {
                    if pos + 4 > payload.len() {
                        break;
                    }
                    let mut bytes = [0u8; 4];
                    bytes.copy_from_slice(&payload[pos..pos + 4]);
                    pos += 4;
                    map.insert(field_no, FieldValue::Fixed32(bytes));
                }
                2 => {
                    let Some((len, n)) = decode_varint(&payload[pos..]) else {
                        break;
                    };
                    pos += n;
                    let len = len as usize;
                    if pos + len > payload.len() {
                        break;
                    }
                    let bytes = Bytes::copy_from_slice(&payload[pos..pos + len]);
                    pos += len;
                    map.insert(field_no, FieldValue::Bytes(bytes));
                }
                1 => {
                    // Fixed64, not used by any message we read; skip.
                    if pos + 8 > payload.len() {
                        break;
                    }
                    pos += 8;
                }
                _ => break,
            }
        }
        Self(map)
    }

    #[must_use]
    pub fn get_string(&self, field_no: u32) -> String {
        match self.0.get(&field_no) {
            Some(FieldValue::Bytes(b)) => String::from_utf8_lossy(b).into_owned(),
            _ => String::new(),
        }
    }

    #[must_use]
    pub fn get_bool(&self, field_no: u32) -> bool {
        matches!(self.0.get(&field_no), Some(FieldValue::Varint(v)) if *v != 0)
    }

    /// Read a `uint32` field that the driver may have encoded either as a
    /// varint or as a little-endian fixed32 — the native API uses both
    /// encodings for entity keys depending on firmware version.
    #[must_use]
    pub fn get_uint32_flexible(&self, field_no: u32) -> Option<u32> {
        match self.0.get(&field_no) {
            Some(FieldValue::Varint(v)) => Some(*v as u32),
            Some(FieldValue::Fixed32(bytes)) => Some(u32::from_le_bytes(*bytes)),
            _ => None,
        }
    }

    /// Read an IEEE-754 float field, always little-endian fixed32.
    #[must_use]
    pub fn get_float(&self, field_no: u32) -> f32 {
        match self.0.get(&field_no) {
            Some(FieldValue::Fixed32(bytes)) => f32::from_le_bytes(*bytes),
            _ => 0.0,
        }
    }
}

/// Incrementally builds a message body.
#[derive(Default)]
pub struct MessageWriter(BytesMut);

impl MessageWriter {
    #[must_use]
    pub fn new() -> Self {
        Self(BytesMut::new())
    }

    fn write_tag(&mut self, field_no: u32, wire_type: u8) {
        encode_varint((u64::from(field_no) << 3) | u64::from(wire_type), &mut self.0);
    }

    pub fn write_uint32(&mut self, field_no: u32, value: u32) -> &mut Self {
        self.write_tag(field_no, 0);
        encode_varint(u64::from(value), &mut self.0);
        self
    }

    pub fn write_bool(&mut self, field_no: u32, value: bool) -> &mut Self {
        self.write_uint32(field_no, u32::from(value))
    }

    pub fn write_string(&mut self, field_no: u32, value: &str) -> &mut Self {
        self.write_tag(field_no, 2);
        encode_varint(value.len() as u64, &mut self.0);
        self.0.put_slice(value.as_bytes());
        self
    }

    pub fn write_float(&mut self, field_no: u32, value: f32) -> &mut Self {
        self.write_tag(field_no, 5);
        self.0.put_slice(&value.to_le_bytes());
        self
    }

    #[must_use]
    pub fn finish(self) -> Bytes {
        self.0.freeze()
    }
}

/// Message type identifiers carried in the frame header.
pub mod message_type {
    pub const HELLO_REQUEST: u32 = 1;
    pub const HELLO_RESPONSE: u32 = 2;
    pub const CONNECT_REQUEST: u32 = 3;
    pub const CONNECT_RESPONSE: u32 = 4;
    pub const DISCONNECT_REQUEST: u32 = 5;
    pub const DISCONNECT_RESPONSE: u32 = 6;
    pub const PING_REQUEST: u32 = 7;
    pub const PING_RESPONSE: u32 = 8;
    pub const DEVICE_INFO_REQUEST: u32 = 9;
    pub const DEVICE_INFO_RESPONSE: u32 = 10;
    pub const LIST_ENTITIES_REQUEST: u32 = 11;
    pub const LIST_ENTITIES_BINARY_SENSOR_RESPONSE: u32 = 12;
    pub const LIST_ENTITIES_SENSOR_RESPONSE: u32 = 13;
    pub const LIST_ENTITIES_SWITCH_RESPONSE: u32 = 14;
    pub const LIST_ENTITIES_LIGHT_RESPONSE: u32 = 15;
    pub const LIST_ENTITIES_DONE_RESPONSE: u32 = 16;
    pub const SUBSCRIBE_STATES_REQUEST: u32 = 17;
    pub const BINARY_SENSOR_STATE_RESPONSE: u32 = 18;
    pub const SENSOR_STATE_RESPONSE: u32 = 19;
    pub const SWITCH_STATE_RESPONSE: u32 = 20;
    pub const LIGHT_STATE_RESPONSE: u32 = 21;
    pub const SWITCH_COMMAND_REQUEST: u32 = 22;
    pub const LIGHT_COMMAND_REQUEST: u32 = 23;
}

/// Kind of entity announced during `ListEntities*`, mirrored from the
/// message type that carried it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListedEntityKind {
    BinarySensor,
    Sensor,
    Switch,
    Light,
}

/// A single entity announced by `ListEntities{BinarySensor,Sensor,Switch,Light}Response`.
#[derive(Debug, Clone)]
pub struct ListedEntity {
    pub key: u32,
    pub object_id: String,
    pub name: String,
    pub unique_id: String,
    pub unit_of_measurement: String,
    pub kind: ListedEntityKind,
}

impl ListedEntity {
    #[must_use]
    pub fn decode(kind: ListedEntityKind, payload: &[u8]) -> Option<Self> {
        let fields = Fields::parse(payload);
        let key = fields.get_uint32_flexible(2)?;
        Some(Self {
            key,
            object_id: fields.get_string(1),
            name: fields.get_string(3),
            unique_id: fields.get_string(4),
            unit_of_measurement: fields.get_string(6),
            kind,
        })
    }
}

/// A state update for any entity kind, normalised into a single shape.
#[derive(Debug, Clone)]
pub struct StateUpdate {
    pub key: u32,
    pub kind: ListedEntityKind,
    pub bool_state: bool,
    pub float_state: f32,
    pub brightness: Option<f32>,
}

impl StateUpdate {
    #[must_use]
    pub fn decode(kind: ListedEntityKind, payload: &[u8]) -> Option<Self> {
        let fields = Fields::parse(payload);
        let key = fields.get_uint32_flexible(1)?;
        Some(match kind {
            ListedEntityKind::BinarySensor | ListedEntityKind::Switch => Self {
                key,
                kind,
                bool_state: fields.get_bool(2),
                float_state: 0.0,
                brightness: None,
            },
            ListedEntityKind::Sensor => Self {
                key,
                kind,
                bool_state: false,
                float_state: fields.get_float(2),
                brightness: None,
            },
            ListedEntityKind::Light => Self {
                key,
                kind,
                bool_state: fields.get_bool(2),
                float_state: 0.0,
                brightness: Some(fields.get_float(3)),
            },
        })
    }
}

#[must_use]
pub fn hello_request(client_info: &str) -> Bytes {
    let mut w = MessageWriter::new();
    w.write_string(1, client_info);
    w.write_uint32(2, 1);
    w.write_uint32(3, 9);
    w.finish()
}

#[must_use]
pub fn connect_request(password: &str) -> Bytes {
    let mut w = MessageWriter::new();
    w.write_string(1, password);
    w.finish()
}

#[must_use]
pub fn is_connect_response_invalid(payload: &[u8]) -> bool {
    Fields::parse(payload).get_bool(1)
}

/// `name`, `mac_address`, `model`, `manufacturer`, `esphome_version`.
#[must_use]
pub fn decode_device_info(payload: &[u8]) -> (String, String, String, String, String) {
    let fields = Fields::parse(payload);
    (
        fields.get_string(2),
        fields.get_string(3),
        fields.get_string(4),
        fields.get_string(5),
        fields.get_string(6),
    )
}

#[must_use]
pub fn empty() -> Bytes {
    Bytes::new()
}

#[must_use]
pub fn switch_command(key: u32, state: bool) -> Bytes {
    let mut w = MessageWriter::new();
    w.write_uint32(1, key);
    w.write_bool(2, state);
    w.finish()
}

#[must_use]
pub fn light_command(key: u32, state: Option<bool>, brightness: Option<f32>) -> Bytes {
    let mut w = MessageWriter::new();
    w.write_uint32(1, key);
    if let Some(state) = state {
        w.write_bool(2, true);
        w.write_bool(3, state);
    }
    if let Some(brightness) = brightness {
        w.write_bool(4, true);
        w.write_float(5, brightness);
    }
    w.finish()
}
