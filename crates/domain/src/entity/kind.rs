//! Closed classification of what an entity represents.

use serde::{Deserialize, Serialize};

/// The kind of capability an entity represents.
///
/// Closed set matching the capabilities the shipped adapters expose.
/// Unrecognized driver-reported types fall back to [`EntityKind::Other`]
/// rather than failing enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Light,
    Switch,
    Sensor,
    BinarySensor,
    Button,
    Number,
    TextSensor,
    Lock,
    Cover,
    Climate,
    Fan,
    Other,
}

impl EntityKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Switch => "switch",
            Self::Sensor => "sensor",
            Self::BinarySensor => "binary_sensor",
            Self::Button => "button",
            Self::Number => "number",
            Self::TextSensor => "text_sensor",
            Self::Lock => "lock",
            Self::Cover => "cover",
            Self::Climate => "climate",
            Self::Fan => "fan",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
