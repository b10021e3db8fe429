//! Driver-local addressing key for an entity.

use serde::{Deserialize, Serialize};

/// How an adapter addresses a single entity on its device.
///
/// ESPHome enumerates entities by a stable numeric key; Hue and MQTT
/// address them by a string (resource id, topic suffix). Kept as an enum
/// rather than a plain string so each adapter can use its native
/// representation without an allocation on the common ESPHome path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverKey {
    Index(u32),
    Text(String),
}

impl std::fmt::Display for DriverKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Index(i) => write!(f, "{i}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_index_variant_as_number() {
        assert_eq!(DriverKey::Index(42).to_string(), "42");
    }

    #[test]
    fn should_display_text_variant_as_is() {
        assert_eq!(DriverKey::Text("light/1/state".to_string()).to_string(), "light/1/state");
    }

    #[test]
    fn should_roundtrip_through_serde_json() {
        let key = DriverKey::Text("abc".to_string());
        let json = serde_json::to_string(&key).unwrap();
        let parsed: DriverKey = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, key);
    }
}
