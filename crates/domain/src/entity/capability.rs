//! Descriptor of what an entity's value shape and range are.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Inclusive numeric range advertised for a scrubbable capability
/// (e.g. brightness `0.0..=1.0`, color temperature in mireds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapabilityRange {
    pub min: f64,
    pub max: f64,
}

impl CapabilityRange {
    #[must_use]
    pub fn contains(self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Static facts about the shape of an entity's state and commands.
///
/// Populated once during enumeration from driver-reported metadata and
/// never mutated afterward; a device that reports a changed range
/// re-enumerates a replacement entity instead (see [`super::Entity::deactivate`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub features: Vec<String>,
    pub ranges: HashMap<String, CapabilityRange>,
    pub unit_of_measurement: Option<String>,
}

impl CapabilityDescriptor {
    #[must_use]
    pub fn with_feature(mut self, feature: impl Into<String>) -> Self {
        self.features.push(feature.into());
        self
    }

    #[must_use]
    pub fn with_range(mut self, key: impl Into<String>, min: f64, max: f64) -> Self {
        self.ranges.insert(key.into(), CapabilityRange { min, max });
        self
    }

    #[must_use]
    pub fn with_unit_of_measurement(mut self, unit: impl Into<String>) -> Self {
        self.unit_of_measurement = Some(unit.into());
        self
    }

    #[must_use]
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_report_range_containment() {
        let range = CapabilityRange { min: 0.0, max: 1.0 };
        assert!(range.contains(0.5));
        assert!(!range.contains(1.5));
    }

    #[test]
    fn should_build_descriptor_with_features_and_ranges() {
        let descriptor = CapabilityDescriptor::default()
            .with_feature("brightness")
            .with_range("brightness", 0.0, 1.0)
            .with_unit_of_measurement("%");

        assert!(descriptor.has_feature("brightness"));
        assert_eq!(descriptor.ranges["brightness"].max, 1.0);
        assert_eq!(descriptor.unit_of_measurement.as_deref(), Some("%"));
    }
}
