//! Entity state history — append-only time-series of observed values.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entity::AttributeValue;
use crate::id::{EntityId, EntityStateHistoryId};
use crate::time::Timestamp;

/// A historical observation of an entity's value and attributes at a point in time.
///
/// Written by the history sink in batches (see `minihub_app::services::registry_service`);
/// unlike `EntityState`, records here are never overwritten, only appended
/// and, under backpressure, dropped oldest-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityStateHistory {
    pub id: EntityStateHistoryId,
    pub entity_id: EntityId,
    pub value: serde_json::Value,
    pub attributes: HashMap<String, AttributeValue>,
    pub recorded_at: Timestamp,
}

impl EntityStateHistory {
    /// Create a builder for constructing an [`EntityStateHistory`].
    #[must_use]
    pub fn builder() -> EntityStateHistoryBuilder {
        EntityStateHistoryBuilder::default()
    }

    #[must_use]
    pub fn get_attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }
}

/// Step-by-step builder for [`EntityStateHistory`].
#[derive(Debug, Default)]
pub struct EntityStateHistoryBuilder {
    id: Option<EntityStateHistoryId>,
    entity_id: Option<EntityId>,
    value: Option<serde_json::Value>,
    attributes: HashMap<String, AttributeValue>,
    recorded_at: Option<Timestamp>,
}

impl EntityStateHistoryBuilder {
    #[must_use]
    pub fn id(mut self, id: EntityStateHistoryId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn entity_id(mut self, entity_id: EntityId) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    #[must_use]
    pub fn value(mut self, value: serde_json::Value) -> Self {
        self.value = Some(value);
        self
    }

    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn attributes(mut self, attributes: HashMap<String, AttributeValue>) -> Self {
        self.attributes = attributes;
        self
    }

    #[must_use]
    pub fn recorded_at(mut self, recorded_at: Timestamp) -> Self {
        self.recorded_at = Some(recorded_at);
        self
    }

    /// Consume the builder and return an [`EntityStateHistory`].
    #[must_use]
    pub fn build(self) -> EntityStateHistory {
        EntityStateHistory {
            id: self.id.unwrap_or_default(),
            entity_id: self.entity_id.unwrap_or_default(),
            value: self.value.unwrap_or(serde_json::Value::Null),
            attributes: self.attributes,
            recorded_at: self.recorded_at.unwrap_or_else(crate::time::now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::now;

    #[test]
    fn should_build_entity_state_history_with_all_fields() {
        let entity_id = EntityId::new();
        let recorded = now();

        let history = EntityStateHistory::builder()
            .entity_id(entity_id)
            .value(serde_json::json!({"on": true}))
            .attribute("brightness", AttributeValue::Int(255))
            .recorded_at(recorded)
            .build();

        assert_eq!(history.entity_id, entity_id);
        assert_eq!(history.value, serde_json::json!({"on": true}));
        assert_eq!(history.recorded_at, recorded);
        assert_eq!(
            history.attributes.get("brightness"),
            Some(&AttributeValue::Int(255))
        );
    }

    #[test]
    fn should_default_value_to_null_when_not_provided() {
        let history = EntityStateHistory::builder().build();
        assert_eq!(history.value, serde_json::Value::Null);
        assert!(history.attributes.is_empty());
    }

    #[test]
    fn should_build_with_multiple_attributes() {
        let mut attrs = HashMap::new();
        attrs.insert("temperature".to_string(), AttributeValue::Float(22.5));
        attrs.insert("humidity".to_string(), AttributeValue::Int(65));

        let history = EntityStateHistory::builder()
            .entity_id(EntityId::new())
            .value(serde_json::json!(22.5))
            .attributes(attrs.clone())
            .build();

        assert_eq!(history.attributes.len(), 2);
        assert_eq!(
            history.attributes.get("temperature"),
            Some(&AttributeValue::Float(22.5))
        );
    }

    #[test]
    fn should_roundtrip_through_serde_json() {
        let history = EntityStateHistory::builder()
            .entity_id(EntityId::new())
            .value(serde_json::json!(false))
            .attribute("power", AttributeValue::Float(100.5))
            .build();

        let json = serde_json::to_string(&history).unwrap();
        let deserialized: EntityStateHistory = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.entity_id, history.entity_id);
        assert_eq!(deserialized.value, history.value);
        assert_eq!(deserialized.attributes, history.attributes);
    }
}
