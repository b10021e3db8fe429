//! Entity state — the latest reported snapshot of an entity's value.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::AttributeValue;
use crate::id::EntityId;
use crate::time::Timestamp;

/// Latest-known snapshot of a single entity's value and attributes.
///
/// Independently persisted from the [`super::Entity`] record it belongs to
/// (see the two-sink design of the state store): this is the row that gets
/// overwritten on every update, while [`crate::entity_state_history::EntityStateHistory`]
/// accumulates every observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: EntityId,
    /// Free-form JSON value; shape depends on the entity's kind
    /// (`{"on": true, "brightness": 0.8}` for a light, a bare number for a sensor).
    pub value: serde_json::Value,
    pub attributes: HashMap<String, AttributeValue>,
    pub updated_at: Timestamp,
}

impl EntityState {
    #[must_use]
    pub fn new(entity_id: EntityId, value: serde_json::Value, updated_at: Timestamp) -> Self {
        Self {
            entity_id,
            value,
            attributes: HashMap::new(),
            updated_at,
        }
    }

    #[must_use]
    pub fn with_attributes(mut self, attributes: HashMap<String, AttributeValue>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Whether `candidate` should replace this snapshot.
    ///
    /// A candidate observed strictly before this snapshot's `updated_at` is
    /// stale (out-of-order delivery, a laggy poll racing a push) and must be
    /// discarded rather than applied; one at the same timestamp is accepted,
    /// keeping `updated_at` nondecreasing across applied snapshots.
    #[must_use]
    pub fn should_replace_with(&self, candidate_updated_at: Timestamp) -> bool {
        candidate_updated_at >= self.updated_at
    }
}
