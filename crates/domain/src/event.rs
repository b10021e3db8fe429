//! Event — an immutable record published on the in-process bus.
//!
//! Topics are hierarchical strings (`entity/<id>/state`, `device/<id>/lifecycle`,
//! `command/<id>/result`, `discovery/found`, `bus/overflow`, `history/overflow`)
//! rather than a closed enum, since subscribers match on patterns and new
//! topics can be introduced by adapters without touching this type.

use serde::{Deserialize, Serialize};

use crate::id::EventId;
use crate::time::Timestamp;

/// An immutable record of something that happened, addressed by topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub topic: String,
    pub payload: serde_json::Value,
    pub published_at: Timestamp,
}

impl Event {
    /// Create a new event with the current timestamp.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: EventId::new(),
            topic: topic.into(),
            payload,
            published_at: crate::time::now(),
        }
    }

    #[must_use]
    pub fn entity_state(entity_id: crate::id::EntityId, payload: serde_json::Value) -> Self {
        Self::new(format!("entity/{entity_id}/state"), payload)
    }

    #[must_use]
    pub fn device_lifecycle(device_id: crate::id::DeviceId, payload: serde_json::Value) -> Self {
        Self::new(format!("device/{device_id}/lifecycle"), payload)
    }

    #[must_use]
    pub fn command_result(command_id: crate::id::CommandId, payload: serde_json::Value) -> Self {
        Self::new(format!("command/{command_id}/result"), payload)
    }

    #[must_use]
    pub fn discovery_found(payload: serde_json::Value) -> Self {
        Self::new("discovery/found", payload)
    }

    #[must_use]
    pub fn bus_overflow(dropped: u64) -> Self {
        Self::new("bus/overflow", serde_json::json!({"dropped": dropped}))
    }

    #[must_use]
    pub fn history_overflow(dropped: u64) -> Self {
        Self::new("history/overflow", serde_json::json!({"dropped": dropped}))
    }

    /// Notes a push/pull transition in the command queue consumer.
    #[must_use]
    pub fn command_consumer_mode(mode: &str) -> Self {
        Self::new("command_consumer/mode", serde_json::json!({"mode": mode}))
    }

    /// An observed state snapshot was discarded as stale (at or before the
    /// `updated_at` of what's already stored for the entity).
    #[must_use]
    pub fn state_discarded_late(entity_id: crate::id::EntityId) -> Self {
        Self::new(
            "state/discarded_late",
            serde_json::json!({"entity_id": entity_id}),
        )
    }

    /// Whether `pattern` matches this event's topic.
    ///
    /// Supports a trailing `*` wildcard segment (`entity/*/state` matches
    /// `entity/<any>/state` only when the wildcard occupies exactly one
    /// path segment); an exact match otherwise.
    #[must_use]
    pub fn matches_topic_pattern(&self, pattern: &str) -> bool {
        topic_matches(&self.topic, pattern)
    }
}

fn topic_matches(topic: &str, pattern: &str) -> bool {
    let topic_parts: Vec<&str> = topic.split('/').collect();
    let pattern_parts: Vec<&str> = pattern.split('/').collect();
    if topic_parts.len() != pattern_parts.len() {
        return false;
    }
    topic_parts
        .iter()
        .zip(pattern_parts.iter())
        .all(|(t, p)| *p == "*" || t == p)
}
