//! Hub — this daemon instance's own persisted identity and heartbeat.
//!
//! Unlike every other aggregate, a hub's id is operator-chosen (or
//! generated once and persisted) rather than a random UUID, so it uses a
//! plain `String` instead of one of `id.rs`'s `define_id!` newtypes.

use serde::{Deserialize, Serialize};

use crate::error::{MiniHubError, ValidationError};
use crate::time::Timestamp;

/// This daemon instance's registration and heartbeat record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hub {
    pub id: String,
    pub last_seen: Timestamp,
    pub online: bool,
    pub created_at: Timestamp,
}

impl Hub {
    /// Register a new hub identity, online as of `now`.
    ///
    /// # Errors
    ///
    /// Returns [`MiniHubError::Validation`] when `id` is empty.
    pub fn new(id: impl Into<String>, now: Timestamp) -> Result<Self, MiniHubError> {
        let hub = Self {
            id: id.into(),
            last_seen: now,
            online: true,
            created_at: now,
        };
        hub.validate()?;
        Ok(hub)
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`MiniHubError::Validation`] when `id` is empty.
    pub fn validate(&self) -> Result<(), MiniHubError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyHubId.into());
        }
        Ok(())
    }

    /// Record a heartbeat at `at`, marking the hub online.
    pub fn heartbeat(&mut self, at: Timestamp) {
        self.last_seen = at;
        self.online = true;
    }

    /// Mark the hub offline (supervisor shutdown, missed heartbeat).
    pub fn mark_offline(&mut self) {
        self.online = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_create_hub_online_with_given_id() {
        let now = crate::time::now();
        let hub = Hub::new("hub-1", now).unwrap();
        assert_eq!(hub.id, "hub-1");
        assert!(hub.online);
        assert_eq!(hub.last_seen, now);
    }

    #[test]
    fn should_reject_empty_hub_id() {
        let result = Hub::new("", crate::time::now());
        assert!(matches!(
            result,
            Err(MiniHubError::Validation(ValidationError::EmptyHubId))
        ));
    }

    #[test]
    fn should_update_last_seen_and_online_on_heartbeat() {
        let t0 = crate::time::now();
        let mut hub = Hub::new("hub-1", t0).unwrap();
        hub.mark_offline();
        assert!(!hub.online);

        let t1 = t0 + chrono::Duration::seconds(30);
        hub.heartbeat(t1);
        assert!(hub.online);
        assert_eq!(hub.last_seen, t1);
    }
}
