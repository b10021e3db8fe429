//! Common error types used across the workspace.
//!
//! Each layer defines its own concrete error types. The domain layer provides
//! [`ValidationError`] and [`NotFoundError`]. Adapter layers define their own
//! (e.g., `StorageError` wrapping `sqlx::Error`) and wire them into
//! [`MiniHubError`] via `#[from]` conversion.

/// Validation failures raised by domain invariant checks.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("entity_id cannot be empty")]
    EmptyEntityId,
    #[error("friendly_name cannot be empty")]
    EmptyFriendlyName,
    #[error("name cannot be empty")]
    EmptyName,
    #[error("fingerprint cannot be empty")]
    EmptyFingerprint,
    #[error("driver key cannot be empty")]
    EmptyDriverKey,
    #[error("invalid RFC 3339 timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("unknown capability tag: {0}")]
    UnknownCapability(String),
    #[error("command value out of range for capability {capability}: {value}")]
    CapabilityValueOutOfRange { capability: String, value: String },
    #[error("invalid command status transition: {from} -> {to}")]
    InvalidCommandTransition { from: String, to: String },
    #[error("credential payload cannot be empty")]
    EmptyCredentialPayload,
    #[error("hub_id cannot be empty")]
    EmptyHubId,
}

/// Returned when a lookup by identifier finds nothing.
#[derive(Debug, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// Top-level domain error.
///
/// Adapter crates may introduce additional variants by wrapping their own
/// error types via `#[from]`.
#[derive(Debug, thiserror::Error)]
pub enum MiniHubError {
    // Delegate to the wrapped error's own `Display` rather than a generic
    // placeholder: callers like the command consumer store `.to_string()`
    // of this error directly as a command's failure category, so the
    // category has to survive the conversion into `MiniHubError`.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Convenience alias used throughout the domain and application layers.
pub type Result<T> = std::result::Result<T, MiniHubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_display_validation_error_message() {
        let err = ValidationError::EmptyEntityId;
        assert_eq!(err.to_string(), "entity_id cannot be empty");
    }

    #[test]
    fn should_display_not_found_error_with_entity_and_id() {
        let err = NotFoundError {
            entity: "Entity",
            id: "abc-123".to_string(),
        };
        assert_eq!(err.to_string(), "Entity abc-123 not found");
    }

    #[test]
    fn should_convert_validation_error_into_minihub_error() {
        let err: MiniHubError = ValidationError::EmptyName.into();
        assert!(matches!(err, MiniHubError::Validation(_)));
    }

    #[test]
    fn should_convert_not_found_error_into_minihub_error() {
        let err: MiniHubError = NotFoundError {
            entity: "Device",
            id: "xyz".to_string(),
        }
        .into();
        assert!(matches!(err, MiniHubError::NotFound(_)));
    }

    #[test]
    fn should_preserve_the_wrapped_error_category_in_minihub_error_display() {
        let err: MiniHubError = NotFoundError {
            entity: "ProtocolAdapter",
            id: "hue".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "ProtocolAdapter hue not found");

        let err: MiniHubError = ValidationError::EmptyName.into();
        assert_eq!(err.to_string(), "name cannot be empty");
    }
}
