//! Credential — opaque authentication material owned by a single device.

use serde::{Deserialize, Serialize};

use crate::error::{MiniHubError, ValidationError};
use crate::id::DeviceId;
use crate::time::Timestamp;

/// Opaque authentication material for one device (a paired Hue application
/// key, an MQTT broker token, …).
///
/// One credential per device: a new pairing replaces the existing record
/// rather than creating a second one. The `payload` is encrypted at rest by
/// the storage adapter; this type never inspects its contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub device_id: DeviceId,
    pub payload: Vec<u8>,
    pub created_at: Timestamp,
    pub rotated_at: Option<Timestamp>,
}

impl Credential {
    /// Create a builder for constructing a [`Credential`].
    #[must_use]
    pub fn builder() -> CredentialBuilder {
        CredentialBuilder::default()
    }

    /// Replace the payload, recording the rotation time.
    pub fn rotate(&mut self, payload: Vec<u8>, at: Timestamp) {
        self.payload = payload;
        self.rotated_at = Some(at);
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`MiniHubError::Validation`] when `payload` is empty.
    pub fn validate(&self) -> Result<(), MiniHubError> {
        if self.payload.is_empty() {
            return Err(ValidationError::EmptyCredentialPayload.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Credential`].
#[derive(Debug, Default)]
pub struct CredentialBuilder {
    device_id: Option<DeviceId>,
    payload: Option<Vec<u8>>,
    created_at: Option<Timestamp>,
}

impl CredentialBuilder {
    #[must_use]
    pub fn device_id(mut self, device_id: DeviceId) -> Self {
        self.device_id = Some(device_id);
        self
    }

    #[must_use]
    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = Some(payload);
        self
    }

    #[must_use]
    pub fn created_at(mut self, created_at: Timestamp) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Consume the builder, validate, and return a [`Credential`].
    ///
    /// # Errors
    ///
    /// Returns [`MiniHubError::Validation`] if `payload` is missing or empty.
    pub fn build(self) -> Result<Credential, MiniHubError> {
        let credential = Credential {
            device_id: self.device_id.unwrap_or_default(),
            payload: self.payload.unwrap_or_default(),
            created_at: self.created_at.unwrap_or_else(crate::time::now),
            rotated_at: None,
        };
        credential.validate()?;
        Ok(credential)
    }
}
