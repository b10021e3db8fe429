//! ESPHome adapter error types.

use minihub_domain::error::MiniHubError;

/// Errors specific to the ESPHome adapter.
#[derive(Debug, thiserror::Error)]
pub enum EsphomeError {
    /// The underlying TCP connection failed.
    #[error("ESPHome connection error")]
    Io(#[from] std::io::Error),

    /// A frame could not be decoded as a well-formed message.
    #[error("malformed ESPHome frame: {0}")]
    Codec(String),

    /// The device violated the expected handshake/enumeration sequence.
    #[error("ESPHome protocol error: {0}")]
    Protocol(String),

    /// The device rejected the configured API password.
    #[error("ESPHome device rejected the API password")]
    InvalidPassword,

    /// No device is connected for this operation.
    #[error("no active ESPHome connection for this device")]
    NotConnected,

    /// An operation did not complete before its deadline.
    #[error("ESPHome operation timed out")]
    Timeout,

    /// A domain-level error (validation, not-found, etc.).
    #[error("domain error")]
    Domain(#[source] MiniHubError),
}

impl EsphomeError {
    /// Convert into a [`MiniHubError::Storage`] for propagation across port
    /// boundaries.
    #[must_use]
    pub fn into_domain(self) -> MiniHubError {
        match self {
            Self::Domain(err) => err,
            other => MiniHubError::Storage(Box::new(other)),
        }
    }
}

impl From<EsphomeError> for MiniHubError {
    fn from(err: EsphomeError) -> Self {
        err.into_domain()
    }
}
