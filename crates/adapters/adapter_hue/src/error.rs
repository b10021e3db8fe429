//! Hue adapter error types.

use minihub_domain::error::MiniHubError;

/// Errors specific to the Hue adapter.
#[derive(Debug, thiserror::Error)]
pub enum HueError {
    /// The HTTPS request to the bridge failed at the transport level.
    #[error("Hue bridge request failed")]
    Http(#[from] reqwest::Error),

    /// The bridge's JSON response didn't match the expected shape.
    #[error("malformed Hue bridge response: {0}")]
    Codec(String),

    /// The bridge returned an `{"error": {...}}` entry.
    #[error("Hue bridge error {code}: {description}")]
    Bridge { code: i64, description: String },

    /// The link-button pairing loop ran past its total time budget without
    /// the button being pressed.
    #[error("Hue pairing timed out waiting for the link button")]
    LinkButtonTimeout,

    /// An operation needing a paired application key was attempted before
    /// pairing completed.
    #[error("no paired application key for this bridge")]
    NotPaired,

    /// No active session is open for this device.
    #[error("no active Hue session for this device")]
    NotConnected,

    /// mDNS browsing or the cloud discovery fallback failed.
    #[error("Hue bridge discovery failed: {0}")]
    Discovery(String),

    /// A domain-level error (validation, not-found, etc.).
    #[error("domain error")]
    Domain(#[source] MiniHubError),
}

impl HueError {
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

impl From<HueError> for MiniHubError {
    fn from(err: HueError) -> Self {
        err.into_domain()
    }
}
