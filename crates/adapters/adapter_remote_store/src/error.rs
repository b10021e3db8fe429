//! Remote store adapter error types.

use minihub_domain::error::MiniHubError;

/// Errors specific to the remote store client and the generic mDNS browser.
#[derive(Debug, thiserror::Error)]
pub enum RemoteStoreError {
    /// The HTTP request to the remote store failed at the transport level.
    #[error("remote store request failed")]
    Http(#[from] reqwest::Error),

    /// The remote store responded with a non-2xx status.
    #[error("remote store rejected the request: {status} {body}")]
    Rejected { status: u16, body: String },

    /// A response or outbound body didn't match the expected JSON shape.
    #[error("malformed remote store payload: {0}")]
    Codec(String),

    /// The mDNS daemon failed to start or browse a service type.
    #[error("mDNS discovery failed: {0}")]
    Discovery(String),
}

impl RemoteStoreError {
    /// Convert into a [`MiniHubError::Storage`] for propagation across port
    /// boundaries.
    #[must_use]
    pub fn into_domain(self) -> MiniHubError {
        MiniHubError::Storage(Box::new(self))
    }
}

impl From<RemoteStoreError> for MiniHubError {
    fn from(err: RemoteStoreError) -> Self {
        err.into_domain()
    }
}
