//! Discovery transport port — abstracts the mechanism used to find devices
//! on the network (mDNS, BLE advertisement scanning, static fixtures).

use std::future::Future;

use minihub_domain::error::MiniHubError;

use super::adapter::DiscoveredDevice;

/// A background browser that reports devices as it finds them.
///
/// Implementations run their own polling/event loop internally;
/// [`poll_once`](Self::poll_once) is called on an interval by the
/// discovery manager and returns whatever was found since the last call.
pub trait MdnsBrowser: Send + Sync {
    fn poll_once(
        &mut self,
    ) -> impl Future<Output = Result<Vec<DiscoveredDevice>, MiniHubError>> + Send;
}
