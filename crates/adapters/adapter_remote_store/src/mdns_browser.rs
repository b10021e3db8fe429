//! Protocol-agnostic mDNS browser.
//!
//! Monitors a fixed list of service types and normalizes resolved services
//! into [`DiscoveredDevice`]s. `_esphomelib._tcp.local.` is unambiguous; a
//! bare `_http._tcp.local.` service is only reported when its hostname looks
//! like an ESPHome device (`esphome`/`esp32`/`apollo`), since the closed
//! [`Protocol`] set has nowhere else to put an unclassified service.
//! Protocol-specific adapters (Hue's `_hue._tcp`, …) run their own discovery
//! and are not duplicated here.

use mdns_sd::{Receiver, ServiceDaemon, ServiceEvent, ServiceInfo};

use minihub_app::ports::adapter::DiscoveredDevice;
use minihub_app::ports::discovery::MdnsBrowser;
use minihub_domain::device::{Device, Protocol};
use minihub_domain::error::MiniHubError;

use crate::error::RemoteStoreError;

const SERVICE_TYPES: &[&str] = &["_esphomelib._tcp.local.", "_http._tcp.local."];
const ESPHOME_HOSTNAME_HINTS: &[&str] = &["esphome", "esp32", "apollo"];

pub struct GenericMdnsBrowser {
    daemon: ServiceDaemon,
    browses: Vec<Receiver<ServiceEvent>>,
}

impl GenericMdnsBrowser {
    /// # Errors
    ///
    /// Returns [`MiniHubError`] if the mDNS daemon fails to start or a
    /// service type fails to register for browsing.
    pub fn new() -> Result<Self, MiniHubError> {
        let daemon =
            ServiceDaemon::new().map_err(|err| RemoteStoreError::Discovery(err.to_string()))?;
        let mut browses = Vec::with_capacity(SERVICE_TYPES.len());
        for service_type in SERVICE_TYPES {
            let receiver = daemon
                .browse(service_type)
                .map_err(|err| RemoteStoreError::Discovery(err.to_string()))?;
            browses.push(receiver);
        }
        Ok(Self { daemon, browses })
    }

    fn classify(info: &ServiceInfo) -> Option<Protocol> {
        if info.get_type() == "_esphomelib._tcp.local." {
            return Some(Protocol::Esphome);
        }
        let hostname = info.get_hostname().to_ascii_lowercase();
        if ESPHOME_HOSTNAME_HINTS
            .iter()
            .any(|hint| hostname.contains(hint))
        {
            return Some(Protocol::Esphome);
        }
        None
    }

    fn to_discovered(info: &ServiceInfo) -> Result<Option<DiscoveredDevice>, MiniHubError> {
        let Some(protocol) = Self::classify(info) else {
            return Ok(None);
        };
        let Some(address) = info.get_addresses().iter().next() else {
            return Ok(None);
        };
        let hostname = info.get_hostname().trim_end_matches('.').to_string();
        let device = Device::builder()
            .protocol(protocol)
            .fingerprint(info.get_fullname().to_string())
            .name(hostname)
            .address(address.to_string())
            .port(info.get_port())
            .build()?;
        Ok(Some(DiscoveredDevice {
            device,
            entities: Vec::new(),
        }))
    }
}

impl MdnsBrowser for GenericMdnsBrowser {
    async fn poll_once(&mut self) -> Result<Vec<DiscoveredDevice>, MiniHubError> {
        let mut discovered = Vec::new();
        for receiver in &self.browses {
            while let Ok(event) = receiver.try_recv() {
                if let ServiceEvent::ServiceResolved(info) = event {
                    if let Some(device) = Self::to_discovered(&info)? {
                        discovered.push(device);
                    }
                }
            }
        }
        Ok(discovered)
    }
}

impl Drop for GenericMdnsBrowser {
    fn drop(&mut self) {
        let _ = self.daemon.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_classify_esphomelib_service_type_unconditionally() {
        let info = ServiceInfo::new(
            "_esphomelib._tcp.local.",
            "livingroom",
            "livingroom.local.",
            "10.0.0.5",
            6053,
            std::collections::HashMap::<String, String>::new(),
        )
        .unwrap();
        assert_eq!(
            GenericMdnsBrowser::classify(&info),
            Some(Protocol::Esphome)
        );
    }

    #[test]
    fn should_classify_http_service_with_esp32_hostname_as_esphome() {
        let info = ServiceInfo::new(
            "_http._tcp.local.",
            "kitchen",
            "esp32-kitchen.local.",
            "10.0.0.6",
            80,
            std::collections::HashMap::<String, String>::new(),
        )
        .unwrap();
        assert_eq!(
            GenericMdnsBrowser::classify(&info),
            Some(Protocol::Esphome)
        );
    }

    #[test]
    fn should_not_classify_unrelated_http_service() {
        let info = ServiceInfo::new(
            "_http._tcp.local.",
            "printer",
            "office-printer.local.",
            "10.0.0.7",
            80,
            std::collections::HashMap::<String, String>::new(),
        )
        .unwrap();
        assert_eq!(GenericMdnsBrowser::classify(&info), None);
    }
}
