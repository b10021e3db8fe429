//! Bridge discovery: mDNS `_hue._tcp` browsing with a cloud-endpoint fallback
//! for networks where multicast is filtered.

use std::time::Duration;

use mdns_sd::{ServiceDaemon, ServiceEvent};
use serde::Deserialize;

use crate::error::HueError;

const SERVICE_TYPE: &str = "_hue._tcp.local.";
const CLOUD_DISCOVERY_URL: &str = "https://discovery.meethue.com/";

/// A bridge candidate found by either discovery path, not yet connected to.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeCandidate {
    /// Bridge-unique id used as the device fingerprint; bridge id from mDNS
    /// TXT records when present, otherwise the cloud endpoint's `id` field.
    pub fingerprint: String,
    pub address: String,
    pub port: u16,
}

/// Browse `_hue._tcp.local.` for `window`, returning every bridge resolved
/// in that time. Restartable: a fresh [`ServiceDaemon`] is created and shut
/// down on every call.
pub async fn discover_mdns(window: Duration) -> Result<Vec<BridgeCandidate>, HueError> {
    let daemon = ServiceDaemon::new().map_err(|err| HueError::Discovery(err.to_string()))?;
    let receiver = daemon
        .browse(SERVICE_TYPE)
        .map_err(|err| HueError::Discovery(err.to_string()))?;

    let mut found = Vec::new();
    let deadline = tokio::time::Instant::now() + window;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            break;
        }
        let event = match tokio::time::timeout(remaining, receiver.recv_async()).await {
            Ok(Ok(event)) => event,
            Ok(Err(_)) => break,
            Err(_) => break,
        };
        if let ServiceEvent::ServiceResolved(info) = event {
            let Some(address) = info.get_addresses().iter().next() else {
                continue;
            };
            let fingerprint = info
                .get_properties()
                .get("bridgeid")
                .map(|prop| prop.val_str().to_string())
                .unwrap_or_else(|| info.get_fullname().to_string());
            found.push(BridgeCandidate {
                fingerprint,
                address: address.to_string(),
                port: info.get_port(),
            });
        }
    }

    let _ = daemon.shutdown();
    Ok(found)
}

#[derive(Debug, Deserialize)]
struct CloudEntry {
    id: String,
    #[serde(rename = "internalipaddress")]
    internal_ip_address: String,
}

/// Query the Philips-operated discovery endpoint for bridges reachable from
/// this network's public IP, used when mDNS finds nothing (multicast
/// commonly filtered on guest/IoT VLANs).
pub async fn discover_cloud(http: &reqwest::Client) -> Result<Vec<BridgeCandidate>, HueError> {
    let entries: Vec<CloudEntry> = http
        .get(CLOUD_DISCOVERY_URL)
        .send()
        .await?
        .json()
        .await?;
    Ok(entries
        .into_iter()
        .map(|entry| BridgeCandidate {
            fingerprint: entry.id,
            address: entry.internal_ip_address,
            port: 443,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_cloud_discovery_entries() {
        let raw = serde_json::json!([
            {"id": "001788fffe123456", "internalipaddress": "192.168.1.20"}
        ]);
        let entries: Vec<CloudEntry> = serde_json::from_value(raw).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].internal_ip_address, "192.168.1.20");
    }

    #[test]
    fn should_build_bridge_candidate_with_default_https_port() {
        let candidate = BridgeCandidate {
            fingerprint: "001788fffe123456".to_string(),
            address: "192.168.1.20".to_string(),
            port: 443,
        };
        assert_eq!(candidate.port, 443);
    }
}
