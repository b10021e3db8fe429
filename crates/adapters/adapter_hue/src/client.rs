//! Thin HTTPS client for the Hue bridge's v1 REST API.
//!
//! Self-signed certificates are the norm on-bridge, so the underlying
//! [`reqwest::Client`] is built with certificate verification disabled —
//! the bridge is only ever reached over the LAN by address discovered
//! via mDNS or the cloud fallback, never proxied.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::HueError;

/// Outcome of a single link-button pairing attempt.
pub enum PairingAttempt {
    Success { username: String },
    WaitingForButton,
    Other(HueError),
}

#[derive(Debug, Deserialize)]
struct BridgeErrorEnvelope {
    error: BridgeError,
}

#[derive(Debug, Deserialize)]
struct BridgeError {
    #[serde(rename = "type")]
    code: i64,
    description: String,
}

#[derive(Debug, Deserialize)]
struct BridgeSuccessEnvelope {
    success: BridgeSuccess,
}

#[derive(Debug, Deserialize)]
struct BridgeSuccess {
    username: String,
}

/// The fields of a single light's state this adapter reads and writes.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LightState {
    pub on: Option<bool>,
    /// Brightness, bridge-native range `1..=254`.
    pub bri: Option<u8>,
    /// Mired color temperature.
    pub ct: Option<u16>,
    pub reachable: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LightInfo {
    pub state: LightState,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub modelid: String,
    #[serde(default)]
    pub uniqueid: String,
}

#[derive(Debug, Deserialize)]
pub struct BridgeConfig {
    pub name: String,
    pub bridgeid: String,
}

/// Client bound to a single bridge's base URL (`https://<address>`).
#[derive(Clone)]
pub struct HueClient {
    http: reqwest::Client,
    base_url: String,
}

impl HueClient {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Build a client with self-signed bridge certificates accepted.
    pub fn build_http() -> Result<reqwest::Client, HueError> {
        reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(HueError::Http)
    }

    /// `GET /api/0/config` — reachable without a paired username, used to
    /// confirm the bridge answers before pairing or as a fingerprint source.
    pub async fn get_config(&self) -> Result<BridgeConfig, HueError> {
        let url = format!("{}/api/0/config", self.base_url);
        let response = self.http.get(url).send().await?;
        response.json::<BridgeConfig>().await.map_err(HueError::Http)
    }

    /// `POST /api` with `{"devicetype": ...}` — one step of the link-button loop.
    pub async fn attempt_pairing(&self, devicetype: &str) -> PairingAttempt {
        let url = format!("{}/api", self.base_url);
        let body = serde_json::json!({ "devicetype": devicetype });
        let response = match self.http.post(url).json(&body).send().await {
            Ok(response) => response,
            Err(err) => return PairingAttempt::Other(HueError::Http(err)),
        };
        let entries: Vec<serde_json::Value> = match response.json().await {
            Ok(entries) => entries,
            Err(err) => return PairingAttempt::Other(HueError::Http(err)),
        };
        let Some(first) = entries.into_iter().next() else {
            return PairingAttempt::Other(HueError::Codec(
                "empty pairing response".to_string(),
            ));
        };
        if let Ok(success) = serde_json::from_value::<BridgeSuccessEnvelope>(first.clone()) {
            return PairingAttempt::Success {
                username: success.success.username,
            };
        }
        match serde_json::from_value::<BridgeErrorEnvelope>(first) {
            Ok(envelope) if envelope.error.code == 101 => PairingAttempt::WaitingForButton,
            Ok(envelope) => PairingAttempt::Other(HueError::Bridge {
                code: envelope.error.code,
                description: envelope.error.description,
            }),
            Err(err) => PairingAttempt::Other(HueError::Codec(err.to_string())),
        }
    }

    /// `GET /api/{username}/lights` — the full light list with current state.
    pub async fn get_lights(&self, username: &str) -> Result<HashMap<String, LightInfo>, HueError> {
        let url = format!("{}/api/{username}/lights", self.base_url);
        let response = self.http.get(url).send().await?;
        response
            .json::<HashMap<String, LightInfo>>()
            .await
            .map_err(HueError::Http)
    }

    /// `PUT /api/{username}/lights/{id}/state` — apply a partial state change.
    pub async fn set_light_state(
        &self,
        username: &str,
        resource_id: &str,
        body: &serde_json::Value,
    ) -> Result<(), HueError> {
        let url = format!("{}/api/{username}/lights/{resource_id}/state", self.base_url);
        let response = self.http.put(url).json(body).send().await?;
        let entries: Vec<serde_json::Value> = response.json().await.map_err(HueError::Http)?;
        if let Some(first) = entries.into_iter().next() {
            if let Ok(envelope) = serde_json::from_value::<BridgeErrorEnvelope>(first) {
                return Err(HueError::Bridge {
                    code: envelope.error.code,
                    description: envelope.error.description,
                });
            }
        }
        Ok(())
    }
}
