//! ESPHome adapter configuration.

use serde::Deserialize;

/// Configuration for the ESPHome adapter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EsphomeConfig {
    /// Plaintext API password, if the device was flashed with one set.
    pub password: Option<String>,
    /// How long to wait for a TCP connection and the initial handshake, in seconds.
    pub connect_timeout_secs: u16,
    /// Interval between keepalive `PingRequest` frames, in seconds.
    pub ping_interval_secs: u16,
    /// How long to wait for any frame (state, pong, …) before the session is
    /// considered dead and torn down.
    pub session_timeout_secs: u16,
}

impl Default for EsphomeConfig {
    fn default() -> Self {
        Self {
            password: None,
            connect_timeout_secs: 10,
            ping_interval_secs: 20,
            session_timeout_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_have_sensible_defaults() {
        let config = EsphomeConfig::default();
        assert!(config.password.is_none());
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.ping_interval_secs, 20);
        assert_eq!(config.session_timeout_secs, 60);
    }

    #[test]
    fn should_deserialize_from_toml() {
        let toml = r#"
            password = "secret"
            connect_timeout_secs = 5
            ping_interval_secs = 15
            session_timeout_secs = 45
        "#;
        let config: EsphomeConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.password.as_deref(), Some("secret"));
        assert_eq!(config.connect_timeout_secs, 5);
        assert_eq!(config.session_timeout_secs, 45);
    }

    #[test]
    fn should_use_defaults_for_missing_fields() {
        let toml = "ping_interval_secs = 30";
        let config: EsphomeConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.ping_interval_secs, 30);
        assert_eq!(config.connect_timeout_secs, 10);
    }
}
