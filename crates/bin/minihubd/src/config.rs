//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `minihub.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::collections::HashMap;

use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Integration toggles.
    pub integrations: IntegrationsConfig,
    /// Entity history retention settings.
    pub history: HistoryConfig,
    /// This daemon instance's identity.
    pub hub: HubConfig,
    /// Remote store connection, if this hub reports to one.
    pub remote_store: RemoteStoreConfig,
    /// Discovery manager settings.
    pub discovery: DiscoveryConfig,
    /// Heartbeat/telemetry settings.
    pub telemetry: TelemetryConfig,
    /// Remote command queue consumer settings.
    pub command_consumer: CommandConsumerConfig,
    /// Per-protocol timeout overrides, in seconds, keyed by `Protocol::as_str()`.
    pub adapter_timeouts: HashMap<String, u64>,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// Path to the dashboard static assets directory (trunk build output).
    pub dashboard_dir: Option<String>,
}

/// `SQLite` database configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL or file path.
    pub url: String,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Per-integration toggles.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct IntegrationsConfig {
    /// Enable the virtual/demo integration.
    pub virtual_enabled: bool,
    /// MQTT integration settings (disabled by default).
    pub mqtt: MqttIntegrationConfig,
    /// BLE integration settings (disabled by default).
    pub ble: BleIntegrationConfig,
    /// ESPHome integration settings (enabled by default; discovery
    /// decides whether anything actually connects).
    pub esphome: EsphomeIntegrationConfig,
    /// Hue integration settings (enabled by default).
    pub hue: HueIntegrationConfig,
}

/// ESPHome integration configuration within the main config file.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EsphomeIntegrationConfig {
    /// Whether the ESPHome integration is enabled.
    pub enabled: bool,
    /// Plaintext API password shared by devices that set one.
    pub password: Option<String>,
    /// Connection + handshake timeout, in seconds.
    pub connect_timeout_secs: u16,
    /// Keepalive ping interval, in seconds.
    pub ping_interval_secs: u16,
    /// Session idle timeout, in seconds.
    pub session_timeout_secs: u16,
}

/// Hue integration configuration within the main config file.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HueIntegrationConfig {
    /// Whether the Hue integration is enabled.
    pub enabled: bool,
    /// Total link-button pairing time budget, in seconds.
    pub pairing_timeout_secs: u16,
    /// Delay between link-button pairing attempts, in seconds.
    pub pairing_poll_interval_secs: u16,
    /// State-polling interval while a bridge is reachable, in seconds.
    pub poll_interval_secs: u16,
    /// Ceiling for the exponential polling backoff after repeated failures.
    pub max_backoff_secs: u16,
    /// Consecutive poll failures before backoff kicks in.
    pub backoff_after_failures: u8,
    /// Maximum commands per second sent to a single bridge.
    pub rate_limit_per_s: u8,
}

/// This daemon instance's identity.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Hub id. Generated once and persisted to the `hubs` table if absent
    /// here, so restarts keep the same id without editing the config file.
    pub hub_id: Option<String>,
    /// Human-readable hub name, surfaced on `GET /` and `GET /api/hub/status`.
    pub hub_name: String,
    /// Hub software version, surfaced on `GET /`.
    pub hub_version: String,
    /// Symmetric key the credential repository obfuscates stored
    /// integration secrets with. Not a substitute for a real KMS — see
    /// `SqliteCredentialRepository`'s own docs — but the port boundary
    /// (`CredentialRepository`) is real, so a production deployment can
    /// swap this for an actually-encrypted adapter without touching
    /// callers. Falls back to a fixed development key with a loud warning
    /// if unset; always set `MINIHUB_CREDENTIAL_KEY` outside development.
    pub credential_key: Option<String>,
}

/// Remote store connection settings. Absent `remote_store_url` means
/// local-only mode: no heartbeat, no command consumer; the in-process event
/// bus still runs.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RemoteStoreConfig {
    /// Base URL of the remote store, if this hub reports to one.
    pub remote_store_url: Option<String>,
    /// Authentication key for the remote store.
    pub remote_store_key: Option<String>,
}

/// Discovery manager settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Whether periodic discovery runs at all.
    pub enabled: bool,
    /// Interval between discovery passes, in seconds.
    pub interval_s: u32,
}

/// Heartbeat/telemetry settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Interval between hub heartbeat upserts, in seconds.
    pub heartbeat_interval_s: u32,
}

/// Remote command queue consumer settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CommandConsumerConfig {
    /// Interval between remote queue polls, in seconds.
    pub poll_interval_s: u32,
}

/// Entity history retention settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Number of days to retain entity history (default: 30).
    pub retention_days: u16,
    /// Interval between purge operations, in hours (default: 24).
    pub purge_interval_hours: u16,
}

/// MQTT integration configuration within the main config file.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MqttIntegrationConfig {
    /// Whether the MQTT integration is enabled.
    pub enabled: bool,
    /// MQTT broker hostname or IP address.
    pub broker_host: String,
    /// MQTT broker port.
    pub broker_port: u16,
    /// MQTT client identifier.
    pub client_id: String,
    /// Base topic prefix for all minihub MQTT communication.
    pub base_topic: String,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u16,
}

/// BLE passive scanner integration configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BleIntegrationConfig {
    /// Whether the BLE integration is enabled.
    pub enabled: bool,
    /// How long to scan for advertisements during setup, in seconds.
    pub scan_duration_secs: u16,
    /// Interval between background re-scans, in seconds.
    pub update_interval_secs: u16,
    /// Optional MAC address allowlist (e.g. `["A4:C1:38:AA:BB:CC"]`).
    pub device_filter: Vec<String>,
    /// Enable active GATT readout for Mi Flora plant sensors.
    pub miflora_enabled: bool,
    /// Optional MAC allowlist for Mi Flora devices.
    pub miflora_filter: Vec<String>,
    /// Per-device GATT connection timeout, in seconds.
    pub miflora_connect_timeout_secs: u16,
}

impl Config {
    /// Load configuration from `minihub.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("minihub.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MINIHUB_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = std::env::var("MINIHUB_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Ok(val) = std::env::var("MINIHUB_BIND") {
            if let Some((host, port)) = val.rsplit_once(':') {
                self.server.host = host.to_string();
                if let Ok(port) = port.parse() {
                    self.server.port = port;
                }
            }
        }
        if let Ok(val) = std::env::var("MINIHUB_DASHBOARD_DIR") {
            self.server.dashboard_dir = Some(val);
        }
        if let Ok(val) = std::env::var("MINIHUB_DATABASE_URL") {
            self.database.url = val;
        }
        if let Ok(val) = std::env::var("MINIHUB_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("MINIHUB_MQTT_ENABLED") {
            self.integrations.mqtt.enabled = val == "1" || val.eq_ignore_ascii_case("true");
        }
        if let Ok(val) = std::env::var("MINIHUB_MQTT_BROKER_HOST") {
            self.integrations.mqtt.broker_host = val;
        }
        if let Ok(val) = std::env::var("MINIHUB_MQTT_BROKER_PORT") {
            if let Ok(port) = val.parse() {
                self.integrations.mqtt.broker_port = port;
            }
        }
        if let Ok(val) = std::env::var("MINIHUB_BLE_ENABLED") {
            self.integrations.ble.enabled = val == "1" || val.eq_ignore_ascii_case("true");
        }
        if let Ok(val) = std::env::var("MINIHUB_BLE_SCAN_DURATION_SECS") {
            if let Ok(secs) = val.parse() {
                self.integrations.ble.scan_duration_secs = secs;
            }
        }
        if let Ok(val) = std::env::var("MINIHUB_BLE_MIFLORA_ENABLED") {
            self.integrations.ble.miflora_enabled = val == "1" || val.eq_ignore_ascii_case("true");
        }
        if let Ok(val) = std::env::var("MINIHUB_HISTORY_RETENTION_DAYS") {
            if let Ok(days) = val.parse() {
                self.history.retention_days = days;
            }
        }
        if let Ok(val) = std::env::var("MINIHUB_HISTORY_PURGE_INTERVAL_HOURS") {
            if let Ok(hours) = val.parse() {
                self.history.purge_interval_hours = hours;
            }
        }
        if let Ok(val) = std::env::var("MINIHUB_ESPHOME_ENABLED") {
            self.integrations.esphome.enabled = val == "1" || val.eq_ignore_ascii_case("true");
        }
        if let Ok(val) = std::env::var("MINIHUB_ESPHOME_PASSWORD") {
            self.integrations.esphome.password = Some(val);
        }
        if let Ok(val) = std::env::var("MINIHUB_HUE_ENABLED") {
            self.integrations.hue.enabled = val == "1" || val.eq_ignore_ascii_case("true");
        }
        if let Ok(val) = std::env::var("MINIHUB_HUE_RATE_LIMIT_PER_S") {
            if let Ok(limit) = val.parse() {
                self.integrations.hue.rate_limit_per_s = limit;
            }
        }
        if let Ok(val) = std::env::var("MINIHUB_HUB_ID") {
            self.hub.hub_id = Some(val);
        }
        if let Ok(val) = std::env::var("MINIHUB_HUB_NAME") {
            self.hub.hub_name = val;
        }
        if let Ok(val) = std::env::var("MINIHUB_CREDENTIAL_KEY") {
            self.hub.credential_key = Some(val);
        }
        if let Ok(val) = std::env::var("MINIHUB_REMOTE_STORE_URL") {
            self.remote_store.remote_store_url = Some(val);
        }
        if let Ok(val) = std::env::var("MINIHUB_REMOTE_STORE_KEY") {
            self.remote_store.remote_store_key = Some(val);
        }
        if let Ok(val) = std::env::var("MINIHUB_DISCOVERY_ENABLED") {
            self.discovery.enabled = val == "1" || val.eq_ignore_ascii_case("true");
        }
        if let Ok(val) = std::env::var("MINIHUB_DISCOVERY_INTERVAL_S") {
            if let Ok(interval) = val.parse() {
                self.discovery.interval_s = interval;
            }
        }
        if let Ok(val) = std::env::var("MINIHUB_HEARTBEAT_INTERVAL_S") {
            if let Ok(interval) = val.parse() {
                self.telemetry.heartbeat_interval_s = interval;
            }
        }
        if let Ok(val) = std::env::var("MINIHUB_COMMAND_POLL_INTERVAL_S") {
            if let Ok(interval) = val.parse() {
                self.command_consumer.poll_interval_s = interval;
            }
        }
    }

    /// Per-protocol timeout override, falling back to `default_secs` when
    /// `protocol` has no entry in `adapter_timeouts`.
    #[must_use]
    pub fn adapter_timeout_secs(&self, protocol: &str, default_secs: u64) -> u64 {
        self.adapter_timeouts.get(protocol).copied().unwrap_or(default_secs)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Return the database URL in `sqlx`-compatible format.
    #[must_use]
    pub fn database_url(&self) -> &str {
        &self.database.url
    }

    /// Return the dashboard assets directory, if configured.
    #[must_use]
    pub fn dashboard_dir(&self) -> Option<std::path::PathBuf> {
        self.server
            .dashboard_dir
            .as_ref()
            .map(std::path::PathBuf::from)
    }

    /// Return the credential-repository encryption key as raw bytes,
    /// falling back to a fixed development key when unset.
    #[must_use]
    pub fn credential_encryption_key(&self) -> Vec<u8> {
        match &self.hub.credential_key {
            Some(key) => key.clone().into_bytes(),
            None => {
                tracing::warn!(
                    "MINIHUB_CREDENTIAL_KEY not set — using the built-in development key, \
                     stored credentials are not protected against anyone with filesystem access"
                );
                b"minihub-dev-credential-key".to_vec()
            }
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            dashboard_dir: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:minihub.db?mode=rwc".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "minihubd=info,minihub=info,tower_http=debug".to_string(),
        }
    }
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            virtual_enabled: true,
            mqtt: MqttIntegrationConfig::default(),
            ble: BleIntegrationConfig::default(),
            esphome: EsphomeIntegrationConfig::default(),
            hue: HueIntegrationConfig::default(),
        }
    }
}

impl Default for EsphomeIntegrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            password: None,
            connect_timeout_secs: 10,
            ping_interval_secs: 20,
            session_timeout_secs: 60,
        }
    }
}

impl Default for HueIntegrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pairing_timeout_secs: 30,
            pairing_poll_interval_secs: 1,
            poll_interval_secs: 1,
            max_backoff_secs: 60,
            backoff_after_failures: 5,
            rate_limit_per_s: 10,
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            hub_id: None,
            hub_name: "minihub".to_string(),
            hub_version: env!("CARGO_PKG_VERSION").to_string(),
            credential_key: None,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_s: 30,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_s: 30,
        }
    }
}

impl Default for CommandConsumerConfig {
    fn default() -> Self {
        Self { poll_interval_s: 2 }
    }
}

impl Default for MqttIntegrationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            broker_host: "localhost".to_string(),
            broker_port: 1883,
            client_id: "minihub".to_string(),
            base_topic: "minihub".to_string(),
            keep_alive_secs: 30,
        }
    }
}

impl Default for BleIntegrationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            scan_duration_secs: 10,
            update_interval_secs: 60,
            device_filter: Vec::new(),
            miflora_enabled: false,
            miflora_filter: Vec::new(),
            miflora_connect_timeout_secs: 10,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            retention_days: 30,
            purge_interval_hours: 24,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.url, "sqlite:minihub.db?mode=rwc");
        assert!(config.integrations.virtual_enabled);
        assert!(!config.integrations.mqtt.enabled);
        assert_eq!(config.integrations.mqtt.broker_host, "localhost");
        assert_eq!(config.integrations.mqtt.broker_port, 1883);
        assert!(!config.integrations.ble.enabled);
        assert_eq!(config.integrations.ble.scan_duration_secs, 10);
        assert_eq!(config.integrations.ble.update_interval_secs, 60);
        assert!(config.integrations.ble.device_filter.is_empty());
        assert!(!config.integrations.ble.miflora_enabled);
        assert!(config.integrations.ble.miflora_filter.is_empty());
        assert_eq!(config.integrations.ble.miflora_connect_timeout_secs, 10);
    }

    #[test]
    fn should_fall_back_to_development_credential_key_when_unset() {
        let config = Config::default();
        assert_eq!(config.hub.credential_key, None);
        assert_eq!(config.credential_encryption_key(), b"minihub-dev-credential-key");
    }

    #[test]
    fn should_use_configured_credential_key_when_set() {
        let mut config = Config::default();
        config.hub.credential_key = Some("super-secret".to_string());
        assert_eq!(config.credential_encryption_key(), b"super-secret");
    }

    #[test]
    fn should_parse_minimal_toml() {
        let toml = "";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [server]
            host = '127.0.0.1'
            port = 9090

            [database]
            url = 'sqlite:test.db'

            [logging]
            filter = 'debug'

            [integrations]
            virtual_enabled = false

            [integrations.mqtt]
            enabled = true
            broker_host = 'mqtt.local'
            broker_port = 8883
            client_id = 'my-hub'
            base_topic = 'home'
            keep_alive_secs = 60

            [integrations.ble]
            enabled = true
            scan_duration_secs = 5
            update_interval_secs = 30
            device_filter = ['A4:C1:38:AA:BB:CC']
            miflora_enabled = true
            miflora_filter = ['C4:7C:8D:6A:XX:YY']
            miflora_connect_timeout_secs = 15
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.database.url, "sqlite:test.db");
        assert_eq!(config.logging.filter, "debug");
        assert!(!config.integrations.virtual_enabled);
        assert!(config.integrations.mqtt.enabled);
        assert_eq!(config.integrations.mqtt.broker_host, "mqtt.local");
        assert_eq!(config.integrations.mqtt.broker_port, 8883);
        assert_eq!(config.integrations.mqtt.client_id, "my-hub");
        assert_eq!(config.integrations.mqtt.base_topic, "home");
        assert_eq!(config.integrations.mqtt.keep_alive_secs, 60);
        assert!(config.integrations.ble.enabled);
        assert_eq!(config.integrations.ble.scan_duration_secs, 5);
        assert_eq!(config.integrations.ble.update_interval_secs, 30);
        assert_eq!(
            config.integrations.ble.device_filter,
            vec!["A4:C1:38:AA:BB:CC"]
        );
        assert!(config.integrations.ble.miflora_enabled);
        assert_eq!(
            config.integrations.ble.miflora_filter,
            vec!["C4:7C:8D:6A:XX:YY"]
        );
        assert_eq!(config.integrations.ble.miflora_connect_timeout_secs, 15);
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn should_reject_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_accept_valid_port() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_format_bind_addr() {
        let config = Config::default();
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn should_format_custom_bind_addr() {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 9090;
        assert_eq!(config.bind_addr(), "127.0.0.1:9090");
    }

    #[test]
    fn should_return_database_url() {
        let config = Config::default();
        assert_eq!(config.database_url(), "sqlite:minihub.db?mode=rwc");
    }

    #[test]
    fn should_parse_partial_toml_with_defaults() {
        let toml = "
            [server]
            port = 8080
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.database.url, "sqlite:minihub.db?mode=rwc");
        assert!(config.integrations.virtual_enabled);
    }

    #[test]
    fn should_default_miflora_disabled_in_partial_ble_toml() {
        let toml = "
            [integrations.ble]
            enabled = true
            scan_duration_secs = 5
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.integrations.ble.enabled);
        assert_eq!(config.integrations.ble.scan_duration_secs, 5);
        assert!(!config.integrations.ble.miflora_enabled);
        assert!(config.integrations.ble.miflora_filter.is_empty());
        assert_eq!(config.integrations.ble.miflora_connect_timeout_secs, 10);
    }

    #[test]
    fn should_apply_miflora_enabled_env_override() {
        let mut config = Config::default();
        assert!(!config.integrations.ble.miflora_enabled);

        // Simulate what apply_env_overrides does for MINIHUB_BLE_MIFLORA_ENABLED
        config.integrations.ble.miflora_enabled = "true".eq_ignore_ascii_case("true");
        assert!(config.integrations.ble.miflora_enabled);

        config.integrations.ble.miflora_enabled = "1" == "1";
        assert!(config.integrations.ble.miflora_enabled);

        config.integrations.ble.miflora_enabled =
            "false" == "1" || "false".eq_ignore_ascii_case("true");
        assert!(!config.integrations.ble.miflora_enabled);
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }

    #[test]
    fn should_return_io_error_when_path_is_a_directory() {
        // Reading a directory instead of a file triggers an IO error.
        let result = Config::from_file(".");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn should_return_parse_error_for_malformed_file() {
        // Create a temp file with invalid TOML content
        let dir = std::env::temp_dir().join("minihub_test_config");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        std::fs::write(&path, "[server\ninvalid").unwrap();

        let result = Config::from_file(path.to_str().unwrap());
        assert!(result.is_err());
        assert!(matches!(result.unwrap_err(), ConfigError::Parse(_)));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn should_display_config_errors() {
        let err = ConfigError::Validation("port must be non-zero".to_string());
        assert_eq!(
            err.to_string(),
            "invalid configuration: port must be non-zero"
        );
    }

    #[test]
    fn should_default_new_ambient_sections() {
        let config = Config::default();
        assert!(config.integrations.esphome.enabled);
        assert!(config.integrations.hue.enabled);
        assert_eq!(config.integrations.hue.rate_limit_per_s, 10);
        assert!(config.hub.hub_id.is_none());
        assert_eq!(config.hub.hub_name, "minihub");
        assert!(config.remote_store.remote_store_url.is_none());
        assert!(config.discovery.enabled);
        assert_eq!(config.discovery.interval_s, 30);
        assert_eq!(config.telemetry.heartbeat_interval_s, 30);
        assert_eq!(config.command_consumer.poll_interval_s, 2);
        assert!(config.adapter_timeouts.is_empty());
    }

    #[test]
    fn should_parse_ambient_sections_from_toml() {
        let toml = r#"
            [hub]
            hub_id = "hub-123"
            hub_name = "Living Room Hub"

            [remote_store]
            remote_store_url = "https://store.example.com"
            remote_store_key = "secret"

            [discovery]
            enabled = false
            interval_s = 60

            [telemetry]
            heartbeat_interval_s = 15

            [command_consumer]
            poll_interval_s = 5

            [adapter_timeouts]
            hue = 20

            [integrations.esphome]
            enabled = false
            password = "changeme"

            [integrations.hue]
            rate_limit_per_s = 3
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.hub.hub_id.as_deref(), Some("hub-123"));
        assert_eq!(config.remote_store.remote_store_url.as_deref(), Some("https://store.example.com"));
        assert!(!config.discovery.enabled);
        assert_eq!(config.discovery.interval_s, 60);
        assert_eq!(config.telemetry.heartbeat_interval_s, 15);
        assert_eq!(config.command_consumer.poll_interval_s, 5);
        assert_eq!(config.adapter_timeouts.get("hue"), Some(&20));
        assert!(!config.integrations.esphome.enabled);
        assert_eq!(config.integrations.esphome.password.as_deref(), Some("changeme"));
        assert_eq!(config.integrations.hue.rate_limit_per_s, 3);
    }

    #[test]
    fn should_apply_adapter_timeout_override_or_fall_back_to_default() {
        let mut config = Config::default();
        assert_eq!(config.adapter_timeout_secs("hue", 15), 15);
        config.adapter_timeouts.insert("hue".to_string(), 45);
        assert_eq!(config.adapter_timeout_secs("hue", 15), 45);
    }

    #[test]
    fn should_debug_format_config() {
        let config = Config::default();
        let debug = format!("{config:?}");
        assert!(debug.contains("Config"));
    }

    #[test]
    fn should_use_logging_filter_default() {
        let config = Config::default();
        assert!(config.logging.filter.contains("info"));
    }

    #[test]
    fn should_default_dashboard_dir_to_none() {
        let config = Config::default();
        assert!(config.server.dashboard_dir.is_none());
        assert!(config.dashboard_dir().is_none());
    }

    #[test]
    fn should_parse_dashboard_dir_from_toml() {
        let toml = r#"
            [server]
            dashboard_dir = "/var/www/dashboard"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.server.dashboard_dir.as_deref(),
            Some("/var/www/dashboard")
        );
        assert_eq!(
            config.dashboard_dir(),
            Some(std::path::PathBuf::from("/var/www/dashboard"))
        );
    }

    #[test]
    fn should_parse_relative_dashboard_dir_from_toml() {
        let toml = r#"
            [server]
            dashboard_dir = "./dist"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.dashboard_dir.as_deref(), Some("./dist"));
        assert_eq!(
            config.dashboard_dir(),
            Some(std::path::PathBuf::from("./dist"))
        );
    }

    #[test]
    fn should_override_dashboard_dir_with_env_var() {
        // Create a temp TOML file with dashboard_dir set
        let dir = std::env::temp_dir().join("minihub_test_config_dashboard");
        std::fs::create_dir_all(&dir).unwrap();
        let config_path = dir.join("test_dashboard.toml");
        std::fs::write(
            &config_path,
            r#"
            [server]
            dashboard_dir = "/original/path"
            "#,
        )
        .unwrap();

        let mut config: Config =
            toml::from_str(&std::fs::read_to_string(&config_path).unwrap()).unwrap();

        // Simulate environment variable override
        config.server.dashboard_dir = Some("/overridden/path".to_string());

        assert_eq!(
            config.server.dashboard_dir.as_deref(),
            Some("/overridden/path")
        );
        assert_eq!(
            config.dashboard_dir(),
            Some(std::path::PathBuf::from("/overridden/path"))
        );

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn should_apply_minihub_dashboard_dir_env_override() {
        let toml = r#"
            [server]
            dashboard_dir = "/original"
        "#;
        let mut config: Config = toml::from_str(toml).unwrap();

        // Simulate what apply_env_overrides does when MINIHUB_DASHBOARD_DIR is set
        config.server.dashboard_dir = Some("/env/override".to_string());

        assert_eq!(
            config.server.dashboard_dir.as_deref(),
            Some("/env/override")
        );
    }

    #[test]
    fn should_handle_empty_dashboard_dir_in_toml() {
        let toml = r"
            [server]
            port = 8080
        ";
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.server.dashboard_dir.is_none());
        assert!(config.dashboard_dir().is_none());
    }

    #[test]
    fn should_return_pathbuf_from_dashboard_dir_accessor() {
        let mut config = Config::default();
        config.server.dashboard_dir = Some("/test/path".to_string());

        let path_buf = config.dashboard_dir();
        assert!(path_buf.is_some());
        assert_eq!(path_buf.unwrap(), std::path::PathBuf::from("/test/path"));
    }

    #[test]
    fn should_preserve_dashboard_dir_through_full_config_lifecycle() {
        let toml = r#"
            [server]
            host = "127.0.0.1"
            port = 8080
            dashboard_dir = "/custom/dashboard"

            [database]
            url = "sqlite:test.db"
        "#;
        let config: Config = toml::from_str(toml).unwrap();

        // Verify dashboard_dir is preserved alongside other config
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(
            config.server.dashboard_dir.as_deref(),
            Some("/custom/dashboard")
        );
        assert_eq!(config.database.url, "sqlite:test.db");
    }
}
