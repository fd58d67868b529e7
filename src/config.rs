//! Runtime configuration: an optional TOML file plus environment overrides.

use crate::device::ChannelMap;
use crate::error::{RelayError, Result};
use crate::model::Channel;
use crate::store::Lookback;
use crate::web::WebConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Overrides `upstream.base_url`.
pub const ENV_UPSTREAM_URL: &str = "API_GATEWAY_URL";
/// Overrides `store.table`.
pub const ENV_TABLE: &str = "PI_EVERYWHERE_TABLE";
/// Overrides `auth.token`.
pub const ENV_AUTH_TOKEN: &str = "PI_EVERYWHERE_AUTH_TOKEN";

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub web: WebConfig,
    pub store: StoreConfig,
    pub upstream: UpstreamConfig,
    pub hardware: HardwareConfig,
    pub poll: PollConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    Memory,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackendKind,
    /// Directory holding the JSON-lines log when `backend = "file"`
    pub data_dir: PathBuf,
    pub table: String,
    /// How far back "latest" looks; 0 means no limit
    pub lookback_days: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackendKind::Memory,
            data_dir: PathBuf::from("data"),
            table: "pi_everywhere".to_string(),
            lookback_days: crate::DEFAULT_LOOKBACK_DAYS as u32,
        }
    }
}

impl StoreConfig {
    pub fn lookback(&self) -> Lookback {
        match self.lookback_days {
            0 => Lookback::Unbounded,
            days => Lookback::days(i64::from(days)),
        }
    }

    /// Path of the log file for the configured table.
    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.jsonl", self.table))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 10,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// SPI clock for the ADC
    pub spi_hz: u32,
    pub channels: ChannelMap,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            spi_hz: 1_000_000,
            channels: ChannelMap::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_secs: u64,
    /// Analog channels sampled on every tick
    pub channels: Vec<Channel>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: crate::DEFAULT_POLL_INTERVAL_SECS,
            channels: vec![0, 1, 2],
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token the authorizer accepts; every request is denied when unset
    pub token: Option<String>,
}

impl RelayConfig {
    /// Load from `path` (or defaults), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                debug!("No configuration file given, using defaults");
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RelayError::config_error(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| RelayError::config_error(format!("Failed to parse config: {}", e)))
    }

    /// Apply overrides from `lookup`, usually the process environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_UPSTREAM_URL).filter(|v| !v.is_empty()) {
            self.upstream.base_url = Some(url);
        }
        if let Some(table) = lookup(ENV_TABLE).filter(|v| !v.is_empty()) {
            self.store.table = table;
        }
        if let Some(token) = lookup(ENV_AUTH_TOKEN).filter(|v| !v.is_empty()) {
            self.auth.token = Some(token);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.store.table.is_empty() {
            return Err(RelayError::config_error("store.table must not be empty"));
        }
        if self.upstream.timeout_secs == 0 {
            return Err(RelayError::config_error("upstream.timeout_secs must be positive"));
        }
        if self.poll.interval_secs == 0 {
            return Err(RelayError::config_error("poll.interval_secs must be positive"));
        }
        self.web.socket_addr()?;
        self.hardware.channels.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = RelayConfig::from_toml("").unwrap();
        assert_eq!(config.web.port, crate::DEFAULT_WEB_PORT);
        assert_eq!(config.store.backend, StoreBackendKind::Memory);
        assert_eq!(config.poll.interval_secs, crate::DEFAULT_POLL_INTERVAL_SECS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sections_parse() {
        let config = RelayConfig::from_toml(
            r#"
            [web]
            port = 9090

            [store]
            backend = "file"
            data_dir = "/var/lib/pi"
            table = "readings"
            lookback_days = 0

            [upstream]
            base_url = "https://api.example.com/prod"
            timeout_secs = 3

            [hardware.channels]
            led = 21
            light_sensor = 1

            [[hardware.channels.analog_inputs]]
            name = "Light"
            channel = 1
            calibration = { type = "reverse_percent" }

            [[hardware.channels.digital_outputs]]
            name = "Blue LED"
            channel = 21
            "#,
        )
        .unwrap();

        assert_eq!(config.web.port, 9090);
        assert_eq!(config.store.lookback(), Lookback::Unbounded);
        assert_eq!(config.store.log_path(), PathBuf::from("/var/lib/pi/readings.jsonl"));
        assert_eq!(config.upstream.timeout(), Duration::from_secs(3));
        assert_eq!(config.hardware.channels.led_output().unwrap().name, "Blue LED");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_UPSTREAM_URL, "https://gw.example.com"),
            (ENV_TABLE, "pi_prod"),
            (ENV_AUTH_TOKEN, ""),
        ]
        .into_iter()
        .collect();

        let mut config = RelayConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.upstream.base_url.as_deref(), Some("https://gw.example.com"));
        assert_eq!(config.store.table, "pi_prod");
        assert!(config.auth.token.is_none());
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let err = RelayConfig::from_toml("[store]\nbackend = \"dynamo\"").unwrap_err();
        assert!(matches!(err, RelayError::Config(_)));
    }
}
