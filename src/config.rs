//! Configuration management for Ampere
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files with environment variable overrides for the
//! deployment-facing settings (`PORT`, `BRIDGE_URL`, `BRIDGE_SECRET`).

use crate::error::{AmpereError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

mod defaults;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Web server binding configuration
    pub web: WebConfig,

    /// Outbound bridge webhook configuration
    pub bridge: BridgeConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Liveness sweep periods and thresholds
    pub liveness: LivenessConfig,

    /// History retention bounds
    pub history: HistoryConfig,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,
}

/// Outbound bridge webhook configuration
///
/// The bridge mirrors lifecycle and telemetry events to an external
/// record-keeping service. It is enabled only when `url` is non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Webhook endpoint URL (empty disables the bridge)
    pub url: String,

    /// Shared secret sent as the `x-bridge-secret` header
    pub secret: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Directory for rotated log files
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// Liveness sweep periods and thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LivenessConfig {
    /// Heartbeat sweep period in seconds
    pub heartbeat_sweep_secs: u64,

    /// Station is considered gone after this many seconds without a heartbeat
    pub heartbeat_timeout_secs: u64,

    /// Ghost-power sweep period in seconds
    pub ghost_sweep_secs: u64,

    /// Session is considered a ghost after this many seconds at zero power
    pub ghost_zero_power_secs: u64,
}

/// History retention bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum retained completed sessions
    pub completed_cap: usize,

    /// Maximum retained activity log entries
    pub activity_cap: usize,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration with validation
    ///
    /// Searches the default file locations, falls back to defaults, then
    /// applies environment overrides on top of whatever was loaded.
    pub fn load() -> Result<Self> {
        let default_paths = [
            "ampere_config.yaml",
            "/data/ampere_config.yaml",
            "/etc/ampere/config.yaml",
        ];

        let mut config = Config::default();
        for path in &default_paths {
            if Path::new(path).exists() {
                config = Self::from_file(path)?;
                break;
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `PORT`, `BRIDGE_URL` and `BRIDGE_SECRET` from the environment
    pub fn apply_env_overrides(&mut self) {
        if let Ok(port) = std::env::var("PORT")
            && let Ok(port) = port.trim().parse::<u16>()
        {
            self.web.port = port;
        }
        if let Ok(url) = std::env::var("BRIDGE_URL") {
            self.bridge.url = url;
        }
        if let Ok(secret) = std::env::var("BRIDGE_SECRET") {
            self.bridge.secret = secret;
        }
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.web.port == 0 {
            return Err(AmpereError::config("web.port must be greater than 0"));
        }

        if self.liveness.heartbeat_sweep_secs == 0 || self.liveness.ghost_sweep_secs == 0 {
            return Err(AmpereError::config(
                "liveness sweep periods must be greater than 0",
            ));
        }

        if self.liveness.heartbeat_timeout_secs == 0 || self.liveness.ghost_zero_power_secs == 0 {
            return Err(AmpereError::config(
                "liveness timeout thresholds must be greater than 0",
            ));
        }

        if self.history.completed_cap == 0 || self.history.activity_cap == 0 {
            return Err(AmpereError::config(
                "history retention caps must be greater than 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.web.port, 8080);
        assert_eq!(config.liveness.heartbeat_timeout_secs, 60);
        assert_eq!(config.history.completed_cap, 1000);
        assert!(config.bridge.url.is_empty());
    }

    #[test]
    fn zero_port_rejected() {
        let mut config = Config::default();
        config.web.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_caps_rejected() {
        let mut config = Config::default();
        config.history.completed_cap = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn yaml_round_trip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.web.port, config.web.port);
        assert_eq!(parsed.logging.level, config.logging.level);
    }
}
