use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Main configuration structure for the control plane.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub control_plane: ControlPlaneConfig,

    #[serde(default)]
    pub freeze: FreezeConfig,

    #[serde(default)]
    pub match_engine: MatchEngineConfig,

    #[serde(default)]
    pub event_bus: EventBusConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub development: DevelopmentConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if missing.
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    "Failed to load config from {:?}: {}. Using defaults.",
                    path.as_ref(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn default_toml() -> Result<String> {
        toml::to_string_pretty(&Self::default()).context("Failed to serialize default config")
    }

    /// Validate the configuration for obvious misconfiguration.
    pub fn validate(&self) -> Result<()> {
        if self.control_plane.sidecar_port == 0 {
            anyhow::bail!("control_plane.sidecar_port cannot be 0");
        }
        if self.control_plane.rpc_port == 0 {
            anyhow::bail!("control_plane.rpc_port cannot be 0");
        }
        if self.control_plane.rate_limit_enabled && self.control_plane.rate_limit_rpm == 0 {
            anyhow::bail!("rate_limit_rpm must be greater than 0 when rate limiting is enabled");
        }
        if self.freeze.default_timeout_secs == 0 {
            anyhow::bail!("freeze.default_timeout_secs cannot be 0");
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => anyhow::bail!("Invalid log level: {}", other),
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("Failed to parse config")
    }
}

/// Runtime server configuration for both transports the control plane hosts.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ControlPlaneConfig {
    #[serde(default = "default_host")]
    pub host: String,

    /// Listener for sidecar-facing traffic (`/check`, `/snapshot`, `/app-snapshot`).
    #[serde(default = "default_sidecar_port")]
    pub sidecar_port: u16,

    /// Listener for the CLI-facing RPC surface.
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,

    #[serde(default)]
    pub verbose: bool,

    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    #[serde(default)]
    pub rate_limit_enabled: bool,

    #[serde(default = "default_rate_limit_rpm")]
    pub rate_limit_rpm: u32,

    #[serde(default)]
    pub auth_enabled: bool,

    #[serde(default)]
    pub api_keys: Vec<String>,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            sidecar_port: default_sidecar_port(),
            rpc_port: default_rpc_port(),
            verbose: false,
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            rate_limit_enabled: false,
            rate_limit_rpm: default_rate_limit_rpm(),
            auth_enabled: false,
            api_keys: Vec::new(),
        }
    }
}

/// Freeze lifecycle tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FreezeConfig {
    /// Default auto-release timeout for a freeze, in seconds.
    #[serde(default = "default_freeze_timeout")]
    pub default_timeout_secs: u64,

    /// Grace period after release during which late `/check` polls still see
    /// `allow` and may collect a pending override. Must exceed the sidecar's
    /// worst-case dispatch timeout plus expected RTT.
    #[serde(default = "default_grace_period_ms")]
    pub release_grace_period_ms: u64,
}

impl Default for FreezeConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_freeze_timeout(),
            release_grace_period_ms: default_grace_period_ms(),
        }
    }
}

/// Controls whether the match engine evaluates breakpoints at all.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatchEngineConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for MatchEngineConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Event bus fan-out tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventBusConfig {
    /// Per-subscriber bounded queue capacity; publish drops on overflow.
    #[serde(default = "default_subscriber_capacity")]
    pub subscriber_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            subscriber_capacity: default_subscriber_capacity(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub include_modules: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            include_modules: false,
        }
    }
}

/// Development-only toggles.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DevelopmentConfig {
    #[serde(default)]
    pub cors_allow_all: bool,
}

// Default providers ---------------------------------------------------------

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_sidecar_port() -> u16 {
    9000
}

fn default_rpc_port() -> u16 {
    9090
}

fn default_true() -> bool {
    true
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_rate_limit_rpm() -> u32 {
    1000
}

fn default_freeze_timeout() -> u64 {
    30
}

fn default_grace_period_ms() -> u64 {
    5_000
}

fn default_subscriber_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.control_plane.host, "127.0.0.1");
        assert_eq!(config.control_plane.sidecar_port, 9000);
        assert_eq!(config.control_plane.rpc_port, 9090);
        assert!(config.match_engine.enabled);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_port() {
        let mut config = Config::default();
        config.control_plane.sidecar_port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [control_plane]
            host = "0.0.0.0"
            sidecar_port = 9001
            rpc_port = 9091

            [freeze]
            default_timeout_secs = 60

            [logging]
            level = "debug"
        "#;

        let config = Config::from_str(toml_str).unwrap();
        assert_eq!(config.control_plane.host, "0.0.0.0");
        assert_eq!(config.control_plane.sidecar_port, 9001);
        assert_eq!(config.freeze.default_timeout_secs, 60);
        assert_eq!(config.logging.level, "debug");
    }
}
