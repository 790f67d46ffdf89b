use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Configuration for a single sidecar instance. One sidecar fronts one
/// service: it listens for inbound traffic, long-polls the control plane,
/// and forwards to the service's real upstream listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SidecarConfig {
    #[serde(default = "default_host")]
    pub listen_host: String,

    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Base URL of the control plane's sidecar-facing surface, standing in
    /// for Envoy's logical `control_plane` cluster name.
    #[serde(default = "default_control_plane_url")]
    pub control_plane_url: String,

    /// Base URL of the real service this sidecar fronts.
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,

    /// Per-`/check`-dispatch timeout; a dead control plane must fail open
    /// within this bound.
    #[serde(default = "default_dispatch_timeout_ms")]
    pub dispatch_timeout_ms: u64,

    /// Delay between successive long-poll iterations while a trace stays
    /// frozen, so the loop does not busy-spin.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub verbose: bool,
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            listen_host: default_host(),
            listen_port: default_listen_port(),
            control_plane_url: default_control_plane_url(),
            upstream_url: default_upstream_url(),
            dispatch_timeout_ms: default_dispatch_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            verbose: false,
        }
    }
}

impl SidecarConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path.as_ref()).context("Failed to read sidecar config file")?;
        let config: Self = toml::from_str(&contents).context("Failed to parse sidecar config file")?;
        Ok(config)
    }

    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    "Failed to load sidecar config from {:?}: {}. Using defaults.",
                    path.as_ref(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen_port == 0 {
            anyhow::bail!("listen_port cannot be 0");
        }
        if self.control_plane_url.is_empty() {
            anyhow::bail!("control_plane_url cannot be empty");
        }
        if self.upstream_url.is_empty() {
            anyhow::bail!("upstream_url cannot be empty");
        }
        if self.dispatch_timeout_ms == 0 {
            anyhow::bail!("dispatch_timeout_ms cannot be 0");
        }
        Ok(())
    }
}

impl FromStr for SidecarConfig {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("Failed to parse sidecar config")
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    8081
}

fn default_control_plane_url() -> String {
    "http://127.0.0.1:9000".to_string()
}

fn default_upstream_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_dispatch_timeout_ms() -> u64 {
    5_000
}

fn default_poll_interval_ms() -> u64 {
    250
}
