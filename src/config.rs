// Configuration management module
// This file handles loading of configuration settings from built-in
// defaults overlaid by APP__* environment variables
//
// obs-instrument maintainers 2026 Oct

use crate::errors::{ObsError, Result};
use config::builder::{ConfigBuilder, DefaultState};
use serde::Deserialize;
use std::net::SocketAddr;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_METRICS_PATH: &str = "/actuator/prometheus";

const RESERVED_PATHS: &[&str] = &["/api/hello", "/healthz", "/debug/sleep", "/debug/error"];

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Listen address for the HTTP server, e.g. 0.0.0.0:8080
    pub bind_addr: String,
    /// Path serving the Prometheus text exposition
    pub metrics_path: String,
    /// Register the process collector (cpu, memory, fds); Linux only
    pub process_metrics: bool,
    #[serde(default)]
    pub obs: ObsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObsConfig {
    #[serde(default)]
    pub debug: DebugConfig,
}

/// Debug endpoints for exercising dashboards and alerts.
/// Keep disabled in production.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DebugConfig {
    #[serde(default)]
    pub enabled: bool,
}

impl AppConfig {
    /// Load from defaults and the environment (`APP__BIND_ADDR`,
    /// `APP__OBS__DEBUG__ENABLED`, ...).
    pub fn load() -> Result<Self> {
        let cfg = Self::defaults()?
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Self::finish(cfg)
    }

    /// Build from an inline YAML document layered over the defaults.
    pub fn from_yaml(doc: &str) -> Result<Self> {
        let cfg = Self::defaults()?
            .add_source(config::File::from_str(doc, config::FileFormat::Yaml))
            .build()?;
        Self::finish(cfg)
    }

    pub fn debug_enabled(&self) -> bool {
        self.obs.debug.enabled
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_addr
            .parse()
            .map_err(|err: std::net::AddrParseError| ObsError::InvalidAddress {
                addr: self.bind_addr.clone(),
                reason: err.to_string(),
            })
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        Ok(config::Config::builder()
            .set_default("bind_addr", DEFAULT_BIND_ADDR)?
            .set_default("metrics_path", DEFAULT_METRICS_PATH)?
            .set_default("process_metrics", true)?
            .set_default("obs.debug.enabled", false)?)
    }

    fn finish(cfg: config::Config) -> Result<Self> {
        let parsed: Self = cfg.try_deserialize()?;
        if !parsed.metrics_path.starts_with('/') {
            return Err(ObsError::Config(config::ConfigError::Message(format!(
                "metrics_path must start with '/': {}",
                parsed.metrics_path
            ))));
        }
        // axum treats ':' and '*' as route captures
        if parsed.metrics_path.contains([':', '*']) {
            return Err(ObsError::Config(config::ConfigError::Message(format!(
                "metrics_path must be a literal path: {}",
                parsed.metrics_path
            ))));
        }
        if RESERVED_PATHS.contains(&parsed.metrics_path.as_str()) {
            return Err(ObsError::Config(config::ConfigError::Message(format!(
                "metrics_path collides with a built-in route: {}",
                parsed.metrics_path
            ))));
        }
        Ok(parsed)
    }
}
