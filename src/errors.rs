// Error types and error handling module
// This file defines the error type shared by the registry, config and API
// layers of obs-instrument
//
// obs-instrument maintainers 2026 Oct

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObsError {
    #[error("metrics registry error: {0}")]
    Registry(#[from] prometheus::Error),
    #[error("metrics encoding error: {0}")]
    Encode(String),
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("invalid address {addr}: {reason}")]
    InvalidAddress { addr: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ObsError>;
