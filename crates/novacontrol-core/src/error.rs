//! Error types
//!
//! Rejected intents are not errors: the safety guard answers `false` and
//! the caller drops the intent.

use std::path::PathBuf;
use thiserror::Error;

/// Event bus errors
#[derive(Debug, Error)]
pub enum BusError {
    /// An operation ran before its hand-off point was established
    #[error("invalid bus state: {0}")]
    InvalidState(&'static str),
}

/// Malformed wire records
#[derive(Debug, Error, PartialEq)]
pub enum WireError {
    #[error("unknown event type '{0}'")]
    UnknownType(String),
    #[error("{kind} event is missing metadata '{key}'")]
    MissingMeta { kind: String, key: &'static str },
    #[error("confidence {0} is not a finite number")]
    InvalidConfidence(f64),
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}
