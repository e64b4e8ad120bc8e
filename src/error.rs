//! Error types for hostchecker
//!
//! These cover the startup path of the exporter (configuration, HTTP client,
//! metrics registration, listener). Probe failures are never represented
//! here: an unreachable target is an observation, and a misconfigured target
//! is reported per-target through [`crate::checker::CheckError`].

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while setting up or serving the exporter
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be read
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid YAML for our schema
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// Semantically invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    /// Metric registration or encoding error
    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
