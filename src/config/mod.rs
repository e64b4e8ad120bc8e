//! Configuration
//!
//! Loads the YAML file listing the targets to check:
//!
//! ```yaml
//! debug: false
//! port: 8080
//! timeout: 10
//! max_concurrent_checks: 3
//! targets:
//!   http:
//!     - name: example
//!       url: https://example.com
//!       method: GET
//!       codes: [200]
//! ```
//!
//! Everything except the target `name` and `url` is optional.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::checker::{Target, DEFAULT_TIMEOUT};
use crate::collector::MAX_CONCURRENT_CHECKS;
use crate::error::{Error, Result};

/// Default listener port
pub const DEFAULT_PORT: u16 = 8080;

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_max_concurrent_checks() -> usize {
    MAX_CONCURRENT_CHECKS
}

/// Top level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Log debug messages
    #[serde(default)]
    pub debug: bool,

    /// Port the metrics listener binds to
    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-request timeout, in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Maximum number of sites checked at once
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,

    /// Targets to check
    #[serde(default)]
    pub targets: Targets,
}

/// Targets grouped by protocol
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Targets {
    #[serde(default)]
    pub http: Vec<Target>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            port: DEFAULT_PORT,
            timeout: default_timeout(),
            max_concurrent_checks: MAX_CONCURRENT_CHECKS,
            targets: Targets::default(),
        }
    }
}

impl Config {
    /// Read and parse a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse configuration text, applying target defaults
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        let config = config.normalized();
        config.validate()?;
        Ok(config)
    }

    fn normalized(mut self) -> Self {
        self.targets.http = self
            .targets
            .http
            .into_iter()
            .map(Target::normalized)
            .collect();
        self
    }

    /// Reject settings the collector cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.timeout == 0 {
            return Err(Error::Config("timeout must be at least 1 second".to_string()));
        }
        if let Some(target) = self.targets.http.iter().find(|t| t.url.trim().is_empty()) {
            return Err(Error::Config(format!(
                "target {:?} has no url",
                target.name
            )));
        }

        let mut seen = HashSet::with_capacity(self.targets.http.len());
        for target in &self.targets.http {
            if !seen.insert((target.name.as_str(), target.url.as_str())) {
                return Err(Error::Config(format!(
                    "target {:?} with url {} is listed more than once",
                    target.name, target.url
                )));
            }
        }
        Ok(())
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}
