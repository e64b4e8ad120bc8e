//! hostchecker - HTTP(S) availability exporter
//!
//! Probes a configured list of HTTP(S) endpoints whenever Prometheus scrapes
//! the exporter, and reports whether each one is up, how long it took to
//! answer, and how many days its TLS certificate has left.
//!
//! # Architecture
//!
//! ```text
//! Config (targets) → SiteCollector → Checker per target → samples → SiteExporter → /metrics
//! ```
//!
//! Probing only happens inside a scrape: there is no background polling and
//! nothing is cached between scrapes.
//!
//! # Modules
//!
//! - [`checker`] - Probe one target (HTTP today)
//! - [`collector`] - Bounded-concurrency scan and sample mapping
//! - [`config`] - YAML configuration
//! - [`error`] - Error types
//! - [`exporter`] - Prometheus collector adapter and metrics listener

pub mod checker;
pub mod collector;
pub mod config;
pub mod error;
pub mod exporter;

// Re-export commonly used types
pub use checker::{CheckError, CheckOutcome, Checker, HttpChecker, Target};
pub use collector::{MetricDescriptor, MetricSample, ScanReport, SiteCollector};
pub use config::Config;
pub use error::{Error, Result};
pub use exporter::SiteExporter;
