//! Site Collector
//!
//! Runs one scan over every configured target per collection request and
//! turns the outcomes into metric samples.
//!
//! # Concurrency
//!
//! ```text
//! scan() ──▶ acquire permit ──▶ spawn check ──▶ ... ──▶ join all ──▶ reports
//!                 ▲                    │
//!                 └── permit released ─┘ (as soon as the check finishes)
//! ```
//!
//! At most `max_concurrent_checks` probes are in flight at any time, however
//! many targets are configured. A scan only returns once every spawned check
//! has finished, so a scrape always reflects every target.

mod metrics;

use std::any::Any;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use reqwest::Client;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::checker::{build_client, CheckError, CheckOutcome, Checker, HttpChecker, Target};
use crate::config::Config;
use crate::error::Result;

pub use metrics::{
    MetricDescriptor, MetricSample, CERTIFICATE_EXPIRY, CHECK_ERROR, LABEL_ERROR, LABEL_SITE_NAME,
    LABEL_SITE_URL, SITE_LATENCY_SECONDS, SITE_UP,
};

/// Maximum number of sites checked concurrently, unless configured otherwise
pub const MAX_CONCURRENT_CHECKS: usize = 3;

/// Result of checking one target during a scan.
#[derive(Debug)]
pub struct ScanReport {
    /// What the probe observed
    pub outcome: CheckOutcome,

    /// Set when the request for the target could not be built
    pub error: Option<CheckError>,
}

/// Checks a list of targets and exposes the results as metric samples.
pub struct SiteCollector {
    checkers: Vec<Arc<dyn Checker>>,
    max_concurrent_checks: usize,
    descriptors: Vec<MetricDescriptor>,
}

impl SiteCollector {
    /// Create a collector with one HTTP checker per target, sharing `client`.
    pub fn new(targets: impl IntoIterator<Item = Target>, client: Client) -> Self {
        let checkers = targets
            .into_iter()
            .map(|target| Arc::new(HttpChecker::new(target, client.clone())) as Arc<dyn Checker>)
            .collect();
        Self::from_checkers(checkers)
    }

    /// Create a collector for the HTTP targets of a loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = build_client(config.timeout())?;
        Ok(Self::new(config.targets.http.iter().cloned(), client)
            .with_max_concurrent_checks(config.max_concurrent_checks))
    }

    /// Create a collector from arbitrary checkers.
    pub fn from_checkers(checkers: Vec<Arc<dyn Checker>>) -> Self {
        Self {
            checkers,
            max_concurrent_checks: MAX_CONCURRENT_CHECKS,
            descriptors: MetricDescriptor::site_series(),
        }
    }

    /// Set the concurrency ceiling. Zero is treated as one.
    pub fn with_max_concurrent_checks(mut self, max: usize) -> Self {
        self.max_concurrent_checks = max.max(1);
        self
    }

    /// Current concurrency ceiling
    pub fn max_concurrent_checks(&self) -> usize {
        self.max_concurrent_checks
    }

    /// Targets in configuration order
    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.checkers.iter().map(|checker| checker.target())
    }

    /// Series this collector always declares. The error series is not among them.
    pub fn describe(&self) -> &[MetricDescriptor] {
        &self.descriptors
    }

    /// Check every target once and return one report per target.
    ///
    /// Reports are in configuration order.
    pub async fn scan(&self) -> Vec<ScanReport> {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_checks));
        let mut tasks = JoinSet::new();

        for (index, checker) in self.checkers.iter().enumerate() {
            // Local to this scan and never closed, so acquisition cannot fail.
            let permit = Arc::clone(&semaphore).acquire_owned().await.ok();
            let checker = Arc::clone(checker);

            tasks.spawn(async move {
                let report = run_check(checker).await;
                drop(permit);
                (index, report)
            });
        }

        let mut indexed = Vec::with_capacity(self.checkers.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => indexed.push(entry),
                Err(e) => error!(error = %e, "check task did not complete"),
            }
        }
        indexed.sort_by_key(|(index, _)| *index);
        let reports: Vec<ScanReport> = indexed.into_iter().map(|(_, report)| report).collect();

        debug!(
            targets = self.checkers.len(),
            up = reports.iter().filter(|r| r.outcome.up()).count(),
            errors = reports.iter().filter(|r| r.error.is_some()).count(),
            "scan finished"
        );

        reports
    }

    /// Scan all targets and map the outcomes to metric samples.
    ///
    /// Targets sharing a name and URL would land on the same series, so only
    /// the first one in configuration order is reported and the others are
    /// logged at warn.
    pub async fn collect(&self) -> Vec<MetricSample> {
        let reports = self.scan().await;
        let mut seen = HashSet::with_capacity(reports.len());
        let mut samples = Vec::new();

        for report in &reports {
            let target = &report.outcome.target;
            if !seen.insert((target.name.as_str(), target.url.as_str())) {
                warn!(
                    url = %target.url,
                    name = %target.name,
                    "duplicate target, reporting only the first one"
                );
                continue;
            }
            samples.extend(report.samples());
        }

        samples
    }
}

impl std::fmt::Debug for SiteCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteCollector")
            .field("targets", &self.checkers.len())
            .field("max_concurrent_checks", &self.max_concurrent_checks)
            .finish_non_exhaustive()
    }
}

/// Run one check. A panicking checker still yields a report for its target.
async fn run_check(checker: Arc<dyn Checker>) -> ScanReport {
    match AssertUnwindSafe(checker.check()).catch_unwind().await {
        Ok((outcome, error)) => {
            if let Some(ref e) = error {
                warn!(
                    url = %outcome.target.url,
                    name = %outcome.target.name,
                    error = %e,
                    "site check could not be performed"
                );
            }
            ScanReport { outcome, error }
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            let target = checker.target().clone();
            error!(url = %target.url, name = %target.name, panic = %message, "site check panicked");
            ScanReport {
                outcome: CheckOutcome::unreachable(target),
                error: Some(CheckError::Aborted(message)),
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
