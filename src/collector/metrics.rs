//! Metric series produced by the site collector
//!
//! Descriptors are plain values owned by the [`super::SiteCollector`]; the
//! exporter turns them into Prometheus descriptors when it is constructed.

use super::ScanReport;

/// Gauge: 1 if the site is up, 0 otherwise
pub const SITE_UP: &str = "hostchecker_site_up";

/// Gauge: time to check the site, in seconds
pub const SITE_LATENCY_SECONDS: &str = "hostchecker_site_latency_seconds";

/// Gauge: days until the site's certificate expires, negative once expired
pub const CERTIFICATE_EXPIRY: &str = "hostchecker_certificate_expiry";

/// Gauge: a site's check could not be configured. Never pre-declared.
pub const CHECK_ERROR: &str = "hostchecker_error";

pub const LABEL_SITE_URL: &str = "site_url";
pub const LABEL_SITE_NAME: &str = "site_name";
pub const LABEL_ERROR: &str = "error";

const SITE_LABELS: &[&str] = &[LABEL_SITE_URL, LABEL_SITE_NAME];
const ERROR_LABELS: &[&str] = &[LABEL_SITE_URL, LABEL_SITE_NAME, LABEL_ERROR];

const SECONDS_PER_DAY: f64 = 24.0 * 60.0 * 60.0;

/// Name, help text and label names of a metric series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

impl MetricDescriptor {
    /// Descriptors for the series every healthy site may report.
    pub fn site_series() -> Vec<MetricDescriptor> {
        vec![
            MetricDescriptor {
                name: SITE_UP,
                help: "Set to 1 if the site is up",
                labels: SITE_LABELS,
            },
            MetricDescriptor {
                name: SITE_LATENCY_SECONDS,
                help: "Time to check the site, in seconds",
                labels: SITE_LABELS,
            },
            MetricDescriptor {
                name: CERTIFICATE_EXPIRY,
                help: "Number of days before the HTTPS certificate expires",
                labels: SITE_LABELS,
            },
        ]
    }

    /// Descriptor of the ad-hoc error series.
    pub fn check_error() -> MetricDescriptor {
        MetricDescriptor {
            name: CHECK_ERROR,
            help: "Set to 1 if the check for a site could not be set up",
            labels: ERROR_LABELS,
        }
    }
}

/// One metric point.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub name: &'static str,
    pub labels: Vec<(&'static str, String)>,
    pub value: f64,
}

impl MetricSample {
    fn site(name: &'static str, report: &ScanReport, value: f64) -> Self {
        let target = &report.outcome.target;
        Self {
            name,
            labels: vec![
                (LABEL_SITE_URL, target.url.clone()),
                (LABEL_SITE_NAME, target.name.clone()),
            ],
            value,
        }
    }

    /// Value of the label `key`, if present
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl ScanReport {
    /// Map this report to the samples exposed for its target.
    ///
    /// - configuration error: a single error sample
    /// - down: a single `site_up` 0
    /// - up: `site_up` 1, latency, and certificate expiry for TLS targets
    pub fn samples(&self) -> Vec<MetricSample> {
        if let Some(ref err) = self.error {
            let target = &self.outcome.target;
            return vec![MetricSample {
                name: CHECK_ERROR,
                labels: vec![
                    (LABEL_SITE_URL, target.url.clone()),
                    (LABEL_SITE_NAME, target.name.clone()),
                    (LABEL_ERROR, err.to_string()),
                ],
                value: 1.0,
            }];
        }

        let outcome = &self.outcome;
        if !outcome.up() {
            return vec![MetricSample::site(SITE_UP, self, 0.0)];
        }

        let mut samples = Vec::with_capacity(3);
        samples.push(MetricSample::site(SITE_UP, self, 1.0));
        samples.push(MetricSample::site(
            SITE_LATENCY_SECONDS,
            self,
            outcome.latency.unwrap_or_default().as_secs_f64(),
        ));

        if let Some(remaining) = outcome.certificate_remaining {
            let days = remaining.num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY;
            samples.push(MetricSample::site(CERTIFICATE_EXPIRY, self, days));
        }

        samples
    }
}
