//! Prometheus exporter
//!
//! Adapts a [`SiteCollector`] to [`prometheus::core::Collector`] so it can be
//! registered with a [`prometheus::Registry`]. Every gather runs a fresh scan.
//!
//! `Collector::collect` is synchronous while scans are async. The exporter
//! keeps a handle to the runtime it was created on and blocks on the scan, so
//! gathering must happen off the runtime's worker threads (for instance in
//! [`tokio::task::spawn_blocking`], as the [`server`] does).

mod server;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use prometheus::core::{Collector as PrometheusCollector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, Opts};
use tokio::runtime::Handle;
use tracing::warn;

use crate::collector::{MetricDescriptor, MetricSample, SiteCollector};
use crate::error::{Error, Result};

pub use server::{run_metrics_server, serve};

/// Exposes site checks as Prometheus gauges.
pub struct SiteExporter {
    collector: Arc<SiteCollector>,
    descs: Vec<Desc>,
    runtime: Handle,
}

impl SiteExporter {
    /// Create an exporter bound to the current tokio runtime.
    pub fn new(collector: Arc<SiteCollector>) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Internal(format!("exporter needs a tokio runtime: {e}")))?;
        Self::with_runtime(collector, runtime)
    }

    /// Create an exporter that runs scans on `runtime`.
    pub fn with_runtime(collector: Arc<SiteCollector>, runtime: Handle) -> Result<Self> {
        let descs = collector
            .describe()
            .iter()
            .map(to_desc)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            collector,
            descs,
            runtime,
        })
    }

    /// Render samples as metric families, one gauge family per metric name.
    ///
    /// A sample repeating the name and label values of an earlier one is
    /// skipped with a warning; the first value wins.
    pub fn render(&self, samples: &[MetricSample]) -> Vec<MetricFamily> {
        let mut gauges: BTreeMap<&'static str, GaugeVec> = BTreeMap::new();
        let mut seen: HashSet<(&'static str, Vec<&str>)> = HashSet::new();

        for sample in samples {
            let values: Vec<&str> = sample.labels.iter().map(|(_, v)| v.as_str()).collect();
            if !seen.insert((sample.name, values.clone())) {
                warn!(
                    metric = sample.name,
                    labels = ?sample.labels,
                    "duplicate series, keeping the first value"
                );
                continue;
            }

            if !gauges.contains_key(sample.name) {
                match self.gauge_for(sample) {
                    Ok(gauge) => {
                        gauges.insert(sample.name, gauge);
                    }
                    Err(e) => {
                        warn!(metric = sample.name, error = %e, "cannot create metric");
                        continue;
                    }
                }
            }
            let Some(gauge) = gauges.get(sample.name) else {
                continue;
            };

            match gauge.get_metric_with_label_values(&values) {
                Ok(metric) => metric.set(sample.value),
                Err(e) => warn!(metric = sample.name, error = %e, "cannot set metric"),
            }
        }

        gauges.values().flat_map(|gauge| gauge.collect()).collect()
    }

    fn gauge_for(&self, sample: &MetricSample) -> prometheus::Result<GaugeVec> {
        let error_series = MetricDescriptor::check_error();
        let help = self
            .collector
            .describe()
            .iter()
            .chain(std::iter::once(&error_series))
            .find(|d| d.name == sample.name)
            .map(|d| d.help)
            .unwrap_or(sample.name);

        let label_names: Vec<&str> = sample.labels.iter().map(|(k, _)| *k).collect();
        GaugeVec::new(Opts::new(sample.name, help), &label_names)
    }
}

impl PrometheusCollector for SiteExporter {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let samples = self.runtime.block_on(self.collector.collect());
        self.render(&samples)
    }
}

impl std::fmt::Debug for SiteExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteExporter")
            .field("collector", &self.collector)
            .finish_non_exhaustive()
    }
}

fn to_desc(descriptor: &MetricDescriptor) -> Result<Desc> {
    Ok(Desc::new(
        descriptor.name.to_string(),
        descriptor.help.to_string(),
        descriptor.labels.iter().map(|l| l.to_string()).collect(),
        HashMap::new(),
    )?)
}
