//! Prometheus run metrics.
//!
//! # Design
//! - Gauges describe the most recent run; the file is meant for a node-exporter textfile
//!   collector, which scrapes whatever the last run wrote.
//! - Collector registration is encapsulated to keep the public API small.

use std::convert::TryFrom;
use std::fs;
use std::path::Path;

use prometheus::{Encoder, Gauge, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use tidyarr_core::{RunReport, RunStatus, SourceKind};

use crate::error::{Result, TelemetryError};

/// Prometheus registry holding the gauges for one run.
pub struct RunMetrics {
    registry: Registry,
    status: IntGaugeVec,
    decisions: IntGaugeVec,
    outcomes: IntGaugeVec,
    source_skips: IntGaugeVec,
    bytes_freed: IntGauge,
    dry_run: IntGauge,
    finished_at: IntGauge,
    duration_seconds: Gauge,
}

impl RunMetrics {
    /// Construct a registry with every run collector registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any collector cannot be built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let status = register(
            &registry,
            "tidyarr_run_status",
            IntGaugeVec::new(
                Opts::new("tidyarr_run_status", "Terminal status of the last run (1 = current)"),
                &["status"],
            ),
        )?;
        let decisions = register(
            &registry,
            "tidyarr_run_decisions",
            IntGaugeVec::new(
                Opts::new("tidyarr_run_decisions", "Episode decisions in the last run"),
                &["decision"],
            ),
        )?;
        let outcomes = register(
            &registry,
            "tidyarr_run_outcomes",
            IntGaugeVec::new(
                Opts::new("tidyarr_run_outcomes", "Execution outcomes in the last run"),
                &["outcome"],
            ),
        )?;
        let source_skips = register(
            &registry,
            "tidyarr_run_source_skips",
            IntGaugeVec::new(
                Opts::new("tidyarr_run_source_skips", "Shows for which a source was skipped"),
                &["source"],
            ),
        )?;
        let bytes_freed = register(
            &registry,
            "tidyarr_run_bytes_freed",
            IntGauge::with_opts(Opts::new(
                "tidyarr_run_bytes_freed",
                "Bytes reclaimed by the last run",
            )),
        )?;
        let dry_run = register(
            &registry,
            "tidyarr_run_dry_run",
            IntGauge::with_opts(Opts::new(
                "tidyarr_run_dry_run",
                "Whether the last run was a global dry run",
            )),
        )?;
        let finished_at = register(
            &registry,
            "tidyarr_run_finished_timestamp_seconds",
            IntGauge::with_opts(Opts::new(
                "tidyarr_run_finished_timestamp_seconds",
                "Unix time the last run finished",
            )),
        )?;
        let duration_seconds = register(
            &registry,
            "tidyarr_run_duration_seconds",
            Gauge::with_opts(Opts::new(
                "tidyarr_run_duration_seconds",
                "Wall-clock duration of the last run",
            )),
        )?;

        Ok(Self {
            registry,
            status,
            decisions,
            outcomes,
            source_skips,
            bytes_freed,
            dry_run,
            finished_at,
            duration_seconds,
        })
    }

    /// Set every gauge from `report`.
    pub fn record(&self, report: &RunReport) {
        for status in RunStatus::ALL {
            self.status
                .with_label_values(&[status.as_str()])
                .set(i64::from(status == report.status));
        }

        let decisions = &report.decision_counts;
        for (label, count) in [
            ("KEEP", decisions.keep),
            ("DELETE", decisions.delete),
            ("SKIP_PROTECTED", decisions.skip_protected),
            ("SKIP_UNDETERMINED", decisions.skip_undetermined),
        ] {
            self.decisions.with_label_values(&[label]).set(to_i64(count));
        }

        let outcomes = &report.outcome_counts;
        for (label, count) in [
            ("deleted", outcomes.deleted),
            ("failed", outcomes.failed),
            ("dry_run_skipped", outcomes.dry_run_skipped),
            ("not_dispatched", outcomes.not_dispatched),
        ] {
            self.outcomes.with_label_values(&[label]).set(to_i64(count));
        }

        for kind in SourceKind::ALL {
            let skipped = report
                .shows
                .iter()
                .filter(|show| show.skipped_sources.iter().any(|skip| skip.source == kind))
                .count();
            self.source_skips
                .with_label_values(&[kind.as_str()])
                .set(to_i64(skipped));
        }

        self.bytes_freed
            .set(i64::try_from(report.bytes_freed).unwrap_or(i64::MAX));
        self.dry_run.set(i64::from(report.dry_run));
        self.finished_at.set(report.finished_at.timestamp());
        let elapsed = report.finished_at - report.started_at;
        self.duration_seconds
            .set(elapsed.to_std().map_or(0.0, |elapsed| elapsed.as_secs_f64()));
    }

    /// Render the registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Render and write the metrics to `path`, replacing any previous file atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails or the file cannot be written.
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        let rendered = self.render()?;
        let staging = path.with_extension("prom.tmp");
        fs::write(&staging, rendered).map_err(|source| TelemetryError::MetricsWrite {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, path).map_err(|source| TelemetryError::MetricsWrite {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn register<C>(
    registry: &Registry,
    name: &'static str,
    collector: std::result::Result<C, prometheus::Error>,
) -> Result<C>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    let collector =
        collector.map_err(|source| TelemetryError::MetricsCollector { name, source })?;
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })?;
    Ok(collector)
}

fn to_i64(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}
