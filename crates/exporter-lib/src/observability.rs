//! Observability infrastructure for the exporter
//!
//! Provides:
//! - Prometheus self-metrics (scrape counts, errors, last scrape timing)
//! - Structured JSON logging with tracing

use crate::collector::{DirectorIdentity, ScrapeReport};
use crate::error::FetchError;
use prometheus::{Gauge, IntCounter, IntCounterVec, Opts, Registry};
use tracing::{info, warn};

/// Exporter-level metrics, const-labelled with the director identity
///
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ExporterMetrics {
    scrapes_total: IntCounter,
    scrape_errors_total: IntCounter,
    collector_errors_total: IntCounterVec,
    last_scrape_error: Gauge,
    last_scrape_timestamp: Gauge,
    last_scrape_duration_seconds: Gauge,
}

impl ExporterMetrics {
    pub fn new(namespace: &str, identity: &DirectorIdentity) -> Result<Self, prometheus::Error> {
        let opts = |name: &str, help: &str| {
            Opts::new(name, help)
                .namespace(namespace)
                .const_labels(identity.const_labels())
        };

        Ok(Self {
            scrapes_total: IntCounter::with_opts(opts(
                "scrapes_total",
                "Total number of times BOSH was scraped for metrics.",
            ))?,
            scrape_errors_total: IntCounter::with_opts(opts(
                "scrape_errors_total",
                "Total number of times an error occurred scraping BOSH.",
            ))?,
            collector_errors_total: IntCounterVec::new(
                opts(
                    "collector_errors_total",
                    "Total number of failed collector runs.",
                ),
                &["collector"],
            )?,
            last_scrape_error: Gauge::with_opts(opts(
                "last_scrape_error",
                "Whether the last scrape of metrics from BOSH resulted in an error (1 for error, 0 for success).",
            ))?,
            last_scrape_timestamp: Gauge::with_opts(opts(
                "last_scrape_timestamp",
                "Number of seconds since 1970 since last scrape from BOSH.",
            ))?,
            last_scrape_duration_seconds: Gauge::with_opts(opts(
                "last_scrape_duration_seconds",
                "Duration of the last scrape from BOSH.",
            ))?,
        })
    }

    /// Register every metric with `registry`
    pub fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.scrapes_total.clone()))?;
        registry.register(Box::new(self.scrape_errors_total.clone()))?;
        registry.register(Box::new(self.collector_errors_total.clone()))?;
        registry.register(Box::new(self.last_scrape_error.clone()))?;
        registry.register(Box::new(self.last_scrape_timestamp.clone()))?;
        registry.register(Box::new(self.last_scrape_duration_seconds.clone()))?;
        Ok(())
    }

    /// Record a cycle skipped because no snapshot could be fetched
    pub fn record_fetch_error(&self) {
        self.scrapes_total.inc();
        self.scrape_errors_total.inc();
        self.last_scrape_error.set(1.0);
    }

    /// Record a completed cycle
    pub fn record_scrape(&self, report: &ScrapeReport) {
        self.scrapes_total.inc();

        let mut failed = false;
        for outcome in report.failures() {
            failed = true;
            self.collector_errors_total
                .with_label_values(&[outcome.collector])
                .inc();
        }

        if failed {
            self.scrape_errors_total.inc();
            self.last_scrape_error.set(1.0);
        } else {
            self.last_scrape_error.set(0.0);
        }
        self.last_scrape_timestamp
            .set(chrono::Utc::now().timestamp() as f64);
        self.last_scrape_duration_seconds
            .set(report.duration.as_secs_f64());
    }

    pub fn scrapes_total(&self) -> u64 {
        self.scrapes_total.get()
    }

    pub fn scrape_errors_total(&self) -> u64 {
        self.scrape_errors_total.get()
    }

    pub fn collector_errors_total(&self, collector: &str) -> u64 {
        self.collector_errors_total
            .with_label_values(&[collector])
            .get()
    }

    pub fn last_scrape_error(&self) -> f64 {
        self.last_scrape_error.get()
    }
}

/// Structured logger for exporter events
///
/// Provides consistent JSON-formatted logging for scrape cycles and
/// lifecycle events.
#[derive(Clone)]
pub struct StructuredLogger {
    director: String,
}

impl StructuredLogger {
    pub fn new(director: impl Into<String>) -> Self {
        Self {
            director: director.into(),
        }
    }

    /// Log exporter startup
    pub fn log_startup(&self, version: &str, collectors: &[&str]) {
        info!(
            event = "exporter_started",
            director = %self.director,
            exporter_version = %version,
            collectors = ?collectors,
            "BOSH exporter started"
        );
    }

    /// Log exporter shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "exporter_shutdown",
            director = %self.director,
            reason = %reason,
            "BOSH exporter shutting down"
        );
    }

    /// Log a skipped cycle
    pub fn log_fetch_failure(&self, error: &FetchError) {
        warn!(
            event = "fetch_failed",
            director = %self.director,
            error = %error,
            "Failed to fetch topology, skipping scrape cycle"
        );
    }

    /// Log the outcome of a scrape cycle
    pub fn log_scrape(&self, report: &ScrapeReport) {
        for outcome in report.failures() {
            if let Err(e) = &outcome.result {
                warn!(
                    event = "collector_failed",
                    director = %self.director,
                    collector = outcome.collector,
                    error = %e,
                    "Collector failed"
                );
            }
        }

        info!(
            event = "scrape_completed",
            director = %self.director,
            collectors = report.outcomes.len(),
            failed = report.failures().count(),
            elapsed_ms = report.duration.as_millis() as u64,
            "Scrape cycle complete"
        );
    }
}
