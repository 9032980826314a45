//! Periodic scrape loop
//!
//! Fetches a topology snapshot on every tick and hands it to the
//! orchestrator. A failed fetch skips the cycle; collectors keep serving
//! their previous output.

use super::{CollectorOrchestrator, ScrapeReport};
use crate::fetcher::TopologyFetcher;
use crate::health::HealthRegistry;
use crate::observability::{ExporterMetrics, StructuredLogger};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

/// Configuration for the scrape loop
#[derive(Debug, Clone)]
pub struct ScrapeLoopConfig {
    /// Time between scrape cycles (default: 30 seconds)
    pub interval: Duration,
}

impl Default for ScrapeLoopConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

/// Scrape loop driving one orchestrator from one fetcher
pub struct ScrapeLoop {
    fetcher: Arc<dyn TopologyFetcher>,
    orchestrator: Arc<CollectorOrchestrator>,
    health: HealthRegistry,
    metrics: ExporterMetrics,
    logger: StructuredLogger,
    config: ScrapeLoopConfig,
}

impl ScrapeLoop {
    /// Run until a shutdown signal is received
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            collectors = ?self.orchestrator.collector_names(),
            "Starting scrape loop"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_once().await;
                }
                _ = shutdown.recv() => {
                    info!("Shutting down scrape loop");
                    break;
                }
            }
        }
    }

    /// Run a single cycle, `None` when the snapshot could not be fetched
    pub async fn run_once(&self) -> Option<ScrapeReport> {
        let snapshot = match self.fetcher.fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.logger.log_fetch_failure(&e);
                self.metrics.record_fetch_error();
                self.health.record_fetch_failure(&e).await;
                return None;
            }
        };

        let report = self.orchestrator.scrape(&snapshot).await;

        self.metrics.record_scrape(&report);
        self.health.record_scrape(&report).await;
        self.logger.log_scrape(&report);

        Some(report)
    }
}

/// Builder for creating the scrape loop
#[derive(Default)]
pub struct ScrapeLoopBuilder {
    fetcher: Option<Arc<dyn TopologyFetcher>>,
    orchestrator: Option<Arc<CollectorOrchestrator>>,
    health: Option<HealthRegistry>,
    metrics: Option<ExporterMetrics>,
    logger: Option<StructuredLogger>,
    config: ScrapeLoopConfig,
}

impl ScrapeLoopBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn TopologyFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn orchestrator(mut self, orchestrator: Arc<CollectorOrchestrator>) -> Self {
        self.orchestrator = Some(orchestrator);
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn metrics(mut self, metrics: ExporterMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn build(self) -> Result<ScrapeLoop> {
        let fetcher = self
            .fetcher
            .ok_or_else(|| anyhow::anyhow!("Fetcher is required"))?;
        let orchestrator = self
            .orchestrator
            .ok_or_else(|| anyhow::anyhow!("Orchestrator is required"))?;
        let metrics = self
            .metrics
            .ok_or_else(|| anyhow::anyhow!("Exporter metrics are required"))?;
        if self.config.interval.is_zero() {
            anyhow::bail!("Scrape interval must be positive");
        }

        Ok(ScrapeLoop {
            fetcher,
            orchestrator,
            health: self.health.unwrap_or_default(),
            metrics,
            logger: self
                .logger
                .unwrap_or_else(|| StructuredLogger::new("unknown")),
            config: self.config,
        })
    }
}
