//! Concurrent execution of all collectors against one snapshot
//!
//! Each scrape spawns one task per collector. All tasks share the snapshot
//! and send into one metrics channel, drained by a single consumer. Metrics
//! of a collector that fails, times out or panics are discarded, and the
//! output of its last successful run keeps being served.

use super::{Collector, MetricsSink, SinkItem};
use crate::error::CollectorError;
use crate::models::TopologySnapshot;
use dashmap::DashMap;
use prometheus::core::Desc;
use prometheus::proto::MetricFamily;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Configuration for the collector orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Deadline for a single collector within one scrape (default: 10 seconds)
    pub collector_timeout: Duration,
    /// Metrics channel buffer size
    pub buffer_size: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            collector_timeout: Duration::from_secs(10),
            buffer_size: 1000,
        }
    }
}

/// Result of one collector within a scrape
#[derive(Debug)]
pub struct CollectorOutcome {
    pub collector: &'static str,
    pub result: Result<(), CollectorError>,
}

/// Result of one scrape cycle, outcomes in registration order
#[derive(Debug)]
pub struct ScrapeReport {
    pub outcomes: Vec<CollectorOutcome>,
    pub duration: Duration,
}

impl ScrapeReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &CollectorOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn outcome(&self, collector: &str) -> Option<&CollectorOutcome> {
        self.outcomes.iter().find(|o| o.collector == collector)
    }
}

struct LatestMetricsInner {
    descs: Vec<Desc>,
    families: DashMap<&'static str, Vec<MetricFamily>>,
}

/// Last successful output of every collector, exposed to a Prometheus registry
///
/// Clones share the same underlying state.
#[derive(Clone)]
pub struct LatestMetrics {
    inner: Arc<LatestMetricsInner>,
}

impl LatestMetrics {
    fn new(descs: Vec<Desc>) -> Self {
        Self {
            inner: Arc::new(LatestMetricsInner {
                descs,
                families: DashMap::new(),
            }),
        }
    }

    fn replace(&self, collector: &'static str, families: Vec<MetricFamily>) {
        self.inner.families.insert(collector, families);
    }

    /// Metric families last published by `collector`
    pub fn families_for(&self, collector: &str) -> Vec<MetricFamily> {
        self.inner
            .families
            .get(collector)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}

impl prometheus::core::Collector for LatestMetrics {
    fn desc(&self) -> Vec<&Desc> {
        self.inner.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.inner
            .families
            .iter()
            .flat_map(|entry| entry.value().clone())
            .collect()
    }
}

/// Runs every registered collector concurrently per scrape
pub struct CollectorOrchestrator {
    collectors: Vec<Arc<dyn Collector>>,
    config: OrchestratorConfig,
    latest: LatestMetrics,
}

impl CollectorOrchestrator {
    pub fn new(collectors: Vec<Arc<dyn Collector>>, config: OrchestratorConfig) -> Self {
        let descs = collectors.iter().flat_map(|c| c.describe()).collect();

        Self {
            collectors,
            config,
            latest: LatestMetrics::new(descs),
        }
    }

    /// Names of the registered collectors, in registration order
    pub fn collector_names(&self) -> Vec<&'static str> {
        self.collectors.iter().map(|c| c.name()).collect()
    }

    pub fn latest_metrics(&self) -> LatestMetrics {
        self.latest.clone()
    }

    /// Run all collectors against `snapshot` and publish the successful ones
    pub async fn scrape(&self, snapshot: &TopologySnapshot) -> ScrapeReport {
        let started = Instant::now();
        let (tx, mut rx) = mpsc::channel::<SinkItem>(self.config.buffer_size);

        let drain = tokio::spawn(async move {
            let mut pending: HashMap<&'static str, Vec<MetricFamily>> = HashMap::new();
            while let Some(item) = rx.recv().await {
                pending.entry(item.collector).or_default().push(item.family);
            }
            pending
        });

        let timeout = self.config.collector_timeout;
        let handles: Vec<_> = self
            .collectors
            .iter()
            .map(|collector| {
                let name = collector.name();
                let collector = Arc::clone(collector);
                let snapshot = snapshot.clone();
                let sink = MetricsSink::new(name, tx.clone());

                let handle = tokio::spawn(async move {
                    match tokio::time::timeout(timeout, collector.collect(&snapshot, &sink)).await {
                        Ok(result) => result,
                        Err(_) => Err(CollectorError::Timeout {
                            collector: name,
                            timeout,
                        }),
                    }
                });

                (name, handle)
            })
            .collect();

        // The drain ends once every collector task has dropped its sink.
        drop(tx);

        let mut outcomes = Vec::with_capacity(handles.len());
        for (collector, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) if e.is_panic() => Err(CollectorError::Panicked { collector }),
                Err(_) => Err(CollectorError::Aborted { collector }),
            };
            outcomes.push(CollectorOutcome { collector, result });
        }

        let mut pending = drain.await.unwrap_or_default();

        for outcome in &outcomes {
            match &outcome.result {
                Ok(()) => {
                    let families = pending.remove(outcome.collector).unwrap_or_default();
                    debug!(
                        collector = outcome.collector,
                        families = families.len(),
                        "Collector succeeded"
                    );
                    self.latest.replace(outcome.collector, families);
                }
                Err(e) => {
                    warn!(
                        collector = outcome.collector,
                        error = %e,
                        "Collector failed, keeping previously published metrics"
                    );
                }
            }
        }

        ScrapeReport {
            outcomes,
            duration: started.elapsed(),
        }
    }
}
