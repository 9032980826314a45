//! Metrics collection from director topology snapshots
//!
//! A [`Collector`] turns one [`TopologySnapshot`] into metric families sent on
//! a [`MetricsSink`], optionally with a side effect such as the service
//! discovery file. The [`CollectorOrchestrator`] runs every registered
//! collector concurrently against the same snapshot and the [`ScrapeLoop`]
//! drives it on an interval.

mod atomic_file;
mod deployments;
mod r#loop;
mod orchestrator;
mod scrape_metrics;
mod service_discovery;


pub use atomic_file::{persist_atomically, stage, write_atomically, StagedFile};
pub use deployments::DeploymentsCollector;
pub use orchestrator::{
    CollectorOrchestrator, CollectorOutcome, LatestMetrics, OrchestratorConfig, ScrapeReport,
};
pub use r#loop::{ScrapeLoop, ScrapeLoopBuilder, ScrapeLoopConfig};
pub use scrape_metrics::ScrapeGauges;
pub use service_discovery::ServiceDiscoveryCollector;

use crate::error::CollectorError;
use crate::models::TopologySnapshot;
use prometheus::core::Desc;
use prometheus::proto::MetricFamily;
use std::collections::HashMap;
use tokio::sync::mpsc;

pub use async_trait::async_trait;

/// Trait for topology-to-metrics transformers
#[async_trait]
pub trait Collector: Send + Sync {
    /// Stable collector name, used for logging, health and error accounting
    fn name(&self) -> &'static str;

    /// Static descriptors of every metric this collector may emit
    fn describe(&self) -> Vec<Desc>;

    /// Transform one snapshot into metrics sent on `sink`
    ///
    /// An error invalidates every metric sent by this call.
    async fn collect(
        &self,
        snapshot: &TopologySnapshot,
        sink: &MetricsSink,
    ) -> Result<(), CollectorError>;
}

/// Identity of the director a collector reports on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorIdentity {
    pub environment: String,
    pub name: String,
    pub uuid: String,
}

impl DirectorIdentity {
    pub fn new(
        environment: impl Into<String>,
        name: impl Into<String>,
        uuid: impl Into<String>,
    ) -> Self {
        Self {
            environment: environment.into(),
            name: name.into(),
            uuid: uuid.into(),
        }
    }

    /// Constant labels attached to every metric published for this director
    pub fn const_labels(&self) -> HashMap<String, String> {
        HashMap::from([
            ("environment".to_string(), self.environment.clone()),
            ("bosh_name".to_string(), self.name.clone()),
            ("bosh_uuid".to_string(), self.uuid.clone()),
        ])
    }
}

/// A metric family tagged with the collector that produced it
#[derive(Debug, Clone)]
pub struct SinkItem {
    pub collector: &'static str,
    pub family: MetricFamily,
}

/// Sending half of the shared metrics channel, bound to one collector
#[derive(Debug, Clone)]
pub struct MetricsSink {
    collector: &'static str,
    tx: mpsc::Sender<SinkItem>,
}

impl MetricsSink {
    pub fn new(collector: &'static str, tx: mpsc::Sender<SinkItem>) -> Self {
        Self { collector, tx }
    }

    /// Create a sink with its own receiving end
    pub fn channel(collector: &'static str, buffer: usize) -> (Self, mpsc::Receiver<SinkItem>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self::new(collector, tx), rx)
    }

    pub async fn send(&self, family: MetricFamily) -> Result<(), CollectorError> {
        self.tx
            .send(SinkItem {
                collector: self.collector,
                family,
            })
            .await
            .map_err(|_| CollectorError::SinkClosed)
    }

    pub async fn send_all(
        &self,
        families: impl IntoIterator<Item = MetricFamily>,
    ) -> Result<(), CollectorError> {
        for family in families {
            self.send(family).await?;
        }
        Ok(())
    }
}
