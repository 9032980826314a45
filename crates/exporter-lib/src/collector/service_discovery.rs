//! Prometheus file-based service discovery
//!
//! Flattens the topology into one target group per running process and
//! atomically rewrites the `file_sd` JSON file on every scrape.

use super::{stage, Collector, DirectorIdentity, MetricsSink, ScrapeGauges};
use crate::error::CollectorError;
use crate::filters::{AzsFilter, FilterSet, RegexpFilter, SERVICE_DISCOVERY_COLLECTOR};
use crate::models::{TargetGroup, TopologySnapshot};
use async_trait::async_trait;
use prometheus::core::Desc;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;

pub struct ServiceDiscoveryCollector {
    destination: PathBuf,
    filters: FilterSet,
    scrape_gauges: ScrapeGauges,
}

impl ServiceDiscoveryCollector {
    pub fn new(
        namespace: &str,
        environment: &str,
        bosh_name: &str,
        bosh_uuid: &str,
        destination: impl AsRef<Path>,
        azs_filter: AzsFilter,
        processes_filter: RegexpFilter,
    ) -> Result<Self, CollectorError> {
        let identity = DirectorIdentity::new(environment, bosh_name, bosh_uuid);
        let scrape_gauges = ScrapeGauges::new(
            namespace,
            "service_discovery",
            "Service Discovery",
            &identity,
        )?;

        Ok(Self {
            destination: destination.as_ref().to_path_buf(),
            filters: FilterSet::new(azs_filter, processes_filter),
            scrape_gauges,
        })
    }

    /// Target groups for every admitted (instance, process) pair, in snapshot order
    pub fn target_groups(&self, snapshot: &TopologySnapshot) -> Vec<TargetGroup> {
        target_groups(&self.filters, snapshot)
    }
}

fn target_groups(filters: &FilterSet, snapshot: &TopologySnapshot) -> Vec<TargetGroup> {
    snapshot
        .iter()
        .flat_map(|deployment| &deployment.instances)
        .filter(|instance| !instance.ips.is_empty() && filters.allows_az(&instance.az))
        .flat_map(move |instance| {
            instance
                .processes
                .iter()
                .filter(move |process| filters.allows_process(&process.name))
                .map(move |process| TargetGroup::for_process(instance, process))
        })
        .collect()
}

#[async_trait]
impl Collector for ServiceDiscoveryCollector {
    fn name(&self) -> &'static str {
        SERVICE_DISCOVERY_COLLECTOR
    }

    fn describe(&self) -> Vec<Desc> {
        self.scrape_gauges.describe()
    }

    async fn collect(
        &self,
        snapshot: &TopologySnapshot,
        sink: &MetricsSink,
    ) -> Result<(), CollectorError> {
        let started = Instant::now();

        let filters = self.filters.clone();
        let snapshot = snapshot.clone();
        let destination = self.destination.clone();

        // Only staging runs on the blocking pool. If this future is dropped
        // on timeout the staged file is dropped with the task output.
        let (staged, count) = tokio::task::spawn_blocking(move || {
            let groups = target_groups(&filters, &snapshot);
            let contents = serde_json::to_vec(&groups)?;
            let staged = stage(&destination, |file| file.write_all(&contents))?;
            Ok::<_, CollectorError>((staged, groups.len()))
        })
        .await
        .map_err(|_| CollectorError::Panicked {
            collector: self.name(),
        })??;
        staged.commit()?;

        debug!(
            path = %self.destination.display(),
            target_groups = count,
            "Wrote service discovery file"
        );

        self.scrape_gauges.publish(started, sink).await
    }
}
