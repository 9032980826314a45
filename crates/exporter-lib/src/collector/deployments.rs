//! Per-deployment instance counts

use super::{Collector, DirectorIdentity, MetricsSink, ScrapeGauges};
use crate::error::CollectorError;
use crate::filters::DEPLOYMENTS_COLLECTOR;
use crate::models::TopologySnapshot;
use async_trait::async_trait;
use prometheus::core::{Collector as _, Desc};
use prometheus::{GaugeVec, Opts};
use std::time::Instant;

pub struct DeploymentsCollector {
    instances: GaugeVec,
    scrape_gauges: ScrapeGauges,
}

impl DeploymentsCollector {
    pub fn new(namespace: &str, identity: &DirectorIdentity) -> Result<Self, CollectorError> {
        let instances = GaugeVec::new(
            Opts::new("deployment_instances", "Number of instances in this deployment.")
                .namespace(namespace)
                .const_labels(identity.const_labels()),
            &["bosh_deployment"],
        )?;
        let scrape_gauges = ScrapeGauges::new(namespace, "deployments", "Deployments", identity)?;

        Ok(Self {
            instances,
            scrape_gauges,
        })
    }
}

#[async_trait]
impl Collector for DeploymentsCollector {
    fn name(&self) -> &'static str {
        DEPLOYMENTS_COLLECTOR
    }

    fn describe(&self) -> Vec<Desc> {
        let mut descs: Vec<Desc> = self.instances.desc().into_iter().cloned().collect();
        descs.extend(self.scrape_gauges.describe());
        descs
    }

    async fn collect(
        &self,
        snapshot: &TopologySnapshot,
        sink: &MetricsSink,
    ) -> Result<(), CollectorError> {
        let started = Instant::now();

        // Deployments deleted since the last cycle must not linger.
        self.instances.reset();
        for deployment in snapshot.iter() {
            self.instances
                .with_label_values(&[deployment.name.as_str()])
                .set(deployment.instances.len() as f64);
        }

        sink.send_all(self.instances.collect()).await?;
        self.scrape_gauges.publish(started, sink).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Deployment, Instance};

    #[tokio::test]
    async fn test_collect_counts_instances_per_deployment() {
        let identity = DirectorIdentity::new("env", "bosh", "uuid");
        let collector = DeploymentsCollector::new("bosh", &identity).unwrap();
        let snapshot = TopologySnapshot::new(vec![
            Deployment {
                name: "cf".to_string(),
                instances: vec![Instance::default(), Instance::default()],
            },
            Deployment {
                name: "redis".to_string(),
                instances: vec![],
            },
        ]);
        let (sink, mut rx) = MetricsSink::channel(DEPLOYMENTS_COLLECTOR, 16);

        collector.collect(&snapshot, &sink).await.unwrap();
        drop(sink);

        let instances = rx.recv().await.unwrap().family;
        assert_eq!(instances.get_name(), "bosh_deployment_instances");
        let mut counts: Vec<_> = instances
            .get_metric()
            .iter()
            .map(|m| {
                let deployment = m
                    .get_label()
                    .iter()
                    .find(|l| l.get_name() == "bosh_deployment")
                    .unwrap()
                    .get_value()
                    .to_string();
                (deployment, m.get_gauge().get_value())
            })
            .collect();
        counts.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            counts,
            vec![("cf".to_string(), 2.0), ("redis".to_string(), 0.0)]
        );

        let mut rest = 0;
        while rx.recv().await.is_some() {
            rest += 1;
        }
        assert_eq!(rest, 2);
    }

    #[tokio::test]
    async fn test_collect_drops_vanished_deployments() {
        let identity = DirectorIdentity::new("env", "bosh", "uuid");
        let collector = DeploymentsCollector::new("bosh", &identity).unwrap();
        let (sink, mut rx) = MetricsSink::channel(DEPLOYMENTS_COLLECTOR, 16);

        let first = TopologySnapshot::new(vec![Deployment {
            name: "old".to_string(),
            instances: vec![Instance::default()],
        }]);
        collector.collect(&first, &sink).await.unwrap();
        collector
            .collect(&TopologySnapshot::default(), &sink)
            .await
            .unwrap();
        drop(sink);

        let mut families = Vec::new();
        while let Some(item) = rx.recv().await {
            families.push(item.family);
        }

        assert_eq!(families.len(), 6);
        assert_eq!(families[0].get_metric().len(), 1);
        assert_eq!(families[3].get_name(), "bosh_deployment_instances");
        assert!(families[3].get_metric().is_empty());
    }
}
