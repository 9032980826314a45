//! Per-collector scrape bookkeeping gauges

use super::{DirectorIdentity, MetricsSink};
use crate::error::CollectorError;
use prometheus::core::{Collector as _, Desc};
use prometheus::{Gauge, Opts};
use std::time::Instant;

/// The `last_<name>_scrape_timestamp` and `last_<name>_scrape_duration_seconds`
/// gauges every collector publishes after a successful run
#[derive(Clone)]
pub struct ScrapeGauges {
    timestamp: Gauge,
    duration_seconds: Gauge,
}

impl ScrapeGauges {
    /// `subject` is the metric name fragment (`service_discovery`),
    /// `title` its human readable form used in help texts
    pub fn new(
        namespace: &str,
        subject: &str,
        title: &str,
        identity: &DirectorIdentity,
    ) -> Result<Self, prometheus::Error> {
        let timestamp = Gauge::with_opts(
            Opts::new(
                format!("last_{}_scrape_timestamp", subject),
                format!(
                    "Number of seconds since 1970 since last scrape of {} from BOSH.",
                    title
                ),
            )
            .namespace(namespace)
            .const_labels(identity.const_labels()),
        )?;

        let duration_seconds = Gauge::with_opts(
            Opts::new(
                format!("last_{}_scrape_duration_seconds", subject),
                format!("Duration of the last scrape of {} from BOSH.", title),
            )
            .namespace(namespace)
            .const_labels(identity.const_labels()),
        )?;

        Ok(Self {
            timestamp,
            duration_seconds,
        })
    }

    pub fn describe(&self) -> Vec<Desc> {
        self.timestamp
            .desc()
            .into_iter()
            .chain(self.duration_seconds.desc())
            .cloned()
            .collect()
    }

    /// Record a completed run that started at `started` and send both gauges
    pub async fn publish(&self, started: Instant, sink: &MetricsSink) -> Result<(), CollectorError> {
        self.timestamp.set(chrono::Utc::now().timestamp() as f64);
        self.duration_seconds.set(started.elapsed().as_secs_f64());

        sink.send_all(self.timestamp.collect()).await?;
        sink.send_all(self.duration_seconds.collect()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> DirectorIdentity {
        DirectorIdentity::new("test_environment", "test_bosh_name", "test_bosh_uuid")
    }

    #[test]
    fn test_describe_names_and_const_labels() {
        let gauges = ScrapeGauges::new("test_exporter", "jobs", "Jobs", &identity()).unwrap();
        let descs = gauges.describe();

        assert_eq!(descs.len(), 2);
        assert_eq!(descs[0].fq_name, "test_exporter_last_jobs_scrape_timestamp");
        assert_eq!(
            descs[1].fq_name,
            "test_exporter_last_jobs_scrape_duration_seconds"
        );
        assert_eq!(
            descs[1].help,
            "Duration of the last scrape of Jobs from BOSH."
        );

        let mut labels: Vec<_> = descs[0]
            .const_label_pairs
            .iter()
            .map(|l| (l.get_name().to_string(), l.get_value().to_string()))
            .collect();
        labels.sort();
        assert_eq!(
            labels,
            vec![
                ("bosh_name".to_string(), "test_bosh_name".to_string()),
                ("bosh_uuid".to_string(), "test_bosh_uuid".to_string()),
                ("environment".to_string(), "test_environment".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_publish_sends_both_gauges() {
        let gauges = ScrapeGauges::new("test_exporter", "jobs", "Jobs", &identity()).unwrap();
        let (sink, mut rx) = MetricsSink::channel("Jobs", 8);

        let before = chrono::Utc::now().timestamp() as f64;
        gauges.publish(Instant::now(), &sink).await.unwrap();
        drop(sink);

        let timestamp = rx.recv().await.unwrap();
        let duration = rx.recv().await.unwrap();
        assert!(rx.recv().await.is_none());

        assert_eq!(timestamp.collector, "Jobs");
        assert!(timestamp.family.get_metric()[0].get_gauge().get_value() >= before);
        assert_eq!(
            duration.family.get_name(),
            "test_exporter_last_jobs_scrape_duration_seconds"
        );
        assert!(duration.family.get_metric()[0].get_gauge().get_value() >= 0.0);
    }
}
