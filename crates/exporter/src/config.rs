//! Exporter configuration

use anyhow::{Context, Result};
use exporter_lib::{
    AzsFilter, Collector, CollectorsFilter, DeploymentsCollector, DirectorIdentity,
    RegexpFilter, ServiceDiscoveryCollector,
};
use exporter_lib::filters::{DEPLOYMENTS_COLLECTOR, SERVICE_DISCOVERY_COLLECTOR};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const ENV_PREFIX: &str = "BOSH_EXPORTER";

/// Exporter configuration, read from `BOSH_EXPORTER_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ExporterConfig {
    /// Metrics namespace prefix
    #[serde(default = "default_metrics_namespace")]
    pub metrics_namespace: String,

    /// Environment label attached to every metric
    #[serde(default)]
    pub metrics_environment: String,

    /// Director name label
    #[serde(default)]
    pub bosh_name: String,

    /// Director UUID label
    #[serde(default)]
    pub bosh_uuid: String,

    /// Port serving /metrics, /healthz and /readyz
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Service discovery target groups file
    #[serde(default = "default_sd_filename")]
    pub sd_filename: PathBuf,

    /// Comma separated availability zones to include
    #[serde(default)]
    pub filter_azs: String,

    /// Comma separated process name regular expressions to include
    #[serde(default)]
    pub filter_processes: String,

    /// Comma separated collectors to enable (Deployments, ServiceDiscovery)
    #[serde(default)]
    pub filter_collectors: String,

    #[serde(default = "default_scrape_interval")]
    pub scrape_interval_secs: u64,

    #[serde(default = "default_collector_timeout")]
    pub collector_timeout_secs: u64,

    /// JSON topology file read on every scrape
    #[serde(default = "default_topology_file")]
    pub topology_file: PathBuf,
}

fn default_metrics_namespace() -> String {
    "bosh".to_string()
}

fn default_listen_port() -> u16 {
    9190
}

fn default_sd_filename() -> PathBuf {
    PathBuf::from("bosh_target_groups.json")
}

fn default_scrape_interval() -> u64 {
    30
}

fn default_collector_timeout() -> u64 {
    10
}

fn default_topology_file() -> PathBuf {
    PathBuf::from("topology.json")
}

/// Split a comma separated setting, dropping blank entries
fn split_list(value: &str) -> Vec<&str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .collect()
}

impl ExporterConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::from_environment(config::Environment::with_prefix(ENV_PREFIX))
    }

    fn from_environment(environment: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(environment)
            .build()?;

        let config: Self = config
            .try_deserialize()
            .context("Invalid exporter configuration")?;

        if config.scrape_interval_secs == 0 {
            anyhow::bail!("scrape_interval_secs must be positive");
        }
        if config.collector_timeout_secs == 0 {
            anyhow::bail!("collector_timeout_secs must be positive");
        }

        Ok(config)
    }

    pub fn identity(&self) -> DirectorIdentity {
        DirectorIdentity::new(&self.metrics_environment, &self.bosh_name, &self.bosh_uuid)
    }

    pub fn scrape_interval(&self) -> Duration {
        Duration::from_secs(self.scrape_interval_secs)
    }

    pub fn collector_timeout(&self) -> Duration {
        Duration::from_secs(self.collector_timeout_secs)
    }

    /// Build the enabled collectors in registration order
    pub fn collectors(&self) -> Result<Vec<Arc<dyn Collector>>> {
        let enabled = CollectorsFilter::new(split_list(&self.filter_collectors))?;
        let identity = self.identity();
        let mut collectors: Vec<Arc<dyn Collector>> = Vec::new();

        if enabled.enabled(DEPLOYMENTS_COLLECTOR) {
            collectors.push(Arc::new(DeploymentsCollector::new(
                &self.metrics_namespace,
                &identity,
            )?));
        }

        if enabled.enabled(SERVICE_DISCOVERY_COLLECTOR) {
            collectors.push(Arc::new(ServiceDiscoveryCollector::new(
                &self.metrics_namespace,
                &identity.environment,
                &identity.name,
                &identity.uuid,
                &self.sd_filename,
                AzsFilter::new(split_list(&self.filter_azs)),
                RegexpFilter::new(split_list(&self.filter_processes))?,
            )?));
        }

        Ok(collectors)
    }
}
