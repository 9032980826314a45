//! Core data models for the exporter
//!
//! The topology tree (deployments, instances, processes) is produced by a
//! [`TopologyFetcher`](crate::fetcher::TopologyFetcher) once per scrape cycle
//! and shared read-only between all collectors.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::Arc;

/// Label carrying the instance index of a target group
pub const LABEL_INSTANCE_INDEX: &str = "__meta_bosh_job_instance_index";
/// Label carrying the job (instance group) name of a target group
pub const LABEL_INSTANCE_NAME: &str = "__meta_bosh_job_instance_name";
/// Label carrying the process name of a target group
pub const LABEL_PROCESS_NAME: &str = "__meta_bosh_job_process_name";

/// A named group of instances managed by the director
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub name: String,
    #[serde(default)]
    pub instances: Vec<Instance>,
}

/// One running VM of a deployment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Job (instance group) name
    pub name: String,
    pub id: String,
    /// Opaque index, not assumed to be numeric
    pub index: String,
    #[serde(default)]
    pub ips: Vec<String>,
    #[serde(default)]
    pub az: String,
    #[serde(default)]
    pub processes: Vec<Process>,
}

/// A workload running inside an instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    pub name: String,
}

/// Immutable point-in-time view of the director topology
///
/// Cloning is cheap: all clones share the same deployment list.
#[derive(Debug, Clone, Default)]
pub struct TopologySnapshot {
    deployments: Arc<[Deployment]>,
}

impl TopologySnapshot {
    pub fn new(deployments: Vec<Deployment>) -> Self {
        Self {
            deployments: deployments.into(),
        }
    }

    pub fn deployments(&self) -> &[Deployment] {
        &self.deployments
    }
}

impl Deref for TopologySnapshot {
    type Target = [Deployment];

    fn deref(&self) -> &Self::Target {
        &self.deployments
    }
}

impl From<Vec<Deployment>> for TopologySnapshot {
    fn from(deployments: Vec<Deployment>) -> Self {
        Self::new(deployments)
    }
}

/// A Prometheus `file_sd` record: a set of targets sharing one label set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    pub targets: Vec<String>,
    pub labels: BTreeMap<String, String>,
}

impl TargetGroup {
    /// Build the target group of one process running on `instance`
    pub fn for_process(instance: &Instance, process: &Process) -> Self {
        let labels = BTreeMap::from([
            (LABEL_INSTANCE_INDEX.to_string(), instance.index.clone()),
            (LABEL_INSTANCE_NAME.to_string(), instance.name.clone()),
            (LABEL_PROCESS_NAME.to_string(), process.name.clone()),
        ]);

        Self {
            targets: instance.ips.clone(),
            labels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_clones_share_deployments() {
        let snapshot = TopologySnapshot::new(vec![Deployment {
            name: "cf".to_string(),
            instances: vec![Instance::default(), Instance::default()],
        }]);
        let clone = snapshot.clone();

        assert!(std::ptr::eq(snapshot.deployments(), clone.deployments()));
        assert_eq!(clone[0].instances.len(), 2);
    }

    #[test]
    fn test_instance_deserializes_with_missing_optional_fields() {
        let instance: Instance =
            serde_json::from_str(r#"{"name":"router","id":"abc","index":"1"}"#).unwrap();

        assert!(instance.ips.is_empty());
        assert!(instance.az.is_empty());
        assert!(instance.processes.is_empty());
    }

    #[test]
    fn test_target_group_labels_serialize_in_fixed_order() {
        let instance = Instance {
            name: "router".to_string(),
            index: "2".to_string(),
            ips: vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()],
            ..Default::default()
        };
        let group = TargetGroup::for_process(
            &instance,
            &Process {
                name: "gorouter".to_string(),
            },
        );

        assert_eq!(
            serde_json::to_string(&group).unwrap(),
            r#"{"targets":["10.0.0.1","10.0.0.2"],"labels":{"__meta_bosh_job_instance_index":"2","__meta_bosh_job_instance_name":"router","__meta_bosh_job_process_name":"gorouter"}}"#
        );
    }
}
