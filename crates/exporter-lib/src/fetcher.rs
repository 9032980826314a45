//! Sources of topology snapshots
//!
//! The collection pipeline only consumes snapshots; how they are obtained is
//! behind the [`TopologyFetcher`] trait.

use crate::error::FetchError;
use crate::models::{Deployment, TopologySnapshot};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Produces one topology snapshot per scrape cycle
#[async_trait]
pub trait TopologyFetcher: Send + Sync {
    async fn fetch(&self) -> Result<TopologySnapshot, FetchError>;
}

/// Reads a JSON array of deployments from disk on every fetch
pub struct JsonFileFetcher {
    path: PathBuf,
}

impl JsonFileFetcher {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl TopologyFetcher for JsonFileFetcher {
    async fn fetch(&self) -> Result<TopologySnapshot, FetchError> {
        let content = tokio::fs::read(&self.path)
            .await
            .map_err(|source| FetchError::Io {
                path: self.path.clone(),
                source,
            })?;

        let deployments: Vec<Deployment> = serde_json::from_slice(&content)?;
        debug!(
            path = %self.path.display(),
            deployments = deployments.len(),
            "Loaded topology"
        );

        Ok(TopologySnapshot::new(deployments))
    }
}

/// Always returns the same snapshot
pub struct StaticFetcher {
    snapshot: TopologySnapshot,
}

impl StaticFetcher {
    pub fn new(snapshot: TopologySnapshot) -> Self {
        Self { snapshot }
    }
}

#[async_trait]
impl TopologyFetcher for StaticFetcher {
    async fn fetch(&self) -> Result<TopologySnapshot, FetchError> {
        Ok(self.snapshot.clone())
    }
}
