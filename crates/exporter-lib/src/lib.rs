//! Exporter library for BOSH director topology
//!
//! This crate provides the core functionality for:
//! - Topology snapshots (deployments, instances, processes)
//! - Concurrent multi-collector scraping with per-collector failure isolation
//! - Prometheus file-based service discovery
//! - Health checks and observability

pub mod collector;
pub mod error;
pub mod fetcher;
pub mod filters;
pub mod health;
pub mod models;
pub mod observability;

pub use collector::{
    Collector, CollectorOrchestrator, DeploymentsCollector, DirectorIdentity, MetricsSink,
    OrchestratorConfig, ScrapeLoop, ScrapeLoopBuilder, ServiceDiscoveryCollector,
};
pub use error::{CollectorError, FetchError, FilterError};
pub use fetcher::{JsonFileFetcher, StaticFetcher, TopologyFetcher};
pub use filters::{AzsFilter, CollectorsFilter, FilterSet, RegexpFilter};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ExporterMetrics, StructuredLogger};
