//! BOSH exporter
//!
//! Periodically reads the director topology, rewrites the Prometheus
//! service discovery file and serves scrape-health metrics.

use anyhow::Result;
use bosh_exporter::{api, config::ExporterConfig};
use exporter_lib::{
    health::{components, HealthRegistry},
    CollectorOrchestrator, ExporterMetrics, JsonFileFetcher, OrchestratorConfig,
    ScrapeLoopBuilder, StructuredLogger,
};
use prometheus::Registry;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const EXPORTER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting bosh-exporter");

    let config = ExporterConfig::load()?;
    let identity = config.identity();
    info!(
        environment = %identity.environment,
        bosh_name = %identity.name,
        sd_filename = %config.sd_filename.display(),
        "Exporter configured"
    );

    let orchestrator = Arc::new(CollectorOrchestrator::new(
        config.collectors()?,
        OrchestratorConfig {
            collector_timeout: config.collector_timeout(),
            ..OrchestratorConfig::default()
        },
    ));
    let collector_names = orchestrator.collector_names();

    let registry = Registry::new();
    let metrics = ExporterMetrics::new(&config.metrics_namespace, &identity)?;
    metrics.register(&registry)?;
    registry.register(Box::new(orchestrator.latest_metrics()))?;

    let health_registry = HealthRegistry::new();
    health_registry.register(components::FETCHER).await;
    health_registry.register(components::ORCHESTRATOR).await;
    for name in &collector_names {
        health_registry.register(name).await;
    }

    let logger = StructuredLogger::new(&identity.name);
    logger.log_startup(EXPORTER_VERSION, &collector_names);

    let scrape_loop = ScrapeLoopBuilder::new()
        .fetcher(Arc::new(JsonFileFetcher::new(&config.topology_file)))
        .orchestrator(orchestrator)
        .health(health_registry.clone())
        .metrics(metrics)
        .logger(logger.clone())
        .interval(config.scrape_interval())
        .build()?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let scrape_handle = tokio::spawn(scrape_loop.run(shutdown_rx));

    let app_state = Arc::new(api::AppState::new(health_registry, registry));
    let api_handle = tokio::spawn(api::serve(config.listen_port, app_state));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            logger.log_shutdown("SIGINT received");
        }
        result = api_handle => {
            match result {
                Ok(Err(e)) => warn!(error = %e, "API server stopped"),
                Err(e) => warn!(error = %e, "API server task failed"),
                Ok(Ok(())) => {}
            }
            logger.log_shutdown("API server stopped");
        }
    }

    let _ = shutdown_tx.send(());
    if let Err(e) = scrape_handle.await {
        warn!(error = %e, "Scrape loop task failed");
    }
    info!("Shutting down");

    Ok(())
}
