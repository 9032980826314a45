//! Error types shared by the collection pipeline

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single collector for one scrape cycle
///
/// None of these are fatal to the exporter: the orchestrator records the
/// error and keeps serving the collector's previous output.
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("failed to serialize target groups: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to persist {path:?}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build metric: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("metrics sink closed")]
    SinkClosed,

    #[error("collector {collector} did not finish within {timeout:?}")]
    Timeout {
        collector: &'static str,
        timeout: Duration,
    },

    #[error("collector {collector} panicked")]
    Panicked { collector: &'static str },

    #[error("collector {collector} was aborted")]
    Aborted { collector: &'static str },
}

impl CollectorError {
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persistence {
            path: path.into(),
            source,
        }
    }
}

/// The topology snapshot for a cycle could not be obtained
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to read topology from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode topology: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("topology source unavailable: {0}")]
    Unavailable(String),
}

/// Invalid filter configuration, rejected at construction time
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid process pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("unknown collector {0:?}")]
    UnknownCollector(String),
}
