//! BOSH exporter service wiring: configuration and HTTP API

pub mod api;
pub mod config;
