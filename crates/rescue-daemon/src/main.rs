//! Dispatch daemon for the Rescue engine.
//!
//! Wires configuration, logging, the dispatch engine, and the HTTP and
//! live-channel server together, then serves until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `rescue-config.yaml` (or `RESCUE_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Create the fanout hub and dispatch engine
//! 4. Register the seeded fleet, crews, and facilities
//! 5. Serve the API until shutdown

mod error;
mod seed;

use std::path::PathBuf;
use std::sync::Arc;

use rescue_core::config::{LoggingConfig, RescueConfig};
use rescue_core::{DispatchEngine, FanoutHub};
use rescue_server::{AppState, start_server};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::DaemonError;
use crate::seed::seed_engine;

/// Application entry point for the dispatch daemon.
///
/// # Errors
///
/// Returns an error if the configuration cannot be read, a seeded resource
/// is rejected, or the server fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging is not up yet, so note the source later.
    let (config, source) = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("rescue-daemon starting");
    match &source {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => info!("Config file not found, using defaults"),
    }

    // 3. Create the engine.
    let engine = Arc::new(DispatchEngine::new(FanoutHub::new(
        config.fanout.channel_capacity,
    )));
    info!(
        channel_capacity = config.fanout.channel_capacity,
        "Dispatch engine initialized"
    );

    // 4. Seed resources.
    let report = seed_engine(&engine, &config.seed)
        .await
        .map_err(DaemonError::from)?;
    info!(
        vehicles = report.vehicles,
        responders = report.responders,
        facilities = report.facilities,
        "Seed resources registered"
    );

    // 5. Serve.
    let state = Arc::new(AppState::new(engine));
    start_server(&config.server, state)
        .await
        .map_err(DaemonError::from)?;

    info!("rescue-daemon stopped");
    Ok(())
}

/// Read the config file named by `RESCUE_CONFIG`, falling back to
/// `rescue-config.yaml`. A missing file yields defaults.
fn load_config() -> Result<(RescueConfig, Option<PathBuf>), DaemonError> {
    let path = std::env::var_os("RESCUE_CONFIG")
        .map_or_else(|| PathBuf::from("rescue-config.yaml"), PathBuf::from);
    if path.exists() {
        let config = RescueConfig::from_file(&path)?;
        Ok((config, Some(path)))
    } else {
        let mut config = RescueConfig::default();
        config.server.apply_env_overrides();
        Ok((config, None))
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
