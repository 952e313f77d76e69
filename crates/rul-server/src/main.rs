//! RUL server - remaining-useful-life predictions over HTTP
//!
//! Serves per-subsystem predictions from the artifacts in the configured
//! models directory.

use anyhow::Result;
use rul_core::{FeatureDefaults, PredictionService, StructuredLogger};
use rul_server::{api, config::ServerConfig};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting rul-server");

    let config = ServerConfig::load()?;
    info!(
        api_port = config.api_port,
        models_dir = %config.models_dir.display(),
        "Server configured"
    );

    // Defaults are read once; a missing or broken file leaves them empty
    let defaults = Arc::new(FeatureDefaults::load(&config.defaults_path()));

    let logger = StructuredLogger::new("rul-server");
    let service = PredictionService::new(config.service_config(), defaults)
        .with_logger(logger.clone());
    logger.log_startup(SERVER_VERSION, &config.models_dir, config.cache_models);

    let app_state = Arc::new(api::AppState::new(service, config.request_timeout()));
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::select! {
        result = api_handle => {
            match result {
                Ok(Ok(())) => logger.log_shutdown("server exited"),
                Ok(Err(e)) => {
                    error!(error = %e, "API server failed");
                    logger.log_shutdown("server error");
                    return Err(e);
                }
                Err(e) => {
                    logger.log_shutdown("server task panicked");
                    return Err(e.into());
                }
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
        }
    }

    info!("Shutting down");
    Ok(())
}
