//! Server configuration

use anyhow::{Context, Result};
use rul_core::features::FEATURE_DEFAULTS_FILE;
use rul_core::predictor::DEFAULT_MODELS_DIR;
use rul_core::ServiceConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration, read from `RUL_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen port
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Directory holding the model artifacts
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Feature defaults document; `<models_dir>/feature_defaults.json` when unset
    #[serde(default)]
    pub defaults_path: Option<PathBuf>,

    /// Keep loaded artifacts in memory between requests
    #[serde(default)]
    pub cache_models: bool,

    /// Upper bound on a single prediction request, in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_api_port() -> u16 {
    8000
}

fn default_models_dir() -> PathBuf {
    PathBuf::from(DEFAULT_MODELS_DIR)
}

fn default_request_timeout_ms() -> u64 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_port: default_api_port(),
            models_dir: default_models_dir(),
            defaults_path: None,
            cache_models: false,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        Self::from_source(config::Environment::with_prefix("RUL"))
    }

    fn from_source<S>(source: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        config::Config::builder()
            .add_source(source)
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")
    }

    pub fn defaults_path(&self) -> PathBuf {
        self.defaults_path
            .clone()
            .unwrap_or_else(|| self.models_dir.join(FEATURE_DEFAULTS_FILE))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            models_dir: self.models_dir.clone(),
            cache_models: self.cache_models,
        }
    }
}
