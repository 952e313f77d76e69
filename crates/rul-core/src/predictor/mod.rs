//! RUL prediction engine

mod output;
mod service;

pub use output::OutputFormatter;
pub use service::{PredictionService, ServiceConfig, DEFAULT_MODELS_DIR};
