//! Remaining-useful-life prediction library for aircraft subsystems
//!
//! This crate provides the core functionality for:
//! - Safe model artifact resolution (trusted documents, ONNX fallback)
//! - Feature imputation and width adaptation
//! - Per-subsystem RUL prediction
//! - Metrics and structured logging

pub mod artifacts;
pub mod error;
pub mod features;
pub mod models;
pub mod observability;
pub mod predictor;

pub use error::{ArtifactError, ModelError, RulError};
pub use features::FeatureDefaults;
pub use models::*;
pub use observability::{ServiceMetrics, StructuredLogger};
pub use predictor::{PredictionService, ServiceConfig};
