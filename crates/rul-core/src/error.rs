//! Error types surfaced by the RUL core
//!
//! `RulError` is what callers see. Format decoders report `ArtifactError`
//! and models report `ModelError`; the loader and the prediction service
//! fold those into the fatal kinds below.

use std::path::PathBuf;
use thiserror::Error;

/// Failure decoding a single artifact file
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported document header: {0}")]
    Header(String),

    #[error("untrusted embedded types: {}", .0.join(", "))]
    DisallowedTypes(Vec<String>),

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("artifact does not contain a model (found {0})")]
    NotAModel(String),

    #[error("ONNX graph rejected: {0}")]
    Onnx(String),
}

/// Failure running a loaded model
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("input width mismatch: expected {expected}, got {actual}")]
    InputWidth { expected: usize, actual: usize },

    #[error("{type_name} does not support {operation}")]
    Unsupported {
        type_name: String,
        operation: &'static str,
    },

    #[error("model returned {actual} outputs for a batch of {expected}")]
    OutputCount { expected: usize, actual: usize },

    #[error("backend failure: {0}")]
    Backend(String),
}

/// Errors returned to callers of the prediction service
#[derive(Debug, Error)]
pub enum RulError {
    #[error("Unknown model name: {0}")]
    UnknownModelName(String),

    #[error("Failed to load trusted artifact for '{name}' in {}: {file}: {cause}", .dir.display())]
    ArtifactCorrupt {
        name: String,
        dir: PathBuf,
        file: String,
        #[source]
        cause: ArtifactError,
    },

    #[error(
        "No loadable artifact for '{name}' in {} (tried: {}). Details: {}",
        .dir.display(),
        .tried.join(", "),
        describe_failures(.failures)
    )]
    ArtifactNotFound {
        name: String,
        dir: PathBuf,
        tried: Vec<String>,
        failures: Vec<(String, String)>,
    },

    #[error("Inference failed for '{model}': {source}")]
    Inference {
        model: String,
        #[source]
        source: ModelError,
    },
}

impl RulError {
    /// Stable name of the error kind, used in client-visible messages and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            RulError::UnknownModelName(_) => "UnknownModelName",
            RulError::ArtifactCorrupt { .. } => "ArtifactCorrupt",
            RulError::ArtifactNotFound { .. } => "ArtifactNotFound",
            RulError::Inference { .. } => "Inference",
        }
    }

    pub(crate) fn inference(model: &str, source: ModelError) -> Self {
        RulError::Inference {
            model: model.to_string(),
            source,
        }
    }
}

fn describe_failures(failures: &[(String, String)]) -> String {
    if failures.is_empty() {
        return "(no candidate files existed)".to_string();
    }
    failures
        .iter()
        .map(|(file, message)| format!("- {}: {}", file, message))
        .collect::<Vec<_>>()
        .join("; ")
}
