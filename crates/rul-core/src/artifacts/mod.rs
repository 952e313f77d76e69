//! Model artifacts: formats, registry, loading and caching
//!
//! Artifacts come in two formats. Trusted documents are self-describing and
//! every embedded type is checked against an allow-list before anything is
//! deserialized. Generic artifacts (ONNX graphs) are opaque and loaded as-is.
//! Both decode to an [`ArtifactObject`], which the loader unwraps into a
//! [`Model`].

mod cache;
mod estimators;
mod loader;
mod onnx;
mod registry;
mod typed;

pub use cache::{CacheLookup, ModelCache};
pub use estimators::{LinearRegression, Pipeline, StandardScaler, TreeEnsembleRegressor, TreeNode};
pub use loader::{ArtifactSource, LoadedArtifact, ModelArtifactLoader};
pub use onnx::{GenericFormatLoader, OnnxModel};
pub use registry::{lookup, Candidate, RegistryEntry, MODEL_REGISTRY};
pub use typed::{
    untrusted_types, TrustedFormatLoader, ALLOWED_TYPES, DOCUMENT_FORMAT, DOCUMENT_VERSION,
};

use crate::error::{ArtifactError, ModelError};
use crate::models::FeatureVector;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Container keys that name the predictor inside a bundled artifact, in lookup order
pub const ROLE_KEYS: [&str; 7] = [
    "model",
    "estimator",
    "pipeline",
    "regressor",
    "classifier",
    "clf",
    "pipe",
];

/// Loaded predictor capability
pub trait Model: Send + Sync {
    /// Declared type name, for diagnostics
    fn type_name(&self) -> &str;

    /// Input width the model was trained on, if it declares one
    fn expected_input_size(&self) -> Option<usize> {
        None
    }

    /// Input feature names the model was trained on, if it declares them
    fn input_feature_names(&self) -> Option<&[String]> {
        None
    }

    /// Predict one scalar per row
    fn predict(&self, batch: &[FeatureVector]) -> Result<Vec<f64>, ModelError>;

    /// Transform each row; only implemented by preprocessing models
    fn transform(&self, _batch: &[FeatureVector]) -> Result<Vec<FeatureVector>, ModelError> {
        Err(ModelError::Unsupported {
            type_name: self.type_name().to_string(),
            operation: "transform",
        })
    }
}

/// Serialization format of an artifact file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactFormat {
    /// Typed model document, pre-scanned against an allow-list
    Trusted,
    /// Opaque ONNX graph
    Generic,
}

impl ArtifactFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactFormat::Trusted => "trusted",
            ArtifactFormat::Generic => "generic",
        }
    }
}

impl std::fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decoder for one artifact format
pub trait ArtifactDecoder: Send + Sync {
    fn format(&self) -> ArtifactFormat;

    /// Decode the raw bytes of an artifact file
    fn decode(&self, bytes: &[u8]) -> Result<ArtifactObject, ArtifactError>;
}

/// Deserialized artifact content before unwrapping
pub enum ArtifactObject {
    Model(Arc<dyn Model>),
    /// Keyed bundle such as `{"model": ..., "meta": ...}`
    Container(BTreeMap<String, ArtifactObject>),
    /// Plain data that is neither a model nor a container
    Value(serde_json::Value),
}

impl ArtifactObject {
    /// Extract the predictor from a keyed container.
    ///
    /// Takes the first non-null value under a [`ROLE_KEYS`] key; failing
    /// that, the only value of a single-entry container; otherwise returns
    /// the object unchanged.
    pub fn unwrap_container(self) -> ArtifactObject {
        let ArtifactObject::Container(mut entries) = self else {
            return self;
        };

        for key in ROLE_KEYS {
            if entries.get(key).is_some_and(|v| !v.is_null()) {
                if let Some(value) = entries.remove(key) {
                    return value;
                }
            }
        }

        if entries.len() == 1 {
            if let Some((_, value)) = entries.pop_first() {
                return value;
            }
        }
        ArtifactObject::Container(entries)
    }

    pub fn into_model(self) -> Result<Arc<dyn Model>, ArtifactError> {
        match self {
            ArtifactObject::Model(model) => Ok(model),
            other => Err(ArtifactError::NotAModel(other.describe())),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ArtifactObject::Value(serde_json::Value::Null))
    }

    /// Short human-readable summary
    pub fn describe(&self) -> String {
        match self {
            ArtifactObject::Model(model) => model.type_name().to_string(),
            ArtifactObject::Container(entries) => {
                let keys: Vec<&str> = entries.keys().map(String::as_str).collect();
                format!("container with keys [{}]", keys.join(", "))
            }
            ArtifactObject::Value(value) => format!("plain value {}", value),
        }
    }
}

impl std::fmt::Debug for ArtifactObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.describe())
    }
}
