//! Trusted model documents (`*.model.json`)
//!
//! Layout:
//!
//! ```json
//! {"format": "rul-model", "version": 1,
//!  "root": {"type": "dict", "entries": {"model": {"type": "LinearRegression", ...}}}}
//! ```
//!
//! Every object carrying a `"type"` key declares an embedded type. The raw
//! JSON tree is scanned for those declarations before any typed
//! deserialization, and the document is rejected if one is not on the
//! allow-list.

use super::estimators::{LinearRegression, Pipeline, StandardScaler, TreeEnsembleRegressor, TreeNode};
use super::{ArtifactDecoder, ArtifactFormat, ArtifactObject, Model};
use crate::error::ArtifactError;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Value of the document's `format` field
pub const DOCUMENT_FORMAT: &str = "rul-model";

/// Only supported document version
pub const DOCUMENT_VERSION: u64 = 1;

/// Embedded types a trusted document may declare
pub const ALLOWED_TYPES: [&str; 5] = [
    "dict",
    "LinearRegression",
    "StandardScaler",
    "TreeEnsembleRegressor",
    "Pipeline",
];

const CONTAINER_TYPE: &str = "dict";

/// Decoder for trusted documents
#[derive(Debug, Clone)]
pub struct TrustedFormatLoader {
    allowed: Vec<String>,
}

impl Default for TrustedFormatLoader {
    fn default() -> Self {
        Self {
            allowed: ALLOWED_TYPES.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl TrustedFormatLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the allow-list further. Types without a native decoder are
    /// still rejected at deserialization.
    pub fn with_allowed_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: types.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allowed_types(&self) -> &[String] {
        &self.allowed
    }
}

impl ArtifactDecoder for TrustedFormatLoader {
    fn format(&self) -> ArtifactFormat {
        ArtifactFormat::Trusted
    }

    fn decode(&self, bytes: &[u8]) -> Result<ArtifactObject, ArtifactError> {
        let document: Value = serde_json::from_slice(bytes)?;
        let root = check_header(&document)?;

        let untrusted = untrusted_types(root, self.allowed.as_slice());
        if !untrusted.is_empty() {
            return Err(ArtifactError::DisallowedTypes(untrusted));
        }

        decode_node(root)
    }
}

fn check_header(document: &Value) -> Result<&Value, ArtifactError> {
    let Value::Object(header) = document else {
        return Err(ArtifactError::Header("document is not an object".to_string()));
    };

    match header.get("format").and_then(Value::as_str) {
        Some(DOCUMENT_FORMAT) => {}
        Some(other) => return Err(ArtifactError::Header(format!("unknown format '{}'", other))),
        None => return Err(ArtifactError::Header("missing format".to_string())),
    }

    match header.get("version").and_then(Value::as_u64) {
        Some(DOCUMENT_VERSION) => {}
        Some(other) => {
            return Err(ArtifactError::Header(format!(
                "version {} is not supported (expected {})",
                other, DOCUMENT_VERSION
            )))
        }
        None => return Err(ArtifactError::Header("missing version".to_string())),
    }

    header
        .get("root")
        .ok_or_else(|| ArtifactError::Header("missing root".to_string()))
}

/// Collect every declared type in `node` that is not in `allowed`.
///
/// Non-string `type` values are reported by their JSON rendering. The
/// result is sorted and deduplicated.
pub fn untrusted_types<S: AsRef<str>>(node: &Value, allowed: &[S]) -> Vec<String> {
    let mut found = BTreeSet::new();
    collect_untrusted(node, allowed, &mut found);
    found.into_iter().collect()
}

fn collect_untrusted<S: AsRef<str>>(node: &Value, allowed: &[S], found: &mut BTreeSet<String>) {
    match node {
        Value::Object(map) => {
            if let Some(declared) = map.get("type") {
                match declared.as_str() {
                    Some(name) if allowed.iter().any(|a| a.as_ref() == name) => {}
                    Some(name) => {
                        found.insert(name.to_string());
                    }
                    None => {
                        found.insert(declared.to_string());
                    }
                }
            }
            for child in map.values() {
                collect_untrusted(child, allowed, found);
            }
        }
        Value::Array(items) => {
            for child in items {
                collect_untrusted(child, allowed, found);
            }
        }
        _ => {}
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ModelNode {
    LinearRegression {
        coef: Vec<f64>,
        intercept: f64,
        #[serde(default)]
        feature_names: Option<Vec<String>>,
    },
    StandardScaler {
        mean: Vec<f64>,
        scale: Vec<f64>,
        #[serde(default)]
        feature_names: Option<Vec<String>>,
    },
    TreeEnsembleRegressor {
        n_features: usize,
        #[serde(default)]
        base_score: f64,
        trees: Vec<TreeSpec>,
        #[serde(default)]
        feature_names: Option<Vec<String>>,
    },
    Pipeline {
        steps: Vec<(String, ModelNode)>,
    },
}

#[derive(Debug, Deserialize)]
struct TreeSpec {
    nodes: Vec<TreeNode>,
}

fn check_names(names: &Option<Vec<String>>, width: usize) -> Result<(), ArtifactError> {
    match names {
        Some(names) if names.len() != width => Err(ArtifactError::InvalidModel(format!(
            "{} feature names for {} inputs",
            names.len(),
            width
        ))),
        _ => Ok(()),
    }
}

impl ModelNode {
    fn build(self) -> Result<Arc<dyn Model>, ArtifactError> {
        match self {
            ModelNode::LinearRegression {
                coef,
                intercept,
                feature_names,
            } => {
                if coef.is_empty() {
                    return Err(ArtifactError::InvalidModel(
                        "LinearRegression has no coefficients".to_string(),
                    ));
                }
                check_names(&feature_names, coef.len())?;
                Ok(Arc::new(
                    LinearRegression::new(coef, intercept).with_feature_names(feature_names),
                ))
            }
            ModelNode::StandardScaler {
                mean,
                scale,
                feature_names,
            } => {
                if mean.len() != scale.len() {
                    return Err(ArtifactError::InvalidModel(format!(
                        "StandardScaler mean has {} entries but scale has {}",
                        mean.len(),
                        scale.len()
                    )));
                }
                check_names(&feature_names, mean.len())?;
                Ok(Arc::new(
                    StandardScaler::new(mean, scale).with_feature_names(feature_names),
                ))
            }
            ModelNode::TreeEnsembleRegressor {
                n_features,
                base_score,
                trees,
                feature_names,
            } => {
                check_names(&feature_names, n_features)?;
                let trees = trees.into_iter().map(|t| t.nodes).collect();
                let model = TreeEnsembleRegressor::new(n_features, base_score, trees)
                    .map_err(ArtifactError::InvalidModel)?;
                Ok(Arc::new(model.with_feature_names(feature_names)))
            }
            ModelNode::Pipeline { steps } => {
                let steps = steps
                    .into_iter()
                    .map(|(name, node)| Ok((name, node.build()?)))
                    .collect::<Result<Vec<_>, ArtifactError>>()?;
                Ok(Arc::new(Pipeline::new(steps).map_err(ArtifactError::InvalidModel)?))
            }
        }
    }
}

fn decode_node(node: &Value) -> Result<ArtifactObject, ArtifactError> {
    let Value::Object(map) = node else {
        return Ok(ArtifactObject::Value(node.clone()));
    };

    match map.get("type").and_then(Value::as_str) {
        Some(CONTAINER_TYPE) => {
            let entries = map
                .get("entries")
                .and_then(Value::as_object)
                .ok_or_else(|| ArtifactError::InvalidModel("dict without entries".to_string()))?;
            let decoded = entries
                .iter()
                .map(|(key, value)| Ok((key.clone(), decode_node(value)?)))
                .collect::<Result<BTreeMap<_, _>, ArtifactError>>()?;
            Ok(ArtifactObject::Container(decoded))
        }
        Some(_) => {
            let typed: ModelNode = serde_json::from_value(node.clone())
                .map_err(|e| ArtifactError::InvalidModel(e.to_string()))?;
            Ok(ArtifactObject::Model(typed.build()?))
        }
        None => Ok(ArtifactObject::Value(node.clone())),
    }
}
