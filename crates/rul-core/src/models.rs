//! Core data models for the RUL service

use crate::features::{ENGINE_FEATURES, HYDRAULICS_FEATURES, LANDING_GEAR_FEATURES};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Unit label attached to every prediction
pub const RUL_UNITS: &str = "cycles";

/// Ordered numeric model input
pub type FeatureVector = Vec<f64>;

/// Aircraft subsystem with its own feature list and model artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subsystem {
    /// Engine, trained on the FD001 turbofan data
    Propulsion,
    /// Hydraulic circuit
    Hydraulics,
    LandingGear,
}

impl Subsystem {
    pub const ALL: [Subsystem; 3] = [
        Subsystem::Propulsion,
        Subsystem::Hydraulics,
        Subsystem::LandingGear,
    ];

    /// Logical model name in the artifact registry
    pub fn model_name(&self) -> &'static str {
        match self {
            Subsystem::Propulsion => "engine",
            Subsystem::Hydraulics => "hydraulics",
            Subsystem::LandingGear => "landing_gear",
        }
    }

    /// Section of the defaults document holding this subsystem's values
    pub fn defaults_key(&self) -> &'static str {
        match self {
            Subsystem::Propulsion => "engine",
            Subsystem::Hydraulics => "hyd",
            Subsystem::LandingGear => "lg",
        }
    }

    pub fn model_version(&self) -> &'static str {
        match self {
            Subsystem::Propulsion => "best_model_fd001",
            Subsystem::Hydraulics => "agg_best_model",
            Subsystem::LandingGear => "best_rul_model_top3",
        }
    }

    pub fn feature_names(&self) -> &'static [&'static str] {
        match self {
            Subsystem::Propulsion => &ENGINE_FEATURES,
            Subsystem::Hydraulics => &HYDRAULICS_FEATURES,
            Subsystem::LandingGear => &LANDING_GEAR_FEATURES,
        }
    }

    /// Registry name of the pre-fitted rescaler applied before prediction
    pub fn rescaler(&self) -> Option<&'static str> {
        match self {
            Subsystem::Propulsion => Some("scaler_engine"),
            _ => None,
        }
    }

    pub fn from_model_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.model_name() == name)
    }
}

impl std::fmt::Display for Subsystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.model_name())
    }
}

/// Raw named-field record as received from a caller
///
/// Values are kept untyped; imputation decides what counts as numeric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawObservation(pub Map<String, Value>);

impl RawObservation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for RawObservation {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// RUL estimate for one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulPrediction {
    pub predicted_rul: f64,
    pub units: String,
    pub model_version: String,
}

impl RulPrediction {
    pub fn new(predicted_rul: f64, subsystem: Subsystem) -> Self {
        Self {
            predicted_rul,
            units: RUL_UNITS.to_string(),
            model_version: subsystem.model_version().to_string(),
        }
    }
}

/// Diagnostic description of a loaded model artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(rename = "n_features_in_")]
    pub expected_input_size: Option<usize>,
    #[serde(rename = "feature_names_in_")]
    pub feature_names: Option<Vec<String>>,
    pub source_file: String,
    pub format: String,
    pub checksum: String,
}

/// Per-subsystem diagnostics entry; load failures are reported, not raised
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelDescription {
    Loaded(ModelInfo),
    Failed { load_error: String },
}
