//! Per-subsystem feature defaults
//!
//! Loaded once at startup from an optional JSON document shaped as
//! `{subsystem: {feature: default}}` and shared read-only afterwards.

use super::coerce_numeric;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Conventional file name of the defaults document inside the models directory
pub const FEATURE_DEFAULTS_FILE: &str = "feature_defaults.json";

/// Immutable subsystem → feature → default mapping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureDefaults {
    sections: HashMap<String, HashMap<String, f64>>,
}

impl FeatureDefaults {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_sections(sections: HashMap<String, HashMap<String, f64>>) -> Self {
        Self { sections }
    }

    /// Load defaults from `path`.
    ///
    /// Never fails: a missing file yields empty defaults, and an unreadable
    /// or malformed one is logged and also treated as empty.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "No feature defaults file, using empty defaults");
            return Self::empty();
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read feature defaults, using empty defaults");
                return Self::empty();
            }
        };

        match Self::from_json_str(&content) {
            Ok(defaults) => {
                info!(
                    path = %path.display(),
                    sections = defaults.sections.len(),
                    "Loaded feature defaults"
                );
                defaults
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to parse feature defaults, using empty defaults");
                Self::empty()
            }
        }
    }

    /// Parse a defaults document.
    ///
    /// Sections that are not objects and values that are not numeric are
    /// skipped with a warning rather than rejecting the whole document.
    pub fn from_json_str(content: &str) -> Result<Self, serde_json::Error> {
        let document: HashMap<String, Value> = serde_json::from_str(content)?;
        let mut sections = HashMap::with_capacity(document.len());

        for (subsystem, section) in document {
            let Value::Object(entries) = section else {
                warn!(subsystem = %subsystem, "Defaults section is not an object, skipping");
                continue;
            };

            let mut values = HashMap::with_capacity(entries.len());
            for (feature, raw) in entries {
                match coerce_numeric(&raw) {
                    Some(value) => {
                        values.insert(feature, value);
                    }
                    None => {
                        warn!(
                            subsystem = %subsystem,
                            feature = %feature,
                            value = %raw,
                            "Non-numeric feature default, skipping"
                        );
                    }
                }
            }
            sections.insert(subsystem, values);
        }

        Ok(Self { sections })
    }

    /// Defaults for one subsystem section, if any were configured
    pub fn section(&self, subsystem_key: &str) -> Option<&HashMap<String, f64>> {
        self.sections.get(subsystem_key)
    }

    pub fn get(&self, subsystem_key: &str, feature: &str) -> Option<f64> {
        self.section(subsystem_key)
            .and_then(|section| section.get(feature))
            .copied()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.values().all(HashMap::is_empty)
    }
}
