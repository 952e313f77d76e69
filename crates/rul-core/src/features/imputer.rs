//! Row imputation
//!
//! Imputation is total: malformed or missing inputs degrade to the
//! configured default (or 0.0) instead of failing the request.

use crate::models::{FeatureVector, RawObservation};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Replacement for +Infinity after imputation
pub const POS_INF_CLAMP: f64 = 1e6;

/// Replacement for -Infinity after imputation
pub const NEG_INF_CLAMP: f64 = -1e6;

/// Convert a raw value to a number, or `None` if it is not usable.
///
/// Numbers convert directly, booleans map to 1.0/0.0 and strings are
/// trimmed and parsed (including `inf`/`nan` spellings). Null, arrays and
/// objects fail. A NaN result also counts as failure; infinities pass
/// through and are clamped later.
pub fn coerce_numeric(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    };
    parsed.filter(|v| !v.is_nan())
}

/// NaN → 0.0, +inf → 1e6, -inf → -1e6; finite values unchanged
pub fn clamp_non_finite(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else if value == f64::INFINITY {
        POS_INF_CLAMP
    } else if value == f64::NEG_INFINITY {
        NEG_INF_CLAMP
    } else {
        value
    }
}

/// Build the ordered feature vector for `feature_names` from `values`.
///
/// Each absent or non-numeric entry takes `defaults[name]`, or 0.0 when no
/// default is configured. The result always has `feature_names.len()`
/// entries and contains no NaN.
pub fn impute(
    feature_names: &[&str],
    values: &RawObservation,
    defaults: Option<&HashMap<String, f64>>,
) -> FeatureVector {
    let mut defaulted = 0usize;
    let vector: FeatureVector = feature_names
        .iter()
        .map(|name| {
            let raw = values
                .get(name)
                .and_then(coerce_numeric)
                .unwrap_or_else(|| {
                    defaulted += 1;
                    defaults
                        .and_then(|d| d.get(*name))
                        .copied()
                        .unwrap_or(0.0)
                });
            clamp_non_finite(raw)
        })
        .collect();

    if defaulted > 0 {
        debug!(
            features = feature_names.len(),
            defaulted = defaulted,
            "Imputed missing or non-numeric features"
        );
    }
    vector
}
