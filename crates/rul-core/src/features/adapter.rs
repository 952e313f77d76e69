//! Dimension adaptation for schema drift
//!
//! Historical artifacts may have been trained on a different feature count
//! than the subsystem's current feature list. The vector is right-padded with
//! zeros or truncated to the model's declared width. Both directions are
//! lossy: truncation drops trailing features, padding feeds the model zeros.

use crate::models::FeatureVector;
use std::cmp::Ordering;
use tracing::debug;

/// Pad or truncate `vector` to `expected_size`; unknown size leaves it unchanged
pub fn adapt(mut vector: FeatureVector, expected_size: Option<usize>) -> FeatureVector {
    let Some(expected) = expected_size else {
        return vector;
    };

    match vector.len().cmp(&expected) {
        Ordering::Less => debug!(from = vector.len(), to = expected, "Zero-padding feature vector"),
        Ordering::Greater => debug!(from = vector.len(), to = expected, "Truncating feature vector"),
        Ordering::Equal => return vector,
    }

    vector.resize(expected, 0.0);
    vector
}
