//! Prediction output formatting
//!
//! Wraps raw model outputs with the unit and per-subsystem version labels.

use crate::error::ModelError;
use crate::models::{RulPrediction, Subsystem};

/// Formats raw model outputs into tagged RUL predictions
#[derive(Debug, Clone, Copy)]
pub struct OutputFormatter {
    subsystem: Subsystem,
}

impl OutputFormatter {
    pub fn new(subsystem: Subsystem) -> Self {
        Self { subsystem }
    }

    /// Wrap one output per input row, in input order.
    ///
    /// The model must return exactly `batch_size` values.
    pub fn format(&self, outputs: Vec<f64>, batch_size: usize) -> Result<Vec<RulPrediction>, ModelError> {
        if outputs.len() != batch_size {
            return Err(ModelError::OutputCount {
                expected: batch_size,
                actual: outputs.len(),
            });
        }
        Ok(outputs
            .into_iter()
            .map(|value| RulPrediction::new(value, self.subsystem))
            .collect())
    }
}
