//! Generic-format artifacts: ONNX graphs run with tract
//!
//! The graph is opaque to us. No type allow-list applies; the only thing
//! read from it is the declared input width, which fixes the tract plan to
//! a single-row `[1, width]` f32 input.

use super::{ArtifactDecoder, ArtifactFormat, ArtifactObject, Model};
use crate::error::{ArtifactError, ModelError};
use crate::models::FeatureVector;
use std::sync::Arc;
use std::time::Instant;
use tract_onnx::prelude::*;
use tract_onnx::tract_hir::internal::DimLike;
use tracing::debug;

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Decoder for generic-format (ONNX) artifacts
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericFormatLoader;

impl ArtifactDecoder for GenericFormatLoader {
    fn format(&self) -> ArtifactFormat {
        ArtifactFormat::Generic
    }

    fn decode(&self, bytes: &[u8]) -> Result<ArtifactObject, ArtifactError> {
        Ok(ArtifactObject::Model(Arc::new(OnnxModel::from_bytes(bytes)?)))
    }
}

/// Optimized single-row tract plan for an ONNX regressor or transform
pub struct OnnxModel {
    plan: TractModel,
    input_width: usize,
}

fn onnx_error(context: &str, e: TractError) -> ArtifactError {
    ArtifactError::Onnx(format!("{}: {:#}", context, e))
}

impl OnnxModel {
    /// Parse, concretize and optimize an ONNX graph
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(bytes))
            .map_err(|e| onnx_error("Failed to parse ONNX model", e))?;

        let input_width = declared_input_width(&model)?;

        let plan = model
            .with_input_fact(0, f32::fact([1, input_width]).into())
            .map_err(|e| onnx_error("Failed to set input shape", e))?
            .into_optimized()
            .map_err(|e| onnx_error("Failed to optimize model", e))?
            .into_runnable()
            .map_err(|e| onnx_error("Failed to create runnable model", e))?;

        Ok(Self { plan, input_width })
    }

    fn run_row(&self, row: &[f64]) -> Result<Vec<f32>, ModelError> {
        if row.len() != self.input_width {
            return Err(ModelError::InputWidth {
                expected: self.input_width,
                actual: row.len(),
            });
        }

        let start = Instant::now();
        let data: Vec<f32> = row.iter().map(|v| *v as f32).collect();
        let input: Tensor = tract_ndarray::Array2::from_shape_vec((1, self.input_width), data)
            .map_err(|e| ModelError::Backend(e.to_string()))?
            .into();

        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| ModelError::Backend(format!("{:#}", e)))?;
        let output = outputs
            .first()
            .ok_or_else(|| ModelError::Backend("No output from model".to_string()))?;
        let values = output
            .cast_to::<f32>()
            .and_then(|t| Ok(t.as_slice::<f32>()?.to_vec()))
            .map_err(|e| ModelError::Backend(format!("{:#}", e)))?;

        debug!(elapsed_us = start.elapsed().as_micros(), "ONNX inference completed");
        Ok(values)
    }
}

/// Last dimension of the graph's first input, if it is a fixed size
fn declared_input_width(model: &InferenceModel) -> Result<usize, ArtifactError> {
    let typed = model
        .clone()
        .into_typed()
        .map_err(|e| onnx_error("Failed to type model", e))?;
    let fact = typed
        .input_fact(0)
        .map_err(|e| onnx_error("Model has no input", e))?;

    fact.shape
        .last()
        .and_then(|dim| dim.to_usize().ok())
        .filter(|width| *width > 0)
        .ok_or_else(|| ArtifactError::Onnx("input feature dimension is not fixed".to_string()))
}

impl Model for OnnxModel {
    fn type_name(&self) -> &str {
        "OnnxModel"
    }

    fn expected_input_size(&self) -> Option<usize> {
        Some(self.input_width)
    }

    fn predict(&self, batch: &[FeatureVector]) -> Result<Vec<f64>, ModelError> {
        batch
            .iter()
            .map(|row| {
                let values = self.run_row(row)?;
                values
                    .first()
                    .map(|v| f64::from(*v))
                    .ok_or_else(|| ModelError::Backend("Model returned an empty output".to_string()))
            })
            .collect()
    }

    fn transform(&self, batch: &[FeatureVector]) -> Result<Vec<FeatureVector>, ModelError> {
        batch
            .iter()
            .map(|row| {
                let values = self.run_row(row)?;
                Ok(values.into_iter().map(f64::from).collect())
            })
            .collect()
    }
}
