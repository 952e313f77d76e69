//! Per-subsystem prediction orchestration
//!
//! impute → (propulsion: rescale) → (others: adapt to model width) →
//! predict → tag with unit and version. Batches are all-or-nothing.

use super::OutputFormatter;
use crate::artifacts::{LoadedArtifact, ModelArtifactLoader, ModelCache};
use crate::error::{ModelError, RulError};
use crate::features::{adapt, impute, FeatureDefaults};
use crate::models::{
    FeatureVector, ModelDescription, ModelInfo, RawObservation, RulPrediction, Subsystem,
};
use crate::observability::{ServiceMetrics, StructuredLogger};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Default artifact directory, relative to the working directory
pub const DEFAULT_MODELS_DIR: &str = "models";

/// Configuration for the prediction service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Directory holding the model artifacts
    pub models_dir: PathBuf,
    /// Keep loaded artifacts between requests (fingerprint-invalidated)
    pub cache_models: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
            cache_models: false,
        }
    }
}

/// Turns raw subsystem records into RUL estimates
pub struct PredictionService {
    config: ServiceConfig,
    defaults: Arc<FeatureDefaults>,
    loader: ModelArtifactLoader,
    cache: Option<ModelCache>,
    metrics: ServiceMetrics,
    logger: StructuredLogger,
}

impl PredictionService {
    pub fn new(config: ServiceConfig, defaults: Arc<FeatureDefaults>) -> Self {
        Self::with_loader(config, defaults, ModelArtifactLoader::new())
    }

    pub fn with_loader(
        config: ServiceConfig,
        defaults: Arc<FeatureDefaults>,
        loader: ModelArtifactLoader,
    ) -> Self {
        let cache = config.cache_models.then(ModelCache::new);
        Self {
            config,
            defaults,
            loader,
            cache,
            metrics: ServiceMetrics::new(),
            logger: StructuredLogger::new("rul-core"),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn defaults(&self) -> &FeatureDefaults {
        &self.defaults
    }

    /// Predict RUL for a single record
    pub fn predict(
        &self,
        subsystem: Subsystem,
        record: &RawObservation,
    ) -> Result<RulPrediction, RulError> {
        self.predict_batch(subsystem, std::slice::from_ref(record))?
            .pop()
            .ok_or_else(|| {
                RulError::inference(
                    subsystem.model_name(),
                    ModelError::OutputCount {
                        expected: 1,
                        actual: 0,
                    },
                )
            })
    }

    /// Predict RUL for every record, preserving input order.
    ///
    /// Any failure fails the whole batch. An empty batch returns an empty
    /// list without resolving any artifact.
    pub fn predict_batch(
        &self,
        subsystem: Subsystem,
        records: &[RawObservation],
    ) -> Result<Vec<RulPrediction>, RulError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let label = subsystem.model_name();

        match self.run_batch(subsystem, records) {
            Ok((predictions, model)) => {
                let elapsed = start.elapsed();
                self.metrics
                    .observe_prediction_latency(label, elapsed.as_secs_f64());
                self.metrics.add_predictions(label, predictions.len());
                self.logger.log_prediction(
                    label,
                    predictions.len(),
                    subsystem.model_version(),
                    &model.source.file,
                    elapsed.as_secs_f64() * 1000.0,
                );
                Ok(predictions)
            }
            Err(e) => {
                self.metrics.inc_prediction_errors(label, e.kind());
                self.logger
                    .log_prediction_failure(label, e.kind(), &e.to_string());
                Err(e)
            }
        }
    }

    fn run_batch(
        &self,
        subsystem: Subsystem,
        records: &[RawObservation],
    ) -> Result<(Vec<RulPrediction>, LoadedArtifact), RulError> {
        let name = subsystem.model_name();
        let model = self.resolve(name)?;
        let rescaler = subsystem
            .rescaler()
            .map(|scaler| self.resolve(scaler).map(|loaded| (scaler, loaded)))
            .transpose()?;

        let defaults = self.defaults.section(subsystem.defaults_key());
        let expected_width = model.model.expected_input_size();

        let batch = records
            .iter()
            .map(|record| {
                let imputed = impute(subsystem.feature_names(), record, defaults);
                match &rescaler {
                    Some((scaler_name, scaler)) => rescale(scaler_name, scaler, imputed),
                    None => Ok(adapt(imputed, expected_width)),
                }
            })
            .collect::<Result<Vec<FeatureVector>, RulError>>()?;

        debug!(
            subsystem = %subsystem,
            rows = batch.len(),
            width = batch.first().map(Vec::len).unwrap_or(0),
            "Prepared feature batch"
        );

        let outputs = model
            .model
            .predict(&batch)
            .map_err(|e| RulError::inference(name, e))?;
        let predictions = OutputFormatter::new(subsystem)
            .format(outputs, batch.len())
            .map_err(|e| RulError::inference(name, e))?;

        Ok((predictions, model))
    }

    /// Diagnostic description of a subsystem's current artifact
    pub fn describe_model(&self, subsystem: Subsystem) -> Result<ModelInfo, RulError> {
        let loaded = self.resolve(subsystem.model_name())?;
        Ok(ModelInfo {
            type_name: loaded.model.type_name().to_string(),
            expected_input_size: loaded.model.expected_input_size(),
            feature_names: loaded.model.input_feature_names().map(<[String]>::to_vec),
            source_file: loaded.source.file,
            format: loaded.source.format.to_string(),
            checksum: loaded.source.checksum,
        })
    }

    /// Describe every subsystem; load failures are reported per entry
    pub fn describe_models(&self) -> BTreeMap<String, ModelDescription> {
        Subsystem::ALL
            .into_iter()
            .map(|subsystem| {
                let description = match self.describe_model(subsystem) {
                    Ok(info) => ModelDescription::Loaded(info),
                    Err(e) => ModelDescription::Failed {
                        load_error: format!("{}: {}", e.kind(), e),
                    },
                };
                (subsystem.model_name().to_string(), description)
            })
            .collect()
    }

    fn resolve(&self, name: &str) -> Result<LoadedArtifact, RulError> {
        let dir = &self.config.models_dir;
        let (artifact, cached) = match &self.cache {
            Some(cache) => {
                let lookup = cache.get_or_load(&self.loader, name, dir)?;
                (lookup.artifact, lookup.hit)
            }
            None => (self.loader.load(name, dir)?, false),
        };

        if cached {
            self.metrics.inc_cache_hits();
        } else {
            self.metrics.inc_artifact_loads(artifact.source.format.as_str());
            self.logger.log_model_load(
                name,
                &artifact.source.file,
                artifact.source.format.as_str(),
                &artifact.source.checksum,
                self.cache.is_some(),
            );
        }
        Ok(artifact)
    }
}

fn rescale(
    scaler_name: &str,
    scaler: &LoadedArtifact,
    vector: FeatureVector,
) -> Result<FeatureVector, RulError> {
    let mut transformed = scaler
        .model
        .transform(std::slice::from_ref(&vector))
        .map_err(|e| RulError::inference(scaler_name, e))?;
    transformed.pop().ok_or_else(|| {
        RulError::inference(
            scaler_name,
            ModelError::OutputCount {
                expected: 1,
                actual: 0,
            },
        )
    })
}
