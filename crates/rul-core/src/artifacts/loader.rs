//! Resolution of logical model names to loaded artifacts
//!
//! Trusted candidates are tried first. The first trusted file that exists
//! either loads or fails the whole resolution; generic candidates are only
//! considered when no trusted file exists at all.

use super::registry::{lookup, Candidate, RegistryEntry};
use super::{
    ArtifactDecoder, ArtifactFormat, GenericFormatLoader, Model, TrustedFormatLoader,
};
use crate::error::{ArtifactError, RulError};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a loaded model came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSource {
    pub file: String,
    pub format: ArtifactFormat,
    /// SHA-256 of the file bytes, hex encoded
    pub checksum: String,
}

/// Unwrapped model plus its provenance
#[derive(Clone)]
pub struct LoadedArtifact {
    pub model: Arc<dyn Model>,
    pub source: ArtifactSource,
}

impl std::fmt::Debug for LoadedArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedArtifact")
            .field("model", &self.model.type_name())
            .field("source", &self.source)
            .finish()
    }
}

/// Loader for registry-listed artifacts, one decoder per format
#[derive(Clone)]
pub struct ModelArtifactLoader {
    trusted: Arc<dyn ArtifactDecoder>,
    generic: Arc<dyn ArtifactDecoder>,
}

impl Default for ModelArtifactLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelArtifactLoader {
    pub fn new() -> Self {
        Self::with_decoders(
            Arc::new(TrustedFormatLoader::new()),
            Arc::new(GenericFormatLoader),
        )
    }

    pub fn with_decoders(
        trusted: Arc<dyn ArtifactDecoder>,
        generic: Arc<dyn ArtifactDecoder>,
    ) -> Self {
        Self { trusted, generic }
    }

    fn decoder(&self, format: ArtifactFormat) -> &dyn ArtifactDecoder {
        match format {
            ArtifactFormat::Trusted => self.trusted.as_ref(),
            ArtifactFormat::Generic => self.generic.as_ref(),
        }
    }

    /// Resolve `name` against the static registry and load it from `dir`
    pub fn load(&self, name: &str, dir: &Path) -> Result<LoadedArtifact, RulError> {
        let entry = lookup(name).ok_or_else(|| RulError::UnknownModelName(name.to_string()))?;
        self.load_entry(entry, dir)
    }

    pub fn load_entry(&self, entry: &RegistryEntry, dir: &Path) -> Result<LoadedArtifact, RulError> {
        let name = entry.name;

        if let Some(candidate) = entry
            .candidates_of(ArtifactFormat::Trusted)
            .find(|c| dir.join(c.file).exists())
        {
            return self.load_candidate(candidate, dir).map_err(|cause| {
                warn!(
                    model = %name,
                    file = %candidate.file,
                    error = %cause,
                    "Trusted artifact present but failed to load"
                );
                RulError::ArtifactCorrupt {
                    name: name.to_string(),
                    dir: dir.to_path_buf(),
                    file: candidate.file.to_string(),
                    cause,
                }
            });
        }

        let mut failures = Vec::new();
        for candidate in entry.candidates_of(ArtifactFormat::Generic) {
            if !dir.join(candidate.file).exists() {
                continue;
            }
            match self.load_candidate(candidate, dir) {
                Ok(loaded) => return Ok(loaded),
                Err(e) => {
                    warn!(
                        model = %name,
                        file = %candidate.file,
                        error = %e,
                        "Generic artifact failed to load, trying next candidate"
                    );
                    failures.push((candidate.file.to_string(), e.to_string()));
                }
            }
        }

        Err(RulError::ArtifactNotFound {
            name: name.to_string(),
            dir: dir.to_path_buf(),
            tried: entry.file_names(),
            failures,
        })
    }

    fn load_candidate(
        &self,
        candidate: &Candidate,
        dir: &Path,
    ) -> Result<LoadedArtifact, ArtifactError> {
        let path = dir.join(candidate.file);
        debug!(path = %path.display(), format = %candidate.format, "Loading artifact");

        let bytes = std::fs::read(&path)?;
        let checksum = compute_checksum(&bytes);
        let model = self
            .decoder(candidate.format)
            .decode(&bytes)?
            .unwrap_container()
            .into_model()?;

        debug!(
            file = %candidate.file,
            format = %candidate.format,
            model_type = %model.type_name(),
            checksum = %checksum,
            "Artifact loaded"
        );

        Ok(LoadedArtifact {
            model,
            source: ArtifactSource {
                file: candidate.file.to_string(),
                format: candidate.format,
                checksum,
            },
        })
    }
}

/// Compute SHA256 checksum of data
pub(crate) fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{ArtifactObject, LinearRegression};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Generic decoder stand-in: every file holds a bundled linear model
    /// whose width is the file's byte length, unless it starts with `!`.
    #[derive(Default)]
    struct StubGeneric {
        calls: AtomicUsize,
    }

    impl ArtifactDecoder for StubGeneric {
        fn format(&self) -> ArtifactFormat {
            ArtifactFormat::Generic
        }

        fn decode(&self, bytes: &[u8]) -> Result<ArtifactObject, ArtifactError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if bytes.first() == Some(&b'!') {
                return Err(ArtifactError::Onnx("stub refused file".to_string()));
            }
            let model = ArtifactObject::Model(Arc::new(LinearRegression::new(
                vec![1.0; bytes.len()],
                0.0,
            )));
            Ok(ArtifactObject::Container(
                [
                    ("model".to_string(), model),
                    ("meta".to_string(), ArtifactObject::Value(json!("stub"))),
                ]
                .into_iter()
                .collect(),
            ))
        }
    }

    fn loader_with_stub() -> (ModelArtifactLoader, Arc<StubGeneric>) {
        let stub = Arc::new(StubGeneric::default());
        let loader =
            ModelArtifactLoader::with_decoders(Arc::new(TrustedFormatLoader::new()), stub.clone());
        (loader, stub)
    }

    fn trusted_document(root: Value) -> String {
        json!({"format": "rul-model", "version": 1, "root": root}).to_string()
    }

    fn linear_document(width: usize) -> String {
        trusted_document(json!({
            "type": "dict",
            "entries": {
                "model": {"type": "LinearRegression", "coef": vec![1.0; width], "intercept": 0.0},
                "meta": {"trained": "2024-03-01"}
            }
        }))
    }

    #[test]
    fn test_unknown_model_name() {
        let temp_dir = TempDir::new().unwrap();
        let err = ModelArtifactLoader::new()
            .load("auxiliary_power_unit", temp_dir.path())
            .unwrap_err();
        assert!(matches!(err, RulError::UnknownModelName(ref n) if n == "auxiliary_power_unit"));
    }

    #[test]
    fn test_nothing_present_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let err = ModelArtifactLoader::new()
            .load("landing_gear", temp_dir.path())
            .unwrap_err();
        match err {
            RulError::ArtifactNotFound { tried, failures, .. } => {
                assert_eq!(
                    tried,
                    vec![
                        "landing_gear.model.json",
                        "best_rul_model_top3.model.json",
                        "best_rul_model_top3.onnx"
                    ]
                );
                assert!(failures.is_empty());
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_trusted_bundle_is_unwrapped() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("hydraulics.model.json"), linear_document(5)).unwrap();

        let loaded = ModelArtifactLoader::new()
            .load("hydraulics", temp_dir.path())
            .unwrap();
        assert_eq!(loaded.model.type_name(), "LinearRegression");
        assert_eq!(loaded.model.expected_input_size(), Some(5));
        assert_eq!(loaded.source.file, "hydraulics.model.json");
        assert_eq!(loaded.source.format, ArtifactFormat::Trusted);
        assert_eq!(loaded.source.checksum.len(), 64);
    }

    #[test]
    fn test_second_trusted_candidate_used_when_first_absent() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("best_rul_model_top3.model.json"),
            linear_document(3),
        )
        .unwrap();

        let loaded = ModelArtifactLoader::new()
            .load("landing_gear", temp_dir.path())
            .unwrap();
        assert_eq!(loaded.source.file, "best_rul_model_top3.model.json");
    }

    #[test]
    fn test_corrupt_trusted_fails_before_generic() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("engine.model.json"), "{\"format\": \"rul-").unwrap();
        std::fs::write(temp_dir.path().join("best_model_fd001.onnx"), "valid").unwrap();

        let (loader, stub) = loader_with_stub();
        let err = loader.load("engine", temp_dir.path()).unwrap_err();

        assert!(matches!(err, RulError::ArtifactCorrupt { ref file, .. } if file == "engine.model.json"));
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_first_present_trusted_failure_is_final() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("landing_gear.model.json"),
            trusted_document(json!({"type": "os.system"})),
        )
        .unwrap();
        std::fs::write(
            temp_dir.path().join("best_rul_model_top3.model.json"),
            linear_document(3),
        )
        .unwrap();

        let err = ModelArtifactLoader::new()
            .load("landing_gear", temp_dir.path())
            .unwrap_err();
        match err {
            RulError::ArtifactCorrupt { file, cause, .. } => {
                assert_eq!(file, "landing_gear.model.json");
                assert!(matches!(cause, ArtifactError::DisallowedTypes(_)));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_trusted_without_model_is_corrupt() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("hydraulics.model.json"),
            trusted_document(json!({"type": "dict", "entries": {"a": 1, "b": 2}})),
        )
        .unwrap();

        let err = ModelArtifactLoader::new()
            .load("hydraulics", temp_dir.path())
            .unwrap_err();
        assert!(matches!(
            err,
            RulError::ArtifactCorrupt {
                cause: ArtifactError::NotAModel(_),
                ..
            }
        ));
    }

    #[test]
    fn test_generic_only_is_loaded_and_unwrapped() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("agg_best_model.onnx"), "12345").unwrap();

        let (loader, stub) = loader_with_stub();
        let loaded = loader.load("hydraulics", temp_dir.path()).unwrap();

        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
        assert_eq!(loaded.model.type_name(), "LinearRegression");
        assert_eq!(loaded.model.expected_input_size(), Some(5));
        assert_eq!(loaded.source.format, ArtifactFormat::Generic);
    }

    #[test]
    fn test_generic_failures_are_enumerated() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("agg_best_model.onnx"), "!broken").unwrap();

        let (loader, _stub) = loader_with_stub();
        let err = loader.load("hydraulics", temp_dir.path()).unwrap_err();
        match &err {
            RulError::ArtifactNotFound { failures, .. } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].0, "agg_best_model.onnx");
                assert!(failures[0].1.contains("stub refused file"));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(err.to_string().contains("hydraulics.model.json, agg_best_model.onnx"));
    }

    #[test]
    fn test_real_generic_decoder_reports_per_file_error() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("best_model_fd001.onnx"), b"\x00\x01garbage").unwrap();

        let err = ModelArtifactLoader::new()
            .load("engine", temp_dir.path())
            .unwrap_err();
        assert_eq!(err.kind(), "ArtifactNotFound");
    }

    #[test]
    fn test_checksum_consistency() {
        let data = b"test model weights";
        assert_eq!(compute_checksum(data), compute_checksum(data));
        assert_eq!(compute_checksum(data).len(), 64);
    }
}
