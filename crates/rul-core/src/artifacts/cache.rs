//! Read-through model cache keyed by models directory and logical name
//!
//! Each access fingerprints every candidate file of the entry by the SHA-256
//! of its current bytes (absent files fingerprint as missing). A cached
//! artifact is only served while the fingerprint is unchanged, so adding,
//! removing or rewriting any candidate forces a fresh resolution through the
//! loader, whatever the file's modification time says. Failures are never
//! cached and evict the previous entry.
//!
//! Concurrent first access holds a per-entry lock: one caller loads, the
//! others wait and reuse the result.

use super::loader::{compute_checksum, LoadedArtifact, ModelArtifactLoader};
use super::registry::{lookup, RegistryEntry};
use crate::error::RulError;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

type Fingerprint = Vec<Option<String>>;

type CacheKey = (PathBuf, String);

struct CachedArtifact {
    fingerprint: Fingerprint,
    artifact: LoadedArtifact,
}

/// Result of a cache lookup
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub artifact: LoadedArtifact,
    /// True when served without touching the loader
    pub hit: bool,
}

#[derive(Default)]
pub struct ModelCache {
    entries: DashMap<CacheKey, Arc<Mutex<Option<CachedArtifact>>>>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(
        &self,
        loader: &ModelArtifactLoader,
        name: &str,
        dir: &Path,
    ) -> Result<CacheLookup, RulError> {
        let entry = lookup(name).ok_or_else(|| RulError::UnknownModelName(name.to_string()))?;

        // Clone the slot out so the map shard is not held while loading
        let slot = self
            .entries
            .entry((dir.to_path_buf(), name.to_string()))
            .or_default()
            .clone();
        let mut guard = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let fingerprint = fingerprint(entry, dir);
        if let Some(cached) = guard.as_ref() {
            if cached.fingerprint == fingerprint {
                debug!(model = %name, dir = %dir.display(), "Serving cached artifact");
                return Ok(CacheLookup {
                    artifact: cached.artifact.clone(),
                    hit: true,
                });
            }
            debug!(model = %name, dir = %dir.display(), "Artifact files changed, reloading");
        }

        match loader.load_entry(entry, dir) {
            Ok(artifact) => {
                *guard = Some(CachedArtifact {
                    fingerprint,
                    artifact: artifact.clone(),
                });
                Ok(CacheLookup {
                    artifact,
                    hit: false,
                })
            }
            Err(e) => {
                *guard = None;
                Err(e)
            }
        }
    }

    /// Drop every cached artifact
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of entries with a cached artifact
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|slot| {
                slot.value()
                    .lock()
                    .map(|guard| guard.is_some())
                    .unwrap_or(false)
            })
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn fingerprint(entry: &RegistryEntry, dir: &Path) -> Fingerprint {
    entry
        .candidates
        .iter()
        .map(|candidate| {
            std::fs::read(dir.join(candidate.file))
                .ok()
                .map(|bytes| compute_checksum(&bytes))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread;
    use tempfile::TempDir;

    fn write_linear(dir: &Path, file: &str, coef: Vec<f64>) {
        let doc = json!({
            "format": "rul-model",
            "version": 1,
            "root": {"type": "LinearRegression", "coef": coef, "intercept": 0.0}
        });
        std::fs::write(dir.join(file), doc.to_string()).unwrap();
    }

    #[test]
    fn test_second_access_is_a_hit() {
        let temp_dir = TempDir::new().unwrap();
        write_linear(temp_dir.path(), "hydraulics.model.json", vec![1.0; 5]);

        let cache = ModelCache::new();
        let loader = ModelArtifactLoader::new();

        let first = cache.get_or_load(&loader, "hydraulics", temp_dir.path()).unwrap();
        let second = cache.get_or_load(&loader, "hydraulics", temp_dir.path()).unwrap();

        assert!(!first.hit);
        assert!(second.hit);
        assert!(Arc::ptr_eq(&first.artifact.model, &second.artifact.model));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_corrupted_replacement_fails_next_request() {
        let temp_dir = TempDir::new().unwrap();
        write_linear(temp_dir.path(), "hydraulics.model.json", vec![1.0; 5]);

        let cache = ModelCache::new();
        let loader = ModelArtifactLoader::new();
        cache.get_or_load(&loader, "hydraulics", temp_dir.path()).unwrap();

        std::fs::write(temp_dir.path().join("hydraulics.model.json"), "{corrupt").unwrap();

        let err = cache
            .get_or_load(&loader, "hydraulics", temp_dir.path())
            .unwrap_err();
        assert_eq!(err.kind(), "ArtifactCorrupt");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_new_trusted_file_invalidates_generic_result() {
        let temp_dir = TempDir::new().unwrap();
        write_linear(temp_dir.path(), "best_rul_model_top3.model.json", vec![1.0; 3]);

        let cache = ModelCache::new();
        let loader = ModelArtifactLoader::new();
        let first = cache.get_or_load(&loader, "landing_gear", temp_dir.path()).unwrap();
        assert_eq!(first.artifact.source.file, "best_rul_model_top3.model.json");

        std::fs::write(temp_dir.path().join("landing_gear.model.json"), "not json").unwrap();
        let err = cache
            .get_or_load(&loader, "landing_gear", temp_dir.path())
            .unwrap_err();
        assert!(matches!(err, RulError::ArtifactCorrupt { ref file, .. } if file == "landing_gear.model.json"));
    }

    #[test]
    fn test_failures_are_not_cached() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ModelCache::new();
        let loader = ModelArtifactLoader::new();

        assert!(cache.get_or_load(&loader, "hydraulics", temp_dir.path()).is_err());

        write_linear(temp_dir.path(), "hydraulics.model.json", vec![1.0; 8]);
        let loaded = cache.get_or_load(&loader, "hydraulics", temp_dir.path()).unwrap();
        assert!(!loaded.hit);
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let err = ModelCache::new()
            .get_or_load(&ModelArtifactLoader::new(), "apu", temp_dir.path())
            .unwrap_err();
        assert_eq!(err.kind(), "UnknownModelName");
    }

    #[test]
    fn test_concurrent_first_access_loads_once() {
        let temp_dir = TempDir::new().unwrap();
        write_linear(temp_dir.path(), "hydraulics.model.json", vec![1.0; 5]);

        let cache = Arc::new(ModelCache::new());
        let loader = ModelArtifactLoader::new();
        let dir = temp_dir.path().to_path_buf();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let loader = loader.clone();
                let dir = dir.clone();
                thread::spawn(move || cache.get_or_load(&loader, "hydraulics", &dir).unwrap())
            })
            .collect();

        let results: Vec<CacheLookup> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| !r.hit).count(), 1);
        for r in &results {
            assert!(Arc::ptr_eq(&r.artifact.model, &results[0].artifact.model));
        }
    }

    fn predict_one(lookup: &CacheLookup, width: usize) -> f64 {
        lookup.artifact.model.predict(&[vec![1.0; width]]).unwrap()[0]
    }

    #[test]
    fn test_same_length_rewrite_with_restored_mtime_is_detected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("hydraulics.model.json");
        write_linear(temp_dir.path(), "hydraulics.model.json", vec![1.0; 5]);
        let mtime = std::fs::metadata(&path).unwrap().modified().unwrap();

        let cache = ModelCache::new();
        let loader = ModelArtifactLoader::new();
        cache.get_or_load(&loader, "hydraulics", temp_dir.path()).unwrap();

        // Same size, and the timestamp put back the way `cp -p` would
        let len = std::fs::metadata(&path).unwrap().len() as usize;
        std::fs::write(&path, "x".repeat(len)).unwrap();
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();

        let err = cache
            .get_or_load(&loader, "hydraulics", temp_dir.path())
            .unwrap_err();
        assert_eq!(err.kind(), "ArtifactCorrupt");
    }

    #[test]
    fn test_entries_are_per_directory() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();
        write_linear(dir_a.path(), "hydraulics.model.json", vec![1.0; 5]);
        write_linear(dir_b.path(), "hydraulics.model.json", vec![2.0; 5]);

        // Identical size and timestamp in both directories
        let mtime = std::fs::metadata(dir_a.path().join("hydraulics.model.json"))
            .unwrap()
            .modified()
            .unwrap();
        std::fs::File::options()
            .write(true)
            .open(dir_b.path().join("hydraulics.model.json"))
            .unwrap()
            .set_modified(mtime)
            .unwrap();

        let cache = ModelCache::new();
        let loader = ModelArtifactLoader::new();
        let from_a = cache.get_or_load(&loader, "hydraulics", dir_a.path()).unwrap();
        let from_b = cache.get_or_load(&loader, "hydraulics", dir_b.path()).unwrap();

        assert!(!from_b.hit);
        assert_eq!(predict_one(&from_a, 5), 5.0);
        assert_eq!(predict_one(&from_b, 5), 10.0);
        assert_eq!(cache.len(), 2);

        assert!(cache.get_or_load(&loader, "hydraulics", dir_a.path()).unwrap().hit);
    }
}
