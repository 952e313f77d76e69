//! Static registry of logical model names and their candidate files

use super::ArtifactFormat;

/// One candidate file for a logical model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub format: ArtifactFormat,
    pub file: &'static str,
}

impl Candidate {
    const fn trusted(file: &'static str) -> Self {
        Self {
            format: ArtifactFormat::Trusted,
            file,
        }
    }

    const fn generic(file: &'static str) -> Self {
        Self {
            format: ArtifactFormat::Generic,
            file,
        }
    }
}

/// Logical model name with its candidates in resolution order
#[derive(Debug, Clone, Copy)]
pub struct RegistryEntry {
    pub name: &'static str,
    pub candidates: &'static [Candidate],
}

impl RegistryEntry {
    pub fn candidates_of(&self, format: ArtifactFormat) -> impl Iterator<Item = &'static Candidate> {
        self.candidates.iter().filter(move |c| c.format == format)
    }

    pub fn file_names(&self) -> Vec<String> {
        self.candidates.iter().map(|c| c.file.to_string()).collect()
    }
}

pub static MODEL_REGISTRY: &[RegistryEntry] = &[
    RegistryEntry {
        name: "engine",
        candidates: &[
            Candidate::trusted("engine.model.json"),
            Candidate::generic("best_model_fd001.onnx"),
        ],
    },
    RegistryEntry {
        name: "scaler_engine",
        candidates: &[
            Candidate::trusted("scaler_engine.model.json"),
            Candidate::generic("scaler_fd001.onnx"),
        ],
    },
    RegistryEntry {
        name: "hydraulics",
        candidates: &[
            Candidate::trusted("hydraulics.model.json"),
            Candidate::generic("agg_best_model.onnx"),
        ],
    },
    RegistryEntry {
        name: "landing_gear",
        candidates: &[
            Candidate::trusted("landing_gear.model.json"),
            Candidate::trusted("best_rul_model_top3.model.json"),
            Candidate::generic("best_rul_model_top3.onnx"),
        ],
    },
];

pub fn lookup(name: &str) -> Option<&'static RegistryEntry> {
    MODEL_REGISTRY.iter().find(|entry| entry.name == name)
}
