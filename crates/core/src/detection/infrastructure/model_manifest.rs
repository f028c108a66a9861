//! Model directory layout.
//!
//! A model base holds `manifest.json` plus the weight shards it lists:
//!
//! ```json
//! {
//!   "models": {
//!     "tiny_face_detector": { "shards": ["tiny_face_detector.onnx"], "input_size": 416 },
//!     "face_landmark_68": { "shards": ["face_landmark_68-shard1", "face_landmark_68-shard2"] }
//!   }
//! }
//! ```
//!
//! Shards of one sub-model are concatenated in order into a single ONNX
//! model, so large weights can be split for hosting.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::MODEL_MANIFEST_NAME;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("manifest does not list required model {0}")]
    MissingModel(&'static str),
    #[error("model {0} lists no weight shards")]
    EmptyShards(String),
    #[error("shard {path} of model {model} not found")]
    MissingShard { model: String, path: PathBuf },
}

/// The five networks of the analysis pipeline, in load order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubModel {
    TinyFaceDetector,
    FaceLandmark68,
    FaceRecognition,
    FaceExpression,
    AgeGender,
}

impl SubModel {
    pub const ALL: [SubModel; 5] = [
        SubModel::TinyFaceDetector,
        SubModel::FaceLandmark68,
        SubModel::FaceRecognition,
        SubModel::FaceExpression,
        SubModel::AgeGender,
    ];

    /// Key used in `manifest.json`.
    pub fn key(self) -> &'static str {
        match self {
            SubModel::TinyFaceDetector => "tiny_face_detector",
            SubModel::FaceLandmark68 => "face_landmark_68",
            SubModel::FaceRecognition => "face_recognition",
            SubModel::FaceExpression => "face_expression",
            SubModel::AgeGender => "age_gender",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            SubModel::TinyFaceDetector => "Tiny Face Detector",
            SubModel::FaceLandmark68 => "Face Landmark 68",
            SubModel::FaceRecognition => "Face Recognition",
            SubModel::FaceExpression => "Face Expression",
            SubModel::AgeGender => "Age Gender",
        }
    }

    /// Without a detector there is nothing to attach attributes to.
    pub fn is_required(self) -> bool {
        matches!(self, SubModel::TinyFaceDetector)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub shards: Vec<String>,
    /// Square input resolution, when the graph has dynamic dimensions.
    #[serde(default)]
    pub input_size: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    #[serde(default)]
    pub models: BTreeMap<String, ModelEntry>,
}

impl ModelManifest {
    /// Reads and validates `manifest.json` inside `dir`.
    pub fn load(dir: &Path) -> Result<Self, ManifestError> {
        let path = dir.join(MODEL_MANIFEST_NAME);
        let text = fs::read_to_string(&path).map_err(|source| ManifestError::Read {
            path: path.clone(),
            source,
        })?;
        let manifest = Self::parse(&text).map_err(|source| ManifestError::Parse { path, source })?;
        manifest.validate(dir)?;
        Ok(manifest)
    }

    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn entry(&self, model: SubModel) -> Option<&ModelEntry> {
        self.models.get(model.key())
    }

    /// Checks that required models are listed and that every listed shard
    /// exists under `dir`.
    pub fn validate(&self, dir: &Path) -> Result<(), ManifestError> {
        for model in SubModel::ALL {
            match self.entry(model) {
                None if model.is_required() => return Err(ManifestError::MissingModel(model.key())),
                None => {}
                Some(entry) => {
                    if entry.shards.is_empty() {
                        return Err(ManifestError::EmptyShards(model.key().to_string()));
                    }
                    for shard in &entry.shards {
                        let path = dir.join(shard);
                        if !path.is_file() {
                            return Err(ManifestError::MissingShard {
                                model: model.key().to_string(),
                                path,
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Every shard path listed for any known sub-model.
    pub fn shard_paths(&self) -> impl Iterator<Item = &str> {
        SubModel::ALL
            .into_iter()
            .filter_map(|m| self.entry(m))
            .flat_map(|e| e.shards.iter().map(String::as_str))
    }

    /// Concatenates the shards of `model` into one buffer. `Ok(None)` when
    /// the manifest does not list the model.
    pub fn assemble(&self, dir: &Path, model: SubModel) -> Result<Option<Vec<u8>>, ManifestError> {
        let Some(entry) = self.entry(model) else {
            return Ok(None);
        };
        let mut bytes = Vec::new();
        for shard in &entry.shards {
            let path = dir.join(shard);
            let chunk = fs::read(&path).map_err(|source| ManifestError::Read { path, source })?;
            bytes.extend_from_slice(&chunk);
        }
        Ok(Some(bytes))
    }
}
