// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Every failure the orchestration core can raise, with the
// context needed to diagnose it (class name, model identity,
// epoch, file path).
//
// Fatal vs recoverable:
//   InsufficientSamples  → fatal, raised before any training
//   CorruptSample        → recovered by the loader (skip + count)
//   CheckpointNotFound   → fatal for one evaluation call only
//   ModelRuntime         → fatal for one model run; the comparison
//                          harness turns it into a "failed" entry
//
// Reference: thiserror crate documentation
//            Rust Book §9 (Recoverable Errors with Result)

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrainError {
    #[error("class '{class}' has {count} samples, at least 3 are needed to stratify")]
    InsufficientSamples { class: String, count: usize },

    #[error("split ratios train={train} val={val} test={test} must be positive and sum to 1.0")]
    InvalidRatios { train: f64, val: f64, test: f64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("corrupt sample '{}': {reason}", path.display())]
    CorruptSample { path: PathBuf, reason: String },

    #[error("no checkpoint for model '{model}' (training never improved past initialisation)")]
    CheckpointNotFound { model: String },

    #[error("checkpoint for model '{model}' is unusable: {message}")]
    Checkpoint { model: String, message: String },

    #[error("model '{model}' failed at epoch {epoch}: {message}")]
    ModelRuntime { model: String, epoch: usize, message: String },

    #[error("dataset contains no usable samples")]
    EmptyDataset,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TrainError {
    /// Wrap a failure reported by a Model implementation.
    pub fn model_runtime(model: &str, epoch: usize, err: anyhow::Error) -> Self {
        Self::ModelRuntime {
            model:   model.to_string(),
            epoch,
            message: format!("{err:#}"),
        }
    }
}
