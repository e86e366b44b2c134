// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Persists the best-so-far snapshot of each model identity.
//
// Exactly ONE live file per identity:
//   checkpoints/
//     best_model_mlp.ckpt
//     best_model_gru.ckpt
//     best_model_transformer.ckpt
//
// A new best overwrites the previous file; nothing is appended.
//
// File layout:
//   line 1   JSON header {model_identity, epoch, val_metric, state_len}
//   rest     `state_len` raw bytes of model state (opaque to us,
//            produced by Model::state)
//
// Writes go to `<name>.ckpt.tmp` first and are then renamed over
// the live file. rename() is atomic on the same filesystem, so an
// interrupted run leaves either the old checkpoint or the new
// one, never a half-written file.
//
// Reference: Rust Book §9 (Error Handling)
//            std::fs::rename documentation

use anyhow::Context;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

use crate::domain::error::TrainError;

/// Snapshot tied to the best validation accuracy of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    pub model_identity: String,
    /// 1-based epoch the snapshot was taken after
    pub epoch:          usize,
    pub val_metric:     f64,
    pub state:          Vec<u8>,
}

#[derive(Serialize, Deserialize)]
struct Header {
    model_identity: String,
    epoch:          usize,
    val_metric:     f64,
    state_len:      usize,
}

/// Manages saving and loading of best-model checkpoints.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create the manager, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Live checkpoint path for an identity.
    pub fn path_for(&self, identity: &str) -> PathBuf {
        self.dir.join(format!("best_model_{}.ckpt", file_safe(identity)))
    }

    pub fn exists(&self, identity: &str) -> bool {
        self.path_for(identity).is_file()
    }

    /// Atomically replace the identity's checkpoint.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), TrainError> {
        let path = self.path_for(&checkpoint.model_identity);
        let tmp  = path.with_extension("ckpt.tmp");

        let header = Header {
            model_identity: checkpoint.model_identity.clone(),
            epoch:          checkpoint.epoch,
            val_metric:     checkpoint.val_metric,
            state_len:      checkpoint.state.len(),
        };

        {
            let mut f = fs::File::create(&tmp)?;
            serde_json::to_writer(&mut f, &header)?;
            f.write_all(b"\n")?;
            f.write_all(&checkpoint.state)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &path)?;

        tracing::debug!(
            "Saved checkpoint '{}' (epoch {}, val_acc={:.4})",
            path.display(),
            checkpoint.epoch,
            checkpoint.val_metric,
        );
        Ok(())
    }

    /// Load the identity's checkpoint.
    ///
    /// # Errors
    /// `CheckpointNotFound` if no checkpoint was ever written,
    /// `Checkpoint` if the file is truncated or belongs to another model.
    pub fn load(&self, identity: &str) -> Result<Checkpoint, TrainError> {
        let path = self.path_for(identity);
        if !path.is_file() {
            return Err(TrainError::CheckpointNotFound { model: identity.to_string() });
        }

        let bytes = fs::read(&path)?;
        let unusable = |message: &str| TrainError::Checkpoint {
            model:   identity.to_string(),
            message: message.to_string(),
        };

        let newline = bytes
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| unusable("missing header"))?;
        let header: Header = serde_json::from_slice(&bytes[..newline])
            .map_err(|_| unusable("unreadable header"))?;

        if header.model_identity != identity {
            return Err(unusable("checkpoint belongs to a different model"));
        }
        let state = &bytes[newline + 1..];
        if state.len() != header.state_len {
            return Err(unusable("state is truncated"));
        }

        Ok(Checkpoint {
            model_identity: header.model_identity,
            epoch:          header.epoch,
            val_metric:     header.val_metric,
            state:          state.to_vec(),
        })
    }

    /// Delete a stale checkpoint left by an earlier run.
    pub fn clear(&self, identity: &str) -> Result<(), TrainError> {
        let path = self.path_for(identity);
        if path.exists() {
            fs::remove_file(&path)?;
            tracing::debug!("Removed stale checkpoint '{}'", path.display());
        }
        Ok(())
    }
}

/// Identity reduced to characters safe in a file name.
pub fn file_safe(identity: &str) -> String {
    identity
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
