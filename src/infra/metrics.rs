// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records per-epoch training metrics for one model identity.
//
// Two outputs per run:
//   metrics_<identity>.csv   one row per epoch, appended as the
//                            run progresses (survives a crash)
//   history_<identity>.json  the complete ordered history,
//                            written once the run has stopped
//
// Example CSV output:
//   epoch,train_loss,train_acc,val_loss,val_acc,lr
//   1,3.124500,0.081000,3.089200,0.094000,0.001000
//   2,2.890100,0.204000,2.854300,0.231000,0.001000
//
// How to read the metrics:
//   - train_loss should fall every epoch
//   - val_loss rising while train_loss falls → overfitting
//   - lr drops by the decay factor when val_acc plateaus
//
// Accuracies are fractions in [0, 1].
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

use crate::infra::checkpoint::file_safe;

/// One row of metrics for a single epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    /// The epoch number (starts at 1)
    pub epoch: usize,

    /// Size-weighted mean cross-entropy over all training samples
    pub train_loss: f64,

    /// Fraction of training samples predicted correctly
    pub train_acc: f64,

    /// Size-weighted mean cross-entropy on the validation split
    pub val_loss: f64,

    /// Fraction of validation samples predicted correctly.
    /// Early stopping and checkpoint selection use this value.
    pub val_acc: f64,

    /// Learning rate used during this epoch
    pub lr: f64,
}

impl EpochRecord {
    /// Returns true if this epoch strictly beats `best_val_acc`
    pub fn is_improvement(&self, best_val_acc: f64) -> bool {
        self.val_acc > best_val_acc
    }
}

/// Appends epoch rows to a per-identity CSV file.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Start a fresh CSV for `identity`, replacing any earlier run's log.
    pub fn create(dir: &Path, identity: &str) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let csv_path = dir.join(format!("metrics_{}.csv", file_safe(identity)));

        let mut f = fs::File::create(&csv_path)
            .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
        writeln!(f, "epoch,train_loss,train_acc,val_loss,val_acc,lr")?;
        tracing::debug!("Created metrics CSV: '{}'", csv_path.display());

        Ok(Self { csv_path })
    }

    /// Append one epoch's metrics as a new row.
    pub fn log(&self, m: &EpochRecord) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6},{:.6}",
            m.epoch,
            m.train_loss,
            m.train_acc,
            m.val_loss,
            m.val_acc,
            m.lr,
        )?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

/// Write the full ordered history for `identity` as JSON.
pub fn save_history(dir: &Path, identity: &str, history: &[EpochRecord]) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("history_{}.json", file_safe(identity)));
    let json = serde_json::to_string_pretty(history)?;
    fs::write(&path, json)
        .with_context(|| format!("Cannot write history to '{}'", path.display()))?;
    Ok(path)
}

/// Read a history written by `save_history`.
#[cfg(test)]
pub fn load_history(path: &Path) -> Result<Vec<EpochRecord>> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read history from '{}'", path.display()))?;
    Ok(serde_json::from_str(&json)?)
}
