// ============================================================
// Layer 2 — Run Configuration
// ============================================================
// All knobs for a split / train / compare run, grouped the way
// the pipeline consumes them:
//
//   SplitConfig  → StratifiedSplitter (ratios + seed)
//   TrainConfig  → SequenceBatcher + TrainingLoop
//   ModelConfig  → hyperparameters of the burn architectures
//
// Every struct is serde-serialisable so a run's effective
// configuration can be saved next to its artifacts and a JSON
// file can be passed with --config instead of many flags.
//
// Defaults follow the reference training scripts:
//   70/15/15 split, seed 42, batch 32, 100 epochs, patience 15,
//   Adam lr 1e-3 halved after 5 stagnant epochs.

use anyhow::{Context, Result};
use std::{fs, path::Path};
use serde::{Deserialize, Serialize};

use crate::domain::error::TrainError;
use crate::domain::sample::Modality;
use crate::domain::split::SplitRatios;

// ─── SplitConfig ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub ratios: SplitRatios,
    pub seed:   u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self { ratios: SplitRatios::default(), seed: 42 }
    }
}

// ─── TrainConfig ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub batch_size:      usize,
    /// Reshuffle the training split every epoch
    pub shuffle:         bool,
    pub max_epochs:      usize,
    /// Epochs without val_acc improvement before stopping
    pub patience:        usize,
    pub lr:              f64,
    /// Multiplier applied when val_acc plateaus
    pub lr_decay_factor: f64,
    /// Stagnant epochs tolerated before the rate is reduced
    pub lr_patience:     usize,
    /// The rate never drops below this
    pub min_lr:          f64,
    /// Stop as soon as val_acc reaches this value
    pub target_accuracy: Option<f64>,
    /// Seed for the per-epoch shuffle
    pub seed:            u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            batch_size:      32,
            shuffle:         true,
            max_epochs:      100,
            patience:        15,
            lr:              1e-3,
            lr_decay_factor: 0.5,
            lr_patience:     5,
            min_lr:          1e-6,
            target_accuracy: None,
            seed:            42,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<(), TrainError> {
        let invalid = |msg: &str| Err(TrainError::InvalidConfig(msg.to_string()));

        if self.batch_size == 0 {
            return invalid("batch_size must be at least 1");
        }
        if self.max_epochs == 0 {
            return invalid("max_epochs must be at least 1");
        }
        if self.patience == 0 {
            return invalid("patience must be at least 1");
        }
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return invalid("lr must be a positive number");
        }
        if !(self.lr_decay_factor > 0.0 && self.lr_decay_factor <= 1.0) {
            return invalid("lr_decay_factor must be in (0, 1]");
        }
        if !(self.min_lr.is_finite() && self.min_lr >= 0.0 && self.min_lr <= self.lr) {
            return invalid("min_lr must be between 0 and lr");
        }
        if let Some(t) = self.target_accuracy {
            if !(t > 0.0 && t <= 1.0) {
                return invalid("target_accuracy must be in (0, 1]");
            }
        }
        Ok(())
    }
}

// ─── ModelConfig ──────────────────────────────────────────────────────────────
// Architecture hyperparameters. The orchestration core never
// reads these; only the model registry does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub mlp_hidden:         Vec<usize>,
    pub dropout:            f64,
    pub gru_hidden:         usize,
    pub gru_layers:         usize,
    pub transformer_d_model: usize,
    pub transformer_heads:  usize,
    pub transformer_layers: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            mlp_hidden:          vec![256, 128, 64],
            dropout:             0.3,
            gru_hidden:          128,
            gru_layers:          2,
            transformer_d_model: 128,
            transformer_heads:   4,
            transformer_layers:  2,
        }
    }
}

// ─── RunConfig ────────────────────────────────────────────────────────────────
/// Everything a run needs, as saved to / loaded from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RunConfig {
    pub modality: Option<Modality>,
    pub split:    SplitConfig,
    pub train:    TrainConfig,
    pub model:    ModelConfig,
}

impl RunConfig {
    /// Load from a JSON file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Invalid config file '{}'", path.display()))
    }

    /// Save with indentation for readability.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved run config to '{}'", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<(), TrainError> {
        self.split.ratios.validate()?;
        self.train.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        assert!(RunConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_train_values() {
        let mut cfg = TrainConfig::default();
        cfg.patience = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = TrainConfig::default();
        cfg.lr_decay_factor = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = TrainConfig::default();
        cfg.min_lr = 1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("run.json");
        fs::write(&path, r#"{ "train": { "patience": 4 }, "split": { "seed": 7 } }"#).unwrap();

        let cfg = RunConfig::load(&path).unwrap();
        assert_eq!(cfg.train.patience, 4);
        assert_eq!(cfg.train.batch_size, 32);
        assert_eq!(cfg.split.seed, 7);
        assert_eq!(cfg.split.ratios, SplitRatios::default());
    }

    #[test]
    fn test_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("run.json");
        let mut cfg = RunConfig::default();
        cfg.modality = Some(Modality::Sequence);
        cfg.train.target_accuracy = Some(0.99);
        cfg.save(&path).unwrap();
        assert_eq!(RunConfig::load(&path).unwrap(), cfg);
    }
}
