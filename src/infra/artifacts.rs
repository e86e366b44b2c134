// ============================================================
// Layer 6 — Run Artifacts
// ============================================================
// JSON files written next to the checkpoints so a run can be
// inspected and reproduced without the raw data:
//
//   metadata.json             class ↔ index mapping, input shape,
//                             ratios + seed, per-split counts and
//                             the ids of every sample in each split
//   train_config.json         effective RunConfig (see config.rs)
//   evaluation_<identity>.json EvaluationReport of one model
//   comparison.json           ranked ComparisonReport
//
// Example metadata.json (abridged):
//   {
//     "label_to_idx": { "a": 0, "b": 1 },
//     "num_classes": 2,
//     "num_features": 63,
//     "modality": "flat",
//     "splits": { "train": { "samples": 84, "per_class": {..}, "ids": [..] }, .. }
//   }
//
// Reference: serde_json documentation (to_string_pretty)

use anyhow::{Context, Result};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

use crate::data::store::SampleStore;
use crate::domain::sample::Modality;
use crate::domain::split::{SplitName, SplitRatios, SplitSet};
use crate::infra::checkpoint::file_safe;

pub const METADATA_FILE:   &str = "metadata.json";
pub const CONFIG_FILE:     &str = "train_config.json";
pub const COMPARISON_FILE: &str = "comparison.json";

/// Per-split counts and membership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSummary {
    pub samples:   usize,
    pub per_class: BTreeMap<String, usize>,
    pub ids:       Vec<String>,
}

/// Everything needed to interpret a trained model's outputs and
/// to check that a later run saw the same partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitMetadata {
    pub label_to_idx:    BTreeMap<String, usize>,
    pub idx_to_label:    BTreeMap<usize, String>,
    pub num_classes:     usize,
    pub num_features:    usize,
    pub modality:        Modality,
    pub ratios:          SplitRatios,
    pub seed:            u64,
    pub total_samples:   usize,
    pub skipped_records: usize,
    pub splits:          BTreeMap<SplitName, SplitSummary>,
}

impl SplitMetadata {
    pub fn describe(store: &SampleStore, splits: &SplitSet, ratios: SplitRatios, seed: u64) -> Self {
        let classes = store.classes();
        let splits = SplitName::ALL
            .into_iter()
            .map(|name| {
                let split = splits.get(name);
                let ids = split
                    .indices
                    .iter()
                    .filter_map(|&i| store.get(i).map(|s| s.id.clone()))
                    .collect();
                let summary = SplitSummary {
                    samples:   split.len(),
                    per_class: store.class_counts(&split.indices),
                    ids,
                };
                (name, summary)
            })
            .collect();

        Self {
            label_to_idx:    classes.label_to_index().clone(),
            idx_to_label:    classes.names().iter().cloned().enumerate().collect(),
            num_classes:     classes.len(),
            num_features:    store.feature_dim(),
            modality:        store.modality(),
            ratios,
            seed,
            total_samples:   store.len(),
            skipped_records: store.skipped(),
            splits,
        }
    }

    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        write_json(dir, METADATA_FILE, self)
    }

    #[cfg(test)]
    pub fn load(dir: &Path) -> Result<Self> {
        read_json(&dir.join(METADATA_FILE))
    }
}

/// `evaluation_<identity>.json`
pub fn evaluation_file(identity: &str) -> String {
    format!("evaluation_{}.json", file_safe(identity))
}

/// Pretty-print `value` to `dir/file_name`, creating `dir` if needed.
pub fn write_json<T: Serialize + ?Sized>(dir: &Path, file_name: &str, value: &T) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Cannot create output directory '{}'", dir.display()))?;
    let path = dir.join(file_name);
    let json = serde_json::to_string_pretty(value)?;
    fs::write(&path, json)
        .with_context(|| format!("Cannot write '{}'", path.display()))?;
    tracing::debug!("Wrote '{}'", path.display());
    Ok(path)
}

#[cfg(test)]
pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Invalid JSON in '{}'", path.display()))
}
