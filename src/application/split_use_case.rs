// ============================================================
// Layer 2 — SplitUseCase
// ============================================================
// Loads the landmark corpus and fixes its partition:
//
//   Step 1: Load records from the data directory   (Layer 4 - data)
//   Step 2: Build the SampleStore + ClassIndex     (Layer 4 - data)
//   Step 3: Stratified train/val/test split        (Layer 4 - data)
//   Step 4: Write metadata.json                    (Layer 6 - infra)
//
// `train` and `compare` run the same steps first, so every
// model in a comparison sees exactly the partition recorded in
// metadata.json.

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::application::config::SplitConfig;
use crate::data::{
    loader::{JsonSampleLoader, STANDARD_CLASSES},
    splitter::StratifiedSplitter,
    store::SampleStore,
};
use crate::domain::sample::Modality;
use crate::domain::split::{SplitName, SplitSet};
use crate::domain::traits::SampleSource;
use crate::infra::artifacts::SplitMetadata;

/// Where the corpus lives and how to read it.
#[derive(Debug, Clone)]
pub struct DataOptions {
    pub data_dir:         PathBuf,
    pub modality:         Modality,
    /// Keep only a–z and zero–nine
    pub standard_classes: bool,
}

/// A loaded store with its fixed partition.
#[derive(Debug)]
pub struct PreparedData {
    pub store:         SampleStore,
    pub splits:        SplitSet,
    pub metadata:      SplitMetadata,
    pub metadata_path: PathBuf,
}

pub struct SplitUseCase {
    data:    DataOptions,
    split:   SplitConfig,
    out_dir: PathBuf,
}

impl SplitUseCase {
    pub fn new(data: DataOptions, split: SplitConfig, out_dir: impl Into<PathBuf>) -> Self {
        Self { data, split, out_dir: out_dir.into() }
    }

    pub fn execute(&self) -> Result<PreparedData> {
        // ── Step 1: Load records ──────────────────────────────────────────────
        let mut loader = JsonSampleLoader::new(&self.data.data_dir);
        if self.data.standard_classes {
            loader = loader.with_classes(STANDARD_CLASSES);
        }
        let report = loader.load_all(self.data.modality)?;

        // ── Step 2: Build the store ───────────────────────────────────────────
        let store = SampleStore::from_report(report).with_context(|| {
            format!("Cannot build a sample store from '{}'", self.data.data_dir.display())
        })?;
        tracing::info!(
            "Store: {} samples, {} classes, {} features ({} modality)",
            store.len(),
            store.classes().len(),
            store.feature_dim(),
            store.modality(),
        );

        // ── Step 3: Stratified split ──────────────────────────────────────────
        self.split.ratios.validate()?;
        let splits = StratifiedSplitter::new(self.split.ratios, self.split.seed).split(&store)?;
        for name in SplitName::ALL {
            let split = splits.get(name);
            tracing::info!(
                "{:<5} {:>6} samples ({:.1}%)",
                name.as_str(),
                split.len(),
                100.0 * split.len() as f64 / store.len() as f64
            );
        }

        // ── Step 4: Persist the partition ─────────────────────────────────────
        let metadata = SplitMetadata::describe(&store, &splits, self.split.ratios, self.split.seed);
        let metadata_path = metadata.save(&self.out_dir)?;
        tracing::info!("Split metadata written to '{}'", metadata_path.display());

        Ok(PreparedData { store, splits, metadata, metadata_path })
    }
}
