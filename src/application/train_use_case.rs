// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates one model's full pipeline in order:
//
//   Step 1: Validate the run configuration
//   Step 2: Load + split the corpus        (SplitUseCase)
//   Step 3: Save train_config.json         (Layer 6 - infra)
//   Step 4: Train with early stopping      (Layer 5 - ml)
//   Step 5: Evaluate the best checkpoint   (Layer 5 - ml)
//           on the test split
//
// Unlike `compare`, a failure here is an error for the caller,
// not a "failed" table entry.
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::Result;
use std::path::PathBuf;

use crate::application::compare_use_case::{ComparisonHarness, ModelRun};
use crate::application::config::RunConfig;
use crate::application::split_use_case::{DataOptions, SplitUseCase};
use crate::domain::traits::ModelFactory;
use crate::infra::artifacts::CONFIG_FILE;
use crate::ml::registry::BurnModelFactory;
use crate::ml::trainer::StopSignal;

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    data:     DataOptions,
    config:   RunConfig,
    out_dir:  PathBuf,
    identity: String,
    stop:     StopSignal,
}

impl TrainUseCase {
    pub fn new(data: DataOptions, config: RunConfig, out_dir: impl Into<PathBuf>, identity: impl Into<String>) -> Self {
        Self {
            data,
            config,
            out_dir: out_dir.into(),
            identity: identity.into(),
            stop: StopSignal::new(),
        }
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Run the pipeline with the burn model registry.
    pub fn execute(&self) -> Result<ModelRun> {
        self.execute_with(&BurnModelFactory::new(self.config.model.clone()))
    }

    pub fn execute_with(&self, factory: &dyn ModelFactory) -> Result<ModelRun> {
        // ── Step 1: Validate ──────────────────────────────────────────────────
        self.config.validate()?;

        // ── Step 2: Load + split ──────────────────────────────────────────────
        let prepared = SplitUseCase::new(self.data.clone(), self.config.split, &self.out_dir).execute()?;

        // ── Step 3: Save config for reproducibility ──────────────────────────
        self.config.save(&self.out_dir.join(CONFIG_FILE))?;

        // ── Steps 4 + 5: Train, then evaluate on test ─────────────────────────
        let run = ComparisonHarness::new(factory, &self.config.train, &self.out_dir)
            .with_stop_signal(self.stop.clone())
            .run_one(&self.identity, &prepared.store, &prepared.splits)?;

        tracing::info!(
            "'{}' finished: best val_acc={:.2}% (epoch {:?}), test_acc={:.2}%",
            run.result.identity,
            run.result.best_val_metric * 100.0,
            run.result.best_epoch,
            run.result.test_metric * 100.0,
        );
        Ok(run)
    }
}
