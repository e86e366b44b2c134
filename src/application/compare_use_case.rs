// ============================================================
// Layer 2 — Comparison Harness
// ============================================================
// Trains and evaluates several model variants under IDENTICAL
// conditions and ranks them:
//
//   one SampleStore ─► one SplitSet ─┬─► model A: train → evaluate
//                                    ├─► model B: train → evaluate
//                                    └─► model C: train → evaluate
//                                              │
//                                              ▼
//                                    ComparisonReport
//                                      ranked  (test acc desc,
//                                               fewer params first
//                                               on a tie)
//                                      failed  (identity + reason)
//
// Runs are sequential, in the caller's order. Each run owns its
// own checkpoint, CSV and history file, keyed by the file-safe
// identity. Two identities with the same key ("net.a", "net_a")
// cannot both run; the later one is recorded as failed.
//
// A model that cannot be built, crashes during training,
// cannot be evaluated or is cut short by the stop signal is
// recorded as a FailedRun and the harness moves on. One broken architecture never costs the results of
// the others.

use anyhow::{bail, Result};
use std::{collections::HashMap, path::PathBuf};
use serde::{Deserialize, Serialize};

use crate::application::config::{RunConfig, SplitConfig, TrainConfig};
use crate::application::split_use_case::{DataOptions, SplitUseCase};
use crate::data::{splitter::StratifiedSplitter, store::SampleStore};
use crate::domain::split::SplitSet;
use crate::domain::traits::{ModelFactory, ModelShape};
use crate::infra::{
    artifacts::{evaluation_file, write_json, COMPARISON_FILE, CONFIG_FILE},
    checkpoint::{file_safe, CheckpointManager},
    metrics::save_history,
};
use crate::ml::{
    evaluator::{EvaluationReport, Evaluator},
    registry::BurnModelFactory,
    trainer::{StopReason, StopSignal, TrainOutcome, TrainingLoop},
};

/// Sub-directory of the output directory holding checkpoints.
pub const CHECKPOINT_DIR: &str = "checkpoints";

// ─── Report types ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub identity:        String,
    pub best_val_metric: f64,
    pub best_epoch:      Option<usize>,
    pub test_metric:     f64,
    pub parameter_count: usize,
    pub epochs_trained:  usize,
    pub stop_reason:     StopReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedRun {
    pub identity: String,
    pub reason:   String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    /// Best first
    pub ranked:          Vec<ComparisonResult>,
    pub failed:          Vec<FailedRun>,
    pub skipped_records: usize,
}

impl ComparisonReport {
    pub fn winner(&self) -> Option<&ComparisonResult> {
        self.ranked.first()
    }
}

/// Everything one successful run produced.
#[derive(Debug, Clone)]
pub struct ModelRun {
    pub result:     ComparisonResult,
    pub outcome:    TrainOutcome,
    pub evaluation: EvaluationReport,
}

/// Sort best first: higher test accuracy, then fewer parameters.
pub fn rank(results: &mut [ComparisonResult]) {
    results.sort_by(|a, b| {
        b.test_metric
            .total_cmp(&a.test_metric)
            .then(a.parameter_count.cmp(&b.parameter_count))
    });
}

// ─── ComparisonHarness ────────────────────────────────────────────────────────
pub struct ComparisonHarness<'a> {
    factory: &'a dyn ModelFactory,
    train:   &'a TrainConfig,
    out_dir: PathBuf,
    stop:    StopSignal,
}

impl<'a> ComparisonHarness<'a> {
    pub fn new(factory: &'a dyn ModelFactory, train: &'a TrainConfig, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            factory,
            train,
            out_dir: out_dir.into(),
            stop: StopSignal::new(),
        }
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Split `store` once with `split` and compare every identity on it.
    pub fn compare(
        &self,
        identities: &[String],
        store:      &SampleStore,
        split:      &SplitConfig,
    ) -> Result<ComparisonReport> {
        let splits = StratifiedSplitter::new(split.ratios, split.seed).split(store)?;
        self.compare_on(identities, store, &splits)
    }

    /// Compare every identity on an already fixed partition.
    pub fn compare_on(
        &self,
        identities: &[String],
        store:      &SampleStore,
        splits:     &SplitSet,
    ) -> Result<ComparisonReport> {
        self.train.validate()?;

        let mut ranked = Vec::new();
        let mut failed = Vec::new();
        // Artifact file key → identity that claimed it first
        let mut claimed: HashMap<String, &str> = HashMap::new();

        for identity in identities {
            if let Some(first) = claimed.get(&file_safe(identity)) {
                let reason = if *first == identity.as_str() {
                    "duplicate identity in comparison".to_string()
                } else {
                    format!("artifact names collide with '{first}'")
                };
                tracing::warn!("Skipping model '{}': {}", identity, reason);
                failed.push(FailedRun { identity: identity.clone(), reason });
                continue;
            }
            claimed.insert(file_safe(identity), identity.as_str());
            if self.stop.is_raised() {
                failed.push(FailedRun {
                    identity: identity.clone(),
                    reason:   "not run: comparison cancelled".to_string(),
                });
                continue;
            }

            match self.run_one(identity, store, splits) {
                // A partially trained model is not comparable with finished ones
                Ok(run) if run.result.stop_reason == StopReason::Cancelled => {
                    tracing::warn!("Model '{}' was cancelled, leaving it out of the ranking", identity);
                    failed.push(FailedRun {
                        identity: identity.clone(),
                        reason:   format!(
                            "cancelled after {} epochs (best val_acc {:.2}%)",
                            run.result.epochs_trained,
                            run.result.best_val_metric * 100.0
                        ),
                    });
                }
                Ok(run) => ranked.push(run.result),
                Err(e) => {
                    tracing::warn!("Model '{}' failed: {:#}", identity, e);
                    failed.push(FailedRun { identity: identity.clone(), reason: format!("{e:#}") });
                }
            }
        }

        rank(&mut ranked);
        let report = ComparisonReport { ranked, failed, skipped_records: store.skipped() };
        write_json(&self.out_dir, COMPARISON_FILE, &report)?;
        Ok(report)
    }

    /// Build, train and evaluate one model, writing its history and
    /// evaluation report.
    pub fn run_one(&self, identity: &str, store: &SampleStore, splits: &SplitSet) -> Result<ModelRun> {
        let shape = ModelShape {
            feature_dim: store.feature_dim(),
            num_classes: store.classes().len(),
            modality:    store.modality(),
        };
        let mut model = self.factory.build(identity, shape)?;

        let checkpoints = CheckpointManager::new(self.out_dir.join(CHECKPOINT_DIR))?;
        let outcome = TrainingLoop::new(self.train, &checkpoints)
            .with_metrics_dir(&self.out_dir)
            .with_stop_signal(self.stop.clone())
            .train(model.as_mut(), store, &splits.train, &splits.val)?;
        save_history(&self.out_dir, identity, outcome.history())?;
        if outcome.stop_reason == StopReason::Cancelled && outcome.state.best_epoch.is_none() {
            bail!("'{identity}' was cancelled before any checkpoint was saved");
        }

        let evaluation = Evaluator::new(&checkpoints, self.train.batch_size)
            .evaluate(model.as_mut(), store, &splits.test)?;
        write_json(&self.out_dir, &evaluation_file(identity), &evaluation)?;

        let result = ComparisonResult {
            identity:        identity.to_string(),
            best_val_metric: outcome.best_metric(),
            best_epoch:      outcome.state.best_epoch,
            test_metric:     evaluation.aggregate_accuracy,
            parameter_count: outcome.parameter_count,
            epochs_trained:  outcome.state.epoch,
            stop_reason:     outcome.stop_reason,
        };
        Ok(ModelRun { result, outcome, evaluation })
    }
}

// ─── CompareUseCase ───────────────────────────────────────────────────────────
/// `compare` command: split once, then run the harness with burn models.
pub struct CompareUseCase {
    data:       DataOptions,
    config:     RunConfig,
    out_dir:    PathBuf,
    identities: Vec<String>,
    stop:       StopSignal,
}

impl CompareUseCase {
    pub fn new(data: DataOptions, config: RunConfig, out_dir: impl Into<PathBuf>, identities: Vec<String>) -> Self {
        Self { data, config, out_dir: out_dir.into(), identities, stop: StopSignal::new() }
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn execute(&self) -> Result<ComparisonReport> {
        self.execute_with(&BurnModelFactory::new(self.config.model.clone()))
    }

    pub fn execute_with(&self, factory: &dyn ModelFactory) -> Result<ComparisonReport> {
        self.config.validate()?;
        let prepared = SplitUseCase::new(self.data.clone(), self.config.split, &self.out_dir).execute()?;
        self.config.save(&self.out_dir.join(CONFIG_FILE))?;

        tracing::info!("Comparing {} models: {}", self.identities.len(), self.identities.join(", "));
        ComparisonHarness::new(factory, &self.config.train, &self.out_dir)
            .with_stop_signal(self.stop.clone())
            .compare_on(&self.identities, &prepared.store, &prepared.splits)
    }
}
