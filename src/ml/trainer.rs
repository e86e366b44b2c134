// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Epoch loop with validation, plateau LR decay, early stopping
// and best-checkpoint tracking, for ANY Model implementation.
//
// State machine:
//
//   Running ──► (Improved | Stalled)* ──► Stopped(reason)
//
//   reason = Converged    val_acc reached target_accuracy
//          | EarlyStopped patience epochs without improvement
//          | Exhausted    max_epochs completed
//          | Cancelled    stop signal seen between batches
//
// Per epoch:
//   1. one shuffled pass over train batches:
//        forward(Train) → cross-entropy → backward_and_update
//   2. one pass over val batches with forward(Eval), no updates
//   3. append {train_loss, train_acc, val_loss, val_acc} to history
//   4. plateau scheduler may lower the LR for the next epoch
//   5. val_acc > best (strict):  best = val_acc, counter = 0,
//                                checkpoint overwritten
//      otherwise:                counter += 1, stop at patience
//
// Every loss/accuracy figure is a SIZE-WEIGHTED average over
// samples, never a mean of per-batch means.
//
// The whole mutable state lives in one TrainingState value that
// is threaded through the loop and returned to the caller.
//
// Reference: Prechelt (1998) "Early Stopping — But When?"

use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use serde::{Deserialize, Serialize};

use crate::application::config::TrainConfig;
use crate::data::batcher::{BatchIter, SequenceBatcher};
use crate::data::store::SampleStore;
use crate::domain::error::TrainError;
use crate::domain::split::Split;
use crate::domain::traits::{Mode, Model};
use crate::infra::checkpoint::{Checkpoint, CheckpointManager};
use crate::infra::metrics::{EpochRecord, MetricsLogger};
use crate::ml::loss::{cross_entropy, Tally};
use crate::ml::scheduler::PlateauScheduler;

// ─── StopSignal ───────────────────────────────────────────────────────────────
/// Cloneable flag an outside party raises to interrupt training.
/// Checked between batches, so a checkpoint write is never cut short.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ─── TrainingState ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Converged,
    EarlyStopped,
    Exhausted,
    Cancelled,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Converged    => write!(f, "converged"),
            StopReason::EarlyStopped => write!(f, "early_stopped"),
            StopReason::Exhausted    => write!(f, "exhausted"),
            StopReason::Cancelled    => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingState {
    /// Last completed epoch (0 before the first)
    pub epoch: usize,
    /// Best validation accuracy so far; starts at 0
    pub best_metric: f64,
    /// Epoch that produced `best_metric` and the live checkpoint
    pub best_epoch: Option<usize>,
    pub epochs_without_improvement: usize,
    /// Learning rate for the next epoch
    pub lr: f64,
    pub history: Vec<EpochRecord>,
}

impl TrainingState {
    pub fn new(lr: f64) -> Self {
        Self {
            epoch: 0,
            best_metric: 0.0,
            best_epoch: None,
            epochs_without_improvement: 0,
            lr,
            history: Vec::new(),
        }
    }
}

/// What a finished run hands back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainOutcome {
    pub model_identity:  String,
    pub stop_reason:     StopReason,
    pub parameter_count: usize,
    pub state:           TrainingState,
}

impl TrainOutcome {
    pub fn best_metric(&self) -> f64 {
        self.state.best_metric
    }

    pub fn history(&self) -> &[EpochRecord] {
        &self.state.history
    }
}

// ─── TrainingLoop ─────────────────────────────────────────────────────────────
pub struct TrainingLoop<'a> {
    config:      &'a TrainConfig,
    checkpoints: &'a CheckpointManager,
    metrics_dir: Option<PathBuf>,
    stop:        StopSignal,
}

impl<'a> TrainingLoop<'a> {
    pub fn new(config: &'a TrainConfig, checkpoints: &'a CheckpointManager) -> Self {
        Self {
            config,
            checkpoints,
            metrics_dir: None,
            stop: StopSignal::new(),
        }
    }

    /// Append per-epoch rows to `metrics_<identity>.csv` in `dir`.
    pub fn with_metrics_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.metrics_dir = Some(dir.into());
        self
    }

    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    /// Train `model` on `train`, select on `val`.
    ///
    /// The model is left in its final (last epoch) state; the best
    /// state is in the identity's checkpoint.
    pub fn train(
        &self,
        model: &mut dyn Model,
        store: &SampleStore,
        train: &Split,
        val:   &Split,
    ) -> Result<TrainOutcome, TrainError> {
        let cfg = self.config;
        cfg.validate()?;
        if train.is_empty() || val.is_empty() {
            return Err(TrainError::EmptyDataset);
        }

        let identity = model.identity().to_string();

        // A checkpoint from an earlier run must not masquerade as
        // this run's best
        self.checkpoints.clear(&identity)?;

        let logger = self.metrics_dir.as_ref().and_then(|dir| {
            MetricsLogger::create(dir, &identity)
                .map_err(|e| tracing::warn!("Metrics CSV disabled for '{}': {:#}", identity, e))
                .ok()
        });
        if let Some(logger) = &logger {
            tracing::info!("Logging '{}' epochs to '{}'", identity, logger.csv_path().display());
        }

        let mut batcher   = SequenceBatcher::new(store, cfg.batch_size, cfg.seed);
        let mut scheduler = PlateauScheduler::new(cfg.lr, cfg.lr_decay_factor, cfg.lr_patience, cfg.min_lr);
        let mut state     = TrainingState::new(cfg.lr);

        tracing::info!(
            "Training '{}' ({} parameters): {} train / {} val samples, batch {}, max {} epochs",
            identity,
            model.parameter_count(),
            train.len(),
            val.len(),
            cfg.batch_size,
            cfg.max_epochs,
        );

        let stop_reason = loop {
            let epoch = state.epoch + 1;
            let lr = state.lr;
            let runtime = |e: anyhow::Error| TrainError::model_runtime(&identity, epoch, e);

            // ── Training phase ────────────────────────────────────────────
            let mut train_tally = Tally::default();
            let mut cancelled = false;
            for batch in batcher.batches(train, cfg.shuffle) {
                if self.stop.is_raised() {
                    cancelled = true;
                    break;
                }
                let logits = model.forward(&batch, Mode::Train).map_err(runtime)?;
                let out = cross_entropy(&logits, &batch.labels).map_err(runtime)?;
                model.backward_and_update(&out.grad, lr).map_err(runtime)?;
                train_tally.add(&out, batch.len());
            }
            if cancelled {
                break StopReason::Cancelled;
            }

            // ── Validation phase ──────────────────────────────────────────
            let val_tally = match eval_pass(model, batcher.batches(val, false), &self.stop)
                .map_err(runtime)?
            {
                Some(t) => t,
                None    => break StopReason::Cancelled,
            };

            let record = EpochRecord {
                epoch,
                train_loss: train_tally.mean_loss(),
                train_acc:  train_tally.accuracy(),
                val_loss:   val_tally.mean_loss(),
                val_acc:    val_tally.accuracy(),
                lr,
            };

            println!(
                "[{}] Epoch {:>3}/{} | train_loss={:.4} | train_acc={:.2}% | val_loss={:.4} | val_acc={:.2}%",
                identity, epoch, cfg.max_epochs,
                record.train_loss, record.train_acc * 100.0,
                record.val_loss, record.val_acc * 100.0,
            );
            if let Some(logger) = &logger {
                if let Err(e) = logger.log(&record) {
                    tracing::warn!("Could not log epoch {}: {:#}", epoch, e);
                }
            }

            state.epoch = epoch;
            state.history.push(record.clone());

            // ── LR schedule (independent of early stopping) ───────────────
            scheduler.step(record.val_acc);
            state.lr = scheduler.lr();

            // ── Early stopping + checkpoint ───────────────────────────────
            if record.is_improvement(state.best_metric) {
                state.best_metric = record.val_acc;
                state.best_epoch = Some(epoch);
                state.epochs_without_improvement = 0;

                let snapshot = model.state().map_err(runtime)?;
                self.checkpoints.save(&Checkpoint {
                    model_identity: identity.clone(),
                    epoch,
                    val_metric: record.val_acc,
                    state: snapshot,
                })?;
                tracing::info!(
                    "'{}' improved to val_acc={:.2}% at epoch {}, checkpoint saved",
                    identity, record.val_acc * 100.0, epoch
                );

                if cfg.target_accuracy.is_some_and(|t| record.val_acc >= t) {
                    break StopReason::Converged;
                }
            } else {
                state.epochs_without_improvement += 1;
                if state.epochs_without_improvement >= cfg.patience {
                    break StopReason::EarlyStopped;
                }
            }

            if epoch >= cfg.max_epochs {
                break StopReason::Exhausted;
            }
        };

        tracing::info!(
            "'{}' stopped ({}) after {} epochs, best val_acc={:.2}% at epoch {:?}",
            identity,
            stop_reason,
            state.epoch,
            state.best_metric * 100.0,
            state.best_epoch,
        );

        Ok(TrainOutcome {
            model_identity:  identity,
            stop_reason,
            parameter_count: model.parameter_count(),
            state,
        })
    }
}

/// One gradient-free pass. `None` if the stop signal was raised.
fn eval_pass(
    model:   &mut dyn Model,
    batches: BatchIter<'_>,
    stop:    &StopSignal,
) -> anyhow::Result<Option<Tally>> {
    let mut tally = Tally::default();
    for batch in batches {
        if stop.is_raised() {
            return Ok(None);
        }
        let logits = model.forward(&batch, Mode::Eval)?;
        let out = cross_entropy(&logits, &batch.labels)?;
        tally.add(&out, batch.len());
    }
    Ok(Some(tally))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::split::SplitName;
    use crate::ml::stubs::{flat_store, BrokenModel, ScriptedModel};
    use tempfile::TempDir;

    const VAL_SIZE: usize = 10;

    struct Fixture {
        _tmp:  TempDir,
        store: SampleStore,
        train: Split,
        val:   Split,
        ckpts: CheckpointManager,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let store = flat_store(2, 15);
        let train = Split::new(SplitName::Train, (0..20).collect());
        let val   = Split::new(SplitName::Val, (20..30).collect());
        let ckpts = CheckpointManager::new(tmp.path().join("ckpt")).unwrap();
        Fixture { _tmp: tmp, store, train, val, ckpts }
    }

    fn config(max_epochs: usize, patience: usize) -> TrainConfig {
        TrainConfig {
            batch_size: 4,
            max_epochs,
            patience,
            ..TrainConfig::default()
        }
    }

    fn run(fx: &Fixture, cfg: &TrainConfig, accs: Vec<f64>) -> (TrainOutcome, ScriptedModel) {
        let mut model = ScriptedModel::new("scripted", 2, accs, VAL_SIZE);
        let outcome = TrainingLoop::new(cfg, &fx.ckpts)
            .train(&mut model, &fx.store, &fx.train, &fx.val)
            .unwrap();
        (outcome, model)
    }

    #[test]
    fn test_early_stop_exactly_at_last_improvement_plus_patience() {
        let fx = fixture();
        // Last improvement at epoch 3, patience 4 → stop after epoch 7
        let accs = vec![0.2, 0.4, 0.6, 0.5, 0.6, 0.3, 0.6, 0.9, 0.9];
        let (outcome, _) = run(&fx, &config(50, 4), accs);

        assert_eq!(outcome.stop_reason, StopReason::EarlyStopped);
        assert_eq!(outcome.state.epoch, 7);
        assert_eq!(outcome.history().len(), 7);
        assert_eq!(outcome.state.best_epoch, Some(3));
        assert!((outcome.best_metric() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_checkpoint_matches_max_val_acc_and_earliest_tie() {
        let fx = fixture();
        let accs = vec![0.3, 0.7, 0.5, 0.7, 0.7, 0.6];
        let (outcome, _) = run(&fx, &config(6, 10), accs);

        assert_eq!(outcome.stop_reason, StopReason::Exhausted);
        let max = outcome.history().iter().map(|r| r.val_acc).fold(0.0, f64::max);

        let ckpt = fx.ckpts.load("scripted").unwrap();
        assert!((ckpt.val_metric - max).abs() < 1e-12);
        assert_eq!(ckpt.epoch, 2);
        // ScriptedModel encodes the epoch in its state
        assert_eq!(ckpt.state, vec![2]);
    }

    #[test]
    fn test_exhausted_at_max_epochs() {
        let fx = fixture();
        let accs: Vec<f64> = (1..=5).map(|e| e as f64 / 10.0).collect();
        let (outcome, model) = run(&fx, &config(5, 2), accs);

        assert_eq!(outcome.stop_reason, StopReason::Exhausted);
        assert_eq!(outcome.history().len(), 5);
        assert_eq!(outcome.state.best_epoch, Some(5));
        // 20 train samples in batches of 4 → 5 updates per epoch
        assert_eq!(model.updates, 25);
    }

    #[test]
    fn test_converged_at_target() {
        let fx = fixture();
        let mut cfg = config(20, 5);
        cfg.target_accuracy = Some(0.8);
        let (outcome, _) = run(&fx, &cfg, vec![0.5, 0.8, 0.9]);

        assert_eq!(outcome.stop_reason, StopReason::Converged);
        assert_eq!(outcome.state.epoch, 2);
    }

    #[test]
    fn test_no_improvement_leaves_no_checkpoint() {
        let fx = fixture();
        let (outcome, _) = run(&fx, &config(10, 3), vec![0.0; 10]);

        assert_eq!(outcome.stop_reason, StopReason::EarlyStopped);
        assert_eq!(outcome.state.epoch, 3);
        assert_eq!(outcome.state.best_epoch, None);
        assert!(matches!(
            fx.ckpts.load("scripted"),
            Err(TrainError::CheckpointNotFound { .. })
        ));
    }

    #[test]
    fn test_stale_checkpoint_cleared_at_start() {
        let fx = fixture();
        fx.ckpts
            .save(&Checkpoint {
                model_identity: "scripted".into(),
                epoch: 9,
                val_metric: 1.0,
                state: vec![9],
            })
            .unwrap();

        run(&fx, &config(2, 2), vec![0.0, 0.0]);
        assert!(!fx.ckpts.exists("scripted"));
    }

    #[test]
    fn test_metrics_are_size_weighted() {
        let fx = fixture();
        // 10 val samples in batches of 4, 4, 2; 0.3 → first 3 right
        let (outcome, _) = run(&fx, &config(1, 1), vec![0.3]);
        let rec = &outcome.history()[0];
        assert!((rec.val_acc - 0.3).abs() < 1e-12);
        // Scripted train forward is always right
        assert!((rec.train_acc - 1.0).abs() < 1e-12);
        assert!(rec.train_loss < rec.val_loss);
    }

    #[test]
    fn test_lr_decays_on_plateau() {
        let fx = fixture();
        let mut cfg = config(6, 10);
        cfg.lr_patience = 1;
        cfg.lr_decay_factor = 0.5;
        let (outcome, _) = run(&fx, &cfg, vec![0.5, 0.5, 0.5, 0.5, 0.5, 0.5]);

        let lrs: Vec<f64> = outcome.history().iter().map(|r| r.lr).collect();
        assert_eq!(lrs[0], 1e-3);
        assert_eq!(lrs[2], 1e-3);
        // Epochs 2 and 3 stagnant → reduced before epoch 4
        assert!((lrs[3] - 5e-4).abs() < 1e-15);
    }

    #[test]
    fn test_model_failure_carries_identity_and_epoch() {
        let fx = fixture();
        let mut model = ScriptedModel::new("scripted", 2, vec![0.5; 5], VAL_SIZE);
        model.fail_at = Some(3);
        let err = TrainingLoop::new(&config(5, 5), &fx.ckpts)
            .train(&mut model, &fx.store, &fx.train, &fx.val)
            .unwrap_err();

        match err {
            TrainError::ModelRuntime { model, epoch, .. } => {
                assert_eq!(model, "scripted");
                assert_eq!(epoch, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        // Epoch 1's checkpoint survives the failure
        assert_eq!(fx.ckpts.load("scripted").unwrap().epoch, 1);
    }

    #[test]
    fn test_broken_model_fails_in_first_epoch() {
        let fx = fixture();
        let mut model = BrokenModel { identity: "broken".into() };
        let err = TrainingLoop::new(&config(5, 5), &fx.ckpts)
            .train(&mut model, &fx.store, &fx.train, &fx.val)
            .unwrap_err();
        assert!(matches!(err, TrainError::ModelRuntime { epoch: 1, .. }));
    }

    #[test]
    fn test_cancelled_before_first_batch() {
        let fx = fixture();
        let stop = StopSignal::new();
        stop.raise();

        let mut model = ScriptedModel::new("scripted", 2, vec![0.5; 5], VAL_SIZE);
        let outcome = TrainingLoop::new(&config(5, 5), &fx.ckpts)
            .with_stop_signal(stop)
            .train(&mut model, &fx.store, &fx.train, &fx.val)
            .unwrap();

        assert_eq!(outcome.stop_reason, StopReason::Cancelled);
        assert!(outcome.history().is_empty());
        assert_eq!(model.updates, 0);
    }

    #[test]
    fn test_metrics_csv_written() {
        let fx = fixture();
        let dir = fx._tmp.path().join("out");
        let mut model = ScriptedModel::new("scripted", 2, vec![0.1, 0.2], VAL_SIZE);
        TrainingLoop::new(&config(2, 2), &fx.ckpts)
            .with_metrics_dir(&dir)
            .train(&mut model, &fx.store, &fx.train, &fx.val)
            .unwrap();

        let csv = std::fs::read_to_string(dir.join("metrics_scripted.csv")).unwrap();
        assert_eq!(csv.lines().count(), 3);
    }
}
