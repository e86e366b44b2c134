// ============================================================
// Layer 5 — Evaluator
// ============================================================
// Replays the best checkpoint of a model over a held-out split:
//
//   CheckpointManager::load(identity)
//        │  (CheckpointNotFound if training never improved)
//        ▼
//   Model::load_state(bytes)
//        │
//        ▼
//   one pass over the split in Mode::Eval, no shuffle
//        │
//        ▼
//   EvaluationReport
//     aggregate_accuracy  correct / total over the whole split
//     per_class           correct / total per true class
//     confusion           [actual][predicted] counts
//
// Classes with no sample in the split are left out of
// per_class rather than reported as 0/0.

use anyhow::anyhow;
use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};

use crate::data::batcher::SequenceBatcher;
use crate::data::store::SampleStore;
use crate::domain::error::TrainError;
use crate::domain::split::Split;
use crate::domain::traits::{Mode, Model};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::loss::cross_entropy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassAccuracy {
    pub correct:  usize,
    pub total:    usize,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub model_identity:     String,
    /// Epoch the restored checkpoint was taken after
    pub checkpoint_epoch:   usize,
    /// Validation accuracy recorded in the checkpoint
    pub best_val_metric:    f64,
    pub samples:            usize,
    pub aggregate_accuracy: f64,
    pub mean_loss:          f64,
    pub per_class:          BTreeMap<String, ClassAccuracy>,
    /// Row = actual class index, column = predicted class index
    pub confusion:          Vec<Vec<usize>>,
}

pub struct Evaluator<'a> {
    checkpoints: &'a CheckpointManager,
    batch_size:  usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(checkpoints: &'a CheckpointManager, batch_size: usize) -> Self {
        Self { checkpoints, batch_size: batch_size.max(1) }
    }

    pub fn evaluate(
        &self,
        model: &mut dyn Model,
        store: &SampleStore,
        split: &Split,
    ) -> Result<EvaluationReport, TrainError> {
        let identity = model.identity().to_string();
        let checkpoint = self.checkpoints.load(&identity)?;

        model.load_state(&checkpoint.state).map_err(|e| TrainError::Checkpoint {
            model:   identity.clone(),
            message: format!("cannot restore state: {e:#}"),
        })?;
        tracing::info!(
            "Evaluating '{}' from epoch {} checkpoint on {} {} samples",
            identity, checkpoint.epoch, split.len(), split.name
        );

        let num_classes = store.classes().len();
        let mut confusion = vec![vec![0usize; num_classes]; num_classes];
        let mut loss_sum = 0.0;
        let mut total = 0;

        // The seed only matters for shuffled passes
        let mut batcher = SequenceBatcher::new(store, self.batch_size, 0);
        for batch in batcher.batches(split, false) {
            let runtime = |e| TrainError::model_runtime(&identity, checkpoint.epoch, e);
            let logits = model.forward(&batch, Mode::Eval).map_err(runtime)?;
            if logits.num_classes != num_classes {
                return Err(runtime(anyhow!(
                    "model scores {} classes, the store has {}",
                    logits.num_classes,
                    num_classes
                )));
            }
            let out = cross_entropy(&logits, &batch.labels).map_err(runtime)?;

            loss_sum += out.loss_sum;
            total += batch.len();
            for (&actual, &predicted) in batch.labels.iter().zip(&out.predictions) {
                confusion[actual][predicted] += 1;
            }
        }

        let correct: usize = (0..num_classes).map(|c| confusion[c][c]).sum();
        let per_class = confusion
            .iter()
            .enumerate()
            .filter_map(|(c, row)| {
                let class_total: usize = row.iter().sum();
                if class_total == 0 {
                    return None;
                }
                let name = store.classes().name_of(c)?.to_string();
                Some((name, ClassAccuracy {
                    correct:  row[c],
                    total:    class_total,
                    accuracy: row[c] as f64 / class_total as f64,
                }))
            })
            .collect();

        let ratio = |num: f64| if total == 0 { 0.0 } else { num / total as f64 };
        let report = EvaluationReport {
            model_identity:     identity,
            checkpoint_epoch:   checkpoint.epoch,
            best_val_metric:    checkpoint.val_metric,
            samples:            total,
            aggregate_accuracy: ratio(correct as f64),
            mean_loss:          ratio(loss_sum),
            per_class,
            confusion,
        };

        tracing::info!(
            "'{}' test accuracy {:.2}% ({}/{})",
            report.model_identity, report.aggregate_accuracy * 100.0, correct, total
        );
        Ok(report)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::split::SplitName;
    use crate::infra::checkpoint::Checkpoint;
    use crate::ml::stubs::{flat_store, MajorityModel, PerfectModel, ScriptedModel};
    use tempfile::TempDir;

    fn manager(tmp: &TempDir) -> CheckpointManager {
        CheckpointManager::new(tmp.path()).unwrap()
    }

    fn save(ckpts: &CheckpointManager, identity: &str, epoch: usize) {
        ckpts
            .save(&Checkpoint {
                model_identity: identity.into(),
                epoch,
                val_metric: 0.5,
                state: vec![epoch as u8],
            })
            .unwrap();
    }

    #[test]
    fn test_missing_checkpoint_is_reported() {
        let tmp = TempDir::new().unwrap();
        let ckpts = manager(&tmp);
        let store = flat_store(2, 5);
        let split = Split::new(SplitName::Test, (0..10).collect());

        let mut model = MajorityModel { identity: "majority".into(), num_classes: 2 };
        let err = Evaluator::new(&ckpts, 4).evaluate(&mut model, &store, &split).unwrap_err();
        assert!(matches!(err, TrainError::CheckpointNotFound { model } if model == "majority"));
    }

    #[test]
    fn test_checkpoint_state_is_restored() {
        let tmp = TempDir::new().unwrap();
        let ckpts = manager(&tmp);
        save(&ckpts, "scripted", 4);
        let store = flat_store(2, 5);
        let split = Split::new(SplitName::Test, (0..10).collect());

        let mut model = ScriptedModel::new("scripted", 2, vec![1.0], 10);
        let report = Evaluator::new(&ckpts, 3).evaluate(&mut model, &store, &split).unwrap();
        assert_eq!(model.loaded, Some(vec![4]));
        assert_eq!(report.checkpoint_epoch, 4);
    }

    #[test]
    fn test_majority_per_class_and_confusion() {
        let tmp = TempDir::new().unwrap();
        let ckpts = manager(&tmp);
        save(&ckpts, "majority", 1);
        let store = flat_store(3, 4);
        // 4 samples of c00, 2 of c01, none of c02
        let split = Split::new(SplitName::Test, vec![0, 1, 2, 3, 4, 5]);

        let mut model = MajorityModel { identity: "majority".into(), num_classes: 3 };
        let report = Evaluator::new(&ckpts, 4).evaluate(&mut model, &store, &split).unwrap();

        assert_eq!(report.samples, 6);
        assert!((report.aggregate_accuracy - 4.0 / 6.0).abs() < 1e-12);
        assert_eq!(report.per_class.len(), 2);
        assert_eq!(report.per_class["c00"].accuracy, 1.0);
        assert_eq!(report.per_class["c01"].correct, 0);
        assert_eq!(report.per_class["c01"].total, 2);
        assert!(!report.per_class.contains_key("c02"));
        assert_eq!(report.confusion[1][0], 2);
        assert_eq!(report.confusion[2], vec![0, 0, 0]);
    }

    #[test]
    fn test_perfect_model_scores_one() {
        let tmp = TempDir::new().unwrap();
        let ckpts = manager(&tmp);
        save(&ckpts, "perfect", 2);
        let store = flat_store(4, 5);
        let split = Split::new(SplitName::Test, (0..20).step_by(2).collect());

        let mut model = PerfectModel { identity: "perfect".into(), num_classes: 4, parameters: 1 };
        let report = Evaluator::new(&ckpts, 3).evaluate(&mut model, &store, &split).unwrap();
        assert_eq!(report.aggregate_accuracy, 1.0);
        assert!(report.per_class.values().all(|c| c.accuracy == 1.0));
    }
}
