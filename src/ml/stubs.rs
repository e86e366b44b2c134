// Test doubles for the Model trait.
//
// They stand in for real networks so the training loop, the
// evaluator and the comparison harness can be tested against
// exact, hand-picked accuracy sequences.

use anyhow::{bail, Result};

use crate::data::batcher::Batch;
use crate::data::loader::SampleRecord;
use crate::data::store::SampleStore;
use crate::domain::sample::SampleData;
use crate::domain::traits::{Logits, Mode, Model, ModelFactory, ModelShape};

fn one_hot_logits(predictions: &[usize], num_classes: usize) -> Logits {
    let mut values = vec![0.0; predictions.len() * num_classes];
    for (i, &p) in predictions.iter().enumerate() {
        values[i * num_classes + p] = 10.0;
    }
    Logits::new(values, num_classes)
}

/// Predicts class 0 for everything.
pub struct MajorityModel {
    pub identity:    String,
    pub num_classes: usize,
}

impl Model for MajorityModel {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn forward(&mut self, batch: &Batch, _mode: Mode) -> Result<Logits> {
        Ok(one_hot_logits(&vec![0; batch.len()], self.num_classes))
    }

    fn backward_and_update(&mut self, _grad: &[f32], _lr: f64) -> Result<()> {
        Ok(())
    }

    fn parameter_count(&self) -> usize {
        1
    }

    fn state(&self) -> Result<Vec<u8>> {
        Ok(vec![0])
    }

    fn load_state(&mut self, _state: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Always right. Reads the labels straight off the batch.
pub struct PerfectModel {
    pub identity:    String,
    pub num_classes: usize,
    pub parameters:  usize,
}

impl Model for PerfectModel {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn forward(&mut self, batch: &Batch, _mode: Mode) -> Result<Logits> {
        Ok(one_hot_logits(&batch.labels, self.num_classes))
    }

    fn backward_and_update(&mut self, _grad: &[f32], _lr: f64) -> Result<()> {
        Ok(())
    }

    fn parameter_count(&self) -> usize {
        self.parameters
    }

    fn state(&self) -> Result<Vec<u8>> {
        Ok(b"perfect".to_vec())
    }

    fn load_state(&mut self, _state: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Hits a scripted validation accuracy each epoch.
///
/// An epoch starts with the first training forward after an
/// evaluation pass. In `Eval` mode the first
/// `round(val_accs[epoch] * eval_size)` samples of the pass are
/// predicted correctly, the rest wrongly. `state()` encodes the
/// epoch number so tests can tell which epoch was checkpointed.
pub struct ScriptedModel {
    pub identity:    String,
    pub num_classes: usize,
    pub val_accs:    Vec<f64>,
    pub eval_size:   usize,
    pub fail_at:     Option<usize>,
    pub epoch:       usize,
    pub updates:     usize,
    pub loaded:      Option<Vec<u8>>,
    in_eval:         bool,
    eval_seen:       usize,
}

impl ScriptedModel {
    pub fn new(identity: &str, num_classes: usize, val_accs: Vec<f64>, eval_size: usize) -> Self {
        Self {
            identity: identity.to_string(),
            num_classes,
            val_accs,
            eval_size,
            fail_at: None,
            epoch: 0,
            updates: 0,
            loaded: None,
            in_eval: true,
            eval_seen: 0,
        }
    }
}

impl Model for ScriptedModel {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn forward(&mut self, batch: &Batch, mode: Mode) -> Result<Logits> {
        match mode {
            Mode::Train => {
                if self.in_eval {
                    self.epoch += 1;
                    self.in_eval = false;
                }
                if self.fail_at == Some(self.epoch) {
                    bail!("scripted failure");
                }
                Ok(one_hot_logits(&batch.labels, self.num_classes))
            }
            Mode::Eval => {
                if !self.in_eval {
                    self.in_eval = true;
                    self.eval_seen = 0;
                }
                let acc = self
                    .val_accs
                    .get(self.epoch.saturating_sub(1))
                    .copied()
                    .unwrap_or(0.0);
                let n_right = (acc * self.eval_size as f64).round() as usize;

                let predictions: Vec<usize> = batch
                    .labels
                    .iter()
                    .map(|&y| {
                        let right = self.eval_seen < n_right;
                        self.eval_seen += 1;
                        if right { y } else { (y + 1) % self.num_classes }
                    })
                    .collect();
                Ok(one_hot_logits(&predictions, self.num_classes))
            }
        }
    }

    fn backward_and_update(&mut self, _grad: &[f32], _lr: f64) -> Result<()> {
        self.updates += 1;
        Ok(())
    }

    fn parameter_count(&self) -> usize {
        10
    }

    fn state(&self) -> Result<Vec<u8>> {
        Ok(vec![self.epoch as u8])
    }

    fn load_state(&mut self, state: &[u8]) -> Result<()> {
        self.loaded = Some(state.to_vec());
        Ok(())
    }
}

/// Fails on every forward pass.
pub struct BrokenModel {
    pub identity: String,
}

impl Model for BrokenModel {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn forward(&mut self, _batch: &Batch, _mode: Mode) -> Result<Logits> {
        bail!("device lost")
    }

    fn backward_and_update(&mut self, _grad: &[f32], _lr: f64) -> Result<()> {
        Ok(())
    }

    fn parameter_count(&self) -> usize {
        0
    }

    fn state(&self) -> Result<Vec<u8>> {
        Ok(Vec::new())
    }

    fn load_state(&mut self, _state: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Builds the stubs above by identity: "majority", "perfect", "broken".
pub struct StubFactory;

impl ModelFactory for StubFactory {
    fn build(&self, identity: &str, shape: ModelShape) -> Result<Box<dyn Model>> {
        match identity {
            "majority" => Ok(Box::new(MajorityModel {
                identity:    identity.into(),
                num_classes: shape.num_classes,
            })),
            "perfect" => Ok(Box::new(PerfectModel {
                identity:    identity.into(),
                num_classes: shape.num_classes,
                parameters:  100,
            })),
            "broken" => Ok(Box::new(BrokenModel { identity: identity.into() })),
            other => bail!("unknown stub '{other}'"),
        }
    }
}

/// `classes` classes named c00, c01, ... with `per_class` flat samples each.
pub fn flat_store(classes: usize, per_class: usize) -> SampleStore {
    let mut records = Vec::new();
    for c in 0..classes {
        for i in 0..per_class {
            records.push(SampleRecord {
                gloss:  format!("c{c:02}"),
                source: "stub".into(),
                id:     format!("c{c:02}_{i}"),
                data:   SampleData::Features(vec![c as f32, i as f32]),
            });
        }
    }
    SampleStore::from_records(records).expect("valid stub store")
}
