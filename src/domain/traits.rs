// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The orchestration core never names a concrete network or a
// concrete file format. It programs against these traits:
//
//   SampleSource  → anything that yields loaded sample records
//                   (JsonSampleLoader, in-memory fixtures)
//   Model         → one trainable classifier variant
//                   (burn MLP / GRU / transformer, test stubs)
//   ModelFactory  → builds a Model from its identity so the
//                   comparison harness can select variants by
//                   name instead of by inheritance
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)
//            Rust Book §17 (Trait Objects)

use anyhow::Result;

use crate::data::batcher::Batch;
use crate::data::loader::LoadReport;
use crate::domain::sample::Modality;

// ─── SampleSource ─────────────────────────────────────────────────────────────
/// Any component that can load labelled landmark records.
pub trait SampleSource {
    /// Load every record in the given modality.
    /// Corrupt records are skipped and counted in the report,
    /// never returned as an error.
    fn load_all(&self, modality: Modality) -> Result<LoadReport>;
}

// ─── Model ────────────────────────────────────────────────────────────────────
/// Whether a forward pass is part of a training step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Gradients tracked, dropout active
    Train,
    /// No gradients, no parameter updates
    Eval,
}

/// Class scores for a batch, row-major `[batch, num_classes]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Logits {
    pub values:      Vec<f32>,
    pub num_classes: usize,
}

impl Logits {
    pub fn new(values: Vec<f32>, num_classes: usize) -> Self {
        Self { values, num_classes }
    }

    pub fn rows(&self) -> usize {
        if self.num_classes == 0 { 0 } else { self.values.len() / self.num_classes }
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.values[i * self.num_classes..(i + 1) * self.num_classes]
    }

    /// Predicted class per row (first maximum wins).
    pub fn argmax(&self) -> Vec<usize> {
        (0..self.rows())
            .map(|i| {
                self.row(i)
                    .iter()
                    .enumerate()
                    .fold((0usize, f32::NEG_INFINITY), |best, (j, &v)| {
                        if v > best.1 { (j, v) } else { best }
                    })
                    .0
            })
            .collect()
    }
}

/// A trainable classifier. Implementations own their parameters
/// and optimiser state; the training loop owns everything else
/// (loss, metrics, learning rate, stopping, checkpoints).
pub trait Model {
    /// Name distinguishing this variant within a comparison.
    fn identity(&self) -> &str;

    /// Class logits for every sample in the batch.
    /// In `Mode::Train` the implementation keeps whatever it needs
    /// for the following `backward_and_update` call.
    fn forward(&mut self, batch: &Batch, mode: Mode) -> Result<Logits>;

    /// Back-propagate the loss gradient w.r.t. the logits of the
    /// most recent training forward pass and apply one update.
    /// `logit_grad` is row-major `[batch, num_classes]`.
    fn backward_and_update(&mut self, logit_grad: &[f32], lr: f64) -> Result<()>;

    /// Number of trainable scalars.
    fn parameter_count(&self) -> usize;

    /// Serialised snapshot of the trainable state.
    fn state(&self) -> Result<Vec<u8>>;

    /// Restore a snapshot produced by `state`.
    fn load_state(&mut self, state: &[u8]) -> Result<()>;
}

// ─── ModelFactory ─────────────────────────────────────────────────────────────
/// What a factory needs to know about the data to size a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelShape {
    pub feature_dim: usize,
    pub num_classes: usize,
    pub modality:    Modality,
}

/// Builds a fresh, untrained model for an identity.
pub trait ModelFactory {
    fn build(&self, identity: &str, shape: ModelShape) -> Result<Box<dyn Model>>;
}
