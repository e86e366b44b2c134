// ============================================================
// Layer 4 — Sequence Batcher
// ============================================================
// Turns a Split (a list of sample indices) into a lazy stream
// of dense Batches ready for a model forward pass.
//
// Two modes, chosen by the store's modality:
//
//   Flat      → every sample is one 63-wide vector
//               inputs shape [batch, 1, features]
//               no lengths recorded
//
//   Sequence  → samples have different frame counts
//               inputs shape [batch, max_len, features]
//               shorter sequences are padded at the END with
//               zero frames, and each true length is kept
//
// Why a flat (data, lengths) pair instead of Vec<Vec<..>>?
//   Numeric kernels want one contiguous buffer. The lengths
//   vector is what lets consumers build masks so padded frames
//   never count as real timesteps:
//
//     lengths = [3, 1]          mask = [1 1 1]
//     max_len = 3                      [1 0 0]
//
// Shuffling permutes the ORDER of samples before they are
// grouped, never the frames inside a sample. Each call to
// `batches` draws a fresh permutation from the batcher's RNG,
// so every epoch sees a new order while a fixed seed still
// reproduces the whole run.
//
// Reference: PyTorch pad_sequence(batch_first=True)
//            Rust Book §13 (Iterators)

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::data::store::SampleStore;
use crate::domain::sample::Modality;
use crate::domain::split::Split;

// ─── Batch ────────────────────────────────────────────────────────────────────
/// A dense group of samples. All buffers are row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// `[batch, max_len, feature_dim]` values, zero-padded
    pub inputs:      Vec<f32>,
    pub max_len:     usize,
    pub feature_dim: usize,
    /// True frame count per sample (sequence mode only)
    pub lengths:     Option<Vec<usize>>,
    /// Class index per sample
    pub labels:      Vec<usize>,
}

impl Batch {
    /// Number of samples in the batch.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// True length of sample `i` (1 in flat mode).
    pub fn length(&self, i: usize) -> usize {
        self.lengths.as_ref().map_or(1, |l| l[i])
    }

    /// The padded block of sample `i`, `max_len * feature_dim` values.
    #[cfg(test)]
    pub fn padded(&self, i: usize) -> &[f32] {
        let stride = self.max_len * self.feature_dim;
        &self.inputs[i * stride..(i + 1) * stride]
    }

    /// Only the real frames of sample `i`.
    #[cfg(test)]
    pub fn unpadded(&self, i: usize) -> &[f32] {
        &self.padded(i)[..self.length(i) * self.feature_dim]
    }

    /// `[batch, max_len]` with 1.0 on real timesteps, 0.0 on padding.
    pub fn mask(&self) -> Vec<f32> {
        let mut mask = vec![0.0; self.len() * self.max_len];
        for i in 0..self.len() {
            let row = &mut mask[i * self.max_len..(i + 1) * self.max_len];
            row[..self.length(i)].fill(1.0);
        }
        mask
    }

    /// `[batch, max_len]` with 1.0 only on each sample's final real timestep.
    pub fn last_step_mask(&self) -> Vec<f32> {
        let mut mask = vec![0.0; self.len() * self.max_len];
        for i in 0..self.len() {
            mask[i * self.max_len + self.length(i) - 1] = 1.0;
        }
        mask
    }
}

// ─── SequenceBatcher ──────────────────────────────────────────────────────────
/// Produces batches from splits of one SampleStore.
#[derive(Debug, Clone)]
pub struct SequenceBatcher<'a> {
    store:      &'a SampleStore,
    batch_size: usize,
    rng:        StdRng,
}

impl<'a> SequenceBatcher<'a> {
    /// `batch_size` is clamped to at least 1.
    pub fn new(store: &'a SampleStore, batch_size: usize, seed: u64) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// A finite, lazy pass over `split`. Call again for the next epoch.
    pub fn batches(&mut self, split: &Split, shuffle: bool) -> BatchIter<'a> {
        let mut order = split.indices.clone();
        if shuffle {
            order.shuffle(&mut self.rng);
        }
        BatchIter {
            store:      self.store,
            order,
            batch_size: self.batch_size,
            cursor:     0,
        }
    }
}

/// Iterator over the batches of one pass.
#[derive(Debug, Clone)]
pub struct BatchIter<'a> {
    store:      &'a SampleStore,
    order:      Vec<usize>,
    batch_size: usize,
    cursor:     usize,
}

impl Iterator for BatchIter<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.cursor >= self.order.len() {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(self.order.len());
        let batch = collate(self.store, &self.order[self.cursor..end]);
        self.cursor = end;
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.order.len() - self.cursor;
        let n = remaining.div_ceil(self.batch_size);
        (n, Some(n))
    }
}

impl ExactSizeIterator for BatchIter<'_> {}

/// Stack the given samples into one zero-padded dense batch.
fn collate(store: &SampleStore, indices: &[usize]) -> Batch {
    let feature_dim = store.feature_dim();
    let samples: Vec<_> = indices.iter().filter_map(|&i| store.get(i)).collect();

    let max_len = samples
        .iter()
        .map(|s| s.data.timesteps())
        .max()
        .unwrap_or(1);

    // Zero-initialised, so only real frames need copying;
    // the trailing padding is already in place
    let stride = max_len * feature_dim;
    let mut inputs = vec![0.0f32; samples.len() * stride];
    for (i, s) in samples.iter().enumerate() {
        let values = s.data.values();
        inputs[i * stride..i * stride + values.len()].copy_from_slice(values);
    }

    let lengths = match store.modality() {
        Modality::Flat     => None,
        Modality::Sequence => Some(samples.iter().map(|s| s.data.timesteps()).collect()),
    };

    Batch {
        inputs,
        max_len,
        feature_dim,
        lengths,
        labels: samples.iter().map(|s| s.label).collect(),
    }
}
