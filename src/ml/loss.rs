// ============================================================
// Layer 5 — Cross-Entropy Loss and Batch Tallies
// ============================================================
// Computed on the host from the logits a Model returns, so the
// same loss and the same accuracy arithmetic apply to every
// model variant (burn networks and test stubs alike).
//
// For one sample with logits z and true class y:
//   loss      = logsumexp(z) - z[y]
//   dloss/dz  = softmax(z) - onehot(y)
//
// The batch loss is the MEAN over samples, so the gradient
// handed to Model::backward_and_update is divided by the batch
// size. The tally keeps the SUM of per-sample losses instead,
// which is what makes epoch averages size-weighted: a final
// batch of 3 samples weighs 3/N, not 1/num_batches.
//
// Padded timesteps never reach this code. Classification is
// per sequence, and models consume the batch masks before they
// produce one row of logits per sample.
//
// Reference: Goodfellow et al. (2016) §6.2.2.3 Softmax Units

use anyhow::{bail, Result};

use crate::domain::traits::Logits;

/// Loss, gradient and correct count for one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchLoss {
    /// Sum of per-sample losses
    pub loss_sum: f64,
    /// Samples whose argmax equals the label
    pub correct:  usize,
    /// `[batch, num_classes]`, already divided by batch size
    pub grad:     Vec<f32>,
    /// Predicted class per sample
    pub predictions: Vec<usize>,
}

/// Cross-entropy of `logits` against `labels`, with gradient.
pub fn cross_entropy(logits: &Logits, labels: &[usize]) -> Result<BatchLoss> {
    let n = labels.len();
    let c = logits.num_classes;
    if logits.rows() != n || logits.values.len() != n * c {
        bail!(
            "logits have {} rows of {} classes, batch has {} labels",
            logits.rows(),
            c,
            n
        );
    }

    let mut loss_sum = 0.0f64;
    let mut grad = vec![0.0f32; n * c];
    let predictions = logits.argmax();
    let scale = 1.0 / n.max(1) as f64;

    for (i, &label) in labels.iter().enumerate() {
        if label >= c {
            bail!("label {label} out of range for {c} classes");
        }
        let row = logits.row(i);

        // Subtract the max before exp() for numerical stability
        let max = row.iter().fold(f32::NEG_INFINITY, |m, &v| m.max(v)) as f64;
        let exp: Vec<f64> = row.iter().map(|&v| (v as f64 - max).exp()).collect();
        let sum: f64 = exp.iter().sum();
        let log_sum_exp = max + sum.ln();

        let sample_loss = log_sum_exp - row[label] as f64;
        if !sample_loss.is_finite() {
            bail!("non-finite loss for sample {i}");
        }
        loss_sum += sample_loss;

        for j in 0..c {
            let p = exp[j] / sum;
            let target = if j == label { 1.0 } else { 0.0 };
            grad[i * c + j] = ((p - target) * scale) as f32;
        }
    }

    let correct = predictions
        .iter()
        .zip(labels)
        .filter(|(p, y)| p == y)
        .count();

    Ok(BatchLoss { loss_sum, correct, grad, predictions })
}

/// Running sums over one pass of a split.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Tally {
    pub loss_sum: f64,
    pub correct:  usize,
    pub total:    usize,
}

impl Tally {
    pub fn add(&mut self, batch: &BatchLoss, batch_size: usize) {
        self.loss_sum += batch.loss_sum;
        self.correct  += batch.correct;
        self.total    += batch_size;
    }

    /// Size-weighted mean loss (0 for an empty pass).
    pub fn mean_loss(&self) -> f64 {
        if self.total == 0 { 0.0 } else { self.loss_sum / self.total as f64 }
    }

    /// Fraction correct (0 for an empty pass).
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 { 0.0 } else { self.correct as f64 / self.total as f64 }
    }
}
