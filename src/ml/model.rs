// ============================================================
// Layer 5 — Burn Model Adapter
// ============================================================
// Bridges burn networks to the host-side Model trait the
// training loop programs against.
//
// Key Burn 0.20 points:
//   - Training uses TrainBackend (Autodiff<NdArray>) for gradients
//   - model.valid() returns the module on InnerBackend (NdArray),
//     which also disables dropout
//   - the loop computes the loss on the host, so backward runs on
//     a surrogate scalar:
//
//       surrogate = sum(logits ⊙ g)   with g = dLoss/dlogits
//       dsurrogate/dlogits = g
//
//     which yields exactly the parameter gradients of the host
//     loss without burn ever seeing the labels
//
// Step for one training batch:
//   forward(Train)          → keep autodiff logits
//   backward_and_update(g)  → surrogate.backward()
//                           → GradientsParams::from_grads
//                           → Adam step with the loop's LR
//
// Reference: Burn Book §5 (Custom Training Loop)
//            Kingma & Ba (2015) Adam

use anyhow::{anyhow, bail, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, Autodiff, NdArray},
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::TensorData,
};

use crate::data::batcher::Batch;
use crate::domain::traits::{Logits, Mode, Model};

pub type TrainBackend = Autodiff<NdArray>;
pub type InnerBackend = NdArray;

// ─── Batch tensors ────────────────────────────────────────────────────────────
/// A host Batch moved onto a burn device.
pub struct BatchTensors<B: Backend> {
    /// `[batch, time, features]`, zero-padded
    pub inputs:    Tensor<B, 3>,
    /// `[batch, time]`, 1.0 on real frames
    pub mask:      Tensor<B, 2>,
    /// `[batch, time]`, 1.0 on each sample's final real frame
    pub last_step: Tensor<B, 2>,
}

impl<B: Backend> BatchTensors<B> {
    pub fn from_batch(batch: &Batch, device: &B::Device) -> Self {
        let [b, t, f] = [batch.len(), batch.max_len, batch.feature_dim];
        let inputs = Tensor::from_data(TensorData::new(batch.inputs.clone(), [b, t, f]), device);
        let mask = Tensor::from_data(TensorData::new(batch.mask(), [b, t]), device);
        let last_step = Tensor::from_data(TensorData::new(batch.last_step_mask(), [b, t]), device);
        Self { inputs, mask, last_step }
    }
}

/// Mean over real frames: `[b, t, d]` + mask `[b, t]` → `[b, d]`.
pub fn masked_mean<B: Backend>(x: Tensor<B, 3>, mask: Tensor<B, 2>) -> Tensor<B, 2> {
    let [b, _, d] = x.dims();
    let weights = mask.unsqueeze_dim::<3>(2);
    let counts = weights.clone().sum_dim(1).clamp_min(1.0);
    (x * weights).sum_dim(1).div(counts).reshape([b, d])
}

/// A burn network that maps a padded batch to class logits `[b, classes]`.
pub trait SequenceClassifier<B: Backend> {
    fn classify(&self, input: BatchTensors<B>) -> Tensor<B, 2>;
}

// ─── BurnClassifier ───────────────────────────────────────────────────────────
/// Owns a burn module plus its optimiser and exposes them as a Model.
pub struct BurnClassifier<M, O> {
    identity:    String,
    num_classes: usize,
    /// Taken out and put back around every optimiser step
    module:      Option<M>,
    optim:       O,
    device:      NdArrayDevice,
    /// Autodiff logits of the last training forward pass
    pending:     Option<Tensor<TrainBackend, 2>>,
}

impl<M, O> BurnClassifier<M, O>
where
    M: AutodiffModule<TrainBackend> + SequenceClassifier<TrainBackend>,
    M::InnerModule: SequenceClassifier<InnerBackend>,
    O: Optimizer<M, TrainBackend>,
{
    pub fn new(identity: &str, num_classes: usize, module: M, optim: O, device: NdArrayDevice) -> Self {
        Self {
            identity: identity.to_string(),
            num_classes,
            module: Some(module),
            optim,
            device,
            pending: None,
        }
    }

    fn module(&self) -> Result<&M> {
        self.module
            .as_ref()
            .ok_or_else(|| anyhow!("'{}' lost its module in a failed update", self.identity))
    }

    fn to_logits<B: Backend>(&self, logits: Tensor<B, 2>) -> Result<Logits> {
        let [_, classes] = logits.dims();
        if classes != self.num_classes {
            bail!("network produced {classes} logits per sample, expected {}", self.num_classes);
        }
        let values = logits
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("cannot read logits: {e:?}"))?;
        Ok(Logits::new(values, classes))
    }
}

impl<M, O> Model for BurnClassifier<M, O>
where
    M: AutodiffModule<TrainBackend> + SequenceClassifier<TrainBackend>,
    M::InnerModule: SequenceClassifier<InnerBackend>,
    O: Optimizer<M, TrainBackend>,
{
    fn identity(&self) -> &str {
        &self.identity
    }

    fn forward(&mut self, batch: &Batch, mode: Mode) -> Result<Logits> {
        match mode {
            Mode::Train => {
                let input = BatchTensors::<TrainBackend>::from_batch(batch, &self.device);
                let logits = self.module()?.classify(input);
                self.pending = Some(logits.clone());
                self.to_logits(logits)
            }
            Mode::Eval => {
                self.pending = None;
                let input = BatchTensors::<InnerBackend>::from_batch(batch, &self.device);
                let logits = self.module()?.valid().classify(input);
                self.to_logits(logits)
            }
        }
    }

    fn backward_and_update(&mut self, logit_grad: &[f32], lr: f64) -> Result<()> {
        let logits = self
            .pending
            .take()
            .ok_or_else(|| anyhow!("backward called without a training forward pass"))?;
        let [b, c] = logits.dims();
        if logit_grad.len() != b * c {
            bail!("gradient has {} values, logits have {}", logit_grad.len(), b * c);
        }

        let grad = Tensor::<TrainBackend, 2>::from_data(
            TensorData::new(logit_grad.to_vec(), [b, c]),
            &self.device,
        );
        let grads = (logits * grad).sum().backward();

        let module = self
            .module
            .take()
            .ok_or_else(|| anyhow!("'{}' has no module to update", self.identity))?;
        let grads = GradientsParams::from_grads(grads, &module);
        self.module = Some(self.optim.step(lr, module, grads));
        Ok(())
    }

    fn parameter_count(&self) -> usize {
        self.module.as_ref().map_or(0, |m| m.num_params())
    }

    fn state(&self) -> Result<Vec<u8>> {
        let record = self.module()?.clone().into_record();
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        Recorder::<TrainBackend>::record(&recorder, record, ())
            .map_err(|e| anyhow!("cannot serialise '{}': {e:?}", self.identity))
    }

    fn load_state(&mut self, state: &[u8]) -> Result<()> {
        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let record = Recorder::<TrainBackend>::load(&recorder, state.to_vec(), &self.device)
            .map_err(|e| anyhow!("cannot deserialise '{}': {e:?}", self.identity))?;
        let module = self
            .module
            .take()
            .ok_or_else(|| anyhow!("'{}' has no module to restore into", self.identity))?;
        self.module = Some(module.load_record(record));
        self.pending = None;
        Ok(())
    }
}
