// ============================================================
// Layer 5 — Classifier Architectures
// ============================================================
// Three burn networks, each turning a padded batch
// [batch, time, 63] into class logits [batch, classes]:
//
//   MlpClassifier          masked mean over frames → Linear/ReLU
//                          stack → class head. With one frame per
//                          sample this is a plain MLP.
//
//   GruClassifier          stacked GRU layers over the frames; the
//                          hidden state at each sample's LAST REAL
//                          frame feeds the class head, so padding
//                          after it has no effect.
//
//   TransformerClassifier  input projection + sinusoidal positions
//                          → post-norm encoder blocks whose self-
//                          attention ignores padded frames → masked
//                          mean pooling → class head.
//
// Reference: Burn Book §3 (Building Blocks)
//            Cho et al. (2014) GRU
//            Vaswani et al. (2017) Attention Is All You Need

use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        gru::{Gru, GruConfig},
        Dropout, DropoutConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
        PositionalEncoding, PositionalEncodingConfig,
    },
    prelude::*,
    tensor::activation::{gelu, relu},
};

use crate::ml::model::{masked_mean, BatchTensors, SequenceClassifier};

/// Longest sequence the positional encoding table covers.
pub const MAX_FRAMES: usize = 512;

// ─── MLP ──────────────────────────────────────────────────────────────────────
// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize.
#[derive(Config, Debug)]
pub struct MlpConfig {
    pub d_input:     usize,
    pub num_classes: usize,
    pub hidden:      Vec<usize>,
    #[config(default = 0.3)]
    pub dropout:     f64,
}

impl MlpConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> MlpClassifier<B> {
        let mut d_in = self.d_input;
        let mut layers = Vec::with_capacity(self.hidden.len());
        for &width in &self.hidden {
            layers.push(LinearConfig::new(d_in, width).init(device));
            d_in = width;
        }
        MlpClassifier {
            layers,
            head:    LinearConfig::new(d_in, self.num_classes).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct MlpClassifier<B: Backend> {
    pub layers:  Vec<Linear<B>>,
    pub head:    Linear<B>,
    pub dropout: Dropout,
}

impl<B: Backend> SequenceClassifier<B> for MlpClassifier<B> {
    fn classify(&self, input: BatchTensors<B>) -> Tensor<B, 2> {
        let mut x = masked_mean(input.inputs, input.mask);
        for layer in &self.layers {
            x = self.dropout.forward(relu(layer.forward(x)));
        }
        self.head.forward(x)
    }
}

// ─── GRU ──────────────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct GruClassifierConfig {
    pub d_input:     usize,
    pub num_classes: usize,
    #[config(default = 128)]
    pub hidden:      usize,
    #[config(default = 2)]
    pub num_layers:  usize,
    #[config(default = 0.3)]
    pub dropout:     f64,
}

impl GruClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> GruClassifier<B> {
        let layers = (0..self.num_layers.max(1))
            .map(|i| {
                let d_in = if i == 0 { self.d_input } else { self.hidden };
                GruConfig::new(d_in, self.hidden, true).init(device)
            })
            .collect();
        GruClassifier {
            layers,
            head:    LinearConfig::new(self.hidden, self.num_classes).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct GruClassifier<B: Backend> {
    pub layers:  Vec<Gru<B>>,
    pub head:    Linear<B>,
    pub dropout: Dropout,
}

impl<B: Backend> SequenceClassifier<B> for GruClassifier<B> {
    fn classify(&self, input: BatchTensors<B>) -> Tensor<B, 2> {
        let mut x = input.inputs;
        for (i, layer) in self.layers.iter().enumerate() {
            if i > 0 {
                x = self.dropout.forward(x);
            }
            x = layer.forward(x, None); // [batch, time, hidden]
        }

        // Keep only the hidden state at each sample's final real frame
        let [b, _, h] = x.dims();
        let last = (x * input.last_step.unsqueeze_dim::<3>(2))
            .sum_dim(1)
            .reshape([b, h]);
        self.head.forward(self.dropout.forward(last))
    }
}

// ─── Transformer ──────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct TransformerClassifierConfig {
    pub d_input:     usize,
    pub num_classes: usize,
    #[config(default = 128)]
    pub d_model:     usize,
    #[config(default = 4)]
    pub num_heads:   usize,
    #[config(default = 2)]
    pub num_layers:  usize,
    #[config(default = 0.1)]
    pub dropout:     f64,
}

impl TransformerClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TransformerClassifier<B> {
        let layers = (0..self.num_layers)
            .map(|_| self.build_encoder_block(device))
            .collect();
        TransformerClassifier {
            input_proj: LinearConfig::new(self.d_input, self.d_model).init(device),
            positions:  PositionalEncodingConfig::new(self.d_model)
                .with_max_sequence_size(MAX_FRAMES)
                .init(device),
            layers,
            final_norm: LayerNormConfig::new(self.d_model).init(device),
            head:       LinearConfig::new(self.d_model, self.num_classes).init(device),
            dropout:    DropoutConfig::new(self.dropout).init(),
        }
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let d_ff = self.d_model * 4;
        EncoderBlock {
            self_attn:   MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
                .with_dropout(self.dropout)
                .init(device),
            ffn_linear1: LinearConfig::new(self.d_model, d_ff).init(device),
            ffn_linear2: LinearConfig::new(d_ff, self.d_model).init(device),
            norm1:       LayerNormConfig::new(self.d_model).init(device),
            norm2:       LayerNormConfig::new(self.d_model).init(device),
            dropout:     DropoutConfig::new(self.dropout).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    /// `padding` is true on frames attention must ignore.
    pub fn forward(&self, x: Tensor<B, 3>, padding: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attn = self
            .self_attn
            .forward(MhaInput::self_attn(x.clone()).mask_pad(padding))
            .context;
        let x = self.norm1.forward(x + self.dropout.forward(attn));
        let ffn = self.ffn_linear2.forward(gelu(self.ffn_linear1.forward(x.clone())));
        self.norm2.forward(x + self.dropout.forward(ffn))
    }
}

#[derive(Module, Debug)]
pub struct TransformerClassifier<B: Backend> {
    pub input_proj: Linear<B>,
    pub positions:  PositionalEncoding<B>,
    pub layers:     Vec<EncoderBlock<B>>,
    pub final_norm: LayerNorm<B>,
    pub head:       Linear<B>,
    pub dropout:    Dropout,
}

impl<B: Backend> SequenceClassifier<B> for TransformerClassifier<B> {
    fn classify(&self, input: BatchTensors<B>) -> Tensor<B, 2> {
        let padding = input.mask.clone().equal_elem(0.0);

        let x = self.positions.forward(self.input_proj.forward(input.inputs));
        let mut x = self.dropout.forward(x);
        for layer in &self.layers {
            x = layer.forward(x, padding.clone());
        }
        let x = self.final_norm.forward(x);

        self.head.forward(masked_mean(x, input.mask))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::Batch;
    use crate::ml::model::InnerBackend;

    fn padded_batch() -> Batch {
        // Sample 0: 3 frames, sample 1: 1 frame + 2 padded
        let mut inputs = vec![0.0f32; 2 * 3 * 4];
        for (i, v) in inputs[..12].iter_mut().enumerate() {
            *v = i as f32 * 0.1;
        }
        inputs[12..16].copy_from_slice(&[0.5, -0.5, 0.25, 1.0]);
        Batch {
            inputs,
            max_len: 3,
            feature_dim: 4,
            lengths: Some(vec![3, 1]),
            labels: vec![0, 1],
        }
    }

    fn with_tail(batch: &Batch, value: f32) -> Batch {
        let mut other = batch.clone();
        other.inputs[16..24].fill(value);
        other
    }

    fn logits<M: SequenceClassifier<InnerBackend>>(model: &M, batch: &Batch) -> Vec<f32> {
        let device = Default::default();
        model
            .classify(BatchTensors::from_batch(batch, &device))
            .into_data()
            .to_vec::<f32>()
            .unwrap()
    }

    fn assert_padding_ignored<M: SequenceClassifier<InnerBackend>>(model: &M) {
        let batch = padded_batch();
        let a = logits(model, &batch);
        let b = logits(model, &with_tail(&batch, 7.0));
        assert_eq!(a.len(), 2 * 5);
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-4, "padding changed logits: {x} vs {y}");
        }
    }

    #[test]
    fn test_mlp_shape_and_masking() {
        let device = Default::default();
        let model: MlpClassifier<InnerBackend> =
            MlpConfig::new(4, 5, vec![8, 6]).init(&device);
        assert_eq!(model.layers.len(), 2);
        assert_padding_ignored(&model);
    }

    #[test]
    fn test_gru_uses_last_real_frame() {
        let device = Default::default();
        let model: GruClassifier<InnerBackend> =
            GruClassifierConfig::new(4, 5).with_hidden(8).init(&device);
        assert_padding_ignored(&model);
    }

    #[test]
    fn test_transformer_masks_padding() {
        let device = Default::default();
        let model: TransformerClassifier<InnerBackend> = TransformerClassifierConfig::new(4, 5)
            .with_d_model(8)
            .with_num_heads(2)
            .with_num_layers(1)
            .init(&device);
        assert_padding_ignored(&model);
    }
}
