// ============================================================
// Layer 5 — Model Registry
// ============================================================
// Maps a model identity to a freshly initialised burn network
// wrapped in a BurnClassifier with its own Adam optimiser:
//
//   "mlp"          → MlpClassifier
//   "gru"          → GruClassifier
//   "transformer"  → TransformerClassifier
//
// Sizes come from ModelConfig; input width and class count come
// from the store the models will be trained on.

use anyhow::{bail, Result};
use burn::{
    backend::ndarray::NdArrayDevice,
    module::AutodiffModule,
    optim::AdamConfig,
};

use crate::application::config::ModelConfig;
use crate::domain::traits::{Model, ModelFactory, ModelShape};
use crate::ml::architectures::{GruClassifierConfig, MlpConfig, TransformerClassifierConfig};
use crate::ml::model::{BurnClassifier, InnerBackend, SequenceClassifier, TrainBackend};

/// Every identity the registry can build.
pub const MODEL_IDENTITIES: [&str; 3] = ["mlp", "gru", "transformer"];

pub struct BurnModelFactory {
    config: ModelConfig,
    device: NdArrayDevice,
}

impl BurnModelFactory {
    pub fn new(config: ModelConfig) -> Self {
        Self { config, device: NdArrayDevice::default() }
    }
}

impl ModelFactory for BurnModelFactory {
    fn build(&self, identity: &str, shape: ModelShape) -> Result<Box<dyn Model>> {
        let cfg = &self.config;
        let (d_in, classes) = (shape.feature_dim, shape.num_classes);
        if d_in == 0 || classes == 0 {
            bail!("cannot size '{identity}' for {d_in} features and {classes} classes");
        }

        let model = match identity {
            "mlp" => self.wrap(
                identity,
                classes,
                MlpConfig::new(d_in, classes, cfg.mlp_hidden.clone())
                    .with_dropout(cfg.dropout)
                    .init(&self.device),
            ),
            "gru" => self.wrap(
                identity,
                classes,
                GruClassifierConfig::new(d_in, classes)
                    .with_hidden(cfg.gru_hidden)
                    .with_num_layers(cfg.gru_layers)
                    .with_dropout(cfg.dropout)
                    .init(&self.device),
            ),
            "transformer" => {
                if cfg.transformer_heads == 0 || cfg.transformer_d_model % cfg.transformer_heads != 0 {
                    bail!(
                        "transformer_d_model {} is not divisible by transformer_heads {}",
                        cfg.transformer_d_model,
                        cfg.transformer_heads
                    );
                }
                self.wrap(
                    identity,
                    classes,
                    TransformerClassifierConfig::new(d_in, classes)
                        .with_d_model(cfg.transformer_d_model)
                        .with_num_heads(cfg.transformer_heads)
                        .with_num_layers(cfg.transformer_layers)
                        .init(&self.device),
                )
            }
            other => bail!(
                "unknown model '{other}', expected one of: {}",
                MODEL_IDENTITIES.join(", ")
            ),
        };

        tracing::info!(
            "Built '{}' for {} {} features, {} classes ({} parameters)",
            identity, d_in, shape.modality, classes, model.parameter_count()
        );
        Ok(model)
    }
}

impl BurnModelFactory {
    fn wrap<M>(&self, identity: &str, num_classes: usize, module: M) -> Box<dyn Model>
    where
        M: AutodiffModule<TrainBackend> + SequenceClassifier<TrainBackend> + 'static,
        M::InnerModule: SequenceClassifier<InnerBackend>,
    {
        let optim = AdamConfig::new().with_epsilon(1e-8).init::<TrainBackend, M>();
        Box::new(BurnClassifier::new(identity, num_classes, module, optim, self.device.clone()))
    }
}
