// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands `split`, `train` and `compare`
// and all their configurable flags.
//
// Every tuning flag is optional. The effective value comes from,
// in order of precedence:
//   1. the flag on the command line
//   2. the JSON file given with --config
//   3. the built-in default (see application::config)
//
// Reference: Rust Book §12 (Building a CLI Program)

use anyhow::Result;
use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::config::{RunConfig, TrainConfig};
use crate::application::split_use_case::DataOptions;
use crate::domain::sample::Modality;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load landmark records and write the stratified split metadata
    Split(SplitArgs),

    /// Train one model and evaluate its best checkpoint
    Train(TrainArgs),

    /// Train several models on the same split and rank them
    Compare(CompareArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalityArg {
    /// First frame of each record, 63 features
    Flat,
    /// Every frame, padded per batch
    Sequence,
}

impl From<ModalityArg> for Modality {
    fn from(m: ModalityArg) -> Self {
        match m {
            ModalityArg::Flat     => Modality::Flat,
            ModalityArg::Sequence => Modality::Sequence,
        }
    }
}

/// Flags shared by every command: where data comes from and how it is split.
#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// Directory with one sub-directory of JSON records per class
    #[arg(long, default_value = "data/landmarks")]
    pub data_dir: PathBuf,

    /// Where metadata, metrics, checkpoints and reports are written
    #[arg(long, default_value = "output")]
    pub out_dir: PathBuf,

    /// JSON run configuration; flags given here override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Input representation [default: flat]
    #[arg(long, value_enum)]
    pub modality: Option<ModalityArg>,

    /// Keep only the letters a–z and the digits zero–nine
    #[arg(long)]
    pub standard_classes: bool,

    #[arg(long)]
    pub train_ratio: Option<f64>,

    #[arg(long)]
    pub val_ratio: Option<f64>,

    #[arg(long)]
    pub test_ratio: Option<f64>,

    /// Seed of the stratified split
    #[arg(long)]
    pub seed: Option<u64>,
}

impl DataArgs {
    /// The config file (or defaults) with the split flags applied.
    pub fn run_config(&self) -> Result<RunConfig> {
        let mut cfg = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None       => RunConfig::default(),
        };

        let ratios = &mut cfg.split.ratios;
        if let Some(r) = self.train_ratio { ratios.train = r; }
        if let Some(r) = self.val_ratio   { ratios.val = r; }
        if let Some(r) = self.test_ratio  { ratios.test = r; }
        if let Some(seed) = self.seed     { cfg.split.seed = seed; }

        let modality = self
            .modality
            .map(Modality::from)
            .or(cfg.modality)
            .unwrap_or(Modality::Flat);
        cfg.modality = Some(modality);
        Ok(cfg)
    }

    pub fn data_options(&self, cfg: &RunConfig) -> DataOptions {
        DataOptions {
            data_dir:         self.data_dir.clone(),
            modality:         cfg.modality.unwrap_or(Modality::Flat),
            standard_classes: self.standard_classes,
        }
    }
}

/// Training flags shared by `train` and `compare`.
#[derive(Args, Debug, Clone, Default)]
pub struct TrainingArgs {
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Upper bound on training epochs
    #[arg(long)]
    pub max_epochs: Option<usize>,

    /// Epochs without val_acc improvement before stopping
    #[arg(long)]
    pub patience: Option<usize>,

    /// Initial Adam learning rate
    #[arg(long)]
    pub lr: Option<f64>,

    /// Multiplier applied to the LR when val_acc plateaus
    #[arg(long)]
    pub lr_decay_factor: Option<f64>,

    /// Stagnant epochs tolerated before the LR is reduced
    #[arg(long)]
    pub lr_patience: Option<usize>,

    #[arg(long)]
    pub min_lr: Option<f64>,

    /// Stop as soon as val_acc reaches this fraction (e.g. 0.99)
    #[arg(long)]
    pub target_accuracy: Option<f64>,

    /// Keep the training split in store order every epoch
    #[arg(long)]
    pub no_shuffle: bool,

    /// Seed of the per-epoch shuffle
    #[arg(long)]
    pub train_seed: Option<u64>,
}

impl TrainingArgs {
    pub fn apply_to(&self, cfg: &mut TrainConfig) {
        if let Some(v) = self.batch_size      { cfg.batch_size = v; }
        if let Some(v) = self.max_epochs      { cfg.max_epochs = v; }
        if let Some(v) = self.patience        { cfg.patience = v; }
        if let Some(v) = self.lr              { cfg.lr = v; }
        if let Some(v) = self.lr_decay_factor { cfg.lr_decay_factor = v; }
        if let Some(v) = self.lr_patience     { cfg.lr_patience = v; }
        if let Some(v) = self.min_lr          { cfg.min_lr = v; }
        if let Some(v) = self.train_seed      { cfg.seed = v; }
        if self.target_accuracy.is_some() {
            cfg.target_accuracy = self.target_accuracy;
        }
        if self.no_shuffle {
            cfg.shuffle = false;
        }
    }
}

#[derive(Args, Debug)]
pub struct SplitArgs {
    #[command(flatten)]
    pub data: DataArgs,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub training: TrainingArgs,

    /// Model to train: mlp, gru or transformer
    #[arg(long, default_value = "mlp")]
    pub model: String,
}

#[derive(Args, Debug)]
pub struct CompareArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub training: TrainingArgs,

    /// Comma-separated models to compare, in run order
    #[arg(long, value_delimiter = ',', default_value = "mlp,gru,transformer")]
    pub models: Vec<String>,
}

/// Resolve the full configuration for a training command.
pub fn resolve(data: &DataArgs, training: &TrainingArgs) -> Result<(DataOptions, RunConfig)> {
    let mut cfg = data.run_config()?;
    training.apply_to(&mut cfg.train);
    cfg.validate()?;
    Ok((data.data_options(&cfg), cfg))
}
