// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands `prepare`, `train` and
// `generate` and all their configurable flags. Defaults follow
// the base model of the paper where it applies.
//
// clap's derive macros generate --help, error messages for
// missing args and type conversion.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::config::{GenerateConfig, PrepareConfig, TrainConfig};
use crate::domain::corpus::DatasetKind;
use crate::ml::backend::ComputeDevice;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Clean and tokenise a corpus into train / val / test streams
    Prepare(PrepareArgs),

    /// Train the language model, or evaluate a checkpoint
    Train(TrainArgs),

    /// Sample a continuation of a prompt from a trained checkpoint
    Generate(GenerateArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetArg {
    Shakespeare,
    Openweb,
}

impl From<DatasetArg> for DatasetKind {
    fn from(d: DatasetArg) -> Self {
        match d {
            DatasetArg::Shakespeare => DatasetKind::Shakespeare,
            DatasetArg::Openweb     => DatasetKind::Openweb,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceArg {
    /// NdArray backend
    Cpu,
    /// WGPU backend
    Gpu,
}

impl From<DeviceArg> for ComputeDevice {
    fn from(d: DeviceArg) -> Self {
        match d {
            DeviceArg::Cpu => ComputeDevice::Cpu,
            DeviceArg::Gpu => ComputeDevice::Gpu,
        }
    }
}

// ─── prepare ─────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct PrepareArgs {
    /// Directory holding the corpus; streams and tokenizer are written here
    #[arg(long, default_value = "data")]
    pub data_dir: String,

    /// Corpus layout: `input.txt` (shakespeare) or `*.txt` (openweb)
    #[arg(long, value_enum, default_value_t = DatasetArg::Shakespeare)]
    pub dataset: DatasetArg,

    /// Portion of the token stream used for training
    #[arg(long, default_value_t = 0.8)]
    pub train_split: f64,

    /// Vocabulary size of the tokenizer, special tokens included
    #[arg(long, default_value_t = 37_000)]
    pub vocab_size: usize,

    /// Words seen fewer times map to [UNK]
    #[arg(long, default_value_t = 2)]
    pub min_frequency: usize,
}

impl From<PrepareArgs> for PrepareConfig {
    fn from(a: PrepareArgs) -> Self {
        PrepareConfig {
            data_dir:      a.data_dir,
            dataset:       a.dataset.into(),
            train_split:   a.train_split,
            vocab_size:    a.vocab_size,
            min_frequency: a.min_frequency,
        }
    }
}

// ─── train ───────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// JSON file whose keys override the flags below
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory written by `prepare`
    #[arg(long, default_value = "data")]
    pub data_dir: String,

    /// Saving path of checkpoints, metrics and logs
    #[arg(long, default_value = "runs")]
    pub saving_path: String,

    #[arg(long, value_enum, default_value_t = DeviceArg::Gpu)]
    pub device: DeviceArg,

    /// If specified, seeds weight init, shuffling and dropout
    #[arg(long)]
    pub seed_number: Option<u64>,

    /// Train for `num_steps` steps; without it only evaluate `loading_path`
    #[arg(long)]
    pub train: bool,

    /// Checkpoint stem to load, e.g. `runs/best`
    #[arg(long)]
    pub loading_path: Option<String>,

    /// Loader worker threads
    #[arg(long, default_value_t = 1)]
    pub num_workers: usize,

    /// Embedding dimensionality (d_model)
    #[arg(long, default_value_t = 512)]
    pub embedding_dim: usize,

    /// Heads of the multi-head attention; must divide embedding_dim
    #[arg(long, default_value_t = 8)]
    pub num_heads: usize,

    /// Number of stacked decoder blocks
    #[arg(long, default_value_t = 6)]
    pub num_decoder_layers: usize,

    /// Hidden dimension of the two-layer MLP in each block
    #[arg(long, default_value_t = 2048)]
    pub dim_feedfwd: usize,

    #[arg(long, default_value_t = 0.0)]
    pub dropout_rate: f64,

    /// Maximum context length for predictions
    #[arg(long, default_value_t = 512)]
    pub block_size: usize,

    /// Samples per Adam update
    #[arg(long, default_value_t = 1024)]
    pub batch_size: usize,

    /// Optimizer steps to run
    #[arg(long, default_value_t = 10)]
    pub num_steps: usize,

    /// Steps of linear learning-rate warm-up
    #[arg(long, default_value_t = 4000)]
    pub warmup_steps: usize,

    /// Factor applied to the scheduled learning rate
    #[arg(long, default_value_t = 1.0)]
    pub lr_multiplier: f64,

    #[arg(long, default_value_t = 0.9)]
    pub beta_1: f32,

    #[arg(long, default_value_t = 0.999)]
    pub beta_2: f32,

    #[arg(long, default_value_t = 1e-8)]
    pub eps: f32,

    /// Clip gradients to this global L2 norm
    #[arg(long)]
    pub max_norm: Option<f32>,

    /// Validate and log every this many steps
    #[arg(long, default_value_t = 1)]
    pub log_freq_loss: usize,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_dir:           a.data_dir,
            saving_path:        a.saving_path,
            device:             a.device.into(),
            seed_number:        a.seed_number,
            train:              a.train,
            loading_path:       a.loading_path,
            num_workers:        a.num_workers,
            embedding_dim:      a.embedding_dim,
            num_heads:          a.num_heads,
            num_decoder_layers: a.num_decoder_layers,
            dim_feedfwd:        a.dim_feedfwd,
            dropout_rate:       a.dropout_rate,
            block_size:         a.block_size,
            vocab_size:         TrainConfig::default().vocab_size,
            batch_size:         a.batch_size,
            num_steps:          a.num_steps,
            warmup_steps:       a.warmup_steps,
            lr_multiplier:      a.lr_multiplier,
            beta_1:             a.beta_1,
            beta_2:             a.beta_2,
            eps:                a.eps,
            max_norm:           a.max_norm,
            log_freq_loss:      a.log_freq_loss,
        }
    }
}

// ─── generate ────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Text to continue; empty starts from [SOS]
    #[arg(long, default_value = "")]
    pub prompt: String,

    /// Directory of the training run
    #[arg(long, default_value = "runs")]
    pub saving_path: String,

    /// Checkpoint stem; defaults to `<saving_path>/best`
    #[arg(long)]
    pub checkpoint: Option<String>,

    /// Maximum number of tokens to generate
    #[arg(long, default_value_t = 100)]
    pub max_new_tokens: usize,

    /// Softmax temperature; lower is more deterministic
    #[arg(long, default_value_t = 1.0)]
    pub temperature: f64,

    /// Sample only among the k most likely tokens
    #[arg(long)]
    pub top_k: Option<usize>,

    #[arg(long, value_enum, default_value_t = DeviceArg::Gpu)]
    pub device: DeviceArg,

    #[arg(long)]
    pub seed_number: Option<u64>,
}

impl From<GenerateArgs> for GenerateConfig {
    fn from(a: GenerateArgs) -> Self {
        GenerateConfig {
            saving_path:    a.saving_path,
            checkpoint:     a.checkpoint,
            prompt:         a.prompt,
            max_new_tokens: a.max_new_tokens,
            temperature:    a.temperature,
            top_k:          a.top_k,
            device:         a.device.into(),
            seed_number:    a.seed_number,
        }
    }
}
