// ============================================================
// Layer 2 — Run Configuration
// ============================================================
// One plain struct per command. The CLI layer fills them from
// clap arguments; `train` can additionally overlay a JSON file
// (`--config run.json`) whose keys replace the matching fields.
//
// TrainConfig is serialised to <saving_path>/config.json so that
// evaluation and generation rebuild exactly the trained model.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use thiserror::Error;

use crate::domain::corpus::DatasetKind;
use crate::ml::backend::ComputeDevice;

/// Hyper-parameter combinations that cannot produce a working run.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("`{0}` must be greater than zero")]
    Zero(&'static str),

    #[error("embedding_dim ({embedding_dim}) must be divisible by num_heads ({num_heads})")]
    HeadsDoNotDivide { embedding_dim: usize, num_heads: usize },

    #[error("`{name}` must lie in [0, 1), got {value}")]
    NotAProbability { name: &'static str, value: f64 },

    #[error("train_split must lie strictly between 0 and 1, got {0}")]
    TrainSplit(f64),

    #[error("temperature must be positive, got {0}")]
    Temperature(f64),
}

fn non_zero(name: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 { Err(ConfigError::Zero(name)) } else { Ok(()) }
}

// ─── prepare ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareConfig {
    /// Where the raw corpus lives; streams and tokenizer.json are
    /// written next to it.
    pub data_dir:      String,
    pub dataset:       DatasetKind,
    pub train_split:   f64,
    pub vocab_size:    usize,
    pub min_frequency: usize,
}

impl Default for PrepareConfig {
    fn default() -> Self {
        Self {
            data_dir:      "data".to_string(),
            dataset:       DatasetKind::Shakespeare,
            train_split:   0.8,
            vocab_size:    37_000,
            min_frequency: 2,
        }
    }
}

impl PrepareConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.train_split > 0.0 && self.train_split < 1.0) {
            return Err(ConfigError::TrainSplit(self.train_split));
        }
        non_zero("vocab_size", self.vocab_size)
    }
}

// ─── train ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrainConfig {
    // paths and runtime
    pub data_dir:      String,
    /// Checkpoints, config.json, metrics.csv and run.log go here.
    pub saving_path:   String,
    pub device:        ComputeDevice,
    pub seed_number:   Option<u64>,
    /// Train for `num_steps`; otherwise only evaluate `loading_path`.
    pub train:         bool,
    /// Checkpoint stem to resume from, e.g. `runs/best`.
    pub loading_path:  Option<String>,
    pub num_workers:   usize,

    // model
    pub embedding_dim:      usize,
    pub num_heads:          usize,
    pub num_decoder_layers: usize,
    pub dim_feedfwd:        usize,
    pub dropout_rate:       f64,
    pub block_size:         usize,
    /// Taken from the tokenizer when training starts.
    pub vocab_size:         usize,

    // optimisation
    pub batch_size:    usize,
    pub num_steps:     usize,
    pub warmup_steps:  usize,
    pub lr_multiplier: f64,
    pub beta_1:        f32,
    pub beta_2:        f32,
    pub eps:           f32,
    pub max_norm:      Option<f32>,
    /// Validate, log and checkpoint every this many steps.
    pub log_freq_loss: usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:      "data".to_string(),
            saving_path:   "runs".to_string(),
            device:        ComputeDevice::Gpu,
            seed_number:   None,
            train:         false,
            loading_path:  None,
            num_workers:   1,

            embedding_dim:      512,
            num_heads:          8,
            num_decoder_layers: 6,
            dim_feedfwd:        2048,
            dropout_rate:       0.0,
            block_size:         512,
            vocab_size:         37_000,

            batch_size:    1024,
            num_steps:     10,
            warmup_steps:  4000,
            lr_multiplier: 1.0,
            beta_1:        0.9,
            beta_2:        0.999,
            eps:           1e-8,
            max_norm:      None,
            log_freq_loss: 1,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        non_zero("embedding_dim", self.embedding_dim)?;
        non_zero("num_heads", self.num_heads)?;
        non_zero("num_decoder_layers", self.num_decoder_layers)?;
        non_zero("dim_feedfwd", self.dim_feedfwd)?;
        non_zero("block_size", self.block_size)?;
        non_zero("batch_size", self.batch_size)?;
        non_zero("log_freq_loss", self.log_freq_loss)?;
        non_zero("num_workers", self.num_workers)?;

        if self.embedding_dim % self.num_heads != 0 {
            return Err(ConfigError::HeadsDoNotDivide {
                embedding_dim: self.embedding_dim,
                num_heads:     self.num_heads,
            });
        }
        if !(0.0..1.0).contains(&self.dropout_rate) {
            return Err(ConfigError::NotAProbability {
                name:  "dropout_rate",
                value: self.dropout_rate,
            });
        }
        for (name, beta) in [("beta_1", self.beta_1), ("beta_2", self.beta_2)] {
            if !(0.0..1.0).contains(&beta) {
                return Err(ConfigError::NotAProbability { name, value: beta as f64 });
            }
        }
        Ok(())
    }

    /// Overlay the keys of a JSON object file onto this config.
    /// Keys absent from the file keep their current value; unknown
    /// keys are rejected.
    pub fn merge_json_file(self, path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file '{}'", path.display()))?;
        let overrides: serde_json::Value = serde_json::from_str(&text)
            .with_context(|| format!("'{}' is not valid JSON", path.display()))?;

        let serde_json::Value::Object(overrides) = overrides else {
            anyhow::bail!("Config file '{}' must contain a JSON object", path.display());
        };

        let mut merged = serde_json::to_value(&self)?;
        if let serde_json::Value::Object(fields) = &mut merged {
            for (key, value) in overrides {
                fields.insert(key, value);
            }
        }

        let cfg: Self = serde_json::from_value(merged)
            .with_context(|| format!("Invalid settings in '{}'", path.display()))?;
        tracing::info!("Config file '{}' found and loaded", path.display());
        Ok(cfg)
    }
}

// ─── generate ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateConfig {
    /// Directory of a finished training run (holds config.json).
    pub saving_path:    String,
    /// Checkpoint stem; defaults to the run's best checkpoint.
    pub checkpoint:     Option<String>,
    pub prompt:         String,
    pub max_new_tokens: usize,
    pub temperature:    f64,
    pub top_k:          Option<usize>,
    pub device:         ComputeDevice,
    pub seed_number:    Option<u64>,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            saving_path:    "runs".to_string(),
            checkpoint:     None,
            prompt:         String::new(),
            max_new_tokens: 100,
            temperature:    1.0,
            top_k:          None,
            device:         ComputeDevice::Gpu,
            seed_number:    None,
        }
    }
}

impl GenerateConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.temperature > 0.0) {
            return Err(ConfigError::Temperature(self.temperature));
        }
        if let Some(k) = self.top_k {
            non_zero("top_k", k)?;
        }
        Ok(())
    }
}
