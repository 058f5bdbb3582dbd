// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores training runs using Burn's CompactRecorder.
//
// What gets saved per checkpoint <name>:
//   1. <name>_model.mpk.gz   — model weights
//   2. <name>_optim.mpk.gz   — Adam moment estimates
//   3. <name>.json           — step (also the scheduler position), val loss
//
// Alongside the checkpoints:
//   config.json              — full training configuration, so the
//                              model can be rebuilt for evaluation
//                              and generation
//
// Directory layout (saving_path):
//   best_model.mpk.gz / best_optim.mpk.gz / best.json
//   transformer_cp_16p10p2026_14p05_model.mpk.gz ...   (final)
//   config.json
//   metrics.csv
//   run.log
//
// A checkpoint is addressed by its *stem*: the directory joined with
// <name>, e.g. `runs/best`.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    module::AutodiffModule,
    optim::Optimizer,
    prelude::*,
    record::{CompactRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::config::TrainConfig;

pub const BEST_CHECKPOINT: &str = "best";
const CONFIG_FILE: &str = "config.json";

/// Bookkeeping stored next to the weights of every checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingState {
    /// Optimizer steps completed when the checkpoint was taken
    pub step: usize,
    /// Validation loss at that step
    pub val_loss: f64,
}

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<name>`
    pub fn stem(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// File name used for the final checkpoint of a run, e.g.
    /// `transformer_cp_16p10p2026_14p05`.
    pub fn timestamped_name() -> String {
        format!("transformer_cp_{}", chrono::Local::now().format("%dp%mp%Y_%Hp%M"))
    }

    pub fn save_checkpoint<B, M, O>(
        &self,
        name:  &str,
        model: &M,
        optim: &O,
        state: TrainingState,
    ) -> Result<PathBuf>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let stem = self.stem(name);

        CompactRecorder::new()
            .record(model.clone().into_record(), model_path(&stem))
            .with_context(|| format!("Failed to save model weights to '{}'", stem.display()))?;
        CompactRecorder::new()
            .record(optim.to_record(), optim_path(&stem))
            .with_context(|| format!("Failed to save optimizer state to '{}'", stem.display()))?;

        fs::write(state_path(&stem), serde_json::to_string_pretty(&state)?)
            .with_context(|| format!("Failed to write training state for '{}'", stem.display()))?;

        tracing::debug!("Saved checkpoint '{}' at step {}", stem.display(), state.step);
        Ok(stem)
    }

    /// Restore weights only. `stem` may point anywhere, not just into
    /// this manager's directory.
    pub fn load_model<B: Backend, M: Module<B>>(
        stem:   &Path,
        model:  M,
        device: &B::Device,
    ) -> Result<M> {
        let record = CompactRecorder::new()
            .load(model_path(stem), device)
            .with_context(|| {
                format!(
                    "Cannot load model weights from '{}'. Have you trained the model first?",
                    stem.display()
                )
            })?;
        Ok(model.load_record(record))
    }

    /// Restore weights, optimizer state and bookkeeping for resuming.
    /// A missing optimizer record only logs a warning: the run resumes
    /// with fresh moment estimates.
    pub fn load_checkpoint<B, M, O>(
        stem:   &Path,
        model:  M,
        optim:  O,
        device: &B::Device,
    ) -> Result<(M, O, TrainingState)>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let model = Self::load_model(stem, model, device)?;

        let optim = match CompactRecorder::new().load(optim_path(stem), device) {
            Ok(record) => optim.load_record(record),
            Err(e) => {
                tracing::warn!("No optimizer state for '{}' ({}); starting fresh", stem.display(), e);
                optim
            }
        };

        let state = Self::load_state(stem)?;
        tracing::info!(
            "Resumed '{}' at step {} (val loss {:.4})",
            stem.display(),
            state.step,
            state.val_loss
        );
        Ok((model, optim, state))
    }

    pub fn load_state(stem: &Path) -> Result<TrainingState> {
        let path = state_path(stem);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read training state '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Must be written before training starts so evaluation and
    /// generation can rebuild the exact architecture.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. Make sure you have run 'train' first.",
                path.display()
            )
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// The recorder appends `.mpk.gz` itself.
fn model_path(stem: &Path) -> PathBuf {
    suffixed(stem, "_model")
}

fn optim_path(stem: &Path) -> PathBuf {
    suffixed(stem, "_optim")
}

fn state_path(stem: &Path) -> PathBuf {
    suffixed(stem, ".json")
}

fn suffixed(stem: &Path, suffix: &str) -> PathBuf {
    let mut s = stem.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::LanguageModelConfig;
    use burn::{
        backend::{Autodiff, NdArray},
        optim::AdamConfig,
    };

    type Ad = Autodiff<NdArray>;

    #[test]
    fn test_suffixed_paths() {
        let stem = Path::new("runs/best");
        assert_eq!(model_path(stem), PathBuf::from("runs/best_model"));
        assert_eq!(optim_path(stem), PathBuf::from("runs/best_optim"));
        assert_eq!(state_path(stem), PathBuf::from("runs/best.json"));
    }

    #[test]
    fn test_timestamped_name_has_no_dots() {
        let name = CheckpointManager::timestamped_name();
        assert!(name.starts_with("transformer_cp_"));
        assert!(!name.contains('.'));
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path()).unwrap();
        let cfg = TrainConfig { num_steps: 77, ..TrainConfig::default() };
        manager.save_config(&cfg).unwrap();
        assert_eq!(manager.load_config().unwrap().num_steps, 77);
    }

    #[test]
    fn test_load_config_before_training_fails() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path()).unwrap();
        assert!(manager.load_config().is_err());
    }

    #[test]
    fn test_checkpoint_round_trip_restores_weights_and_state() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path()).unwrap();
        let device = Default::default();
        let config = LanguageModelConfig::new(1, 8, 2, 10, 4).with_dim_feedfwd(16);

        let model = config.init::<Ad>(&device);
        let optim = AdamConfig::new().init::<Ad, crate::ml::model::LanguageModel<Ad>>();
        let state = TrainingState { step: 12, val_loss: 1.5 };
        let stem = manager.save_checkpoint(BEST_CHECKPOINT, &model, &optim, state).unwrap();

        let fresh = config.init::<Ad>(&device);
        let fresh_optim = AdamConfig::new().init::<Ad, crate::ml::model::LanguageModel<Ad>>();
        let (restored, _, restored_state) =
            CheckpointManager::load_checkpoint(&stem, fresh, fresh_optim, &device).unwrap();
        assert_eq!(restored_state, state);

        let tokens = Tensor::<Ad, 1, Int>::from_ints([1, 2, 3], &device).reshape([1, 3]);
        let expected = model.forward(tokens.clone()).into_data().convert::<f32>().to_vec::<f32>().unwrap();
        let actual = restored.forward(tokens).into_data().convert::<f32>().to_vec::<f32>().unwrap();
        for (a, e) in actual.iter().zip(&expected) {
            // CompactRecorder stores half precision
            assert!((a - e).abs() < 1e-2);
        }
    }
}
