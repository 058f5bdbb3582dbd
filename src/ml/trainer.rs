// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Step-based train + validation loop using Burn's DataLoader and
// Adam with the Noam learning-rate schedule.
//
//   for each train batch (cycling over epochs) until num_steps:
//       forward → loss → backward → Adam step at scheduler.step()
//       every log_freq_loss steps:
//           evaluate the validation split on model.valid()
//           append a metrics.csv row
//           save `best` when the validation loss improved
//   save a timestamped final checkpoint
//
// Burn notes:
//   - Training runs on B (an AutodiffBackend)
//   - model.valid() returns the model on B::InnerBackend, so the
//     validation loader must batch on the inner backend as well
//   - argmax(2) keeps the reduced dim: [N, S, 1] → reshape to [N, S]
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam,
//            Vaswani et al. (2017) Sec. 5.3

use anyhow::{bail, Result};
use burn::{
    data::dataloader::DataLoader,
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::{path::{Path, PathBuf}, sync::Arc};

use crate::application::config::TrainConfig;
use crate::data::batcher::LmBatch;
use crate::domain::corpus::Split;
use crate::infra::{
    checkpoint::{CheckpointManager, TrainingState, BEST_CHECKPOINT},
    metrics::{MetricsLogger, StepMetrics},
};
use crate::ml::{model::LanguageModel, scheduler::NoamScheduler};

pub type LmLoader<B> = Arc<dyn DataLoader<LmBatch<B>>>;

/// Loss and next-token accuracy over one split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Token-weighted mean cross-entropy (NaN for an empty split)
    pub loss:     f64,
    /// Fraction of non-pad positions whose argmax is the target
    pub accuracy: f64,
    /// Non-pad target positions seen
    pub tokens:   usize,
}

#[derive(Debug, Clone)]
pub struct TrainingSummary {
    /// Total optimizer steps, including ones before a resume
    pub final_step:       usize,
    /// Lowest validation loss on record, including a resumed run's
    /// earlier `best`
    pub best:             Option<TrainingState>,
    pub best_checkpoint:  Option<PathBuf>,
    pub final_checkpoint: PathBuf,
}

/// Mean loss and accuracy of `model` over every batch of `loader`.
pub fn evaluate<B: Backend>(
    model:  &LanguageModel<B>,
    loader: &LmLoader<B>,
) -> Evaluation {
    let pad = model.pad_token_id();

    let mut loss_sum = 0.0f64;
    let mut correct  = 0usize;
    let mut tokens   = 0usize;

    for batch in loader.iter() {
        let [batch_size, seq_len] = batch.targets.dims();
        let (loss, logits) = model.forward_loss(batch.inputs, batch.targets.clone());

        let counted = batch.targets.clone()
            .equal_elem(pad as i64)
            .bool_not()
            .int();
        let batch_tokens: i64 = counted.clone().sum().into_scalar().elem::<i64>();

        let preds = logits.argmax(2).reshape([batch_size, seq_len]);
        let batch_correct: i64 = preds
            .equal(batch.targets)
            .int()
            .mul(counted)
            .sum()
            .into_scalar()
            .elem::<i64>();

        let batch_tokens = batch_tokens.max(0) as usize;
        loss_sum += loss.into_scalar().elem::<f64>() * batch_tokens as f64;
        correct  += batch_correct.max(0) as usize;
        tokens   += batch_tokens;
    }

    if tokens == 0 {
        return Evaluation { loss: f64::NAN, accuracy: 0.0, tokens: 0 };
    }
    Evaluation {
        loss:     loss_sum / tokens as f64,
        accuracy: correct as f64 / tokens as f64,
        tokens,
    }
}

/// Evaluate one split and log the result under its name.
pub fn check_accuracy<B: Backend>(
    model:  &LanguageModel<B>,
    loader: &LmLoader<B>,
    split:  Split,
) -> Evaluation {
    let eval = evaluate(model, loader);
    tracing::info!(
        "{} accuracy: {:.2}% over {} tokens (loss {:.4})",
        split,
        eval.accuracy * 100.0,
        eval.tokens,
        eval.loss,
    );
    eval
}

pub fn train_and_validate<B: AutodiffBackend>(
    cfg:          &TrainConfig,
    model:        LanguageModel<B>,
    train_loader: LmLoader<B>,
    val_loader:   LmLoader<B::InnerBackend>,
    checkpoints:  &CheckpointManager,
    metrics:      &MetricsLogger,
    device:       &B::Device,
) -> Result<(LanguageModel<B>, TrainingSummary)> {
    // ── Adam optimiser ────────────────────────────────────────────────────────
    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    let mut optim = AdamConfig::new()
        .with_beta_1(cfg.beta_1)
        .with_beta_2(cfg.beta_2)
        .with_epsilon(cfg.eps)
        .with_grad_clipping(cfg.max_norm.map(GradientClippingConfig::Norm))
        .init::<B, LanguageModel<B>>();
    let mut model = model;

    // ── Resume ────────────────────────────────────────────────────────────────
    let mut best: Option<TrainingState> = None;
    let mut best_checkpoint: Option<PathBuf> = None;
    let mut start_step = 0usize;

    if let Some(path) = &cfg.loading_path {
        let (m, o, state) =
            CheckpointManager::load_checkpoint(Path::new(path), model, optim, device)?;
        model = m;
        optim = o;
        start_step = state.step;

        // Compare against the run's own `best`, not the resumed checkpoint.
        let best_stem = checkpoints.stem(BEST_CHECKPOINT);
        if let Ok(previous) = CheckpointManager::load_state(&best_stem) {
            if previous.val_loss.is_finite() {
                tracing::info!(
                    "Best so far: val loss {:.4} at step {}",
                    previous.val_loss,
                    previous.step
                );
                best = Some(previous);
                best_checkpoint = Some(best_stem);
            }
        }
    }

    let mut scheduler =
        NoamScheduler::new(cfg.embedding_dim, cfg.warmup_steps, cfg.lr_multiplier)
            .resume(start_step);

    let end_step = start_step + cfg.num_steps;
    let mut step = start_step;
    let mut last_val_loss = f64::NAN;
    let mut window_loss = 0.0f64;
    let mut window_steps = 0usize;

    tracing::info!("Training from step {} to step {}", start_step, end_step);

    // ── Step loop (cycles over epochs) ────────────────────────────────────────
    'steps: while step < end_step {
        let mut epoch_batches = 0usize;

        for batch in train_loader.iter() {
            if step >= end_step {
                break 'steps;
            }
            epoch_batches += 1;

            let (loss, _) = model.forward_loss(batch.inputs, batch.targets);
            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
            if !loss_val.is_finite() {
                tracing::warn!("Non-finite training loss at step {}", step + 1);
            }

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            let lr = scheduler.step();
            model = optim.step(lr, model, grads);

            step += 1;
            window_loss += loss_val;
            window_steps += 1;
            tracing::debug!("step {} | loss={:.4} | lr={:.3e}", step, loss_val, lr);

            if step % cfg.log_freq_loss != 0 && step != end_step {
                continue;
            }

            // ── Validation round ──────────────────────────────────────────────
            let eval = evaluate(&model.valid(), &val_loader);
            let row = StepMetrics {
                step,
                train_loss:    window_loss / window_steps as f64,
                val_loss:      eval.loss,
                val_accuracy:  eval.accuracy,
                learning_rate: lr,
            };
            window_loss = 0.0;
            window_steps = 0;
            last_val_loss = eval.loss;

            tracing::info!(
                "Step {:>6}/{} | train_loss={:.4} | val_loss={:.4} | val_acc={:.2}% | lr={:.3e}",
                step,
                end_step,
                row.train_loss,
                row.val_loss,
                row.val_accuracy * 100.0,
                lr,
            );
            metrics.log(&row)?;

            let best_loss = best.map(|b| b.val_loss).unwrap_or(f64::INFINITY);
            if row.is_improvement(best_loss) {
                let state = TrainingState { step, val_loss: eval.loss };
                best_checkpoint = Some(
                    checkpoints.save_checkpoint(BEST_CHECKPOINT, &model, &optim, state)?,
                );
                best = Some(state);
                tracing::info!("New best validation loss {:.4} at step {}", eval.loss, step);
            }
        }

        if epoch_batches == 0 {
            bail!(
                "The training split yields no batches. Lower block_size/batch_size \
                 or prepare a larger corpus."
            );
        }
    }

    if best.is_none() {
        tracing::warn!("Validation produced no finite loss; no best checkpoint was saved");
    }

    // ── Final checkpoint ──────────────────────────────────────────────────────
    let final_checkpoint = checkpoints.save_checkpoint(
        &CheckpointManager::timestamped_name(),
        &model,
        &optim,
        TrainingState { step, val_loss: last_val_loss },
    )?;
    tracing::info!("Final checkpoint written to '{}'", final_checkpoint.display());

    Ok((
        model,
        TrainingSummary { final_step: step, best, best_checkpoint, final_checkpoint },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{batcher::LmBatcher, dataset::LmDataset};
    use crate::ml::{backend::ComputeDevice, model::LanguageModelConfig};
    use burn::{
        backend::{Autodiff, NdArray},
        data::dataloader::DataLoaderBuilder,
    };

    type Ad = Autodiff<NdArray>;

    const VOCAB: usize = 8;
    const BLOCK: usize = 4;

    /// Repeating pattern the model can learn quickly.
    fn stream(len: usize) -> Vec<u32> {
        (0..len).map(|i| 4 + (i % 3) as u32).collect()
    }

    fn loader<B: Backend>(tokens: &[u32], batch_size: usize) -> LmLoader<B> {
        DataLoaderBuilder::new(LmBatcher::<B>::new(Default::default()))
            .batch_size(batch_size)
            .build(LmDataset::from_stream(tokens, BLOCK))
    }

    fn tiny_config(saving_path: &Path) -> TrainConfig {
        TrainConfig {
            saving_path:        saving_path.display().to_string(),
            device:             ComputeDevice::Cpu,
            train:              true,
            embedding_dim:      8,
            num_heads:          2,
            num_decoder_layers: 1,
            dim_feedfwd:        16,
            block_size:         BLOCK,
            vocab_size:         VOCAB,
            batch_size:         2,
            num_steps:          6,
            warmup_steps:       2,
            log_freq_loss:      3,
            ..TrainConfig::default()
        }
    }

    fn tiny_model<B: Backend>(cfg: &TrainConfig) -> LanguageModel<B> {
        LanguageModelConfig::new(
            cfg.num_decoder_layers,
            cfg.embedding_dim,
            cfg.num_heads,
            cfg.vocab_size,
            cfg.block_size,
        )
        .with_dim_feedfwd(cfg.dim_feedfwd)
        .with_dropout_rate(cfg.dropout_rate)
        .init(&Default::default())
    }

    fn run(
        cfg:   &TrainConfig,
        model: LanguageModel<Ad>,
        train: LmLoader<Ad>,
    ) -> (LanguageModel<Ad>, TrainingSummary) {
        let dir = Path::new(&cfg.saving_path);
        train_and_validate::<Ad>(
            cfg,
            model,
            train,
            loader::<NdArray>(&stream(21), cfg.batch_size),
            &CheckpointManager::new(dir).unwrap(),
            &MetricsLogger::new(dir).unwrap(),
            &Default::default(),
        )
        .unwrap()
    }

    fn logits(model: &LanguageModel<NdArray>) -> Vec<f32> {
        let tokens = Tensor::<NdArray, 1, Int>::from_ints([4, 5, 6, 4], &Default::default())
            .reshape([1, 4]);
        model.forward(tokens).into_data().convert::<f32>().to_vec::<f32>().unwrap()
    }

    fn max_abs_diff(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, f32::max)
    }

    #[test]
    fn test_evaluate_counts_every_target() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = tiny_config(dir.path());
        let model = tiny_model::<NdArray>(&cfg);

        // 13 tokens → 3 windows of 5 → 3 samples × 4 targets
        let eval = evaluate(&model, &loader::<NdArray>(&stream(13), 2));
        assert_eq!(eval.tokens, 12);
        assert!(eval.loss.is_finite());
        assert!((0.0..=1.0).contains(&eval.accuracy));
    }

    #[test]
    fn test_evaluate_empty_split() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = tiny_config(dir.path());
        let model = tiny_model::<NdArray>(&cfg);

        let eval = evaluate(&model, &loader::<NdArray>(&stream(3), 2));
        assert_eq!(eval.tokens, 0);
        assert!(eval.loss.is_nan());
    }

    #[test]
    fn test_training_runs_requested_steps_and_checkpoints() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = tiny_config(dir.path());
        let device = Default::default();
        let checkpoints = CheckpointManager::new(dir.path()).unwrap();
        let metrics = MetricsLogger::new(dir.path()).unwrap();

        let (_, summary) = train_and_validate::<Ad>(
            &cfg,
            tiny_model(&cfg),
            loader::<Ad>(&stream(41), cfg.batch_size),
            loader::<NdArray>(&stream(21), cfg.batch_size),
            &checkpoints,
            &metrics,
            &device,
        )
        .unwrap();

        assert_eq!(summary.final_step, 6);
        let best = summary.best.unwrap();
        assert!(best.step == 3 || best.step == 6);
        assert!(summary.best_checkpoint.is_some());
        assert!(CheckpointManager::load_state(&summary.final_checkpoint).is_ok());

        // header + rounds at steps 3 and 6
        let csv = std::fs::read_to_string(metrics.csv_path()).unwrap();
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn test_resume_continues_step_count() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = tiny_config(dir.path());
        let device = Default::default();
        let checkpoints = CheckpointManager::new(dir.path()).unwrap();
        let metrics = MetricsLogger::new(dir.path()).unwrap();

        let (_, first) = train_and_validate::<Ad>(
            &cfg,
            tiny_model(&cfg),
            loader::<Ad>(&stream(41), cfg.batch_size),
            loader::<NdArray>(&stream(21), cfg.batch_size),
            &checkpoints,
            &metrics,
            &device,
        )
        .unwrap();

        cfg.loading_path = Some(first.final_checkpoint.display().to_string());
        cfg.num_steps = 3;
        let (_, second) = train_and_validate::<Ad>(
            &cfg,
            tiny_model(&cfg),
            loader::<Ad>(&stream(41), cfg.batch_size),
            loader::<NdArray>(&stream(21), cfg.batch_size),
            &checkpoints,
            &metrics,
            &device,
        )
        .unwrap();

        assert_eq!(second.final_step, 9);
    }

    #[test]
    fn test_resume_keeps_the_runs_best_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = tiny_config(dir.path());
        let (_, first) = run(&cfg, tiny_model(&cfg), loader::<Ad>(&stream(41), cfg.batch_size));

        // A best record no later round can beat.
        let record = TrainingState { step: 5, val_loss: 0.001 };
        std::fs::write(dir.path().join("best.json"), serde_json::to_string(&record).unwrap())
            .unwrap();

        cfg.loading_path = Some(first.final_checkpoint.display().to_string());
        cfg.num_steps = 2;
        cfg.log_freq_loss = 1;
        let (_, second) = run(&cfg, tiny_model(&cfg), loader::<Ad>(&stream(41), cfg.batch_size));

        let best_stem = dir.path().join(BEST_CHECKPOINT);
        assert_eq!(second.best, Some(record));
        assert_eq!(second.best_checkpoint, Some(best_stem.clone()));
        assert_eq!(CheckpointManager::load_state(&best_stem).unwrap(), record);
    }

    #[test]
    fn test_max_norm_clips_the_update() {
        let initial = tiny_model::<Ad>(&tiny_config(Path::new("unused")));
        let before = logits(&initial.valid());

        let step_once = |max_norm: Option<f32>| {
            let dir = tempfile::tempdir().unwrap();
            let cfg = TrainConfig {
                num_steps: 1,
                log_freq_loss: 1,
                max_norm,
                ..tiny_config(dir.path())
            };
            let (model, _) = run(&cfg, initial.clone(), loader::<Ad>(&stream(41), cfg.batch_size));
            logits(&model.valid())
        };

        // Adam normalises the step, so only a vanishing norm keeps it tiny.
        let clipped = step_once(Some(1e-12));
        let free = step_once(None);
        assert!(max_abs_diff(&before, &clipped) < 1e-2);
        assert!(max_abs_diff(&before, &free) > 1e-2);
    }

    #[test]
    fn test_same_shuffle_seed_gives_identical_weights() {
        let initial = tiny_model::<Ad>(&tiny_config(Path::new("unused")));

        let train_seeded = || {
            let dir = tempfile::tempdir().unwrap();
            let cfg = tiny_config(dir.path());
            let shuffled = DataLoaderBuilder::new(LmBatcher::<Ad>::new(Default::default()))
                .batch_size(cfg.batch_size)
                .shuffle(11)
                .build(LmDataset::from_stream(&stream(41), BLOCK));
            let (model, _) = run(&cfg, initial.clone(), shuffled);
            logits(&model.valid())
        };

        assert!(max_abs_diff(&train_seeded(), &train_seeded()) < 1e-6);
    }

    #[test]
    fn test_training_with_dropout() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = TrainConfig { dropout_rate: 0.5, ..tiny_config(dir.path()) };
        let (model, summary) =
            run(&cfg, tiny_model(&cfg), loader::<Ad>(&stream(41), cfg.batch_size));

        assert_eq!(summary.final_step, 6);
        assert!(summary.best.is_some_and(|b| b.val_loss.is_finite()));

        // Dropout is active while training and off for validation.
        let tokens = Tensor::<Ad, 1, Int>::from_ints([4, 5, 6, 4], &Default::default())
            .reshape([1, 4]);
        let a = model.forward(tokens.clone()).into_data().convert::<f32>().to_vec::<f32>().unwrap();
        let b = model.forward(tokens).into_data().convert::<f32>().to_vec::<f32>().unwrap();
        assert!(max_abs_diff(&a, &b) > 0.0);

        let inner = model.valid();
        assert_eq!(logits(&inner), logits(&inner));
    }

    #[test]
    fn test_empty_training_split_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = tiny_config(dir.path());
        let checkpoints = CheckpointManager::new(dir.path()).unwrap();
        let metrics = MetricsLogger::new(dir.path()).unwrap();

        let result = train_and_validate::<Ad>(
            &cfg,
            tiny_model(&cfg),
            loader::<Ad>(&stream(2), cfg.batch_size),
            loader::<NdArray>(&stream(21), cfg.batch_size),
            &checkpoints,
            &metrics,
            &Default::default(),
        );
        assert!(result.is_err());
    }
}
