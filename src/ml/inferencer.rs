// ============================================================
// Layer 5 — Generator
// ============================================================
// Autoregressive sampling from a trained LanguageModel:
//
//   loop max_new_tokens times:
//       crop the context to the last block_size tokens
//       logits of the last position / temperature
//       keep the top_k largest (optional)
//       sample from the softmax
//       stop early on the stop token
//
// Runs on the inner (non-autodiff) backend.

use anyhow::{ensure, Context, Result};
use burn::prelude::*;
use rand::{distributions::WeightedIndex, prelude::Distribution, Rng};
use std::path::Path;

use crate::application::config::TrainConfig;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::{LanguageModel, LanguageModelConfig};

/// Knobs for one `generate` call.
#[derive(Debug, Clone, Copy)]
pub struct SamplingSettings {
    pub max_new_tokens: usize,
    pub temperature:    f64,
    pub top_k:          Option<usize>,
}

pub struct Generator<B: Backend> {
    model:  LanguageModel<B>,
    device: B::Device,
}

impl<B: Backend> Generator<B> {
    pub fn new(model: LanguageModel<B>, device: B::Device) -> Self {
        Self { model, device }
    }

    /// Rebuild the architecture recorded in `cfg` and load weights from
    /// the checkpoint stem. Dropout is disabled for sampling.
    pub fn from_checkpoint(cfg: &TrainConfig, stem: &Path, device: B::Device) -> Result<Self> {
        let model: LanguageModel<B> = LanguageModelConfig::new(
            cfg.num_decoder_layers,
            cfg.embedding_dim,
            cfg.num_heads,
            cfg.vocab_size,
            cfg.block_size,
        )
        .with_dim_feedfwd(cfg.dim_feedfwd)
        .init(&device);

        let model = CheckpointManager::load_model(stem, model, &device)?;
        tracing::info!("Model loaded from checkpoint '{}'", stem.display());
        Ok(Self::new(model, device))
    }

    pub fn block_size(&self) -> usize {
        self.model.block_size()
    }

    /// Continue `prompt` and return only the new token ids.
    pub fn generate<R: Rng>(
        &self,
        prompt:     &[u32],
        settings:   SamplingSettings,
        stop_token: Option<u32>,
        rng:        &mut R,
    ) -> Result<Vec<u32>> {
        ensure!(!prompt.is_empty(), "Generation needs at least one prompt token");

        let block_size = self.model.block_size();
        let mut context: Vec<u32> = prompt.to_vec();
        let mut generated = Vec::with_capacity(settings.max_new_tokens);

        for _ in 0..settings.max_new_tokens {
            let start  = context.len().saturating_sub(block_size);
            let window = &context[start..];
            let len    = window.len();

            let ids: Vec<i32> = window.iter().map(|&t| t as i32).collect();
            let tokens = Tensor::<B, 1, Int>::from_ints(ids.as_slice(), &self.device)
                .reshape([1, len]);

            let logits = self.model.forward(tokens);
            let [_, _, vocab_size] = logits.dims();
            let last: Vec<f32> = logits
                .slice([0..1, len - 1..len, 0..vocab_size])
                .into_data()
                .convert::<f32>()
                .to_vec::<f32>()
                .map_err(|e| anyhow::anyhow!("Cannot read logits: {e:?}"))?;

            let next = sample_token(&last, settings.temperature, settings.top_k, rng)? as u32;
            if Some(next) == stop_token {
                tracing::debug!("Stop token reached after {} tokens", generated.len());
                break;
            }
            context.push(next);
            generated.push(next);
        }

        Ok(generated)
    }
}

/// Draw one index from `softmax(logits / temperature)` restricted to the
/// `top_k` largest logits.
pub fn sample_token<R: Rng>(
    logits:      &[f32],
    temperature: f64,
    top_k:       Option<usize>,
    rng:         &mut R,
) -> Result<usize> {
    ensure!(!logits.is_empty(), "Cannot sample from empty logits");
    ensure!(temperature > 0.0, "Temperature must be positive, got {temperature}");

    let scaled: Vec<f64> = logits.iter().map(|&l| l as f64 / temperature).collect();

    // Everything below the k-th largest logit is dropped; ties at the
    // threshold stay in.
    let threshold = match top_k {
        Some(k) if k > 0 && k < scaled.len() => {
            let mut sorted = scaled.clone();
            sorted.sort_by(|a, b| b.total_cmp(a));
            sorted[k - 1]
        }
        _ => f64::NEG_INFINITY,
    };

    let max = scaled
        .iter()
        .copied()
        .filter(|&l| l >= threshold)
        .fold(f64::NEG_INFINITY, f64::max);

    let weights: Vec<f64> = scaled
        .iter()
        .map(|&l| if l >= threshold { (l - max).exp() } else { 0.0 })
        .collect();

    let dist = WeightedIndex::new(&weights).context("Logits give no valid distribution")?;
    Ok(dist.sample(rng))
}
