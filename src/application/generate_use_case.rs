// ============================================================
// Layer 2 — Generate Use Case
// ============================================================
// Loads a finished run and continues a text prompt:
//
//   1. Read <saving_path>/config.json to rebuild the architecture
//   2. Load the tokenizer the run was trained with
//   3. Load weights (best checkpoint unless --checkpoint is given)
//   4. Encode prompt → sample → decode

use anyhow::Result;
use burn::{prelude::*, tensor::backend::AutodiffBackend};
use rand::{rngs::StdRng, SeedableRng};
use std::path::PathBuf;
use tokenizers::Tokenizer;

use crate::application::config::GenerateConfig;
use crate::domain::traits::TextCompleter;
use crate::infra::{
    checkpoint::{CheckpointManager, BEST_CHECKPOINT},
    tokenizer_store::{special_token_id, TokenizerStore, EOS_TOKEN, SOS_TOKEN},
};
use crate::ml::{
    backend::{dispatch, seed_backend, BackendTask},
    inferencer::{Generator, SamplingSettings},
};

/// A loaded model plus tokenizer, ready to complete prompts.
pub struct GenerationSession<B: Backend> {
    generator: Generator<B>,
    tokenizer: Tokenizer,
    settings:  SamplingSettings,
    rng:       StdRng,
    sos:       u32,
    eos:       u32,
}

impl<B: Backend> GenerationSession<B> {
    pub fn new(
        generator: Generator<B>,
        tokenizer: Tokenizer,
        settings:  SamplingSettings,
        seed:      Option<u64>,
    ) -> Result<Self> {
        let sos = special_token_id(&tokenizer, SOS_TOKEN)?;
        let eos = special_token_id(&tokenizer, EOS_TOKEN)?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self { generator, tokenizer, settings, rng, sos, eos })
    }

    /// Prompt ids; an empty prompt starts from `[SOS]`.
    fn encode_prompt(&self, prompt: &str) -> Result<Vec<u32>> {
        let ids = self
            .tokenizer
            .encode(prompt, false)
            .map_err(|e| anyhow::anyhow!("Prompt tokenisation error: {e}"))?
            .get_ids()
            .to_vec();
        Ok(if ids.is_empty() { vec![self.sos] } else { ids })
    }
}

impl<B: Backend> TextCompleter for GenerationSession<B> {
    fn complete(&mut self, prompt: &str) -> Result<String> {
        let prompt_ids = self.encode_prompt(prompt)?;
        if prompt_ids.len() > self.generator.block_size() {
            tracing::warn!(
                "Prompt has {} tokens; only the last {} are used as context",
                prompt_ids.len(),
                self.generator.block_size(),
            );
        }

        let new_ids = self.generator.generate(
            &prompt_ids,
            self.settings,
            Some(self.eos),
            &mut self.rng,
        )?;
        tracing::debug!("Generated {} tokens", new_ids.len());

        self.tokenizer
            .decode(&new_ids, true)
            .map_err(|e| anyhow::anyhow!("Decode error: {e}"))
    }
}

pub struct GenerateUseCase {
    config: GenerateConfig,
}

impl GenerateUseCase {
    pub fn new(config: GenerateConfig) -> Self {
        Self { config }
    }

    pub fn execute(self) -> Result<String> {
        self.config.validate()?;
        dispatch(self.config.device, self)
    }
}

impl BackendTask for GenerateUseCase {
    type Output = String;

    fn run<B: AutodiffBackend>(self, device: B::Device) -> Result<String> {
        let cfg = self.config;
        seed_backend::<B::InnerBackend>(cfg.seed_number);

        let checkpoints = CheckpointManager::new(&cfg.saving_path)?;
        let train_cfg = checkpoints.load_config()?;
        let tokenizer = TokenizerStore::new(&train_cfg.data_dir).load()?;

        let stem = cfg
            .checkpoint
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| checkpoints.stem(BEST_CHECKPOINT));
        let generator =
            Generator::<B::InnerBackend>::from_checkpoint(&train_cfg, &stem, device)?;

        let settings = SamplingSettings {
            max_new_tokens: cfg.max_new_tokens,
            temperature:    cfg.temperature,
            top_k:          cfg.top_k,
        };
        let mut session = GenerationSession::new(generator, tokenizer, settings, cfg.seed_number)?;
        session.complete(&cfg.prompt)
    }
}
