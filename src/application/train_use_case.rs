// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a training (or evaluation-only) run in order:
//
//   Step 1: Load tokenizer + pad id        (Layer 6 - infra)
//   Step 2: Load prepared token streams    (Layer 6 - infra)
//   Step 3: Build Burn datasets/loaders    (Layer 4 - data)
//   Step 4: Build model, log param table   (Layer 5 - ml)
//   Step 5: Train + validate, or load the
//           checkpoint given by loading_path
//   Step 6: Reload the best checkpoint
//   Step 7: Accuracy on train and test     (Layer 5 - ml)
//
// The use case is generic over the burn backend; `execute`
// hands it to `dispatch`, which picks NdArray or Wgpu.
//
// Reference: Burn Book §5 (Training)

use anyhow::{Context, Result};
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use std::path::Path;

use crate::application::config::TrainConfig;
use crate::data::{batcher::LmBatcher, dataset::LmDataset};
use crate::domain::corpus::Split;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::MetricsLogger,
    param_table,
    stream_store::StreamStore,
    tokenizer_store::{special_token_id, TokenizerStore, PAD_TOKEN},
};
use crate::ml::{
    backend::{dispatch, seed_backend, BackendTask},
    model::{LanguageModel, LanguageModelConfig},
    trainer::{check_accuracy, train_and_validate, Evaluation, LmLoader, TrainingSummary},
};

/// Loader shuffle seed when no --seed-number is given.
const DEFAULT_SHUFFLE_SEED: u64 = 42;

#[derive(Debug, Clone)]
pub struct TrainReport {
    /// None for evaluation-only runs
    pub summary: Option<TrainingSummary>,
    pub train:   Evaluation,
    pub test:    Evaluation,
}

pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(self) -> Result<TrainReport> {
        self.config.validate()?;
        tracing::info!("{:?}", self.config);
        dispatch(self.config.device, self)
    }
}

impl BackendTask for TrainUseCase {
    type Output = TrainReport;

    fn run<B: AutodiffBackend>(self, device: B::Device) -> Result<TrainReport> {
        let mut cfg = self.config;
        seed_backend::<B>(cfg.seed_number);

        // ── Step 1: Tokenizer ─────────────────────────────────────────────────
        let tokenizer = TokenizerStore::new(&cfg.data_dir).load()?;
        let pad_token_id = special_token_id(&tokenizer, PAD_TOKEN)? as usize;
        cfg.vocab_size = tokenizer.get_vocab_size(true);

        // ── Step 2: Token streams ─────────────────────────────────────────────
        let store = StreamStore::new(&cfg.data_dir);
        let train_tokens = store.load(Split::Train)?;
        let val_tokens   = store.load(Split::Val)?;
        let test_tokens  = store.load(Split::Test)?;

        // ── Step 3: Datasets and loaders ──────────────────────────────────────
        let train_set = LmDataset::from_stream(&train_tokens, cfg.block_size);
        let val_set   = LmDataset::from_stream(&val_tokens, cfg.block_size);
        let test_set  = LmDataset::from_stream(&test_tokens, cfg.block_size);
        tracing::info!(
            "Pad token ID: {}\n# Train:val:test samples: {}:{}:{}\n# Train:val:test tokens: {}:{}:{}",
            pad_token_id,
            train_set.sample_count(),
            val_set.sample_count(),
            test_set.sample_count(),
            train_tokens.len(),
            val_tokens.len(),
            test_tokens.len(),
        );

        let shuffle_seed = cfg.seed_number.unwrap_or(DEFAULT_SHUFFLE_SEED);
        let train_loader: LmLoader<B> = DataLoaderBuilder::new(LmBatcher::<B>::new(device.clone()))
            .batch_size(cfg.batch_size)
            .shuffle(shuffle_seed)
            .num_workers(cfg.num_workers)
            .build(train_set);
        let val_loader = inner_loader::<B>(val_set, &cfg, &device);
        let test_loader = inner_loader::<B>(test_set, &cfg, &device);

        // ── Step 4: Model ─────────────────────────────────────────────────────
        let model: LanguageModel<B> = LanguageModelConfig::new(
            cfg.num_decoder_layers,
            cfg.embedding_dim,
            cfg.num_heads,
            cfg.vocab_size,
            cfg.block_size,
        )
        .with_dim_feedfwd(cfg.dim_feedfwd)
        .with_dropout_rate(cfg.dropout_rate)
        .with_pad_token_id(pad_token_id)
        .init(&device);
        tracing::info!("\n{}", param_table::render(&model.parameter_breakdown()));

        // ── Step 5 + 6: Train and reload best, or load for evaluation ─────────
        let (model, summary) = if cfg.train {
            let checkpoints = CheckpointManager::new(&cfg.saving_path)?;
            checkpoints.save_config(&cfg)?;
            let metrics = MetricsLogger::new(checkpoints.dir())?;

            let (model, summary) = train_and_validate(
                &cfg,
                model,
                train_loader,
                val_loader,
                &checkpoints,
                &metrics,
                &device,
            )?;

            let model = match &summary.best_checkpoint {
                Some(stem) => {
                    tracing::info!("Reloading best checkpoint for final evaluation");
                    CheckpointManager::load_model(stem, model, &device)?
                }
                None => model,
            };
            (model, Some(summary))
        } else {
            let stem = cfg.loading_path.as_deref().context(
                "Evaluation-only runs need --loading-path; pass --train to train instead",
            )?;
            (CheckpointManager::load_model(Path::new(stem), model, &device)?, None)
        };

        // ── Step 7: Accuracy on train and test ────────────────────────────────
        let model = model.valid();
        let train_eval_set = LmDataset::from_stream(&train_tokens, cfg.block_size);
        let train = check_accuracy(
            &model,
            &inner_loader::<B>(train_eval_set, &cfg, &device),
            Split::Train,
        );
        let test = check_accuracy(&model, &test_loader, Split::Test);

        Ok(TrainReport { summary, train, test })
    }
}

/// Unshuffled loader on the inner backend for evaluation.
fn inner_loader<B: AutodiffBackend>(
    dataset: LmDataset,
    cfg:     &TrainConfig,
    device:  &B::Device,
) -> LmLoader<B::InnerBackend> {
    DataLoaderBuilder::new(LmBatcher::<B::InnerBackend>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .num_workers(cfg.num_workers)
        .build(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{config::PrepareConfig, prepare_use_case::PrepareUseCase};
    use crate::domain::corpus::DatasetKind;
    use crate::ml::backend::ComputeDevice;
    use std::fs;

    fn prepared_corpus(dir: &Path) {
        let text = "the cat sat on the mat . the dog sat on the log .\n".repeat(40);
        fs::write(dir.join("input.txt"), text).unwrap();
        PrepareUseCase::new(PrepareConfig {
            data_dir:      dir.display().to_string(),
            dataset:       DatasetKind::Shakespeare,
            train_split:   0.8,
            vocab_size:    50,
            min_frequency: 1,
        })
        .execute()
        .unwrap();
    }

    fn tiny(data: &Path, runs: &Path) -> TrainConfig {
        TrainConfig {
            data_dir:           data.display().to_string(),
            saving_path:        runs.display().to_string(),
            device:             ComputeDevice::Cpu,
            seed_number:        Some(7),
            train:              true,
            embedding_dim:      8,
            num_heads:          2,
            num_decoder_layers: 1,
            dim_feedfwd:        16,
            block_size:         8,
            batch_size:         4,
            num_steps:          4,
            warmup_steps:       2,
            log_freq_loss:      2,
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_train_then_evaluate_only() {
        let data = tempfile::tempdir().unwrap();
        let runs = tempfile::tempdir().unwrap();
        prepared_corpus(data.path());

        let cfg = tiny(data.path(), runs.path());
        let report = TrainUseCase::new(cfg.clone()).execute().unwrap();
        let summary = report.summary.unwrap();
        assert_eq!(summary.final_step, 4);
        assert!(report.test.tokens > 0);
        assert!(runs.path().join("config.json").exists());
        assert!(runs.path().join("metrics.csv").exists());

        // Saved config carries the tokenizer's real vocabulary size.
        let saved = CheckpointManager::new(runs.path()).unwrap().load_config().unwrap();
        assert_eq!(saved.vocab_size, TokenizerStore::new(data.path()).load().unwrap().get_vocab_size(true));

        let eval_only = TrainConfig {
            train:        false,
            loading_path: Some(summary.final_checkpoint.display().to_string()),
            ..cfg
        };
        let report = TrainUseCase::new(eval_only).execute().unwrap();
        assert!(report.summary.is_none());
        assert!(report.train.tokens > report.test.tokens);
    }

    #[test]
    fn test_evaluate_only_without_checkpoint_fails() {
        let data = tempfile::tempdir().unwrap();
        let runs = tempfile::tempdir().unwrap();
        prepared_corpus(data.path());

        let cfg = TrainConfig { train: false, ..tiny(data.path(), runs.path()) };
        assert!(TrainUseCase::new(cfg).execute().is_err());
    }

    #[test]
    fn test_unprepared_data_dir_fails() {
        let data = tempfile::tempdir().unwrap();
        let runs = tempfile::tempdir().unwrap();
        assert!(TrainUseCase::new(tiny(data.path(), runs.path())).execute().is_err());
    }
}
