// ============================================================
// Layer 2 — PrepareUseCase
// ============================================================
// Turns a raw corpus into the token streams `train` consumes:
//
//   Step 1: Load the corpus              (Layer 4 - data)
//   Step 2: Clean the text               (Layer 4 - data)
//   Step 3: Build / load tokenizer       (Layer 6 - infra)
//   Step 4: Encode into one stream,
//           [EOS] after every document
//   Step 5: Contiguous train/val/test    (Layer 4 - data)
//   Step 6: Save the three streams       (Layer 6 - infra)

use anyhow::Result;
use tokenizers::Tokenizer;

use crate::application::config::PrepareConfig;
use crate::data::{
    loader::CorpusLoader,
    preprocessor::Preprocessor,
    splitter::{split_stream, StreamSplit},
};
use crate::domain::{corpus::Split, document::Document, traits::CorpusSource};
use crate::infra::{
    stream_store::StreamStore,
    tokenizer_store::{special_token_id, TokenizerStore, EOS_TOKEN},
};

/// Token counts of the prepared splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrepareReport {
    pub documents:  usize,
    pub vocab_size: usize,
    pub train:      usize,
    pub val:        usize,
    pub test:       usize,
}

pub struct PrepareUseCase {
    config: PrepareConfig,
}

impl PrepareUseCase {
    pub fn new(config: PrepareConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<PrepareReport> {
        let cfg = &self.config;
        cfg.validate()?;

        // ── Step 1: Load ──────────────────────────────────────────────────────
        tracing::info!("Loading {} corpus from '{}'", cfg.dataset, cfg.data_dir);
        let raw_docs = CorpusLoader::new(&cfg.data_dir, cfg.dataset).load_all()?;
        tracing::info!("Loaded {} documents", raw_docs.len());

        // ── Step 2: Clean ─────────────────────────────────────────────────────
        let docs = Preprocessor::new().clean_documents(&raw_docs);
        if docs.is_empty() {
            anyhow::bail!("Every document in '{}' is empty after cleaning", cfg.data_dir);
        }

        // ── Step 3: Tokenizer ─────────────────────────────────────────────────
        let texts: Vec<String> = docs.iter().map(|d| d.text.clone()).collect();
        let tokenizer = TokenizerStore::new(&cfg.data_dir)
            .load_or_build(&texts, cfg.vocab_size, cfg.min_frequency)?;

        // ── Step 4: Encode ────────────────────────────────────────────────────
        let stream = encode_documents(&tokenizer, &docs)?;
        tracing::info!("Corpus encoded into {} tokens", stream.len());

        // ── Step 5: Split ─────────────────────────────────────────────────────
        let StreamSplit { train, val, test } = split_stream(stream, cfg.train_split);

        // ── Step 6: Save ──────────────────────────────────────────────────────
        let store = StreamStore::new(&cfg.data_dir);
        store.save(Split::Train, &train)?;
        store.save(Split::Val, &val)?;
        store.save(Split::Test, &test)?;

        let report = PrepareReport {
            documents:  docs.len(),
            vocab_size: tokenizer.get_vocab_size(true),
            train:      train.len(),
            val:        val.len(),
            test:       test.len(),
        };
        tracing::info!(
            "Prepared {} train / {} val / {} test tokens (vocab {})",
            report.train,
            report.val,
            report.test,
            report.vocab_size,
        );
        Ok(report)
    }
}

/// Concatenate every document's ids, each followed by `[EOS]` so the
/// model learns where documents end.
pub fn encode_documents(tokenizer: &Tokenizer, docs: &[Document]) -> Result<Vec<u32>> {
    let eos = special_token_id(tokenizer, EOS_TOKEN)?;

    let mut stream = Vec::new();
    for doc in docs {
        let enc = tokenizer
            .encode(doc.text.as_str(), false)
            .map_err(|e| anyhow::anyhow!("Tokenisation error in '{}': {e}", doc.source))?;
        stream.extend_from_slice(enc.get_ids());
        stream.push(eos);
    }
    Ok(stream)
}
