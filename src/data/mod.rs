// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from raw text files to tensor batches.
//
//   input.txt / *.txt
//       │
//       ▼
//   CorpusLoader      → reads files into Documents
//       │
//       ▼
//   Preprocessor      → cleans text (whitespace, control chars)
//       │
//       ▼
//   Tokenizer         → words to token ids (Layer 6 builds it)
//       │
//       ▼
//   split_stream      → contiguous train / val / test streams
//       │
//       ▼
//   Windower          → block_size + 1 token windows
//       │
//       ▼
//   LmDataset         → implements Burn's Dataset trait
//       │
//       ▼
//   LmBatcher         → stacks samples into [N, S] tensors
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Loads text corpora from a directory
pub mod loader;

/// Cleans and normalises raw text
pub mod preprocessor;

/// Splits a token stream into train / val / test
pub mod splitter;

/// Cuts token streams into fixed-length windows
pub mod windower;

/// Implements Burn's Dataset trait for next-token samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
