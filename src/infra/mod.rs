// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by several layers:
//
//   checkpoint.rs      — model / optimizer records (CompactRecorder),
//                        training state and config.json
//
//   tokenizer_store.rs — builds or loads the word-level tokenizer.json
//
//   stream_store.rs    — train / val / test token id arrays written
//                        by `prepare`
//
//   metrics.rs         — metrics.csv, one row per validation round
//
//   param_table.rs     — parameter-count table logged before training
//
//   logging.rs         — tracing subscriber (console + run.log)
//
// Reference: Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Tokenizer building, saving, and loading
pub mod tokenizer_store;

/// Prepared token streams on disk
pub mod stream_store;

/// Training metrics CSV logger
pub mod metrics;

/// Parameter-count report
pub mod param_table;

/// Global tracing subscriber
pub mod logging;
