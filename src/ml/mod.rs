// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn model code lives here. The data layer only touches
// burn's Dataset / Batcher traits; everything with parameters,
// gradients or backends is in this layer.
//
//   attention.rs  — masks, scaled dot-product attention,
//                   multi-head attention (self and cross)
//   encoding.rs   — sinusoidal positional encoding
//   layers.rs     — feed-forward, encoder and decoder blocks
//   model.rs      — encoder–decoder Transformer and the
//                   decoder-only LanguageModel, tied embeddings
//   scheduler.rs  — Noam learning-rate schedule
//   backend.rs    — --device → concrete burn backend
//   trainer.rs    — step loop, evaluation, checkpointing
//   inferencer.rs — autoregressive sampling
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Vaswani et al. (2017) Attention Is All You Need

/// Attention masks and multi-head attention
pub mod attention;

/// Sinusoidal positional encoding
pub mod encoding;

/// Transformer blocks
pub mod layers;

/// Transformer and LanguageModel architectures
pub mod model;

/// Warm-up / inverse square-root learning rate
pub mod scheduler;

/// Runtime backend selection
pub mod backend;

/// Training loop with validation and checkpointing
pub mod trainer;

/// Text generation from a checkpoint
pub mod inferencer;
