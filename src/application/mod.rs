// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers, one use case per command:
//
//   prepare  → PrepareUseCase   corpus → token streams
//   train    → TrainUseCase     streams → checkpoints, accuracy
//   generate → GenerateUseCase  checkpoint → text
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// Per-command settings and their validation
pub mod config;

// Corpus preparation workflow
pub mod prepare_use_case;

// Training / evaluation workflow
pub mod train_use_case;

// Text generation workflow
pub mod generate_use_case;
