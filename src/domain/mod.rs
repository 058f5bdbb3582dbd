// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits that name the core concepts:
// documents, corpora, splits, and the seams other layers plug
// into.
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//   - Only plain structs, enums, and traits

// A loaded document from disk
pub mod document;

// Corpus kinds and data splits
pub mod corpus;

// Core abstractions (traits) that other layers implement
pub mod traits;
