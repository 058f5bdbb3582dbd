// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// Seams between the application layer and the concrete
// loaders / models. The application layer only sees these.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use crate::domain::document::Document;

// ─── CorpusSource ─────────────────────────────────────────────────────────────
/// Any component that can load the raw documents of a corpus.
///
/// Implementations:
///   - CorpusLoader → reads text files from a local directory
pub trait CorpusSource {
    /// Load every non-empty document, in a stable order.
    fn load_all(&self) -> Result<Vec<Document>>;
}

// ─── TextCompleter ────────────────────────────────────────────────────────────
/// Anything that continues a text prompt.
///
/// Implementations:
///   - GenerationSession → samples from a trained language model
pub trait TextCompleter {
    /// Return the prompt's continuation (without the prompt itself).
    fn complete(&mut self, prompt: &str) -> Result<String>;
}
