// ============================================================
// Layer 3 — Document Domain Type
// ============================================================
// A single text document loaded from disk: where it came from
// and its full text before tokenisation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// File name, kept for traceability in logs
    pub source: String,

    /// Full text content
    pub text: String,
}

impl Document {
    /// Uses impl Into<String> so callers can pass &str or String.
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            text:   text.into(),
        }
    }

    /// True when the text holds nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}
