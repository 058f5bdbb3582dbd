// ============================================================
// Layer 4 — Text Preprocessor
// ============================================================
// Normalises raw corpus text before tokenisation.
//
// Web-scraped and e-book text carries characters that would
// otherwise burn vocabulary slots on whitespace variants:
//   - non-breaking / zero-width spaces, byte-order marks
//   - Windows line endings
//   - stray control characters
//   - runs of spaces and long runs of blank lines
//
// Line breaks are kept. Speaker turns in the Shakespeare corpus
// and paragraph breaks in web text both live on them.

use crate::domain::document::Document;

/// Maximum consecutive newlines kept (one blank line).
const MAX_NEWLINES: usize = 2;

#[derive(Debug, Default, Clone, Copy)]
pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Clean every document in place order, dropping ones left empty.
    pub fn clean_documents(&self, docs: &[Document]) -> Vec<Document> {
        docs.iter()
            .map(|d| Document::new(d.source.clone(), self.clean(&d.text)))
            .filter(|d| !d.is_blank())
            .collect()
    }

    pub fn clean(&self, text: &str) -> String {
        let normalised: String = text
            .chars()
            .filter(|&c| c != '\r')
            .map(normalise_char)
            .collect();

        let lines: Vec<String> = normalised.lines().map(collapse_spaces).collect();
        let joined = lines.join("\n");

        let mut result = String::with_capacity(joined.len());
        let mut newlines = 0usize;
        for c in joined.chars() {
            if c == '\n' {
                newlines += 1;
                if newlines <= MAX_NEWLINES {
                    result.push(c);
                }
            } else {
                newlines = 0;
                result.push(c);
            }
        }

        result.trim().to_string()
    }
}

fn normalise_char(c: char) -> char {
    match c {
        '\t' | '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
        '\n' => '\n',
        c if c.is_control() => ' ',
        c => c,
    }
}

/// Collapse runs of spaces and trim the line.
fn collapse_spaces(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut last_space = false;
    for c in line.chars() {
        if c == ' ' {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(c);
            last_space = false;
        }
    }
    out.trim().to_string()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_multiple_spaces() {
        assert_eq!(Preprocessor::new().clean("to   be or\tnot"), "to be or not");
    }

    #[test]
    fn test_windows_line_endings_become_single_newlines() {
        assert_eq!(
            Preprocessor::new().clean("ROMEO:\r\nBut soft!\r\n"),
            "ROMEO:\nBut soft!"
        );
    }

    #[test]
    fn test_removes_control_and_invisible_chars() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("hello\x01world"), "hello world");
        assert_eq!(p.clean("\u{FEFF}hello\u{200B}world"), "hello world");
    }

    #[test]
    fn test_keeps_one_blank_line_at_most() {
        let out = Preprocessor::new().clean("act one\n\n\n\n\nact two");
        assert_eq!(out, "act one\n\nact two");
    }

    #[test]
    fn test_clean_documents_drops_blank_ones() {
        let docs = vec![
            Document::new("a.txt", "  words  here "),
            Document::new("b.txt", " \t \u{00A0} "),
        ];
        let cleaned = Preprocessor::new().clean_documents(&docs);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].text, "words here");
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(Preprocessor::new().clean(""), "");
    }
}
