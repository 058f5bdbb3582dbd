// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Builds, saves and loads the word-level tokenizer.
//
// The vocabulary is counted here and written straight into a
// HuggingFace `tokenizer.json`, then loaded back through the
// `tokenizers` crate. Going through the JSON keeps the file
// usable from any other HuggingFace tooling and sidesteps the
// trainer's generic model-wrapper types.
//
// Words are counted by a tokenizer holding only the special
// tokens, run through the same normalizer and pre-tokenizer the
// final file declares. Every counted word is therefore exactly a
// piece the encoder will look up.
//
// Reference: HuggingFace tokenizers JSON format

use anyhow::{Context, Result};
use std::{collections::HashMap, fs, path::PathBuf, str::FromStr};
use tokenizers::{
    NormalizedString, Normalizer, OffsetReferential, OffsetType, PreTokenizedString, PreTokenizer,
    Tokenizer,
};

pub const PAD_TOKEN: &str = "[PAD]";
pub const UNK_TOKEN: &str = "[UNK]";
pub const SOS_TOKEN: &str = "[SOS]";
pub const EOS_TOKEN: &str = "[EOS]";

/// Special tokens take the first ids, in this order.
pub const SPECIAL_TOKENS: [&str; 4] = [PAD_TOKEN, UNK_TOKEN, SOS_TOKEN, EOS_TOKEN];

const TOKENIZER_FILE: &str = "tokenizer.json";

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    /// Load existing tokenizer or build a new one from texts
    pub fn load_or_build(
        &self,
        texts:         &[String],
        vocab_size:    usize,
        min_frequency: usize,
    ) -> Result<Tokenizer> {
        if self.path().exists() {
            tracing::info!("Loading existing tokenizer from '{}'", self.path().display());
            self.load()
        } else {
            tracing::info!(
                "Building new tokenizer (vocab_size={}, min_frequency={})",
                vocab_size,
                min_frequency
            );
            self.build_and_save(texts, vocab_size, min_frequency)
        }
    }

    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.path();
        Tokenizer::from_file(&path).map_err(|e| {
            anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e)
        })
    }

    fn build_and_save(
        &self,
        texts:         &[String],
        vocab_size:    usize,
        min_frequency: usize,
    ) -> Result<Tokenizer> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let counter = Tokenizer::from_str(&tokenizer_json(&[]).to_string())
            .map_err(|e| anyhow::anyhow!("Cannot assemble counting tokenizer: {e}"))?;
        let words = select_vocabulary(count_words(&counter, texts)?, vocab_size, min_frequency);

        let tokenizer_json = tokenizer_json(&words);
        let size = SPECIAL_TOKENS.len() + words.len();

        let path = self.path();
        fs::write(&path, serde_json::to_string_pretty(&tokenizer_json)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;

        tracing::info!("Tokenizer built with {} entries, saved to '{}'", size, path.display());

        Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!("Cannot reload tokenizer: {e}"))
    }
}

/// `tokenizer.json` for a word-level model over the special tokens
/// followed by `words`.
fn tokenizer_json(words: &[String]) -> serde_json::Value {
    let mut vocab = serde_json::Map::new();
    for token in SPECIAL_TOKENS.iter().map(|t| t.to_string()).chain(words.iter().cloned()) {
        let id = vocab.len();
        vocab.entry(token).or_insert_with(|| serde_json::json!(id));
    }

    let added_tokens: Vec<serde_json::Value> = SPECIAL_TOKENS
        .iter()
        .enumerate()
        .map(|(id, token)| {
            serde_json::json!({
                "id": id,
                "content": token,
                "single_word": false,
                "lstrip": false,
                "rstrip": false,
                "normalized": false,
                "special": true
            })
        })
        .collect();

    serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": added_tokens,
        "normalizer": {
            "type": "BertNormalizer",
            "clean_text": true,
            "handle_chinese_chars": true,
            "strip_accents": null,
            "lowercase": true
        },
        "pre_tokenizer": {
            "type": "Whitespace"
        },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": vocab,
            "unk_token": UNK_TOKEN
        }
    })
}

/// Occurrences of every word `counter` would hand to its model.
fn count_words(counter: &Tokenizer, texts: &[String]) -> Result<HashMap<String, usize>> {
    let mut freq: HashMap<String, usize> = HashMap::new();
    for text in texts {
        let mut normalized = NormalizedString::from(text.as_str());
        if let Some(normalizer) = counter.get_normalizer() {
            normalizer
                .normalize(&mut normalized)
                .map_err(|e| anyhow::anyhow!("Normalization failed: {e}"))?;
        }
        let mut pieces = PreTokenizedString::from(normalized);
        if let Some(pre_tokenizer) = counter.get_pre_tokenizer() {
            pre_tokenizer
                .pre_tokenize(&mut pieces)
                .map_err(|e| anyhow::anyhow!("Pre-tokenization failed: {e}"))?;
        }
        for (word, _, _) in pieces.get_splits(OffsetReferential::Normalized, OffsetType::Byte) {
            *freq.entry(word.to_string()).or_insert(0) += 1;
        }
    }
    Ok(freq)
}

/// Look up a special token, failing loudly when the tokenizer file
/// was built without it.
pub fn special_token_id(tokenizer: &Tokenizer, token: &str) -> Result<u32> {
    tokenizer.token_to_id(token).with_context(|| {
        format!("Token '{token}' not found. Please rebuild the tokenizer.")
    })
}

/// Most frequent words (at least `min_frequency` occurrences), capped
/// so that words plus special tokens fit in `vocab_size`. Ties break
/// alphabetically so rebuilding gives identical ids.
pub fn select_vocabulary(
    freq:          HashMap<String, usize>,
    vocab_size:    usize,
    min_frequency: usize,
) -> Vec<String> {
    let mut words: Vec<(String, usize)> = freq
        .into_iter()
        .filter(|(_, n)| *n >= min_frequency.max(1))
        .collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    words.truncate(vocab_size.saturating_sub(SPECIAL_TOKENS.len()));

    words.into_iter().map(|(w, _)| w).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> Tokenizer {
        Tokenizer::from_str(&tokenizer_json(&[]).to_string()).unwrap()
    }

    fn vocabulary(texts: &[&str], vocab_size: usize, min_frequency: usize) -> Vec<String> {
        let texts: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        select_vocabulary(count_words(&counter(), &texts).unwrap(), vocab_size, min_frequency)
    }

    #[test]
    fn test_counting_splits_words_and_punctuation() {
        let freq = count_words(&counter(), &["What, ho! Romeo's".to_string()]).unwrap();
        let mut words: Vec<&str> = freq.keys().map(String::as_str).collect();
        words.sort();
        assert_eq!(words, vec!["!", "'", ",", "ho", "romeo", "s", "what"]);
    }

    #[test]
    fn test_vocabulary_respects_min_frequency_and_size() {
        let texts = ["a a a b b c", "A b d"];
        assert_eq!(vocabulary(&texts, 100, 2), vec!["a", "b"]);
        // 4 special tokens + 1 word
        assert_eq!(vocabulary(&texts, 5, 1), vec!["a"]);
    }

    #[test]
    fn test_vocabulary_ties_break_alphabetically() {
        assert_eq!(vocabulary(&["zeta alpha mid"], 100, 1), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_accented_and_cjk_words_are_encodable() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        let texts = vec!["café café naïve naïve 日本 日本".to_string()];

        let tokenizer = store.load_or_build(&texts, 50, 2).unwrap();
        let unk = tokenizer.token_to_id(UNK_TOKEN).unwrap();
        let ids = tokenizer.encode("Café naïve 日本", false).unwrap().get_ids().to_vec();

        // CJK characters are split one per piece.
        assert_eq!(ids.len(), 4);
        assert!(ids.iter().all(|&id| id != unk), "ids {ids:?}");
        assert_eq!(tokenizer.get_vocab_size(true), SPECIAL_TOKENS.len() + 4);
    }

    #[test]
    fn test_build_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenizerStore::new(dir.path());
        let texts = vec!["to be or not to be".to_string()];

        let tokenizer = store.load_or_build(&texts, 50, 1).unwrap();
        assert_eq!(special_token_id(&tokenizer, PAD_TOKEN).unwrap(), 0);
        assert_eq!(special_token_id(&tokenizer, EOS_TOKEN).unwrap(), 3);

        let ids = tokenizer.encode("To be, or", false).unwrap().get_ids().to_vec();
        let be = tokenizer.token_to_id("be").unwrap();
        let unk = tokenizer.token_to_id(UNK_TOKEN).unwrap();
        assert_eq!(ids.len(), 4);
        assert_eq!(ids[1], be);
        assert_eq!(ids[2], unk); // "," was never seen

        // Second call must load the file instead of rebuilding.
        let reloaded = store.load_or_build(&[], 50, 1).unwrap();
        assert_eq!(reloaded.get_vocab_size(true), tokenizer.get_vocab_size(true));
    }
}
