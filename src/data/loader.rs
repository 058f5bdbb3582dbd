// ============================================================
// Layer 4 — Corpus Loader
// ============================================================
// Reads raw training text from a local directory.
//
// Two corpus layouts are understood:
//
//   shakespeare   <dir>/input.txt            — one file, the
//                                               "tiny shakespeare"
//                                               corpus
//   openweb       <dir>/*.txt                — one document per
//                                               file, loaded in
//                                               file-name order so
//                                               the token stream
//                                               (and its split) is
//                                               reproducible
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (Reading a File)

use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::corpus::DatasetKind;
use crate::domain::document::Document;
use crate::domain::traits::CorpusSource;

const SHAKESPEARE_FILE: &str = "input.txt";

/// Loads a text corpus from a directory.
/// Implements the CorpusSource trait from Layer 3.
pub struct CorpusLoader {
    dir:  PathBuf,
    kind: DatasetKind,
}

impl CorpusLoader {
    pub fn new(dir: impl Into<PathBuf>, kind: DatasetKind) -> Self {
        Self { dir: dir.into(), kind }
    }

    fn load_shakespeare(&self) -> Result<Vec<Document>> {
        let path = self.dir.join(SHAKESPEARE_FILE);
        Ok(vec![load_text_file(&path)?])
    }

    fn load_openweb(&self) -> Result<Vec<Document>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)
            .with_context(|| format!("Cannot read directory '{}'", self.dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("txt"))
            .collect();
        paths.sort();

        let mut docs = Vec::with_capacity(paths.len());
        for path in &paths {
            match load_text_file(path) {
                Ok(doc) => docs.push(doc),
                // Log a warning but continue — one unreadable file
                // should not sink a corpus of thousands
                Err(e) => tracing::warn!("Skipping '{}': {:#}", path.display(), e),
            }
        }
        Ok(docs)
    }
}

impl CorpusSource for CorpusLoader {
    fn load_all(&self) -> Result<Vec<Document>> {
        if !self.dir.is_dir() {
            bail!(
                "Corpus directory '{}' does not exist. Place the {} corpus there first.",
                self.dir.display(),
                self.kind,
            );
        }

        let docs = match self.kind {
            DatasetKind::Shakespeare => self.load_shakespeare()?,
            DatasetKind::Openweb     => self.load_openweb()?,
        };

        let docs: Vec<Document> = docs.into_iter().filter(|d| !d.is_blank()).collect();
        if docs.is_empty() {
            bail!("No text found for the {} corpus in '{}'", self.kind, self.dir.display());
        }

        tracing::info!(
            "Loaded {} document(s), {} characters",
            docs.len(),
            docs.iter().map(|d| d.text.len()).sum::<usize>(),
        );
        Ok(docs)
    }
}

fn load_text_file(path: &Path) -> Result<Document> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;

    let source = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    tracing::debug!("Loaded: {} ({} chars)", source, text.len());
    Ok(Document::new(source, text))
}
