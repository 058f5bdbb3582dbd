// ============================================================
// Layer 6 — Token Stream Store
// ============================================================
// `prepare` tokenises the corpus once and writes one JSON array
// of token ids per split:
//
//   <data_dir>/train.json
//   <data_dir>/val.json
//   <data_dir>/test.json
//
// `train` reads them back instead of re-tokenising every run.

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};

use crate::domain::corpus::Split;

pub struct StreamStore {
    dir: PathBuf,
}

impl StreamStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, split: Split) -> PathBuf {
        self.dir.join(format!("{}.json", split.name()))
    }

    pub fn save(&self, split: Split, tokens: &[u32]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;

        let path = self.path(split);
        fs::write(&path, serde_json::to_string(tokens)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;

        tracing::info!("Saved {} {} tokens to '{}'", tokens.len(), split, path.display());
        Ok(())
    }

    pub fn load(&self, split: Split) -> Result<Vec<u32>> {
        let path = self.path(split);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read '{}'. Run 'prepare' on this data directory first.",
                path.display()
            )
        })?;
        let tokens: Vec<u32> = serde_json::from_str(&json)
            .with_context(|| format!("'{}' is not a token id array", path.display()))?;

        tracing::debug!("Loaded {} {} tokens", tokens.len(), split);
        Ok(tokens)
    }

    /// True when every split has been written.
    pub fn is_prepared(&self) -> bool {
        Split::ALL.iter().all(|&s| self.path(s).exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = StreamStore::new(dir.path());
        assert!(!store.is_prepared());

        store.save(Split::Train, &[4, 5, 6]).unwrap();
        store.save(Split::Val, &[7]).unwrap();
        store.save(Split::Test, &[]).unwrap();

        assert!(store.is_prepared());
        assert_eq!(store.load(Split::Train).unwrap(), vec![4, 5, 6]);
        assert!(store.load(Split::Test).unwrap().is_empty());
    }

    #[test]
    fn test_missing_split_names_prepare() {
        let dir = tempfile::tempdir().unwrap();
        let err = StreamStore::new(dir.path()).load(Split::Val).unwrap_err();
        assert!(format!("{err:#}").contains("prepare"));
    }
}
