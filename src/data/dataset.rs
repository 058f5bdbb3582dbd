use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::data::windower::Windower;

/// One next-token prediction sample.
/// `target_ids[i]` is the token that follows `input_ids[i]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmSample {
    pub input_ids:  Vec<u32>,
    pub target_ids: Vec<u32>,
}

impl LmSample {
    /// Split a `block_size + 1` window into input and shifted target.
    pub fn from_window(window: &[u32]) -> Self {
        let last = window.len().saturating_sub(1);
        Self {
            input_ids:  window[..last].to_vec(),
            target_ids: window[1..].to_vec(),
        }
    }

    /// Positions scored for this sample.
    pub fn num_targets(&self) -> usize {
        self.target_ids.len()
    }
}

pub struct LmDataset {
    samples: Vec<LmSample>,
}

impl LmDataset {
    /// Window a token stream into samples of context `block_size`.
    pub fn from_stream(tokens: &[u32], block_size: usize) -> Self {
        let samples = Windower::for_block_size(block_size)
            .windows(tokens)
            .into_iter()
            .map(LmSample::from_window)
            .collect();
        Self { samples }
    }

    pub fn sample_count(&self) -> usize { self.samples.len() }

    /// Total tokens scored across all samples.
    pub fn token_count(&self) -> usize {
        self.samples.iter().map(LmSample::num_targets).sum()
    }
}

impl Dataset<LmSample> for LmDataset {
    fn get(&self, index: usize) -> Option<LmSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
