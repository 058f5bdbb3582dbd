// ============================================================
// Layer 4 — Language-Model Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<LmSample> into
// two Int tensors of shape [batch_size, block_size].
//
// All samples come from equal-length windows, so batching is a
// flatten-then-reshape:
//   [s1_t1, ..., s1_tS, s2_t1, ..., sN_tS] → [N, S]
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::LmSample;

#[derive(Debug, Clone)]
pub struct LmBatch<B: Backend> {
    /// Context tokens — shape: [batch_size, block_size]
    pub inputs: Tensor<B, 2, Int>,

    /// Next-token labels — shape: [batch_size, block_size]
    pub targets: Tensor<B, 2, Int>,
}

#[derive(Clone, Debug)]
pub struct LmBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> LmBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    fn stack(&self, rows: Vec<&[u32]>, seq_len: usize) -> Tensor<B, 2, Int> {
        let batch_size = rows.len();
        let flat: Vec<i32> = rows
            .into_iter()
            .flat_map(|row| row.iter().map(|&id| id as i32))
            .collect();

        Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &self.device)
            .reshape([batch_size, seq_len])
    }
}

impl<B: Backend> Batcher<LmSample, LmBatch<B>> for LmBatcher<B> {
    fn batch(&self, items: Vec<LmSample>) -> LmBatch<B> {
        // Windows are pre-cut to one length; the first sample fixes it.
        let seq_len = items.first().map(LmSample::num_targets).unwrap_or(0);

        let inputs = self.stack(
            items.iter().map(|s| s.input_ids.as_slice()).collect(),
            seq_len,
        );
        let targets = self.stack(
            items.iter().map(|s| s.target_ids.as_slice()).collect(),
            seq_len,
        );

        LmBatch { inputs, targets }
    }
}
