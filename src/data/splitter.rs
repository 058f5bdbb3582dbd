// ============================================================
// Layer 4 — Train / Validation / Test Splitter
// ============================================================
// Splits one token stream into three contiguous pieces:
//
//   [ ─────── train ─────── | ── val ── | ── test ── ]
//        train_split             (1 - train_split) / 2 each
//
// The split is contiguous. Neighbouring windows share tokens, so
// shuffling before the split would leak validation text into the
// training set. Batch-level shuffling happens in the DataLoader.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSplit {
    pub train: Vec<u32>,
    pub val:   Vec<u32>,
    pub test:  Vec<u32>,
}

/// Split `tokens` by `train_fraction`; the remainder is halved into
/// validation and test (test takes the odd token).
pub fn split_stream(mut tokens: Vec<u32>, train_fraction: f64) -> StreamSplit {
    let total    = tokens.len();
    let fraction = train_fraction.clamp(0.0, 1.0);

    // Clamp to valid range to avoid panics on tiny streams
    let train_end = (((total as f64) * fraction).round() as usize).min(total);
    let val_end   = train_end + (total - train_end) / 2;

    let test  = tokens.split_off(val_end);
    let val   = tokens.split_off(train_end);
    let train = tokens;

    tracing::debug!(
        "Stream split: {} train, {} val, {} test tokens",
        train.len(),
        val.len(),
        test.len(),
    );

    StreamSplit { train, val, test }
}
