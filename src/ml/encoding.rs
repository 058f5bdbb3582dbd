// ============================================================
// Layer 5 — Sinusoidal Positional Encoding
// ============================================================
// Attention is permutation-invariant, so token order has to be
// injected into the embeddings explicitly (Sec. 3.5 of the paper):
//
//   PE(pos, 2i)   = sin(pos / 10000^(2i / d_model))
//   PE(pos, 2i+1) = cos(pos / 10000^(2i / d_model))
//
// The table has no learned parameters, so it is rebuilt for the
// current sequence length instead of being stored in a record.

use burn::prelude::*;

const BASE: f64 = 10_000.0;

/// Row-major `[seq_length, embed_dim]` encoding table.
pub fn sinusoidal_table(seq_length: usize, embed_dim: usize) -> Vec<f32> {
    let mut table = Vec::with_capacity(seq_length * embed_dim);
    for pos in 0..seq_length {
        for i in 0..embed_dim {
            let exponent = (2 * (i / 2)) as f64 / embed_dim as f64;
            let angle    = pos as f64 / BASE.powf(exponent);
            let value    = if i % 2 == 0 { angle.sin() } else { angle.cos() };
            table.push(value as f32);
        }
    }
    table
}

#[derive(Debug, Clone, Copy)]
pub struct PositionalEncoding {
    max_seq_length: usize,
    embed_dim:      usize,
}

impl PositionalEncoding {
    pub fn new(max_seq_length: usize, embed_dim: usize) -> Self {
        Self { max_seq_length, embed_dim }
    }

    /// Add the encoding to `[N, S, E]` embeddings.
    ///
    /// # Panics
    /// Panics if `S` exceeds `max_seq_length` or `E` differs from the
    /// configured embedding size.
    pub fn forward<B: Backend>(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch_size, seq_len, embed_dim] = x.dims();
        assert!(
            seq_len <= self.max_seq_length,
            "sequence length {} exceeds the maximum of {}",
            seq_len,
            self.max_seq_length,
        );
        assert_eq!(embed_dim, self.embed_dim, "embedding size mismatch");

        let table = Tensor::<B, 2>::from_data(
            TensorData::new(sinusoidal_table(seq_len, embed_dim), [seq_len, embed_dim]),
            &x.device(),
        );
        x + table.unsqueeze::<3>().expand([batch_size, seq_len, embed_dim])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_first_position_alternates_zero_and_one() {
        let table = sinusoidal_table(1, 6);
        assert_eq!(table, vec![0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_table_values_match_formula() {
        let d = 4;
        let table = sinusoidal_table(3, d);
        // pos = 2, i = 2 → sin(2 / 10000^(2/4)) = sin(0.02)
        let expected = (2.0f64 / 100.0).sin() as f32;
        assert!((table[2 * d + 2] - expected).abs() < 1e-6);
        // pos = 1, i = 1 → cos(1)
        assert!((table[d + 1] - 1.0f64.cos() as f32).abs() < 1e-6);
    }

    #[test]
    fn test_forward_adds_table_per_sample() {
        let device = Default::default();
        let x = Tensor::<NdArray, 3>::zeros([2, 3, 4], &device);
        let out = PositionalEncoding::new(8, 4).forward(x);
        let values = out.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        let table = sinusoidal_table(3, 4);
        assert_eq!(&values[..12], table.as_slice());
        assert_eq!(&values[12..], table.as_slice());
    }

    #[test]
    #[should_panic]
    fn test_rejects_sequences_longer_than_maximum() {
        let device = Default::default();
        let x = Tensor::<NdArray, 3>::zeros([1, 5, 4], &device);
        let _ = PositionalEncoding::new(4, 4).forward(x);
    }
}
