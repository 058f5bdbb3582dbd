// ============================================================
// Layer 4 — Token Windower
// ============================================================
// Cuts a long token stream into fixed-length training windows.
//
// A language-model sample of context length `block_size` needs
// `block_size + 1` tokens: the input is the first `block_size`
// and the target is the same window shifted left by one.
//
// Consecutive windows overlap by exactly one token, so every
// token of the stream (except the very first) is predicted once
// per epoch:
//
//   stream:    t0 t1 t2 t3 t4 t5 t6
//   block = 3
//   window 1:  t0 t1 t2 t3
//   window 2:           t3 t4 t5 t6
//
// The stride (step between windows) = window - overlap.
// A trailing partial window is dropped: every batch must hold
// sequences of identical length.

pub struct Windower {
    /// Tokens per window
    window: usize,
    /// Tokens shared between adjacent windows
    overlap: usize,
}

impl Windower {
    /// # Panics
    /// Panics if `overlap >= window`, which would give a zero stride.
    pub fn new(window: usize, overlap: usize) -> Self {
        assert!(
            overlap < window,
            "overlap ({}) must be less than window ({})",
            overlap,
            window
        );
        Self { window, overlap }
    }

    /// Windows for next-token prediction with context `block_size`.
    pub fn for_block_size(block_size: usize) -> Self {
        Self::new(block_size + 1, 1)
    }

    pub fn windows<'a>(&self, tokens: &'a [u32]) -> Vec<&'a [u32]> {
        let stride = self.window - self.overlap;
        let mut windows = Vec::with_capacity(self.num_windows(tokens.len()));
        let mut start = 0usize;

        while start + self.window <= tokens.len() {
            windows.push(&tokens[start..start + self.window]);
            start += stride;
        }

        windows
    }

    /// How many full windows a stream of `len` tokens yields.
    pub fn num_windows(&self, len: usize) -> usize {
        if len < self.window {
            return 0;
        }
        let stride = self.window - self.overlap;
        (len - self.window) / stride + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_windows_overlap_by_one() {
        let tokens: Vec<u32> = (0..7).collect();
        let w = Windower::for_block_size(3);
        let windows = w.windows(&tokens);
        assert_eq!(windows, vec![&[0, 1, 2, 3][..], &[3, 4, 5, 6][..]]);
    }

    #[test]
    fn test_partial_window_is_dropped() {
        let tokens: Vec<u32> = (0..9).collect();
        let windows = Windower::for_block_size(3).windows(&tokens);
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[1], &[3, 4, 5, 6]);
    }

    #[test]
    fn test_num_windows_matches_windows() {
        let w = Windower::new(5, 2);
        for len in 0..30 {
            let tokens: Vec<u32> = (0..len).collect();
            assert_eq!(w.windows(&tokens).len(), w.num_windows(len as usize));
        }
    }

    #[test]
    fn test_short_stream_gives_no_windows() {
        let windows = Windower::for_block_size(8).windows(&[1, 2, 3]);
        assert!(windows.is_empty());
    }

    #[test]
    #[should_panic]
    fn test_overlap_must_be_less_than_window() {
        let _ = Windower::new(4, 4);
    }
}
