// ============================================================
// Layer 5 — Multi-Head Attention
// ============================================================
// Scaled dot-product attention and the multi-head wrapper from
// Vaswani et al. (2017), Sec. 3.2.
//
//   Attention(Q, K, V) = softmax(Q Kᵀ / √d_k) V
//
// Mask convention used everywhere in this crate:
//   true  → position is BLOCKED (never attended to)
//   false → position is visible
//
// Shapes (N = batch, H = heads, S = sequence, E = d_model):
//   input            [N, S, E]
//   per-head q/k/v   [N, H, S, E / H]
//   attention map    [N, H, S_q, S_k]
//
// Reference: http://arxiv.org/abs/1706.03762
//            Burn Book §3 (Building Blocks)

use burn::{
    nn::{Initializer, Linear, LinearConfig},
    prelude::*,
    tensor::activation::softmax,
};

/// Value written into blocked logits before the softmax. Finite in
/// half precision too, so fully padded rows stay NaN-free on f16.
const MASK_FILL_VALUE: f32 = -1.0e4;

/// Look-ahead mask for a square `(size, size)` attention map.
/// Entry `(i, j)` is `true` (blocked) when `j > i`.
pub fn subsequent_mask<B: Backend>(size: usize, device: &B::Device) -> Tensor<B, 2, Bool> {
    Tensor::<B, 2, Int>::ones([size, size], device)
        .triu(1)
        .bool()
}

/// Key padding mask: `[N, S]` tokens → `[N, query_len, S]`,
/// blocking every key position that holds `pad_token_id`.
pub fn padding_mask<B: Backend>(
    tokens:       Tensor<B, 2, Int>,
    pad_token_id: usize,
    query_len:    usize,
) -> Tensor<B, 3, Bool> {
    let [batch_size, key_len] = tokens.dims();
    tokens
        .equal_elem(pad_token_id as i64)
        .unsqueeze_dim::<3>(1)
        .expand([batch_size, query_len, key_len])
}

/// Union of two blocking masks of equal shape.
pub fn combine_masks<B: Backend>(
    a: Tensor<B, 3, Bool>,
    b: Tensor<B, 3, Bool>,
) -> Tensor<B, 3, Bool> {
    a.int().add(b.int()).greater_elem(0)
}

/// An attention mask in any of the shapes callers commonly hold.
///
/// * `Square`  — `(S_q, S_k)`, broadcast over batch and heads
/// * `Batched` — `(N, S_q, S_k)`, broadcast over heads
/// * `Full`    — `(N, H, S_q, S_k)`, used as is
#[derive(Debug, Clone)]
pub enum AttentionMask<B: Backend> {
    Square(Tensor<B, 2, Bool>),
    Batched(Tensor<B, 3, Bool>),
    Full(Tensor<B, 4, Bool>),
}

impl<B: Backend> AttentionMask<B> {
    /// Broadcast to `(N, H, S_q, S_k)`.
    pub fn expand(self, shape: [usize; 4]) -> Tensor<B, 4, Bool> {
        match self {
            Self::Square(mask)  => mask.unsqueeze::<4>().expand(shape),
            Self::Batched(mask) => mask.unsqueeze_dim::<4>(1).expand(shape),
            Self::Full(mask)    => mask.expand(shape),
        }
    }
}

/// Scaled dot-product attention over already split heads.
///
/// Returns the weighted values `[N, H, S_q, d_v]` and the attention
/// weights `[N, H, S_q, S_k]`.
pub fn scaled_dot_product_attention<B: Backend>(
    q:    Tensor<B, 4>,
    k:    Tensor<B, 4>,
    v:    Tensor<B, 4>,
    mask: Option<Tensor<B, 4, Bool>>,
) -> (Tensor<B, 4>, Tensor<B, 4>) {
    let d_k = q.dims()[3];
    debug_assert_eq!(d_k, k.dims()[3], "queries and keys must share d_k");
    debug_assert_eq!(k.dims()[2], v.dims()[2], "keys and values must share length");

    let mut logits = q
        .matmul(k.swap_dims(2, 3))
        .div_scalar((d_k as f64).sqrt());

    if let Some(mask) = mask {
        logits = logits.mask_fill(mask, MASK_FILL_VALUE);
    }

    let weights = softmax(logits, 3);
    (weights.clone().matmul(v), weights)
}

#[derive(Config, Debug)]
pub struct MultiHeadAttentionConfig {
    /// `d_model`
    pub embed_dim: usize,
    /// `h`
    pub num_heads: usize,
    #[config(default = false)]
    pub use_bias:  bool,
}

impl MultiHeadAttentionConfig {
    /// # Panics
    /// Panics if `embed_dim` is not divisible by `num_heads`; the paper
    /// fixes `d_model = h · d_k = h · d_v`.
    pub fn init<B: Backend>(&self, device: &B::Device) -> MultiHeadAttention<B> {
        assert!(
            self.num_heads > 0 && self.embed_dim % self.num_heads == 0,
            "embed_dim ({}) must be divisible by num_heads ({})",
            self.embed_dim,
            self.num_heads,
        );

        let initializer = Initializer::XavierUniform { gain: 1.0 };
        let qkv_proj = LinearConfig::new(self.embed_dim, 3 * self.embed_dim)
            .with_bias(self.use_bias)
            .with_initializer(initializer.clone())
            .init(device);
        let o_proj = LinearConfig::new(self.embed_dim, self.embed_dim)
            .with_bias(self.use_bias)
            .with_initializer(initializer)
            .init(device);

        MultiHeadAttention {
            qkv_proj,
            o_proj,
            embed_dim: self.embed_dim,
            num_heads: self.num_heads,
            head_dim:  self.embed_dim / self.num_heads,
        }
    }
}

/// Multi-head attention with all per-head Q/K/V matrices stacked into
/// one projection, followed by the output projection `W^O`.
#[derive(Module, Debug)]
pub struct MultiHeadAttention<B: Backend> {
    qkv_proj:  Linear<B>,
    o_proj:    Linear<B>,
    embed_dim: usize,
    num_heads: usize,
    head_dim:  usize,
}

impl<B: Backend> MultiHeadAttention<B> {
    /// Self-attention: `[N, S, E]` → `[N, S, E]`.
    pub fn forward(&self, x: Tensor<B, 3>, mask: Option<AttentionMask<B>>) -> Tensor<B, 3> {
        self.forward_with_weights(x, mask).0
    }

    /// Self-attention that also returns the `[N, H, S, S]` weights.
    pub fn forward_with_weights(
        &self,
        x:    Tensor<B, 3>,
        mask: Option<AttentionMask<B>>,
    ) -> (Tensor<B, 3>, Tensor<B, 4>) {
        let [batch_size, seq_len, e] = x.dims();
        let qkv = self.qkv_proj.forward(x); // [N, S, 3E]

        let q = qkv.clone().slice([0..batch_size, 0..seq_len, 0..e]);
        let k = qkv.clone().slice([0..batch_size, 0..seq_len, e..2 * e]);
        let v = qkv.slice([0..batch_size, 0..seq_len, 2 * e..3 * e]);

        self.attend(q, k, v, mask)
    }

    /// Cross-attention: queries from `x` `[N, S_q, E]`, keys and values
    /// from `memory` `[N, S_k, E]`.
    pub fn forward_cross(
        &self,
        x:      Tensor<B, 3>,
        memory: Tensor<B, 3>,
        mask:   Option<AttentionMask<B>>,
    ) -> (Tensor<B, 3>, Tensor<B, 4>) {
        let [batch_size, query_len, e] = x.dims();
        let [_, key_len, _] = memory.dims();

        let q = self
            .qkv_proj
            .forward(x)
            .slice([0..batch_size, 0..query_len, 0..e]);
        let kv = self.qkv_proj.forward(memory);
        let k = kv.clone().slice([0..batch_size, 0..key_len, e..2 * e]);
        let v = kv.slice([0..batch_size, 0..key_len, 2 * e..3 * e]);

        self.attend(q, k, v, mask)
    }

    pub fn num_heads(&self) -> usize {
        self.num_heads
    }

    fn attend(
        &self,
        q:    Tensor<B, 3>,
        k:    Tensor<B, 3>,
        v:    Tensor<B, 3>,
        mask: Option<AttentionMask<B>>,
    ) -> (Tensor<B, 3>, Tensor<B, 4>) {
        let q = self.split_heads(q);
        let k = self.split_heads(k);
        let v = self.split_heads(v);

        let [batch_size, heads, query_len, _] = q.dims();
        let key_len = k.dims()[2];
        let mask = mask.map(|m| m.expand([batch_size, heads, query_len, key_len]));

        let (values, weights) = scaled_dot_product_attention(q, k, v, mask);
        (self.o_proj.forward(self.merge_heads(values)), weights)
    }

    /// `[N, S, E]` → `[N, H, S, E / H]`
    fn split_heads(&self, x: Tensor<B, 3>) -> Tensor<B, 4> {
        let [batch_size, seq_len, _] = x.dims();
        x.reshape([batch_size, seq_len, self.num_heads, self.head_dim])
            .swap_dims(1, 2)
    }

    /// `[N, H, S, E / H]` → `[N, S, E]`
    fn merge_heads(&self, x: Tensor<B, 4>) -> Tensor<B, 3> {
        let [batch_size, _, seq_len, _] = x.dims();
        x.swap_dims(1, 2)
            .reshape([batch_size, seq_len, self.embed_dim])
    }
}
