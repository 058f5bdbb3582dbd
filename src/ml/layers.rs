// ============================================================
// Layer 5 — Encoder / Decoder Blocks
// ============================================================
// Post-norm residual blocks as drawn in Figure 1 of the paper:
//
//   Encoder block:
//     x = LayerNorm(x + Dropout(SelfAttn(x)))
//     x = LayerNorm(x + Dropout(FFN(x)))
//
//   Decoder block:
//     x = LayerNorm(x + Dropout(MaskedSelfAttn(x)))
//     x = LayerNorm(x + Dropout(CrossAttn(x, memory)))   (enc-dec only)
//     x = LayerNorm(x + Dropout(FFN(x)))
//
// The decoder-only language model reuses DecoderBlock with the
// cross-attention sub-layer switched off.

use burn::{
    nn::{Dropout, DropoutConfig, LayerNorm, LayerNormConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::relu,
};

use crate::ml::attention::{AttentionMask, MultiHeadAttention, MultiHeadAttentionConfig};

// ─── Feed-forward ─────────────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct FeedForwardConfig {
    pub embed_dim:   usize,
    pub dim_feedfwd: usize,
    #[config(default = 0.0)]
    pub dropout:     f64,
}

impl FeedForwardConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> FeedForward<B> {
        FeedForward {
            linear_in:  LinearConfig::new(self.embed_dim, self.dim_feedfwd).init(device),
            linear_out: LinearConfig::new(self.dim_feedfwd, self.embed_dim).init(device),
            dropout:    DropoutConfig::new(self.dropout).init(),
        }
    }
}

/// Position-wise two-layer MLP, `FFN(x) = max(0, x W1 + b1) W2 + b2`.
#[derive(Module, Debug)]
pub struct FeedForward<B: Backend> {
    linear_in:  Linear<B>,
    linear_out: Linear<B>,
    dropout:    Dropout,
}

impl<B: Backend> FeedForward<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let hidden = self.dropout.forward(relu(self.linear_in.forward(x)));
        self.linear_out.forward(hidden)
    }
}

// ─── Block configuration ──────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct BlockConfig {
    pub embed_dim:   usize,
    pub num_heads:   usize,
    pub dim_feedfwd: usize,
    #[config(default = 0.0)]
    pub dropout:     f64,
    #[config(default = false)]
    pub use_bias:    bool,
}

impl BlockConfig {
    pub fn init_encoder<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        EncoderBlock {
            self_attn:    self.attention().init(device),
            feed_forward: self.feed_forward().init(device),
            norm_attn:    LayerNormConfig::new(self.embed_dim).init(device),
            norm_ff:      LayerNormConfig::new(self.embed_dim).init(device),
            dropout:      DropoutConfig::new(self.dropout).init(),
        }
    }

    /// `cross_attention = false` builds the block used by decoder-only
    /// models.
    pub fn init_decoder<B: Backend>(
        &self,
        cross_attention: bool,
        device:          &B::Device,
    ) -> DecoderBlock<B> {
        let (cross_attn, norm_cross) = if cross_attention {
            (
                Some(self.attention().init(device)),
                Some(LayerNormConfig::new(self.embed_dim).init(device)),
            )
        } else {
            (None, None)
        };

        DecoderBlock {
            self_attn:    self.attention().init(device),
            cross_attn,
            feed_forward: self.feed_forward().init(device),
            norm_self:    LayerNormConfig::new(self.embed_dim).init(device),
            norm_cross,
            norm_ff:      LayerNormConfig::new(self.embed_dim).init(device),
            dropout:      DropoutConfig::new(self.dropout).init(),
        }
    }

    fn attention(&self) -> MultiHeadAttentionConfig {
        MultiHeadAttentionConfig::new(self.embed_dim, self.num_heads)
            .with_use_bias(self.use_bias)
    }

    fn feed_forward(&self) -> FeedForwardConfig {
        FeedForwardConfig::new(self.embed_dim, self.dim_feedfwd)
            .with_dropout(self.dropout)
    }
}

// ─── Encoder block ────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    self_attn:    MultiHeadAttention<B>,
    feed_forward: FeedForward<B>,
    norm_attn:    LayerNorm<B>,
    norm_ff:      LayerNorm<B>,
    dropout:      Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 3>, mask: Option<AttentionMask<B>>) -> Tensor<B, 3> {
        self.forward_with_weights(x, mask).0
    }

    /// Block output plus the self-attention map `[N, H, S, S]`.
    pub fn forward_with_weights(
        &self,
        x:    Tensor<B, 3>,
        mask: Option<AttentionMask<B>>,
    ) -> (Tensor<B, 3>, Tensor<B, 4>) {
        let (attn, weights) = self.self_attn.forward_with_weights(x.clone(), mask);
        let x = self.norm_attn.forward(x + self.dropout.forward(attn));

        let ff = self.feed_forward.forward(x.clone());
        (self.norm_ff.forward(x + self.dropout.forward(ff)), weights)
    }
}

// ─── Decoder block ────────────────────────────────────────────────────────────

/// Encoder output handed to every decoder block, with the mask that
/// hides padded source positions from cross-attention.
#[derive(Debug, Clone)]
pub struct Memory<B: Backend> {
    pub states: Tensor<B, 3>,
    pub mask:   Option<AttentionMask<B>>,
}

#[derive(Module, Debug)]
pub struct DecoderBlock<B: Backend> {
    self_attn:    MultiHeadAttention<B>,
    cross_attn:   Option<MultiHeadAttention<B>>,
    feed_forward: FeedForward<B>,
    norm_self:    LayerNorm<B>,
    norm_cross:   Option<LayerNorm<B>>,
    norm_ff:      LayerNorm<B>,
    dropout:      Dropout,
}

impl<B: Backend> DecoderBlock<B> {
    /// The cross-attention sub-layer runs only when the block has one
    /// and `memory` is given.
    pub fn forward(
        &self,
        x:         Tensor<B, 3>,
        self_mask: Option<AttentionMask<B>>,
        memory:    Option<Memory<B>>,
    ) -> Tensor<B, 3> {
        let attn = self.self_attn.forward(x.clone(), self_mask);
        let mut x = self.norm_self.forward(x + self.dropout.forward(attn));

        if let (Some(cross_attn), Some(norm_cross), Some(memory)) =
            (&self.cross_attn, &self.norm_cross, memory)
        {
            let (attn, _) = cross_attn.forward_cross(x.clone(), memory.states, memory.mask);
            x = norm_cross.forward(x + self.dropout.forward(attn));
        }

        let ff = self.feed_forward.forward(x.clone());
        self.norm_ff.forward(x + self.dropout.forward(ff))
    }

    pub fn has_cross_attention(&self) -> bool {
        self.cross_attn.is_some()
    }
}
