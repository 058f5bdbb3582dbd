// ============================================================
// Layer 5 — Transformer Models
// ============================================================
// Two models share the same building blocks:
//
//   Transformer     — the encoder–decoder of the paper. A shared
//                     token embedding feeds both stacks and its
//                     matrix doubles as the pre-softmax projection.
//
//   LanguageModel   — decoder-only stack trained by the CLI for
//                     next-token prediction on a text corpus.
//
// Every stack holds independent blocks: layer i and layer j never
// share weights.
//
// Reference: Vaswani et al. (2017) Sec. 3.1, 3.4
//            Burn Book §3 (Building Blocks)

use burn::{
    nn::{Dropout, DropoutConfig, Embedding, EmbeddingConfig},
    prelude::*,
    tensor::activation::log_softmax,
};

use crate::ml::attention::{
    combine_masks, padding_mask, subsequent_mask, AttentionMask,
};
use crate::ml::encoding::PositionalEncoding;
use crate::ml::layers::{BlockConfig, DecoderBlock, EncoderBlock, Memory};

/// Mean next-token cross-entropy over `[N, S, V]` logits and `[N, S]`
/// targets. Positions holding `pad_token_id` are left out of both the
/// sum and the count, so padding never dilutes the loss.
pub fn sequence_cross_entropy<B: Backend>(
    logits:       Tensor<B, 3>,
    targets:      Tensor<B, 2, Int>,
    pad_token_id: usize,
) -> Tensor<B, 1> {
    let [batch_size, seq_len, vocab_size] = logits.dims();
    let positions = batch_size * seq_len;

    let targets = targets.reshape([positions]);
    let log_probs = log_softmax(logits.reshape([positions, vocab_size]), 1);
    let picked: Tensor<B, 1> = log_probs
        .gather(1, targets.clone().reshape([positions, 1]))
        .reshape([positions]);

    let keep = targets.equal_elem(pad_token_id as i64).bool_not().float();
    let count = keep.clone().sum().clamp_min(1.0);
    picked.mul(keep).sum().neg().div(count)
}

// ─── Shared embedding ─────────────────────────────────────────────────────────

/// Token embedding scaled by √d_model plus positional encoding, with
/// the transposed embedding matrix reused as the output projection.
#[derive(Module, Debug)]
pub struct TiedEmbedding<B: Backend> {
    embedding:      Embedding<B>,
    dropout:        Dropout,
    embed_dim:      usize,
    max_seq_length: usize,
}

impl<B: Backend> TiedEmbedding<B> {
    fn new(
        vocab_size:     usize,
        embed_dim:      usize,
        max_seq_length: usize,
        dropout:        f64,
        device:         &B::Device,
    ) -> Self {
        Self {
            embedding: EmbeddingConfig::new(vocab_size, embed_dim).init(device),
            dropout:   DropoutConfig::new(dropout).init(),
            embed_dim,
            max_seq_length,
        }
    }

    /// `[N, S]` token ids → `[N, S, E]`
    pub fn embed(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let x = self
            .embedding
            .forward(tokens)
            .mul_scalar((self.embed_dim as f64).sqrt());
        let x = PositionalEncoding::new(self.max_seq_length, self.embed_dim).forward(x);
        self.dropout.forward(x)
    }

    /// `[N, S, E]` → `[N, S, V]`
    pub fn project(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let [batch_size, seq_len, embed_dim] = x.dims();
        let weight = self.embedding.weight.val(); // [V, E]
        let vocab_size = weight.dims()[0];
        x.reshape([batch_size * seq_len, embed_dim])
            .matmul(weight.transpose())
            .reshape([batch_size, seq_len, vocab_size])
    }

    pub fn vocab_size(&self) -> usize {
        self.embedding.weight.val().dims()[0]
    }
}

// ─── Encoder / decoder stacks ─────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    blocks: Vec<EncoderBlock<B>>,
}

impl<B: Backend> Encoder<B> {
    pub fn forward(&self, mut x: Tensor<B, 3>, mask: Option<AttentionMask<B>>) -> Tensor<B, 3> {
        for block in &self.blocks {
            x = block.forward(x, mask.clone());
        }
        x
    }

    /// One `[N, H, S, S]` self-attention map per block, each taken on
    /// the input that block actually receives.
    pub fn attention_maps(
        &self,
        mut x: Tensor<B, 3>,
        mask:  Option<AttentionMask<B>>,
    ) -> Vec<Tensor<B, 4>> {
        let mut maps = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            let (out, weights) = block.forward_with_weights(x, mask.clone());
            maps.push(weights);
            x = out;
        }
        maps
    }

    pub fn num_layers(&self) -> usize {
        self.blocks.len()
    }
}

#[derive(Module, Debug)]
pub struct Decoder<B: Backend> {
    blocks: Vec<DecoderBlock<B>>,
}

impl<B: Backend> Decoder<B> {
    pub fn forward(
        &self,
        mut x:     Tensor<B, 3>,
        self_mask: Option<AttentionMask<B>>,
        memory:    Option<Memory<B>>,
    ) -> Tensor<B, 3> {
        for block in &self.blocks {
            x = block.forward(x, self_mask.clone(), memory.clone());
        }
        x
    }
}

// ─── Encoder–decoder Transformer ──────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct TransformerConfig {
    pub num_encoder_layers: usize,
    pub num_decoder_layers: usize,
    pub embedding_dim:      usize,
    pub num_heads:          usize,
    pub vocab_size:         usize,
    #[config(default = 10000)]
    pub seq_length:         usize,
    #[config(default = 2048)]
    pub dim_feedfwd:        usize,
    #[config(default = 0.0)]
    pub dropout_rate:       f64,
    #[config(default = false)]
    pub use_bias:           bool,
    #[config(default = 0)]
    pub pad_token_id:       usize,
}

impl TransformerConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Transformer<B> {
        let block = BlockConfig::new(self.embedding_dim, self.num_heads, self.dim_feedfwd)
            .with_dropout(self.dropout_rate)
            .with_use_bias(self.use_bias);

        Transformer {
            embedding: TiedEmbedding::new(
                self.vocab_size,
                self.embedding_dim,
                self.seq_length,
                self.dropout_rate,
                device,
            ),
            encoder: Encoder {
                blocks: (0..self.num_encoder_layers)
                    .map(|_| block.init_encoder(device))
                    .collect(),
            },
            decoder: Decoder {
                blocks: (0..self.num_decoder_layers)
                    .map(|_| block.init_decoder(true, device))
                    .collect(),
            },
            pad_token_id: self.pad_token_id,
        }
    }
}

#[derive(Module, Debug)]
pub struct Transformer<B: Backend> {
    embedding:    TiedEmbedding<B>,
    encoder:      Encoder<B>,
    decoder:      Decoder<B>,
    pad_token_id: usize,
}

impl<B: Backend> Transformer<B> {
    /// `source` `[N, S_s]` and decoder input `target` `[N, S_t]` →
    /// logits `[N, S_t, V]`.
    pub fn forward(&self, source: Tensor<B, 2, Int>, target: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let device = source.device();
        let [_, source_len] = source.dims();
        let [batch_size, target_len] = target.dims();

        let encoder_mask = padding_mask(source.clone(), self.pad_token_id, source_len);
        let memory_mask  = padding_mask(source.clone(), self.pad_token_id, target_len);

        let causal = subsequent_mask::<B>(target_len, &device)
            .unsqueeze::<3>()
            .expand([batch_size, target_len, target_len]);
        let target_mask = combine_masks(
            causal,
            padding_mask(target.clone(), self.pad_token_id, target_len),
        );

        let memory = self.encoder.forward(
            self.embedding.embed(source),
            Some(AttentionMask::Batched(encoder_mask)),
        );
        let x = self.decoder.forward(
            self.embedding.embed(target),
            Some(AttentionMask::Batched(target_mask)),
            Some(Memory {
                states: memory,
                mask:   Some(AttentionMask::Batched(memory_mask)),
            }),
        );
        self.embedding.project(x)
    }

    /// Teacher-forced loss. The decoder sees `target[:, :-1]` and is
    /// scored against `target[:, 1:]`, i.e. the target shifted right by
    /// one position.
    ///
    /// # Panics
    /// Panics if the target holds fewer than two tokens.
    pub fn forward_loss(
        &self,
        source: Tensor<B, 2, Int>,
        target: Tensor<B, 2, Int>,
    ) -> (Tensor<B, 1>, Tensor<B, 3>) {
        let [batch_size, target_len] = target.dims();
        assert!(target_len >= 2, "target must hold at least two tokens");

        let decoder_input = target.clone().slice([0..batch_size, 0..target_len - 1]);
        let labels        = target.slice([0..batch_size, 1..target_len]);

        let logits = self.forward(source, decoder_input);
        let loss   = sequence_cross_entropy(logits.clone(), labels, self.pad_token_id);
        (loss, logits)
    }

    /// Self-attention maps of every encoder block for `source`.
    pub fn encoder_attention_maps(&self, source: Tensor<B, 2, Int>) -> Vec<Tensor<B, 4>> {
        let [_, source_len] = source.dims();
        let mask = padding_mask(source.clone(), self.pad_token_id, source_len);
        self.encoder.attention_maps(
            self.embedding.embed(source),
            Some(AttentionMask::Batched(mask)),
        )
    }
}

// ─── Decoder-only language model ──────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct LanguageModelConfig {
    pub num_decoder_layers: usize,
    pub embedding_dim:      usize,
    pub num_heads:          usize,
    pub vocab_size:         usize,
    /// Maximum context length.
    pub block_size:         usize,
    #[config(default = 2048)]
    pub dim_feedfwd:        usize,
    #[config(default = 0.0)]
    pub dropout_rate:       f64,
    #[config(default = false)]
    pub use_bias:           bool,
    #[config(default = 0)]
    pub pad_token_id:       usize,
}

impl LanguageModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> LanguageModel<B> {
        let block = BlockConfig::new(self.embedding_dim, self.num_heads, self.dim_feedfwd)
            .with_dropout(self.dropout_rate)
            .with_use_bias(self.use_bias);

        LanguageModel {
            embedding: TiedEmbedding::new(
                self.vocab_size,
                self.embedding_dim,
                self.block_size,
                self.dropout_rate,
                device,
            ),
            decoder: Decoder {
                blocks: (0..self.num_decoder_layers)
                    .map(|_| block.init_decoder(false, device))
                    .collect(),
            },
            block_size:   self.block_size,
            pad_token_id: self.pad_token_id,
        }
    }
}

#[derive(Module, Debug)]
pub struct LanguageModel<B: Backend> {
    embedding:    TiedEmbedding<B>,
    decoder:      Decoder<B>,
    block_size:   usize,
    pad_token_id: usize,
}

impl<B: Backend> LanguageModel<B> {
    /// `[N, S]` tokens (S ≤ block_size) → next-token logits `[N, S, V]`.
    pub fn forward(&self, tokens: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [_, seq_len] = tokens.dims();
        let mask = AttentionMask::Square(subsequent_mask::<B>(seq_len, &tokens.device()));

        let x = self.embedding.embed(tokens);
        let x = self.decoder.forward(x, Some(mask), None);
        self.embedding.project(x)
    }

    pub fn forward_loss(
        &self,
        inputs:  Tensor<B, 2, Int>,
        targets: Tensor<B, 2, Int>,
    ) -> (Tensor<B, 1>, Tensor<B, 3>) {
        let logits = self.forward(inputs);
        let loss   = sequence_cross_entropy(logits.clone(), targets, self.pad_token_id);
        (loss, logits)
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn pad_token_id(&self) -> usize {
        self.pad_token_id
    }

    pub fn vocab_size(&self) -> usize {
        self.embedding.vocab_size()
    }

    /// Trainable parameters per top-level component, in forward order.
    /// The output projection is tied to the embedding and owns none.
    pub fn parameter_breakdown(&self) -> Vec<(String, usize)> {
        let mut rows = vec![("embedding".to_string(), self.embedding.num_params())];
        for (i, block) in self.decoder.blocks.iter().enumerate() {
            rows.push((format!("decoder.block_{i}"), block.num_params()));
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = NdArray;

    fn tokens(values: &[i32], shape: [usize; 2]) -> Tensor<TestBackend, 2, Int> {
        Tensor::<TestBackend, 1, Int>::from_ints(values, &Default::default()).reshape(shape)
    }

    fn small_lm() -> LanguageModelConfig {
        LanguageModelConfig::new(2, 8, 2, 12, 6).with_dim_feedfwd(16)
    }

    #[test]
    fn test_cross_entropy_ignores_pad_targets() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 3>::zeros([1, 2, 4], &device);

        // Uniform logits: every real target costs ln 4.
        let padded = sequence_cross_entropy(logits.clone(), tokens(&[2, 0], [1, 2]), 0);
        let padded = padded.into_scalar().elem::<f32>();
        assert!((padded - 4f32.ln()).abs() < 1e-5);

        let all_pad = sequence_cross_entropy(logits, tokens(&[0, 0], [1, 2]), 0);
        assert_eq!(all_pad.into_scalar().elem::<f32>(), 0.0);
    }

    #[test]
    fn test_cross_entropy_matches_log_softmax() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 1>::from_floats([2.0, 0.0, 0.0, 0.0], &device)
            .reshape([1, 1, 4]);
        let loss = sequence_cross_entropy(logits, tokens(&[0], [1, 1]), 3)
            .into_scalar()
            .elem::<f32>();
        let expected = -(2f32.exp() / (2f32.exp() + 3.0)).ln();
        assert!((loss - expected).abs() < 1e-5);
    }

    #[test]
    fn test_language_model_logit_shape() {
        let model = small_lm().init::<TestBackend>(&Default::default());
        let logits = model.forward(tokens(&[4, 5, 6, 7, 8, 9], [2, 3]));
        assert_eq!(logits.dims(), [2, 3, 12]);
    }

    #[test]
    fn test_language_model_is_causal() {
        // Changing a later token must not change earlier logits.
        let model = small_lm().init::<TestBackend>(&Default::default());
        let a = model.forward(tokens(&[4, 5, 6, 7], [1, 4]));
        let b = model.forward(tokens(&[4, 5, 6, 11], [1, 4]));

        let a = a.slice([0..1, 0..3, 0..12]).into_data().convert::<f32>().to_vec::<f32>().unwrap();
        let b = b.slice([0..1, 0..3, 0..12]).into_data().convert::<f32>().to_vec::<f32>().unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-4);
        }
    }

    #[test]
    fn test_parameter_breakdown_sums_to_total() {
        let model = small_lm().init::<TestBackend>(&Default::default());
        let rows = model.parameter_breakdown();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], ("embedding".to_string(), 12 * 8));
        let sum: usize = rows.iter().map(|(_, n)| n).sum();
        assert_eq!(sum, model.num_params());
    }

    #[test]
    fn test_language_model_loss_backpropagates() {
        type Ad = Autodiff<NdArray>;
        let device = Default::default();
        let model = small_lm().init::<Ad>(&device);
        let inputs = Tensor::<Ad, 1, Int>::from_ints([4, 5, 6, 7], &device).reshape([1, 4]);
        let targets = Tensor::<Ad, 1, Int>::from_ints([5, 6, 7, 8], &device).reshape([1, 4]);

        let (loss, _) = model.forward_loss(inputs, targets);
        let value = loss.clone().into_scalar().elem::<f32>();
        assert!(value.is_finite() && value > 0.0);

        let grads = loss.backward();
        let embedding_grad = model.embedding.embedding.weight.val().grad(&grads);
        assert!(embedding_grad.is_some());
    }

    #[test]
    fn test_transformer_forward_and_shifted_loss() {
        let config = TransformerConfig::new(2, 2, 8, 2, 10)
            .with_seq_length(16)
            .with_dim_feedfwd(16);
        let model = config.init::<TestBackend>(&Default::default());

        let source = tokens(&[4, 5, 6, 0, 7, 8, 9, 5], [2, 4]);
        let target = tokens(&[2, 4, 5, 3, 2, 6, 3, 0], [2, 4]);

        assert_eq!(model.forward(source.clone(), target.clone()).dims(), [2, 4, 10]);

        let (loss, logits) = model.forward_loss(source, target);
        assert_eq!(logits.dims(), [2, 3, 10]);
        assert!(loss.into_scalar().elem::<f32>().is_finite());
    }

    #[test]
    fn test_encoder_attention_maps_per_layer() {
        let config = TransformerConfig::new(3, 1, 8, 4, 10).with_dim_feedfwd(16);
        let model = config.init::<TestBackend>(&Default::default());
        let maps = model.encoder_attention_maps(tokens(&[4, 5, 6, 7, 8, 0], [2, 3]));
        assert_eq!(maps.len(), 3);
        for map in maps {
            assert_eq!(map.dims(), [2, 4, 3, 3]);
        }
    }

    #[test]
    fn test_encoder_blocks_are_independent() {
        let config = TransformerConfig::new(2, 1, 8, 2, 10).with_dim_feedfwd(16);
        let model = config.init::<TestBackend>(&Default::default());
        let block_params = model.encoder.blocks[0].num_params();
        assert_eq!(model.encoder.num_layers(), 2);
        assert_eq!(model.encoder.num_params(), 2 * block_params);
    }
}
