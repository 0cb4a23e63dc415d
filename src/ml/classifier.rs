use anyhow::{bail, Result};
use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{gelu, tanh},
};

use crate::data::batcher::PairBatch;
use crate::ml::metric::{acc, cross_entropy};
use crate::ml::objective::{Objective, StepOutput};
use crate::ml::ops::{PreEmbedding, PreEmbeddingConfig};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct PairwiseClassifierConfig {
    pub vocab_size:  usize,
    pub max_seq_len: usize,
    pub num_classes: usize,
    pub d_model:     usize,
    pub num_heads:   usize,
    pub num_layers:  usize,
    pub d_ff:        usize,
    #[config(default = 0.1)]
    pub dropout:     f64,
    #[config(default = 1)]
    pub padding_idx: usize,
    #[config(default = 2)]
    pub num_segments: usize,
    /// Only applies to a pretrained token embedding
    #[config(default = true)]
    pub freeze_embedding: bool,
}

impl PairwiseClassifierConfig {
    fn embedding_config(&self) -> PreEmbeddingConfig {
        PreEmbeddingConfig::new(self.vocab_size, self.d_model)
            .with_padding_idx(self.padding_idx)
            .with_freeze(self.freeze_embedding)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> PairwiseClassifier<B> {
        self.assemble(self.embedding_config().init(device), device)
    }

    /// Token embedding taken from a pretrained matrix, which must be
    /// `d_model` wide since it feeds the encoder directly.
    pub fn init_pretrained<B: Backend>(&self, matrix: &[Vec<f32>], device: &B::Device) -> Result<PairwiseClassifier<B>> {
        if let Some(width) = matrix.first().map(Vec::len).filter(|&w| w != self.d_model) {
            bail!("pretrained embedding width {} does not match d_model {}", width, self.d_model);
        }
        let token_embedding = self.embedding_config().init_pretrained(matrix, device)?;
        Ok(self.assemble(token_embedding, device))
    }

    fn assemble<B: Backend>(&self, token_embedding: PreEmbedding<B>, device: &B::Device) -> PairwiseClassifier<B> {
        let segment_embedding  = EmbeddingConfig::new(self.num_segments, self.d_model).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_seq_len, self.d_model).init(device);
        let layers: Vec<EncoderBlock<B>> = (0..self.num_layers)
            .map(|_| self.build_encoder_block(device))
            .collect();
        let embedding_norm = LayerNormConfig::new(self.d_model).init(device);
        let pooler         = LinearConfig::new(self.d_model, self.d_model).init(device);
        let classifier     = LinearConfig::new(self.d_model, self.num_classes).init(device);
        let dropout        = DropoutConfig::new(self.dropout).init();
        PairwiseClassifier {
            token_embedding, segment_embedding, position_embedding, layers,
            embedding_norm, pooler, classifier, dropout,
        }
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn   = MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
            .with_dropout(self.dropout)
            .init(device);
        let ffn_linear1 = LinearConfig::new(self.d_model, self.d_ff).init(device);
        let ffn_linear2 = LinearConfig::new(self.d_ff, self.d_model).init(device);
        let norm1   = LayerNormConfig::new(self.d_model).init(device);
        let norm2   = LayerNormConfig::new(self.d_model).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        EncoderBlock { self_attn, ffn_linear1, ffn_linear2, norm1, norm2, dropout }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    /// `pad_mask` is true at padding positions, which no token attends to.
    pub fn forward(&self, x: Tensor<B, 3>, pad_mask: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attn_input  = MhaInput::self_attn(x.clone()).mask_pad(pad_mask);
        let attn_output = self.self_attn.forward(attn_input).context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.ffn_linear2.forward(gelu(self.ffn_linear1.forward(x.clone())));
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

/// Transformer encoder over `[CLS] a [SEP] b [SEP]` with a classification
/// head on the pooled `[CLS]` state.
#[derive(Module, Debug)]
pub struct PairwiseClassifier<B: Backend> {
    pub token_embedding:    PreEmbedding<B>,
    pub segment_embedding:  Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub layers:             Vec<EncoderBlock<B>>,
    pub embedding_norm:     LayerNorm<B>,
    pub pooler:             Linear<B>,
    pub classifier:         Linear<B>,
    pub dropout:            Dropout,
}

impl<B: Backend> PairwiseClassifier<B> {
    /// token_ids, segment_ids: [batch, seq_len] → logits: [batch, num_classes]
    pub fn forward(&self, token_ids: Tensor<B, 2, Int>, segment_ids: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let [batch_size, seq_len] = token_ids.dims();
        let pad_mask = self.token_embedding.padding_mask(token_ids.clone());

        let tok_emb = self.token_embedding.forward(token_ids);
        let seg_emb = self.segment_embedding.forward(segment_ids);

        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &tok_emb.device())
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos_emb = self.position_embedding.forward(positions);

        let mut x = self.dropout.forward(self.embedding_norm.forward(tok_emb + seg_emb + pos_emb));
        for layer in &self.layers {
            x = layer.forward(x, pad_mask.clone());
        }
        let [_, _, d_model] = x.dims();

        // [CLS] sits at position 0
        let cls = x.slice([0..batch_size, 0..1, 0..d_model]).reshape([batch_size, d_model]);
        let pooled = tanh(self.pooler.forward(cls));
        self.classifier.forward(self.dropout.forward(pooled))
    }
}

impl<B: Backend> Objective<B, PairBatch<B>> for PairwiseClassifier<B> {
    fn objective(&self, batch: PairBatch<B>) -> Result<StepOutput<B>> {
        let logits = self.forward(batch.token_ids, batch.segment_ids);
        let loss   = cross_entropy(logits.clone(), batch.labels.clone());
        let tally  = acc(logits, batch.labels);
        Ok(StepOutput { loss, tally })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::metric::Tally;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn config() -> PairwiseClassifierConfig {
        PairwiseClassifierConfig::new(20, 8, 3, 16, 2, 1, 32)
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let model  = config().init::<TestBackend>(&device);
        let tokens   = Tensor::<TestBackend, 2, Int>::from_ints([[2, 5, 3, 6, 3, 1, 1, 1]], &device);
        let segments = Tensor::<TestBackend, 2, Int>::from_ints([[0, 0, 0, 1, 1, 0, 0, 0]], &device);
        assert_eq!(model.forward(tokens, segments).dims(), [1, 3]);
    }

    #[test]
    fn test_objective_counts_every_sample() {
        let device = Default::default();
        let model  = config().init::<TestBackend>(&device);
        let batch  = PairBatch {
            token_ids:   Tensor::<TestBackend, 2, Int>::from_ints([[2, 5, 3, 1], [2, 7, 3, 8]], &device),
            segment_ids: Tensor::<TestBackend, 2, Int>::from_ints([[0, 0, 0, 0], [0, 0, 0, 1]], &device),
            labels:      Tensor::<TestBackend, 1, Int>::from_ints([0, 2], &device),
        };
        let output = model.objective(batch).unwrap();
        assert_eq!(output.loss.dims(), [1]);
        assert!(matches!(output.tally, Tally::Accuracy { total: 2, .. }));
    }

    #[test]
    fn test_pretrained_embedding_is_used() {
        let device = Default::default();
        let matrix: Vec<Vec<f32>> = (0..20).map(|i| vec![i as f32; 16]).collect();
        let model = config().init_pretrained::<TestBackend>(&matrix, &device).unwrap();
        let weight: Vec<f32> = model.token_embedding.ops.weight.val().into_data().to_vec().unwrap();
        assert_eq!(weight[5 * 16], 5.0);
    }

    #[test]
    fn test_pretrained_width_must_match_d_model() {
        let device = Default::default();
        let matrix = vec![vec![0.0; 4]; 20];
        let err = config().init_pretrained::<TestBackend>(&matrix, &device).err().unwrap();
        assert!(err.to_string().contains("d_model 16"));
    }
}
