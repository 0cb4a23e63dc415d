// ============================================================
// Layer 5 — Shared Building Blocks
// ============================================================
// Thin shape-adapting wrappers over Burn layers, reused by the
// three models:
//
//   PreEmbedding    — embedding lookup from a vocabulary's
//                     pretrained matrix (optionally frozen) or
//                     random with a zeroed padding row
//   BiLstmEncoder   — bidirectional LSTM over padded batches;
//                     either every hidden state (sequence mode)
//                     or one vector per sentence (feature mode)
//   log_sum_exp, masked_softmax, final_states, to_host — helpers
//
// Burn has no packed sequences. The forward LSTM only reaches
// padding after the real tokens, so it runs on the batch as is.
// The backward LSTM runs on each row reversed within its own
// length (padding stays at the end), then its outputs are
// reversed back. Either way a sentence encodes the same no
// matter how much padding its batch adds.

use anyhow::{anyhow, bail, Result};
use burn::{
    module::Param,
    nn::{Embedding, Lstm, LstmConfig},
    prelude::*,
    tensor::{activation::softmax, Distribution},
};

/// Copy a float tensor to the host, row-major.
pub fn to_host<B: Backend, const D: usize>(x: Tensor<B, D>) -> Result<Vec<f32>> {
    x.into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("cannot read tensor data: {e:?}"))
}

/// `log(sum(exp(x)))` along `dim`, keeping the dimension.
pub fn log_sum_exp<B: Backend, const D: usize>(x: Tensor<B, D>, dim: usize) -> Tensor<B, D> {
    let max = x.clone().max_dim(dim);
    max.clone() + (x - max).exp().sum_dim(dim).log()
}

/// Softmax over the last axis of `scores` [b, q, k] ignoring keys
/// where `key_mask` [b, k] is 0.
pub fn masked_softmax<B: Backend>(scores: Tensor<B, 3>, key_mask: Tensor<B, 2>) -> Tensor<B, 3> {
    let bias = key_mask.neg().add_scalar(1.0).mul_scalar(-1e4).unsqueeze_dim::<3>(1);
    softmax(scores + bias, 2)
}

/// One vector per sentence from bidirectional outputs [b, s, 2h]:
/// the forward half at the last real position concatenated with
/// the backward half at position 0.
pub fn final_states<B: Backend>(outputs: Tensor<B, 3>, lengths: &[usize]) -> Tensor<B, 2> {
    let [batch, seq, two_h] = outputs.dims();
    let hidden = two_h / 2;
    let device = outputs.device();

    let last: Vec<f32> = lengths
        .iter()
        .flat_map(|&len| (0..seq).map(move |i| if i + 1 == len.max(1) { 1.0 } else { 0.0 }))
        .collect();
    let last = Tensor::<B, 1>::from_floats(last.as_slice(), &device).reshape([batch, seq, 1]);

    let forward = (outputs.clone().slice([0..batch, 0..seq, 0..hidden]) * last)
        .sum_dim(1)
        .reshape([batch, hidden]);
    let backward = outputs
        .slice([0..batch, 0..1, hidden..two_h])
        .reshape([batch, hidden]);

    Tensor::cat(vec![forward, backward], 1)
}

// ─── PreEmbedding ─────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct PreEmbeddingConfig {
    pub num_embeddings: usize,
    pub embedding_dim:  usize,
    #[config(default = 1)]
    pub padding_idx:    usize,
    /// Only applies to pretrained weights; random weights always train
    #[config(default = true)]
    pub freeze:         bool,
}

impl PreEmbeddingConfig {
    /// Random N(0, 1) weights with the padding row set to zero.
    pub fn init<B: Backend>(&self, device: &B::Device) -> PreEmbedding<B> {
        let weight = Tensor::<B, 2>::random(
            [self.num_embeddings, self.embedding_dim],
            Distribution::Normal(0.0, 1.0),
            device,
        );
        let keep: Vec<f32> = (0..self.num_embeddings)
            .map(|i| if i == self.padding_idx { 0.0 } else { 1.0 })
            .collect();
        let keep = Tensor::<B, 1>::from_floats(keep.as_slice(), device)
            .reshape([self.num_embeddings, 1]);

        PreEmbedding {
            ops: Embedding { weight: Param::from_tensor(weight * keep) },
            padding_idx: self.padding_idx,
        }
    }

    /// Weights copied from a pretrained matrix (one row per index).
    pub fn init_pretrained<B: Backend>(
        &self,
        matrix: &[Vec<f32>],
        device: &B::Device,
    ) -> Result<PreEmbedding<B>> {
        if matrix.len() != self.num_embeddings
            || matrix.iter().any(|row| row.len() != self.embedding_dim)
        {
            bail!(
                "pretrained matrix must be {}x{}",
                self.num_embeddings,
                self.embedding_dim
            );
        }
        let flat: Vec<f32> = matrix.iter().flatten().copied().collect();
        let weight = Tensor::<B, 1>::from_floats(flat.as_slice(), device)
            .reshape([self.num_embeddings, self.embedding_dim]);

        let embedding = PreEmbedding {
            ops: Embedding { weight: Param::from_tensor(weight) },
            padding_idx: self.padding_idx,
        };
        Ok(if self.freeze { embedding.no_grad() } else { embedding })
    }
}

#[derive(Module, Debug)]
pub struct PreEmbedding<B: Backend> {
    pub ops:         Embedding<B>,
    pub padding_idx: usize,
}

impl<B: Backend> PreEmbedding<B> {
    /// [batch, seq] → [batch, seq, dim]
    pub fn forward(&self, x: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        self.ops.forward(x)
    }

    /// True where `x` holds the padding index.
    pub fn padding_mask(&self, x: Tensor<B, 2, Int>) -> Tensor<B, 2, Bool> {
        x.equal_elem(self.padding_idx as i32)
    }

    /// Number of non-padding tokens per row.
    pub fn lengths(&self, x: Tensor<B, 2, Int>) -> Tensor<B, 1, Int> {
        let [batch, _] = x.dims();
        self.padding_mask(x).bool_not().int().sum_dim(1).reshape([batch])
    }
}

// ─── BiLstmEncoder ────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct BiLstmEncoderConfig {
    pub d_input:  usize,
    pub d_hidden: usize,
}

impl BiLstmEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> BiLstmEncoder<B> {
        BiLstmEncoder {
            forward_lstm:  LstmConfig::new(self.d_input, self.d_hidden, true).init(device),
            backward_lstm: LstmConfig::new(self.d_input, self.d_hidden, true).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct BiLstmEncoder<B: Backend> {
    pub forward_lstm:  Lstm<B>,
    pub backward_lstm: Lstm<B>,
}

impl<B: Backend> BiLstmEncoder<B> {
    /// Every hidden state: [b, s, d_input] → [b, s, 2 * d_hidden],
    /// zero at padded positions. `mask` is [b, s] with 1.0 for a prefix
    /// of real tokens.
    pub fn forward_sequence(&self, x: Tensor<B, 3>, mask: Tensor<B, 2>) -> Tensor<B, 3> {
        let [batch, seq, d_input] = x.dims();
        let x = x * mask.clone().unsqueeze_dim::<3>(2);

        let (forward, _) = self.forward_lstm.forward(x.clone(), None);

        let reverse = reverse_index(mask.clone());
        let reversed = x.gather(1, reverse.clone().unsqueeze_dim::<3>(2).expand([batch, seq, d_input]));
        let (backward, _) = self.backward_lstm.forward(reversed, None);
        let [_, _, hidden] = backward.dims();
        let backward = backward.gather(1, reverse.unsqueeze_dim::<3>(2).expand([batch, seq, hidden]));

        Tensor::cat(vec![forward, backward], 2) * mask.unsqueeze_dim::<3>(2)
    }

    /// One vector per sentence: [b, s, d_input] → [b, 2 * d_hidden].
    pub fn forward_feature(&self, x: Tensor<B, 3>, mask: Tensor<B, 2>, lengths: &[usize]) -> Tensor<B, 2> {
        final_states(self.forward_sequence(x, mask), lengths)
    }
}

/// Per-row time index that reverses the real prefix of each row and
/// leaves padded positions in place: `len - 1 - t` for `t < len`, else `t`.
/// Applying it twice is the identity.
fn reverse_index<B: Backend>(mask: Tensor<B, 2>) -> Tensor<B, 2, Int> {
    let [batch, seq] = mask.dims();
    let device = mask.device();
    let lengths = mask.clone().sum_dim(1); // [b, 1]
    let steps = Tensor::<B, 1, Int>::arange(0..seq as i64, &device)
        .float()
        .unsqueeze::<2>()
        .expand([batch, seq]);

    let reversed = (lengths - steps.clone()).sub_scalar(1.0);
    let keep = mask.clone().neg().add_scalar(1.0);
    (mask * reversed + keep * steps).int()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn floats<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f32> {
        t.into_data().to_vec().unwrap()
    }

    #[test]
    fn test_log_sum_exp_matches_direct_formula() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 2>::from_floats([[1.0, 2.0, 3.0], [0.0, 0.0, 0.0]], &device);
        let out = floats(log_sum_exp(x, 1));
        let expected0 = (1f32.exp() + 2f32.exp() + 3f32.exp()).ln();
        assert!((out[0] - expected0).abs() < 1e-5);
        assert!((out[1] - 3f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_masked_softmax_ignores_padding() {
        let device = Default::default();
        let scores = Tensor::<TestBackend, 3>::from_floats([[[1.0, 1.0, 5.0]]], &device);
        let mask   = Tensor::<TestBackend, 2>::from_floats([[1.0, 1.0, 0.0]], &device);
        let out    = floats(masked_softmax(scores, mask));
        assert!((out[0] - 0.5).abs() < 1e-4);
        assert!(out[2] < 1e-4);
    }

    #[test]
    fn test_final_states_picks_last_real_and_first() {
        let device = Default::default();
        // batch 1, seq 3, 2h = 4 (forward = first two columns)
        let out = Tensor::<TestBackend, 3>::from_floats(
            [[[1.0, 1.0, 9.0, 9.0], [2.0, 2.0, 8.0, 8.0], [3.0, 3.0, 7.0, 7.0]]],
            &device,
        );
        let feature = floats(final_states(out, &[2]));
        assert_eq!(feature, vec![2.0, 2.0, 9.0, 9.0]);
    }

    #[test]
    fn test_random_embedding_zeroes_padding_row() {
        let device = Default::default();
        let emb = PreEmbeddingConfig::new(5, 3).init::<TestBackend>(&device);
        let ids = Tensor::<TestBackend, 2, Int>::from_ints([[1, 2]], &device);
        let out = floats(emb.forward(ids));
        assert_eq!(&out[0..3], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_pretrained_embedding_lookup_and_lengths() {
        let device = Default::default();
        let matrix = vec![vec![0.0, 0.0], vec![0.0, 0.0], vec![1.0, 2.0]];
        let emb = PreEmbeddingConfig::new(3, 2)
            .init_pretrained::<TestBackend>(&matrix, &device)
            .unwrap();
        let ids = Tensor::<TestBackend, 2, Int>::from_ints([[2, 1, 1], [2, 2, 1]], &device);
        assert_eq!(&floats(emb.forward(ids.clone()))[0..2], &[1.0, 2.0]);

        let lengths: Vec<i64> = emb.lengths(ids).into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(lengths, vec![1, 2]);
    }

    #[test]
    fn test_pretrained_shape_mismatch_rejected() {
        let device = Default::default();
        let res = PreEmbeddingConfig::new(2, 2)
            .init_pretrained::<TestBackend>(&[vec![0.0, 0.0]], &device);
        assert!(res.is_err());
    }

    #[test]
    fn test_bilstm_sequence_zeroes_padding() {
        let device = Default::default();
        let enc  = BiLstmEncoderConfig::new(3, 4).init::<TestBackend>(&device);
        let x    = Tensor::<TestBackend, 3>::ones([2, 3, 3], &device);
        let mask = Tensor::<TestBackend, 2>::from_floats([[1.0, 1.0, 1.0], [1.0, 0.0, 0.0]], &device);

        let seq = enc.forward_sequence(x.clone(), mask.clone());
        assert_eq!(seq.dims(), [2, 3, 8]);
        let padded = floats(seq.slice([1..2, 1..3, 0..8]));
        assert!(padded.iter().all(|v| *v == 0.0));

        let feature = enc.forward_feature(x, mask, &[3, 1]);
        assert_eq!(feature.dims(), [2, 8]);
    }

    #[test]
    fn test_reverse_index_keeps_padding_in_place() {
        let device = Default::default();
        let mask = Tensor::<TestBackend, 2>::from_floats([[1.0, 1.0, 1.0, 0.0], [1.0, 0.0, 0.0, 0.0]], &device);
        let index: Vec<i64> = reverse_index(mask).into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(index, vec![2, 1, 0, 3, 0, 1, 2, 3]);
    }

    #[test]
    fn test_bilstm_output_does_not_depend_on_padding() {
        let device = Default::default();
        let enc = BiLstmEncoderConfig::new(3, 4).init::<TestBackend>(&device);
        let sentence = [[0.5, -1.0, 0.25], [1.5, 0.75, -0.5]];

        let alone = Tensor::<TestBackend, 3>::from_floats([sentence], &device);
        let alone_mask = Tensor::<TestBackend, 2>::ones([1, 2], &device);

        let mut rows = vec![[0.0f32; 3]; 6];
        rows[0] = sentence[0];
        rows[1] = sentence[1];
        // padding content must not leak in either
        rows[4] = [9.0, 9.0, 9.0];
        let flat: Vec<f32> = rows.iter().flatten().copied().collect();
        let padded = Tensor::<TestBackend, 1>::from_floats(flat.as_slice(), &device).reshape([1, 6, 3]);
        let padded_mask = Tensor::<TestBackend, 2>::from_floats([[1.0, 1.0, 0.0, 0.0, 0.0, 0.0]], &device);

        let a = floats(enc.forward_sequence(alone.clone(), alone_mask.clone()));
        let b = floats(enc.forward_sequence(padded.clone(), padded_mask.clone()).slice([0..1, 0..2, 0..8]));
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-5, "{x} vs {y}");
        }

        let fa = floats(enc.forward_feature(alone, alone_mask, &[2]));
        let fb = floats(enc.forward_feature(padded, padded_mask, &[2]));
        for (x, y) in fa.iter().zip(&fb) {
            assert!((x - y).abs() < 1e-5, "{x} vs {y}");
        }
    }

    #[test]
    fn test_backward_half_reads_sentence_right_to_left() {
        let device = Default::default();
        let enc = BiLstmEncoderConfig::new(2, 3).init::<TestBackend>(&device);
        let x = Tensor::<TestBackend, 3>::from_floats([[[1.0, 0.0], [0.0, 1.0], [0.0, 0.0]]], &device);
        let mask = Tensor::<TestBackend, 2>::from_floats([[1.0, 1.0, 0.0]], &device);
        let out = enc.forward_sequence(x, mask);

        // the backward state at the last real token has seen only that token
        let last = Tensor::<TestBackend, 3>::from_floats([[[0.0, 1.0]]], &device);
        let (single, _) = enc.backward_lstm.forward(last, None);
        let expected = floats(single);
        let got = floats(out.slice([0..1, 1..2, 3..6]));
        for (x, y) in expected.iter().zip(&got) {
            assert!((x - y).abs() < 1e-5);
        }
    }
}
