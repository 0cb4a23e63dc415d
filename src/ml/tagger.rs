use anyhow::Result;
use burn::{
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
};

use crate::data::batcher::TagBatch;
use crate::ml::crf::{Crf, CrfConfig};
use crate::ml::metric::chunk_tally;
use crate::ml::objective::{Objective, StepOutput};
use crate::ml::ops::{BiLstmEncoder, BiLstmEncoderConfig, PreEmbedding, PreEmbeddingConfig};

#[derive(Config, Debug)]
pub struct BilstmCrfConfig {
    pub vocab_size:    usize,
    pub embedding_dim: usize,
    pub hidden_dim:    usize,
    pub num_tags:      usize,
    #[config(default = 1)]
    pub padding_idx:   usize,
    #[config(default = 0.5)]
    pub dropout:       f64,
    #[config(default = true)]
    pub freeze_embedding: bool,
}

impl BilstmCrfConfig {
    fn embedding_config(&self) -> PreEmbeddingConfig {
        PreEmbeddingConfig::new(self.vocab_size, self.embedding_dim)
            .with_padding_idx(self.padding_idx)
            .with_freeze(self.freeze_embedding)
    }

    /// Randomly initialised embedding.
    pub fn init<B: Backend>(&self, device: &B::Device) -> BilstmCrf<B> {
        self.assemble(self.embedding_config().init(device), device)
    }

    /// Embedding taken from a pretrained matrix.
    pub fn init_pretrained<B: Backend>(&self, matrix: &[Vec<f32>], device: &B::Device) -> Result<BilstmCrf<B>> {
        let embedding = self.embedding_config().init_pretrained(matrix, device)?;
        Ok(self.assemble(embedding, device))
    }

    fn assemble<B: Backend>(&self, embedding: PreEmbedding<B>, device: &B::Device) -> BilstmCrf<B> {
        BilstmCrf {
            embedding,
            encoder:  BiLstmEncoderConfig::new(self.embedding_dim, self.hidden_dim).init(device),
            dropout:  DropoutConfig::new(self.dropout).init(),
            emission: LinearConfig::new(2 * self.hidden_dim, self.num_tags).init(device),
            crf:      CrfConfig::new(self.num_tags).init(device),
        }
    }
}

/// Embedding → BiLSTM → per-token tag scores → CRF.
#[derive(Module, Debug)]
pub struct BilstmCrf<B: Backend> {
    pub embedding: PreEmbedding<B>,
    pub encoder:   BiLstmEncoder<B>,
    pub dropout:   Dropout,
    pub emission:  Linear<B>,
    pub crf:       Crf<B>,
}

impl<B: Backend> BilstmCrf<B> {
    /// token_ids: [batch, seq] → emissions: [batch, seq, num_tags]
    pub fn forward(&self, token_ids: Tensor<B, 2, Int>, mask: Tensor<B, 2>) -> Tensor<B, 3> {
        let embedded = self.embedding.forward(token_ids);
        let hidden   = self.encoder.forward_sequence(embedded, mask);
        self.emission.forward(self.dropout.forward(hidden))
    }
}

impl<B: Backend> Objective<B, TagBatch<B>> for BilstmCrf<B> {
    fn objective(&self, batch: TagBatch<B>) -> Result<StepOutput<B>> {
        let emissions = self.forward(batch.token_ids, batch.mask.clone());
        let loss = self.crf.neg_log_likelihood(
            emissions.clone(),
            batch.tag_ids,
            batch.mask,
            &batch.lengths,
        );
        let predicted = self.crf.decode(emissions, &batch.lengths)?;
        let tally = chunk_tally(&batch.scheme, &batch.tags, &predicted);
        Ok(StepOutput { loss, tally })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::data::batcher::TagBatcher;
    use crate::data::dataset::TagSample;
    use crate::domain::chunk::TagScheme;
    use crate::domain::vocab::{ReservedTokens, Vocab};
    use crate::ml::metric::Tally;
    use burn::backend::NdArray;
    use burn::data::dataloader::batcher::Batcher;

    type TestBackend = NdArray;

    #[test]
    fn test_forward_and_decode_lengths() {
        let device = Default::default();
        let model  = BilstmCrfConfig::new(10, 4, 3, 5).init::<TestBackend>(&device);
        let tokens = Tensor::<TestBackend, 2, Int>::from_ints([[2, 3, 4], [5, 1, 1]], &device);
        let mask   = Tensor::<TestBackend, 2>::from_floats([[1.0, 1.0, 1.0], [1.0, 0.0, 0.0]], &device);

        let emissions = model.forward(tokens, mask);
        assert_eq!(emissions.dims(), [2, 3, 5]);
        let paths = model.crf.decode(emissions, &[3, 1]).unwrap();
        assert_eq!(paths[0].len(), 3);
        assert_eq!(paths[1].len(), 1);
    }

    #[test]
    fn test_objective_on_batch() {
        let device    = Default::default();
        let tag_vocab = Vocab::new(ReservedTokens::default(), ["O", "B-PER", "I-PER"]);
        let scheme    = Arc::new(TagScheme::from_vocab(&tag_vocab));
        let batcher   = TagBatcher::<TestBackend>::new(Default::default(), 1, scheme);
        let batch = batcher.batch(vec![
            TagSample { token_ids: vec![2, 3], tag_ids: vec![3, 4] },
            TagSample { token_ids: vec![4],    tag_ids: vec![2] },
        ]);

        let model  = BilstmCrfConfig::new(6, 4, 3, tag_vocab.len()).init::<TestBackend>(&device);
        let output = model.objective(batch).unwrap();
        let loss: f32 = output.loss.into_scalar();
        assert!(loss.is_finite() && loss >= 0.0);
        assert!(matches!(output.tally, Tally::Chunks { gold: 1, .. }));
    }

    #[test]
    fn test_pretrained_init_checks_shape() {
        let device = Default::default();
        let config = BilstmCrfConfig::new(2, 3, 2, 3);
        let res = config.init_pretrained::<TestBackend>(&[vec![0.0; 3]], &device);
        assert!(res.is_err());
    }
}
