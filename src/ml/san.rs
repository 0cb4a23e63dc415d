// ============================================================
// Layer 5 — Stochastic Answer Network (SAN)
// ============================================================
// Natural-language inference over premise / hypothesis pairs.
//
//   lexicon    word embedding ⊕ char-CNN over each word's jamo
//   contextual two stacked BiLSTMs, outputs concatenated
//   memory     premise ↔ hypothesis attention, then a BiLSTM
//   answer     `multi_step` reasoning steps: the state attends
//              over the premise memory, emits a prediction and
//              is updated by an LSTM cell
//
// The per-step predictions are averaged. During training whole
// steps are dropped at random (at least one is always kept).

use anyhow::{anyhow, Result};
use burn::{
    nn::{
        conv::{Conv1d, Conv1dConfig},
        Dropout, DropoutConfig,
        Linear, LinearConfig,
        Lstm, LstmConfig, LstmState,
        PaddingConfig1d,
    },
    prelude::*,
    tensor::{
        activation::{relu, softmax},
        Distribution,
    },
};

use crate::data::batcher::{NliBatch, SequenceBatch};
use crate::ml::metric::{acc, log_loss};
use crate::ml::objective::{Objective, StepOutput};
use crate::ml::ops::{
    final_states, masked_softmax, to_host,
    BiLstmEncoder, BiLstmEncoderConfig, PreEmbedding, PreEmbeddingConfig,
};

#[derive(Config, Debug)]
pub struct SanConfig {
    pub num_classes:          usize,
    pub coarse_vocab_size:    usize,
    pub coarse_embedding_dim: usize,
    pub fine_vocab_size:      usize,
    pub fine_embedding_dim:   usize,
    pub hidden_dim:           usize,
    pub multi_step:           usize,
    pub prediction_drop_ratio: f64,
    #[config(default = 3)]
    pub kernel_size:          usize,
    #[config(default = 1)]
    pub coarse_padding_idx:   usize,
    #[config(default = 1)]
    pub fine_padding_idx:     usize,
    #[config(default = 0.1)]
    pub dropout:              f64,
    #[config(default = true)]
    pub freeze_embedding:     bool,
}

impl SanConfig {
    fn coarse_config(&self) -> PreEmbeddingConfig {
        PreEmbeddingConfig::new(self.coarse_vocab_size, self.coarse_embedding_dim)
            .with_padding_idx(self.coarse_padding_idx)
            .with_freeze(self.freeze_embedding)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> San<B> {
        self.assemble(self.coarse_config().init(device), device)
    }

    /// Word embedding taken from a pretrained matrix.
    pub fn init_pretrained<B: Backend>(&self, matrix: &[Vec<f32>], device: &B::Device) -> Result<San<B>> {
        let coarse = self.coarse_config().init_pretrained(matrix, device)?;
        Ok(self.assemble(coarse, device))
    }

    fn assemble<B: Backend>(&self, coarse: PreEmbedding<B>, device: &B::Device) -> San<B> {
        let h = self.hidden_dim;
        let lexicon_dim = self.coarse_embedding_dim + self.fine_embedding_dim;

        San {
            coarse,
            fine: PreEmbeddingConfig::new(self.fine_vocab_size, self.fine_embedding_dim)
                .with_padding_idx(self.fine_padding_idx)
                .init(device),
            fine_conv: Conv1dConfig::new(self.fine_embedding_dim, self.fine_embedding_dim, self.kernel_size)
                .with_padding(PaddingConfig1d::Same)
                .init(device),
            context_lower: BiLstmEncoderConfig::new(lexicon_dim, h).init(device),
            context_upper: BiLstmEncoderConfig::new(2 * h, h).init(device),
            attention:     LinearConfig::new(4 * h, h).init(device),
            memory:        BiLstmEncoderConfig::new(8 * h, h).init(device),
            state_attention: LinearConfig::new(2 * h, 2 * h).with_bias(false).init(device),
            answer_cell:   LstmConfig::new(2 * h, 2 * h, true).init(device),
            classifier:    LinearConfig::new(8 * h, self.num_classes).init(device),
            dropout:       DropoutConfig::new(self.dropout).init(),
            multi_step:    self.multi_step.max(1),
            prediction_drop_ratio: self.prediction_drop_ratio,
        }
    }
}

#[derive(Module, Debug)]
pub struct San<B: Backend> {
    pub coarse:          PreEmbedding<B>,
    pub fine:            PreEmbedding<B>,
    pub fine_conv:       Conv1d<B>,
    pub context_lower:   BiLstmEncoder<B>,
    pub context_upper:   BiLstmEncoder<B>,
    pub attention:       Linear<B>,
    pub memory:          BiLstmEncoder<B>,
    pub state_attention: Linear<B>,
    pub answer_cell:     Lstm<B>,
    pub classifier:      Linear<B>,
    pub dropout:         Dropout,
    pub multi_step:      usize,
    pub prediction_drop_ratio: f64,
}

impl<B: Backend> San<B> {
    /// Class probabilities, [batch, num_classes].
    pub fn forward(&self, premise: &SequenceBatch<B>, hypothesis: &SequenceBatch<B>) -> Result<Tensor<B, 2>> {
        let p_context = self.contextual(premise);
        let h_context = self.contextual(hypothesis);

        let (p_memory, h_memory) = self.memories(
            p_context, premise.mask.clone(),
            h_context, hypothesis.mask.clone(),
        );
        let initial = final_states(h_memory, &hypothesis.lengths);

        let steps = self.answer(initial, p_memory, premise.mask.clone());
        self.average_steps(steps)
    }

    /// Lexicon + two BiLSTM layers: [b, s] → [b, s, 4h].
    fn contextual(&self, side: &SequenceBatch<B>) -> Tensor<B, 3> {
        let [batch, words, jamo] = side.fine.dims();

        let coarse = self.coarse.forward(side.coarse.clone());

        // char-CNN: [b*s, c, f] → conv over c → max over c → [b, s, f]
        let fine = self.fine.forward(side.fine.clone().reshape([batch * words, jamo]));
        let fine = relu(self.fine_conv.forward(fine.swap_dims(1, 2)));
        let [_, fine_dim, _] = fine.dims();
        let fine = fine.max_dim(2).reshape([batch, words, fine_dim]);

        let lexicon = self.dropout.forward(Tensor::cat(vec![coarse, fine], 2));
        let lower = self.context_lower.forward_sequence(lexicon, side.mask.clone());
        let upper = self.context_upper.forward_sequence(self.dropout.forward(lower.clone()), side.mask.clone());
        Tensor::cat(vec![lower, upper], 2)
    }

    /// Cross attention then the memory BiLSTM: each side → [b, s, 2h].
    fn memories(
        &self,
        premise:    Tensor<B, 3>,
        p_mask:     Tensor<B, 2>,
        hypothesis: Tensor<B, 3>,
        h_mask:     Tensor<B, 2>,
    ) -> (Tensor<B, 3>, Tensor<B, 3>) {
        let p_proj = relu(self.attention.forward(premise.clone()));
        let h_proj = relu(self.attention.forward(hypothesis.clone()));

        // [b, sp, sh]
        let scores = p_proj.matmul(h_proj.swap_dims(1, 2));
        let p_attended = masked_softmax(scores.clone(), h_mask.clone()).matmul(hypothesis.clone());
        let h_attended = masked_softmax(scores.swap_dims(1, 2), p_mask.clone()).matmul(premise.clone());

        let p_memory = self.memory.forward_sequence(
            self.dropout.forward(Tensor::cat(vec![premise, p_attended], 2)),
            p_mask,
        );
        let h_memory = self.memory.forward_sequence(
            self.dropout.forward(Tensor::cat(vec![hypothesis, h_attended], 2)),
            h_mask,
        );
        (p_memory, h_memory)
    }

    /// One probability distribution per reasoning step.
    fn answer(&self, initial: Tensor<B, 2>, memory: Tensor<B, 3>, mask: Tensor<B, 2>) -> Vec<Tensor<B, 2>> {
        let [batch, state_dim] = initial.dims();
        let device = initial.device();
        let memory_t = memory.clone().swap_dims(1, 2);

        let mut state = LstmState::new(Tensor::zeros([batch, state_dim], &device), initial);
        let mut steps = Vec::with_capacity(self.multi_step);

        for _ in 0..self.multi_step {
            let s = state.hidden.clone();

            let query = self.state_attention.forward(s.clone()).unsqueeze_dim::<3>(1);
            let beta  = masked_softmax(query.matmul(memory_t.clone()), mask.clone());
            let x     = beta.matmul(memory.clone()).reshape([batch, state_dim]);

            let features = Tensor::cat(
                vec![s.clone(), x.clone(), (s.clone() - x.clone()).abs(), s * x.clone()],
                1,
            );
            steps.push(softmax(self.classifier.forward(self.dropout.forward(features)), 1));

            let (_, next) = self.answer_cell.forward(x.unsqueeze_dim::<3>(1), Some(state));
            state = next;
        }
        steps
    }

    /// Mean of the kept steps. Steps are only dropped when gradients are tracked.
    fn average_steps(&self, steps: Vec<Tensor<B, 2>>) -> Result<Tensor<B, 2>> {
        let n = steps.len();
        let keep = if B::ad_enabled() && self.prediction_drop_ratio > 0.0 {
            let device = steps[0].device();
            let draw = Tensor::<B, 1>::random(
                [n],
                Distribution::Bernoulli(1.0 - self.prediction_drop_ratio),
                &device,
            );
            let mut keep: Vec<bool> = to_host(draw)?.into_iter().map(|v| v > 0.5).collect();
            if !keep.iter().any(|&k| k) {
                keep[n - 1] = true;
            }
            keep
        } else {
            vec![true; n]
        };

        let count = keep.iter().filter(|&&k| k).count();
        let total = steps
            .into_iter()
            .zip(&keep)
            .filter_map(|(step, &k)| k.then_some(step))
            .reduce(|a, b| a + b)
            .ok_or_else(|| anyhow!("no reasoning steps"))?;
        Ok(total / count as f64)
    }
}

impl<B: Backend> Objective<B, NliBatch<B>> for San<B> {
    fn objective(&self, batch: NliBatch<B>) -> Result<StepOutput<B>> {
        let probs = self.forward(&batch.premise, &batch.hypothesis)?;
        let loss  = log_loss(probs.clone(), batch.labels.clone());
        let tally = acc(probs, batch.labels);
        Ok(StepOutput { loss, tally })
    }
}
