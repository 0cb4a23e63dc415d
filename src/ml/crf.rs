// ============================================================
// Layer 5 — Linear-chain CRF
// ============================================================
// Scores a tag sequence y for emissions E as
//
//   start[y0] + Σ_t E[t, y_t] + Σ_t trans[y_{t-1}, y_t] + end[y_last]
//
// Training minimises  log Z − score(gold)  where Z sums over all
// sequences (forward algorithm in log space, on the device).
// Decoding runs Viterbi on the host, one sentence at a time.

use anyhow::Result;
use burn::{nn::Initializer, module::Param, prelude::*};

use crate::ml::ops::{log_sum_exp, to_host};

#[derive(Config, Debug)]
pub struct CrfConfig {
    pub num_tags: usize,
}

impl CrfConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Crf<B> {
        let init = Initializer::Uniform { min: -0.1, max: 0.1 };
        Crf {
            transitions:       init.init([self.num_tags, self.num_tags], device),
            start_transitions: init.init([self.num_tags], device),
            end_transitions:   init.init([self.num_tags], device),
        }
    }
}

#[derive(Module, Debug)]
pub struct Crf<B: Backend> {
    /// [from, to]
    pub transitions:       Param<Tensor<B, 2>>,
    pub start_transitions: Param<Tensor<B, 1>>,
    pub end_transitions:   Param<Tensor<B, 1>>,
}

impl<B: Backend> Crf<B> {
    /// Mean negative log-likelihood of `tags` [b, s].
    ///
    /// `emissions` is [b, s, num_tags]; `mask` [b, s] is 1.0 for real
    /// tokens and every sentence has at least one.
    pub fn neg_log_likelihood(
        &self,
        emissions: Tensor<B, 3>,
        tags:      Tensor<B, 2, Int>,
        mask:      Tensor<B, 2>,
        lengths:   &[usize],
    ) -> Tensor<B, 1> {
        let gold      = self.gold_score(emissions.clone(), tags, mask.clone(), lengths);
        let partition = self.partition(emissions, mask);
        (partition - gold).mean()
    }

    /// [b, 1]
    fn gold_score(
        &self,
        emissions: Tensor<B, 3>,
        tags:      Tensor<B, 2, Int>,
        mask:      Tensor<B, 2>,
        lengths:   &[usize],
    ) -> Tensor<B, 2> {
        let [batch, seq, num_tags] = emissions.dims();
        let device = emissions.device();

        let emitted = emissions
            .gather(2, tags.clone().unsqueeze_dim::<3>(2))
            .reshape([batch, seq])
            * mask.clone();
        let mut score = emitted.sum_dim(1);

        let first = tags.clone().slice([0..batch, 0..1]).reshape([batch]);
        score = score + self.start_transitions.val().select(0, first).reshape([batch, 1]);

        if seq > 1 {
            let prev = tags.clone().slice([0..batch, 0..seq - 1]);
            let next = tags.clone().slice([0..batch, 1..seq]);
            let flat = (prev.mul_scalar(num_tags as i32) + next).reshape([batch * (seq - 1)]);
            let moved = self
                .transitions
                .val()
                .reshape([num_tags * num_tags])
                .select(0, flat)
                .reshape([batch, seq - 1])
                * mask.slice([0..batch, 1..seq]);
            score = score + moved.sum_dim(1);
        }

        let last: Vec<f32> = lengths
            .iter()
            .flat_map(|&len| (0..seq).map(move |i| if i + 1 == len { 1.0 } else { 0.0 }))
            .collect();
        let last = Tensor::<B, 1>::from_floats(last.as_slice(), &device).reshape([batch, seq]);
        let ended = self
            .end_transitions
            .val()
            .select(0, tags.reshape([batch * seq]))
            .reshape([batch, seq])
            * last;

        score + ended.sum_dim(1)
    }

    /// log Z, [b, 1]
    fn partition(&self, emissions: Tensor<B, 3>, mask: Tensor<B, 2>) -> Tensor<B, 2> {
        let [batch, seq, num_tags] = emissions.dims();
        let transitions = self.transitions.val().reshape([1, num_tags, num_tags]);

        let mut alpha = self.start_transitions.val().reshape([1, num_tags])
            + emissions.clone().slice([0..batch, 0..1, 0..num_tags]).reshape([batch, num_tags]);

        for t in 1..seq {
            let emit = emissions
                .clone()
                .slice([0..batch, t..t + 1, 0..num_tags])
                .reshape([batch, num_tags]);
            let scores = alpha.clone().reshape([batch, num_tags, 1]) + transitions.clone();
            let next = log_sum_exp(scores, 1).reshape([batch, num_tags]) + emit;

            // Finished sentences keep their alpha
            let keep = mask.clone().slice([0..batch, t..t + 1]);
            alpha = next * keep.clone() + alpha * keep.neg().add_scalar(1.0);
        }

        log_sum_exp(alpha + self.end_transitions.val().reshape([1, num_tags]), 1)
    }

    /// Best tag sequence of each sentence, truncated to its length.
    pub fn decode(&self, emissions: Tensor<B, 3>, lengths: &[usize]) -> Result<Vec<Vec<usize>>> {
        let [_, seq, num_tags] = emissions.dims();
        let emissions   = to_host(emissions)?;
        let transitions = to_host(self.transitions.val())?;
        let start       = to_host(self.start_transitions.val())?;
        let end         = to_host(self.end_transitions.val())?;

        let paths = lengths
            .iter()
            .enumerate()
            .map(|(b, &len)| {
                let rows = &emissions[b * seq * num_tags..(b + 1) * seq * num_tags];
                viterbi(rows, len.min(seq), num_tags, &transitions, &start, &end)
            })
            .collect();
        Ok(paths)
    }
}

/// `emissions` is one sentence, row-major [seq, num_tags].
fn viterbi(
    emissions:   &[f32],
    len:         usize,
    num_tags:    usize,
    transitions: &[f32],
    start:       &[f32],
    end:         &[f32],
) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    let mut score: Vec<f32> = (0..num_tags).map(|j| start[j] + emissions[j]).collect();
    let mut backpointers: Vec<Vec<usize>> = Vec::with_capacity(len);

    for t in 1..len {
        let mut next = vec![f32::NEG_INFINITY; num_tags];
        let mut back = vec![0; num_tags];
        for j in 0..num_tags {
            for i in 0..num_tags {
                let s = score[i] + transitions[i * num_tags + j];
                if s > next[j] {
                    next[j] = s;
                    back[j] = i;
                }
            }
            next[j] += emissions[t * num_tags + j];
        }
        score = next;
        backpointers.push(back);
    }

    let mut best = 0;
    for j in 1..num_tags {
        if score[j] + end[j] > score[best] + end[best] {
            best = j;
        }
    }
    let mut path = vec![best];
    for back in backpointers.iter().rev() {
        best = back[best];
        path.push(best);
    }
    path.reverse();
    path
}
