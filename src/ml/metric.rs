// ============================================================
// Layer 5 — Metrics and Evaluation
// ============================================================
// Per-batch loss functions, per-batch tallies (accuracy counts or
// chunk counts) and `evaluate`, which runs a model over a whole
// DataLoader and reduces everything into a Summary:
//
//   { "loss": mean batch loss, "acc" | "f1": task metric }

use anyhow::{bail, Result};
use burn::{
    data::dataloader::DataLoader,
    nn::loss::CrossEntropyLossConfig,
    prelude::*,
    tensor::ElementConversion,
};

use crate::domain::chunk::{Chunk, ChunkTag, TagScheme};
use crate::infra::summary::Summary;
use crate::ml::objective::Objective;

/// Mean cross entropy of raw scores `[b, classes]` against labels `[b]`.
pub fn cross_entropy<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> Tensor<B, 1> {
    CrossEntropyLossConfig::new()
        .init(&logits.device())
        .forward(logits, labels)
}

/// Mean negative log-likelihood of probabilities `[b, classes]`.
pub fn log_loss<B: Backend>(probs: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> Tensor<B, 1> {
    let [batch, _] = probs.dims();
    probs
        .clamp(1e-7, 1.0)
        .log()
        .gather(1, labels.reshape([batch, 1]))
        .neg()
        .mean()
}

/// Correct/total counts of the argmax of `scores` against `labels`.
pub fn acc<B: Backend>(scores: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> Tally {
    let [batch, _] = scores.dims();
    let predicted = scores.argmax(1).reshape([batch]);
    let correct = predicted
        .equal(labels)
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>();
    Tally::Accuracy { correct: correct as usize, total: batch }
}

/// Chunks of a tag sequence. An `I-X` that does not continue an
/// open X chunk starts a new one.
pub fn extract_chunks(scheme: &TagScheme, tags: &[usize]) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut open: Option<Chunk> = None;

    for (pos, &tag) in tags.iter().enumerate() {
        let role = scheme.role(tag);
        if let (ChunkTag::Inside(label), Some(chunk)) = (role, open.as_mut()) {
            if chunk.label == label {
                chunk.end = pos + 1;
                continue;
            }
        }
        chunks.extend(open.take());
        if let ChunkTag::Begin(label) | ChunkTag::Inside(label) = role {
            open = Some(Chunk { label, start: pos, end: pos + 1 });
        }
    }
    chunks.extend(open);
    chunks
}

/// Chunk counts of predicted tag sequences against gold ones.
pub fn chunk_tally(scheme: &TagScheme, gold: &[Vec<usize>], predicted: &[Vec<usize>]) -> Tally {
    let mut tally = Tally::Chunks { matched: 0, predicted: 0, gold: 0 };
    for (g, p) in gold.iter().zip(predicted) {
        let gold_chunks = extract_chunks(scheme, g);
        let pred_chunks = extract_chunks(scheme, p);
        let matched = pred_chunks.iter().filter(|c| gold_chunks.contains(c)).count();
        tally.merge(Tally::Chunks {
            matched,
            predicted: pred_chunks.len(),
            gold: gold_chunks.len(),
        });
    }
    tally
}

// ─── Tally ────────────────────────────────────────────────────────────────────
/// Additive counts behind a task metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tally {
    Accuracy { correct: usize, total: usize },
    Chunks   { matched: usize, predicted: usize, gold: usize },
}

impl Tally {
    pub fn name(&self) -> &'static str {
        match self {
            Tally::Accuracy { .. } => "acc",
            Tally::Chunks { .. }   => "f1",
        }
    }

    /// Accuracy, or chunk F1 (0.0 when nothing was predicted or expected).
    pub fn value(&self) -> f64 {
        match *self {
            Tally::Accuracy { correct, total } => {
                if total == 0 { 0.0 } else { correct as f64 / total as f64 }
            }
            Tally::Chunks { matched, predicted, gold } => {
                if predicted == 0 || gold == 0 {
                    return 0.0;
                }
                let precision = matched as f64 / predicted as f64;
                let recall    = matched as f64 / gold as f64;
                if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                }
            }
        }
    }

    /// Add `other`'s counts. Tallies of a different kind replace this one.
    pub fn merge(&mut self, other: Tally) {
        match (self, other) {
            (Tally::Accuracy { correct, total }, Tally::Accuracy { correct: c, total: t }) => {
                *correct += c;
                *total   += t;
            }
            (
                Tally::Chunks { matched, predicted, gold },
                Tally::Chunks { matched: m, predicted: p, gold: g },
            ) => {
                *matched   += m;
                *predicted += p;
                *gold      += g;
            }
            (this, other) => *this = other,
        }
    }
}

// ─── Meter ────────────────────────────────────────────────────────────────────
/// Running mean of batch losses plus the merged tally.
#[derive(Debug, Default, Clone)]
pub struct Meter {
    loss_sum: f64,
    batches:  usize,
    tally:    Option<Tally>,
}

impl Meter {
    pub fn add(&mut self, loss: f64, tally: Tally) {
        self.loss_sum += loss;
        self.batches  += 1;
        match self.tally.as_mut() {
            Some(t) => t.merge(tally),
            None    => self.tally = Some(tally),
        }
    }

    pub fn mean_loss(&self) -> f64 {
        if self.batches == 0 { 0.0 } else { self.loss_sum / self.batches as f64 }
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary::new();
        summary.insert("loss".to_string(), self.mean_loss());
        if let Some(tally) = self.tally {
            summary.insert(tally.name().to_string(), tally.value());
        }
        summary
    }
}

/// Run `model` over every batch of `loader` and summarise loss and metric.
/// An empty loader is an error: its loss would read as a perfect 0.0.
pub fn evaluate<B, M, T>(model: &M, loader: &dyn DataLoader<T>) -> Result<Summary>
where
    B: Backend,
    M: Objective<B, T>,
{
    let mut meter = Meter::default();
    for batch in loader.iter() {
        let output = model.objective(batch)?;
        let loss = output.loss.into_scalar().elem::<f64>();
        meter.add(loss, output.tally);
    }
    if meter.batches == 0 {
        bail!("no batches to evaluate: the split is empty");
    }
    Ok(meter.summary())
}
