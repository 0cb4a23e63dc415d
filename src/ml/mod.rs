// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All model, loss and training-loop code lives here.
//
//   ops.rs        — shared blocks: PreEmbedding, BiLstmEncoder,
//                   masked softmax / log-sum-exp helpers
//   crf.rs        — linear-chain CRF (forward algorithm + Viterbi)
//   classifier.rs — transformer encoder for sentence pairs
//   tagger.rs     — BiLSTM-CRF sequence tagger
//   san.rs        — Stochastic Answer Network for NLI
//   metric.rs     — losses, accuracy / chunk F1, evaluate()
//   objective.rs  — the Objective trait every model implements
//   trainer.rs    — the generic training loop
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Lample et al. (2016) Neural Architectures for NER
//            Liu et al. (2018) Stochastic Answer Networks for NLI

use burn::backend::{Autodiff, Wgpu};

/// Backend with gradient tracking, used for training
pub type TrainBackend = Autodiff<Wgpu>;

/// Inner backend of `TrainBackend`, used for validation and evaluation
pub type EvalBackend = Wgpu;

pub mod ops;
pub mod crf;
pub mod classifier;
pub mod tagger;
pub mod san;
pub mod metric;
pub mod objective;
pub mod trainer;
