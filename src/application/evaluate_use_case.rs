// ============================================================
// Layer 2 — EvaluateUseCase
// ============================================================
// Restores the "best" checkpoint and scores one split:
//
//   Step 1: Load data + model configs
//   Step 2: Preprocess the requested split (e.g. "test")
//   Step 3: Rebuild the model and load the checkpoint weights
//   Step 4: Evaluate over a DataLoader on the inner backend
//   Step 5: Merge {split: summary} into summary.json
//
// `execute` runs on WGPU; `execute_on` takes any backend.

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use burn::{
    backend::wgpu::WgpuDevice,
    data::dataloader::{batcher::Batcher, DataLoaderBuilder},
    module::Module,
    prelude::Backend,
};

use crate::application::pipeline::{self, Workspace, MIN_FINE_LEN};
use crate::data::{
    batcher::{NliBatcher, PairBatcher, TagBatcher},
    dataset::Corpus,
};
use crate::domain::{chunk::TagScheme, task::Task};
use crate::infra::{
    checkpoint::CheckpointManager,
    summary::{Summary, SummaryManager},
};
use crate::ml::{
    metric::evaluate,
    objective::Objective,
    trainer::{BEST, SUMMARY_FILE},
    EvalBackend,
};

#[derive(Debug, Clone)]
pub struct EvaluateConfig {
    pub task:      Task,
    pub data_dir:  PathBuf,
    pub model_dir: PathBuf,
    /// Data config key of the split to score
    pub dataset:   String,
}

pub struct EvaluateUseCase {
    config: EvaluateConfig,
}

impl EvaluateUseCase {
    pub fn new(config: EvaluateConfig) -> Self {
        Self { config }
    }

    /// Returns the summary that was written under `dataset`.
    pub fn execute(&self) -> Result<Summary> {
        self.execute_on::<EvalBackend>(&WgpuDevice::default())
    }

    /// Same as `execute` on any backend.
    pub fn execute_on<B: Backend>(&self, device: &B::Device) -> Result<Summary> {
        let cfg = &self.config;
        let ws = Workspace::open(&cfg.data_dir, &cfg.model_dir)?;
        tracing::info!("Evaluating '{}' on the '{}' split", cfg.task, cfg.dataset);

        let summary = match cfg.task {
            Task::Pairwise => {
                let pre    = pipeline::pair_preprocessor(&ws)?;
                let corpus = pipeline::pair_corpus(&ws, &pre, &cfg.dataset)?;
                let model  = pipeline::build_classifier::<B>(&ws.model, pre.vocab(), device)?;
                let pad    = pre.vocab().padding_index();
                self.run::<B, _, _, _, _>(&ws, model, corpus, PairBatcher::<B>::new(device.clone(), pad), device)?
            }
            Task::Tagging => {
                let pre    = pipeline::tag_preprocessor(&ws)?;
                let corpus = pipeline::tag_corpus(&ws, &pre, &cfg.dataset)?;
                let model  = pipeline::build_tagger::<B>(&ws.model, pre.vocab(), pre.tag_vocab(), device)?;
                let scheme = Arc::new(TagScheme::from_vocab(pre.tag_vocab()));
                let pad    = pre.vocab().padding_index();
                self.run::<B, _, _, _, _>(&ws, model, corpus, TagBatcher::<B>::new(device.clone(), pad, scheme), device)?
            }
            Task::Nli => {
                let pre    = pipeline::san_preprocessor(&ws)?;
                let corpus = pipeline::nli_corpus(&ws, &pre, &cfg.dataset)?;
                let model  = pipeline::build_san::<B>(
                    &ws.model, pre.coarse_vocab(), pre.fine_vocab(), device,
                )?;
                let batcher = NliBatcher::<B>::new(
                    device.clone(),
                    pre.coarse_vocab().padding_index(),
                    pre.fine_vocab().padding_index(),
                    MIN_FINE_LEN,
                );
                self.run::<B, _, _, _, _>(&ws, model, corpus, batcher, device)?
            }
        };

        // ── Step 5: Persist ───────────────────────────────────────────────────
        let mut summaries = SummaryManager::new(&ws.model_dir);
        summaries.load(SUMMARY_FILE)?;
        summaries.update_split(&cfg.dataset, &summary)?;
        summaries.save(SUMMARY_FILE)?;
        Ok(summary)
    }

    fn run<B, M, S, VB, BV>(
        &self,
        ws:      &Workspace,
        model:   M,
        corpus:  Corpus<S>,
        batcher: BV,
        device:  &B::Device,
    ) -> Result<Summary>
    where
        B: Backend,
        M: Module<B> + Objective<B, VB>,
        S: Clone + Send + Sync + std::fmt::Debug + 'static,
        VB: Clone + Send + std::fmt::Debug + 'static,
        BV: Batcher<S, VB> + Clone + 'static,
    {
        let checkpoints = CheckpointManager::new(&ws.model_dir)?;
        let model = checkpoints.load_model::<B, _>(BEST, model, device)?;

        let loader = DataLoaderBuilder::new(batcher)
            .batch_size(ws.model.batch_size.max(1))
            .num_workers(1)
            .build(corpus);

        evaluate::<B, _, _>(&model, loader.as_ref())
    }
}
