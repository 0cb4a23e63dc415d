// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates one training run:
//
//   Step 1: Load data + model configs      (Layer 6 - infra)
//   Step 2: Build the task preprocessor    (Layer 4 - data)
//   Step 3: Preprocess train / validation  (Layer 4 - data)
//   Step 4: Build the model                (Layer 5 - ml)
//   Step 5: Wrap corpora in DataLoaders    (Layer 4 - data)
//   Step 6: Run the training loop          (Layer 5 - ml)
//
// `execute` trains on WGPU; `execute_on` takes any autodiff
// backend and validates on its inner backend.

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use burn::{
    backend::wgpu::WgpuDevice,
    data::dataloader::{batcher::Batcher, DataLoaderBuilder},
    module::AutodiffModule,
    optim::AdamConfig,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::pipeline::{self, Workspace, MIN_FINE_LEN};
use crate::data::{
    batcher::{NliBatcher, PairBatcher, TagBatcher},
    dataset::Corpus,
};
use crate::domain::{chunk::TagScheme, task::Task};
use crate::ml::{
    objective::Objective,
    trainer::{fit, FitOptions, SEED},
    TrainBackend,
};

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub task:      Task,
    pub data_dir:  PathBuf,
    pub model_dir: PathBuf,
    /// Continue from the "best" checkpoint in `model_dir`
    pub resume:    bool,
}

pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<()> {
        let device = WgpuDevice::default();
        tracing::info!("Training '{}' on WGPU device: {:?}", self.config.task, device);
        self.execute_on::<TrainBackend>(&device)
    }

    /// Same pipeline on any autodiff backend.
    pub fn execute_on<B: AutodiffBackend>(&self, device: &B::Device) -> Result<()> {
        let cfg = &self.config;

        // ── Step 1: Configs ───────────────────────────────────────────────────
        let ws = Workspace::open(&cfg.data_dir, &cfg.model_dir)?;

        // Same seed for weight init, dropout and the loader shuffle
        B::seed(SEED);

        // ── Steps 2–6 per task ────────────────────────────────────────────────
        match cfg.task {
            Task::Pairwise => {
                let pre   = pipeline::pair_preprocessor(&ws)?;
                let train = pipeline::pair_corpus(&ws, &pre, "train")?;
                let val   = pipeline::pair_corpus(&ws, &pre, "validation")?;
                let pad   = pre.vocab().padding_index();
                let model = pipeline::build_classifier::<B>(&ws.model, pre.vocab(), device)?;
                self.run::<B, _, _, _, _, _, _>(
                    &ws, model, train, val,
                    PairBatcher::<B>::new(device.clone(), pad),
                    PairBatcher::<B::InnerBackend>::new(device.clone(), pad),
                    device,
                )
            }
            Task::Tagging => {
                let pre    = pipeline::tag_preprocessor(&ws)?;
                let train  = pipeline::tag_corpus(&ws, &pre, "train")?;
                let val    = pipeline::tag_corpus(&ws, &pre, "validation")?;
                let model  = pipeline::build_tagger::<B>(&ws.model, pre.vocab(), pre.tag_vocab(), device)?;
                let scheme = Arc::new(TagScheme::from_vocab(pre.tag_vocab()));
                let pad    = pre.vocab().padding_index();
                self.run::<B, _, _, _, _, _, _>(
                    &ws, model, train, val,
                    TagBatcher::<B>::new(device.clone(), pad, Arc::clone(&scheme)),
                    TagBatcher::<B::InnerBackend>::new(device.clone(), pad, scheme),
                    device,
                )
            }
            Task::Nli => {
                let pre   = pipeline::san_preprocessor(&ws)?;
                let train = pipeline::nli_corpus(&ws, &pre, "train")?;
                let val   = pipeline::nli_corpus(&ws, &pre, "validation")?;
                let model = pipeline::build_san::<B>(
                    &ws.model, pre.coarse_vocab(), pre.fine_vocab(), device,
                )?;
                let coarse_pad = pre.coarse_vocab().padding_index();
                let fine_pad   = pre.fine_vocab().padding_index();
                self.run::<B, _, _, _, _, _, _>(
                    &ws, model, train, val,
                    NliBatcher::<B>::new(device.clone(), coarse_pad, fine_pad, MIN_FINE_LEN),
                    NliBatcher::<B::InnerBackend>::new(device.clone(), coarse_pad, fine_pad, MIN_FINE_LEN),
                    device,
                )
            }
        }
    }

    /// Build the loaders and hand everything to the training loop.
    #[allow(clippy::too_many_arguments)]
    fn run<B, M, S, TB, VB, BT, BV>(
        &self,
        ws:            &Workspace,
        model:         M,
        train:         Corpus<S>,
        val:           Corpus<S>,
        train_batcher: BT,
        val_batcher:   BV,
        device:        &B::Device,
    ) -> Result<()>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B> + Objective<B, TB>,
        M::InnerModule: Objective<B::InnerBackend, VB>,
        S: Clone + Send + Sync + std::fmt::Debug + 'static,
        TB: Clone + Send + std::fmt::Debug + 'static,
        VB: Clone + Send + std::fmt::Debug + 'static,
        BT: Batcher<S, TB> + Clone + 'static,
        BV: Batcher<S, VB> + Clone + 'static,
    {
        let batch_size = ws.model.batch_size.max(1);
        let steps_per_epoch = train.sample_count().div_ceil(batch_size);
        tracing::info!(
            "{} training / {} validation samples, {} steps per epoch",
            train.sample_count(), val.sample_count(), steps_per_epoch,
        );

        // ── Training data loader (AutodiffBackend) ────────────────────────────
        let train_loader = DataLoaderBuilder::new(train_batcher)
            .batch_size(batch_size)
            .shuffle(SEED)
            .num_workers(1)
            .build(train);

        // ── Validation data loader (InnerBackend — no autodiff overhead) ──────
        let val_loader = DataLoaderBuilder::new(val_batcher)
            .batch_size(batch_size)
            .num_workers(1)
            .build(val);

        let options = FitOptions {
            epochs:          ws.model.epochs,
            learning_rate:   ws.model.learning_rate,
            summary_step:    ws.model.summary_step,
            steps_per_epoch,
            resume:          self.config.resume,
        };
        let optim = AdamConfig::new().with_epsilon(1e-8).init();

        fit::<B, _, _, _, _>(model, optim, train_loader, val_loader, &options, &ws.model_dir, device)?;
        Ok(())
    }
}
