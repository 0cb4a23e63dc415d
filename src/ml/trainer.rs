// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Generic train + validation loop shared by the three models.
//
//   - Training runs on an AutodiffBackend; validation uses
//     model.valid(), the same weights on the inner backend
//     with dropout disabled
//   - Every `summary_step` global steps the validation loss is
//     computed and written next to the running training loss
//   - After each epoch the full validation summary decides
//     whether the "best" checkpoint is replaced
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use burn::{
    data::dataloader::DataLoader,
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{json, Map};

use crate::infra::checkpoint::{CheckpointManager, CheckpointState};
use crate::infra::metrics::ScalarWriter;
use crate::infra::summary::{Summary, SummaryManager};
use crate::ml::metric::{evaluate, Meter};
use crate::ml::objective::Objective;

/// Seed for the backend RNG and the training loader shuffle.
pub const SEED: u64 = 777;
pub const BEST: &str = "best";
pub const SUMMARY_FILE: &str = "summary.json";

#[derive(Debug, Clone)]
pub struct FitOptions {
    pub epochs:        usize,
    pub learning_rate: f64,
    pub summary_step:  usize,
    /// Batches per epoch, used to restore the global step on resume
    pub steps_per_epoch: usize,
    pub resume:        bool,
}

/// Train `model` and keep the checkpoint with the lowest validation loss
/// in `model_dir`. Returns the model as of the last step.
pub fn fit<B, M, O, TB, VB>(
    mut model:    M,
    mut optim:    O,
    train_loader: Arc<dyn DataLoader<TB>>,
    val_loader:   Arc<dyn DataLoader<VB>>,
    options:      &FitOptions,
    model_dir:    &Path,
    device:       &B::Device,
) -> Result<M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + Objective<B, TB>,
    M::InnerModule: Objective<B::InnerBackend, VB>,
    O: Optimizer<M, B>,
{
    B::seed(SEED);

    let checkpoints = CheckpointManager::new(model_dir)?;
    let mut summaries = SummaryManager::new(model_dir);
    let mut writer = ScalarWriter::new(model_dir.join("runs"))?;

    // ── Resume ────────────────────────────────────────────────────────────────
    let mut start_epoch   = 0usize;
    let mut best_val_loss = f64::INFINITY;
    if options.resume {
        if checkpoints.exists(BEST) {
            let state = checkpoints.load_state(BEST)?;
            model = checkpoints.load_model::<B, M>(BEST, model, device)?;
            optim = checkpoints.load_optimizer::<B, M, O>(BEST, optim, device)?;
            summaries.load(SUMMARY_FILE)?;
            start_epoch   = state.epoch;
            best_val_loss = state.val_loss;
            tracing::info!("Resuming from epoch {} (val_loss={:.4})", start_epoch, best_val_loss);
        } else {
            tracing::warn!("No '{}' checkpoint in '{}', starting from scratch", BEST, model_dir.display());
        }
    }

    let mut global_step = start_epoch * options.steps_per_epoch;
    let style = ProgressStyle::with_template("{prefix} [{bar:30}] {pos}/{len} {msg}")
        .context("Invalid progress template")?
        .progress_chars("=> ");

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in start_epoch..options.epochs {
        let progress = ProgressBar::new(options.steps_per_epoch as u64)
            .with_style(style.clone())
            .with_prefix(format!("epoch {}/{}", epoch + 1, options.epochs));

        let mut train_meter = Meter::default();

        for batch in train_loader.iter() {
            let output = model.objective(batch)?;
            let loss_val: f64 = output.loss.clone().into_scalar().elem::<f64>();
            train_meter.add(loss_val, output.tally);

            // Backward pass + Adam update
            let grads = output.loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(options.learning_rate, model, grads);

            // 0-based: the first step of a run is summarised
            if options.summary_step > 0 && global_step % options.summary_step == 0 {
                let val_summary = evaluate::<B::InnerBackend, _, _>(&model.valid(), val_loader.as_ref())?;
                let val_loss = val_summary.get("loss").copied().unwrap_or(f64::NAN);
                writer.add_scalars(
                    "loss",
                    &[("train", train_meter.mean_loss()), ("val", val_loss)],
                    global_step,
                )?;
                tracing::info!("global_step: {:3}, tr_loss: {:.3}, val_loss: {:.3}",
                    global_step, train_meter.mean_loss(), val_loss);
            }
            global_step += 1;

            progress.set_message(format!("loss: {:.3}", train_meter.mean_loss()));
            progress.inc(1);
        }
        progress.finish_and_clear();

        // ── Validation phase ──────────────────────────────────────────────────
        let train_summary = train_meter.summary();
        let val_summary   = evaluate::<B::InnerBackend, _, _>(&model.valid(), val_loader.as_ref())?;
        let val_loss      = val_summary.get("loss").copied().unwrap_or(f64::NAN);

        tracing::info!(
            "epoch {:>3}/{} | train: {} | validation: {}",
            epoch + 1, options.epochs, describe(&train_summary), describe(&val_summary),
        );

        if val_loss < best_val_loss {
            best_val_loss = val_loss;
            let state = CheckpointState { epoch: epoch + 1, val_loss };
            checkpoints.save_checkpoint::<B, M, O>(BEST, &state, &model, &optim)?;

            let mut update = Map::new();
            update.insert("train".to_string(), json!(train_summary));
            update.insert("validation".to_string(), json!(val_summary));
            summaries.update(update);
            summaries.save(SUMMARY_FILE)?;
            tracing::info!("New best model at epoch {} (val_loss={:.4})", epoch + 1, val_loss);
        }
    }

    tracing::info!("Training complete! Scalars in '{}'", writer.csv_path().display());
    Ok(model)
}

/// `loss: 0.412, acc: 81.20%`, loss always first
pub fn describe(summary: &Summary) -> String {
    let loss = summary.get("loss").map(|value| format!("loss: {value:.3}"));
    let metrics = summary
        .iter()
        .filter(|(name, _)| name.as_str() != "loss")
        .map(|(name, value)| format!("{name}: {:.2}%", value * 100.0));
    loss.into_iter()
        .chain(metrics)
        .collect::<Vec<_>>()
        .join(", ")
}
