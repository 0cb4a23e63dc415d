// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model and optimizer state using Burn's
// CompactRecorder (MessagePack + gzip, half precision).
//
// A checkpoint is identified by a name (the trainer uses
// "best") and consists of three files in the model directory:
//
//   experiments/base_model/
//     best_model.mpk.gz   ← model parameters
//     best_optim.mpk.gz   ← optimizer moments
//     best_state.json     ← { "epoch": 3, "val_loss": 0.41 }
//
// Names must not contain a '.', because the recorder replaces
// the file extension.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use burn::{
    module::AutodiffModule,
    optim::Optimizer,
    prelude::*,
    record::{CompactRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

/// Bookkeeping stored next to the tensors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointState {
    /// Number of completed epochs when the checkpoint was written
    pub epoch:    usize,
    /// Validation loss that made this checkpoint the best so far
    pub val_loss: f64,
}

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create model dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn exists(&self, name: &str) -> bool {
        self.state_path(name).exists()
    }

    /// Write model, optimizer, and state for checkpoint `name`.
    pub fn save_checkpoint<B, M, O>(
        &self,
        name:  &str,
        state: &CheckpointState,
        model: &M,
        optim: &O,
    ) -> Result<()>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        Self::check_name(name)?;
        let recorder = CompactRecorder::new();

        let model_path = self.model_path(name);
        Recorder::<B>::record(&recorder, model.clone().into_record(), model_path.clone())
            .with_context(|| format!("Failed to save model to '{}'", model_path.display()))?;

        let optim_path = self.optim_path(name);
        Recorder::<B>::record(&recorder, optim.to_record(), optim_path.clone())
            .with_context(|| format!("Failed to save optimizer to '{}'", optim_path.display()))?;

        let state_path = self.state_path(name);
        fs::write(&state_path, serde_json::to_string_pretty(state)?)
            .with_context(|| format!("Failed to write '{}'", state_path.display()))?;

        tracing::debug!("Saved checkpoint '{}' (epoch {})", name, state.epoch);
        Ok(())
    }

    pub fn load_state(&self, name: &str) -> Result<CheckpointState> {
        let path = self.state_path(name);
        let json = fs::read_to_string(&path).with_context(|| {
            format!("Cannot find '{}'. Have you run 'train' first?", path.display())
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Restore parameters of checkpoint `name` into `model`.
    /// The model must have the architecture the checkpoint was saved with.
    pub fn load_model<B, M>(&self, name: &str, model: M, device: &B::Device) -> Result<M>
    where
        B: Backend,
        M: Module<B>,
    {
        let path = self.model_path(name);
        let record: M::Record = Recorder::<B>::load(&CompactRecorder::new(), path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?", path.display())
            })?;
        tracing::info!("Loaded model parameters from '{}'", path.display());
        Ok(model.load_record(record))
    }

    /// Restore optimizer moments of checkpoint `name` into `optim`.
    pub fn load_optimizer<B, M, O>(&self, name: &str, optim: O, device: &B::Device) -> Result<O>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
        O: Optimizer<M, B>,
    {
        let path = self.optim_path(name);
        let record: O::Record = Recorder::<B>::load(&CompactRecorder::new(), path.clone(), device)
            .with_context(|| format!("Cannot load optimizer state '{}'", path.display()))?;
        Ok(optim.load_record(record))
    }

    fn check_name(name: &str) -> Result<()> {
        if name.is_empty() || name.contains('.') || name.contains('/') {
            bail!("Invalid checkpoint name '{name}'");
        }
        Ok(())
    }

    // The recorder appends ".mpk.gz" itself
    fn model_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}_model"))
    }

    fn optim_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}_optim"))
    }

    fn state_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}_state.json"))
    }
}
