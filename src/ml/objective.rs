use anyhow::Result;
use burn::prelude::*;

use crate::ml::metric::Tally;

/// Loss of one batch plus the counts behind the task metric.
#[derive(Debug)]
pub struct StepOutput<B: Backend> {
    /// Scalar loss, shape [1]
    pub loss:  Tensor<B, 1>,
    pub tally: Tally,
}

/// A model that can score a batch of type `T`.
///
/// Implemented for both the autodiff model (training) and its inner
/// module (validation), so one impl per model covers both.
pub trait Objective<B: Backend, T> {
    fn objective(&self, batch: T) -> Result<StepOutput<B>>;
}
