//! Lifecycle hooks run by the [`Trainer`](super::trainer::Trainer).
//!
//! Agents contribute callbacks through `Agent::training_callbacks`; callers
//! can add more with `Trainer::with_callback`. Every hook has an empty
//! default so implementations only override what they need.

use super::logging::EpochMetrics;
use super::trainer::FitSummary;

/// Static facts about a fit run, passed to [`TrainingCallback::on_fit_start`].
#[derive(Debug, Clone, PartialEq)]
pub struct FitContext {
    pub run_id: String,
    pub agent_name: String,
    pub max_epochs: usize,
    pub train_samples: usize,
    pub val_samples: usize,
}

/// Hooks into the training loop.
pub trait TrainingCallback {
    fn on_fit_start(&mut self, _context: &FitContext) {}

    /// Called after the last training batch of `epoch` with the epoch means.
    fn on_train_epoch_end(&mut self, _epoch: usize, _metrics: &EpochMetrics) {}

    /// Called after the last validation batch of `epoch` with the epoch means.
    fn on_validation_epoch_end(&mut self, _epoch: usize, _metrics: &EpochMetrics) {}

    fn on_fit_end(&mut self, _summary: &FitSummary) {}
}
