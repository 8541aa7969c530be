//! Optimizer configuration handed from agents to the training loop.
//!
//! Agents describe their optimizer as data ([`Optimizers`]); the trainer
//! turns that description into a burn optimizer with
//! [`ConfiguredOptimizer::new`] and asks it for the learning rate of every
//! epoch.

use std::f64::consts::PI;

use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::{Adam, AdamConfig, AdamW, AdamWConfig, GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

/// Optimizer algorithm and its hyper-parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OptimizerKind {
    Adam {
        learning_rate: f64,
        #[serde(default)]
        weight_decay: Option<f32>,
    },
    #[serde(rename = "adamw")]
    AdamW {
        learning_rate: f64,
        #[serde(default = "default_adamw_weight_decay")]
        weight_decay: f32,
    },
}

fn default_adamw_weight_decay() -> f32 {
    1e-4
}

impl OptimizerKind {
    /// Base learning rate before any schedule is applied.
    pub fn learning_rate(&self) -> f64 {
        match self {
            Self::Adam { learning_rate, .. } | Self::AdamW { learning_rate, .. } => *learning_rate,
        }
    }
}

/// Epoch-indexed learning-rate schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerKind {
    Constant,
    /// Multiply by `gamma` every `step_size` epochs.
    StepDecay { step_size: usize, gamma: f64 },
    /// Cosine annealing from the base rate to `min_learning_rate` over `t_max` epochs.
    Cosine {
        t_max: usize,
        #[serde(default)]
        min_learning_rate: f64,
    },
}

impl SchedulerKind {
    pub fn learning_rate(&self, base: f64, epoch: usize) -> f64 {
        match self {
            Self::Constant => base,
            Self::StepDecay { step_size, gamma } => {
                let decays = epoch / (*step_size).max(1);
                base * gamma.powi(decays as i32)
            }
            Self::Cosine {
                t_max,
                min_learning_rate,
            } => {
                let t_max = (*t_max).max(1);
                let progress = epoch.min(t_max) as f64 / t_max as f64;
                min_learning_rate + (base - min_learning_rate) * 0.5 * (1.0 + (PI * progress).cos())
            }
        }
    }
}

/// What an agent returns from `TrainableAgent::optimizers`: either a bare
/// optimizer or an optimizer paired with a learning-rate schedule.
#[derive(Debug, Clone, PartialEq)]
pub enum Optimizers {
    Single(OptimizerKind),
    WithScheduler {
        optimizer: OptimizerKind,
        lr_scheduler: SchedulerKind,
    },
}

impl Optimizers {
    pub fn optimizer(&self) -> &OptimizerKind {
        match self {
            Self::Single(optimizer) | Self::WithScheduler { optimizer, .. } => optimizer,
        }
    }

    /// Learning rate to use throughout `epoch` (0-based).
    pub fn learning_rate_at(&self, epoch: usize) -> f64 {
        match self {
            Self::Single(optimizer) => optimizer.learning_rate(),
            Self::WithScheduler {
                optimizer,
                lr_scheduler,
            } => lr_scheduler.learning_rate(optimizer.learning_rate(), epoch),
        }
    }
}

/// A burn optimizer materialized from an [`OptimizerKind`].
pub enum ConfiguredOptimizer<M, B>
where
    M: AutodiffModule<B>,
    B: AutodiffBackend,
{
    Adam(OptimizerAdaptor<Adam, M, B>),
    AdamW(OptimizerAdaptor<AdamW, M, B>),
}

impl<M, B> ConfiguredOptimizer<M, B>
where
    M: AutodiffModule<B>,
    B: AutodiffBackend,
{
    pub fn new(kind: &OptimizerKind) -> Self {
        match kind {
            OptimizerKind::Adam { weight_decay, .. } => Self::Adam(
                AdamConfig::new()
                    .with_weight_decay((*weight_decay).map(WeightDecayConfig::new))
                    .init(),
            ),
            OptimizerKind::AdamW { weight_decay, .. } => {
                Self::AdamW(AdamWConfig::new().with_weight_decay(*weight_decay).init())
            }
        }
    }

    /// Apply one update and hand back the updated module.
    pub fn step(&mut self, learning_rate: f64, module: M, grads: GradientsParams) -> M {
        match self {
            Self::Adam(optim) => optim.step(learning_rate, module, grads),
            Self::AdamW(optim) => optim.step(learning_rate, module, grads),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adam(lr: f64) -> OptimizerKind {
        OptimizerKind::Adam {
            learning_rate: lr,
            weight_decay: None,
        }
    }

    #[test]
    fn test_single_optimizer_constant_rate() {
        let optimizers = Optimizers::Single(adam(1e-3));
        assert_eq!(optimizers.learning_rate_at(0), 1e-3);
        assert_eq!(optimizers.learning_rate_at(50), 1e-3);
    }

    #[test]
    fn test_step_decay() {
        let optimizers = Optimizers::WithScheduler {
            optimizer: adam(1.0),
            lr_scheduler: SchedulerKind::StepDecay {
                step_size: 2,
                gamma: 0.5,
            },
        };
        assert!((optimizers.learning_rate_at(0) - 1.0).abs() < 1e-12);
        assert!((optimizers.learning_rate_at(1) - 1.0).abs() < 1e-12);
        assert!((optimizers.learning_rate_at(2) - 0.5).abs() < 1e-12);
        assert!((optimizers.learning_rate_at(5) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_endpoints() {
        let schedule = SchedulerKind::Cosine {
            t_max: 10,
            min_learning_rate: 0.1,
        };
        assert!((schedule.learning_rate(1.0, 0) - 1.0).abs() < 1e-12);
        assert!((schedule.learning_rate(1.0, 5) - 0.55).abs() < 1e-12);
        assert!((schedule.learning_rate(1.0, 10) - 0.1).abs() < 1e-12);
        // Past t_max the rate stays at the floor.
        assert!((schedule.learning_rate(1.0, 20) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_optimizer_kind_from_json() {
        let kind: OptimizerKind =
            serde_json::from_str(r#"{"type": "adamw", "learning_rate": 0.001}"#).unwrap();
        assert_eq!(
            kind,
            OptimizerKind::AdamW {
                learning_rate: 0.001,
                weight_decay: 1e-4
            }
        );
    }
}
