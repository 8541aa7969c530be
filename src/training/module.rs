//! Adapter between a [`TrainableAgent`] and the training loop.
//!
//! [`AgentTrainingModule`] owns the agent, runs one batch through
//! `forward_train` and `compute_loss`, logs the resulting loss values and
//! hands the scalar to backpropagate back to the caller.

use std::fmt;

use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};

use super::logging::{MetricLogger, MetricRecord};
use super::optim::Optimizers;
use crate::agent::{Loss, TrainableAgent, TOTAL_LOSS_KEY};
use crate::error::AgentError;
use crate::tensor::TensorMap;

/// Which loop a step belongs to; used as the metric namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Train,
    Val,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Val => "val",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A collated batch of features and targets.
#[derive(Debug, Clone)]
pub struct Batch<B: Backend> {
    pub features: TensorMap<B>,
    pub targets: TensorMap<B>,
}

impl<B: Backend> Batch<B> {
    pub fn new(features: TensorMap<B>, targets: TensorMap<B>) -> Self {
        Self { features, targets }
    }

    /// Leading dimension of the features.
    pub fn size(&self) -> Option<usize> {
        self.features.batch_size()
    }
}

/// Wraps an agent so the training loop can drive it step by step.
#[derive(Debug, Clone)]
pub struct AgentTrainingModule<A> {
    agent: A,
}

impl<A> AgentTrainingModule<A> {
    pub fn new(agent: A) -> Self {
        Self { agent }
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    pub fn into_agent(self) -> A {
        self.agent
    }

    /// Replace the wrapped agent, e.g. with the result of an optimizer step.
    pub fn map_agent(self, f: impl FnOnce(A) -> A) -> Self {
        Self {
            agent: f(self.agent),
        }
    }

    /// Shared body of the training and validation steps.
    pub fn step<B>(
        &self,
        batch: &Batch<B>,
        phase: Phase,
        logger: &mut dyn MetricLogger,
    ) -> Result<Tensor<B, 1>, AgentError>
    where
        B: Backend,
        A: TrainableAgent<B>,
    {
        let batch_size = batch.size();
        let predictions = self.agent.forward_train(&batch.features, &batch.targets)?;
        let loss = self
            .agent
            .compute_loss(&batch.features, &batch.targets, &predictions)?;

        match loss {
            Loss::Scalar(total) => {
                log_scalar(logger, phase, TOTAL_LOSS_KEY, &total, batch_size)?;
                Ok(total)
            }
            Loss::Terms(terms) => {
                for (name, value) in terms.iter() {
                    if let Some(value) = value {
                        log_scalar(logger, phase, name, value, batch_size)?;
                    }
                }
                terms.into_total()
            }
        }
    }

    pub fn training_step<B>(
        &self,
        batch: &Batch<B>,
        _batch_idx: usize,
        logger: &mut dyn MetricLogger,
    ) -> Result<Tensor<B, 1>, AgentError>
    where
        B: Backend,
        A: TrainableAgent<B>,
    {
        self.step(batch, Phase::Train, logger)
    }

    pub fn validation_step<B>(
        &self,
        batch: &Batch<B>,
        _batch_idx: usize,
        logger: &mut dyn MetricLogger,
    ) -> Result<Tensor<B, 1>, AgentError>
    where
        B: Backend,
        A: TrainableAgent<B>,
    {
        self.step(batch, Phase::Val, logger)
    }

    pub fn configure_optimizers<B>(&self) -> Optimizers
    where
        B: Backend,
        A: TrainableAgent<B>,
    {
        self.agent.optimizers()
    }
}

fn log_scalar<B: Backend>(
    logger: &mut dyn MetricLogger,
    phase: Phase,
    name: &str,
    value: &Tensor<B, 1>,
    batch_size: Option<usize>,
) -> Result<(), AgentError> {
    let [len] = value.dims();
    if len != 1 {
        return Err(AgentError::NonScalarLoss {
            name: name.to_string(),
            shape: vec![len],
        });
    }
    let scalar = value.clone().into_scalar().elem::<f64>();
    logger.log(MetricRecord::new(format!("{phase}/{name}"), scalar).with_batch_size(batch_size));
    Ok(())
}
