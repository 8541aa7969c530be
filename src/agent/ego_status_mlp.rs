//! Trainable MLP that maps the current ego status to a trajectory.

use burn::module::{Ignored, Module};
use burn::nn::{Linear, LinearConfig, Relu};
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use tracing::info;

use super::builders::{
    EgoStatusFeatureBuilder, FeatureBuilder, TargetBuilder, TrajectoryTargetBuilder,
    EGO_STATUS_DIM, EGO_STATUS_KEY, TRAJECTORY_KEY,
};
use super::loss::Loss;
use super::style::{StyleLabel, STYLE_FEATURE_KEY};
use super::traits::{Agent, InferenceAgent, TrainableAgent};
use crate::common::{SensorConfig, TrajectorySampling, POSE_DIM};
use crate::config::EgoStatusMlpConfig;
use crate::error::AgentError;
use crate::tensor::TensorMap;
use crate::training::optim::{OptimizerKind, Optimizers};

impl EgoStatusMlpConfig {
    /// Width of the network input.
    pub fn input_dim(&self) -> usize {
        if self.style_conditioning {
            EGO_STATUS_DIM + StyleLabel::COUNT
        } else {
            EGO_STATUS_DIM
        }
    }

    /// Build a freshly initialized agent on `device`.
    pub fn init<B: Backend>(&self, device: &B::Device) -> EgoStatusMlpAgent<B> {
        let hidden = self.hidden_layer_dim;
        EgoStatusMlpAgent {
            input: LinearConfig::new(self.input_dim(), hidden).init(device),
            hidden1: LinearConfig::new(hidden, hidden).init(device),
            hidden2: LinearConfig::new(hidden, hidden).init(device),
            output: LinearConfig::new(hidden, self.sampling.num_poses * POSE_DIM).init(device),
            activation: Relu::new(),
            settings: Ignored(self.clone()),
        }
    }
}

/// Four-layer ReLU MLP over `ego_status` (plus `style_feature` when style
/// conditioning is on), trained with an L1 loss against the recorded future.
#[derive(Module, Debug)]
pub struct EgoStatusMlpAgent<B: Backend> {
    input: Linear<B>,
    hidden1: Linear<B>,
    hidden2: Linear<B>,
    output: Linear<B>,
    activation: Relu,
    settings: Ignored<EgoStatusMlpConfig>,
}

impl<B: Backend> EgoStatusMlpAgent<B> {
    pub fn settings(&self) -> &EgoStatusMlpConfig {
        &self.settings.0
    }

    fn network_input(&self, features: &TensorMap<B>) -> Result<Tensor<B, 2>, AgentError> {
        let ego = features.require::<2>(EGO_STATUS_KEY)?;
        let x = if self.settings.0.style_conditioning {
            let style = features.require::<2>(STYLE_FEATURE_KEY)?;
            Tensor::cat(vec![ego, style], 1)
        } else {
            ego
        };

        let [batch, width] = x.dims();
        let expected = self.settings.0.input_dim();
        if width != expected {
            return Err(AgentError::ShapeMismatch {
                expected: vec![batch, expected],
                actual: vec![batch, width],
            });
        }
        Ok(x)
    }
}

impl<B: Backend> Agent for EgoStatusMlpAgent<B> {
    fn name(&self) -> String {
        "EgoStatusMlpAgent".into()
    }

    fn sensor_config(&self) -> SensorConfig {
        SensorConfig::build_no_sensors()
    }

    /// Load trained weights when a checkpoint path is configured.
    fn initialize(&mut self) -> Result<(), AgentError> {
        let Some(path) = self.settings.0.checkpoint_path.clone() else {
            return Ok(());
        };
        let device = self.device();
        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        *self = self
            .clone()
            .load_file(path.clone(), &recorder, &device)
            .map_err(|e| AgentError::Checkpoint(format!("{}: {e:?}", path.display())))?;
        info!(path = %path.display(), "Loaded agent weights");
        Ok(())
    }
}

impl<B: Backend> InferenceAgent<B> for EgoStatusMlpAgent<B> {
    fn device(&self) -> B::Device {
        self.output.weight.val().device()
    }

    fn trajectory_sampling(&self) -> TrajectorySampling {
        self.settings.0.sampling
    }

    fn style_conditioning(&self) -> bool {
        self.settings.0.style_conditioning
    }

    fn feature_builders(&self) -> Vec<Box<dyn FeatureBuilder<B>>> {
        vec![Box::new(EgoStatusFeatureBuilder)]
    }

    fn forward(&self, features: &TensorMap<B>) -> Result<TensorMap<B>, AgentError> {
        let x = self.network_input(features)?;
        let [batch, _] = x.dims();

        let x = self.activation.forward(self.input.forward(x));
        let x = self.activation.forward(self.hidden1.forward(x));
        let x = self.activation.forward(self.hidden2.forward(x));
        let poses = self
            .output
            .forward(x)
            .reshape([batch, self.settings.0.sampling.num_poses, POSE_DIM]);

        let mut predictions = TensorMap::new();
        predictions.insert(TRAJECTORY_KEY, poses)?;
        Ok(predictions)
    }
}

impl<B: Backend> TrainableAgent<B> for EgoStatusMlpAgent<B> {
    fn target_builders(&self) -> Vec<Box<dyn TargetBuilder<B>>> {
        vec![Box::new(TrajectoryTargetBuilder::new(self.settings.0.sampling))]
    }

    /// Mean absolute error over all poses.
    fn compute_loss(
        &self,
        _features: &TensorMap<B>,
        targets: &TensorMap<B>,
        predictions: &TensorMap<B>,
    ) -> Result<Loss<B>, AgentError> {
        let predicted = predictions.require::<3>(TRAJECTORY_KEY)?;
        let target = targets.require::<3>(TRAJECTORY_KEY)?;
        if predicted.dims() != target.dims() {
            return Err(AgentError::ShapeMismatch {
                expected: target.dims().to_vec(),
                actual: predicted.dims().to_vec(),
            });
        }
        Ok(Loss::Scalar((predicted - target).abs().mean()))
    }

    fn optimizers(&self) -> Optimizers {
        let optimizer = OptimizerKind::Adam {
            learning_rate: self.settings.0.learning_rate,
            weight_decay: None,
        };
        match &self.settings.0.lr_scheduler {
            Some(lr_scheduler) => Optimizers::WithScheduler {
                optimizer,
                lr_scheduler: lr_scheduler.clone(),
            },
            None => Optimizers::Single(optimizer),
        }
    }
}
