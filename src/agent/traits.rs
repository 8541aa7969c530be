//! The agent contract.
//!
//! Capabilities are split across three traits so that what an agent can do
//! is visible in its type:
//!
//! - [`Agent`] -- identity, sensor needs and one-time setup. Every agent.
//! - [`InferenceAgent`] -- feature builders and a forward pass; gets
//!   [`InferenceAgent::compute_trajectory`] for free.
//! - [`TrainableAgent`] -- target builders, loss and optimizer configuration
//!   for the training loop.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::builders::{
    build_features, build_targets, FeatureBuilder, TargetBuilder, TRAJECTORY_KEY,
};
use super::loss::Loss;
use super::style::StyleTable;
use crate::common::{AgentInput, Scene, SensorConfig, Trajectory, TrajectorySampling};
use crate::error::AgentError;
use crate::tensor::TensorMap;
use crate::training::callbacks::TrainingCallback;
use crate::training::optim::Optimizers;

/// Capabilities every driving agent provides.
pub trait Agent {
    /// Name identifying the agent in logs and checkpoints.
    fn name(&self) -> String;

    /// The sensor channels and history frames this agent consumes.
    fn sensor_config(&self) -> SensorConfig;

    /// One-time setup before first use, e.g. loading trained weights.
    fn initialize(&mut self) -> Result<(), AgentError>;

    /// Whether the agent needs privileged scene context beyond its sensors.
    fn requires_scene(&self) -> bool {
        false
    }

    /// Lifecycle hooks the training loop should run for this agent.
    fn training_callbacks(&self) -> Vec<Box<dyn TrainingCallback>> {
        Vec::new()
    }
}

/// An agent that can predict a trajectory.
pub trait InferenceAgent<B: Backend>: Agent {
    /// Device the agent's tensors live on.
    fn device(&self) -> B::Device;

    /// Temporal layout of the trajectories this agent predicts.
    fn trajectory_sampling(&self) -> TrajectorySampling {
        TrajectorySampling::default()
    }

    /// Builders whose merged output forms the model input.
    fn feature_builders(&self) -> Vec<Box<dyn FeatureBuilder<B>>>;

    /// Map batched features to batched predictions.
    ///
    /// The output must contain [`TRAJECTORY_KEY`] with shape
    /// `[batch, num_poses, 3]`.
    fn forward(&self, features: &TensorMap<B>) -> Result<TensorMap<B>, AgentError>;

    /// Whether the model consumes the one-hot style feature.
    fn style_conditioning(&self) -> bool {
        false
    }

    /// Unbatched features for one input.
    ///
    /// Style-conditioned agents also get the style vector for `token`. Without
    /// a table every token reads as [`StyleLabel::N`](super::style::StyleLabel::N).
    fn compute_features(
        &self,
        input: &AgentInput,
        token: &str,
        style: Option<&StyleTable>,
    ) -> Result<TensorMap<B>, AgentError> {
        let device = self.device();
        let mut features = build_features(&self.feature_builders(), input, &device)?;
        if self.style_conditioning() {
            let neutral = StyleTable::default();
            style.unwrap_or(&neutral).inject(&mut features, token, &device)?;
        }
        Ok(features)
    }

    /// Predict the ego trajectory for a single input.
    ///
    /// Builds the features, adds a batch dimension of one, runs
    /// [`forward`](Self::forward) detached from any autodiff graph and strips
    /// the batch dimension from the predicted poses. Run it on a
    /// non-autodiff backend (see `AutodiffModule::valid`) for inference-mode
    /// layers such as dropout.
    fn compute_trajectory(
        &self,
        input: &AgentInput,
        token: &str,
        style: Option<&StyleTable>,
    ) -> Result<Trajectory, AgentError> {
        let features = self.compute_features(input, token, style)?.unsqueeze_batch()?;
        let predictions = self.forward(&features)?.detach();

        let trajectory = predictions
            .get(TRAJECTORY_KEY)
            .cloned()
            .ok_or_else(|| AgentError::MissingKey {
                key: TRAJECTORY_KEY.to_string(),
            })?;
        let poses: Tensor<B, 2> = trajectory.squeeze_batch()?.try_into()?;
        Trajectory::from_tensor(poses, self.trajectory_sampling())
    }
}

/// An agent the training loop can optimize.
pub trait TrainableAgent<B: Backend>: InferenceAgent<B> {
    /// Builders whose merged output forms the supervision targets.
    fn target_builders(&self) -> Vec<Box<dyn TargetBuilder<B>>>;

    /// Unbatched targets for one scene.
    fn compute_targets(&self, scene: &Scene) -> Result<TensorMap<B>, AgentError> {
        build_targets(&self.target_builders(), scene, &self.device())
    }

    /// Forward pass during training and validation.
    ///
    /// Agents whose training pass consumes the targets (ground-truth conditioned decoding,
    /// auxiliary heads) override this; the default ignores them.
    fn forward_train(
        &self,
        features: &TensorMap<B>,
        _targets: &TensorMap<B>,
    ) -> Result<TensorMap<B>, AgentError> {
        self.forward(features)
    }

    /// Loss to backpropagate, as a scalar or as named terms.
    fn compute_loss(
        &self,
        features: &TensorMap<B>,
        targets: &TensorMap<B>,
        predictions: &TensorMap<B>,
    ) -> Result<Loss<B>, AgentError>;

    /// Optimizer (and optional learning-rate schedule) for the training loop.
    fn optimizers(&self) -> Optimizers;
}
