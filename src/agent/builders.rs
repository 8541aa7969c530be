//! Feature and target builders.
//!
//! Builders turn raw inputs into named tensors. Feature builders only see the
//! [`AgentInput`]; target builders see the whole [`Scene`], including the
//! recorded future that serves as ground truth.

use burn::tensor::backend::Backend;
use tracing::debug;

use crate::common::{AgentInput, Scene, TrajectorySampling};
use crate::error::AgentError;
use crate::tensor::{DynTensor, TensorMap};

/// Key of the ego-status feature vector.
pub const EGO_STATUS_KEY: &str = "ego_status";
/// Key of trajectory targets and trajectory predictions.
pub const TRAJECTORY_KEY: &str = "trajectory";
/// Length of the ego-status feature (velocity, acceleration, driving command).
pub const EGO_STATUS_DIM: usize = 8;

/// Computes model input tensors from an [`AgentInput`].
pub trait FeatureBuilder<B: Backend> {
    /// Unique name used in logs and error messages.
    fn name(&self) -> &str;

    fn compute_features(
        &self,
        input: &AgentInput,
        device: &B::Device,
    ) -> Result<TensorMap<B>, AgentError>;
}

/// Computes supervision tensors from a [`Scene`].
pub trait TargetBuilder<B: Backend> {
    /// Unique name used in logs and error messages.
    fn name(&self) -> &str;

    fn compute_targets(&self, scene: &Scene, device: &B::Device)
        -> Result<TensorMap<B>, AgentError>;
}

/// Run every feature builder in order and merge their outputs.
///
/// A key produced by two builders is an error.
pub fn build_features<B: Backend>(
    builders: &[Box<dyn FeatureBuilder<B>>],
    input: &AgentInput,
    device: &B::Device,
) -> Result<TensorMap<B>, AgentError> {
    let mut features = TensorMap::new();
    for builder in builders {
        let output = builder.compute_features(input, device)?;
        debug!(builder = builder.name(), keys = output.len(), "built features");
        features.merge(output)?;
    }
    Ok(features)
}

/// Run every target builder in order and merge their outputs.
pub fn build_targets<B: Backend>(
    builders: &[Box<dyn TargetBuilder<B>>],
    scene: &Scene,
    device: &B::Device,
) -> Result<TensorMap<B>, AgentError> {
    let mut targets = TensorMap::new();
    for builder in builders {
        let output = builder.compute_targets(scene, device)?;
        debug!(builder = builder.name(), token = %scene.token, "built targets");
        targets.merge(output)?;
    }
    Ok(targets)
}

// ---------------------------------------------------------------------------
// Ego status
// ---------------------------------------------------------------------------

/// Emits the current ego velocity, acceleration and driving command as one
/// `[8]` vector under [`EGO_STATUS_KEY`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EgoStatusFeatureBuilder;

impl<B: Backend> FeatureBuilder<B> for EgoStatusFeatureBuilder {
    fn name(&self) -> &str {
        "ego_status_feature"
    }

    fn compute_features(
        &self,
        input: &AgentInput,
        device: &B::Device,
    ) -> Result<TensorMap<B>, AgentError> {
        let status = input.current_ego_status()?;
        let values: Vec<f32> = status
            .ego_velocity
            .iter()
            .chain(status.ego_acceleration.iter())
            .chain(status.driving_command.iter())
            .copied()
            .collect();

        let mut features = TensorMap::new();
        features.insert(
            EGO_STATUS_KEY,
            DynTensor::from_values(values, &[EGO_STATUS_DIM], device)?,
        )?;
        Ok(features)
    }
}

// ---------------------------------------------------------------------------
// Trajectory targets
// ---------------------------------------------------------------------------

/// Emits the recorded future trajectory as a `[num_poses, 3]` tensor under
/// [`TRAJECTORY_KEY`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TrajectoryTargetBuilder {
    sampling: TrajectorySampling,
}

impl TrajectoryTargetBuilder {
    pub fn new(sampling: TrajectorySampling) -> Self {
        Self { sampling }
    }
}

impl<B: Backend> TargetBuilder<B> for TrajectoryTargetBuilder {
    fn name(&self) -> &str {
        "trajectory_target"
    }

    fn compute_targets(
        &self,
        scene: &Scene,
        device: &B::Device,
    ) -> Result<TensorMap<B>, AgentError> {
        let future = &scene.future_trajectory;
        if future.len() != self.sampling.num_poses {
            return Err(AgentError::InvalidTrajectory(format!(
                "scene {} has {} future poses, expected {}",
                scene.token,
                future.len(),
                self.sampling.num_poses
            )));
        }

        let mut targets = TensorMap::new();
        targets.insert(TRAJECTORY_KEY, future.to_tensor::<B>(device)?)?;
        Ok(targets)
    }
}
