//! Baseline agent that keeps driving straight at the current speed.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::builders::{EgoStatusFeatureBuilder, FeatureBuilder, EGO_STATUS_KEY, TRAJECTORY_KEY};
use super::traits::{Agent, InferenceAgent};
use crate::common::{SensorConfig, TrajectorySampling};
use crate::error::AgentError;
use crate::tensor::{DynTensor, TensorMap};

/// Extrapolates the current ego speed along the heading axis.
///
/// Pose `i` is `(|v| * t_i, 0, 0)` with `t_i = (i + 1) * interval_length`.
/// Has no weights and no training capability.
#[derive(Debug, Clone)]
pub struct ConstantVelocityAgent<B: Backend> {
    device: B::Device,
    sampling: TrajectorySampling,
}

impl<B: Backend> ConstantVelocityAgent<B> {
    pub fn new(sampling: TrajectorySampling, device: &B::Device) -> Self {
        Self {
            device: device.clone(),
            sampling,
        }
    }
}

impl<B: Backend> Agent for ConstantVelocityAgent<B> {
    fn name(&self) -> String {
        "ConstantVelocityAgent".into()
    }

    fn sensor_config(&self) -> SensorConfig {
        SensorConfig::build_no_sensors()
    }

    fn initialize(&mut self) -> Result<(), AgentError> {
        Ok(())
    }
}

impl<B: Backend> InferenceAgent<B> for ConstantVelocityAgent<B> {
    fn device(&self) -> B::Device {
        self.device.clone()
    }

    fn trajectory_sampling(&self) -> TrajectorySampling {
        self.sampling
    }

    fn feature_builders(&self) -> Vec<Box<dyn FeatureBuilder<B>>> {
        vec![Box::new(EgoStatusFeatureBuilder)]
    }

    fn forward(&self, features: &TensorMap<B>) -> Result<TensorMap<B>, AgentError> {
        let ego = features.require::<2>(EGO_STATUS_KEY)?;
        let [batch, _] = ego.dims();
        let num_poses = self.sampling.num_poses;

        // Velocity occupies the first two columns.
        let speed = ego.slice([0..batch, 0..2]).powf_scalar(2.0).sum_dim(1).sqrt();
        let timestamps: Tensor<B, 2> =
            DynTensor::from_values(self.sampling.timestamps(), &[1, num_poses], &self.device)?
                .try_into()?;

        let x = speed.matmul(timestamps);
        let zeros = x.zeros_like();
        let poses = Tensor::stack::<3>(vec![x, zeros.clone(), zeros], 2);

        let mut predictions = TensorMap::new();
        predictions.insert(TRAJECTORY_KEY, poses)?;
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{AgentInput, EgoStatus};
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn input(vx: f32, vy: f32) -> AgentInput {
        AgentInput {
            ego_statuses: vec![EgoStatus {
                ego_velocity: [vx, vy],
                ..Default::default()
            }],
            sensors: Vec::new(),
        }
    }

    fn agent() -> ConstantVelocityAgent<TestBackend> {
        ConstantVelocityAgent::new(TrajectorySampling::default(), &Default::default())
    }

    #[test]
    fn test_extrapolates_speed() {
        let trajectory = agent().compute_trajectory(&input(3.0, 4.0), "t", None).unwrap();
        assert_eq!(trajectory.len(), 8);
        for (i, pose) in trajectory.poses().iter().enumerate() {
            let expected = 5.0 * 0.5 * (i + 1) as f32;
            assert!((pose.x - expected).abs() < 1e-5);
            assert_eq!(pose.y, 0.0);
            assert_eq!(pose.heading, 0.0);
        }
    }

    #[test]
    fn test_forward_is_batched() {
        let agent = agent();
        let features = TensorMap::stack(vec![
            agent.compute_features(&input(1.0, 0.0), "a", None).unwrap(),
            agent.compute_features(&input(2.0, 0.0), "b", None).unwrap(),
        ])
        .unwrap();
        let out = agent.forward(&features).unwrap();
        let poses = out.require::<3>(TRAJECTORY_KEY).unwrap();
        assert_eq!(poses.dims(), [2, 8, 3]);

        let last_x: Vec<f32> = poses
            .slice([0..2, 7..8, 0..1])
            .reshape([2])
            .into_data()
            .to_vec()
            .unwrap();
        assert_eq!(last_x, vec![4.0, 8.0]);
    }

    #[test]
    fn test_missing_ego_status() {
        let err = agent()
            .compute_trajectory(&AgentInput::default(), "t", None)
            .unwrap_err();
        assert_eq!(err, AgentError::MissingEgoStatus);
    }

    #[test]
    fn test_custom_sampling() {
        let sampling = TrajectorySampling {
            num_poses: 4,
            interval_length: 1.0,
        };
        let agent = ConstantVelocityAgent::<TestBackend>::new(sampling, &Default::default());
        let trajectory = agent.compute_trajectory(&input(2.0, 0.0), "t", None).unwrap();
        assert_eq!(trajectory.len(), 4);
        assert!((trajectory.poses()[3].x - 8.0).abs() < 1e-5);
    }
}
