//! Core data types passed between the simulator side and agents.
//!
//! These types describe one decision instant (the [`AgentInput`]), the
//! privileged [`Scene`] it was cut from, and the [`Trajectory`] an agent
//! predicts in response.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};

use super::sensors::{SensorChannel, SensorConfig};
use crate::error::AgentError;
use crate::tensor::DynTensor;

/// Number of values per pose (`x`, `y`, `heading`).
pub const POSE_DIM: usize = 3;

// ---------------------------------------------------------------------------
// Poses and trajectories
// ---------------------------------------------------------------------------

/// A planar ego pose in the local frame of the current ego position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    /// Heading in radians.
    pub heading: f32,
}

impl Pose {
    pub fn new(x: f32, y: f32, heading: f32) -> Self {
        Self { x, y, heading }
    }

    pub fn to_array(self) -> [f32; POSE_DIM] {
        [self.x, self.y, self.heading]
    }
}

/// Temporal layout of a predicted trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectorySampling {
    /// Number of future poses.
    pub num_poses: usize,
    /// Seconds between consecutive poses.
    pub interval_length: f32,
}

impl Default for TrajectorySampling {
    fn default() -> Self {
        Self {
            num_poses: 8,
            interval_length: 0.5,
        }
    }
}

impl TrajectorySampling {
    /// Total horizon covered by the trajectory, in seconds.
    pub fn time_horizon(&self) -> f32 {
        self.num_poses as f32 * self.interval_length
    }

    /// Timestamps (seconds from now) of every pose.
    pub fn timestamps(&self) -> Vec<f32> {
        (1..=self.num_poses)
            .map(|i| i as f32 * self.interval_length)
            .collect()
    }
}

/// An ordered sequence of future ego poses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    poses: Vec<Pose>,
    #[serde(default)]
    sampling: TrajectorySampling,
}

impl Trajectory {
    /// Create a trajectory; the pose count must match the sampling.
    pub fn new(poses: Vec<Pose>, sampling: TrajectorySampling) -> Result<Self, AgentError> {
        if poses.len() != sampling.num_poses {
            return Err(AgentError::InvalidTrajectory(format!(
                "expected {} poses, got {}",
                sampling.num_poses,
                poses.len()
            )));
        }
        Ok(Self { poses, sampling })
    }

    /// Build from row-major `[num_poses, 3]` values.
    pub fn from_flat(values: &[f32], sampling: TrajectorySampling) -> Result<Self, AgentError> {
        if values.len() % POSE_DIM != 0 {
            return Err(AgentError::InvalidTrajectory(format!(
                "{} values do not form whole poses",
                values.len()
            )));
        }
        let poses = values
            .chunks_exact(POSE_DIM)
            .map(|c| Pose::new(c[0], c[1], c[2]))
            .collect();
        Self::new(poses, sampling)
    }

    /// Build from an unbatched `[num_poses, 3]` tensor.
    pub fn from_tensor<B: Backend>(
        poses: Tensor<B, 2>,
        sampling: TrajectorySampling,
    ) -> Result<Self, AgentError> {
        let [_, width] = poses.dims();
        if width != POSE_DIM {
            return Err(AgentError::InvalidTrajectory(format!(
                "expected {POSE_DIM} values per pose, got {width}"
            )));
        }
        let values = DynTensor::from(poses).to_vec()?;
        Self::from_flat(&values, sampling)
    }

    pub fn poses(&self) -> &[Pose] {
        &self.poses
    }

    pub fn sampling(&self) -> TrajectorySampling {
        self.sampling
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Row-major `[num_poses, 3]` values.
    pub fn to_flat(&self) -> Vec<f32> {
        self.poses.iter().flat_map(|p| p.to_array()).collect()
    }

    /// The poses as a `[num_poses, 3]` tensor.
    pub fn to_tensor<B: Backend>(&self, device: &B::Device) -> Result<Tensor<B, 2>, AgentError> {
        DynTensor::from_values(self.to_flat(), &[self.poses.len(), POSE_DIM], device)?.try_into()
    }
}

// ---------------------------------------------------------------------------
// Agent input
// ---------------------------------------------------------------------------

/// Ego vehicle state at one history frame.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EgoStatus {
    /// `[x, y, heading]` in the current ego frame.
    pub ego_pose: [f32; 3],
    /// `[vx, vy]` in m/s.
    pub ego_velocity: [f32; 2],
    /// `[ax, ay]` in m/s^2.
    pub ego_acceleration: [f32; 2],
    /// One-hot high-level driving command (left, straight, right, unknown).
    pub driving_command: [f32; 4],
}

/// Raw sensor payload for one channel at one history frame.
///
/// The payload format is opaque to this crate; builders interpret it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorFrame {
    pub channel: SensorChannel,
    /// Index into the history window (0 = oldest).
    pub history_index: usize,
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

/// Everything an agent may observe at one decision instant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentInput {
    /// Ego states over the history window; the last entry is the current one.
    pub ego_statuses: Vec<EgoStatus>,
    #[serde(default)]
    pub sensors: Vec<SensorFrame>,
}

impl AgentInput {
    pub fn current_ego_status(&self) -> Result<&EgoStatus, AgentError> {
        self.ego_statuses.last().ok_or(AgentError::MissingEgoStatus)
    }

    /// A copy holding only the sensor frames the configuration asks for.
    pub fn filtered(&self, config: &SensorConfig) -> Self {
        Self {
            ego_statuses: self.ego_statuses.clone(),
            sensors: self
                .sensors
                .iter()
                .filter(|frame| config.admits(frame.channel, frame.history_index))
                .cloned()
                .collect(),
        }
    }
}

/// A logged scenario: the agent input plus privileged ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    /// Unique identifier of the decision instant.
    pub token: String,
    pub agent_input: AgentInput,
    /// Recorded human trajectory following the decision instant.
    pub future_trajectory: Trajectory,
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn sampling(n: usize) -> TrajectorySampling {
        TrajectorySampling {
            num_poses: n,
            interval_length: 0.5,
        }
    }

    #[test]
    fn test_sampling_defaults() {
        let s = TrajectorySampling::default();
        assert_eq!(s.num_poses, 8);
        assert!((s.time_horizon() - 4.0).abs() < 1e-6);
        assert_eq!(s.timestamps().len(), 8);
        assert!((s.timestamps()[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_trajectory_pose_count_checked() {
        let err = Trajectory::new(vec![Pose::default(); 3], sampling(4)).unwrap_err();
        assert!(matches!(err, AgentError::InvalidTrajectory(_)));
    }

    #[test]
    fn test_from_flat_partial_pose() {
        assert!(Trajectory::from_flat(&[1.0, 2.0], sampling(1)).is_err());
    }

    #[test]
    fn test_tensor_conversion() {
        let device = Default::default();
        let traj = Trajectory::from_flat(&[1.0, 2.0, 0.1, 3.0, 4.0, 0.2], sampling(2)).unwrap();
        let tensor = traj.to_tensor::<TestBackend>(&device).unwrap();
        assert_eq!(tensor.dims(), [2, 3]);

        let back = Trajectory::from_tensor(tensor, sampling(2)).unwrap();
        assert_eq!(back.poses()[1], Pose::new(3.0, 4.0, 0.2));
    }

    #[test]
    fn test_from_tensor_wrong_width() {
        let device = Default::default();
        let tensor: Tensor<TestBackend, 2> = Tensor::zeros([2, 4], &device);
        assert!(Trajectory::from_tensor(tensor, sampling(2)).is_err());
    }

    #[test]
    fn test_current_ego_status() {
        let mut input = AgentInput::default();
        assert_eq!(
            input.current_ego_status().unwrap_err(),
            AgentError::MissingEgoStatus
        );

        input.ego_statuses.push(EgoStatus {
            ego_velocity: [3.0, 4.0],
            ..Default::default()
        });
        assert_eq!(input.current_ego_status().unwrap().ego_velocity, [3.0, 4.0]);
    }
}
