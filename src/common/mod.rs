//! Data model shared by agents, builders and the training loop.
//!
//! - [`types`] -- poses, trajectories, ego status, agent input and scenes.
//! - [`sensors`] -- the sensor selection an agent declares.

pub mod sensors;
pub mod types;

pub use sensors::{SensorChannel, SensorConfig};
pub use types::{
    AgentInput, EgoStatus, Pose, Scene, SensorFrame, Trajectory, TrajectorySampling, POSE_DIM,
};
