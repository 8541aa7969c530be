//! Driving agents: the contract, its building blocks and the bundled agents.
//!
//! - [`traits`] -- [`Agent`], [`InferenceAgent`], [`TrainableAgent`].
//! - [`builders`] -- feature and target builders.
//! - [`loss`] -- scalar or named-term losses.
//! - [`style`] -- per-scene style labels used as an extra feature.
//! - [`constant_velocity`], [`ego_status_mlp`] -- concrete agents.
//!
//! [`AnyAgent`] selects a concrete agent at runtime from an [`AgentConfig`].

pub mod builders;
pub mod constant_velocity;
pub mod ego_status_mlp;
pub mod loss;
pub mod style;
pub mod traits;

pub use builders::{
    EgoStatusFeatureBuilder, FeatureBuilder, TargetBuilder, TrajectoryTargetBuilder,
    EGO_STATUS_KEY, TRAJECTORY_KEY,
};
pub use constant_velocity::ConstantVelocityAgent;
pub use ego_status_mlp::EgoStatusMlpAgent;
pub use loss::{Loss, LossTerms, TOTAL_LOSS_KEY};
pub use style::{StyleLabel, StyleTable, STYLE_FEATURE_KEY};
pub use traits::{Agent, InferenceAgent, TrainableAgent};

use burn::tensor::backend::Backend;

use crate::common::{SensorConfig, TrajectorySampling};
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::tensor::TensorMap;
use crate::training::callbacks::TrainingCallback;

// ---------------------------------------------------------------------------
// AnyAgent: enum dispatch over the bundled agents
// ---------------------------------------------------------------------------

/// An enum wrapper around all concrete agent types, enabling runtime agent
/// selection from configuration.
#[derive(Debug, Clone)]
pub enum AnyAgent<B: Backend> {
    ConstantVelocity(ConstantVelocityAgent<B>),
    EgoStatusMlp(EgoStatusMlpAgent<B>),
}

impl<B: Backend> AnyAgent<B> {
    pub fn from_config(config: &AgentConfig, device: &B::Device) -> Self {
        match config {
            AgentConfig::ConstantVelocity { sampling } => {
                Self::ConstantVelocity(ConstantVelocityAgent::new(*sampling, device))
            }
            AgentConfig::EgoStatusMlp(mlp) => Self::EgoStatusMlp(mlp.init(device)),
        }
    }

    /// Whether the selected agent can be trained.
    pub fn is_trainable(&self) -> bool {
        matches!(self, Self::EgoStatusMlp(_))
    }

    /// Borrow the selected agent as a trainable one.
    pub fn trainable(&self) -> Result<&EgoStatusMlpAgent<B>, AgentError> {
        match self {
            Self::EgoStatusMlp(agent) => Ok(agent),
            Self::ConstantVelocity(agent) => Err(AgentError::training_not_supported(agent.name())),
        }
    }

    /// Unwrap the selected agent for the training loop.
    pub fn into_trainable(self) -> Result<EgoStatusMlpAgent<B>, AgentError> {
        match self {
            Self::EgoStatusMlp(agent) => Ok(agent),
            Self::ConstantVelocity(agent) => Err(AgentError::training_not_supported(agent.name())),
        }
    }

    /// Target builders of the selected agent; inference-only agents have none.
    pub fn target_builders(&self) -> Result<Vec<Box<dyn TargetBuilder<B>>>, AgentError> {
        self.trainable().map(|agent| agent.target_builders())
    }
}

impl<B: Backend> Agent for AnyAgent<B> {
    fn name(&self) -> String {
        match self {
            Self::ConstantVelocity(a) => a.name(),
            Self::EgoStatusMlp(a) => a.name(),
        }
    }

    fn sensor_config(&self) -> SensorConfig {
        match self {
            Self::ConstantVelocity(a) => a.sensor_config(),
            Self::EgoStatusMlp(a) => a.sensor_config(),
        }
    }

    fn initialize(&mut self) -> Result<(), AgentError> {
        match self {
            Self::ConstantVelocity(a) => a.initialize(),
            Self::EgoStatusMlp(a) => a.initialize(),
        }
    }

    fn requires_scene(&self) -> bool {
        match self {
            Self::ConstantVelocity(a) => a.requires_scene(),
            Self::EgoStatusMlp(a) => a.requires_scene(),
        }
    }

    fn training_callbacks(&self) -> Vec<Box<dyn TrainingCallback>> {
        match self {
            Self::ConstantVelocity(a) => a.training_callbacks(),
            Self::EgoStatusMlp(a) => a.training_callbacks(),
        }
    }
}

impl<B: Backend> InferenceAgent<B> for AnyAgent<B> {
    fn device(&self) -> B::Device {
        match self {
            Self::ConstantVelocity(a) => a.device(),
            Self::EgoStatusMlp(a) => a.device(),
        }
    }

    fn trajectory_sampling(&self) -> TrajectorySampling {
        match self {
            Self::ConstantVelocity(a) => a.trajectory_sampling(),
            Self::EgoStatusMlp(a) => a.trajectory_sampling(),
        }
    }

    fn style_conditioning(&self) -> bool {
        match self {
            Self::ConstantVelocity(a) => a.style_conditioning(),
            Self::EgoStatusMlp(a) => a.style_conditioning(),
        }
    }

    fn feature_builders(&self) -> Vec<Box<dyn FeatureBuilder<B>>> {
        match self {
            Self::ConstantVelocity(a) => a.feature_builders(),
            Self::EgoStatusMlp(a) => a.feature_builders(),
        }
    }

    fn forward(&self, features: &TensorMap<B>) -> Result<TensorMap<B>, AgentError> {
        match self {
            Self::ConstantVelocity(a) => a.forward(features),
            Self::EgoStatusMlp(a) => a.forward(features),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{AgentInput, EgoStatus};
    use crate::config::EgoStatusMlpConfig;
    use crate::error::Capability;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn constant_velocity() -> AnyAgent<TestBackend> {
        AnyAgent::from_config(
            &AgentConfig::ConstantVelocity {
                sampling: TrajectorySampling::default(),
            },
            &Default::default(),
        )
    }

    #[test]
    fn test_inference_only_agent_refuses_training() {
        let agent = constant_velocity();
        assert!(!agent.is_trainable());

        let expected = AgentError::CapabilityNotSupported {
            agent: "ConstantVelocityAgent".into(),
            capability: Capability::Training,
        };
        assert_eq!(agent.target_builders().err(), Some(expected.clone()));
        assert_eq!(agent.into_trainable().err(), Some(expected));
    }

    #[test]
    fn test_dispatch_predicts() {
        let input = AgentInput {
            ego_statuses: vec![EgoStatus {
                ego_velocity: [2.0, 0.0],
                ..Default::default()
            }],
            sensors: Vec::new(),
        };

        let mut agent = constant_velocity();
        agent.initialize().unwrap();
        assert_eq!(agent.name(), "ConstantVelocityAgent");
        let trajectory = agent.compute_trajectory(&input, "t", None).unwrap();
        assert!((trajectory.poses()[0].x - 1.0).abs() < 1e-5);

        let mlp = AnyAgent::<TestBackend>::from_config(
            &AgentConfig::EgoStatusMlp(EgoStatusMlpConfig {
                hidden_layer_dim: 8,
                ..Default::default()
            }),
            &Default::default(),
        );
        assert!(mlp.is_trainable());
        assert!(!mlp.style_conditioning());
        assert_eq!(mlp.target_builders().unwrap().len(), 1);
        assert_eq!(mlp.compute_trajectory(&input, "t", None).unwrap().len(), 8);
    }

    #[test]
    fn test_dispatch_style_conditioning() {
        let agent = AnyAgent::<TestBackend>::from_config(
            &AgentConfig::EgoStatusMlp(EgoStatusMlpConfig {
                hidden_layer_dim: 8,
                style_conditioning: true,
                ..Default::default()
            }),
            &Default::default(),
        );
        assert!(agent.style_conditioning());

        let input = AgentInput {
            ego_statuses: vec![EgoStatus::default()],
            sensors: Vec::new(),
        };
        let features = agent.compute_features(&input, "t", None).unwrap();
        assert!(features.get(STYLE_FEATURE_KEY).is_some());
        assert!(agent.compute_trajectory(&input, "t", None).is_ok());
    }

    #[test]
    fn test_default_contract_values() {
        let agent = constant_velocity();
        assert!(!agent.requires_scene());
        assert!(agent.training_callbacks().is_empty());
        assert!(agent.sensor_config().is_empty());
    }
}
