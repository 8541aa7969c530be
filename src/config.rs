use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::common::TrajectorySampling;
use crate::training::optim::SchedulerKind;

/// Complete configuration for agent construction and training.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavsimConfig {
    pub agent: AgentConfig,
    pub training: TrainingConfig,
}

impl NavsimConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }
}

/// Which agent to build, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentConfig {
    ConstantVelocity {
        #[serde(default)]
        sampling: TrajectorySampling,
    },
    EgoStatusMlp(EgoStatusMlpConfig),
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::EgoStatusMlp(EgoStatusMlpConfig::default())
    }
}

/// Hyper-parameters of the ego-status MLP agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EgoStatusMlpConfig {
    /// Width of every hidden layer (default: 512).
    pub hidden_layer_dim: usize,
    /// Adam learning rate (default: 1e-4).
    pub learning_rate: f64,
    /// Optional epoch-indexed learning-rate schedule.
    pub lr_scheduler: Option<SchedulerKind>,
    pub sampling: TrajectorySampling,
    /// Append the one-hot style label to the network input (default: false).
    pub style_conditioning: bool,
    /// Weights to load in `initialize`.
    pub checkpoint_path: Option<PathBuf>,
}

impl Default for EgoStatusMlpConfig {
    fn default() -> Self {
        Self {
            hidden_layer_dim: 512,
            learning_rate: 1e-4,
            lr_scheduler: None,
            sampling: TrajectorySampling::default(),
            style_conditioning: false,
            checkpoint_path: None,
        }
    }
}

/// Training loop configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of passes over the training set (default: 10).
    pub max_epochs: usize,
    /// Scenes per batch (default: 32).
    pub batch_size: usize,
    /// Trailing share of scenes held out for validation (default: 0.1).
    pub val_fraction: f64,
    /// Reshuffle the training order every epoch (default: true).
    pub shuffle: bool,
    /// Seed for the shuffling RNG (default: 42).
    pub seed: u64,
    /// Emit a progress line every N optimizer steps (default: 50).
    pub log_every_n_steps: usize,
    /// Where to write weights and the run summary; nothing is saved when unset.
    pub checkpoint_dir: Option<PathBuf>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            max_epochs: 10,
            batch_size: 32,
            val_fraction: 0.1,
            shuffle: true,
            seed: 42,
            log_every_n_steps: 50,
            checkpoint_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_json_gives_defaults() {
        let config: NavsimConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, NavsimConfig::default());
        assert_eq!(config.training.batch_size, 32);
    }

    #[test]
    fn test_partial_agent_config() {
        let config: NavsimConfig = serde_json::from_str(
            r#"{
                "agent": {"type": "ego_status_mlp", "hidden_layer_dim": 64,
                          "lr_scheduler": {"type": "step_decay", "step_size": 5, "gamma": 0.5}},
                "training": {"max_epochs": 3}
            }"#,
        )
        .unwrap();

        let AgentConfig::EgoStatusMlp(mlp) = &config.agent else {
            panic!("expected ego_status_mlp, got {:?}", config.agent);
        };
        assert_eq!(mlp.hidden_layer_dim, 64);
        assert_eq!(mlp.learning_rate, 1e-4);
        assert_eq!(
            mlp.lr_scheduler,
            Some(SchedulerKind::StepDecay {
                step_size: 5,
                gamma: 0.5
            })
        );
        assert_eq!(config.training.max_epochs, 3);
        assert!(config.training.shuffle);
    }

    #[test]
    fn test_constant_velocity_config() {
        let config: AgentConfig = serde_json::from_str(
            r#"{"type": "constant_velocity", "sampling": {"num_poses": 4, "interval_length": 1.0}}"#,
        )
        .unwrap();
        assert_eq!(
            config,
            AgentConfig::ConstantVelocity {
                sampling: TrajectorySampling {
                    num_poses: 4,
                    interval_length: 1.0
                }
            }
        );
    }

    #[test]
    fn test_unknown_agent_type_rejected() {
        let result = serde_json::from_str::<AgentConfig>(r#"{"type": "transfuser"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"training": {{"seed": 7}}}}"#).unwrap();
        let config = NavsimConfig::from_file(file.path()).unwrap();
        assert_eq!(config.training.seed, 7);

        let err = NavsimConfig::from_file(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }
}
