//! Error taxonomy shared by agents, builders, tensor maps and the training
//! step adapter.

use std::fmt;

use thiserror::Error;

/// An optional agent capability that a concrete agent may not provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Target building, loss computation and optimizer configuration.
    Training,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Training => f.write_str("training"),
        }
    }
}

/// Errors raised by the agent contract and the code that drives it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AgentError {
    #[error("agent `{agent}` does not support {capability}")]
    CapabilityNotSupported {
        agent: String,
        capability: Capability,
    },

    #[error("key `{key}` is produced by more than one builder")]
    DuplicateKey { key: String },

    #[error("required key `{key}` is missing")]
    MissingKey { key: String },

    #[error("expected a rank-{expected} tensor, got rank {actual}")]
    RankMismatch { expected: usize, actual: usize },

    #[error("cannot add a batch dimension to a rank-{rank} tensor")]
    RankOverflow { rank: usize },

    #[error("expected a leading batch dimension of size 1, got shape {shape:?}")]
    BatchDimension { shape: Vec<usize> },

    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("cannot collate an empty batch")]
    EmptyBatch,

    #[error("loss terms do not contain the `{name}` entry")]
    MissingLossTerm { name: String },

    #[error("loss `{name}` is not a scalar (shape {shape:?})")]
    NonScalarLoss { name: String, shape: Vec<usize> },

    #[error("invalid trajectory: {0}")]
    InvalidTrajectory(String),

    #[error("agent input carries no ego status")]
    MissingEgoStatus,

    #[error("tensor data conversion failed: {0}")]
    TensorData(String),

    #[error("checkpoint error: {0}")]
    Checkpoint(String),
}

impl AgentError {
    /// Shorthand for a training capability failure on the named agent.
    pub fn training_not_supported(agent: impl Into<String>) -> Self {
        Self::CapabilityNotSupported {
            agent: agent.into(),
            capability: Capability::Training,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_message() {
        let err = AgentError::training_not_supported("ConstantVelocityAgent");
        assert_eq!(
            err.to_string(),
            "agent `ConstantVelocityAgent` does not support training"
        );
    }

    #[test]
    fn test_missing_loss_term_message() {
        let err = AgentError::MissingLossTerm {
            name: "loss".into(),
        };
        assert!(err.to_string().contains("`loss`"));
    }
}
