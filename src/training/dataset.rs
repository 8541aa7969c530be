//! Scene loading, splitting and batching.

use std::path::Path;

use anyhow::{Context, Result};
use burn::tensor::backend::Backend;
use tracing::{debug, info};

use super::module::Batch;
use crate::agent::{StyleTable, TrainableAgent};
use crate::common::Scene;
use crate::error::AgentError;
use crate::tensor::TensorMap;

/// Features and targets for one scene, before batching.
#[derive(Debug, Clone)]
pub struct Sample<B: Backend> {
    pub token: String,
    pub features: TensorMap<B>,
    pub targets: TensorMap<B>,
}

/// An ordered collection of logged scenes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneDataset {
    scenes: Vec<Scene>,
}

impl SceneDataset {
    pub fn from_scenes(scenes: Vec<Scene>) -> Self {
        Self { scenes }
    }

    /// Load a JSON array of scenes.
    pub fn load_json(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenes from {}", path.display()))?;
        let scenes: Vec<Scene> = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse scenes from {}", path.display()))?;
        info!(path = %path.display(), scenes = scenes.len(), "loaded scenes");
        Ok(Self { scenes })
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    /// Split off the trailing `val_fraction` of scenes for validation.
    ///
    /// The split is positional so the same file always yields the same sets.
    /// At least one scene stays in the training set when there is any.
    pub fn split(&self, val_fraction: f64) -> (SceneDataset, SceneDataset) {
        let len = self.scenes.len();
        let fraction = val_fraction.clamp(0.0, 1.0);
        let val_len = ((len as f64) * fraction).round() as usize;
        let val_len = val_len.min(len.saturating_sub(1));
        let (train, val) = self.scenes.split_at(len - val_len);
        (
            Self::from_scenes(train.to_vec()),
            Self::from_scenes(val.to_vec()),
        )
    }

    /// Run the agent's feature and target builders over every scene.
    ///
    /// Features see only the sensors the agent asks for.
    pub fn build_samples<B, A>(
        &self,
        agent: &A,
        style: Option<&StyleTable>,
    ) -> Result<Vec<Sample<B>>, AgentError>
    where
        B: Backend,
        A: TrainableAgent<B>,
    {
        let sensor_config = agent.sensor_config();
        let samples = self
            .scenes
            .iter()
            .map(|scene| {
                let input = scene.agent_input.filtered(&sensor_config);
                Ok(Sample {
                    token: scene.token.clone(),
                    features: agent.compute_features(&input, &scene.token, style)?,
                    targets: agent.compute_targets(scene)?,
                })
            })
            .collect::<Result<Vec<_>, AgentError>>()?;
        debug!(agent = %agent.name(), samples = samples.len(), "built samples");
        Ok(samples)
    }
}

/// Group samples into batches following `order`.
///
/// The final batch is smaller when `order.len()` is not a multiple of
/// `batch_size`.
pub fn collate<B: Backend>(
    samples: &[Sample<B>],
    order: &[usize],
    batch_size: usize,
) -> Result<Vec<Batch<B>>, AgentError> {
    order
        .chunks(batch_size.max(1))
        .map(|chunk| {
            let (features, targets): (Vec<_>, Vec<_>) = chunk
                .iter()
                .map(|&i| (samples[i].features.clone(), samples[i].targets.clone()))
                .unzip();
            Ok(Batch::new(
                TensorMap::stack(features)?,
                TensorMap::stack(targets)?,
            ))
        })
        .collect()
}

/// A scene whose ego drives straight at `(vx, vy)` with the matching future.
#[cfg(test)]
pub(crate) fn constant_velocity_scene(token: &str, vx: f32, vy: f32) -> Scene {
    use crate::common::{AgentInput, EgoStatus, Pose, Trajectory, TrajectorySampling};

    let sampling = TrajectorySampling::default();
    let poses = sampling
        .timestamps()
        .into_iter()
        .map(|t| Pose::new(vx * t, vy * t, 0.0))
        .collect();
    let status = EgoStatus {
        ego_velocity: [vx, vy],
        driving_command: [0.0, 1.0, 0.0, 0.0],
        ..Default::default()
    };
    Scene {
        token: token.to_string(),
        agent_input: AgentInput {
            ego_statuses: vec![status.clone(), status],
            sensors: Vec::new(),
        },
        future_trajectory: Trajectory::new(poses, sampling).expect("valid trajectory"),
    }
}
