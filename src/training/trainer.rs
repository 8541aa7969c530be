//! The epoch loop that fits a [`TrainableAgent`] to a set of scenes.
//!
//! ```text
//! build samples for train / val
//! for epoch in 0..max_epochs:
//!     shuffle training order (seeded)
//!     for batch: training_step -> backward -> optimizer step
//!     for batch: validation_step (no backward)
//!     callbacks see the epoch means
//! save weights + summary when a checkpoint directory is set
//! ```

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use burn::module::AutodiffModule;
use burn::optim::GradientsParams;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::backend::AutodiffBackend;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::callbacks::{FitContext, TrainingCallback};
use super::dataset::{collate, SceneDataset};
use super::logging::{EpochMetrics, MetricAggregator, TracingMetricLogger};
use super::module::AgentTrainingModule;
use super::optim::ConfiguredOptimizer;
use crate::agent::{StyleTable, TrainableAgent};
use crate::config::TrainingConfig;

/// File stem of the saved weights inside a run directory.
pub const MODEL_FILE_STEM: &str = "model";
/// Name of the JSON run summary inside a run directory.
pub const SUMMARY_FILE_NAME: &str = "summary.json";

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Metrics of one finished epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochSummary {
    pub epoch: usize,
    pub learning_rate: f64,
    pub train: EpochMetrics,
    pub val: EpochMetrics,
}

/// Record of a completed fit run, written next to the checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    pub run_id: String,
    pub agent: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub epochs: Vec<EpochSummary>,
    /// Path of the saved weights, when a checkpoint directory was configured.
    pub checkpoint: Option<PathBuf>,
}

impl FitSummary {
    /// Value of `key` in the training metrics of the last epoch.
    pub fn final_train_metric(&self, key: &str) -> Option<f64> {
        self.epochs.last()?.train.get(key).copied()
    }

    /// Value of `key` in the validation metrics of the last epoch.
    pub fn final_val_metric(&self, key: &str) -> Option<f64> {
        self.epochs.last()?.val.get(key).copied()
    }
}

// ---------------------------------------------------------------------------
// Trainer
// ---------------------------------------------------------------------------

/// Drives [`AgentTrainingModule`] over a dataset for a number of epochs.
pub struct Trainer {
    config: TrainingConfig,
    run_id: String,
    callbacks: Vec<Box<dyn TrainingCallback>>,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            run_id: uuid::Uuid::new_v4().to_string(),
            callbacks: Vec::new(),
        }
    }

    /// Add a callback that runs after the agent's own callbacks.
    pub fn with_callback(mut self, callback: impl TrainingCallback + 'static) -> Self {
        self.callbacks.push(Box::new(callback));
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fit `agent` on `train`, validating on `val` after every epoch.
    ///
    /// Returns the trained agent together with the run summary.
    pub fn fit<B, A>(
        self,
        agent: A,
        train: &SceneDataset,
        val: &SceneDataset,
        style: Option<&StyleTable>,
    ) -> Result<(A, FitSummary)>
    where
        B: AutodiffBackend,
        A: TrainableAgent<B> + AutodiffModule<B>,
    {
        let Trainer {
            config,
            run_id,
            callbacks: extra_callbacks,
        } = self;

        if train.is_empty() {
            bail!("Training set is empty");
        }

        let started_at = Utc::now();
        let agent_name = agent.name();
        let mut callbacks = agent.training_callbacks();
        callbacks.extend(extra_callbacks);

        let train_samples = train
            .build_samples::<B, A>(&agent, style)
            .context("Failed to build training samples")?;
        let val_samples = val
            .build_samples::<B, A>(&agent, style)
            .context("Failed to build validation samples")?;
        let val_order: Vec<usize> = (0..val_samples.len()).collect();
        let val_batches = collate(&val_samples, &val_order, config.batch_size)?;

        let context = FitContext {
            run_id: run_id.clone(),
            agent_name: agent_name.clone(),
            max_epochs: config.max_epochs,
            train_samples: train_samples.len(),
            val_samples: val_samples.len(),
        };
        info!(
            run_id = %run_id,
            agent = %agent_name,
            train = context.train_samples,
            val = context.val_samples,
            epochs = config.max_epochs,
            batch_size = config.batch_size,
            "Starting training"
        );
        for callback in callbacks.iter_mut() {
            callback.on_fit_start(&context);
        }

        let mut module = AgentTrainingModule::new(agent);
        let optimizers = module.configure_optimizers::<B>();
        let mut optimizer = ConfiguredOptimizer::<A, B>::new(optimizers.optimizer());
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut logger = (MetricAggregator::new(), TracingMetricLogger);
        let log_every = config.log_every_n_steps.max(1);

        let mut order: Vec<usize> = (0..train_samples.len()).collect();
        let mut epochs = Vec::with_capacity(config.max_epochs);
        let mut global_step = 0usize;

        for epoch in 0..config.max_epochs {
            let learning_rate = optimizers.learning_rate_at(epoch);
            if config.shuffle {
                order.shuffle(&mut rng);
            }
            let train_batches = collate(&train_samples, &order, config.batch_size)?;

            for (batch_idx, batch) in train_batches.iter().enumerate() {
                let loss = module
                    .training_step::<B>(batch, batch_idx, &mut logger)
                    .with_context(|| format!("Training step {global_step} failed"))?;
                let grads = GradientsParams::from_grads(loss.backward(), module.agent());
                module = module.map_agent(|agent| optimizer.step(learning_rate, agent, grads));
                global_step += 1;

                if global_step % log_every == 0 {
                    info!(
                        epoch,
                        step = global_step,
                        loss = logger.0.latest("train/loss"),
                        learning_rate,
                        "Training step"
                    );
                }
            }
            let train_metrics = logger.0.finish_epoch();
            for callback in callbacks.iter_mut() {
                callback.on_train_epoch_end(epoch, &train_metrics);
            }

            for (batch_idx, batch) in val_batches.iter().enumerate() {
                module
                    .validation_step::<B>(batch, batch_idx, &mut logger)
                    .with_context(|| format!("Validation step {batch_idx} failed"))?;
            }
            let val_metrics = logger.0.finish_epoch();
            if !val_batches.is_empty() {
                for callback in callbacks.iter_mut() {
                    callback.on_validation_epoch_end(epoch, &val_metrics);
                }
            }

            info!(
                epoch,
                learning_rate,
                train_loss = train_metrics.get("train/loss").copied(),
                val_loss = val_metrics.get("val/loss").copied(),
                "Epoch completed"
            );
            epochs.push(EpochSummary {
                epoch,
                learning_rate,
                train: train_metrics,
                val: val_metrics,
            });
        }

        let agent = module.into_agent();
        let mut summary = FitSummary {
            run_id,
            agent: agent_name,
            started_at,
            finished_at: Utc::now(),
            epochs,
            checkpoint: None,
        };

        if let Some(dir) = &config.checkpoint_dir {
            let run_dir = dir.join(&summary.run_id);
            std::fs::create_dir_all(&run_dir)
                .with_context(|| format!("Failed to create {}", run_dir.display()))?;

            let model_path = run_dir.join(MODEL_FILE_STEM);
            agent
                .clone()
                .save_file(&model_path, &NamedMpkFileRecorder::<FullPrecisionSettings>::new())
                .map_err(|e| anyhow!("Failed to save weights to {}: {e:?}", model_path.display()))?;
            summary.checkpoint = Some(model_path.with_extension("mpk"));

            let summary_path = run_dir.join(SUMMARY_FILE_NAME);
            let json = serde_json::to_string_pretty(&summary)
                .context("Failed to serialize run summary")?;
            std::fs::write(&summary_path, json)
                .with_context(|| format!("Failed to write {}", summary_path.display()))?;
            info!(path = %run_dir.display(), "Checkpoint saved");
        } else {
            debug!("No checkpoint directory configured, skipping save");
        }

        if summary.epochs.is_empty() {
            warn!("max_epochs is 0, agent returned untrained");
        }
        for callback in callbacks.iter_mut() {
            callback.on_fit_end(&summary);
        }
        info!(
            run_id = %summary.run_id,
            steps = global_step,
            final_loss = summary.final_train_metric("train/loss"),
            "Training finished"
        );

        Ok((agent, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, EgoStatusMlpAgent};
    use crate::config::EgoStatusMlpConfig;
    use crate::training::dataset::constant_velocity_scene;
    use burn::backend::{Autodiff, NdArray};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    type TrainBackend = Autodiff<NdArray>;

    fn scenes(n: usize) -> SceneDataset {
        SceneDataset::from_scenes(
            (0..n)
                .map(|i| constant_velocity_scene(&format!("s{i}"), 0.5 * i as f32, 0.0))
                .collect(),
        )
    }

    fn mlp_config() -> EgoStatusMlpConfig {
        EgoStatusMlpConfig {
            hidden_layer_dim: 32,
            learning_rate: 1e-2,
            ..Default::default()
        }
    }

    fn training_config(max_epochs: usize) -> TrainingConfig {
        TrainingConfig {
            max_epochs,
            batch_size: 4,
            seed: 7,
            log_every_n_steps: 1,
            ..Default::default()
        }
    }

    #[derive(Clone, Default)]
    struct Counter {
        starts: Arc<AtomicUsize>,
        train_epochs: Arc<AtomicUsize>,
        val_epochs: Arc<AtomicUsize>,
        ends: Arc<AtomicUsize>,
    }

    impl TrainingCallback for Counter {
        fn on_fit_start(&mut self, _context: &FitContext) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_train_epoch_end(&mut self, _epoch: usize, metrics: &EpochMetrics) {
            assert!(metrics.contains_key("train/loss"));
            self.train_epochs.fetch_add(1, Ordering::SeqCst);
        }

        fn on_validation_epoch_end(&mut self, _epoch: usize, metrics: &EpochMetrics) {
            assert!(metrics.contains_key("val/loss"));
            self.val_epochs.fetch_add(1, Ordering::SeqCst);
        }

        fn on_fit_end(&mut self, _summary: &FitSummary) {
            self.ends.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_fit_reduces_loss() {
        let agent: EgoStatusMlpAgent<TrainBackend> = mlp_config().init(&Default::default());
        let (train, val) = scenes(16).split(0.25);

        let (_agent, summary) = Trainer::new(training_config(25))
            .fit::<TrainBackend, _>(agent, &train, &val, None)
            .unwrap();

        assert_eq!(summary.epochs.len(), 25);
        let first = summary.epochs[0].train["train/loss"];
        let last = summary.final_train_metric("train/loss").unwrap();
        assert!(last < first, "loss did not decrease: {first} -> {last}");
        assert!(summary.final_val_metric("val/loss").is_some());
        assert!(summary.checkpoint.is_none());
    }

    #[test]
    fn test_callbacks_run_once_per_epoch() {
        let counter = Counter::default();
        let agent: EgoStatusMlpAgent<TrainBackend> = mlp_config().init(&Default::default());
        let (train, val) = scenes(8).split(0.25);

        Trainer::new(training_config(3))
            .with_callback(counter.clone())
            .fit::<TrainBackend, _>(agent, &train, &val, None)
            .unwrap();

        assert_eq!(counter.starts.load(Ordering::SeqCst), 1);
        assert_eq!(counter.train_epochs.load(Ordering::SeqCst), 3);
        assert_eq!(counter.val_epochs.load(Ordering::SeqCst), 3);
        assert_eq!(counter.ends.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_validation_callbacks_without_val_set() {
        let counter = Counter::default();
        let agent: EgoStatusMlpAgent<TrainBackend> = mlp_config().init(&Default::default());

        let (_agent, summary) = Trainer::new(training_config(2))
            .with_callback(counter.clone())
            .fit::<TrainBackend, _>(agent, &scenes(4), &SceneDataset::default(), None)
            .unwrap();

        assert_eq!(counter.val_epochs.load(Ordering::SeqCst), 0);
        assert!(summary.epochs[1].val.is_empty());
    }

    #[test]
    fn test_empty_training_set_rejected() {
        let agent: EgoStatusMlpAgent<TrainBackend> = mlp_config().init(&Default::default());
        let err = Trainer::new(training_config(1))
            .fit::<TrainBackend, _>(
                agent,
                &SceneDataset::default(),
                &SceneDataset::default(),
                None,
            )
            .unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_checkpoint_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = training_config(1);
        config.checkpoint_dir = Some(dir.path().to_path_buf());
        let trainer = Trainer::new(config);
        let run_id = trainer.run_id().to_string();

        let agent: EgoStatusMlpAgent<TrainBackend> = mlp_config().init(&Default::default());
        let (_agent, summary) = trainer
            .fit::<TrainBackend, _>(agent, &scenes(4), &scenes(2), None)
            .unwrap();

        let checkpoint = summary.checkpoint.clone().unwrap();
        assert!(checkpoint.exists());
        let written = std::fs::read_to_string(dir.path().join(&run_id).join(SUMMARY_FILE_NAME))
            .unwrap();
        let parsed: FitSummary = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed.run_id, run_id);
        assert_eq!(parsed.epochs.len(), 1);

        // Weights load back into a fresh inference agent.
        let mut restored: EgoStatusMlpAgent<NdArray> = EgoStatusMlpConfig {
            checkpoint_path: Some(checkpoint),
            ..mlp_config()
        }
        .init(&Default::default());
        restored.initialize().unwrap();
    }
}
