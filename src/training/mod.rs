//! Training runtime for trainable agents.
//!
//! - [`module`] -- the per-batch step adapter ([`AgentTrainingModule`]).
//! - [`optim`] -- optimizer and learning-rate schedule configuration.
//! - [`logging`] -- metric records, sinks and epoch aggregation.
//! - [`callbacks`] -- lifecycle hooks agents and callers can register.
//! - [`dataset`] -- scene loading, splitting and collation.
//! - [`trainer`] -- the epoch loop with checkpointing.

pub mod callbacks;
pub mod dataset;
pub mod logging;
pub mod module;
pub mod optim;
pub mod trainer;

pub use callbacks::{FitContext, TrainingCallback};
pub use dataset::{collate, Sample, SceneDataset};
pub use logging::{EpochMetrics, MetricAggregator, MetricLogger, MetricRecord, TracingMetricLogger};
pub use module::{AgentTrainingModule, Batch, Phase};
pub use optim::{ConfiguredOptimizer, OptimizerKind, Optimizers, SchedulerKind};
pub use trainer::{EpochSummary, FitSummary, Trainer};
