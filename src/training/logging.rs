//! Metric logging for training and validation steps.
//!
//! The training step adapter writes [`MetricRecord`]s to a [`MetricLogger`].
//! The trainer uses a [`MetricAggregator`] to keep the latest step values and
//! batch-weighted epoch means; [`TracingMetricLogger`] forwards every record
//! to `tracing`.

use std::collections::BTreeMap;

use tracing::debug;

/// Metric name to value, e.g. `"train/loss" -> 0.42`.
pub type EpochMetrics = BTreeMap<String, f64>;

/// One logged scalar.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    /// Namespaced key such as `"train/loss"`.
    pub key: String,
    pub value: f64,
    /// Number of samples the value was computed over.
    pub batch_size: Option<usize>,
    /// Keep the per-step value.
    pub on_step: bool,
    /// Fold the value into the epoch mean.
    pub on_epoch: bool,
    /// Show in progress output.
    pub prog_bar: bool,
    /// Reduce across workers before reporting.
    pub sync_dist: bool,
}

impl MetricRecord {
    /// A record with every reporting flag set.
    pub fn new(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            value,
            batch_size: None,
            on_step: true,
            on_epoch: true,
            prog_bar: true,
            sync_dist: true,
        }
    }

    pub fn with_batch_size(mut self, batch_size: Option<usize>) -> Self {
        self.batch_size = batch_size;
        self
    }
}

/// Sink for metric records.
pub trait MetricLogger {
    fn log(&mut self, record: MetricRecord);
}

impl<L: MetricLogger + ?Sized> MetricLogger for &mut L {
    fn log(&mut self, record: MetricRecord) {
        (**self).log(record);
    }
}

/// Fan out to two loggers.
impl<L: MetricLogger, R: MetricLogger> MetricLogger for (L, R) {
    fn log(&mut self, record: MetricRecord) {
        self.0.log(record.clone());
        self.1.log(record);
    }
}

/// Emits every record as a `tracing` debug event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingMetricLogger;

impl MetricLogger for TracingMetricLogger {
    fn log(&mut self, record: MetricRecord) {
        debug!(
            metric = %record.key,
            value = record.value,
            batch_size = ?record.batch_size,
            "logged metric"
        );
    }
}

/// In-memory logger with per-step and per-epoch views.
#[derive(Debug, Clone, Default)]
pub struct MetricAggregator {
    records: Vec<MetricRecord>,
    latest: BTreeMap<String, f64>,
    /// key -> (weighted sum, total weight) for the running epoch.
    epoch: BTreeMap<String, (f64, f64)>,
}

impl MetricAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records received during the running epoch, in order.
    pub fn records(&self) -> &[MetricRecord] {
        &self.records
    }

    /// Most recent step value of `key`.
    pub fn latest(&self, key: &str) -> Option<f64> {
        self.latest.get(key).copied()
    }

    /// Batch-weighted mean of `key` over the running epoch.
    pub fn epoch_mean(&self, key: &str) -> Option<f64> {
        self.epoch
            .get(key)
            .filter(|(_, weight)| *weight > 0.0)
            .map(|(sum, weight)| sum / weight)
    }

    /// Close the running epoch and return its means.
    pub fn finish_epoch(&mut self) -> EpochMetrics {
        self.records.clear();
        std::mem::take(&mut self.epoch)
            .into_iter()
            .filter(|(_, (_, weight))| *weight > 0.0)
            .map(|(key, (sum, weight))| (key, sum / weight))
            .collect()
    }
}

impl MetricLogger for MetricAggregator {
    fn log(&mut self, record: MetricRecord) {
        if record.on_step {
            self.latest.insert(record.key.clone(), record.value);
        }
        if record.on_epoch {
            let weight = record.batch_size.unwrap_or(1) as f64;
            let entry = self.epoch.entry(record.key.clone()).or_insert((0.0, 0.0));
            entry.0 += record.value * weight;
            entry.1 += weight;
        }
        self.records.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_value() {
        let mut agg = MetricAggregator::new();
        agg.log(MetricRecord::new("train/loss", 2.0));
        agg.log(MetricRecord::new("train/loss", 1.0));
        assert_eq!(agg.latest("train/loss"), Some(1.0));
        assert_eq!(agg.latest("val/loss"), None);
        assert_eq!(agg.records().len(), 2);
    }

    #[test]
    fn test_epoch_mean_is_batch_weighted() {
        let mut agg = MetricAggregator::new();
        agg.log(MetricRecord::new("train/loss", 1.0).with_batch_size(Some(3)));
        agg.log(MetricRecord::new("train/loss", 5.0).with_batch_size(Some(1)));
        assert!((agg.epoch_mean("train/loss").unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_finish_epoch_resets() {
        let mut agg = MetricAggregator::new();
        agg.log(MetricRecord::new("val/loss", 4.0));
        let metrics = agg.finish_epoch();
        assert_eq!(metrics.get("val/loss"), Some(&4.0));
        assert!(agg.finish_epoch().is_empty());
        assert!(agg.records().is_empty());
        // Step values survive the epoch boundary.
        assert_eq!(agg.latest("val/loss"), Some(4.0));
    }

    #[test]
    fn test_pair_logs_to_both() {
        let mut pair = (MetricAggregator::new(), MetricAggregator::new());
        pair.log(MetricRecord::new("train/loss", 3.0));
        assert_eq!(pair.0.latest("train/loss"), Some(3.0));
        assert_eq!(pair.1.latest("train/loss"), Some(3.0));
    }

    #[test]
    fn test_step_only_record_skips_epoch() {
        let mut agg = MetricAggregator::new();
        let mut record = MetricRecord::new("train/lr", 0.1);
        record.on_epoch = false;
        agg.log(record);
        assert_eq!(agg.epoch_mean("train/lr"), None);
        assert_eq!(agg.latest("train/lr"), Some(0.1));
    }
}
