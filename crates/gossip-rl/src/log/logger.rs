//! Metric logger traits and composites.

use std::collections::BTreeMap;
use std::sync::Mutex;

/// Named scalar values reported together, sorted by name.
pub type Metrics = BTreeMap<&'static str, f64>;

/// Trait for logging metrics to various backends.
///
/// `step` is the trainer's lifetime timestep count when the values were
/// produced.
pub trait MetricLogger: Send + Sync {
    /// Log a scalar value (e.g. reward, loss).
    fn log_scalar(&self, name: &str, value: f64, step: u64);

    /// Log the metrics of one update.
    fn log_metrics(&self, metrics: &Metrics, step: u64) {
        for (name, value) in metrics {
            self.log_scalar(name, *value, step);
        }
    }

    /// Flush any pending writes.
    fn close(&self) {}
}

/// A logger that does nothing.
pub struct NoOpLogger;

impl MetricLogger for NoOpLogger {
    fn log_scalar(&self, _name: &str, _value: f64, _step: u64) {}
    fn log_metrics(&self, _metrics: &Metrics, _step: u64) {}
}

/// Keeps every logged value in memory.
#[derive(Default)]
pub struct MemoryLogger {
    records: Mutex<Vec<(String, f64, u64)>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(value, step)` logged under `name`, oldest first
    pub fn history(&self, name: &str) -> Vec<(f64, u64)> {
        match self.records.lock() {
            Ok(records) => records
                .iter()
                .filter(|(n, _, _)| n == name)
                .map(|(_, v, s)| (*v, *s))
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Most recent value logged under `name`
    pub fn last(&self, name: &str) -> Option<f64> {
        self.history(name).last().map(|(v, _)| *v)
    }
}

impl MetricLogger for MemoryLogger {
    fn log_scalar(&self, name: &str, value: f64, step: u64) {
        if let Ok(mut records) = self.records.lock() {
            records.push((name.to_string(), value, step));
        }
    }
}

/// A composite logger that dispatches to multiple backends.
pub struct CompositeLogger {
    loggers: Vec<Box<dyn MetricLogger>>,
}

impl CompositeLogger {
    pub fn new(loggers: Vec<Box<dyn MetricLogger>>) -> Self {
        Self { loggers }
    }

    pub fn add(&mut self, logger: Box<dyn MetricLogger>) {
        self.loggers.push(logger);
    }
}

impl MetricLogger for CompositeLogger {
    fn log_scalar(&self, name: &str, value: f64, step: u64) {
        for logger in &self.loggers {
            logger.log_scalar(name, value, step);
        }
    }

    fn log_metrics(&self, metrics: &Metrics, step: u64) {
        for logger in &self.loggers {
            logger.log_metrics(metrics, step);
        }
    }

    fn close(&self) {
        for logger in &self.loggers {
            logger.close();
        }
    }
}
