//! Console logging backend.

use super::{MetricLogger, Metrics};
use crate::utils::abbreviate;

/// Logger that reports metrics through `tracing` at info level.
pub struct ConsoleLogger {
    tag: String,
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new("train")
    }
}

impl ConsoleLogger {
    /// `tag` is attached to every event, e.g. the algorithm name
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

impl MetricLogger for ConsoleLogger {
    fn log_scalar(&self, name: &str, value: f64, step: u64) {
        tracing::info!(tag = %self.tag, step, "{} = {:.4}", name, value);
    }

    fn log_metrics(&self, metrics: &Metrics, step: u64) {
        // one line per update
        let line = metrics
            .iter()
            .map(|(k, v)| format!("{k}={v:.4}"))
            .collect::<Vec<_>>()
            .join(", ");
        tracing::info!(tag = %self.tag, step, "[{}] {}", abbreviate(step), line);
    }
}
