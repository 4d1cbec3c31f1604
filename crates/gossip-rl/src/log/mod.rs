//! Training metric sinks.
//!
//! Provides:
//! - `MetricLogger` trait for composable backends
//! - `ConsoleLogger` which forwards metrics to `tracing`
//! - `MemoryLogger` which keeps every value for later inspection
//! - `CompositeLogger` for multi-backend logging

mod console;
mod logger;

pub use console::ConsoleLogger;
pub use logger::{CompositeLogger, MemoryLogger, MetricLogger, Metrics, NoOpLogger};
