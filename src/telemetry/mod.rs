//! Telemetry
//!
//! Observability components for the session lifecycle.
//!
//! This module provides:
//!
//! - **Metrics**: renewal, retry, single-flight and teardown counters
//! - **Logging**: `tracing-subscriber` initialization

pub mod logging;
pub mod metrics;

// Metrics
pub use metrics::{
    create_in_memory_metrics, no_op_metrics, InMemorySessionMetrics, MetricEntry, MetricLabels,
    NoOpSessionMetrics, SessionMetrics,
};

// Logging
pub use logging::{log_session_error, LogFormat, LogLevel, LoggingConfig};
