//! Metrics
//!
//! Session lifecycle metrics collection interfaces and implementations.

use parking_lot::Mutex;
use std::collections::HashMap;

/// Metric labels.
pub type MetricLabels = HashMap<String, String>;

/// Session lifecycle metrics interface.
pub trait SessionMetrics: Send + Sync {
    /// Record a renewal transport call being started.
    fn record_renewal_attempt(&self, attempt: u32);

    /// Record the outcome of a renewal transport call.
    fn record_renewal_result(&self, success: bool, duration_ms: f64);

    /// Record a caller joining a renewal already in flight.
    fn record_single_flight_join(&self);

    /// Record a retry being scheduled after a transient failure.
    fn record_retry(&self, attempt: u32, delay_ms: f64);

    /// Record the session being torn down.
    fn record_teardown(&self, error_code: &str);

    /// Record a liveness signal and whether it triggered a renewal.
    fn record_liveness_signal(&self, triggered: bool);
}

/// No-op metrics implementation.
pub struct NoOpSessionMetrics;

impl SessionMetrics for NoOpSessionMetrics {
    fn record_renewal_attempt(&self, _attempt: u32) {}
    fn record_renewal_result(&self, _success: bool, _duration_ms: f64) {}
    fn record_single_flight_join(&self) {}
    fn record_retry(&self, _attempt: u32, _delay_ms: f64) {}
    fn record_teardown(&self, _error_code: &str) {}
    fn record_liveness_signal(&self, _triggered: bool) {}
}

/// No-op metrics singleton.
pub fn no_op_metrics() -> NoOpSessionMetrics {
    NoOpSessionMetrics
}

/// Metric entry for in-memory storage.
#[derive(Debug, Clone)]
pub struct MetricEntry {
    pub name: String,
    pub value: f64,
    pub labels: MetricLabels,
    pub timestamp: u64,
}

/// In-memory metrics for testing.
#[derive(Default)]
pub struct InMemorySessionMetrics {
    entries: Mutex<Vec<MetricEntry>>,
}

impl InMemorySessionMetrics {
    /// Create new in-memory metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded entries.
    pub fn get_entries(&self) -> Vec<MetricEntry> {
        self.entries.lock().clone()
    }

    /// Get entries by name.
    pub fn get_entries_by_name(&self, name: &str) -> Vec<MetricEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.name == name)
            .cloned()
            .collect()
    }

    /// Number of entries recorded under `name`.
    pub fn count(&self, name: &str) -> usize {
        self.entries.lock().iter().filter(|e| e.name == name).count()
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    fn record(&self, name: &str, value: f64, labels: MetricLabels) {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        self.entries.lock().push(MetricEntry {
            name: name.to_string(),
            value,
            labels,
            timestamp: now,
        });
    }
}

impl SessionMetrics for InMemorySessionMetrics {
    fn record_renewal_attempt(&self, attempt: u32) {
        let mut labels = MetricLabels::new();
        labels.insert("attempt".to_string(), attempt.to_string());
        self.record("session_renewal_attempts_total", 1.0, labels);
    }

    fn record_renewal_result(&self, success: bool, duration_ms: f64) {
        let mut labels = MetricLabels::new();
        labels.insert("success".to_string(), success.to_string());
        self.record("session_renewals_total", 1.0, labels.clone());
        self.record("session_renewal_duration_ms", duration_ms, labels);
    }

    fn record_single_flight_join(&self) {
        self.record("session_single_flight_joins_total", 1.0, MetricLabels::new());
    }

    fn record_retry(&self, attempt: u32, delay_ms: f64) {
        let mut labels = MetricLabels::new();
        labels.insert("attempt".to_string(), attempt.to_string());
        self.record("session_renewal_retry_delay_ms", delay_ms, labels);
    }

    fn record_teardown(&self, error_code: &str) {
        let mut labels = MetricLabels::new();
        labels.insert("error_code".to_string(), error_code.to_string());
        self.record("session_teardowns_total", 1.0, labels);
    }

    fn record_liveness_signal(&self, triggered: bool) {
        let mut labels = MetricLabels::new();
        labels.insert("triggered".to_string(), triggered.to_string());
        self.record("session_liveness_signals_total", 1.0, labels);
    }
}

/// Create in-memory metrics for testing.
pub fn create_in_memory_metrics() -> InMemorySessionMetrics {
    InMemorySessionMetrics::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_metrics() {
        let metrics = InMemorySessionMetrics::new();

        metrics.record_renewal_attempt(1);
        metrics.record_renewal_result(false, 12.0);
        metrics.record_retry(1, 1000.0);
        metrics.record_teardown("SESSION_RENEWAL_REJECTED");

        assert_eq!(metrics.get_entries().len(), 5);
        assert_eq!(metrics.count("session_renewals_total"), 1);

        let retries = metrics.get_entries_by_name("session_renewal_retry_delay_ms");
        assert_eq!(retries[0].value, 1000.0);
        assert_eq!(retries[0].labels.get("attempt"), Some(&"1".to_string()));

        metrics.clear();
        assert!(metrics.get_entries().is_empty());
    }

    #[test]
    fn test_no_op_metrics() {
        let metrics = no_op_metrics();
        metrics.record_renewal_attempt(1);
        metrics.record_teardown("SESSION_NONE");
    }
}
