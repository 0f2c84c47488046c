//! Metrics for the object store
//!
//! Uses the `metrics` facade; without an installed recorder every call is a
//! cheap no-op, so library code records unconditionally.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

pub const OBJECTS_CREATED: &str = "objectstore.objects.created";
pub const OBJECTS_DELETED: &str = "objectstore.objects.deleted";
pub const CACHE_SAVE: &str = "objectstore.cache.save";
pub const CACHE_REVOKE: &str = "objectstore.cache.revoke";
pub const CACHE_FAILED: &str = "objectstore.cache.failed";
pub const CACHE_WAIT_MS: &str = "objectstore.cache.wait_ms";
pub const RESTORE_ROUNDS: &str = "objectstore.restore.rounds";
pub const RESTORE_COMPLETED: &str = "objectstore.restore.completed";

/// Initialize metrics with descriptions
pub fn init_metrics() {
    describe_counter!(OBJECTS_CREATED, "Number of distributed objects created");
    describe_counter!(OBJECTS_DELETED, "Number of distributed objects deleted");
    describe_counter!(CACHE_SAVE, "Remote cache save operations issued");
    describe_counter!(CACHE_REVOKE, "Remote cache revoke operations issued");
    describe_counter!(CACHE_FAILED, "Remote cache operations that did not succeed");
    describe_histogram!(CACHE_WAIT_MS, "Time spent waiting for a remote cache callback in milliseconds");
    describe_counter!(RESTORE_ROUNDS, "Restore polling rounds executed");
    describe_counter!(RESTORE_COMPLETED, "Restore runs that finished, by outcome");
}

/// Record a counter metric
pub fn record_counter(name: &'static str, value: u64) {
    counter!(name).increment(value);
}

/// Record a counter metric carrying an `outcome` label
pub fn record_outcome(name: &'static str, outcome: &'static str) {
    counter!(name, "outcome" => outcome).increment(1);
}

/// Timer for measuring operation duration
pub struct Timer {
    name: &'static str,
    start: Instant,
}

impl Timer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    /// Stop the timer and record the duration
    pub fn stop(self) {
        let duration = self.start.elapsed();
        histogram!(self.name).record(duration.as_secs_f64() * 1000.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        init_metrics();
        record_counter(OBJECTS_CREATED, 1);
        record_outcome(RESTORE_COMPLETED, "finished");
        Timer::new(CACHE_WAIT_MS).stop();
    }
}
