//! Queue Metrics Module
//!
//! Counters describing how a [`MultiQueue`](crate::MultiQueue) is being used:
//! how often shards are found busy, how often dequeues come back empty, and how
//! long operations take. Recording is a handful of relaxed atomic adds and can be
//! switched off per queue.

use core::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Snapshot of a queue's operation counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueMetrics {
    /// Payloads successfully enqueued
    pub enqueues: u64,
    /// Dequeues that returned a payload
    pub dequeues: u64,
    /// Dequeues whose settled shard was empty
    pub empty_dequeues: u64,
    /// Enqueues rejected by a full shard
    pub capacity_rejections: u64,
    /// Operations abandoned at their deadline
    pub timeouts: u64,
    /// Candidate shards found locked, each one forcing a reselect
    pub contended_retries: u64,
    /// Average operation time in nanoseconds
    pub avg_operation_time_ns: u64,
    /// Maximum operation time in nanoseconds
    pub max_operation_time_ns: u64,
}

impl QueueMetrics {
    /// Every completed or abandoned operation
    pub fn total_operations(&self) -> u64 {
        self.enqueues + self.dequeues + self.empty_dequeues + self.capacity_rejections + self.timeouts
    }

    /// Percentage of dequeues that found a payload
    pub fn hit_rate(&self) -> f64 {
        let attempts = self.dequeues + self.empty_dequeues;
        if attempts == 0 {
            0.0
        } else {
            (self.dequeues as f64 / attempts as f64) * 100.0
        }
    }

    /// Busy shards encountered per hundred operations
    pub fn contention_rate(&self) -> f64 {
        let total = self.total_operations();
        if total == 0 {
            0.0
        } else {
            (self.contended_retries as f64 / total as f64) * 100.0
        }
    }

    /// Get average operation time as Duration
    pub fn avg_operation_time(&self) -> Duration {
        Duration::from_nanos(self.avg_operation_time_ns)
    }

    /// Get maximum operation time as Duration
    pub fn max_operation_time(&self) -> Duration {
        Duration::from_nanos(self.max_operation_time_ns)
    }
}

/// How an operation finished, for [`AtomicMetrics::record`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Enqueued,
    Dequeued,
    Empty,
    Rejected,
    TimedOut,
}

/// Internal atomic metrics collection
#[derive(Debug, Default)]
pub(crate) struct AtomicMetrics {
    enqueues: AtomicU64,
    dequeues: AtomicU64,
    empty_dequeues: AtomicU64,
    capacity_rejections: AtomicU64,
    timeouts: AtomicU64,
    contended_retries: AtomicU64,
    total_time_ns: AtomicU64,
    max_time_ns: AtomicU64,
}

impl AtomicMetrics {
    /// Record a finished operation with its duration
    pub(crate) fn record(&self, outcome: Outcome, duration: Duration) {
        let counter = match outcome {
            Outcome::Enqueued => &self.enqueues,
            Outcome::Dequeued => &self.dequeues,
            Outcome::Empty => &self.empty_dequeues,
            Outcome::Rejected => &self.capacity_rejections,
            Outcome::TimedOut => &self.timeouts,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        let duration_ns = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.total_time_ns.fetch_add(duration_ns, Ordering::Relaxed);

        let mut current_max = self.max_time_ns.load(Ordering::Relaxed);
        while duration_ns > current_max {
            match self.max_time_ns.compare_exchange_weak(
                current_max,
                duration_ns,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => current_max = x,
            }
        }
    }

    /// Record one busy shard
    pub(crate) fn record_contention(&self) {
        self.contended_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub(crate) fn snapshot(&self) -> QueueMetrics {
        let mut metrics = QueueMetrics {
            enqueues: self.enqueues.load(Ordering::Relaxed),
            dequeues: self.dequeues.load(Ordering::Relaxed),
            empty_dequeues: self.empty_dequeues.load(Ordering::Relaxed),
            capacity_rejections: self.capacity_rejections.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            contended_retries: self.contended_retries.load(Ordering::Relaxed),
            avg_operation_time_ns: 0,
            max_operation_time_ns: self.max_time_ns.load(Ordering::Relaxed),
        };
        let total = metrics.total_operations();
        if total > 0 {
            metrics.avg_operation_time_ns = self.total_time_ns.load(Ordering::Relaxed) / total;
        }
        metrics
    }

    /// Reset all metrics
    pub(crate) fn reset(&self) {
        for counter in [
            &self.enqueues,
            &self.dequeues,
            &self.empty_dequeues,
            &self.capacity_rejections,
            &self.timeouts,
            &self.contended_retries,
            &self.total_time_ns,
            &self.max_time_ns,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Trait for data structures that support performance metrics
pub trait MetricsCollector {
    /// Get current performance metrics
    fn metrics(&self) -> QueueMetrics;

    /// Reset all metrics
    fn reset_metrics(&self);

    /// Enable or disable metrics collection
    fn set_metrics_enabled(&self, enabled: bool);

    /// Check if metrics collection is enabled
    fn is_metrics_enabled(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_snapshot() {
        let metrics = AtomicMetrics::default();
        metrics.record(Outcome::Enqueued, Duration::from_nanos(100));
        metrics.record(Outcome::Enqueued, Duration::from_nanos(300));
        metrics.record(Outcome::Dequeued, Duration::from_nanos(200));
        metrics.record(Outcome::Empty, Duration::from_nanos(400));
        metrics.record_contention();
        metrics.record_contention();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.enqueues, 2);
        assert_eq!(snapshot.dequeues, 1);
        assert_eq!(snapshot.empty_dequeues, 1);
        assert_eq!(snapshot.total_operations(), 4);
        assert_eq!(snapshot.avg_operation_time_ns, 250);
        assert_eq!(snapshot.max_operation_time(), Duration::from_nanos(400));
        assert_eq!(snapshot.hit_rate(), 50.0);
        assert_eq!(snapshot.contention_rate(), 50.0);
    }

    #[test]
    fn test_reset() {
        let metrics = AtomicMetrics::default();
        metrics.record(Outcome::Rejected, Duration::from_micros(1));
        metrics.record(Outcome::TimedOut, Duration::from_micros(2));
        metrics.record_contention();
        metrics.reset();
        assert_eq!(metrics.snapshot(), QueueMetrics::default());
    }

    #[test]
    fn test_rates_on_empty_snapshot() {
        let snapshot = QueueMetrics::default();
        assert_eq!(snapshot.hit_rate(), 0.0);
        assert_eq!(snapshot.contention_rate(), 0.0);
    }
}
