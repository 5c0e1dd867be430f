//! Metrics for verification runs
//!
//! Counters for scenario verdicts and device activity. All metrics use
//! atomic operations, so one instance can be shared between runners on
//! different threads.
//!
//! # Example
//!
//! ```
//! use saverify_ipsec::metrics::RunMetrics;
//!
//! let metrics = RunMetrics::new();
//!
//! metrics.record_session_created();
//! metrics.record_packet_submitted();
//! metrics.record_scenario_passed();
//!
//! let snapshot = metrics.snapshot();
//! println!("Passed: {}", snapshot.scenarios_passed);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Verification run metrics
#[derive(Debug, Clone)]
pub struct RunMetrics {
    /// Scenarios that passed
    pub scenarios_passed: Arc<AtomicU64>,

    /// Scenarios that failed verification
    pub scenarios_failed: Arc<AtomicU64>,

    /// Scenarios skipped as not applicable
    pub scenarios_skipped: Arc<AtomicU64>,

    /// Packets handed to the device
    pub packets_submitted: Arc<AtomicU64>,

    /// Device sessions created
    pub sessions_created: Arc<AtomicU64>,

    /// Device sessions destroyed
    pub sessions_destroyed: Arc<AtomicU64>,
}

impl RunMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self {
            scenarios_passed: Arc::new(AtomicU64::new(0)),
            scenarios_failed: Arc::new(AtomicU64::new(0)),
            scenarios_skipped: Arc::new(AtomicU64::new(0)),
            packets_submitted: Arc::new(AtomicU64::new(0)),
            sessions_created: Arc::new(AtomicU64::new(0)),
            sessions_destroyed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record a passed scenario
    pub fn record_scenario_passed(&self) {
        self.scenarios_passed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed scenario
    pub fn record_scenario_failed(&self) {
        self.scenarios_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a skipped scenario
    pub fn record_scenario_skipped(&self) {
        self.scenarios_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a packet submission
    pub fn record_packet_submitted(&self) {
        self.packets_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session creation
    pub fn record_session_created(&self) {
        self.sessions_created.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session teardown
    pub fn record_session_destroyed(&self) {
        self.sessions_destroyed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    ///
    /// Values may be slightly inconsistent across metrics due to concurrent updates.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            scenarios_passed: self.scenarios_passed.load(Ordering::Relaxed),
            scenarios_failed: self.scenarios_failed.load(Ordering::Relaxed),
            scenarios_skipped: self.scenarios_skipped.load(Ordering::Relaxed),
            packets_submitted: self.packets_submitted.load(Ordering::Relaxed),
            sessions_created: self.sessions_created.load(Ordering::Relaxed),
            sessions_destroyed: self.sessions_destroyed.load(Ordering::Relaxed),
        }
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        self.scenarios_passed.store(0, Ordering::Relaxed);
        self.scenarios_failed.store(0, Ordering::Relaxed);
        self.scenarios_skipped.store(0, Ordering::Relaxed);
        self.packets_submitted.store(0, Ordering::Relaxed);
        self.sessions_created.store(0, Ordering::Relaxed);
        self.sessions_destroyed.store(0, Ordering::Relaxed);
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time snapshot of run metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricsSnapshot {
    /// Scenarios that passed
    pub scenarios_passed: u64,

    /// Scenarios that failed verification
    pub scenarios_failed: u64,

    /// Scenarios skipped as not applicable
    pub scenarios_skipped: u64,

    /// Packets handed to the device
    pub packets_submitted: u64,

    /// Device sessions created
    pub sessions_created: u64,

    /// Device sessions destroyed
    pub sessions_destroyed: u64,
}

impl MetricsSnapshot {
    /// Scenarios that ran to a verdict (passed or failed)
    pub fn scenarios_run(&self) -> u64 {
        self.scenarios_passed + self.scenarios_failed
    }

    /// Pass rate over scenarios that ran (0.0 to 1.0)
    pub fn pass_rate(&self) -> f64 {
        if self.scenarios_run() == 0 {
            return 0.0;
        }
        self.scenarios_passed as f64 / self.scenarios_run() as f64
    }

    /// Sessions created but not destroyed
    pub fn sessions_leaked(&self) -> u64 {
        self.sessions_created.saturating_sub(self.sessions_destroyed)
    }
}
