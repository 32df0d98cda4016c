//! Per-operation request statistics.
//!
//! Each stats-addressable operation gets one [`OpStatsLogger`]: success and
//! failure counters plus a shared latency window. Loggers are handed out by
//! the [`StatsRegistry`], which the server injects into every processing task;
//! there is no process-wide singleton.
//!
//! All entry points are callable concurrently from worker tasks without
//! external locking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;

use super::window::{WindowSnapshot, WindowedHistogram};

// ---------------------------------------------------------------------------
// OpKey
// ---------------------------------------------------------------------------

/// Key addressing one stats entry. Which requests map to which key is
/// configuration owned by the concrete processors, not computed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKey {
    AddEntry,
    ReadEntry,
}

impl fmt::Display for OpKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OpKey::AddEntry => "ADD_ENTRY",
            OpKey::ReadEntry => "READ_ENTRY",
        })
    }
}

// ---------------------------------------------------------------------------
// OpStatsSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time view of one operation's stats.
#[derive(Debug, Clone, PartialEq)]
pub struct OpStatsSnapshot {
    /// Successful events since start (or the last [`OpStatsLogger::clear`]).
    pub success_count: u64,
    /// Failed events since start (or the last clear).
    pub failure_count: u64,
    /// Mean latency over the current window, in milliseconds.
    pub avg_latency_millis: f64,
    /// Window latency at percentiles {10, 50, 90, 99, 99.9, 99.99}, in
    /// milliseconds; `u64::MAX` where the window has too few samples.
    pub percentile_latencies_millis: [u64; 6],
}

// ---------------------------------------------------------------------------
// OpStatsLogger
// ---------------------------------------------------------------------------

/// Counters and latency distribution for a single operation.
pub struct OpStatsLogger {
    success: AtomicU64,
    failure: AtomicU64,
    window: Mutex<WindowedHistogram>,
}

impl OpStatsLogger {
    fn new(slot_duration: Duration, slot_count: usize) -> Self {
        Self {
            success: AtomicU64::new(0),
            failure: AtomicU64::new(0),
            window: Mutex::new(WindowedHistogram::new(slot_duration, slot_count)),
        }
    }

    /// Record one successful event and its end-to-end latency.
    pub fn register_successful_event(&self, latency_micros: u64) {
        self.success.fetch_add(1, Ordering::Relaxed);
        self.window.lock().record(latency_micros);
    }

    /// Record one failed event. Failures feed the latency distribution too:
    /// a slow failure is as interesting as a slow success.
    pub fn register_failed_event(&self, latency_micros: u64) {
        self.failure.fetch_add(1, Ordering::Relaxed);
        self.window.lock().record(latency_micros);
    }

    /// Snapshot counters and window percentiles.
    pub fn snapshot(&self) -> OpStatsSnapshot {
        let WindowSnapshot {
            mean_micros,
            percentile_latencies_millis,
            ..
        } = self.window.lock().snapshot();

        OpStatsSnapshot {
            success_count: self.success.load(Ordering::Relaxed),
            failure_count: self.failure.load(Ordering::Relaxed),
            avg_latency_millis: mean_micros / 1_000.0,
            percentile_latencies_millis,
        }
    }

    /// Reset counters and drop every window sample.
    pub fn clear(&self) {
        self.success.store(0, Ordering::Relaxed);
        self.failure.store(0, Ordering::Relaxed);
        self.window.lock().reset();
    }
}

// ---------------------------------------------------------------------------
// StatsRegistry
// ---------------------------------------------------------------------------

/// Registry of per-operation stats loggers, keyed by [`OpKey`].
///
/// Loggers are created lazily on first use and shared via `Arc`; the registry
/// itself is shared across all workers and connections.
pub struct StatsRegistry {
    ops: DashMap<OpKey, Arc<OpStatsLogger>>,
    slot_duration: Duration,
    slot_count: usize,
}

impl StatsRegistry {
    /// Create a registry whose loggers keep a trailing window of
    /// `slot_count * slot_duration` of latency data.
    #[must_use]
    pub fn new(slot_duration: Duration, slot_count: usize) -> Self {
        Self {
            ops: DashMap::new(),
            slot_duration,
            slot_count,
        }
    }

    /// The stats entry for `key`, created on first use.
    #[must_use]
    pub fn op_stats(&self, key: OpKey) -> Arc<OpStatsLogger> {
        self.ops
            .entry(key)
            .or_insert_with(|| Arc::new(OpStatsLogger::new(self.slot_duration, self.slot_count)))
            .clone()
    }

    /// Snapshot every operation that has a stats entry.
    #[must_use]
    pub fn snapshot_all(&self) -> Vec<(OpKey, OpStatsSnapshot)> {
        self.ops
            .iter()
            .map(|entry| (*entry.key(), entry.value().snapshot()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
