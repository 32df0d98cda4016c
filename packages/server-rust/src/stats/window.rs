//! Sliding-window latency histogram.
//!
//! Latencies are recorded in microseconds into a ring of `hdrhistogram` slots.
//! Each slot covers a fixed duration; slots older than the window are cleared
//! lazily on the next record or query, so a query only ever sees the trailing
//! `slot_count * slot_duration` of data.
//!
//! Percentile queries report a sentinel instead of a value when the window
//! holds too few samples to make the percentile meaningful (see
//! [`WindowedHistogram::snapshot`]).

use std::time::{Duration, Instant};

use hdrhistogram::Histogram;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Fixed percentile set reported by every snapshot.
pub const LATENCY_PERCENTILES: [f64; 6] = [10.0, 50.0, 90.0, 99.0, 99.9, 99.99];

/// Sentinel reported for a percentile with insufficient samples. Treated as
/// unbounded by consumers; never confused with a real latency.
pub const LATENCY_UNAVAILABLE_MILLIS: u64 = u64::MAX;

/// Largest latency the histogram tracks precisely: one hour in microseconds.
/// Larger values are clamped on record.
const MAX_TRACKABLE_MICROS: u64 = 3_600_000_000;

const SIGNIFICANT_FIGURES: u8 = 3;

fn new_slot() -> Histogram<u64> {
    // Bounds are compile-time constants; construction cannot fail.
    Histogram::new_with_bounds(1, MAX_TRACKABLE_MICROS, SIGNIFICANT_FIGURES)
        .expect("static histogram bounds are valid")
}

/// Minimum merged sample count for percentile `p` to be reportable: at least
/// one sample must be able to sit above the percentile mark. The epsilon keeps
/// exact thresholds (e.g. p99.9 -> 1000) from rounding up through f64 noise.
fn required_samples(percentile: f64) -> u64 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        (100.0 / (100.0 - percentile) - 1e-9).ceil() as u64
    }
}

// ---------------------------------------------------------------------------
// WindowSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time view of the window's contents.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSnapshot {
    /// Number of samples currently inside the window.
    pub sample_count: u64,
    /// Mean latency of those samples, in microseconds. Zero when empty.
    pub mean_micros: f64,
    /// Latency at each of [`LATENCY_PERCENTILES`], in milliseconds, or
    /// [`LATENCY_UNAVAILABLE_MILLIS`] where the sample count is insufficient.
    pub percentile_latencies_millis: [u64; 6],
}

// ---------------------------------------------------------------------------
// WindowedHistogram
// ---------------------------------------------------------------------------

/// Ring of histogram slots covering a trailing time window.
///
/// Not internally synchronized; callers wrap it in a mutex.
pub struct WindowedHistogram {
    slots: Vec<Histogram<u64>>,
    slot_duration: Duration,
    current: usize,
    slot_started: Instant,
}

impl WindowedHistogram {
    /// Create a window of `slot_count` slots, each covering `slot_duration`.
    /// A zero `slot_count` is bumped to one.
    #[must_use]
    pub fn new(slot_duration: Duration, slot_count: usize) -> Self {
        let slot_count = slot_count.max(1);
        Self {
            slots: (0..slot_count).map(|_| new_slot()).collect(),
            slot_duration,
            current: 0,
            slot_started: Instant::now(),
        }
    }

    /// Record one latency sample into the current slot.
    pub fn record(&mut self, latency_micros: u64) {
        self.rotate(Instant::now());
        self.slots[self.current].saturating_record(latency_micros);
    }

    /// Number of samples currently inside the window.
    pub fn sample_count(&mut self) -> u64 {
        self.rotate(Instant::now());
        self.slots.iter().map(Histogram::len).sum()
    }

    /// Snapshot the window: sample count, mean, and the fixed percentile set.
    pub fn snapshot(&mut self) -> WindowSnapshot {
        self.rotate(Instant::now());

        let mut merged = new_slot();
        for slot in &self.slots {
            // Slots share bounds with `merged`, so adding cannot fail.
            let _ = merged.add(slot);
        }

        let count = merged.len();
        let mut percentiles = [LATENCY_UNAVAILABLE_MILLIS; 6];
        for (value, percentile) in percentiles.iter_mut().zip(LATENCY_PERCENTILES) {
            if count >= required_samples(percentile) {
                *value = merged.value_at_quantile(percentile / 100.0) / 1_000;
            }
        }

        WindowSnapshot {
            sample_count: count,
            mean_micros: if count == 0 { 0.0 } else { merged.mean() },
            percentile_latencies_millis: percentiles,
        }
    }

    /// Drop every sample and restart the window from now.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.reset();
        }
        self.current = 0;
        self.slot_started = Instant::now();
    }

    /// Advance the ring to `now`, clearing slots that have aged out.
    fn rotate(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.slot_started);
        let slot_nanos = self.slot_duration.as_nanos();
        if slot_nanos == 0 {
            return;
        }
        #[allow(clippy::cast_possible_truncation)]
        let steps = (elapsed.as_nanos() / slot_nanos) as usize;
        if steps == 0 {
            return;
        }
        if steps >= self.slots.len() {
            // The whole window has aged out.
            for slot in &mut self.slots {
                slot.reset();
            }
            self.slot_started = now;
            return;
        }
        for _ in 0..steps {
            self.current = (self.current + 1) % self.slots.len();
            self.slots[self.current].reset();
        }
        #[allow(clippy::cast_possible_truncation)]
        let steps_u32 = steps as u32;
        self.slot_started += self.slot_duration * steps_u32;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_window_reports_every_percentile_unavailable() {
        let mut window = WindowedHistogram::new(Duration::from_secs(10), 6);
        let snapshot = window.snapshot();

        assert_eq!(snapshot.sample_count, 0);
        assert!((snapshot.mean_micros - 0.0).abs() < f64::EPSILON);
        assert_eq!(
            snapshot.percentile_latencies_millis,
            [LATENCY_UNAVAILABLE_MILLIS; 6]
        );
    }

    #[test]
    fn percentiles_track_recorded_values() {
        let mut window = WindowedHistogram::new(Duration::from_secs(60), 1);
        // 10_000 samples: 1ms..=10_000ms expressed in micros.
        for i in 1..=10_000u64 {
            window.record(i * 1_000);
        }

        let snapshot = window.snapshot();
        assert_eq!(snapshot.sample_count, 10_000);

        let [p10, p50, p90, p99, p999, p9999] = snapshot.percentile_latencies_millis;
        // hdrhistogram keeps 3 significant figures; allow 1% slack.
        let close = |got: u64, want: u64| got.abs_diff(want) <= want / 100 + 1;
        assert!(close(p10, 1_000), "p10 = {p10}");
        assert!(close(p50, 5_000), "p50 = {p50}");
        assert!(close(p90, 9_000), "p90 = {p90}");
        assert!(close(p99, 9_900), "p99 = {p99}");
        assert!(close(p999, 9_990), "p99.9 = {p999}");
        assert!(close(p9999, 9_999), "p99.99 = {p9999}");
    }

    #[test]
    fn high_percentiles_need_more_samples() {
        let mut window = WindowedHistogram::new(Duration::from_secs(60), 1);
        for _ in 0..50 {
            window.record(1_000);
        }

        let [p10, p50, p90, p99, p999, p9999] = window.snapshot().percentile_latencies_millis;
        assert_ne!(p10, LATENCY_UNAVAILABLE_MILLIS);
        assert_ne!(p50, LATENCY_UNAVAILABLE_MILLIS);
        assert_ne!(p90, LATENCY_UNAVAILABLE_MILLIS);
        // 50 samples cannot support p99 and above.
        assert_eq!(p99, LATENCY_UNAVAILABLE_MILLIS);
        assert_eq!(p999, LATENCY_UNAVAILABLE_MILLIS);
        assert_eq!(p9999, LATENCY_UNAVAILABLE_MILLIS);
    }

    #[test]
    fn samples_age_out_of_the_window() {
        let mut window = WindowedHistogram::new(Duration::from_millis(20), 2);
        window.record(5_000);
        assert_eq!(window.sample_count(), 1);

        // Sleep past the full window (2 slots x 20ms).
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(window.sample_count(), 0);
    }

    #[test]
    fn reset_drops_all_samples() {
        let mut window = WindowedHistogram::new(Duration::from_secs(10), 3);
        for _ in 0..10 {
            window.record(2_000);
        }
        assert_eq!(window.sample_count(), 10);

        window.reset();
        assert_eq!(window.sample_count(), 0);
    }

    #[test]
    fn oversized_latencies_are_clamped_not_lost() {
        let mut window = WindowedHistogram::new(Duration::from_secs(10), 1);
        window.record(MAX_TRACKABLE_MICROS * 10);
        assert_eq!(window.sample_count(), 1);
    }

    #[test]
    fn required_sample_thresholds() {
        assert_eq!(required_samples(10.0), 2);
        assert_eq!(required_samples(50.0), 2);
        assert_eq!(required_samples(90.0), 10);
        assert_eq!(required_samples(99.0), 100);
        assert_eq!(required_samples(99.9), 1_000);
        assert_eq!(required_samples(99.99), 10_000);
    }
}
