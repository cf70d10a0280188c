//! Clock and timing utilities for recording reports.
//!
//! A recording is anchored to a monotonic epoch taken when capture starts.
//! The media timeline (presentation timestamps relative to the muxer's
//! session origin) is compared against that epoch when the recording ends
//! to spot capture stalls.

use std::time::{Duration, Instant};

/// A recording clock that provides monotonic timestamps relative to
/// a fixed epoch (the moment capture started).
#[derive(Debug, Clone)]
pub struct RecordingClock {
    /// The instant capture started.
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,
}

impl RecordingClock {
    /// Create a new recording clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Elapsed time since capture start.
    pub fn elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }

    /// Wall-clock time at capture start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }
}

/// Drift measurement between two timelines.
#[derive(Debug, Clone, Copy)]
pub struct DriftMeasurement {
    /// Duration on the reference timeline (ns).
    pub reference_ns: u64,
    /// Duration on the measured timeline (ns).
    pub measured_ns: u64,
}

impl DriftMeasurement {
    /// Build a measurement from two durations.
    pub fn between(reference: Duration, measured: Duration) -> Self {
        Self {
            reference_ns: reference.as_nanos() as u64,
            measured_ns: measured.as_nanos() as u64,
        }
    }

    /// Drift in nanoseconds (positive = measured is ahead).
    pub fn drift_ns(&self) -> i64 {
        self.measured_ns as i64 - self.reference_ns as i64
    }

    /// Drift in milliseconds.
    pub fn drift_ms(&self) -> f64 {
        self.drift_ns() as f64 / 1_000_000.0
    }

    /// Whether drift exceeds an acceptable threshold.
    pub fn exceeds_threshold_ms(&self, threshold_ms: f64) -> bool {
        self.drift_ms().abs() > threshold_ms
    }
}
