//! Recording wall clock
//!
//! Drives session duration from wall time, never from encoder chunk count:
//! chunk delivery is periodic but not guaranteed real-time. The clock keeps
//! counting through source losses and slow chunks, and stands still while
//! paused.

use std::time::Duration;
use tokio::time::Instant;

/// Pause-aware wall clock for one recording session
#[derive(Debug, Default)]
pub struct RecordingClock {
    /// Start of the current recording stretch, if running
    running_since: Option<Instant>,
    /// Start of the current pause, if paused
    paused_since: Option<Instant>,
    /// Recorded time accumulated from finished stretches
    recorded: Duration,
    /// Paused time accumulated from finished pauses
    paused: Duration,
}

impl RecordingClock {
    /// Starts a fresh clock, discarding any previous accounting.
    pub fn start(&mut self) {
        *self = Self {
            running_since: Some(Instant::now()),
            ..Self::default()
        };
    }

    /// Stops counting recorded time; wall time now accrues as paused.
    pub fn pause(&mut self) {
        if let Some(since) = self.running_since.take() {
            self.recorded += since.elapsed();
            self.paused_since = Some(Instant::now());
        }
    }

    /// Resumes counting recorded time.
    pub fn resume(&mut self) {
        if let Some(since) = self.paused_since.take() {
            self.paused += since.elapsed();
            self.running_since = Some(Instant::now());
        }
    }

    /// Folds any open stretch and returns the total recorded duration.
    pub fn stop(&mut self) -> Duration {
        if let Some(since) = self.running_since.take() {
            self.recorded += since.elapsed();
        }
        if let Some(since) = self.paused_since.take() {
            self.paused += since.elapsed();
        }
        self.recorded
    }

    /// Recorded duration so far, excluding paused time.
    pub fn elapsed(&self) -> Duration {
        let current = self
            .running_since
            .map(|since| since.elapsed())
            .unwrap_or_default();
        self.recorded + current
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }

    /// Wall time spent paused so far.
    pub fn paused_ms(&self) -> u64 {
        let current = self
            .paused_since
            .map(|since| since.elapsed())
            .unwrap_or_default();
        (self.paused + current).as_millis() as u64
    }
}
