//! Rolling throughput statistics for a streaming session.
//!
//! Both sides record one sample per completed frame; the sender also
//! records the round trip of each chunk (write start to ack receipt),
//! which is what bounds lockstep throughput.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Rolling-window frame/byte meter with a smoothed chunk round trip.
#[derive(Debug)]
pub struct ThroughputMeter {
    /// `(completed at, frame bytes)` inside the window.
    samples: VecDeque<(Instant, u64)>,
    window: Duration,
    window_bytes: u64,
    total_frames: u64,
    total_bytes: u64,
    smoothed_rtt_us: u64,
}

/// Point-in-time view of a [`ThroughputMeter`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThroughputSnapshot {
    pub frames_per_sec: f64,
    pub bytes_per_sec: f64,
    pub total_frames: u64,
    pub total_bytes: u64,
    pub chunk_rtt: Duration,
}

impl ThroughputMeter {
    /// Meter over a one-second window.
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(1))
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(128),
            window,
            window_bytes: 0,
            total_frames: 0,
            total_bytes: 0,
            smoothed_rtt_us: 0,
        }
    }

    /// Record one completed frame of `bytes` bytes.
    pub fn record_frame(&mut self, bytes: u64) {
        self.record_frame_at(Instant::now(), bytes);
    }

    pub fn record_frame_at(&mut self, when: Instant, bytes: u64) {
        self.samples.push_back((when, bytes));
        self.window_bytes += bytes;
        self.total_frames += 1;
        self.total_bytes += bytes;
        while let Some(&(ts, b)) = self.samples.front() {
            if when.duration_since(ts) <= self.window {
                break;
            }
            self.samples.pop_front();
            self.window_bytes -= b;
        }
    }

    /// Fold one chunk round trip into the EWMA (α = 1/8).
    pub fn record_chunk_rtt(&mut self, rtt: Duration) {
        let us = rtt.as_micros() as u64;
        self.smoothed_rtt_us = if self.smoothed_rtt_us == 0 {
            us
        } else {
            self.smoothed_rtt_us * 7 / 8 + us / 8
        };
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn snapshot(&self) -> ThroughputSnapshot {
        let span = match (self.samples.front(), self.samples.back()) {
            (Some((first, _)), Some((last, _))) if self.samples.len() > 1 => {
                last.duration_since(*first).as_secs_f64()
            }
            _ => 0.0,
        };
        let (frames_per_sec, bytes_per_sec) = if span > 0.0 {
            // n samples span n-1 intervals
            let intervals = (self.samples.len() - 1) as f64;
            (intervals / span, self.window_bytes as f64 / span)
        } else {
            (0.0, 0.0)
        };
        ThroughputSnapshot {
            frames_per_sec,
            bytes_per_sec,
            total_frames: self.total_frames,
            total_bytes: self.total_bytes,
            chunk_rtt: Duration::from_micros(self.smoothed_rtt_us),
        }
    }
}

impl Default for ThroughputMeter {
    fn default() -> Self {
        Self::new()
    }
}
