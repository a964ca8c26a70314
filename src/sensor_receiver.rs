use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Accelerometer reading in g-units. `x` is the forward axis for a phone
/// mounted top-forward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Sample {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Raw vector norm, gravity included
    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Sample stamped with its arrival time on the host clock (ms)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedSample {
    pub timestamp_ms: u64,
    #[serde(flatten)]
    pub sample: Sample,
}

impl TimedSample {
    pub fn new(timestamp_ms: u64, x: f64, y: f64, z: f64) -> Self {
        Self {
            timestamp_ms,
            sample: Sample::new(x, y, z),
        }
    }
}

/// Recorded drive, as read by the replay tool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TripLog {
    pub samples: Vec<TimedSample>,
}

/// Accelerometer subscription boundary.
///
/// The session never probes for hardware itself: it is handed a source and
/// asks it once, at start, whether it can deliver.
pub trait SampleSource {
    fn is_available(&self) -> bool;
    fn set_interval(&mut self, interval_ms: u64);
    fn subscribe(&mut self) -> EngineResult<()>;
    fn unsubscribe(&mut self);
}

/// Source backed by a recorded log. Samples are only handed out while
/// subscribed, in log order.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    pending: VecDeque<TimedSample>,
    available: bool,
    subscribed: bool,
    interval_ms: Option<u64>,
}

impl ReplaySource {
    pub fn new(samples: Vec<TimedSample>) -> Self {
        Self {
            pending: samples.into(),
            available: true,
            subscribed: false,
            interval_ms: None,
        }
    }

    /// A source whose hardware is missing
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(Vec::new())
        }
    }

    pub fn peek_timestamp(&self) -> Option<u64> {
        if self.subscribed {
            self.pending.front().map(|s| s.timestamp_ms)
        } else {
            None
        }
    }

    pub fn next_sample(&mut self) -> Option<TimedSample> {
        if self.subscribed {
            self.pending.pop_front()
        } else {
            None
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    pub fn first_timestamp(&self) -> Option<u64> {
        self.pending.front().map(|s| s.timestamp_ms)
    }

    pub fn last_timestamp(&self) -> Option<u64> {
        self.pending.back().map(|s| s.timestamp_ms)
    }

    pub fn interval_ms(&self) -> Option<u64> {
        self.interval_ms
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl SampleSource for ReplaySource {
    fn is_available(&self) -> bool {
        self.available
    }

    fn set_interval(&mut self, interval_ms: u64) {
        self.interval_ms = Some(interval_ms);
    }

    fn subscribe(&mut self) -> EngineResult<()> {
        if !self.available {
            return Err(EngineError::SensorUnavailable);
        }
        self.subscribed = true;
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.subscribed = false;
    }
}

/// Synthetic drive for the CLI: a phone lying flat with light road noise,
/// plus a short harsh manoeuvre every `maneuver_every_ms`, alternating
/// braking and acceleration.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    maneuver_every_ms: u64,
    maneuver_length_ms: u64,
    maneuver_peak_g: f64,
    interval_ms: u64,
    subscribed: bool,
}

impl SimulatedSource {
    pub fn new(maneuver_every_ms: u64) -> Self {
        Self {
            maneuver_every_ms,
            maneuver_length_ms: 400,
            maneuver_peak_g: 1.2,
            interval_ms: 100,
            subscribed: false,
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Reading at `elapsed_ms` since the trip started
    pub fn sample_at(&self, elapsed_ms: u64) -> Sample {
        use std::f64::consts::PI;
        let t = elapsed_ms as f64 / 1000.0;

        let mut x = (t * 2.0 * PI * 0.7).sin() * 0.03;
        let y = (t * 2.0 * PI * 1.3).cos() * 0.02;
        let z = 1.0 + (t * PI).sin() * 0.01;

        if self.maneuver_every_ms > 0 && elapsed_ms >= self.maneuver_every_ms {
            let cycle = elapsed_ms / self.maneuver_every_ms;
            let phase = elapsed_ms % self.maneuver_every_ms;
            if phase < self.maneuver_length_ms {
                let sign = if cycle % 2 == 1 { -1.0 } else { 1.0 };
                x += sign * self.maneuver_peak_g;
            }
        }

        Sample::new(x, y, z)
    }
}

impl SampleSource for SimulatedSource {
    fn is_available(&self) -> bool {
        true
    }

    fn set_interval(&mut self, interval_ms: u64) {
        self.interval_ms = interval_ms;
    }

    fn subscribe(&mut self) -> EngineResult<()> {
        self.subscribed = true;
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.subscribed = false;
    }
}
