use crate::error::{EngineError, EngineResult};
use crate::sensor_receiver::Sample;
use serde::{Deserialize, Serialize};

/// Standard gravity, m/s² per g
pub const GRAVITY_MS2: f64 = 9.81;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HarshKind {
    Braking,
    Acceleration,
}

impl HarshKind {
    /// Split on the sign of the forward axis. Assumes the phone is mounted
    /// top-forward; a zero reading counts as acceleration.
    pub fn from_forward_axis(forward: f64) -> Self {
        if forward < 0.0 {
            HarshKind::Braking
        } else {
            HarshKind::Acceleration
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HarshKind::Braking => "harsh_braking",
            HarshKind::Acceleration => "harsh_acceleration",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    NotHarsh,
    Harsh(HarshKind),
}

/// A registered harsh manoeuvre. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HarshEvent {
    pub id: String,
    pub timestamp_ms: u64,
    pub kind: HarshKind,
    pub magnitude: f64, // m/s^2
}

impl HarshEvent {
    pub fn recorded_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        i64::try_from(self.timestamp_ms)
            .ok()
            .and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis)
    }
}

/// Gravity-compensated acceleration in m/s².
///
/// Subtracting 1g from the total norm (rather than from one axis) keeps the
/// result independent of how the phone is oriented. Input must be finite;
/// non-finite input yields an unspecified value.
pub fn compute_magnitude(sample: &Sample) -> f64 {
    (sample.norm() - 1.0).abs() * GRAVITY_MS2
}

/// Cooldown suppression wins over the threshold: a single violent manoeuvre
/// is one continuous burst of samples and must count once.
pub fn classify(
    magnitude: f64,
    forward_axis: f64,
    now_ms: u64,
    last_event_ms: Option<u64>,
    threshold_ms2: f64,
    cooldown_ms: u64,
) -> Decision {
    if let Some(last) = last_event_ms {
        if now_ms.saturating_sub(last) < cooldown_ms {
            return Decision::NotHarsh;
        }
    }

    if magnitude > threshold_ms2 {
        Decision::Harsh(HarshKind::from_forward_axis(forward_axis))
    } else {
        Decision::NotHarsh
    }
}

/// Result of evaluating one sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classified {
    pub magnitude: f64,
    pub decision: Decision,
}

/// Per-session classifier. Owns the cooldown clock, so two sessions never
/// debounce each other.
#[derive(Debug, Clone)]
pub struct MotionClassifier {
    threshold_ms2: f64,
    cooldown_ms: u64,
    last_event_ms: Option<u64>,
}

impl MotionClassifier {
    pub fn new(threshold_ms2: f64, cooldown_ms: u64) -> Self {
        Self {
            threshold_ms2,
            cooldown_ms,
            last_event_ms: None,
        }
    }

    pub fn evaluate(&mut self, sample: &Sample, now_ms: u64) -> EngineResult<Classified> {
        if !sample.is_finite() {
            return Err(EngineError::InvalidSample {
                x: sample.x,
                y: sample.y,
                z: sample.z,
            });
        }

        let magnitude = compute_magnitude(sample);
        let decision = classify(
            magnitude,
            sample.x,
            now_ms,
            self.last_event_ms,
            self.threshold_ms2,
            self.cooldown_ms,
        );

        if let Decision::Harsh(_) = decision {
            self.last_event_ms = Some(now_ms);
        }

        Ok(Classified {
            magnitude,
            decision,
        })
    }

    pub fn last_event_ms(&self) -> Option<u64> {
        self.last_event_ms
    }

    pub fn cooldown_ms(&self) -> u64 {
        self.cooldown_ms
    }

    pub fn reset(&mut self) {
        self.last_event_ms = None;
    }
}
