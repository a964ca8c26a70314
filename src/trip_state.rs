use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::incident::{Decision, HarshEvent, MotionClassifier};
use crate::sensor_receiver::Sample;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Trip numbers handed out in this process. Folded into trip and event ids
/// so two sessions sharing a clock never mint the same id.
static TRIP_SEQ: AtomicU64 = AtomicU64::new(1);

/// `clamp(100 - count * penalty, 0, 100)`
pub fn eco_score(event_count: usize, penalty_per_event: u32) -> u8 {
    let deduction = (event_count as u64).saturating_mul(penalty_per_event as u64);
    100u64.saturating_sub(deduction) as u8
}

/// Identifies one arming of the harsh-flag clear timer. Re-arming hands out a
/// fresh token, so a fire carrying an old token is recognisably stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlagTimerToken(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagTimer {
    pub token: FlagTimerToken,
    pub deadline_ms: u64,
}

/// What a sample did to the trip
#[derive(Debug)]
pub enum TickOutcome {
    /// Trip not active; nothing changed
    Ignored,
    /// Sample rejected, prior state kept
    Skipped(EngineError),
    Calm,
    Harsh(HarshEvent),
}

/// Timer work the host has to carry out after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerChange {
    Unchanged,
    Rearmed {
        cancelled: Option<FlagTimer>,
        armed: FlagTimer,
    },
}

#[derive(Debug)]
pub struct Transition {
    pub state: TripState,
    pub outcome: TickOutcome,
    pub timer: TimerChange,
}

/// Running state of one trip.
///
/// Transitions consume the state and return the next one; nothing here
/// touches a clock, a sensor or a timer directly.
#[derive(Debug, Clone)]
pub struct TripState {
    active: bool,
    trip_id: String,
    trip_seq: u64,
    start_time_ms: u64,
    eco_score: u8,
    events: Vec<HarshEvent>,
    last_magnitude: Option<f64>,
    peak_magnitude: f64,
    harsh_flag: bool,
    flag_timer: Option<FlagTimer>,
    next_token: u64,
    penalty_per_event: u32,
    classifier: MotionClassifier,
}

impl TripState {
    pub fn idle(config: &EngineConfig) -> Self {
        TripState {
            active: false,
            trip_id: String::new(),
            trip_seq: 0,
            start_time_ms: 0,
            eco_score: 100,
            events: Vec::new(),
            last_magnitude: None,
            peak_magnitude: 0.0,
            harsh_flag: false,
            flag_timer: None,
            next_token: 0,
            penalty_per_event: config.eco_score_penalty_per_event,
            classifier: MotionClassifier::new(config.harsh_threshold_ms2, config.cooldown_ms),
        }
    }

    /// Fresh trip: score 100, empty log, new cooldown clock
    pub fn begin(now_ms: u64, config: &EngineConfig) -> Self {
        let trip_seq = TRIP_SEQ.fetch_add(1, Ordering::Relaxed);
        TripState {
            active: true,
            trip_id: format!("trip_{}_{}", now_ms, trip_seq),
            trip_seq,
            start_time_ms: now_ms,
            ..Self::idle(config)
        }
    }

    pub fn apply_sample(mut self, sample: &Sample, now_ms: u64) -> Transition {
        if !self.active {
            return Transition {
                state: self,
                outcome: TickOutcome::Ignored,
                timer: TimerChange::Unchanged,
            };
        }

        let classified = match self.classifier.evaluate(sample, now_ms) {
            Ok(classified) => classified,
            Err(err) => {
                return Transition {
                    state: self,
                    outcome: TickOutcome::Skipped(err),
                    timer: TimerChange::Unchanged,
                }
            }
        };

        self.last_magnitude = Some(classified.magnitude);
        if classified.magnitude > self.peak_magnitude {
            self.peak_magnitude = classified.magnitude;
        }

        let kind = match classified.decision {
            Decision::NotHarsh => {
                return Transition {
                    state: self,
                    outcome: TickOutcome::Calm,
                    timer: TimerChange::Unchanged,
                }
            }
            Decision::Harsh(kind) => kind,
        };

        let event = HarshEvent {
            id: format!(
                "harsh_{}_{}_{}",
                now_ms,
                self.trip_seq,
                self.events.len() + 1
            ),
            timestamp_ms: now_ms,
            kind,
            magnitude: classified.magnitude,
        };
        self.events.push(event.clone());
        self.eco_score = eco_score(self.events.len(), self.penalty_per_event);
        self.harsh_flag = true;

        // Flag stays up for one cooldown window from the most recent event
        self.next_token += 1;
        let armed = FlagTimer {
            token: FlagTimerToken(self.next_token),
            deadline_ms: now_ms.saturating_add(self.classifier.cooldown_ms()),
        };
        let cancelled = self.flag_timer.replace(armed);

        Transition {
            state: self,
            outcome: TickOutcome::Harsh(event),
            timer: TimerChange::Rearmed { cancelled, armed },
        }
    }

    /// Timer-driven transition. Only the most recently armed token clears
    /// the flag.
    pub fn clear_flag(mut self, token: FlagTimerToken) -> Self {
        if self.active && self.flag_timer.map(|t| t.token) == Some(token) {
            self.harsh_flag = false;
            self.flag_timer = None;
        }
        self
    }

    /// End the trip. Returns the finished trip (still holding its log) and
    /// the timer that was pending, if any.
    pub fn finish(mut self) -> (Self, Option<FlagTimer>) {
        let pending = self.flag_timer.take();
        self.active = false;
        self.harsh_flag = false;
        self.last_magnitude = None;
        (self, pending)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn trip_id(&self) -> &str {
        &self.trip_id
    }

    pub fn start_time_ms(&self) -> u64 {
        self.start_time_ms
    }

    pub fn eco_score(&self) -> u8 {
        self.eco_score
    }

    pub fn events(&self) -> &[HarshEvent] {
        &self.events
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn last_magnitude(&self) -> Option<f64> {
        self.last_magnitude
    }

    pub fn peak_magnitude(&self) -> f64 {
        self.peak_magnitude
    }

    pub fn harsh_flag(&self) -> bool {
        self.harsh_flag
    }

    pub fn pending_flag_timer(&self) -> Option<FlagTimer> {
        self.flag_timer
    }
}

impl Default for TripState {
    fn default() -> Self {
        Self::idle(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::HarshKind;

    fn harsh_braking() -> Sample {
        Sample::new(-1.2, 0.05, 0.98)
    }

    fn calm() -> Sample {
        Sample::new(0.02, 0.01, 1.0)
    }

    #[test]
    fn test_eco_score_formula() {
        assert_eq!(eco_score(0, 5), 100);
        assert_eq!(eco_score(1, 5), 95);
        assert_eq!(eco_score(19, 5), 5);
        assert_eq!(eco_score(20, 5), 0);
        assert_eq!(eco_score(30, 5), 0);
        assert_eq!(eco_score(3, 0), 100);
        assert_eq!(eco_score(usize::MAX, 100), 0);
    }

    #[test]
    fn test_idle_state_ignores_samples() {
        let state = TripState::idle(&EngineConfig::default());
        let t = state.apply_sample(&harsh_braking(), 1_000);
        assert!(matches!(t.outcome, TickOutcome::Ignored));
        assert_eq!(t.state.event_count(), 0);
        assert_eq!(t.state.last_magnitude(), None);
    }

    #[test]
    fn test_harsh_sample_updates_state() {
        let state = TripState::begin(0, &EngineConfig::default());
        let t = state.apply_sample(&harsh_braking(), 500);

        match &t.outcome {
            TickOutcome::Harsh(event) => {
                assert_eq!(event.kind, HarshKind::Braking);
                assert_eq!(event.timestamp_ms, 500);
            }
            other => panic!("expected harsh outcome, got {:?}", other),
        }
        assert_eq!(
            t.timer,
            TimerChange::Rearmed {
                cancelled: None,
                armed: FlagTimer {
                    token: FlagTimerToken(1),
                    deadline_ms: 3_500
                }
            }
        );
        assert!(t.state.harsh_flag());
        assert_eq!(t.state.eco_score(), 95);
        assert_eq!(t.state.event_count(), 1);
    }

    #[test]
    fn test_calm_sample_keeps_flag_and_score() {
        let state = TripState::begin(0, &EngineConfig::default());
        let state = state.apply_sample(&harsh_braking(), 0).state;
        let t = state.apply_sample(&calm(), 100);

        assert!(matches!(t.outcome, TickOutcome::Calm));
        assert_eq!(t.timer, TimerChange::Unchanged);
        assert!(t.state.harsh_flag());
        assert_eq!(t.state.eco_score(), 95);
        assert!(t.state.last_magnitude().unwrap() < 1.0);
    }

    #[test]
    fn test_invalid_sample_keeps_prior_state() {
        let state = TripState::begin(0, &EngineConfig::default());
        let state = state.apply_sample(&calm(), 100).state;
        let before = state.last_magnitude();

        let t = state.apply_sample(&Sample::new(f64::NAN, 0.0, 1.0), 200);
        assert!(matches!(
            t.outcome,
            TickOutcome::Skipped(EngineError::InvalidSample { .. })
        ));
        assert_eq!(t.state.last_magnitude(), before);
    }

    #[test]
    fn test_flag_clears_on_latest_token_only() {
        let mut config = EngineConfig::default();
        config.cooldown_ms = 1_000;
        let state = TripState::begin(0, &config);

        let first = state.apply_sample(&harsh_braking(), 0);
        let state = first.state;
        let t = state.apply_sample(&harsh_braking(), 1_500);
        let (cancelled, armed) = match t.timer {
            TimerChange::Rearmed { cancelled, armed } => (cancelled, armed),
            TimerChange::Unchanged => panic!("expected re-arm"),
        };
        let stale = cancelled.unwrap();
        assert_eq!(stale.token, FlagTimerToken(1));
        assert_eq!(armed.deadline_ms, 2_500);

        // Stale fire from the first arming does nothing
        let state = t.state.clear_flag(stale.token);
        assert!(state.harsh_flag());

        let state = state.clear_flag(armed.token);
        assert!(!state.harsh_flag());
        assert_eq!(state.pending_flag_timer(), None);
    }

    #[test]
    fn test_finish_hands_back_pending_timer() {
        let state = TripState::begin(10, &EngineConfig::default());
        let state = state.apply_sample(&harsh_braking(), 20).state;
        let (finished, pending) = state.finish();

        assert!(!finished.is_active());
        assert!(!finished.harsh_flag());
        assert_eq!(finished.event_count(), 1);
        assert_eq!(pending.map(|t| t.deadline_ms), Some(3_020));
        assert!(finished.trip_id().starts_with("trip_10_"));
    }

    #[test]
    fn test_event_ids_unique_within_trip() {
        let mut config = EngineConfig::default();
        config.cooldown_ms = 10;
        let mut state = TripState::begin(0, &config);
        for i in 0..5 {
            state = state.apply_sample(&harsh_braking(), i * 100).state;
        }
        let mut ids: Vec<&str> = state.events().iter().map(|e| e.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn test_ids_unique_across_trips_at_same_instant() {
        let config = EngineConfig::default();
        let a = TripState::begin(0, &config).apply_sample(&harsh_braking(), 1_000).state;
        let b = TripState::begin(0, &config).apply_sample(&harsh_braking(), 1_000).state;

        assert_ne!(a.trip_id(), b.trip_id());
        assert_ne!(a.events()[0].id, b.events()[0].id);
        assert!(a.events()[0].id.starts_with("harsh_1000_"));
    }
}
