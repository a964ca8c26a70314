use crate::error::EngineResult;
use crate::incident::HarshEvent;
use crate::summary::TripSummary;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

/// Live values pushed to the presentation layer after every processed tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickSnapshot {
    pub timestamp_ms: u64,
    pub magnitude: f64,
    pub harsh_flag: bool,
    pub eco_score: u8,
    pub event_count: usize,
}

/// Fire-and-forget vibration on each harsh event
pub trait HapticNotifier {
    fn notify(&mut self, event: &HarshEvent) -> EngineResult<()>;
}

pub trait SessionObserver {
    fn on_tick(&mut self, snapshot: &TickSnapshot);
    fn on_trip_finished(&mut self, summary: &TripSummary);
}

/// Haptics stand-in for hosts without a vibration motor: writes to the log
#[derive(Debug, Default)]
pub struct LogHaptics {
    pub pulses: u64,
}

impl HapticNotifier for LogHaptics {
    fn notify(&mut self, event: &HarshEvent) -> EngineResult<()> {
        self.pulses += 1;
        log::info!(
            "[haptic] {} ({:.2} m/s²)",
            event.kind.label(),
            event.magnitude
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Recorded {
    pub ticks: Vec<TickSnapshot>,
    pub summaries: Vec<TripSummary>,
}

/// Observer that keeps everything it is told. Clones share the same record,
/// so one clone can be handed to the session and the other inspected.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    inner: Rc<RefCell<Recorded>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick_count(&self) -> usize {
        self.inner.borrow().ticks.len()
    }

    pub fn last_tick(&self) -> Option<TickSnapshot> {
        self.inner.borrow().ticks.last().copied()
    }

    pub fn ticks(&self) -> Vec<TickSnapshot> {
        self.inner.borrow().ticks.clone()
    }

    pub fn summaries(&self) -> Vec<TripSummary> {
        self.inner.borrow().summaries.clone()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_tick(&mut self, snapshot: &TickSnapshot) {
        self.inner.borrow_mut().ticks.push(*snapshot);
    }

    fn on_trip_finished(&mut self, summary: &TripSummary) {
        self.inner.borrow_mut().summaries.push(summary.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::incident::HarshKind;

    fn event() -> HarshEvent {
        HarshEvent {
            id: "harsh_0_1".to_string(),
            timestamp_ms: 0,
            kind: HarshKind::Acceleration,
            magnitude: 6.0,
        }
    }

    #[test]
    fn test_log_haptics_counts_pulses() {
        let mut haptics = LogHaptics::default();
        haptics.notify(&event()).unwrap();
        haptics.notify(&event()).unwrap();
        assert_eq!(haptics.pulses, 2);
    }

    #[test]
    fn test_recording_observer_clones_share_record() {
        let observer = RecordingObserver::new();
        let mut handle = observer.clone();
        handle.on_tick(&TickSnapshot {
            timestamp_ms: 100,
            magnitude: 0.2,
            harsh_flag: false,
            eco_score: 100,
            event_count: 0,
        });
        assert_eq!(observer.tick_count(), 1);
        assert_eq!(observer.last_tick().map(|t| t.timestamp_ms), Some(100));
    }
}
