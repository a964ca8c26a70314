use crate::config::EngineConfig;
use crate::driver::TimerHost;
use crate::error::{EngineError, EngineResult};
use crate::feedback::{HapticNotifier, SessionObserver, TickSnapshot};
use crate::sensor_receiver::{Sample, SampleSource};
use crate::summary::TripSummary;
use crate::trip_state::{FlagTimerToken, TickOutcome, TimerChange, TripState};

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Not monitoring
    Idle,
    /// Subscribed and scoring samples
    Active,
}

/// One driver's monitoring session.
///
/// Owns its sample source, its timer host and the running trip state,
/// including the cooldown clock. Everything runs on the caller's thread:
/// the host delivers sample ticks and timer fires, in order, through
/// [`Session::on_sample`] and [`Session::on_flag_timer`].
pub struct Session<S: SampleSource, T: TimerHost> {
    config: EngineConfig,
    source: S,
    timers: T,
    state: TripState,
    haptics: Option<Box<dyn HapticNotifier>>,
    observers: Vec<Box<dyn SessionObserver>>,
}

impl<S: SampleSource, T: TimerHost> Session<S, T> {
    /// Create new session in Idle state
    pub fn new(config: EngineConfig, source: S, timers: T) -> EngineResult<Self> {
        config.validate()?;
        let state = TripState::idle(&config);
        Ok(Session {
            config,
            source,
            timers,
            state,
            haptics: None,
            observers: Vec::new(),
        })
    }

    pub fn with_haptics(mut self, haptics: Box<dyn HapticNotifier>) -> Self {
        self.haptics = Some(haptics);
        self
    }

    pub fn add_observer(&mut self, observer: Box<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    /// Idle → Active. A start on an active session finishes the running trip
    /// first and begins a fresh one.
    pub fn start(&mut self, now_ms: u64) -> EngineResult<()> {
        if self.state.is_active() {
            log::info!("Restarting active trip {}", self.state.trip_id());
            self.stop(now_ms);
        }

        if !self.source.is_available() {
            log::error!("Accelerometer is not available on this device");
            return Err(EngineError::SensorUnavailable);
        }

        self.source.set_interval(self.config.update_interval_ms);
        // Only start-fatal errors leave this function
        self.source.subscribe().map_err(|e| {
            if e.is_fatal_to_start() {
                e
            } else {
                EngineError::SubscribeFailed(e.to_string())
            }
        })?;

        self.state = TripState::begin(now_ms, &self.config);
        log::info!(
            "Trip {} started (interval {} ms, threshold {:.2} m/s², cooldown {} ms)",
            self.state.trip_id(),
            self.config.update_interval_ms,
            self.config.harsh_threshold_ms2,
            self.config.cooldown_ms
        );
        Ok(())
    }

    /// Active → Idle. Idempotent: stopping an idle session returns `None`.
    pub fn stop(&mut self, now_ms: u64) -> Option<TripSummary> {
        if !self.state.is_active() {
            return None;
        }

        self.source.unsubscribe();
        let state = std::mem::take(&mut self.state);
        let (finished, pending) = state.finish();
        if let Some(timer) = pending {
            self.timers.cancel(timer.token);
        }

        let summary = TripSummary::from_state(&finished, now_ms);
        self.state = TripState::idle(&self.config);

        log::info!(
            "Trip {} stopped: {} harsh events, eco score {}, duration {}",
            summary.trip_id,
            summary.event_count(),
            summary.eco_score,
            summary.formatted_duration()
        );
        for observer in self.observers.iter_mut() {
            observer.on_trip_finished(&summary);
        }
        Some(summary)
    }

    /// Sample tick. Returns the snapshot pushed to observers, or `None` when
    /// the tick changed nothing (idle session or rejected sample).
    pub fn on_sample(&mut self, sample: &Sample, now_ms: u64) -> Option<TickSnapshot> {
        if !self.state.is_active() {
            log::debug!("Dropping sample delivered to idle session");
            return None;
        }

        let state = std::mem::take(&mut self.state);
        let transition = state.apply_sample(sample, now_ms);
        self.state = transition.state;

        match transition.outcome {
            TickOutcome::Ignored => return None,
            TickOutcome::Skipped(err) => {
                log::warn!("Skipping tick at {} ms: {}", now_ms, err);
                return None;
            }
            TickOutcome::Calm => {}
            TickOutcome::Harsh(event) => {
                log::debug!(
                    "{} at {} ms ({:.2} m/s²), eco score now {}",
                    event.kind.label(),
                    event.timestamp_ms,
                    event.magnitude,
                    self.state.eco_score()
                );
                if self.config.haptic_enabled {
                    if let Some(haptics) = self.haptics.as_mut() {
                        if let Err(e) = haptics.notify(&event) {
                            log::warn!("Haptic feedback failed: {}", e);
                        }
                    }
                }
            }
        }

        if let TimerChange::Rearmed { cancelled, armed } = transition.timer {
            if let Some(old) = cancelled {
                self.timers.cancel(old.token);
            }
            self.timers.schedule(armed);
        }

        let snapshot = self.snapshot(now_ms);
        for observer in self.observers.iter_mut() {
            observer.on_tick(&snapshot);
        }
        Some(snapshot)
    }

    /// Timer fire for the harsh-flag auto-clear. Returns whether the flag
    /// was cleared; stale or post-stop fires are no-ops. A clear is pushed
    /// to observers straight away rather than waiting for the next sample.
    pub fn on_flag_timer(&mut self, token: FlagTimerToken, now_ms: u64) -> bool {
        if !self.state.harsh_flag() {
            return false;
        }
        let state = std::mem::take(&mut self.state);
        self.state = state.clear_flag(token);
        if self.state.harsh_flag() {
            return false;
        }

        log::debug!("Harsh flag cleared at {} ms", now_ms);
        let snapshot = self.snapshot(now_ms);
        for observer in self.observers.iter_mut() {
            observer.on_tick(&snapshot);
        }
        true
    }

    pub fn snapshot(&self, now_ms: u64) -> TickSnapshot {
        TickSnapshot {
            timestamp_ms: now_ms,
            magnitude: self.state.last_magnitude().unwrap_or(0.0),
            harsh_flag: self.state.harsh_flag(),
            eco_score: self.state.eco_score(),
            event_count: self.state.event_count(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        if self.state.is_active() {
            SessionPhase::Active
        } else {
            SessionPhase::Idle
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    pub fn state(&self) -> &TripState {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn timers(&self) -> &T {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut T {
        &mut self.timers
    }
}
