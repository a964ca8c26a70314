//! Single-threaded event queue that feeds a [`Session`].
//!
//! Sample ticks and harsh-flag timer fires share one logical queue. Events are
//! delivered strictly in time order; a timer due at the same instant as a
//! sample fires first.

use crate::error::EngineResult;
use crate::sensor_receiver::{ReplaySource, SampleSource, TimedSample};
use crate::session::Session;
use crate::summary::TripSummary;
use crate::trip_state::{FlagTimer, FlagTimerToken};

/// One-shot timer service used for the harsh-flag auto-clear
pub trait TimerHost {
    fn schedule(&mut self, timer: FlagTimer);
    fn cancel(&mut self, token: FlagTimerToken);
}

/// Timers waiting to fire, polled by whoever owns the clock
#[derive(Debug, Default, Clone)]
pub struct PendingTimers {
    timers: Vec<FlagTimer>,
}

impl PendingTimers {
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.iter().map(|t| t.deadline_ms).min()
    }

    /// Remove and return the earliest timer due at or before `now_ms`
    pub fn pop_due(&mut self, now_ms: u64) -> Option<FlagTimer> {
        let (idx, _) = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.deadline_ms <= now_ms)
            .min_by_key(|(_, t)| t.deadline_ms)?;
        Some(self.timers.remove(idx))
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

impl TimerHost for PendingTimers {
    fn schedule(&mut self, timer: FlagTimer) {
        self.timers.push(timer);
    }

    fn cancel(&mut self, token: FlagTimerToken) {
        self.timers.retain(|t| t.token != token);
    }
}

/// Counters from one pass over the event queue
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueueStats {
    pub samples_delivered: usize,
    pub ticks_processed: usize,
    pub timers_fired: usize,
    pub flag_clears: usize,
}

pub type ReplaySession = Session<ReplaySource, PendingTimers>;

/// Fire every timer due at or before `now_ms`
pub fn fire_due_timers<S: SampleSource>(
    session: &mut Session<S, PendingTimers>,
    now_ms: u64,
    stats: &mut QueueStats,
) {
    while let Some(timer) = session.timers_mut().pop_due(now_ms) {
        stats.timers_fired += 1;
        if session.on_flag_timer(timer.token, now_ms) {
            stats.flag_clears += 1;
        }
    }
}

/// Drain the session's replay source up to and including `until_ms`
/// (everything when `None`), firing timers in between.
pub fn run_until(session: &mut ReplaySession, until_ms: Option<u64>) -> QueueStats {
    let mut stats = QueueStats::default();
    let within = |t: u64| until_ms.map_or(true, |end| t <= end);

    loop {
        let next_sample = session.source().peek_timestamp().filter(|&t| within(t));
        let next_timer = session.timers().next_deadline().filter(|&t| within(t));

        match (next_sample, next_timer) {
            (None, None) => break,
            (Some(s), Some(d)) if d <= s => fire_due_timers(session, d, &mut stats),
            (None, Some(d)) => fire_due_timers(session, d, &mut stats),
            (Some(_), _) => {
                let Some(TimedSample {
                    timestamp_ms,
                    sample,
                }) = session.source_mut().next_sample()
                else {
                    break;
                };
                stats.samples_delivered += 1;
                if session.on_sample(&sample, timestamp_ms).is_some() {
                    stats.ticks_processed += 1;
                }
            }
        }
    }

    stats
}

/// Replay a whole recorded trip: start at the first sample, drain, stop at
/// the last sample (or at `end_ms` if later).
pub fn replay_trip(
    session: &mut ReplaySession,
    end_ms: Option<u64>,
) -> EngineResult<(TripSummary, QueueStats)> {
    let start_ms = session.source().first_timestamp().unwrap_or(0);
    let last_ms = session.source().last_timestamp().unwrap_or(start_ms);
    let stop_ms = end_ms.map_or(last_ms, |end| end.max(last_ms));

    session.start(start_ms)?;
    let stats = run_until(session, Some(stop_ms));
    let summary = session
        .stop(stop_ms)
        .unwrap_or_else(|| TripSummary::from_state(session.state(), stop_ms));
    Ok((summary, stats))
}
