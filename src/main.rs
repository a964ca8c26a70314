use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};

use ecodrive_core::driver::{fire_due_timers, PendingTimers, QueueStats};
use ecodrive_core::feedback::{LogHaptics, SessionObserver, TickSnapshot};
use ecodrive_core::{EngineConfig, Session, SimulatedSource, TripExport, TripSummary};

#[derive(Parser, Debug)]
#[command(name = "ecodrive")]
#[command(about = "EcoDrive coach - harsh driving detection on a simulated drive", long_about = None)]
struct Args {
    /// Duration in seconds (0 = until Ctrl-C)
    #[arg(value_name = "SECONDS", default_value = "60")]
    duration: u64,

    /// JSON engine config; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Harsh threshold in m/s²
    #[arg(long)]
    threshold: Option<f64>,

    /// Cooldown between harsh events in ms
    #[arg(long)]
    cooldown_ms: Option<u64>,

    /// Sample interval in ms
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Seconds between simulated harsh manoeuvres
    #[arg(long, default_value = "12")]
    maneuver_every: u64,

    /// Disable haptic feedback
    #[arg(long)]
    no_haptics: bool,

    /// Output directory
    #[arg(long, default_value = "ecodrive_trips")]
    output_dir: String,
}

/// Prints one status line per second of driving, plus one whenever the
/// harsh warning goes up or down
struct StatusLine {
    every: usize,
    seen: usize,
    last_event_count: usize,
    last_flag: bool,
}

impl SessionObserver for StatusLine {
    fn on_tick(&mut self, snapshot: &TickSnapshot) {
        self.seen += 1;
        let changed = snapshot.event_count != self.last_event_count
            || snapshot.harsh_flag != self.last_flag;
        self.last_event_count = snapshot.event_count;
        self.last_flag = snapshot.harsh_flag;
        if changed || self.seen % self.every == 0 {
            println!(
                "[{}] accel {:5.2} m/s²  eco {:3}  events {:2}{}",
                ts_now(),
                snapshot.magnitude,
                snapshot.eco_score,
                snapshot.event_count,
                if snapshot.harsh_flag { "  ⚠ HARSH" } else { "" }
            );
        }
    }

    fn on_trip_finished(&mut self, summary: &TripSummary) {
        println!(
            "[{}] Trip {} finished after {}",
            ts_now(),
            summary.trip_id,
            summary.formatted_duration()
        );
    }
}

/// Wall-clock epoch millis that never run backwards within the process
struct MonotonicClock {
    epoch_ms: u64,
    origin: Instant,
}

impl MonotonicClock {
    fn new() -> Self {
        Self {
            epoch_ms: Utc::now().timestamp_millis().max(0) as u64,
            origin: Instant::now(),
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch_ms + self.origin.elapsed().as_millis() as u64
    }
}

fn load_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(threshold) = args.threshold {
        config.harsh_threshold_ms2 = threshold;
    }
    if let Some(cooldown) = args.cooldown_ms {
        config.cooldown_ms = cooldown;
    }
    if let Some(interval) = args.interval_ms {
        config.update_interval_ms = interval;
    }
    if args.no_haptics {
        config.haptic_enabled = false;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = load_config(&args)?;

    println!("[{}] EcoDrive Coach Starting", ts_now());
    println!("  Duration: {} seconds (0=until Ctrl-C)", args.duration);
    println!("  Threshold: {:.2} m/s²", config.harsh_threshold_ms2);
    println!("  Cooldown: {} ms", config.cooldown_ms);
    println!("  Interval: {} ms", config.update_interval_ms);
    println!("  Output Dir: {}", args.output_dir);

    std::fs::create_dir_all(&args.output_dir)?;

    let source = SimulatedSource::new(args.maneuver_every.saturating_mul(1000));
    let mut session = Session::new(config.clone(), source, PendingTimers::default())?
        .with_haptics(Box::new(LogHaptics::default()));
    session.add_observer(Box::new(StatusLine {
        every: (1000 / config.update_interval_ms).max(1) as usize,
        seen: 0,
        last_event_count: 0,
        last_flag: false,
    }));

    let clock = MonotonicClock::new();
    let start_ms = clock.now_ms();
    session.start(start_ms)?;

    let mut ticker = interval(Duration::from_millis(config.update_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut stats = QueueStats::default();

    loop {
        let now = clock.now_ms();
        if duration_reached(now.saturating_sub(start_ms), args.duration) {
            println!("[{}] Duration reached, stopping...", ts_now());
            break;
        }

        let timer_wait = session
            .timers()
            .next_deadline()
            .map(|deadline| deadline.saturating_sub(now));

        tokio::select! {
            _ = ticker.tick() => {
                let now = clock.now_ms();
                fire_due_timers(&mut session, now, &mut stats);
                let sample = session.source().sample_at(now - start_ms);
                session.on_sample(&sample, now);
            }
            _ = sleep(Duration::from_millis(timer_wait.unwrap_or(0))), if timer_wait.is_some() => {
                fire_due_timers(&mut session, clock.now_ms(), &mut stats);
            }
            _ = &mut ctrl_c => {
                println!("[{}] Interrupted, stopping...", ts_now());
                break;
            }
        }
    }

    let Some(summary) = session.stop(clock.now_ms()) else {
        return Ok(());
    };

    let export = TripExport::new(summary, &config);
    let filename = format!("{}/trip_{}.json", args.output_dir, ts_now_clean());
    std::fs::write(&filename, export.to_json()?)?;
    println!("[{}] Saved trip to {}", ts_now(), filename);

    println!("\n=== Trip Summary ===");
    println!("Duration: {}", export.formatted_duration);
    println!("Eco score: {}", export.summary.eco_score);
    println!(
        "Harsh events: {} ({} braking, {} acceleration)",
        export.summary.event_count(),
        export.summary.braking_count,
        export.summary.acceleration_count
    );
    println!("Peak acceleration: {:.2} m/s²", export.summary.peak_magnitude);
    println!(
        "Estimated fuel wasted: {:.2} L ({:.2} kg CO2)",
        export.estimated_fuel_wasted_litres, export.estimated_co2_kg
    );
    println!("Flag clears: {}", stats.flag_clears);
    if !export.worth_keeping {
        println!(
            "Trip shorter than {} s; not worth keeping",
            config.min_trip_duration_secs
        );
    }

    Ok(())
}

/// `duration_secs == 0` means run until interrupted
fn duration_reached(elapsed_ms: u64, duration_secs: u64) -> bool {
    duration_secs > 0 && elapsed_ms >= duration_secs.saturating_mul(1000)
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}

fn ts_now_clean() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_reached() {
        assert!(!duration_reached(59_999, 60));
        assert!(duration_reached(60_000, 60));
        assert!(!duration_reached(u64::MAX, 0));
        // Huge durations saturate instead of overflowing
        assert!(!duration_reached(1_000, u64::MAX));
        assert!(duration_reached(u64::MAX, u64::MAX));
    }
}
