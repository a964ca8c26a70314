use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use clap::Parser;
use ecodrive_core::driver::{replay_trip, PendingTimers};
use ecodrive_core::feedback::{LogHaptics, RecordingObserver};
use ecodrive_core::{EngineConfig, ReplaySource, Session, TripExport, TripLog};
use flate2::read::GzDecoder;

#[derive(Parser, Debug)]
struct Args {
    /// Path to a recorded trip_log.json[.gz]
    #[arg(long)]
    log: PathBuf,

    /// JSON engine config; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Harsh threshold in m/s²
    #[arg(long)]
    threshold: Option<f64>,

    /// Cooldown between harsh events in ms
    #[arg(long)]
    cooldown_ms: Option<u64>,

    /// Keep the trip open until this host timestamp (ms) if later than the last sample
    #[arg(long)]
    end_ms: Option<u64>,

    /// Write the trip export here
    #[arg(long)]
    export: Option<PathBuf>,

    /// Write every tick snapshot here (JSON array)
    #[arg(long)]
    ticks_out: Option<PathBuf>,
}

fn load_log(path: &Path) -> anyhow::Result<TripLog> {
    let file = File::open(path)?;
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        let gz = GzDecoder::new(file);
        let reader = BufReader::new(gz);
        Ok(serde_json::from_reader(reader)?)
    } else {
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

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

    let trip_log = load_log(&args.log)?;
    if trip_log.samples.windows(2).any(|w| w[1].timestamp_ms < w[0].timestamp_ms) {
        anyhow::bail!(
            "{} has samples out of order; the cooldown needs in-order delivery",
            args.log.display()
        );
    }
    log::info!("Loaded {} samples from {}", trip_log.samples.len(), args.log.display());

    let observer = RecordingObserver::new();
    let mut session = Session::new(
        config.clone(),
        ReplaySource::new(trip_log.samples),
        PendingTimers::default(),
    )?
    .with_haptics(Box::new(LogHaptics::default()));
    session.add_observer(Box::new(observer.clone()));

    let (summary, stats) = replay_trip(&mut session, args.end_ms)?;

    println!("=== Replay: {} ===", args.log.display());
    println!(
        "Samples: {} delivered, {} scored",
        stats.samples_delivered, stats.ticks_processed
    );
    println!("Duration: {}", summary.formatted_duration());
    println!("Eco score: {}", summary.eco_score);
    println!(
        "Harsh events: {} ({} braking, {} acceleration), flag cleared {} time(s)",
        summary.event_count(),
        summary.braking_count,
        summary.acceleration_count,
        stats.flag_clears
    );
    for event in &summary.events {
        let at = event
            .recorded_at()
            .map(|t| t.format("%H:%M:%S%.3f").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:>10} ms  {}  {:<18}  {:.2} m/s²",
            event.timestamp_ms.saturating_sub(summary.start_time_ms),
            at,
            event.kind.label(),
            event.magnitude
        );
    }

    if let Some(path) = &args.ticks_out {
        std::fs::write(path, serde_json::to_vec_pretty(&observer.ticks())?)?;
        println!("Wrote {} tick snapshots to {}", observer.tick_count(), path.display());
    }

    if let Some(path) = &args.export {
        let export = TripExport::new(summary, &config);
        std::fs::write(path, export.to_json_bytes()?)?;
        println!("Wrote trip export to {}", path.display());
    }

    Ok(())
}
