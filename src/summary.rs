use crate::config::EngineConfig;
use crate::incident::{HarshEvent, HarshKind};
use crate::trip_state::TripState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Litres of fuel wasted per harsh event (rough eco-driving estimate)
pub const FUEL_WASTE_PER_EVENT_L: f64 = 0.05;
/// kg CO2 per litre of gasoline
pub const CO2_PER_LITRE_KG: f64 = 2.31;

/// Finished trip, handed to the caller on stop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSummary {
    pub trip_id: String,
    pub start_time_ms: u64,
    pub end_time_ms: u64,
    pub duration_ms: u64,
    pub eco_score: u8,
    pub events: Vec<HarshEvent>,
    pub braking_count: usize,
    pub acceleration_count: usize,
    pub peak_magnitude: f64,
}

impl TripSummary {
    pub fn from_state(state: &TripState, end_time_ms: u64) -> Self {
        let events = state.events().to_vec();
        let braking_count = events
            .iter()
            .filter(|e| e.kind == HarshKind::Braking)
            .count();

        TripSummary {
            trip_id: state.trip_id().to_string(),
            start_time_ms: state.start_time_ms(),
            end_time_ms,
            duration_ms: end_time_ms.saturating_sub(state.start_time_ms()),
            eco_score: state.eco_score(),
            acceleration_count: events.len() - braking_count,
            braking_count,
            events,
            peak_magnitude: state.peak_magnitude(),
        }
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration_ms / 1000
    }

    /// `MM:SS`; minutes keep counting past 59
    pub fn formatted_duration(&self) -> String {
        let secs = self.duration_secs();
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }

    pub fn meets_minimum_duration(&self, min_secs: u64) -> bool {
        self.duration_secs() >= min_secs
    }

    pub fn estimated_fuel_wasted_litres(&self) -> f64 {
        self.events.len() as f64 * FUEL_WASTE_PER_EVENT_L
    }

    pub fn estimated_co2_kg(&self) -> f64 {
        self.estimated_fuel_wasted_litres() * CO2_PER_LITRE_KG
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        millis_to_utc(self.start_time_ms)
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        millis_to_utc(self.end_time_ms)
    }
}

fn millis_to_utc(ms: u64) -> Option<DateTime<Utc>> {
    i64::try_from(ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
}

/// Trip export (JSON-serializable) for whatever persistence layer sits
/// downstream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripExport {
    pub summary: TripSummary,
    pub config: EngineConfig,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub formatted_duration: String,
    pub worth_keeping: bool,
    pub estimated_fuel_wasted_litres: f64,
    pub estimated_co2_kg: f64,
}

impl TripExport {
    pub fn new(summary: TripSummary, config: &EngineConfig) -> Self {
        TripExport {
            started_at: summary.started_at().map(|t| t.to_rfc3339()),
            ended_at: summary.ended_at().map(|t| t.to_rfc3339()),
            formatted_duration: summary.formatted_duration(),
            worth_keeping: summary.meets_minimum_duration(config.min_trip_duration_secs),
            estimated_fuel_wasted_litres: summary.estimated_fuel_wasted_litres(),
            estimated_co2_kg: summary.estimated_co2_kg(),
            config: config.clone(),
            summary,
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Serialize to JSON bytes
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor_receiver::Sample;
    use approx::assert_relative_eq;

    fn summary_with(events: usize, duration_ms: u64) -> TripSummary {
        let mut config = EngineConfig::default();
        config.cooldown_ms = 1;
        let mut state = TripState::begin(1_700_000_000_000, &config);
        for i in 0..events as u64 {
            let x = if i % 2 == 0 { -1.2 } else { 1.2 };
            state = state
                .apply_sample(&Sample::new(x, 0.0, 1.0), 1_700_000_000_000 + i * 10)
                .state;
        }
        TripSummary::from_state(&state, 1_700_000_000_000 + duration_ms)
    }

    #[test]
    fn test_counts_by_kind() {
        let summary = summary_with(5, 90_000);
        assert_eq!(summary.event_count(), 5);
        assert_eq!(summary.braking_count, 3);
        assert_eq!(summary.acceleration_count, 2);
        assert_eq!(summary.eco_score, 75);
        assert!(summary.peak_magnitude > 4.5);
    }

    #[test]
    fn test_duration_formatting() {
        assert_eq!(summary_with(0, 65_400).formatted_duration(), "01:05");
        assert_eq!(summary_with(0, 3_725_000).formatted_duration(), "62:05");
        assert_eq!(summary_with(0, 0).formatted_duration(), "00:00");
    }

    #[test]
    fn test_minimum_duration() {
        assert!(!summary_with(0, 59_999).meets_minimum_duration(60));
        assert!(summary_with(0, 60_000).meets_minimum_duration(60));
    }

    #[test]
    fn test_fuel_and_co2_estimates() {
        let summary = summary_with(4, 120_000);
        assert_relative_eq!(summary.estimated_fuel_wasted_litres(), 0.2, epsilon = 1e-12);
        assert_relative_eq!(summary.estimated_co2_kg(), 0.462, epsilon = 1e-12);
    }

    #[test]
    fn test_export_json() {
        let summary = summary_with(1, 120_000);
        let export = TripExport::new(summary, &EngineConfig::default());
        assert!(export.worth_keeping);
        assert_eq!(export.formatted_duration, "02:00");
        assert!(export.started_at.as_deref().unwrap().starts_with("2023-11-14"));

        let json = export.to_json().unwrap();
        assert!(json.contains("trip_1700000000000"));
        assert!(json.contains("\"kind\": \"braking\""));
    }
}
