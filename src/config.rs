use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Tunables for one monitoring session.
///
/// Every field has a default, so a partial JSON file only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample source cadence
    pub update_interval_ms: u64,
    /// m/s² (approx 0.46g)
    pub harsh_threshold_ms2: f64,
    /// Debounce between harsh events; also how long the harsh flag stays raised
    pub cooldown_ms: u64,
    /// Points deducted from the eco score per harsh event
    pub eco_score_penalty_per_event: u32,
    pub haptic_enabled: bool,
    /// Trips shorter than this are flagged as not worth keeping
    pub min_trip_duration_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 100,
            harsh_threshold_ms2: 4.5,
            cooldown_ms: 3000,
            eco_score_penalty_per_event: 5,
            haptic_enabled: true,
            min_trip_duration_secs: 60,
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file and validate
    pub fn from_json_file(path: impl AsRef<Path>) -> EngineResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> EngineResult<Self> {
        let config: EngineConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.update_interval_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "update_interval_ms must be positive".to_string(),
            ));
        }
        if self.cooldown_ms == 0 {
            return Err(EngineError::InvalidConfig(
                "cooldown_ms must be positive".to_string(),
            ));
        }
        if !self.harsh_threshold_ms2.is_finite() || self.harsh_threshold_ms2 < 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "harsh_threshold_ms2 must be finite and non-negative, got {}",
                self.harsh_threshold_ms2
            )));
        }
        if self.eco_score_penalty_per_event > 100 {
            return Err(EngineError::InvalidConfig(format!(
                "eco_score_penalty_per_event must be within 0..=100, got {}",
                self.eco_score_penalty_per_event
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.update_interval_ms, 100);
        assert_eq!(config.harsh_threshold_ms2, 4.5);
        assert_eq!(config.cooldown_ms, 3000);
        assert_eq!(config.eco_score_penalty_per_event, 5);
        assert!(config.haptic_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_overrides_defaults() {
        let config = EngineConfig::from_json_str(r#"{"cooldown_ms": 1500, "haptic_enabled": false}"#)
            .unwrap();
        assert_eq!(config.cooldown_ms, 1500);
        assert!(!config.haptic_enabled);
        assert_eq!(config.harsh_threshold_ms2, 4.5);
        assert_eq!(config.update_interval_ms, 100);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(EngineConfig::from_json_str(r#"{"cooldown_ms": 0}"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{"update_interval_ms": 0}"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{"harsh_threshold_ms2": -1.0}"#).is_err());
        assert!(EngineConfig::from_json_str(r#"{"eco_score_penalty_per_event": 101}"#).is_err());
    }

    #[test]
    fn test_malformed_json() {
        let err = EngineConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, EngineError::Json(_)));
    }
}
