use thiserror::Error;

/// Engine error types
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Accelerometer is not available on this device")]
    SensorUnavailable,

    #[error("Failed to subscribe to sample source: {0}")]
    SubscribeFailed(String),

    #[error("Haptic feedback failed: {0}")]
    HapticFailure(String),

    #[error("Invalid sample: x={x}, y={y}, z={z}")]
    InvalidSample { x: f64, y: f64, z: f64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Whether this error is allowed to cross into the presentation layer.
    /// Everything else is logged and the last-known state is kept.
    pub fn is_fatal_to_start(&self) -> bool {
        matches!(
            self,
            EngineError::SensorUnavailable | EngineError::SubscribeFailed(_)
        )
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(EngineError::SensorUnavailable.is_fatal_to_start());
        assert!(EngineError::SubscribeFailed("busy".to_string()).is_fatal_to_start());
        assert!(!EngineError::HapticFailure("no motor".to_string()).is_fatal_to_start());
        assert!(!EngineError::InvalidSample {
            x: f64::NAN,
            y: 0.0,
            z: 1.0
        }
        .is_fatal_to_start());
    }

    #[test]
    fn test_messages() {
        let err = EngineError::InvalidConfig("cooldown_ms must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: cooldown_ms must be positive"
        );
    }
}
