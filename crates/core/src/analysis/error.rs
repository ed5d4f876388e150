use thiserror::Error;

/// Caller misuse detected by the analysis functions. Never transient, never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("division by zero: radius must be positive (got {radius_km} km)")]
    DivisionByZero { radius_km: f64 },

    #[error("insufficient data: need at least {required} locations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("invalid scoring config: {0}")]
    InvalidConfig(String),

    #[error("invalid coordinate: lat={lat}, lng={lng}")]
    InvalidCoordinate { lat: f64, lng: f64 },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}
