//! Error types for the demand_forecast crate

use forecast_math::MathError;
use thiserror::Error;

/// Custom error types for the demand_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// A raw observation had no parseable date or an invalid count
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Too few observations for the requested operation
    #[error("Insufficient data: need at least {needed} points, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// The model fit did not converge (singular system, zero variance, ...)
    #[error("Degenerate fit: {0}")]
    FittingDegenerate(String),

    /// Actual and predicted sequences have different lengths
    #[error("Dimension mismatch: {actual} actual values vs {predicted} predicted values")]
    DimensionMismatch { actual: usize, predicted: usize },

    /// An actual or predicted sequence was empty
    #[error("Empty input: actual and predicted values must be non-empty")]
    EmptyInput,

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error from the numeric layer
    #[error("Math error: {0}")]
    Math(#[from] MathError),

    /// Error serializing forecast output
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl ForecastError {
    /// Whether the engine recovers from this error with a flat forecast
    pub fn is_degenerate_fit(&self) -> bool {
        matches!(
            self,
            ForecastError::FittingDegenerate(_) | ForecastError::Math(MathError::SingularMatrix(_))
        )
    }
}
