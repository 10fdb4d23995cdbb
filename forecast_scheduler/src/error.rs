//! Error types for the forecast_scheduler crate

use demand_forecast::ForecastError;
use thiserror::Error;

/// Failure of a persistence collaborator
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store rejected the write: {0}")]
    Rejected(String),
}

/// Custom error types for the forecast_scheduler crate
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Persistence error: {0}")]
    Store(#[from] StoreError),

    #[error("Forecast error: {0}")]
    Forecast(#[from] ForecastError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, SchedulerError>;
