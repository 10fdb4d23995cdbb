//! # Forecast Math
//!
//! Numerical building blocks used by the demand forecasting engine.
//! This crate provides the pure calculations the engine is assembled from:
//!
//! - Descriptive statistics (mean, variance, median)
//! - Ordinary least-squares line fitting over an index axis
//! - Multiple least squares with singularity detection
//! - Differencing and its inverse
//! - Normal quantiles for confidence intervals

use thiserror::Error;

pub mod differencing;
pub mod distribution;
pub mod least_squares;
pub mod regression;
pub mod stats;

pub use differencing::{difference, integrate, suggest_differencing};
pub use distribution::{normal_quantile, z_score_for_confidence};
pub use least_squares::{solve_least_squares, solve_linear_system};
pub use regression::{LinearFit, LinearRegression};

/// Errors that can occur in forecasting math
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),

    #[error("Singular matrix: {0}")]
    SingularMatrix(String),
}

/// Result type for forecasting math operations
pub type Result<T> = std::result::Result<T, MathError>;
