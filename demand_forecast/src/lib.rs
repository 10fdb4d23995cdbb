//! # Demand Forecast
//!
//! Seasonal forecasting of health-office count series: disease case counts
//! and service demand per period.
//!
//! ## Features
//!
//! - Formatting raw historical rows (mixed date and count representations)
//!   into strictly ordered series, merging duplicate periods
//! - Severity classification of counts against a population denominator
//! - Seasonal ARIMA-style forecasting with confidence bands, trend direction
//!   and seasonality detection, degrading to a flat mean when the fit fails
//! - Accuracy validation (MSE, RMSE, MAE, MAPE, R²) and holdout backtesting
//!
//! ## Quick Start
//!
//! ```rust
//! use demand_forecast::data::{format_observations, RawObservation};
//! use demand_forecast::models::{ForecastEngine, SeasonalForecastEngine};
//! use demand_forecast::severity::classify;
//!
//! let rows: Vec<RawObservation> = (1..=21)
//!     .map(|day| RawObservation::new(format!("2024-03-{:02}", day), 10 + day % 7))
//!     .collect();
//! let series = format_observations(&rows)?;
//!
//! let engine = SeasonalForecastEngine::default();
//! let forecast = engine.forecast(&series, 7, "influenza")?;
//! assert_eq!(forecast.points.len(), 7);
//!
//! let peak = forecast.peak().round() as u64;
//! println!("peak {} -> {}", peak, classify(peak, Some(5_000)));
//! # Ok::<(), demand_forecast::ForecastError>(())
//! ```

pub mod data;
pub mod error;
pub mod metrics;
pub mod models;
pub mod severity;
pub mod utils;

// Re-export commonly used types
pub use crate::data::{format_observations, Cadence, ObservationSeries, RawObservation};
pub use crate::error::{ForecastError, Result};
pub use crate::metrics::{backtest, validate, AccuracyReport, Backtest, Interpretation};
pub use crate::models::{
    EngineConfig, ForecastEngine, ForecastPoint, RawForecast, SeasonalForecastEngine, Trend,
};
pub use crate::severity::{classify, SeverityLabel};
pub use crate::utils::HoldoutPolicy;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
