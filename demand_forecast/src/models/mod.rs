//! Forecasting models for count series

use crate::data::ObservationSeries;
use crate::error::{ForecastError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};

pub mod decomposition;
pub mod engine;
pub mod flat;
pub mod sarima;

pub use decomposition::{classify_trend, Decomposition};
pub use engine::{EngineConfig, ForecastEngine, SeasonalForecastEngine};
pub use flat::FlatMean;
pub use sarima::{SeasonalArima, TrainedSeasonalArima};

/// Direction of the fitted trend component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trend::Increasing => "increasing",
            Trend::Decreasing => "decreasing",
            Trend::Stable => "stable",
        })
    }
}

/// One forecast period with its confidence band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub period: NaiveDate,
    /// Point forecast, never negative
    pub predicted: f64,
    /// Lower bound, floored at zero
    pub lower_bound: f64,
    /// Upper bound, never below `predicted`
    pub upper_bound: f64,
    /// Coverage of the band, in (0, 1]
    pub confidence_level: f64,
}

/// Engine output for one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawForecast {
    /// Caller-supplied name of what was forecast
    pub label: String,
    pub points: Vec<ForecastPoint>,
    pub trend: Trend,
    pub seasonality_detected: bool,
    /// Seasonal cycle length used by the fit, if any
    pub seasonal_period: Option<usize>,
    pub model_version: String,
    /// True when the fit failed and a flat mean forecast was returned
    pub degraded: bool,
    /// In-sample one-step residual standard deviation
    pub residual_std_dev: f64,
    /// Length of the series the forecast was fitted on
    pub data_points: usize,
}

impl RawForecast {
    pub fn horizon(&self) -> usize {
        self.points.len()
    }

    pub fn predicted_values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.predicted).collect()
    }

    /// Largest point forecast, or 0 for an empty forecast
    pub fn peak(&self) -> f64 {
        self.points
            .iter()
            .map(|p| p.predicted)
            .fold(0.0, f64::max)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Forecast values on the model's own scale, before flooring
#[derive(Debug, Clone)]
pub struct ForecastResult {
    /// Forecasted values
    pub(crate) values: Vec<f64>,
    /// Number of periods forecasted
    horizons: usize,
    /// Standard error of each forecasted value
    pub(crate) standard_errors: Vec<f64>,
}

impl ForecastResult {
    /// Create a new forecast result with per-step standard errors
    pub fn new(values: Vec<f64>, horizons: usize, standard_errors: Vec<f64>) -> Result<Self> {
        if values.len() != horizons {
            return Err(ForecastError::InvalidParameter(format!(
                "Values length ({}) doesn't match horizons ({})",
                values.len(),
                horizons
            )));
        }

        if values.len() != standard_errors.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "Values length ({}) doesn't match standard errors length ({})",
                values.len(),
                standard_errors.len()
            )));
        }

        Ok(Self {
            values,
            horizons,
            standard_errors,
        })
    }

    /// Get the forecasted values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Get the number of periods forecasted
    pub fn horizons(&self) -> usize {
        self.horizons
    }

    /// Get the standard errors
    pub fn standard_errors(&self) -> &[f64] {
        &self.standard_errors
    }

    /// Whether every value and standard error is a finite number
    pub fn is_finite(&self) -> bool {
        self.values
            .iter()
            .chain(self.standard_errors.iter())
            .all(|v| v.is_finite())
    }

    /// Symmetric normal intervals at `confidence_level`
    pub fn confidence_intervals(&self, confidence_level: f64) -> Result<Vec<(f64, f64)>> {
        let z_score = forecast_math::z_score_for_confidence(confidence_level)?;

        Ok(self
            .values
            .iter()
            .zip(self.standard_errors.iter())
            .map(|(v, se)| {
                let margin = z_score * se;
                (v - margin, v + margin)
            })
            .collect())
    }
}

/// Trained forecast model
pub trait TrainedForecastModel: Debug {
    /// Generate forecast for future periods
    fn forecast(&self, horizon: usize) -> Result<ForecastResult>;

    /// Direction of the fitted trend
    fn trend(&self) -> Trend;

    /// Whether a seasonal cycle stands out from the noise
    fn seasonality_detected(&self) -> bool;

    /// Seasonal cycle length used by the fit
    fn seasonal_period(&self) -> Option<usize> {
        None
    }

    /// In-sample residual standard deviation
    fn residual_std_dev(&self) -> f64;

    /// Version tag recorded with persisted forecasts
    fn version(&self) -> String;
}

/// Forecast model that can be trained on a count series
pub trait ForecastModel: Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedForecastModel;

    /// Train the model on a formatted series
    fn train(&self, series: &ObservationSeries) -> Result<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> &str;
}
