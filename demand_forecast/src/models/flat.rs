//! Flat mean model, used when the seasonal fit degenerates

use crate::data::ObservationSeries;
use crate::error::{ForecastError, Result};
use crate::models::decomposition::classify_trend;
use crate::models::{ForecastModel, ForecastResult, TrainedForecastModel, Trend};
use forecast_math::stats::{mean, std_dev};

/// Forecasts the historical mean for every future period
#[derive(Debug, Clone)]
pub struct FlatMean {
    name: String,
    trend_dead_band: f64,
}

/// Trained flat mean model
#[derive(Debug, Clone)]
pub struct TrainedFlatMean {
    mean: f64,
    std_dev: f64,
    n: usize,
    trend: Trend,
}

impl FlatMean {
    pub fn new(trend_dead_band: f64) -> Self {
        Self {
            name: "Flat Mean".to_string(),
            trend_dead_band,
        }
    }
}

impl Default for FlatMean {
    fn default() -> Self {
        Self::new(0.05)
    }
}

impl ForecastModel for FlatMean {
    type Trained = TrainedFlatMean;

    fn train(&self, series: &ObservationSeries) -> Result<TrainedFlatMean> {
        let values = series.values();
        if values.is_empty() {
            return Err(ForecastError::InsufficientData { needed: 1, got: 0 });
        }

        Ok(TrainedFlatMean {
            mean: mean(&values)?,
            std_dev: std_dev(&values)?,
            n: values.len(),
            trend: classify_trend(&values, self.trend_dead_band),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedForecastModel for TrainedFlatMean {
    fn forecast(&self, horizon: usize) -> Result<ForecastResult> {
        // Prediction error of a sample mean: sigma * sqrt(1 + 1/n)
        let se = self.std_dev * (1.0 + 1.0 / self.n as f64).sqrt();
        ForecastResult::new(vec![self.mean; horizon], horizon, vec![se; horizon])
    }

    fn trend(&self) -> Trend {
        self.trend
    }

    fn seasonality_detected(&self) -> bool {
        false
    }

    fn residual_std_dev(&self) -> f64 {
        self.std_dev
    }

    fn version(&self) -> String {
        "flat-mean".to_string()
    }
}
