//! Forecasting engine: turns a formatted series into dated forecast points

use crate::data::ObservationSeries;
use crate::error::{ForecastError, Result};
use crate::models::flat::FlatMean;
use crate::models::sarima::{SeasonalArima, MIN_FIT_POINTS};
use crate::models::{
    ForecastModel, ForecastPoint, ForecastResult, RawForecast, TrainedForecastModel, Trend,
};
use forecast_math::z_score_for_confidence;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Prefix of every model version tag
pub const ENGINE_VERSION: &str = concat!("demand_forecast-", env!("CARGO_PKG_VERSION"));

/// Tunables of [`SeasonalForecastEngine`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Coverage of the forecast band, in (0, 1)
    pub confidence_level: f64,
    /// AR order of the ARMA stage
    pub ar_order: usize,
    /// MA order of the ARMA stage
    pub ma_order: usize,
    /// Largest differencing order the fit may pick
    pub max_differencing: usize,
    /// Relative trend change over the history below which the trend is stable
    pub trend_dead_band: f64,
    /// Seasonal strength at which seasonality is reported
    pub seasonality_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
            ar_order: 1,
            ma_order: 1,
            max_differencing: 1,
            trend_dead_band: 0.05,
            seasonality_threshold: 0.3,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "confidence_level must be in (0, 1), got {}",
                self.confidence_level
            )));
        }
        if self.ar_order > 5 || self.ma_order > 5 {
            return Err(ForecastError::InvalidParameter(format!(
                "ARMA orders must be at most 5, got ({}, {})",
                self.ar_order, self.ma_order
            )));
        }
        if self.max_differencing > 2 {
            return Err(ForecastError::InvalidParameter(format!(
                "max_differencing must be at most 2, got {}",
                self.max_differencing
            )));
        }
        if !(self.trend_dead_band >= 0.0 && self.trend_dead_band.is_finite()) {
            return Err(ForecastError::InvalidParameter(format!(
                "trend_dead_band must be a non-negative number, got {}",
                self.trend_dead_band
            )));
        }
        if !(0.0..=1.0).contains(&self.seasonality_threshold) {
            return Err(ForecastError::InvalidParameter(format!(
                "seasonality_threshold must be in [0, 1], got {}",
                self.seasonality_threshold
            )));
        }
        Ok(())
    }
}

/// A forecasting engine the orchestrator can call.
///
/// Implementations must be deterministic for a given series and horizon.
pub trait ForecastEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Forecast `horizon` periods past the end of `series`.
    ///
    /// `label` names the series in logs and in the returned forecast.
    fn forecast(&self, series: &ObservationSeries, horizon: usize, label: &str)
        -> Result<RawForecast>;
}

/// What a trained model contributes to a [`RawForecast`]
struct ModelOutput {
    result: ForecastResult,
    trend: Trend,
    seasonality_detected: bool,
    seasonal_period: Option<usize>,
    residual_std_dev: f64,
    version: String,
}

fn run_model<M: ForecastModel>(
    model: &M,
    series: &ObservationSeries,
    horizon: usize,
) -> Result<ModelOutput> {
    let trained = model.train(series)?;
    let result = trained.forecast(horizon)?;
    if !result.is_finite() {
        return Err(ForecastError::FittingDegenerate(format!(
            "{} produced a non-finite forecast",
            model.name()
        )));
    }

    Ok(ModelOutput {
        result,
        trend: trained.trend(),
        seasonality_detected: trained.seasonality_detected(),
        seasonal_period: trained.seasonal_period(),
        residual_std_dev: trained.residual_std_dev(),
        version: trained.version(),
    })
}

/// Seasonal ARIMA engine with a flat mean fallback
#[derive(Debug, Clone)]
pub struct SeasonalForecastEngine {
    config: EngineConfig,
    model: SeasonalArima,
    fallback: FlatMean,
}

impl SeasonalForecastEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: EngineConfig) -> Self {
        let model = SeasonalArima::new(config.ar_order, config.ma_order, config.max_differencing)
            .with_trend_dead_band(config.trend_dead_band)
            .with_seasonality_threshold(config.seasonality_threshold);
        let fallback = FlatMean::new(config.trend_dead_band);

        Self {
            config,
            model,
            fallback,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl Default for SeasonalForecastEngine {
    fn default() -> Self {
        Self::from_valid(EngineConfig::default())
    }
}

impl ForecastEngine for SeasonalForecastEngine {
    fn name(&self) -> &str {
        "seasonal-arima"
    }

    fn forecast(
        &self,
        series: &ObservationSeries,
        horizon: usize,
        label: &str,
    ) -> Result<RawForecast> {
        if horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "Forecast horizon must be positive".to_string(),
            ));
        }
        let Some(last) = series.last_period().filter(|_| series.len() >= MIN_FIT_POINTS) else {
            return Err(ForecastError::InsufficientData {
                needed: MIN_FIT_POINTS,
                got: series.len(),
            });
        };

        let periods = series.cadence().future_periods(last, horizon)?;

        let (output, degraded) = match run_model(&self.model, series, horizon) {
            Ok(output) => (output, false),
            Err(e) if e.is_degenerate_fit() => {
                warn!(label, error = %e, "seasonal fit degenerate, falling back to flat mean");
                (run_model(&self.fallback, series, horizon)?, true)
            }
            Err(e) => return Err(e),
        };

        let z = z_score_for_confidence(self.config.confidence_level)?;
        let points: Vec<ForecastPoint> = periods
            .into_iter()
            .zip(output.result.values().iter())
            .zip(output.result.standard_errors().iter())
            .map(|((period, &value), &se)| {
                let margin = z * se;
                let predicted = value.max(0.0);
                ForecastPoint {
                    period,
                    predicted,
                    lower_bound: (value - margin).max(0.0),
                    upper_bound: (value + margin).max(predicted),
                    confidence_level: self.config.confidence_level,
                }
            })
            .collect();

        let model_version = format!("{}/{}", ENGINE_VERSION, output.version);
        debug!(
            label,
            horizon,
            n = series.len(),
            model = %model_version,
            degraded,
            "forecast generated"
        );

        Ok(RawForecast {
            label: label.to_string(),
            points,
            trend: output.trend,
            seasonality_detected: output.seasonality_detected,
            seasonal_period: output.seasonal_period,
            model_version,
            degraded,
            residual_std_dev: output.residual_std_dev,
            data_points: series.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Cadence;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn test_config_validation() {
        assert!(EngineConfig::default().validate().is_ok());

        let bad_level = EngineConfig {
            confidence_level: 1.0,
            ..EngineConfig::default()
        };
        assert!(SeasonalForecastEngine::new(bad_level).is_err());

        let bad_order = EngineConfig {
            ar_order: 9,
            ..EngineConfig::default()
        };
        assert!(bad_order.validate().is_err());
    }

    #[test]
    fn test_constant_series_falls_back_to_flat() {
        let series = ObservationSeries::from_counts(start(), Cadence::Daily, &[6; 10]).unwrap();
        let forecast = SeasonalForecastEngine::default()
            .forecast(&series, 3, "measles")
            .unwrap();

        assert!(forecast.degraded);
        assert!(forecast.model_version.ends_with("/flat-mean"));
        assert_eq!(forecast.predicted_values(), vec![6.0, 6.0, 6.0]);
        assert_eq!(forecast.trend, Trend::Stable);
    }

    #[test]
    fn test_periods_follow_monthly_cadence() {
        let counts = [12, 15, 11, 18, 14, 16, 13, 17];
        let start = NaiveDate::from_ymd_opt(2023, 1, 31).unwrap();
        let series = ObservationSeries::from_counts(start, Cadence::Monthly, &counts).unwrap();
        let forecast = SeasonalForecastEngine::default()
            .forecast(&series, 2, "clinic visits")
            .unwrap();

        assert_eq!(forecast.points[0].period, NaiveDate::from_ymd_opt(2023, 9, 30).unwrap());
        assert_eq!(forecast.points[1].period, NaiveDate::from_ymd_opt(2023, 10, 31).unwrap());
    }

    #[test]
    fn test_rejects_bad_requests() {
        let engine = SeasonalForecastEngine::default();
        let one = ObservationSeries::from_counts(start(), Cadence::Daily, &[3]).unwrap();
        let two = ObservationSeries::from_counts(start(), Cadence::Daily, &[3, 4]).unwrap();

        assert!(matches!(
            engine.forecast(&one, 5, "x"),
            Err(ForecastError::InsufficientData { needed: 2, got: 1 })
        ));
        assert!(matches!(
            engine.forecast(&two, 0, "x"),
            Err(ForecastError::InvalidParameter(_))
        ));
    }
}
