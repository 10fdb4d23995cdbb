//! Accuracy metrics for evaluating forecasts against observed counts

use crate::data::ObservationSeries;
use crate::error::{ForecastError, Result};
use crate::models::ForecastEngine;
use crate::utils::{train_test_split, HoldoutPolicy};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Fewest paired values [`validate`] accepts
pub const MIN_VALIDATION_POINTS: usize = 2;

/// Qualitative reading of R²
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Interpretation {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl Interpretation {
    /// Tier for a clamped R²: `>= 0.9` Excellent, `>= 0.8` Good, `>= 0.6` Fair
    pub fn from_r_squared(r_squared: f64) -> Self {
        if r_squared >= 0.9 {
            Interpretation::Excellent
        } else if r_squared >= 0.8 {
            Interpretation::Good
        } else if r_squared >= 0.6 {
            Interpretation::Fair
        } else {
            Interpretation::Poor
        }
    }
}

impl fmt::Display for Interpretation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Interpretation::Excellent => "Excellent",
            Interpretation::Good => "Good",
            Interpretation::Fair => "Fair",
            Interpretation::Poor => "Poor",
        })
    }
}

/// Forecast accuracy against held-out actuals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyReport {
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Absolute Percentage Error over non-zero actuals, in percent
    pub mape: f64,
    /// Coefficient of determination, clamped to [0, 1]
    pub r_squared: f64,
    /// Unclamped R², `None` when it is undefined
    pub r_squared_raw: Option<f64>,
    pub interpretation: Interpretation,
    /// Number of paired values compared
    pub sample_size: usize,
}

fn check_inputs(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.is_empty() || predicted.is_empty() {
        return Err(ForecastError::EmptyInput);
    }
    if actual.len() != predicted.len() {
        return Err(ForecastError::DimensionMismatch {
            actual: actual.len(),
            predicted: predicted.len(),
        });
    }
    if actual.iter().chain(predicted.iter()).any(|v| !v.is_finite()) {
        return Err(ForecastError::InvalidParameter(
            "Actual and predicted values must be finite".to_string(),
        ));
    }
    Ok(())
}

/// Compare predictions with actuals.
///
/// Fails with [`ForecastError::EmptyInput`] before
/// [`ForecastError::DimensionMismatch`] before
/// [`ForecastError::InsufficientData`] (fewer than two pairs).
pub fn validate(actual: &[f64], predicted: &[f64]) -> Result<AccuracyReport> {
    check_inputs(actual, predicted)?;
    if actual.len() < MIN_VALIDATION_POINTS {
        return Err(ForecastError::InsufficientData {
            needed: MIN_VALIDATION_POINTS,
            got: actual.len(),
        });
    }

    let mse = mean_squared_error(actual, predicted)?;
    let r_squared_raw = r_squared_unclamped(actual, predicted)?;
    let r_squared = r_squared_raw.map_or(0.0, |r| r.clamp(0.0, 1.0));

    Ok(AccuracyReport {
        mse,
        rmse: mse.sqrt(),
        mae: mean_absolute_error(actual, predicted)?,
        mape: mean_absolute_percentage_error(actual, predicted)?,
        r_squared,
        r_squared_raw,
        interpretation: Interpretation::from_r_squared(r_squared),
        sample_size: actual.len(),
    })
}

/// Calculate Mean Absolute Error
pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_inputs(actual, predicted)?;
    let sum: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).abs())
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Calculate Mean Squared Error
pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_inputs(actual, predicted)?;
    let sum: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Calculate Root Mean Squared Error
pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    Ok(mean_squared_error(actual, predicted)?.sqrt())
}

/// Mean Absolute Percentage Error in percent.
///
/// Pairs with a zero actual are left out; if every actual is zero the result is 0.
pub fn mean_absolute_percentage_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_inputs(actual, predicted)?;
    let (sum, count) = actual
        .iter()
        .zip(predicted.iter())
        .filter(|(a, _)| **a != 0.0)
        .fold((0.0, 0usize), |(sum, count), (a, p)| {
            (sum + ((a - p) / a).abs(), count + 1)
        });

    if count == 0 {
        Ok(0.0)
    } else {
        Ok(sum / count as f64 * 100.0)
    }
}

/// `1 - SS_res / SS_tot` without clamping.
///
/// A constant actual series has no variance to explain: a perfect match
/// scores 1, anything else is undefined.
pub fn r_squared_unclamped(actual: &[f64], predicted: &[f64]) -> Result<Option<f64>> {
    check_inputs(actual, predicted)?;
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    let ss_res: f64 = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum();

    if ss_tot < 1e-12 {
        return Ok(if ss_res < 1e-12 { Some(1.0) } else { None });
    }
    Ok(Some(1.0 - ss_res / ss_tot))
}

/// Outcome of a holdout backtest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backtest {
    /// Observations the model was fitted on
    pub training_points: usize,
    /// Observations held out for comparison
    pub holdout_points: usize,
    pub actual: Vec<f64>,
    pub predicted: Vec<f64>,
    pub report: AccuracyReport,
}

/// Fit on a training prefix, forecast the held-out suffix and compare.
///
/// The holdout length comes from `policy` and `horizon`; the prefix must keep
/// at least two observations.
pub fn backtest(
    engine: &dyn ForecastEngine,
    series: &ObservationSeries,
    horizon: usize,
    policy: &HoldoutPolicy,
    label: &str,
) -> Result<Backtest> {
    let holdout = policy.holdout_len(series.len(), horizon);
    let (train, test) = train_test_split(series, holdout)?;

    let forecast = engine.forecast(&train, test.len(), label)?;
    let actual = test.values();
    let predicted = forecast.predicted_values();
    let report = validate(&actual, &predicted)?;

    debug!(
        label,
        training_points = train.len(),
        holdout_points = test.len(),
        r_squared = report.r_squared,
        "backtest complete"
    );

    Ok(Backtest {
        training_points: train.len(),
        holdout_points: test.len(),
        actual,
        predicted,
        report,
    })
}
