//! Utility functions for holdout validation

use crate::data::ObservationSeries;
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// How much of a series to hold out when backtesting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoldoutPolicy {
    /// Largest share of the series held out
    pub fraction: f64,
    /// Holdout length floor
    pub min_points: usize,
}

impl Default for HoldoutPolicy {
    fn default() -> Self {
        Self {
            fraction: 0.2,
            min_points: 2,
        }
    }
}

impl HoldoutPolicy {
    pub fn new(fraction: f64, min_points: usize) -> Result<Self> {
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "Holdout fraction must be in (0, 1), got {}",
                fraction
            )));
        }
        Ok(Self {
            fraction,
            min_points,
        })
    }

    /// `max(min_points, min(horizon, floor(fraction * n)))`
    pub fn holdout_len(&self, n: usize, horizon: usize) -> usize {
        let by_fraction = (self.fraction * n as f64).floor() as usize;
        horizon.min(by_fraction).max(self.min_points)
    }
}

/// Split a series into a training prefix and a `holdout`-long suffix.
///
/// The prefix must keep at least two observations and the suffix at least one.
pub fn train_test_split(
    series: &ObservationSeries,
    holdout: usize,
) -> Result<(ObservationSeries, ObservationSeries)> {
    let needed = holdout.max(1) + 2;
    if series.len() < needed {
        return Err(ForecastError::InsufficientData {
            needed,
            got: series.len(),
        });
    }

    Ok(series.split_at(series.len() - holdout.max(1)))
}
