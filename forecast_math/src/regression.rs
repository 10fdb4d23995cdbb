//! Linear trend fitting over an evenly spaced index axis
//!
//! The x values are the positions `0, 1, ..., n - 1`, which is how both the
//! trend classifier and the non-seasonal decomposition look at a series.

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Fitted line `y = intercept + slope * x`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    /// Change in y per step
    pub slope: f64,
    /// Value at x = 0
    pub intercept: f64,
    /// Coefficient of determination of the fit (0 when y is constant)
    pub r_squared: f64,
    /// Number of points the line was fitted on
    pub n: usize,
}

impl LinearFit {
    /// Value of the line at position `x`
    pub fn value_at(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    /// Project the line `periods_ahead` steps past the last fitted point
    pub fn forecast(&self, periods_ahead: usize) -> f64 {
        self.value_at((self.n + periods_ahead - 1) as f64)
    }

    /// Fitted values at each training position
    pub fn fitted(&self) -> Vec<f64> {
        (0..self.n).map(|i| self.value_at(i as f64)).collect()
    }
}

/// Ordinary least-squares regression of a series on its index
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearRegression;

impl LinearRegression {
    /// Fit a line through `values` against their positions
    pub fn fit(values: &[f64]) -> Result<LinearFit> {
        if values.len() < 2 {
            return Err(MathError::InsufficientData(
                "Not enough data for linear regression. Need at least 2 points.".to_string(),
            ));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(MathError::InvalidInput(
                "Linear regression requires finite values".to_string(),
            ));
        }

        let n = values.len() as f64;
        let x_mean = (n - 1.0) / 2.0;
        let y_mean = values.iter().sum::<f64>() / n;

        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for (i, &y) in values.iter().enumerate() {
            let x = i as f64;
            numerator += (x - x_mean) * (y - y_mean);
            denominator += (x - x_mean) * (x - x_mean);
        }

        if denominator.abs() < 1e-10 {
            return Err(MathError::CalculationError(
                "Cannot calculate slope: x values are too similar".to_string(),
            ));
        }

        let slope = numerator / denominator;
        let intercept = y_mean - slope * x_mean;

        let mut ss_total = 0.0;
        let mut ss_residual = 0.0;
        for (i, &y) in values.iter().enumerate() {
            let y_pred = intercept + slope * i as f64;
            ss_total += (y - y_mean).powi(2);
            ss_residual += (y - y_pred).powi(2);
        }

        let r_squared = if ss_total.abs() < 1e-10 {
            0.0
        } else {
            (1.0 - ss_residual / ss_total).clamp(0.0, 1.0)
        };

        Ok(LinearFit {
            slope,
            intercept,
            r_squared,
            n: values.len(),
        })
    }
}
