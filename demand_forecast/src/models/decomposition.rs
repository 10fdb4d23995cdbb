//! Additive trend + seasonal + remainder decomposition
//!
//! Classical decomposition: the trend is a centered moving average over one
//! seasonal cycle, the seasonal indices are per-phase means of the detrended
//! series (re-centered to sum to zero), and the remainder is what is left.
//! Without a usable seasonal period the trend is a least-squares line and the
//! seasonal component is zero.

use crate::error::Result;
use crate::models::Trend;
use forecast_math::stats::{mean, variance};
use forecast_math::LinearRegression;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    pub trend: Vec<f64>,
    pub seasonal: Vec<f64>,
    pub remainder: Vec<f64>,
    /// One index per phase of the cycle; empty without a period
    pub indices: Vec<f64>,
    pub period: Option<usize>,
}

impl Decomposition {
    /// Decompose `values` with the given seasonal period.
    ///
    /// A period is only honoured when at least two full cycles are present.
    pub fn decompose(values: &[f64], period: Option<usize>) -> Result<Self> {
        let period = period.filter(|&p| p >= 2 && values.len() >= 2 * p);

        let (trend, indices) = match period {
            Some(p) => {
                let trend = centered_moving_average(values, p);
                let indices = seasonal_indices(values, &trend, p);
                (fill_edges(trend), indices)
            }
            None => (LinearRegression::fit(values)?.fitted(), Vec::new()),
        };

        let seasonal: Vec<f64> = (0..values.len())
            .map(|t| index_at(&indices, t))
            .collect();
        let remainder: Vec<f64> = values
            .iter()
            .zip(trend.iter().zip(seasonal.iter()))
            .map(|(y, (t, s))| y - t - s)
            .collect();

        debug!(n = values.len(), period = ?period, "decomposed series");

        Ok(Self {
            trend,
            seasonal,
            remainder,
            indices,
            period,
        })
    }

    /// Seasonal component at position `t`, including positions past the data
    pub fn seasonal_at(&self, t: usize) -> f64 {
        index_at(&self.indices, t)
    }

    /// The series with its seasonal component removed
    pub fn deseasonalize(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .zip(self.seasonal.iter())
            .map(|(y, s)| y - s)
            .collect()
    }

    /// Strength of seasonality in [0, 1]: `1 - Var(R) / Var(S + R)`
    pub fn seasonal_strength(&self) -> f64 {
        if self.period.is_none() {
            return 0.0;
        }

        let seasonal_plus_remainder: Vec<f64> = self
            .seasonal
            .iter()
            .zip(self.remainder.iter())
            .map(|(s, r)| s + r)
            .collect();

        let (Ok(var_sr), Ok(var_r)) = (variance(&seasonal_plus_remainder), variance(&self.remainder))
        else {
            return 0.0;
        };
        if var_sr < 1e-10 {
            return 0.0;
        }

        (1.0 - var_r / var_sr).clamp(0.0, 1.0)
    }
}

fn index_at(indices: &[f64], t: usize) -> f64 {
    if indices.is_empty() {
        0.0
    } else {
        indices[t % indices.len()]
    }
}

/// Centered moving average of order `period` (2 x period for even periods).
/// Positions without a full window are `None`.
fn centered_moving_average(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let half = period / 2;
    let mut trend = vec![None; n];

    for t in half..n.saturating_sub(half) {
        let average = if period % 2 == 1 {
            values[t - half..=t + half].iter().sum::<f64>() / period as f64
        } else {
            let inner: f64 = values[t - half + 1..t + half].iter().sum();
            (0.5 * values[t - half] + inner + 0.5 * values[t + half]) / period as f64
        };
        trend[t] = Some(average);
    }

    trend
}

fn seasonal_indices(values: &[f64], trend: &[Option<f64>], period: usize) -> Vec<f64> {
    let mut sums = vec![0.0; period];
    let mut counts = vec![0usize; period];

    for (t, (value, level)) in values.iter().zip(trend.iter()).enumerate() {
        if let Some(level) = level {
            sums[t % period] += value - level;
            counts[t % period] += 1;
        }
    }

    let raw: Vec<f64> = sums
        .iter()
        .zip(counts.iter())
        .map(|(sum, &count)| if count > 0 { sum / count as f64 } else { 0.0 })
        .collect();

    let centre = mean(&raw).unwrap_or(0.0);
    raw.into_iter().map(|index| index - centre).collect()
}

/// Extend the first and last defined trend values over the undefined edges
fn fill_edges(trend: Vec<Option<f64>>) -> Vec<f64> {
    let first = trend.iter().flatten().next().copied().unwrap_or(0.0);
    let last = trend.iter().rev().flatten().next().copied().unwrap_or(first);
    let first_defined = trend.iter().position(Option::is_some).unwrap_or(trend.len());

    trend
        .into_iter()
        .enumerate()
        .map(|(t, level)| match level {
            Some(level) => level,
            None if t < first_defined => first,
            None => last,
        })
        .collect()
}

/// Classify the direction of a trend component.
///
/// The least-squares slope is turned into the relative change it implies over
/// the whole span; changes within `dead_band` of zero are `Stable`.
pub fn classify_trend(trend: &[f64], dead_band: f64) -> Trend {
    let Ok(fit) = LinearRegression::fit(trend) else {
        return Trend::Stable;
    };
    let level = mean(trend).unwrap_or(0.0).abs();
    if level < 1e-9 {
        return Trend::Stable;
    }

    let relative_change = fit.slope * (trend.len() - 1) as f64 / level;
    if relative_change > dead_band {
        Trend::Increasing
    } else if relative_change < -dead_band {
        Trend::Decreasing
    } else {
        Trend::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn weekly_pattern(weeks: usize) -> Vec<f64> {
        let pattern = [10.0, 12.0, 14.0, 12.0, 10.0, 4.0, 3.0];
        (0..weeks * 7).map(|t| pattern[t % 7] + 0.1 * t as f64).collect()
    }

    #[test]
    fn test_recovers_weekly_indices() {
        let values = weekly_pattern(6);
        let decomposition = Decomposition::decompose(&values, Some(7)).unwrap();

        assert_eq!(decomposition.period, Some(7));
        assert_eq!(decomposition.indices.len(), 7);
        assert_abs_diff_eq!(decomposition.indices.iter().sum::<f64>(), 0.0, epsilon = 1e-9);

        // Peak mid-week, trough at the weekend
        assert!(decomposition.indices[2] > decomposition.indices[5]);
        assert!(decomposition.seasonal_strength() > 0.9);
        assert_abs_diff_eq!(
            decomposition.seasonal_at(values.len() + 2),
            decomposition.indices[(values.len() + 2) % 7]
        );
    }

    #[test]
    fn test_short_series_ignores_period() {
        let values: Vec<f64> = (0..10).map(|t| t as f64).collect();
        let decomposition = Decomposition::decompose(&values, Some(7)).unwrap();

        assert_eq!(decomposition.period, None);
        assert!(decomposition.indices.is_empty());
        assert_eq!(decomposition.seasonal_strength(), 0.0);
        for r in decomposition.remainder {
            assert_abs_diff_eq!(r, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_even_period_moving_average() {
        let values: Vec<f64> = (0..24).map(|t| if t % 12 < 6 { 20.0 } else { 5.0 }).collect();
        let decomposition = Decomposition::decompose(&values, Some(12)).unwrap();

        assert_eq!(decomposition.trend.len(), 24);
        assert!(decomposition.indices[0] > 0.0);
        assert!(decomposition.indices[8] < 0.0);
    }

    #[test]
    fn test_trend_classification() {
        let rising: Vec<f64> = (0..20).map(|t| 10.0 + t as f64).collect();
        let falling: Vec<f64> = rising.iter().rev().copied().collect();
        let flat = vec![10.0, 10.2, 9.9, 10.1, 10.0, 9.8];

        assert_eq!(classify_trend(&rising, 0.05), Trend::Increasing);
        assert_eq!(classify_trend(&falling, 0.05), Trend::Decreasing);
        assert_eq!(classify_trend(&flat, 0.05), Trend::Stable);
        assert_eq!(classify_trend(&[0.0, 0.0, 0.0], 0.05), Trend::Stable);
        assert_eq!(classify_trend(&[1.0], 0.05), Trend::Stable);
    }
}
