//! Seasonal ARIMA-style model for count series
//!
//! Fitting runs in four stages:
//!
//! 1. Additive decomposition with the period implied by the cadence
//!    (7 for daily data, 12 for monthly data).
//! 2. The seasonal component is removed and the adjusted series is
//!    differenced up to `max_d` times while that keeps shrinking its variance.
//! 3. An ARMA(p, q) with intercept is fitted to the differenced series with
//!    the two-stage Hannan-Rissanen regression: a long autoregression supplies
//!    residual estimates, which then enter an ordinary least-squares fit as
//!    the MA regressors.
//! 4. Forecasts run the ARMA recursion forward, undo the differencing and add
//!    the seasonal indices back. Standard errors come from the psi weights of
//!    the integrated model and the in-sample residual variance.

use crate::data::ObservationSeries;
use crate::error::{ForecastError, Result};
use crate::models::decomposition::{classify_trend, Decomposition};
use crate::models::{ForecastModel, ForecastResult, TrainedForecastModel, Trend};
use forecast_math::stats::{mean, variance};
use forecast_math::{difference, integrate, solve_least_squares, suggest_differencing};
use tracing::debug;

/// Fewest observations the model will try to fit
pub const MIN_FIT_POINTS: usize = 2;

/// Coefficient magnitudes are scaled back below this bound
const COEFFICIENT_BOUND: f64 = 0.99;

/// Untrained seasonal ARIMA model
#[derive(Debug, Clone)]
pub struct SeasonalArima {
    /// Name of the model
    name: String,
    /// AR order (p)
    p: usize,
    /// MA order (q)
    q: usize,
    /// Largest differencing order (d) the fit may choose
    max_d: usize,
    /// Relative trend change treated as flat
    trend_dead_band: f64,
    /// Seasonal strength at which seasonality is reported
    seasonality_threshold: f64,
}

/// Trained seasonal ARIMA model
#[derive(Debug, Clone)]
pub struct TrainedSeasonalArima {
    name: String,
    p: usize,
    d: usize,
    q: usize,
    coefficients: ArmaCoefficients,
    /// Seasonally adjusted history
    adjusted: Vec<f64>,
    /// Adjusted history after differencing
    differenced: Vec<f64>,
    /// One-step residuals on the differenced scale
    residuals: Vec<f64>,
    /// Residual variance
    sigma2: f64,
    decomposition: Decomposition,
    trend: Trend,
    seasonality_detected: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct ArmaCoefficients {
    intercept: f64,
    ar: Vec<f64>,
    ma: Vec<f64>,
}

impl ArmaCoefficients {
    fn mean_only(series: &[f64]) -> Self {
        Self {
            intercept: mean(series).unwrap_or(0.0),
            ar: Vec::new(),
            ma: Vec::new(),
        }
    }

    fn num_params(&self) -> usize {
        1 + self.ar.len() + self.ma.len()
    }

    /// One-step prediction at position `t` given the history and residuals before it
    fn predict(&self, history: &[f64], residuals: &[f64], t: usize) -> f64 {
        let ar: f64 = self
            .ar
            .iter()
            .enumerate()
            .map(|(i, phi)| phi * lagged(history, t, i + 1))
            .sum();
        let ma: f64 = self
            .ma
            .iter()
            .enumerate()
            .map(|(j, theta)| theta * lagged(residuals, t, j + 1))
            .sum();

        self.intercept + ar + ma
    }
}

fn lagged(values: &[f64], t: usize, lag: usize) -> f64 {
    t.checked_sub(lag)
        .and_then(|i| values.get(i))
        .copied()
        .unwrap_or(0.0)
}

impl SeasonalArima {
    /// Create a seasonal ARIMA model with the given orders
    pub fn new(p: usize, q: usize, max_d: usize) -> Self {
        Self {
            name: format!("Seasonal ARIMA({},d<={},{})", p, max_d, q),
            p,
            q,
            max_d,
            trend_dead_band: 0.05,
            seasonality_threshold: 0.3,
        }
    }

    pub fn with_trend_dead_band(mut self, dead_band: f64) -> Self {
        self.trend_dead_band = dead_band;
        self
    }

    pub fn with_seasonality_threshold(mut self, threshold: f64) -> Self {
        self.seasonality_threshold = threshold;
        self
    }

    /// Estimate ARMA coefficients on a (differenced) series, lowering the
    /// orders when there are too few rows for the requested ones.
    fn estimate_arma(&self, series: &[f64]) -> Result<ArmaCoefficients> {
        if variance(series)? < 1e-12 {
            return Ok(ArmaCoefficients::mean_only(series));
        }

        let mut candidates = vec![(self.p, self.q), (self.p, 0), (0, 0)];
        candidates.dedup();

        for (p, q) in candidates {
            if let Some(coefficients) = fit_orders(series, p, q)? {
                return Ok(coefficients);
            }
        }

        Ok(ArmaCoefficients::mean_only(series))
    }
}

/// Hannan-Rissanen fit of an ARMA(p, q). `Ok(None)` means too few rows.
fn fit_orders(series: &[f64], p: usize, q: usize) -> Result<Option<ArmaCoefficients>> {
    if p == 0 && q == 0 {
        return Ok(Some(ArmaCoefficients::mean_only(series)));
    }

    let n = series.len();

    // Stage 1: residual estimates from a long autoregression
    let long_order = p + q + 2;
    let innovations = if q > 0 {
        let rows = n.saturating_sub(long_order);
        if rows < long_order + 3 {
            return Ok(None);
        }
        let design: Vec<Vec<f64>> = (long_order..n)
            .map(|t| {
                std::iter::once(1.0)
                    .chain((1..=long_order).map(|lag| series[t - lag]))
                    .collect()
            })
            .collect();
        let long_ar = solve_least_squares(&design, &series[long_order..])?;

        let mut innovations = vec![0.0; n];
        for t in long_order..n {
            let fitted: f64 = long_ar[0]
                + (1..=long_order)
                    .map(|lag| long_ar[lag] * series[t - lag])
                    .sum::<f64>();
            innovations[t] = series[t] - fitted;
        }
        innovations
    } else {
        Vec::new()
    };

    // Stage 2: regress on lagged values and lagged innovations
    let start = if q > 0 { p.max(long_order + q) } else { p };
    let columns = 1 + p + q;
    if n <= start || n - start < columns + 2 {
        return Ok(None);
    }

    let design: Vec<Vec<f64>> = (start..n)
        .map(|t| {
            std::iter::once(1.0)
                .chain((1..=p).map(|lag| series[t - lag]))
                .chain((1..=q).map(|lag| innovations[t - lag]))
                .collect()
        })
        .collect();
    let solution = solve_least_squares(&design, &series[start..])?;

    let mut ar = solution[1..1 + p].to_vec();
    let mut ma = solution[1 + p..].to_vec();
    bound_coefficients(&mut ar);
    bound_coefficients(&mut ma);

    Ok(Some(ArmaCoefficients {
        intercept: solution[0],
        ar,
        ma,
    }))
}

/// Scale coefficients so their absolute sum stays below [`COEFFICIENT_BOUND`]
fn bound_coefficients(coefficients: &mut [f64]) {
    let total: f64 = coefficients.iter().map(|c| c.abs()).sum();
    if total >= COEFFICIENT_BOUND {
        let scale = COEFFICIENT_BOUND / total;
        coefficients.iter_mut().for_each(|c| *c *= scale);
    }
}

/// Psi weights of ARIMA(ar, d, ma): the MA(infinity) representation used for
/// forecast variance.
pub(crate) fn psi_weights(ar: &[f64], ma: &[f64], d: usize, horizon: usize) -> Vec<f64> {
    // Coefficients of (1 - phi_1 B - ... - phi_p B^p)(1 - B)^d
    let mut polynomial: Vec<f64> = std::iter::once(1.0).chain(ar.iter().map(|phi| -phi)).collect();
    for _ in 0..d {
        let mut next = vec![0.0; polynomial.len() + 1];
        for (i, c) in polynomial.iter().enumerate() {
            next[i] += c;
            next[i + 1] -= c;
        }
        polynomial = next;
    }
    let ar_star: Vec<f64> = polynomial[1..].iter().map(|c| -c).collect();

    let mut psi = vec![0.0; horizon];
    for j in 0..horizon {
        if j == 0 {
            psi[0] = 1.0;
            continue;
        }
        let ma_term = ma.get(j - 1).copied().unwrap_or(0.0);
        let ar_term: f64 = (1..=ar_star.len().min(j))
            .map(|i| ar_star[i - 1] * psi[j - i])
            .sum();
        psi[j] = ma_term + ar_term;
    }
    psi
}

impl ForecastModel for SeasonalArima {
    type Trained = TrainedSeasonalArima;

    fn train(&self, series: &ObservationSeries) -> Result<TrainedSeasonalArima> {
        let values = series.values();
        if values.len() < MIN_FIT_POINTS {
            return Err(ForecastError::InsufficientData {
                needed: MIN_FIT_POINTS,
                got: values.len(),
            });
        }
        if variance(&values)? < 1e-12 {
            return Err(ForecastError::FittingDegenerate(
                "series has zero variance".to_string(),
            ));
        }

        let decomposition = Decomposition::decompose(&values, series.cadence().seasonal_period())?;
        let adjusted = decomposition.deseasonalize(&values);

        let d = suggest_differencing(&adjusted, self.max_d);
        let differenced = difference(&adjusted, d);
        let coefficients = self.estimate_arma(&differenced)?;

        // Conditional residuals with the final coefficients
        let start = coefficients.ar.len().max(coefficients.ma.len());
        let mut residuals = vec![0.0; differenced.len()];
        for t in start..differenced.len() {
            residuals[t] = differenced[t] - coefficients.predict(&differenced, &residuals, t);
        }

        let effective = differenced.len().saturating_sub(start);
        let sigma2 = if effective == 0 {
            variance(&differenced)?
        } else {
            let sse: f64 = residuals[start..].iter().map(|e| e * e).sum();
            sse / effective.saturating_sub(coefficients.num_params()).max(1) as f64
        };
        if !sigma2.is_finite() {
            return Err(ForecastError::FittingDegenerate(
                "residual variance is not finite".to_string(),
            ));
        }

        let trend = classify_trend(&decomposition.trend, self.trend_dead_band);
        let seasonality_detected = decomposition.seasonal_strength() >= self.seasonality_threshold;

        debug!(
            n = values.len(),
            d,
            p = coefficients.ar.len(),
            q = coefficients.ma.len(),
            period = ?decomposition.period,
            sigma2,
            "fitted seasonal arima"
        );

        Ok(TrainedSeasonalArima {
            name: self.name.clone(),
            p: coefficients.ar.len(),
            d,
            q: coefficients.ma.len(),
            coefficients,
            adjusted,
            differenced,
            residuals,
            sigma2,
            decomposition,
            trend,
            seasonality_detected,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedSeasonalArima {
    /// Fitted (p, d, q) orders, after any reduction for short series
    pub fn order(&self) -> (usize, usize, usize) {
        (self.p, self.d, self.q)
    }

    pub fn decomposition(&self) -> &Decomposition {
        &self.decomposition
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        &self.coefficients.ar
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        &self.coefficients.ma
    }

    pub fn intercept(&self) -> f64 {
        self.coefficients.intercept
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedForecastModel for TrainedSeasonalArima {
    fn forecast(&self, horizon: usize) -> Result<ForecastResult> {
        if horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "Forecast horizon must be positive".to_string(),
            ));
        }

        let mut history = self.differenced.clone();
        let mut residuals = self.residuals.clone();
        let mut steps = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let t = history.len();
            let next = self.coefficients.predict(&history, &residuals, t);
            history.push(next);
            residuals.push(0.0);
            steps.push(next);
        }

        let n = self.adjusted.len();
        let values: Vec<f64> = integrate(&steps, &self.adjusted, self.d)
            .into_iter()
            .enumerate()
            .map(|(k, v)| v + self.decomposition.seasonal_at(n + k))
            .collect();

        let psi = psi_weights(&self.coefficients.ar, &self.coefficients.ma, self.d, horizon);
        let mut cumulative = 0.0;
        let standard_errors: Vec<f64> = psi
            .iter()
            .map(|w| {
                cumulative += w * w;
                (self.sigma2 * cumulative).sqrt()
            })
            .collect();

        ForecastResult::new(values, horizon, standard_errors)
    }

    fn trend(&self) -> Trend {
        self.trend
    }

    fn seasonality_detected(&self) -> bool {
        self.seasonality_detected
    }

    fn seasonal_period(&self) -> Option<usize> {
        self.decomposition.period
    }

    fn residual_std_dev(&self) -> f64 {
        self.sigma2.sqrt()
    }

    fn version(&self) -> String {
        let season = self
            .decomposition
            .period
            .map(|p| format!("[{}]", p))
            .unwrap_or_default();
        format!("sarima({},{},{}){}", self.p, self.d, self.q, season)
    }
}
