use approx::assert_abs_diff_eq;
use chrono::NaiveDate;
use demand_forecast::data::{Cadence, ObservationSeries};
use demand_forecast::metrics::{
    backtest, mean_absolute_error, mean_absolute_percentage_error, root_mean_squared_error,
    validate, Interpretation,
};
use demand_forecast::models::SeasonalForecastEngine;
use demand_forecast::utils::HoldoutPolicy;
use demand_forecast::ForecastError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn series(counts: &[u64]) -> ObservationSeries {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    ObservationSeries::from_counts(start, Cadence::Daily, counts).unwrap()
}

#[test]
fn test_r_squared_stays_in_unit_interval() {
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..50 {
        let n = rng.gen_range(2..20);
        let actual: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..100.0)).collect();
        let predicted: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..100.0)).collect();

        let report = validate(&actual, &predicted).unwrap();
        assert!((0.0..=1.0).contains(&report.r_squared));
        assert!(report.mse >= 0.0);
        assert_abs_diff_eq!(report.rmse * report.rmse, report.mse, epsilon = 1e-9);
    }
}

#[test]
fn test_metric_functions_agree_with_report() {
    let actual = [12.0, 0.0, 30.0, 25.0];
    let predicted = [10.0, 2.0, 27.0, 25.0];
    let report = validate(&actual, &predicted).unwrap();

    assert_eq!(report.sample_size, 4);
    assert_abs_diff_eq!(report.mae, mean_absolute_error(&actual, &predicted).unwrap());
    assert_abs_diff_eq!(report.rmse, root_mean_squared_error(&actual, &predicted).unwrap());
    assert_abs_diff_eq!(
        report.mape,
        mean_absolute_percentage_error(&actual, &predicted).unwrap()
    );
    assert!(report.mape.is_finite());
}

#[test]
fn test_report_serializes() {
    let report = validate(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["interpretation"], "Excellent");
    assert_eq!(json["r_squared"], 1.0);
}

#[test]
fn test_backtest_holds_out_the_tail() {
    let pattern = [20u64, 24, 26, 25, 22, 8, 6];
    let counts: Vec<u64> = (0..42).map(|t| pattern[t % 7] + t as u64 / 7).collect();
    let series = series(&counts);
    let engine = SeasonalForecastEngine::default();

    let result = backtest(&engine, &series, 30, &HoldoutPolicy::default(), "clinic").unwrap();

    // floor(0.2 * 42) = 8 periods held out
    assert_eq!(result.holdout_points, 8);
    assert_eq!(result.training_points, 34);
    assert_eq!(result.actual, series.values()[34..].to_vec());
    assert_eq!(result.predicted.len(), 8);
    assert!(result.report.r_squared >= 0.6);
    assert!(result.report.interpretation >= Interpretation::Fair);
}

#[test]
fn test_backtest_uses_minimum_holdout() {
    let counts = [5, 7, 6, 8, 7, 9];
    let engine = SeasonalForecastEngine::default();

    let result = backtest(&engine, &series(&counts), 30, &HoldoutPolicy::default(), "x").unwrap();
    assert_eq!(result.holdout_points, 2);
    assert_eq!(result.training_points, 4);
}

#[test]
fn test_backtest_rejects_tiny_series() {
    let engine = SeasonalForecastEngine::default();
    let result = backtest(&engine, &series(&[5, 7, 6]), 30, &HoldoutPolicy::default(), "x");

    assert!(matches!(result, Err(ForecastError::InsufficientData { .. })));
}
