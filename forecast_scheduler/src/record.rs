use crate::entity::EntityKey;
use chrono::{DateTime, Duration, Utc};
use demand_forecast::{AccuracyReport, ForecastPoint, RawForecast, Trend};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Series length at which data quality stops being `low`
pub const MEDIUM_QUALITY_POINTS: usize = 14;
/// Series length at which data quality becomes `high`
pub const HIGH_QUALITY_POINTS: usize = 30;

/// How much the history behind a forecast can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    /// Too few points to forecast at all
    Insufficient,
    Low,
    Medium,
    High,
}

impl DataQuality {
    /// Grade a forecast fitted on `data_points` observations.
    ///
    /// A forecast that fell back to the flat mean is always `Low`.
    pub fn assess(data_points: usize, degraded: bool) -> Self {
        if degraded || data_points < MEDIUM_QUALITY_POINTS {
            DataQuality::Low
        } else if data_points < HIGH_QUALITY_POINTS {
            DataQuality::Medium
        } else {
            DataQuality::High
        }
    }
}

impl fmt::Display for DataQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataQuality::Insufficient => "insufficient",
            DataQuality::Low => "low",
            DataQuality::Medium => "medium",
            DataQuality::High => "high",
        })
    }
}

/// Persisted forecast for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub entity_key: EntityKey,
    pub points: Vec<ForecastPoint>,
    pub model_version: String,
    pub trend: Trend,
    pub seasonality_detected: bool,
    pub data_quality: DataQuality,
    pub data_points_count: usize,
    pub confidence_level: f64,
    pub generated_at: DateTime<Utc>,
    /// Backtest accuracy, when the history allowed one
    pub accuracy: Option<AccuracyReport>,
}

impl ForecastRecord {
    pub fn from_forecast(
        entity_key: EntityKey,
        forecast: RawForecast,
        accuracy: Option<AccuracyReport>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let confidence_level = forecast
            .points
            .first()
            .map_or(0.0, |p| p.confidence_level);

        Self {
            entity_key,
            data_quality: DataQuality::assess(forecast.data_points, forecast.degraded),
            data_points_count: forecast.data_points,
            model_version: forecast.model_version,
            trend: forecast.trend,
            seasonality_detected: forecast.seasonality_detected,
            points: forecast.points,
            confidence_level,
            generated_at,
            accuracy,
        }
    }

    /// Time since generation. A record stamped later than `now` has age zero.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.generated_at).max(Duration::zero())
    }

    /// Age in fractional hours
    pub fn age_hours(&self, now: DateTime<Utc>) -> f64 {
        self.age(now).num_seconds() as f64 / 3600.0
    }

    /// Whether the record is younger than `ttl_hours`
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl_hours: i64) -> bool {
        self.age(now) < Duration::hours(ttl_hours)
    }

    /// Largest point forecast
    pub fn peak(&self) -> f64 {
        self.points.iter().map(|p| p.predicted).fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use rstest::rstest;

    #[rstest]
    #[case(7, false, DataQuality::Low)]
    #[case(13, false, DataQuality::Low)]
    #[case(14, false, DataQuality::Medium)]
    #[case(29, false, DataQuality::Medium)]
    #[case(30, false, DataQuality::High)]
    #[case(90, true, DataQuality::Low)]
    fn test_data_quality(
        #[case] points: usize,
        #[case] degraded: bool,
        #[case] expected: DataQuality,
    ) {
        assert_eq!(DataQuality::assess(points, degraded), expected);
    }

    #[test]
    fn test_freshness() {
        let generated_at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let record = ForecastRecord {
            entity_key: EntityKey::disease("measles"),
            points: vec![ForecastPoint {
                period: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
                predicted: 3.0,
                lower_bound: 1.0,
                upper_bound: 5.0,
                confidence_level: 0.95,
            }],
            model_version: "test".to_string(),
            trend: Trend::Stable,
            seasonality_detected: false,
            data_quality: DataQuality::Low,
            data_points_count: 8,
            confidence_level: 0.95,
            generated_at,
            accuracy: None,
        };

        let later = generated_at + Duration::minutes(90);
        assert_eq!(record.age_hours(later), 1.5);
        assert!(record.is_fresh(later, 24));
        assert!(!record.is_fresh(generated_at + Duration::hours(24), 24));
        assert_eq!(record.peak(), 3.0);

        let earlier = generated_at - Duration::hours(5);
        assert_eq!(record.age(earlier), Duration::zero());
        assert_eq!(record.age_hours(earlier), 0.0);
        assert!(record.is_fresh(earlier, 24));
    }
}
