//! # Health Forecast
//!
//! Facade over the workspace crates:
//!
//! - [`math`]: statistics, regression, least squares and differencing
//! - [`forecast`]: formatting, severity, the seasonal engine and accuracy validation
//! - [`scheduler`]: cached, paced batch generation over persistence seams
//!
//! ## Example
//!
//! ```
//! use health_forecast_workspace::forecast::severity::{classify, SeverityLabel};
//!
//! assert_eq!(classify(70, Some(100)), SeverityLabel::Critical);
//! assert_eq!(classify(12, None), SeverityLabel::Moderate);
//! ```

pub use demand_forecast as forecast;
pub use forecast_math as math;
pub use forecast_scheduler as scheduler;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crates_are_reachable() {
        assert_eq!(forecast::NAME, "demand_forecast");
        assert_eq!(math::stats::mean(&[1.0, 3.0]), Ok(2.0));
        assert_eq!(scheduler::SchedulerConfig::default().min_data_points, 7);
    }
}
