//! Descriptive statistics over `f64` slices

use crate::{MathError, Result};

/// Arithmetic mean
pub fn mean(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot calculate mean of an empty series".to_string(),
        ));
    }

    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population variance (divides by `n`)
pub fn variance(values: &[f64]) -> Result<f64> {
    let mean = mean(values)?;

    Ok(values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64)
}

/// Sample variance (divides by `n - 1`)
pub fn sample_variance(values: &[f64]) -> Result<f64> {
    if values.len() < 2 {
        return Err(MathError::InsufficientData(format!(
            "Sample variance needs at least 2 values, have {}",
            values.len()
        )));
    }

    let mean = mean(values)?;
    Ok(values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64)
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> Result<f64> {
    Ok(variance(values)?.sqrt())
}

/// Median of the values. NaNs are rejected.
pub fn median(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot calculate median of an empty series".to_string(),
        ));
    }
    if values.iter().any(|v| v.is_nan()) {
        return Err(MathError::InvalidInput(
            "Median is undefined for NaN values".to_string(),
        ));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Ok((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Ok(sorted[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_variance() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];

        assert_relative_eq!(mean(&values).unwrap(), 5.0);
        assert_relative_eq!(variance(&values).unwrap(), 4.0);
        assert_relative_eq!(std_dev(&values).unwrap(), 2.0);
        assert_relative_eq!(sample_variance(&values).unwrap(), 32.0 / 7.0);
    }

    #[test]
    fn test_empty_inputs_are_rejected() {
        assert!(mean(&[]).is_err());
        assert!(variance(&[]).is_err());
        assert!(sample_variance(&[1.0]).is_err());
        assert!(median(&[]).is_err());
    }

    #[test]
    fn test_median() {
        assert_relative_eq!(median(&[3.0, 1.0, 2.0]).unwrap(), 2.0);
        assert_relative_eq!(median(&[4.0, 1.0, 3.0, 2.0]).unwrap(), 2.5);
        assert!(median(&[1.0, f64::NAN]).is_err());
    }
}
