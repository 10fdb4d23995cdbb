//! Differencing and its inverse

use crate::stats::variance;

/// Apply `d` rounds of first differencing.
///
/// Stops early if the series becomes too short to difference again.
pub fn difference(series: &[f64], d: usize) -> Vec<f64> {
    let mut result = series.to_vec();
    for _ in 0..d {
        if result.len() <= 1 {
            break;
        }
        result = result.windows(2).map(|w| w[1] - w[0]).collect();
    }
    result
}

/// Undo `d` rounds of differencing for values that continue `history`.
///
/// `differenced` are future values on the differenced scale, `history` is the
/// original (undifferenced) series they follow.
pub fn integrate(differenced: &[f64], history: &[f64], d: usize) -> Vec<f64> {
    if d == 0 || differenced.is_empty() {
        return differenced.to_vec();
    }

    let mut result = differenced.to_vec();
    for level in (0..d).rev() {
        let anchor = difference(history, level).last().copied().unwrap_or(0.0);

        let mut cumsum = anchor;
        result = result
            .iter()
            .map(|&step| {
                cumsum += step;
                cumsum
            })
            .collect();
    }
    result
}

/// Suggest a differencing order up to `max_d` with a variance-ratio check.
///
/// A round of differencing is kept while it shrinks the variance by at least
/// 10%; a series that is already stationary stays at order 0.
pub fn suggest_differencing(series: &[f64], max_d: usize) -> usize {
    let mut current = series.to_vec();
    let mut order = 0;

    while order < max_d && current.len() >= 3 {
        let next = difference(&current, 1);
        let (Ok(var_current), Ok(var_next)) = (variance(&current), variance(&next)) else {
            break;
        };

        if var_current <= 0.0 || var_next / var_current >= 0.9 {
            break;
        }

        current = next;
        order += 1;
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_difference_orders() {
        let series = [1.0, 4.0, 9.0, 16.0, 25.0];

        assert_eq!(difference(&series, 0), series.to_vec());
        assert_eq!(difference(&series, 1), vec![3.0, 5.0, 7.0, 9.0]);
        assert_eq!(difference(&series, 2), vec![2.0, 2.0, 2.0]);
        assert_eq!(difference(&[1.0], 3), vec![1.0]);
    }

    #[test]
    fn test_integrate_continues_history() {
        let history = [1.0, 4.0, 9.0, 16.0, 25.0];

        // Next first differences 11, 13 -> 36, 49
        let first = integrate(&[11.0, 13.0], &history, 1);
        assert_relative_eq!(first[0], 36.0);
        assert_relative_eq!(first[1], 49.0);

        // Next second differences 2, 2 -> 36, 49
        let second = integrate(&[2.0, 2.0], &history, 2);
        assert_relative_eq!(second[0], 36.0);
        assert_relative_eq!(second[1], 49.0);
    }

    #[test]
    fn test_suggest_differencing() {
        let trending: Vec<f64> = (0..30).map(|i| 10.0 + 2.0 * i as f64).collect();
        assert_eq!(suggest_differencing(&trending, 1), 1);

        let alternating: Vec<f64> = (0..30).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert_eq!(suggest_differencing(&alternating, 1), 0);

        assert_eq!(suggest_differencing(&trending, 0), 0);
    }
}
