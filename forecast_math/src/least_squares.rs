//! Least-squares solving via the normal equations
//!
//! Small dense systems only: the design matrices built by the engine have a
//! handful of columns (intercept plus AR and MA lags).

use crate::{MathError, Result};

/// Relative pivot size below which a system is treated as singular
const PIVOT_TOLERANCE: f64 = 1e-10;

/// Solve `min ||X b - y||²` for `b`.
///
/// `design` holds one row per observation. Fails with
/// [`MathError::SingularMatrix`] when the columns are (nearly) collinear.
pub fn solve_least_squares(design: &[Vec<f64>], targets: &[f64]) -> Result<Vec<f64>> {
    if design.is_empty() {
        return Err(MathError::InsufficientData(
            "Design matrix has no rows".to_string(),
        ));
    }
    if design.len() != targets.len() {
        return Err(MathError::InvalidInput(format!(
            "Design matrix has {} rows but {} targets were given",
            design.len(),
            targets.len()
        )));
    }

    let cols = design[0].len();
    if cols == 0 || design.iter().any(|row| row.len() != cols) {
        return Err(MathError::InvalidInput(
            "Design matrix rows must share a non-zero width".to_string(),
        ));
    }
    if design.len() < cols {
        return Err(MathError::InsufficientData(format!(
            "Need at least {} rows to estimate {} coefficients, have {}",
            cols,
            cols,
            design.len()
        )));
    }

    // X'X and X'y
    let mut xtx = vec![vec![0.0; cols]; cols];
    let mut xty = vec![0.0; cols];
    for (row, &y) in design.iter().zip(targets.iter()) {
        for i in 0..cols {
            xty[i] += row[i] * y;
            for j in 0..cols {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }

    solve_linear_system(xtx, xty)
}

/// Solve the square system `A x = b` with Gaussian elimination and partial pivoting.
pub fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    if a.len() != n || a.iter().any(|row| row.len() != n) {
        return Err(MathError::InvalidInput(
            "Linear system must be square and match the right-hand side".to_string(),
        ));
    }

    let scale = a
        .iter()
        .flat_map(|row| row.iter())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 || !scale.is_finite() {
        return Err(MathError::SingularMatrix(
            "Coefficient matrix is zero or non-finite".to_string(),
        ));
    }

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);

        if a[pivot_row][col].abs() < PIVOT_TOLERANCE * scale {
            return Err(MathError::SingularMatrix(format!(
                "Pivot in column {} is effectively zero",
                col
            )));
        }

        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }

    if x.iter().any(|v| !v.is_finite()) {
        return Err(MathError::CalculationError(
            "Least-squares solution is not finite".to_string(),
        ));
    }

    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_recovers_exact_coefficients() {
        // y = 2 + 3 * x
        let design: Vec<Vec<f64>> = (0..5).map(|x| vec![1.0, x as f64]).collect();
        let targets: Vec<f64> = (0..5).map(|x| 2.0 + 3.0 * x as f64).collect();

        let coefficients = solve_least_squares(&design, &targets).unwrap();
        assert_relative_eq!(coefficients[0], 2.0, epsilon = 1e-9);
        assert_relative_eq!(coefficients[1], 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_collinear_columns_are_singular() {
        let design: Vec<Vec<f64>> = (0..4).map(|x| vec![x as f64, 2.0 * x as f64]).collect();
        let targets = vec![1.0, 2.0, 3.0, 4.0];

        assert!(matches!(
            solve_least_squares(&design, &targets),
            Err(MathError::SingularMatrix(_))
        ));
    }

    #[test]
    fn test_shape_errors() {
        assert!(solve_least_squares(&[], &[]).is_err());
        assert!(solve_least_squares(&[vec![1.0, 2.0]], &[1.0]).is_err());
        assert!(solve_least_squares(&[vec![1.0], vec![1.0]], &[1.0]).is_err());
    }

    #[test]
    fn test_square_system() {
        let a = vec![vec![2.0, 1.0], vec![1.0, 3.0]];
        let b = vec![3.0, 5.0];

        let x = solve_linear_system(a, b).unwrap();
        assert_relative_eq!(x[0], 0.8, epsilon = 1e-9);
        assert_relative_eq!(x[1], 1.4, epsilon = 1e-9);
    }
}
