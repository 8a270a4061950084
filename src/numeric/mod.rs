//! Numeric building blocks shared by every lens conversion.
//!
//! Polynomials are stored low-degree-first (`c0 + c1*x + c2*x^2 + ...`), the
//! layout used throughout the calibration dataset.

use log::debug;
use nalgebra::{DMatrix, DVector};

/// Absolute step tolerance for [`newton`].
pub const NEWTON_TOLERANCE: f64 = 1.48e-8;
/// Iteration cap for [`newton`].
pub const NEWTON_MAX_ITERATIONS: usize = 50;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RootError {
    #[error("Derivative vanished at x = {0}")]
    ZeroDerivative(f64),
    #[error("No convergence after {iterations} iterations (last x = {last})")]
    NotConverged { iterations: usize, last: f64 },
    #[error("Iteration produced a non-finite value")]
    NonFinite,
}

/// Evaluates a low-degree-first polynomial at `x` using Horner's scheme.
///
/// An empty coefficient slice evaluates to zero.
pub fn polyval(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, &c| acc * x + c)
}

/// Coefficients of the first derivative of a low-degree-first polynomial.
pub fn poly_derivative(coefficients: &[f64]) -> Vec<f64> {
    coefficients
        .iter()
        .enumerate()
        .skip(1)
        .map(|(power, &c)| power as f64 * c)
        .collect()
}

/// Least-squares polynomial fit of `ys` against `xs`.
///
/// Returns low-degree-first coefficients. The degree is clipped to
/// `samples - 1`, so fewer samples give a shorter polynomial. The Vandermonde
/// columns are normalised before the SVD solve, so raw motor step values
/// (thousands) stay well conditioned. Rank-deficient systems (repeated
/// samples) yield the minimum-norm solution instead of failing.
///
/// # Arguments
///
/// * `xs` - Sample abscissae
/// * `ys` - Sample ordinates; pairs beyond the shorter slice are ignored
/// * `degree` - Maximum polynomial degree of the fit
pub fn polyfit(xs: &[f64], ys: &[f64], degree: usize) -> Vec<f64> {
    let num_samples = xs.len().min(ys.len());
    if num_samples == 0 {
        return vec![0.0; degree + 1];
    }
    let num_coeffs = degree.min(num_samples - 1) + 1;

    let mut a = DMatrix::zeros(num_samples, num_coeffs);
    let mut b = DVector::zeros(num_samples);
    for i in 0..num_samples {
        let mut power = 1.0;
        for j in 0..num_coeffs {
            a[(i, j)] = power;
            power *= xs[i];
        }
        b[i] = ys[i];
    }

    // Column scaling
    let mut scales = vec![1.0; num_coeffs];
    for (j, scale) in scales.iter_mut().enumerate() {
        let norm = a.column(j).norm();
        if norm > 0.0 {
            *scale = norm;
            for i in 0..num_samples {
                a[(i, j)] /= norm;
            }
        }
    }

    let svd = a.svd(true, true);
    let solution = match svd.solve(&b, 1e-12) {
        Ok(sol) => sol,
        Err(err_msg) => {
            debug!("polyfit: SVD solve failed ({err_msg}), returning zero polynomial");
            return vec![0.0; num_coeffs];
        }
    };

    solution
        .iter()
        .zip(scales.iter())
        .map(|(c, s)| c / s)
        .collect()
}

/// Finds a root of `f` with Newton-Raphson iteration starting at `x0`.
///
/// Converges when the Newton step drops below [`NEWTON_TOLERANCE`]. Gives up
/// after [`NEWTON_MAX_ITERATIONS`] or when the derivative vanishes.
pub fn newton<F, D>(f: F, df: D, x0: f64) -> Result<f64, RootError>
where
    F: Fn(f64) -> f64,
    D: Fn(f64) -> f64,
{
    let mut x = x0;
    for _ in 0..NEWTON_MAX_ITERATIONS {
        let slope = df(x);
        if slope == 0.0 {
            return Err(RootError::ZeroDerivative(x));
        }
        let delta = f(x) / slope;
        x -= delta;
        if !x.is_finite() {
            return Err(RootError::NonFinite);
        }
        if delta.abs() < NEWTON_TOLERANCE {
            return Ok(x);
        }
    }
    Err(RootError::NotConverged {
        iterations: NEWTON_MAX_ITERATIONS,
        last: x,
    })
}

/// Root of `polynomial(x) - target` near `x0`.
pub fn polynomial_root(coefficients: &[f64], target: f64, x0: f64) -> Result<f64, RootError> {
    let derivative = poly_derivative(coefficients);
    newton(
        |x| polyval(coefficients, x) - target,
        |x| polyval(&derivative, x),
        x0,
    )
}

/// Indices of the two control points closest to `target`, nearest first.
///
/// Ties keep list order. Returns `None` with fewer than two control points.
pub fn nearest_pair(control_points: &[f64], target: f64) -> Option<(usize, usize)> {
    if control_points.len() < 2 {
        return None;
    }
    let mut order: Vec<usize> = (0..control_points.len()).collect();
    order.sort_by(|&a, &b| {
        let da = (control_points[a] - target).abs();
        let db = (control_points[b] - target).abs();
        da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
    });
    Some((order[0], order[1]))
}

/// Linear factor placing `target` between `lower` and `upper`.
///
/// Values outside `[0, 1]` mean extrapolation.
pub fn interpolation_factor(target: f64, lower: f64, upper: f64) -> f64 {
    (target - lower) / (upper - lower)
}

/// Two-control-point polynomial interpolation.
///
/// Each control point `control_points[i]` owns the curve `coefficients[i]`.
/// The two control points nearest to `target` (by absolute distance, not by
/// bracketing) are evaluated at `x` and blended linearly. When both lie on the
/// same side of `target` the result is an extrapolation; callers rely on this.
/// A single control point evaluates its curve at `x` directly. An empty
/// curve set evaluates to zero.
pub fn interpolate(coefficients: &[Vec<f64>], control_points: &[f64], target: f64, x: f64) -> f64 {
    let len = coefficients.len().min(control_points.len());
    if len == 0 {
        return 0.0;
    }
    if len == 1 {
        return polyval(&coefficients[0], x);
    }

    let Some((lower, upper)) = nearest_pair(&control_points[..len], target) else {
        return 0.0;
    };

    let lower_value = polyval(&coefficients[lower], x);
    let upper_value = polyval(&coefficients[upper], x);
    let factor = interpolation_factor(target, control_points[lower], control_points[upper]);

    lower_value + factor * (upper_value - lower_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_polyval_low_degree_first() {
        // 1 + 2x + 3x^2 at x = 2
        assert_relative_eq!(polyval(&[1.0, 2.0, 3.0], 2.0), 17.0);
        assert_eq!(polyval(&[], 5.0), 0.0);
        assert_eq!(polyval(&[4.0], 100.0), 4.0);
    }

    #[test]
    fn test_poly_derivative() {
        assert_eq!(poly_derivative(&[1.0, 2.0, 3.0]), vec![2.0, 6.0]);
        assert!(poly_derivative(&[7.0]).is_empty());
    }

    #[test]
    fn test_polyfit_recovers_quadratic() {
        let xs: Vec<f64> = (0..8).map(|i| 10.0 + 3.0 * i as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 2.0 - 0.5 * x + 0.01 * x * x).collect();
        let coef = polyfit(&xs, &ys, 2);
        assert_eq!(coef.len(), 3);
        assert_relative_eq!(coef[0], 2.0, epsilon = 1e-6);
        assert_relative_eq!(coef[1], -0.5, epsilon = 1e-7);
        assert_relative_eq!(coef[2], 0.01, epsilon = 1e-9);
    }

    #[test]
    fn test_polyfit_cubic_on_motor_step_scale() {
        // Focus steps in the thousands mapped onto inverse distances
        let xs = [5500.0, 5100.0, 4500.0, 3900.0, 3500.0];
        let ys: Vec<f64> = xs.iter().map(|x| (5500.0 - x) / 4.0).collect();
        let coef = polyfit(&xs, &ys, 3);
        for (x, y) in xs.iter().zip(ys.iter()) {
            assert_relative_eq!(polyval(&coef, *x), *y, epsilon = 1e-4);
        }
        assert_relative_eq!(polyval(&coef, 4700.0), 200.0, epsilon = 1e-4);
    }

    #[test]
    fn test_polyfit_clips_degree_to_samples() {
        let coef = polyfit(&[20.0], &[30.0], 1);
        assert_eq!(coef.len(), 1);
        assert_relative_eq!(coef[0], 30.0, epsilon = 1e-9);

        // two samples cannot support a cubic: exact line instead
        let coef = polyfit(&[10.0, 20.0], &[1.0, 3.0], 3);
        assert_eq!(coef.len(), 2);
        assert_relative_eq!(coef[0], -1.0, epsilon = 1e-9);
        assert_relative_eq!(coef[1], 0.2, epsilon = 1e-9);

        assert_eq!(polyfit(&[], &[], 2), vec![0.0; 3]);
    }

    #[test]
    fn test_newton_finds_polynomial_root() {
        // 0.3 - 0.004x + 0.00002x^2 = 0.2 has roots near 29.3 and 170.7
        let root = polynomial_root(&[0.3, -0.004, 0.00002], 0.2, 20.0).unwrap();
        assert_relative_eq!(polyval(&[0.3, -0.004, 0.00002], root), 0.2, epsilon = 1e-9);
        assert!(root > 0.0 && root < 100.0);
    }

    #[test]
    fn test_newton_reports_missing_root() {
        // x^2 + 1 has no real root
        let result = polynomial_root(&[1.0, 0.0, 1.0], 0.0, 20.0);
        assert!(result.is_err());
    }

    #[test]
    fn test_newton_zero_derivative() {
        let result = newton(|x| x * x + 1.0, |x| 2.0 * x, 0.0);
        assert_eq!(result, Err(RootError::ZeroDerivative(0.0)));
    }

    #[test]
    fn test_nearest_pair_keeps_list_order_on_ties() {
        assert_eq!(nearest_pair(&[10.0, 20.0, 30.0], 20.0), Some((1, 0)));
        assert_eq!(nearest_pair(&[30.0, 10.0, 20.0], 12.0), Some((1, 2)));
        assert_eq!(nearest_pair(&[10.0], 12.0), None);
    }

    #[test]
    fn test_interpolate_single_control_point_evaluates_at_x() {
        let coef = vec![vec![1.0, 2.0]];
        assert_eq!(interpolate(&coef, &[50.0], 10.0, 3.0), polyval(&coef[0], 3.0));
    }

    #[test]
    fn test_interpolate_between_control_points() {
        let coef = vec![vec![0.0, 5.0], vec![0.0, 2.5], vec![0.0, 1.5]];
        let cps = [10.0, 20.0, 30.0];
        // midway between 10 and 20 at x = 3.2: 16 and 8
        assert_relative_eq!(interpolate(&coef, &cps, 15.0, 3.2), 12.0, epsilon = 1e-12);
        // exact control point
        assert_relative_eq!(interpolate(&coef, &cps, 30.0, 2.0), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_interpolate_extrapolates_from_nearest_pair() {
        // Both nearest points lie above the target: silent extrapolation
        let coef = vec![vec![0.0, 1.0], vec![10.0, 1.0], vec![20.0, 1.0]];
        let cps = [0.0, 10.0, 20.0];
        let value = interpolate(&coef, &cps, -5.0, 0.0);
        assert_relative_eq!(value, -5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_interpolate_unsorted_control_points() {
        let coef = vec![vec![20.0], vec![0.0], vec![10.0]];
        let cps = [20.0, 0.0, 10.0];
        assert_relative_eq!(interpolate(&coef, &cps, 15.0, 0.0), 15.0, epsilon = 1e-12);
    }
}
