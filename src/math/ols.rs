//! Linear least-squares solve used by the damped Gauss–Newton step.
//!
//! Each Levenberg–Marquardt iteration solves a tall augmented system
//!
//! ```text
//! minimize ‖A δ - b‖²,   A = [J; sqrt(λ)·D],  b = [r; 0]
//! ```
//!
//! which has `n + m` rows for `m` ≤ 5 parameters. SVD handles the rectangular
//! shape directly (nalgebra's `QR::solve` only accepts square systems) and
//! degrades gracefully when Jacobian columns are nearly collinear, as happens
//! when a plateau parameter stops influencing the fit.

use nalgebra::{DMatrix, DVector};

/// Solve `min ‖a·β - b‖²` by SVD.
///
/// Returns `None` if no tolerance yields a finite solution.
pub fn solve_least_squares(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = a.clone().svd(true, true);

    // Progressively looser singular-value cutoffs.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(b, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_overdetermined_line() {
        // y = 2 + 3x sampled at x = 0, 1, 2
        let a = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let b = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&a, &b).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn damping_rows_shrink_the_step() {
        // [1; sqrt(99)] δ = [1; 0]  =>  δ = 1 / (1 + 99)
        let a = DMatrix::from_row_slice(2, 1, &[1.0, 99f64.sqrt()]);
        let b = DVector::from_row_slice(&[1.0, 0.0]);
        let delta = solve_least_squares(&a, &b).unwrap();
        assert!((delta[0] - 0.01).abs() < 1e-12);
    }
}
