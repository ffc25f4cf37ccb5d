//! Levenberg–Marquardt for small nonlinear least-squares problems.
//!
//! Minimizes `Σ (y_i - f(x_i; p))^2` over `p`.
//!
//! Implementation notes:
//! - The Jacobian is approximated by forward differences with a step of
//!   `sqrt(ε)·|p_j|`, so every Jacobian costs `m` model evaluations.
//! - The damped step solves the augmented system `[J; sqrt(λ)·D] δ = [r; 0]`
//!   with the SVD least-squares solver, where `D` holds the Jacobian column
//!   norms (Marquardt scaling).
//! - The evaluation budget counts model sweeps over the data, not iterations.
//!   Running out of budget is reported, never hidden.

use nalgebra::{DMatrix, DVector};

use crate::math::solve_least_squares;

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e16;
/// Floor on squared column norms so parameters with a flat Jacobian column stay damped.
const SCALE_FLOOR: f64 = 1e-24;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmOptions {
    /// Maximum number of model sweeps over the data.
    pub max_evaluations: usize,
    /// Stop when the relative SSE reduction of an accepted step is below this.
    pub ftol: f64,
    /// Stop when the scaled step is below this relative to the scaled parameters.
    pub xtol: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_evaluations: 500,
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LmStatus {
    Converged,
    BudgetExhausted,
    /// Fewer observations than parameters.
    Infeasible,
    /// Non-finite model values or an unsolvable step.
    Degenerate,
    /// Damping grew without finding a downhill step.
    Stalled,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LmReport {
    pub params: Vec<f64>,
    pub sse: f64,
    pub evaluations: usize,
    pub iterations: usize,
    pub status: LmStatus,
}

/// Fit `model` to `(x, y)` starting from `p0`.
pub fn levenberg_marquardt<F>(model: F, x: &[f64], y: &[f64], p0: &[f64], opts: &LmOptions) -> LmReport
where
    F: Fn(f64, &[f64]) -> f64,
{
    let n = x.len().min(y.len());
    let m = p0.len();
    let mut p = DVector::from_column_slice(p0);

    let report = |p: &DVector<f64>, sse: f64, evaluations: usize, iterations: usize, status: LmStatus| LmReport {
        params: p.iter().copied().collect(),
        sse,
        evaluations,
        iterations,
        status,
    };

    if m == 0 || n < m {
        return report(&p, f64::NAN, 0, 0, LmStatus::Infeasible);
    }

    let y = DVector::from_column_slice(&y[..n]);
    let x = &x[..n];

    let mut evaluations = 1;
    let Some(mut fp) = evaluate(&model, x, &p) else {
        return report(&p, f64::NAN, evaluations, 0, LmStatus::Degenerate);
    };
    let mut r = &y - &fp;
    let mut sse = r.norm_squared();
    let mut lambda = LAMBDA_INIT;
    let mut iterations = 0;

    loop {
        if sse == 0.0 {
            return report(&p, sse, evaluations, iterations, LmStatus::Converged);
        }
        if evaluations + m > opts.max_evaluations {
            return report(&p, sse, evaluations, iterations, LmStatus::BudgetExhausted);
        }
        iterations += 1;

        let Some(jac) = forward_jacobian(&model, x, &p, &fp) else {
            return report(&p, sse, evaluations, iterations, LmStatus::Degenerate);
        };
        evaluations += m;

        let scale: DVector<f64> =
            DVector::from_iterator(m, jac.column_iter().map(|c| c.norm_squared().max(SCALE_FLOOR).sqrt()));

        // Inner loop: raise damping until a step does not increase the SSE.
        loop {
            if evaluations + 1 > opts.max_evaluations {
                return report(&p, sse, evaluations, iterations, LmStatus::BudgetExhausted);
            }

            let Some(delta) = damped_step(&jac, &r, &scale, lambda) else {
                return report(&p, sse, evaluations, iterations, LmStatus::Degenerate);
            };

            let step_norm = scale.component_mul(&delta).norm();
            let param_norm = scale.component_mul(&p).norm();
            let step_is_small = step_norm <= opts.xtol * (param_norm + opts.xtol);

            let trial = &p + &delta;
            let trial_fp = evaluate(&model, x, &trial);
            evaluations += 1;

            if let Some(trial_fp) = trial_fp {
                let trial_r = &y - &trial_fp;
                let trial_sse = trial_r.norm_squared();
                if trial_sse <= sse {
                    let reduction = sse - trial_sse;
                    let previous = sse;
                    p = trial;
                    fp = trial_fp;
                    r = trial_r;
                    sse = trial_sse;
                    lambda = (lambda / 10.0).max(LAMBDA_MIN);

                    if reduction <= opts.ftol * previous || step_is_small {
                        return report(&p, sse, evaluations, iterations, LmStatus::Converged);
                    }
                    break;
                }
            }

            if step_is_small {
                // No representable downhill step remains: a local minimum.
                return report(&p, sse, evaluations, iterations, LmStatus::Converged);
            }
            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                return report(&p, sse, evaluations, iterations, LmStatus::Stalled);
            }
        }
    }
}

fn evaluate<F>(model: &F, x: &[f64], p: &DVector<f64>) -> Option<DVector<f64>>
where
    F: Fn(f64, &[f64]) -> f64,
{
    let params = p.as_slice();
    let values = DVector::from_iterator(x.len(), x.iter().map(|&xi| model(xi, params)));
    values.iter().all(|v| v.is_finite()).then_some(values)
}

fn forward_jacobian<F>(model: &F, x: &[f64], p: &DVector<f64>, fp: &DVector<f64>) -> Option<DMatrix<f64>>
where
    F: Fn(f64, &[f64]) -> f64,
{
    let n = x.len();
    let m = p.len();
    let eps = f64::EPSILON.sqrt();
    let mut jac = DMatrix::<f64>::zeros(n, m);

    for j in 0..m {
        let h = match eps * p[j].abs() {
            h if h > 0.0 => h,
            _ => eps,
        };
        let mut shifted = p.clone();
        shifted[j] += h;
        let f_shifted = evaluate(model, x, &shifted)?;
        for i in 0..n {
            jac[(i, j)] = (f_shifted[i] - fp[i]) / h;
        }
    }

    jac.iter().all(|v| v.is_finite()).then_some(jac)
}

fn damped_step(jac: &DMatrix<f64>, r: &DVector<f64>, scale: &DVector<f64>, lambda: f64) -> Option<DVector<f64>> {
    let n = jac.nrows();
    let m = jac.ncols();
    let damping = lambda.sqrt();

    let mut a = DMatrix::<f64>::zeros(n + m, m);
    a.view_mut((0, 0), (n, m)).copy_from(jac);
    for j in 0..m {
        a[(n + j, j)] = damping * scale[j];
    }

    let mut b = DVector::<f64>::zeros(n + m);
    b.rows_mut(0, n).copy_from(r);

    solve_least_squares(&a, &b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp_decay(x: f64, p: &[f64]) -> f64 {
        p[0] * (-p[1] * x).exp()
    }

    #[test]
    fn recovers_exponential_decay() {
        let x: Vec<f64> = (0..10).map(|i| i as f64 * 0.5).collect();
        let y: Vec<f64> = x.iter().map(|&xi| exp_decay(xi, &[2.5, 0.7])).collect();

        let fit = levenberg_marquardt(exp_decay, &x, &y, &[1.0, 0.3], &LmOptions::default());
        assert_eq!(fit.status, LmStatus::Converged);
        assert!((fit.params[0] - 2.5).abs() < 1e-6, "{:?}", fit.params);
        assert!((fit.params[1] - 0.7).abs() < 1e-6, "{:?}", fit.params);
        assert!(fit.evaluations <= 500);
    }

    #[test]
    fn tiny_budget_is_reported_as_exhausted() {
        let x: Vec<f64> = (0..10).map(|i| i as f64 * 0.5).collect();
        let y: Vec<f64> = x.iter().map(|&xi| exp_decay(xi, &[2.5, 0.7])).collect();
        let opts = LmOptions {
            max_evaluations: 2,
            ..LmOptions::default()
        };
        let fit = levenberg_marquardt(exp_decay, &x, &y, &[1.0, 0.3], &opts);
        assert_eq!(fit.status, LmStatus::BudgetExhausted);
        assert_eq!(fit.params, vec![1.0, 0.3]);
    }

    #[test]
    fn underdetermined_problem_is_infeasible() {
        let fit = levenberg_marquardt(exp_decay, &[1.0], &[1.0], &[1.0, 1.0], &LmOptions::default());
        assert_eq!(fit.status, LmStatus::Infeasible);
    }

    #[test]
    fn non_finite_start_is_degenerate() {
        let model = |x: f64, p: &[f64]| (x - p[0]).ln();
        let fit = levenberg_marquardt(model, &[0.0, 1.0], &[0.0, 0.0], &[5.0], &LmOptions::default());
        assert_eq!(fit.status, LmStatus::Degenerate);
    }
}
