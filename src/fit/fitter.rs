//! Low-level fitting routine: one bounded optimizer attempt for one model.
//!
//! Given:
//! - doses `x_i` (strictly positive, vehicle excluded)
//! - normalized viabilities `y_i`
//! - a model kind, an initial guess and an evaluation budget
//!
//! we run Levenberg–Marquardt and then decide whether the result counts as
//! converged. Acceptance requires all of:
//! - the optimizer met its tolerance within the budget
//! - every parameter is finite
//! - the dose-scale parameter (`C` / `EC50`) is strictly positive
//! - `R² >= min_r_squared`

use tracing::debug;

use crate::domain::{AttemptStatus, FitAttempt, FitQuality, FitStage, FittedModel, ModelKind};
use crate::math::{levenberg_marquardt, r_squared, LmOptions, LmStatus};
use crate::models::predict;

/// Run the optimizer for `stage` and apply the acceptance checks.
///
/// Always returns the attempt log entry; the fitted model only when accepted.
pub fn fit_attempt(
    stage: FitStage,
    x: &[f64],
    y: &[f64],
    p0: &[f64],
    budget: usize,
    min_r_squared: f64,
) -> (FitAttempt, Option<FittedModel>) {
    let model = stage.model();
    let opts = LmOptions {
        max_evaluations: budget,
        ..LmOptions::default()
    };
    let report = levenberg_marquardt(|xi, p| predict(model, xi, p), x, y, p0, &opts);

    let status = match report.status {
        LmStatus::Converged => AttemptStatus::Converged,
        LmStatus::BudgetExhausted => AttemptStatus::BudgetExhausted,
        LmStatus::Infeasible => AttemptStatus::Infeasible,
        LmStatus::Degenerate => AttemptStatus::Degenerate,
        LmStatus::Stalled => AttemptStatus::Stalled,
    };

    let fitted: Vec<f64> = x.iter().map(|&xi| predict(model, xi, &report.params)).collect();
    let r2 = if status.is_success() {
        r_squared(y, &fitted)
    } else {
        None
    };

    let status = match status {
        AttemptStatus::Converged => match check_result(model, &report.params, r2, min_r_squared) {
            Some(reason) => AttemptStatus::Rejected(reason),
            None => AttemptStatus::Converged,
        },
        other => other,
    };

    debug!(
        stage = ?stage,
        model = model.display_name(),
        evaluations = report.evaluations,
        budget,
        status = ?status,
        "Fit attempt finished."
    );

    let attempt = FitAttempt {
        stage,
        model,
        budget,
        evaluations: report.evaluations,
        status: status.clone(),
        r_squared: r2,
    };

    if !status.is_success() {
        return (attempt, None);
    }

    let n = x.len().min(y.len());
    let quality = FitQuality {
        sse: report.sse,
        rmse: (report.sse / n as f64).sqrt(),
        r_squared: r2.unwrap_or(f64::NAN),
        n,
        evaluations: report.evaluations,
    };
    let fit = FittedModel {
        model,
        params: report.params,
        quality,
    };
    (attempt, Some(fit))
}

/// Reason an optimizer result is unacceptable, if any.
fn check_result(model: ModelKind, params: &[f64], r2: Option<f64>, min_r_squared: f64) -> Option<String> {
    if params.iter().any(|p| !p.is_finite()) {
        return Some("non-finite parameter".to_string());
    }
    let scale = params[model.scale_index()];
    if scale <= 0.0 {
        let name = model.param_names()[model.scale_index()];
        return Some(format!("{name} = {scale:e} is not positive"));
    }
    match r2 {
        None => Some("observations have no variance".to_string()),
        Some(r2) if !(r2 >= min_r_squared) => Some(format!("R² = {r2:.3} below {min_r_squared}")),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::argmin_distance;
    use crate::models::{five_pl, hill, initial_guess};

    fn doses() -> Vec<f64> {
        (0..9).map(|i| 1e-6 / 3f64.powi(8 - i)).collect()
    }

    #[test]
    fn exact_five_pl_data_is_recovered() {
        let x = doses();
        let truth = [1.0, 1.5, 4e-8, 0.05, 1.0];
        let y: Vec<f64> = x.iter().map(|&xi| five_pl(xi, &truth)).collect();
        let mid = x[argmin_distance(&y, 0.5).unwrap()];
        let p0 = initial_guess(ModelKind::FivePl, &y, mid);

        let (attempt, fit) = fit_attempt(FitStage::TryA, &x, &y, &p0, 500, 0.5);
        assert_eq!(attempt.status, AttemptStatus::Converged);
        let fit = fit.unwrap();
        assert!(fit.quality.r_squared > 0.999_999);
        assert!((fit.params[2] - 4e-8).abs() / 4e-8 < 1e-4, "{:?}", fit.params);
        assert!(attempt.evaluations <= 500);
    }

    #[test]
    fn too_few_points_is_infeasible() {
        let x = &doses()[..4];
        let y: Vec<f64> = x.iter().map(|&xi| hill(xi, &[1.0, 5e-8, 1.2])).collect();
        let p0 = initial_guess(ModelKind::FivePl, &y, x[1]);
        let (attempt, fit) = fit_attempt(FitStage::TryA, x, &y, &p0, 500, 0.5);
        assert_eq!(attempt.status, AttemptStatus::Infeasible);
        assert!(fit.is_none());
    }

    #[test]
    fn poor_fit_is_rejected() {
        assert!(check_result(ModelKind::Hill, &[1.0, 1e-7, 1.0], Some(0.1), 0.5).is_some());
        assert!(check_result(ModelKind::Hill, &[1.0, -1e-7, 1.0], Some(0.9), 0.5).is_some());
        assert!(check_result(ModelKind::FivePl, &[1.0, f64::NAN, 1e-7, 0.0, 1.0], Some(0.9), 0.5).is_some());
        assert!(check_result(ModelKind::Hill, &[1.0, 1e-7, 1.0], Some(0.9), 0.5).is_none());
    }
}
