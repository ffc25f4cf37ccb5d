//! Fit pipeline for one condition: explicit state machine plus IC50.
//!
//! States:
//! 1. `TryA`: 5PL with the small budget
//! 2. `TryB`: 5PL again from the same start with the larger budget
//! 3. `TryHill`: Hill equation with the fallback budget
//! 4. `Done(Fitted | Unfit)`
//!
//! Each transition is one call to [`fit_attempt`]; a rejected attempt moves
//! to the next state and is kept in the attempt log. `Unfit` is a warning for
//! the condition, never an error for the run.

use tracing::{info, warn};

use crate::domain::{CurveFitResult, FitOutcome, FitSettings, FitStage, FittedModel};
use crate::error::AnalysisError;
use crate::fit::fitter::fit_attempt;
use crate::math::{argmin_distance, newton, RootError};
use crate::models::{initial_guess, predict};

/// Viability level that defines the IC50.
pub const HALF_VIABILITY: f64 = 0.5;

#[derive(Debug)]
enum FitState {
    Attempt(FitStage),
    Done(FitOutcome),
}

fn after_failure(stage: FitStage) -> FitState {
    match stage {
        FitStage::TryA => FitState::Attempt(FitStage::TryB),
        FitStage::TryB => FitState::Attempt(FitStage::TryHill),
        FitStage::TryHill => FitState::Done(FitOutcome::Unfit),
    }
}

/// Fit one condition's normalized viability against dose and extract its IC50.
///
/// Points with a non-finite value or a non-positive dose (the vehicle) are
/// dropped before fitting.
pub fn fit_condition(
    condition: &str,
    doses: &[f64],
    viability: &[f64],
    settings: &FitSettings,
) -> CurveFitResult {
    let (x, y): (Vec<f64>, Vec<f64>) = doses
        .iter()
        .zip(viability)
        .filter(|(d, v)| d.is_finite() && **d > 0.0 && v.is_finite())
        .map(|(d, v)| (*d, *v))
        .unzip();

    let mut attempts = Vec::new();
    let mut warnings = Vec::new();

    let midpoint = argmin_distance(&y, HALF_VIABILITY).map(|i| x[i]);
    let mut state = match midpoint {
        Some(_) => FitState::Attempt(FitStage::TryA),
        None => FitState::Done(FitOutcome::Unfit),
    };

    let outcome = loop {
        state = match (state, midpoint) {
            (FitState::Done(outcome), _) => break outcome,
            (FitState::Attempt(stage), Some(mid)) => {
                let p0 = initial_guess(stage.model(), &y, mid);
                let (attempt, fit) = fit_attempt(stage, &x, &y, &p0, stage.budget(settings), settings.min_r_squared);
                attempts.push(attempt);
                match fit {
                    Some(fit) => FitState::Done(FitOutcome::Fitted(fit)),
                    None => after_failure(stage),
                }
            }
            (FitState::Attempt(_), None) => FitState::Done(FitOutcome::Unfit),
        };
    };

    let ic50 = match (&outcome, midpoint) {
        (FitOutcome::Fitted(fit), Some(seed)) => {
            info!(
                condition,
                model = fit.model.display_name(),
                r_squared = fit.quality.r_squared,
                evaluations = fit.quality.evaluations,
                "Curve fitted."
            );
            match solve_ic50(fit, seed) {
                Ok(ic50) => {
                    info!(condition, ic50, "IC50 found.");
                    Some(ic50)
                }
                Err(e) => {
                    let err = AnalysisError::RootFindingDivergence {
                        condition: condition.to_string(),
                        reason: e.to_string(),
                    };
                    warn!("{err}");
                    warnings.push(err);
                    None
                }
            }
        }
        _ => {
            let err = AnalysisError::CurveFitNonConvergence {
                condition: condition.to_string(),
            };
            warn!("{err}");
            warnings.push(err);
            None
        }
    };

    CurveFitResult {
        condition: condition.to_string(),
        outcome,
        ic50,
        attempts,
        warnings,
    }
}

/// Solve `f(x) = 0.5` on the fitted curve starting at `seed`.
///
/// This is a local solve: on a non-monotonic curve with several crossings the
/// root nearest the seed's basin is returned, which need not be the first one.
pub fn solve_ic50(fit: &FittedModel, seed: f64) -> Result<f64, RootError> {
    let root = newton(|x| predict(fit.model, x, &fit.params) - HALF_VIABILITY, seed)?;
    if root.is_finite() && root > 0.0 {
        Ok(root)
    } else {
        Err(RootError::NoDescent { x: root })
    }
}

/// `IC50_a / IC50_b`, defined only when both conditions are fitted with an IC50.
pub fn ic50_ratio(a: &CurveFitResult, b: &CurveFitResult) -> Option<f64> {
    if !(a.converged() && b.converged()) {
        return None;
    }
    match (a.ic50, b.ic50) {
        (Some(ia), Some(ib)) if ib != 0.0 => Some(ia / ib),
        _ => None,
    }
}
