//! Model evaluation for 5PL and Hill curves.
//!
//! Parameter layouts:
//! - 5PL: `[A, B, C, D, G]` for `y = (A - D) / (1 + (x/C)^B)^G + D`
//! - Hill: `[Emax, EC50, H]` for `y = Emax · x^H / (EC50^H + x^H)`

use crate::domain::ModelKind;

/// Five-parameter logistic.
pub fn five_pl(x: f64, p: &[f64]) -> f64 {
    let (a, b, c, d, g) = (p[0], p[1], p[2], p[3], p[4]);
    (a - d) / (1.0 + (x / c).powf(b)).powf(g) + d
}

/// Hill equation.
pub fn hill(x: f64, p: &[f64]) -> f64 {
    let (emax, ec50, h) = (p[0], p[1], p[2]);
    let xh = x.powf(h);
    emax * xh / (ec50.powf(h) + xh)
}

/// Predict viability at dose `x`.
///
/// # Panics
/// Panics if `params` is shorter than `model.param_count()`.
pub fn predict(model: ModelKind, x: f64, params: &[f64]) -> f64 {
    match model {
        ModelKind::FivePl => five_pl(x, params),
        ModelKind::Hill => hill(x, params),
    }
}

/// Starting point for the optimizer.
///
/// `midpoint_dose` is the tested dose whose viability is closest to 0.5.
pub fn initial_guess(model: ModelKind, y: &[f64], midpoint_dose: f64) -> Vec<f64> {
    let max = y.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = y.iter().copied().fold(f64::INFINITY, f64::min);
    match model {
        ModelKind::FivePl => vec![max, 1.0, midpoint_dose, min, 1.0],
        ModelKind::Hill => vec![max, midpoint_dose, 1.0],
    }
}
