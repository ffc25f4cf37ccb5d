//! Log-spaced dose grids for drawing fitted curves.

use crate::domain::FittedModel;
use crate::error::AnalysisError;
use crate::models::predict;

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AnalysisError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > min) {
        return Err(AnalysisError::InvalidParameter {
            name: "dose_range",
            reason: format!("min={min}, max={max} (must be finite, > 0 and max > min)"),
        });
    }
    if steps < 2 {
        return Err(AnalysisError::InvalidParameter {
            name: "curve_points",
            reason: "must be >= 2".to_string(),
        });
    }

    let ln_min = min.ln();
    let step = (max.ln() - ln_min) / (steps as f64 - 1.0);
    let mut out: Vec<f64> = (0..steps).map(|i| (ln_min + step * i as f64).exp()).collect();
    // Pin the endpoints to the tested doses exactly.
    out[0] = min;
    out[steps - 1] = max;
    Ok(out)
}

/// Evaluate a fitted model over `doses`.
pub fn fitted_values(fit: &FittedModel, doses: &[f64]) -> Vec<f64> {
    doses.iter().map(|&x| predict(fit.model, x, &fit.params)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_space_includes_endpoints() {
        let v = log_space(1e-9, 1e-6, 4).unwrap();
        assert_eq!(v[0], 1e-9);
        assert_eq!(v[3], 1e-6);
        assert!((v[1] - 1e-8).abs() / 1e-8 < 1e-12);
    }

    #[test]
    fn log_space_rejects_bad_ranges() {
        assert!(log_space(0.0, 1.0, 5).is_err());
        assert!(log_space(1.0, 1.0, 5).is_err());
        assert!(log_space(1.0, 2.0, 1).is_err());
    }
}
