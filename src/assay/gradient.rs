//! Geometric dilution series.
//!
//! A gradient is built back-to-front from the top concentration: each step
//! divides the previous value by the dilution factor and is prepended, so the
//! top concentration is always the last (largest) entry.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AnalysisError;

/// Non-vehicle steps of a single-gradient plate (columns 3..=11).
pub const GDA_STEPS: usize = 9;
/// Non-vehicle steps of the horizontal (column) gradient of a combination plate.
pub const HORIZONTAL_STEPS: usize = 9;
/// Non-vehicle steps of the vertical (row) gradient of a combination plate.
pub const VERTICAL_STEPS: usize = 5;

/// Ascending, strictly positive doses. The vehicle (0) is not part of the gradient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoseGradient {
    doses: Vec<f64>,
}

impl DoseGradient {
    /// Generate `steps` doses `[C/d^(n-1), …, C/d, C]`.
    pub fn generate(top: f64, dilution: f64, steps: usize) -> Result<Self, AnalysisError> {
        if !(top.is_finite() && top > 0.0) {
            return Err(AnalysisError::InvalidParameter {
                name: "top_concentration",
                reason: format!("must be finite and > 0 (got {top})"),
            });
        }
        if !(dilution.is_finite() && dilution > 1.0) {
            return Err(AnalysisError::InvalidParameter {
                name: "dilution",
                reason: format!("must be finite and > 1 (got {dilution})"),
            });
        }
        if steps == 0 {
            return Err(AnalysisError::InvalidParameter {
                name: "steps",
                reason: "a gradient needs at least one dose".to_string(),
            });
        }

        let mut doses = VecDeque::with_capacity(steps);
        let mut current = top;
        doses.push_back(current);
        for _ in 1..steps {
            current /= dilution;
            doses.push_front(current);
        }
        debug!(top, dilution, steps, "Concentration gradient created.");

        Ok(Self {
            doses: doses.into(),
        })
    }

    /// Validate a user-supplied dose list (vehicle excluded).
    pub fn from_values(
        values: Vec<f64>,
        axis: &'static str,
        expected: usize,
    ) -> Result<Self, AnalysisError> {
        if values.len() != expected {
            return Err(AnalysisError::DoseCountMismatch {
                axis,
                expected,
                found: values.len(),
            });
        }
        if let Some(bad) = values.iter().find(|v| !(v.is_finite() && **v > 0.0)) {
            return Err(AnalysisError::InvalidParameter {
                name: "doses",
                reason: format!("{axis} doses must be finite and > 0 (got {bad})"),
            });
        }
        if values.windows(2).any(|w| w[1] <= w[0]) {
            return Err(AnalysisError::InvalidParameter {
                name: "doses",
                reason: format!("{axis} doses must be strictly ascending"),
            });
        }
        Ok(Self { doses: values })
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.doses
    }

    pub fn len(&self) -> usize {
        self.doses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doses.is_empty()
    }

    pub fn top(&self) -> f64 {
        self.doses[self.doses.len() - 1]
    }

    /// Doses with the vehicle (0) prepended, i.e. one entry per plate condition.
    pub fn with_vehicle(&self) -> Vec<f64> {
        std::iter::once(0.0).chain(self.doses.iter().copied()).collect()
    }
}
