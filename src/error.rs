//! Error types.
//!
//! Two layers:
//!
//! - [`AnalysisError`]: the assay taxonomy. Per-condition variants are usually
//!   collected as warnings on a condition's result instead of being propagated.
//! - [`AppError`]: what reaches `main`. A message plus a process exit code.
//!
//! Exit codes:
//! - `2` invalid input, parameters or I/O
//! - `3` no usable data in the counts table
//! - `4` analysis failure (no condition of a comparison could be normalized)

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Identifier '{0}' does not contain a canonical inner-well label")]
    InvalidWellLabel(String),

    #[error("Vehicle control of '{condition}' is degenerate (mean = {value})")]
    DegenerateControl { condition: String, value: f64 },

    #[error("'{condition}' at dose index {index} has {found} replicate(s); at least 2 are required for an SD")]
    InsufficientReplicates {
        condition: String,
        index: usize,
        found: usize,
    },

    #[error("'{condition}' at dose index {index} has no observed wells")]
    EmptyCondition { condition: String, index: usize },

    #[error("Curve fit for '{condition}' did not converge with any model")]
    CurveFitNonConvergence { condition: String },

    #[error("IC50 root finding for '{condition}' diverged: {reason}")]
    RootFindingDivergence { condition: String, reason: String },

    #[error("Expected {expected} doses for {axis}, got {found}")]
    DoseCountMismatch {
        axis: &'static str,
        expected: usize,
        found: usize,
    },
}

impl AnalysisError {
    /// Whether this error was caused by user-supplied parameters (rejected at the boundary).
    pub fn is_parameter_error(&self) -> bool {
        matches!(
            self,
            AnalysisError::InvalidParameter { .. } | AnalysisError::DoseCountMismatch { .. }
        )
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        let code = if err.is_parameter_error() { 2 } else { 4 };
        AppError::new(code, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_errors_map_to_exit_code_2() {
        let err = AnalysisError::DoseCountMismatch {
            axis: "horizontal",
            expected: 9,
            found: 8,
        };
        assert_eq!(AppError::from(err).exit_code(), 2);
    }

    #[test]
    fn data_errors_map_to_exit_code_4() {
        let err = AnalysisError::DegenerateControl {
            condition: "HeLa".to_string(),
            value: 0.0,
        };
        let app = AppError::from(err);
        assert_eq!(app.exit_code(), 4);
        assert!(app.to_string().contains("HeLa"));
    }
}
