//! Bliss independence scoring over a two-drug dose grid.
//!
//! Grid orientation: row `0` and column `0` hold the vehicle (dose 0) of the
//! row and column drug respectively, and doses ascend along both axes. Cell
//! `(0, 0)` is the combined vehicle and is exactly 1.0 after normalization.
//!
//! For an interior cell `(i, j)`:
//!
//! ```text
//! expected = V[0, j] · V[i, 0]
//! bliss    = expected - V[i, j]
//! ```
//!
//! Cells on the vehicle row or column are single-agent observations; their
//! expectation is the observation itself and their score is 0.

use nalgebra::DMatrix;
use serde::Serialize;
use tracing::debug;

use crate::assay::normalize::NormalizedBand;
use crate::assay::plate::{WellAddress, N_COLUMNS, N_ROWS};
use crate::domain::SynergyCell;
use crate::error::AnalysisError;

/// Expected combined viability and Bliss score for one cell.
pub fn bliss_score(x_effect: f64, y_effect: f64, observed: f64) -> (f64, f64) {
    let expected = x_effect * y_effect;
    (expected, expected - observed)
}

/// Doses of one grid axis, vehicle (0) first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DoseAxis {
    pub doses: Vec<f64>,
    /// Positive stand-in for the zero dose on a log axis.
    pub log_zero_placeholder: Option<f64>,
}

impl DoseAxis {
    pub fn new(doses: Vec<f64>) -> Self {
        let log_zero_placeholder = log_zero_placeholder(&doses);
        Self {
            doses,
            log_zero_placeholder,
        }
    }

    pub fn nonzero(&self) -> impl Iterator<Item = f64> + '_ {
        self.doses.iter().copied().filter(|d| *d > 0.0)
    }

    /// Doses with zero replaced by the log-axis placeholder (when one exists).
    pub fn display_doses(&self) -> Vec<f64> {
        self.doses
            .iter()
            .map(|&d| match (d, self.log_zero_placeholder) {
                (d, Some(p)) if d == 0.0 => p,
                (d, _) => d,
            })
            .collect()
    }
}

/// One dilution step below the smallest nonzero dose.
///
/// The step is the ratio of the two smallest nonzero doses; with fewer than
/// two nonzero doses there is no step to extrapolate and `None` is returned.
pub fn log_zero_placeholder(doses: &[f64]) -> Option<f64> {
    let mut nonzero: Vec<f64> = doses.iter().copied().filter(|d| d.is_finite() && *d > 0.0).collect();
    nonzero.sort_by(f64::total_cmp);
    match nonzero.as_slice() {
        [lowest, next, ..] if next > lowest => Some(lowest / (next / lowest)),
        _ => None,
    }
}

/// Normalized viability indexed by (row dose, column dose).
#[derive(Debug, Clone, PartialEq)]
pub struct ViabilityGrid {
    pub rows: DoseAxis,
    pub columns: DoseAxis,
    pub values: DMatrix<f64>,
}

impl ViabilityGrid {
    pub fn new(row_doses: Vec<f64>, column_doses: Vec<f64>, values: DMatrix<f64>) -> Result<Self, AnalysisError> {
        if values.nrows() != row_doses.len() {
            return Err(AnalysisError::DoseCountMismatch {
                axis: "row",
                expected: values.nrows(),
                found: row_doses.len(),
            });
        }
        if values.ncols() != column_doses.len() {
            return Err(AnalysisError::DoseCountMismatch {
                axis: "column",
                expected: values.ncols(),
                found: column_doses.len(),
            });
        }
        Ok(Self {
            rows: DoseAxis::new(row_doses),
            columns: DoseAxis::new(column_doses),
            values,
        })
    }

    /// Lay a normalized combination plate out by dose.
    ///
    /// Plate row `B + i` carries `row_doses[i]` and plate column `2 + j`
    /// carries `column_doses[j]`; wells without data are `NaN`.
    pub fn from_band(band: &NormalizedBand, row_doses: Vec<f64>, column_doses: Vec<f64>) -> Result<Self, AnalysisError> {
        if row_doses.len() != N_ROWS {
            return Err(AnalysisError::DoseCountMismatch {
                axis: "vertical",
                expected: N_ROWS,
                found: row_doses.len(),
            });
        }
        if column_doses.len() != N_COLUMNS {
            return Err(AnalysisError::DoseCountMismatch {
                axis: "horizontal",
                expected: N_COLUMNS,
                found: column_doses.len(),
            });
        }

        let values = DMatrix::from_fn(N_ROWS, N_COLUMNS, |i, j| {
            WellAddress::from_indices(i, j)
                .and_then(|w| band.well_value(w))
                .unwrap_or(f64::NAN)
        });
        Self::new(row_doses, column_doses, values)
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.shape()
    }
}

/// Observed, expected and Bliss matrices of one combination grid.
#[derive(Debug, Clone, PartialEq)]
pub struct SynergyMap {
    pub rows: DoseAxis,
    pub columns: DoseAxis,
    pub observed: DMatrix<f64>,
    pub expected: DMatrix<f64>,
    pub bliss: DMatrix<f64>,
    /// Interior cells in row-major order.
    pub cells: Vec<SynergyCell>,
}

impl SynergyMap {
    /// Interior cell with the largest finite Bliss score.
    pub fn most_synergistic(&self) -> Option<&SynergyCell> {
        self.finite_cells().max_by(|a, b| a.bliss.total_cmp(&b.bliss))
    }

    /// Interior cell with the smallest finite Bliss score.
    pub fn most_antagonistic(&self) -> Option<&SynergyCell> {
        self.finite_cells().min_by(|a, b| a.bliss.total_cmp(&b.bliss))
    }

    fn finite_cells(&self) -> impl Iterator<Item = &SynergyCell> {
        self.cells.iter().filter(|c| c.bliss.is_finite())
    }
}

/// Score every cell of `grid` against Bliss independence.
pub fn score_bliss(grid: &ViabilityGrid) -> SynergyMap {
    let (nrows, ncols) = grid.shape();
    let v = &grid.values;
    let mut expected = v.clone();
    let mut bliss = DMatrix::<f64>::zeros(nrows, ncols);
    let mut cells = Vec::with_capacity(nrows.saturating_sub(1) * ncols.saturating_sub(1));

    for i in 1..nrows {
        for j in 1..ncols {
            let observed = v[(i, j)];
            let (e, score) = bliss_score(v[(0, j)], v[(i, 0)], observed);
            expected[(i, j)] = e;
            bliss[(i, j)] = score;
            cells.push(SynergyCell {
                row_dose: grid.rows.doses[i],
                column_dose: grid.columns.doses[j],
                observed,
                expected: e,
                bliss: score,
            });
        }
    }
    debug!(rows = nrows, columns = ncols, "Bliss independence scored.");

    SynergyMap {
        rows: grid.rows.clone(),
        columns: grid.columns.clone(),
        observed: v.clone(),
        expected,
        bliss,
        cells,
    }
}
