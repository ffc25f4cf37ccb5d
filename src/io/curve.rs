//! Read/write fitted-curve and synergy-surface JSON files.
//!
//! Curve JSON is the portable representation of a single-gradient run:
//! - per condition: fit kind, named parameters, quality, IC50, attempt log
//! - the normalized data points with replicate SDs
//! - a precomputed fitted grid for quick plotting
//!
//! Surface JSON carries the combination grid with log-axis placeholders.

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::assay::synergy::{DoseAxis, SynergyMap};
use crate::domain::{CurveFitResult, FitAttempt, FitKind, FitQuality, ModelKind, SynergyCell};
use crate::error::AppError;
use crate::fit::grid::{fitted_values, log_space};

pub const TOOL_NAME: &str = "vcurve";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedParam {
    pub name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPoint {
    pub dose: f64,
    pub viability: Option<f64>,
    pub sd: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveGrid {
    pub doses: Vec<f64>,
    pub viability: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionCurve {
    pub name: String,
    pub kind: FitKind,
    pub model: Option<ModelKind>,
    pub parameters: Vec<NamedParam>,
    pub quality: Option<FitQuality>,
    pub ic50: Option<f64>,
    pub attempts: Vec<FitAttempt>,
    pub warnings: Vec<String>,
    pub points: Vec<DataPoint>,
    pub curve: Option<CurveGrid>,
}

/// A saved single-gradient curve file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurvesFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub title: String,
    pub conditions: Vec<ConditionCurve>,
    pub ic50_ratio: Option<f64>,
}

/// A saved combination surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurfaceFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub title: String,
    pub row_drug: String,
    pub column_drug: String,
    pub rows: DoseAxis,
    pub columns: DoseAxis,
    /// Row-major, `null` where a well had no data.
    pub observed: Vec<Vec<f64>>,
    pub expected: Vec<Vec<f64>>,
    pub bliss: Vec<Vec<f64>>,
    pub cells: Vec<SynergyCell>,
}

impl ConditionCurve {
    /// Assemble the JSON view of one condition.
    ///
    /// `doses`, `means` and `sds` are the non-vehicle points that were fitted.
    pub fn new(fit: &CurveFitResult, doses: &[f64], means: &[f64], sds: &[Option<f64>], curve_points: usize) -> Self {
        let points = doses
            .iter()
            .enumerate()
            .map(|(i, &dose)| DataPoint {
                dose,
                viability: means.get(i).copied().filter(|v| v.is_finite()),
                sd: sds.get(i).copied().flatten(),
            })
            .collect();

        let fitted = fit.fitted();
        let parameters = fitted
            .map(|f| {
                f.model
                    .param_names()
                    .iter()
                    .zip(&f.params)
                    .map(|(name, value)| NamedParam {
                        name: name.to_string(),
                        value: *value,
                    })
                    .collect()
            })
            .unwrap_or_default();

        let curve = fitted.and_then(|f| {
            let lo = doses.iter().copied().filter(|d| *d > 0.0).fold(f64::INFINITY, f64::min);
            let hi = doses.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let grid = log_space(lo, hi, curve_points).ok()?;
            let viability = fitted_values(f, &grid);
            Some(CurveGrid { doses: grid, viability })
        });

        Self {
            name: fit.condition.clone(),
            kind: fit.kind(),
            model: fitted.map(|f| f.model),
            parameters,
            quality: fitted.map(|f| f.quality.clone()),
            ic50: fit.ic50,
            attempts: fit.attempts.clone(),
            warnings: fit.warnings.iter().map(|w| w.to_string()).collect(),
            points,
            curve,
        }
    }
}

impl SurfaceFile {
    pub fn new(title: &str, row_drug: &str, column_drug: &str, map: &SynergyMap) -> Self {
        let rows_of = |m: &nalgebra::DMatrix<f64>| -> Vec<Vec<f64>> {
            (0..m.nrows()).map(|i| m.row(i).iter().copied().collect()).collect()
        };
        Self {
            tool: TOOL_NAME.to_string(),
            generated_at: Utc::now(),
            title: title.to_string(),
            row_drug: row_drug.to_string(),
            column_drug: column_drug.to_string(),
            rows: map.rows.clone(),
            columns: map.columns.clone(),
            observed: rows_of(&map.observed),
            expected: rows_of(&map.expected),
            bliss: rows_of(&map.bliss),
            cells: map.cells.clone(),
        }
    }
}

/// Write any serializable value as pretty JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, value)
        .map_err(|e| AppError::new(2, format!("Failed to write JSON '{}': {e}", path.display())))?;
    Ok(())
}

/// Read a JSON file written by [`write_json`].
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid JSON '{}': {e}", path.display())))
}
