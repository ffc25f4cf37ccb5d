//! CSV exports of normalized tables and matrices.
//!
//! Tables are meant to be opened directly in spreadsheets: numbers use the
//! shortest round-trip representation and missing values are empty cells.

use std::fs::File;
use std::path::Path;

use nalgebra::DMatrix;
use serde::Serialize;

use crate::assay::plate::{PlateGrid, FIRST_COLUMN, N_COLUMNS, PLATE_ROWS};
use crate::error::AppError;

/// One labelled row of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub label: String,
    pub values: Vec<f64>,
}

impl TableRow {
    pub fn new(label: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            values,
        }
    }
}

/// Per-well line of the combination stats table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynergyWellStats {
    #[serde(rename = "Well")]
    pub well: String,
    #[serde(rename = "Mean")]
    pub mean: Option<f64>,
    #[serde(rename = "Standard Deviation")]
    pub sd: Option<f64>,
    #[serde(rename = "Normalized Mean")]
    pub normalized_mean: Option<f64>,
    #[serde(rename = "Row Drug Concentration")]
    pub row_dose: f64,
    #[serde(rename = "Column Drug Concentration")]
    pub column_dose: f64,
}

fn create_writer(path: &Path) -> Result<csv::Writer<File>, AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create CSV '{}': {e}", path.display())))?;
    Ok(csv::Writer::from_writer(file))
}

fn write_err(path: &Path) -> impl Fn(csv::Error) -> AppError + '_ {
    move |e| AppError::new(2, format!("Failed to write CSV '{}': {e}", path.display()))
}

fn cell(value: f64) -> String {
    if value.is_finite() {
        format!("{value}")
    } else {
        String::new()
    }
}

/// Write a table whose first header cell is `index_header`.
pub fn write_table_csv(path: &Path, index_header: &str, columns: &[String], rows: &[TableRow]) -> Result<(), AppError> {
    let mut writer = create_writer(path)?;
    let on_err = write_err(path);

    let header = std::iter::once(index_header.to_string()).chain(columns.iter().cloned());
    writer.write_record(header).map_err(&on_err)?;

    for row in rows {
        let record = std::iter::once(row.label.clone()).chain(row.values.iter().map(|v| cell(*v)));
        writer.write_record(record).map_err(&on_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush CSV '{}': {e}", path.display())))?;
    Ok(())
}

/// Write a dose × dose matrix; the index header cell is left empty.
pub fn write_matrix_csv(path: &Path, row_doses: &[f64], column_doses: &[f64], values: &DMatrix<f64>) -> Result<(), AppError> {
    if values.shape() != (row_doses.len(), column_doses.len()) {
        return Err(AppError::new(
            4,
            format!(
                "Matrix shape {:?} does not match {} x {} doses.",
                values.shape(),
                row_doses.len(),
                column_doses.len()
            ),
        ));
    }
    let columns: Vec<String> = column_doses.iter().map(|d| format!("{d}")).collect();
    let rows: Vec<TableRow> = row_doses
        .iter()
        .enumerate()
        .map(|(i, d)| TableRow::new(format!("{d}"), values.row(i).iter().copied().collect()))
        .collect();
    write_table_csv(path, "", &columns, &rows)
}

/// Write per-well raw means as a 6 × 10 plate layout.
pub fn write_count_matrix_csv(path: &Path, means: &PlateGrid<Option<f64>>) -> Result<(), AppError> {
    let columns: Vec<String> = (0..N_COLUMNS).map(|j| (FIRST_COLUMN as usize + j).to_string()).collect();
    let rows: Vec<TableRow> = PLATE_ROWS
        .iter()
        .enumerate()
        .map(|(i, row)| {
            TableRow::new(
                row.to_string(),
                means.row(i).iter().map(|m| m.unwrap_or(f64::NAN)).collect(),
            )
        })
        .collect();
    write_table_csv(path, "", &columns, &rows)
}

/// Write the per-well combination stats table.
pub fn write_synergy_stats_csv(path: &Path, wells: &[SynergyWellStats]) -> Result<(), AppError> {
    let mut writer = create_writer(path)?;
    let on_err = write_err(path);
    for well in wells {
        writer.serialize(well).map_err(&on_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush CSV '{}': {e}", path.display())))?;
    Ok(())
}
