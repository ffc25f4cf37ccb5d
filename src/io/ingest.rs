//! Counts table ingest.
//!
//! Turns the image-analysis CSV (one row per analyzed image) into resolved
//! `NucleiObservation`s.
//!
//! Design goals:
//! - **Tolerant schema**: only the identifier and count columns are read;
//!   incidental columns are ignored
//! - **Row-level validation**: bad rows are skipped and reported with line numbers
//! - **Unmapped identifiers are kept**, not dropped, so the caller can report them
//! - **Separation of concerns**: no normalization logic here

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use csv::StringRecord;
use tracing::{debug, warn};

use crate::assay::plate::{resolve_well_label, WellLabel};
use crate::domain::{CountColumns, NucleiObservation};
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub id: Option<String>,
    pub message: String,
}

/// A row whose identifier contains no canonical inner-well label.
#[derive(Debug, Clone, PartialEq)]
pub struct UnmappedRow {
    pub line: usize,
    /// Identifier passed through unchanged.
    pub label: String,
}

/// Ingest output: resolved observations plus everything that was set aside.
#[derive(Debug, Clone)]
pub struct IngestedCounts {
    pub observations: Vec<NucleiObservation>,
    pub unmapped: Vec<UnmappedRow>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    /// Header actually used for the identifier.
    pub id_column: String,
    /// Header actually used for the count.
    pub count_column: String,
}

/// Load the counts table at `path`.
///
/// Fails with exit code 2 when the file or its required columns are missing
/// and with exit code 3 when no row resolves to an inner well.
pub fn load_counts(path: &Path, columns: &CountColumns) -> Result<IngestedCounts, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open counts CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();

    let header_map = build_header_map(&headers);
    let (id_idx, id_column) = resolve_column(&headers, &header_map, &columns.id, "filename_")?;
    let (count_idx, count_column) = resolve_column(&headers, &header_map, &columns.count, "count_")?;
    debug!(id_column = %id_column, count_column = %count_column, "Counts table columns resolved.");

    let mut observations = Vec::new();
    let mut unmapped = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    id: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let Some(raw_id) = field(&record, id_idx) else {
            row_errors.push(RowError {
                line,
                id: None,
                message: format!("Missing `{id_column}` value."),
            });
            continue;
        };

        let count = match field(&record, count_idx).map(parse_count) {
            Some(Ok(count)) => count,
            Some(Err(message)) => {
                row_errors.push(RowError {
                    line,
                    id: Some(raw_id.to_string()),
                    message,
                });
                continue;
            }
            None => {
                row_errors.push(RowError {
                    line,
                    id: Some(raw_id.to_string()),
                    message: format!("Missing `{count_column}` value."),
                });
                continue;
            }
        };

        match resolve_well_label(raw_id) {
            WellLabel::Resolved(well) => observations.push(NucleiObservation {
                well,
                count,
                source: raw_id.to_string(),
            }),
            WellLabel::Unmapped(label) => unmapped.push(UnmappedRow { line, label }),
        }
    }

    if !unmapped.is_empty() {
        warn!(
            unmapped = unmapped.len(),
            resolved = observations.len(),
            "Some identifiers contain no inner-well label and were excluded."
        );
    }
    if !row_errors.is_empty() {
        warn!(rows = row_errors.len(), "Some rows could not be parsed and were skipped.");
    }

    if observations.is_empty() {
        return Err(AppError::new(
            3,
            format!(
                "No rows of '{}' resolved to an inner well (B2..G11).",
                path.display()
            ),
        ));
    }

    Ok(IngestedCounts {
        observations,
        unmapped,
        row_errors,
        rows_read,
        id_column,
        count_column,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        // First occurrence wins on duplicate headers.
        map.entry(normalize_header_name(name)).or_insert(idx);
    }
    map
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

/// Find `wanted` (case-insensitive), else the first header starting with `prefix`.
fn resolve_column(
    headers: &StringRecord,
    header_map: &HashMap<String, usize>,
    wanted: &str,
    prefix: &str,
) -> Result<(usize, String), AppError> {
    let original = |idx: usize| headers.get(idx).unwrap_or_default().trim().trim_start_matches('\u{feff}').to_string();

    if let Some(&idx) = header_map.get(&normalize_header_name(wanted)) {
        return Ok((idx, original(idx)));
    }

    headers
        .iter()
        .position(|h| normalize_header_name(h).starts_with(prefix))
        .map(|idx| (idx, original(idx)))
        .ok_or_else(|| {
            AppError::new(
                2,
                format!("Missing required column `{wanted}` (and no column starting with `{prefix}`)."),
            )
        })
}

fn field(record: &StringRecord, idx: usize) -> Option<&str> {
    record.get(idx).map(str::trim).filter(|s| !s.is_empty())
}

fn parse_count(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("Invalid count '{s}'."))?;
    if !value.is_finite() || value < 0.0 {
        return Err(format!("Count must be finite and >= 0 (got {s})."));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn reads_default_columns_and_ignores_others() {
        let csv = "\u{feff}ImageNumber,FileName_images,Count_nuclei\n\
                   1,plate1_B2_s1.tif,120\n\
                   2,plate1_B2_s2.tif,130\n\
                   3,plate1_G11_s1.tif,40\n";
        let file = write_csv(csv);
        let data = load_counts(file.path(), &CountColumns::default()).unwrap();

        assert_eq!(data.rows_read, 3);
        assert_eq!(data.observations.len(), 3);
        assert_eq!(data.observations[0].well.label(), "B2");
        assert_eq!(data.observations[2].well.label(), "G11");
        assert_eq!(data.observations[1].count, 130.0);
        assert_eq!(data.id_column, "FileName_images");
    }

    #[test]
    fn falls_back_to_prefixed_columns_case_insensitively() {
        let csv = "filename_dapi,COUNT_Cells\nx_C5.tif,10\n";
        let file = write_csv(csv);
        let data = load_counts(file.path(), &CountColumns::default()).unwrap();
        assert_eq!(data.count_column, "COUNT_Cells");
        assert_eq!(data.observations[0].well.label(), "C5");
    }

    #[test]
    fn unmapped_and_bad_rows_are_reported_not_fatal() {
        let csv = "FileName_images,Count_nuclei\n\
                   a_B3.tif,10\n\
                   a_A1.tif,11\n\
                   a_C3.tif,abc\n\
                   a_D3.tif,-4\n\
                   a_E3.tif,\n";
        let file = write_csv(csv);
        let data = load_counts(file.path(), &CountColumns::default()).unwrap();

        assert_eq!(data.observations.len(), 1);
        assert_eq!(
            data.unmapped,
            vec![UnmappedRow {
                line: 3,
                label: "a_A1.tif".to_string()
            }]
        );
        let lines: Vec<usize> = data.row_errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![4, 5, 6]);
    }

    #[test]
    fn no_resolved_rows_is_exit_code_3() {
        let file = write_csv("FileName_images,Count_nuclei\nA1.tif,3\nH12.tif,4\n");
        let err = load_counts(file.path(), &CountColumns::default()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn missing_columns_is_exit_code_2() {
        let file = write_csv("image,nuclei\nB2.tif,3\n");
        let err = load_counts(file.path(), &CountColumns::default()).unwrap_err();
        assert_eq!(err.exit_code(), 2);

        let err = load_counts(Path::new("/definitely/not/here.csv"), &CountColumns::default()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
