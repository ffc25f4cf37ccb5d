//! Shared analysis pipeline behind every experiment subcommand.
//!
//! Workflow:
//! counts ingest -> per-well aggregation -> band normalization -> fit / Bliss -> exports
//!
//! Per-condition failures are collected on the outputs; only a comparison
//! where every band fails aborts the run.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::app::artifact_path;
use crate::assay::layout::{gda_bands, synergy_band, BandLayout, LOWER_ROWS, UPPER_ROWS};
use crate::assay::normalize::{normalize_band, NormalizedBand, WellCounts};
use crate::assay::plate::{inner_wells, PlateGrid, WellAddress, N_COLUMNS};
use crate::assay::synergy::{score_bliss, SynergyMap, ViabilityGrid};
use crate::domain::{CurveFitResult, Experiment, GdaParams, RunConfig, SynergyParams};
use crate::error::{AnalysisError, AppError};
use crate::fit::selection::{fit_condition, ic50_ratio};
use crate::io::{
    load_counts, write_count_matrix_csv, write_json, write_matrix_csv, write_synergy_stats_csv, write_table_csv,
    ConditionCurve, CurvesFile, IngestedCounts, SurfaceFile, SynergyWellStats, TableRow, TOOL_NAME,
};

/// All computed outputs of one run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedCounts,
    pub analysis: Analysis,
    /// Files written, in write order.
    pub artifacts: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum Analysis {
    Gda(GdaOutput),
    Synergy(SynergyOutput),
    Simple(SimpleOutput),
}

/// One band of a single-gradient plate.
#[derive(Debug, Clone)]
pub enum BandOutcome {
    Analyzed { band: NormalizedBand, fit: CurveFitResult },
    Failed { name: String, error: AnalysisError },
}

impl BandOutcome {
    pub fn name(&self) -> &str {
        match self {
            BandOutcome::Analyzed { band, .. } => &band.name,
            BandOutcome::Failed { name, .. } => name,
        }
    }

    pub fn fit(&self) -> Option<&CurveFitResult> {
        match self {
            BandOutcome::Analyzed { fit, .. } => Some(fit),
            BandOutcome::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GdaOutput {
    /// Doses per plate column, vehicle first.
    pub doses: Vec<f64>,
    /// Upper band then lower band.
    pub bands: Vec<BandOutcome>,
    pub ic50_ratio: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct SynergyOutput {
    pub horizontal_name: String,
    pub vertical_name: String,
    pub band: NormalizedBand,
    pub map: SynergyMap,
}

#[derive(Debug, Clone)]
pub struct SimpleOutput {
    pub means: PlateGrid<Option<f64>>,
    pub observed_wells: usize,
}

/// Run the configured experiment end to end.
pub fn run_analysis(config: &RunConfig) -> Result<RunOutput, AppError> {
    let ingest = load_counts(&config.counts_path, &config.columns)?;

    std::fs::create_dir_all(&config.output_dir).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to create output directory '{}': {e}", config.output_dir.display()),
        )
    })?;

    let counts = WellCounts::from_observations(&ingest.observations);
    info!(
        observations = ingest.observations.len(),
        wells = counts.observed_wells(),
        "Counts aggregated per well."
    );

    let mut artifacts = Vec::new();
    let analysis = match &config.experiment {
        Experiment::Gda(params) => Analysis::Gda(run_gda(config, params, &counts, &mut artifacts)?),
        Experiment::Synergy(params) => Analysis::Synergy(run_synergy(config, params, &counts, &mut artifacts)?),
        Experiment::Simple => Analysis::Simple(run_simple(config, &counts, &mut artifacts)?),
    };

    for path in &artifacts {
        info!(path = %path.display(), "Artifact written.");
    }

    Ok(RunOutput {
        ingest,
        analysis,
        artifacts,
    })
}

fn run_gda(
    config: &RunConfig,
    params: &GdaParams,
    counts: &WellCounts,
    artifacts: &mut Vec<PathBuf>,
) -> Result<GdaOutput, AppError> {
    let path = artifact_path(config, "GDA_counts.csv");
    copy_counts(config, &path)?;
    artifacts.push(path);

    let doses = params.doses.with_vehicle();
    let layouts = gda_bands(&params.upper_name, &params.lower_name);

    let bands: Vec<BandOutcome> = layouts
        .iter()
        .map(|layout| match normalize_band(counts, layout) {
            Ok(band) => {
                let fit = fit_condition(&band.name, &doses, &band.means(), &config.fit);
                BandOutcome::Analyzed { band, fit }
            }
            Err(error) => {
                warn!("{error}");
                BandOutcome::Failed {
                    name: layout.name.clone(),
                    error,
                }
            }
        })
        .collect();

    if bands.iter().all(|b| matches!(b, BandOutcome::Failed { .. })) {
        let reasons: Vec<String> = bands
            .iter()
            .filter_map(|b| match b {
                BandOutcome::Failed { error, .. } => Some(error.to_string()),
                BandOutcome::Analyzed { .. } => None,
            })
            .collect();
        return Err(AppError::new(
            4,
            format!("No condition could be normalized: {}", reasons.join("; ")),
        ));
    }

    let ratio = match (bands[0].fit(), bands[1].fit()) {
        (Some(upper), Some(lower)) => ic50_ratio(upper, lower),
        _ => None,
    };
    if let Some(ratio) = ratio {
        info!(ratio, "IC50 ratio computed.");
    }

    let path = artifact_path(config, "GDA_Stats.csv");
    write_table_csv(&path, "96-Well Column", &plate_column_headers(), &gda_stats_rows(&doses, &bands))?;
    artifacts.push(path);

    let path = artifact_path(config, "GDA_ViabilityMatrix.csv");
    let dose_headers: Vec<String> = doses.iter().map(|d| format!("{d}")).collect();
    let rows: Vec<TableRow> = layouts
        .iter()
        .zip(&bands)
        .zip([UPPER_ROWS, LOWER_ROWS])
        .flat_map(|((layout, outcome), rows)| replicate_rows(layout, outcome, rows))
        .collect();
    write_table_csv(&path, "", &dose_headers, &rows)?;
    artifacts.push(path);

    let conditions = bands
        .iter()
        .filter_map(|outcome| match outcome {
            BandOutcome::Analyzed { band, fit } => Some(ConditionCurve::new(
                fit,
                params.doses.as_slice(),
                &band.means()[1..],
                &band.sds()[1..],
                config.fit.curve_points,
            )),
            BandOutcome::Failed { .. } => None,
        })
        .collect();
    let curves = CurvesFile {
        tool: TOOL_NAME.to_string(),
        generated_at: chrono::Utc::now(),
        title: config.title.clone(),
        conditions,
        ic50_ratio: ratio,
    };
    let path = artifact_path(config, "GDA_curves.json");
    write_json(&path, &curves)?;
    artifacts.push(path);

    Ok(GdaOutput {
        doses,
        bands,
        ic50_ratio: ratio,
    })
}

/// Keep the counts table the run was computed from beside its outputs.
fn copy_counts(config: &RunConfig, path: &Path) -> Result<(), AppError> {
    std::fs::copy(&config.counts_path, path).map_err(|e| {
        AppError::new(
            2,
            format!(
                "Failed to copy counts '{}' to '{}': {e}",
                config.counts_path.display(),
                path.display()
            ),
        )
    })?;
    Ok(())
}

fn plate_column_headers() -> Vec<String> {
    (0..N_COLUMNS)
        .filter_map(|j| WellAddress::from_indices(0, j))
        .map(|w| w.column().to_string())
        .collect()
}

fn gda_stats_rows(doses: &[f64], bands: &[BandOutcome]) -> Vec<TableRow> {
    let missing = || vec![f64::NAN; doses.len()];
    let means = |outcome: &BandOutcome| match outcome {
        BandOutcome::Analyzed { band, .. } => band.means(),
        BandOutcome::Failed { .. } => missing(),
    };
    let sds = |outcome: &BandOutcome| match outcome {
        BandOutcome::Analyzed { band, .. } => band.sds().into_iter().map(|s| s.unwrap_or(f64::NAN)).collect::<Vec<f64>>(),
        BandOutcome::Failed { .. } => missing(),
    };

    let mut rows = vec![TableRow::new("Drug Concentration", doses.to_vec())];
    rows.extend(
        bands
            .iter()
            .map(|b| TableRow::new(format!("Relative Cell Viability {}", b.name()), means(b))),
    );
    rows.extend(
        bands
            .iter()
            .map(|b| TableRow::new(format!("Relative Standard Deviation {}", b.name()), sds(b))),
    );
    rows
}

fn replicate_rows(layout: &BandLayout, outcome: &BandOutcome, rows: std::ops::Range<usize>) -> Vec<TableRow> {
    rows.enumerate()
        .map(|(k, row_index)| {
            let values = (0..layout.groups.len())
                .map(|column_index| {
                    let value = match outcome {
                        BandOutcome::Analyzed { band, .. } => {
                            WellAddress::from_indices(row_index, column_index).and_then(|w| band.well_value(w))
                        }
                        BandOutcome::Failed { .. } => None,
                    };
                    value.unwrap_or(f64::NAN)
                })
                .collect();
            TableRow::new(format!("{} rep {}", layout.name, k + 1), values)
        })
        .collect()
}

fn run_synergy(
    config: &RunConfig,
    params: &SynergyParams,
    counts: &WellCounts,
    artifacts: &mut Vec<PathBuf>,
) -> Result<SynergyOutput, AppError> {
    let path = artifact_path(config, "synergy_counts.csv");
    copy_counts(config, &path)?;
    artifacts.push(path);

    let name = format!("{} + {}", params.vertical_name, params.horizontal_name);
    let band = normalize_band(counts, &synergy_band(&name))?;

    let row_doses = params.vertical.with_vehicle();
    let column_doses = params.horizontal.with_vehicle();
    let grid = ViabilityGrid::from_band(&band, row_doses.clone(), column_doses.clone())?;
    let map = score_bliss(&grid);

    if let (Some(best), Some(worst)) = (map.most_synergistic(), map.most_antagonistic()) {
        info!(
            max_bliss = best.bliss,
            min_bliss = worst.bliss,
            "Bliss scores computed."
        );
    }

    let stats: Vec<SynergyWellStats> = inner_wells()
        .map(|well| SynergyWellStats {
            well: well.label(),
            mean: counts.mean(well),
            sd: counts.image_sd(well),
            normalized_mean: band.well_value(well),
            row_dose: row_doses[well.row_index()],
            column_dose: column_doses[well.column_index()],
        })
        .collect();
    let path = artifact_path(config, "synergy_stats.csv");
    write_synergy_stats_csv(&path, &stats)?;
    artifacts.push(path);

    let path = artifact_path(config, "synergy_ViabilityMatrix.csv");
    write_matrix_csv(&path, &row_doses, &column_doses, &map.observed)?;
    artifacts.push(path);

    let path = artifact_path(config, "synergy_BlissMatrix.csv");
    write_matrix_csv(&path, &row_doses, &column_doses, &map.bliss)?;
    artifacts.push(path);

    let surface = SurfaceFile::new(&config.title, &params.vertical_name, &params.horizontal_name, &map);
    let path = artifact_path(config, "synergy_surface.json");
    write_json(&path, &surface)?;
    artifacts.push(path);

    Ok(SynergyOutput {
        horizontal_name: params.horizontal_name.clone(),
        vertical_name: params.vertical_name.clone(),
        band,
        map,
    })
}

fn run_simple(config: &RunConfig, counts: &WellCounts, artifacts: &mut Vec<PathBuf>) -> Result<SimpleOutput, AppError> {
    let means = counts.means();
    let path = artifact_path(config, "simple_CountMatrix.csv");
    write_count_matrix_csv(&path, &means)?;
    artifacts.push(path);

    Ok(SimpleOutput {
        means,
        observed_wells: counts.observed_wells(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assay::gradient::{DoseGradient, GDA_STEPS};
    use crate::domain::{CountColumns, FitSettings};
    use crate::io::read_json;
    use crate::models::hill;
    use std::fmt::Write as _;

    struct Fixture {
        dir: tempfile::TempDir,
        counts: PathBuf,
    }

    fn fixture(rows: &[(String, f64)]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut csv = String::from("ImageNumber,FileName_images,Count_nuclei\n");
        for (i, (id, count)) in rows.iter().enumerate() {
            writeln!(csv, "{},{id},{count}", i + 1).unwrap();
        }
        let counts = dir.path().join("counts.csv");
        std::fs::write(&counts, csv).unwrap();
        Fixture { dir, counts }
    }

    fn config(fx: &Fixture, experiment: Experiment) -> RunConfig {
        RunConfig {
            title: "exp".to_string(),
            counts_path: fx.counts.clone(),
            output_dir: fx.dir.path().join("out"),
            columns: CountColumns::default(),
            experiment,
            fit: FitSettings::default(),
        }
    }

    fn gda_params() -> GdaParams {
        GdaParams {
            upper_name: "A549".to_string(),
            lower_name: "H1299".to_string(),
            doses: DoseGradient::generate(1e-6, 3.0, GDA_STEPS).unwrap(),
        }
    }

    /// Three replicate wells per column, scaled 0.95 / 1.0 / 1.05 around the band mean.
    fn gda_rows(upper_vehicle: f64, lower_vehicle: f64) -> Vec<(String, f64)> {
        let doses = gda_params().doses.with_vehicle();
        let mut rows = Vec::new();
        for (vehicle, row_labels, ec50) in [
            (upper_vehicle, ['B', 'C', 'D'], 4e-8),
            (lower_vehicle, ['E', 'F', 'G'], 1e-7),
        ] {
            for (j, dose) in doses.iter().enumerate() {
                let viability = if *dose == 0.0 { 1.0 } else { hill(*dose, &[1.0, ec50, -1.2]) };
                for (row, factor) in row_labels.iter().zip([0.95, 1.0, 1.05]) {
                    rows.push((format!("img_{row}{}_s1.tif", j + 2), vehicle * viability * factor));
                }
            }
        }
        rows
    }

    #[test]
    fn gda_end_to_end() {
        let fx = fixture(&gda_rows(100.0, 120.0));
        let config = config(&fx, Experiment::Gda(gda_params()));
        let output = run_analysis(&config).unwrap();

        let Analysis::Gda(gda) = &output.analysis else {
            panic!("expected gda output");
        };
        for outcome in &gda.bands {
            let BandOutcome::Analyzed { band, fit } = outcome else {
                panic!("band failed: {outcome:?}");
            };
            assert_eq!(band.conditions[0].mean, 1.0);
            assert!(fit.converged(), "{:?}", fit.attempts);
        }
        let ratio = gda.ic50_ratio.unwrap();
        assert!(ratio < 1.0, "ratio {ratio}");

        let stats = std::fs::read_to_string(artifact_path(&config, "GDA_Stats.csv")).unwrap();
        let lines: Vec<&str> = stats.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines.iter().all(|l| l.split(',').count() == 11));
        assert!(lines[0].starts_with("96-Well Column,2,3"));
        assert!(lines[2].starts_with("Relative Cell Viability A549,1,"));
        assert!(lines[3].starts_with("Relative Cell Viability H1299,1,"));

        let matrix = std::fs::read_to_string(artifact_path(&config, "GDA_ViabilityMatrix.csv")).unwrap();
        assert_eq!(matrix.lines().count(), 7);
        assert!(matrix.lines().nth(1).unwrap().starts_with("A549 rep 1,"));

        let curves: CurvesFile = read_json(&artifact_path(&config, "GDA_curves.json")).unwrap();
        assert_eq!(curves.conditions.len(), 2);
        assert_eq!(curves.conditions[0].points.len(), GDA_STEPS);
        assert_eq!(curves.ic50_ratio, gda.ic50_ratio);

        let copied = std::fs::read_to_string(artifact_path(&config, "GDA_counts.csv")).unwrap();
        assert_eq!(copied, std::fs::read_to_string(&fx.counts).unwrap());
        assert_eq!(output.artifacts.len(), 4);
        assert_eq!(output.artifacts[0], artifact_path(&config, "GDA_counts.csv"));
    }

    #[test]
    fn gda_single_degenerate_vehicle_is_isolated() {
        let fx = fixture(&gda_rows(0.0, 120.0));
        let config = config(&fx, Experiment::Gda(gda_params()));
        let output = run_analysis(&config).unwrap();

        let Analysis::Gda(gda) = &output.analysis else {
            panic!("expected gda output");
        };
        assert!(matches!(
            &gda.bands[0],
            BandOutcome::Failed { error: AnalysisError::DegenerateControl { .. }, .. }
        ));
        assert!(gda.bands[1].fit().is_some());
        assert_eq!(gda.ic50_ratio, None);

        let curves: CurvesFile = read_json(&artifact_path(&config, "GDA_curves.json")).unwrap();
        assert_eq!(curves.conditions.len(), 1);
        assert_eq!(curves.conditions[0].name, "H1299");
    }

    #[test]
    fn gda_both_vehicles_degenerate_aborts() {
        let fx = fixture(&gda_rows(0.0, 0.0));
        let err = run_analysis(&config(&fx, Experiment::Gda(gda_params()))).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn synergy_end_to_end_on_independent_drugs() {
        let params = SynergyParams {
            horizontal_name: "drugH".to_string(),
            vertical_name: "drugV".to_string(),
            horizontal: DoseGradient::generate(1e-6, 3.0, 9).unwrap(),
            vertical: DoseGradient::generate(2e-6, 2.0, 5).unwrap(),
        };
        let row_effect = [1.0, 0.9, 0.8, 0.6, 0.4, 0.3];
        let column_effect = [1.0, 0.98, 0.95, 0.9, 0.8, 0.7, 0.55, 0.4, 0.3, 0.2];
        let mut rows = Vec::new();
        for well in inner_wells() {
            let v = 200.0 * row_effect[well.row_index()] * column_effect[well.column_index()];
            for (s, factor) in [0.9, 1.1].into_iter().enumerate() {
                rows.push((format!("img_{}_s{}.tif", well.label(), s + 1), v * factor));
            }
        }
        let fx = fixture(&rows);
        let config = config(&fx, Experiment::Synergy(params));
        let output = run_analysis(&config).unwrap();

        let Analysis::Synergy(synergy) = &output.analysis else {
            panic!("expected synergy output");
        };
        assert_eq!(synergy.map.observed[(0, 0)], 1.0);
        assert_eq!(synergy.map.cells.len(), 45);
        for cell in &synergy.map.cells {
            assert!(cell.bliss.abs() < 1e-9, "{cell:?}");
        }
        for i in 0..6 {
            assert_eq!(synergy.map.bliss[(i, 0)], 0.0);
        }

        let stats = std::fs::read_to_string(artifact_path(&config, "synergy_stats.csv")).unwrap();
        assert_eq!(stats.lines().count(), 61);
        assert!(stats.starts_with("Well,Mean,Standard Deviation,Normalized Mean"));
        let bliss = std::fs::read_to_string(artifact_path(&config, "synergy_BlissMatrix.csv")).unwrap();
        assert_eq!(bliss.lines().count(), 7);
        assert!(artifact_path(&config, "synergy_surface.json").exists());
        assert!(artifact_path(&config, "synergy_counts.csv").exists());
        assert_eq!(output.artifacts.len(), 5);
    }

    #[test]
    fn synergy_degenerate_vehicle_aborts() {
        let params = SynergyParams {
            horizontal_name: "h".to_string(),
            vertical_name: "v".to_string(),
            horizontal: DoseGradient::generate(1e-6, 3.0, 9).unwrap(),
            vertical: DoseGradient::generate(2e-6, 2.0, 5).unwrap(),
        };
        let fx = fixture(&[("img_B2_s1.tif".to_string(), 0.0), ("img_C3_s1.tif".to_string(), 10.0)]);
        let err = run_analysis(&config(&fx, Experiment::Synergy(params))).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn simple_writes_plate_matrix() {
        let fx = fixture(&[
            ("img_B2_s1.tif".to_string(), 10.0),
            ("img_B2_s2.tif".to_string(), 20.0),
            ("img_G11_s1.tif".to_string(), 5.0),
            ("unlabeled.tif".to_string(), 7.0),
        ]);
        let config = config(&fx, Experiment::Simple);
        let output = run_analysis(&config).unwrap();

        let Analysis::Simple(simple) = &output.analysis else {
            panic!("expected simple output");
        };
        assert_eq!(simple.observed_wells, 2);
        assert_eq!(output.ingest.unmapped.len(), 1);

        let matrix = std::fs::read_to_string(artifact_path(&config, "simple_CountMatrix.csv")).unwrap();
        let lines: Vec<&str> = matrix.lines().collect();
        assert_eq!(lines.len(), 7);
        assert!(lines[1].starts_with("B,15,"));
        assert!(lines[6].ends_with(",5"));
    }

    #[test]
    fn missing_counts_file_is_an_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let fx = Fixture {
            counts: dir.path().join("nope.csv"),
            dir,
        };
        let err = run_analysis(&config(&fx, Experiment::Simple)).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
