//! Terminal summaries per experiment type.

use crate::app::pipeline::{Analysis, BandOutcome, GdaOutput, RunOutput, SimpleOutput, SynergyOutput};
use crate::domain::{CurveFitResult, RunConfig, SynergyCell};
use crate::io::IngestedCounts;

/// Format the full run summary for stdout.
pub fn format_run_summary(output: &RunOutput, config: &RunConfig) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== vcurve - {} ({}) ===\n", config.title, config.experiment.label()));
    out.push_str(&format_ingest(&output.ingest));
    out.push('\n');

    match &output.analysis {
        Analysis::Gda(gda) => out.push_str(&format_gda_summary(gda)),
        Analysis::Synergy(synergy) => out.push_str(&format_synergy_summary(synergy)),
        Analysis::Simple(simple) => out.push_str(&format_simple_summary(simple)),
    }

    out.push_str("\nArtifacts:\n");
    for path in &output.artifacts {
        out.push_str(&format!("- {}\n", path.display()));
    }
    out
}

fn format_ingest(ingest: &IngestedCounts) -> String {
    let mut out = format!(
        "Rows: read={} | resolved={} | unmapped={} | row errors={}\n",
        ingest.rows_read,
        ingest.observations.len(),
        ingest.unmapped.len(),
        ingest.row_errors.len()
    );
    out.push_str(&format!("Columns: id={} count={}\n", ingest.id_column, ingest.count_column));
    for row in ingest.unmapped.iter().take(5) {
        out.push_str(&format!("  (unmapped, line {}) {}\n", row.line, truncate(&row.label, 40)));
    }
    for err in ingest.row_errors.iter().take(5) {
        out.push_str(&format!("  (row error, line {}) {}\n", err.line, err.message));
    }
    out
}

/// Viability table, fit diagnostics and IC50s of a single-gradient run.
pub fn format_gda_summary(gda: &GdaOutput) -> String {
    let mut out = String::new();

    out.push_str("Normalized viability:\n");
    let mut header = format!("{:<24}", "dose");
    for band in &gda.bands {
        header.push_str(&format!(" {:>18}", truncate(band.name(), 18)));
    }
    out.push_str(header.trim_end());
    out.push('\n');

    for (i, dose) in gda.doses.iter().enumerate() {
        let mut line = format!("{:<24}", fmt_dose(*dose));
        for outcome in &gda.bands {
            let cell = match outcome {
                BandOutcome::Analyzed { band, .. } => band
                    .conditions
                    .get(i)
                    .map(|c| fmt_mean_sd(c.mean, c.sd))
                    .unwrap_or_default(),
                BandOutcome::Failed { .. } => "-".to_string(),
            };
            line.push_str(&format!(" {cell:>18}"));
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out.push_str("\nCurve fits:\n");
    for outcome in &gda.bands {
        match outcome {
            BandOutcome::Analyzed { fit, .. } => out.push_str(&format_fit(fit)),
            BandOutcome::Failed { name, error } => {
                out.push_str(&format!("- {name}: not analyzed ({error})\n"));
            }
        }
    }

    match gda.ic50_ratio {
        Some(ratio) => out.push_str(&format!("\nIC50 ratio ({} / {}): {ratio:.4}\n", gda.bands[0].name(), gda.bands[1].name())),
        None => out.push_str("\nIC50 ratio: undefined\n"),
    }
    out
}

fn format_fit(fit: &CurveFitResult) -> String {
    let mut out = format!("- {}: {}", fit.condition, fit.kind().display_name());
    match fit.fitted() {
        Some(f) => {
            out.push_str(&format!(
                " | R²={:.4} RMSE={:.4} evals={}\n",
                f.quality.r_squared, f.quality.rmse, f.quality.evaluations
            ));
            let names = f.model.param_names().join(", ");
            out.push_str(&format!("    params [{names}]: {}\n", fmt_vec(&f.params)));
        }
        None => out.push('\n'),
    }
    match fit.ic50 {
        Some(ic50) => out.push_str(&format!("    IC50: {}\n", fmt_dose(ic50))),
        None => out.push_str("    IC50: n/a\n"),
    }
    for attempt in &fit.attempts {
        out.push_str(&format!(
            "    {:?} {:<5} budget={:<6} evals={:<6} {:?}\n",
            attempt.stage,
            attempt.model.display_name(),
            attempt.budget,
            attempt.evaluations,
            attempt.status
        ));
    }
    for warning in &fit.warnings {
        out.push_str(&format!("    warning: {warning}\n"));
    }
    out
}

/// Bliss extrema of a combination run.
pub fn format_synergy_summary(synergy: &SynergyOutput) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Rows: {} | Columns: {} | vehicle count={:.2}\n",
        synergy.vertical_name, synergy.horizontal_name, synergy.band.vehicle
    ));

    let map = &synergy.map;
    let finite = map.cells.iter().filter(|c| c.bliss.is_finite()).count();
    out.push_str(&format!("Scored cells: {finite}/{}\n", map.cells.len()));

    if let Some(cell) = map.most_synergistic() {
        out.push_str(&format!("Most synergistic : {}\n", fmt_cell(cell)));
    }
    if let Some(cell) = map.most_antagonistic() {
        out.push_str(&format!("Most antagonistic: {}\n", fmt_cell(cell)));
    }
    for warning in &synergy.band.warnings {
        out.push_str(&format!("  warning: {warning}\n"));
    }
    out
}

fn fmt_cell(cell: &SynergyCell) -> String {
    format!(
        "row={} col={} observed={:.4} expected={:.4} bliss={:+.4}",
        fmt_dose(cell.row_dose),
        fmt_dose(cell.column_dose),
        cell.observed,
        cell.expected,
        cell.bliss
    )
}

/// Well coverage of a raw-count run.
pub fn format_simple_summary(simple: &SimpleOutput) -> String {
    let mut values: Vec<f64> = simple.means.iter().filter_map(|(_, m)| *m).collect();
    values.sort_by(f64::total_cmp);
    let mut out = format!("Observed wells: {}/60\n", simple.observed_wells);
    if let (Some(lo), Some(hi)) = (values.first(), values.last()) {
        out.push_str(&format!("Mean count range: [{lo:.2}, {hi:.2}]\n"));
    }
    out
}

fn fmt_dose(v: f64) -> String {
    if v == 0.0 {
        "0 (vehicle)".to_string()
    } else {
        format!("{v:.4e}")
    }
}

fn fmt_mean_sd(mean: f64, sd: Option<f64>) -> String {
    if !mean.is_finite() {
        return "-".to_string();
    }
    match sd {
        Some(sd) => format!("{mean:.3} ± {sd:.3}"),
        None => format!("{mean:.3}"),
    }
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.6e}")).collect();
    format!("[{}]", parts.join(", "))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assay::plate::PlateGrid;
    use crate::domain::{AttemptStatus, FitAttempt, FitOutcome, FitQuality, FitStage, FittedModel, ModelKind};
    use crate::error::AnalysisError;

    fn fitted(condition: &str) -> CurveFitResult {
        CurveFitResult {
            condition: condition.to_string(),
            outcome: FitOutcome::Fitted(FittedModel {
                model: ModelKind::Hill,
                params: vec![1.0, 4e-8, -1.2],
                quality: FitQuality {
                    sse: 1e-4,
                    rmse: 3e-3,
                    r_squared: 0.998,
                    n: 9,
                    evaluations: 42,
                },
            }),
            ic50: Some(4e-8),
            attempts: vec![FitAttempt {
                stage: FitStage::TryHill,
                model: ModelKind::Hill,
                budget: 10_000,
                evaluations: 42,
                status: AttemptStatus::Converged,
                r_squared: Some(0.998),
            }],
            warnings: Vec::new(),
        }
    }

    #[test]
    fn truncate_marks_cut_names() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a-very-long-name", 6), "a-ver.");
    }

    #[test]
    fn dose_formatting() {
        assert_eq!(fmt_dose(0.0), "0 (vehicle)");
        assert_eq!(fmt_dose(1e-6), "1.0000e-6");
        assert_eq!(fmt_mean_sd(f64::NAN, None), "-");
        assert_eq!(fmt_mean_sd(0.5, Some(0.01)), "0.500 ± 0.010");
    }

    #[test]
    fn fit_section_lists_params_ic50_and_attempts() {
        let text = format_fit(&fitted("A549"));
        assert!(text.starts_with("- A549: Hill"));
        assert!(text.contains("params [Emax, EC50, H]"), "{text}");
        assert!(text.contains("IC50: 4.0000e-8"));
        assert!(text.contains("TryHill"));
    }

    #[test]
    fn gda_summary_reports_failed_band_and_missing_ratio() {
        let gda = GdaOutput {
            doses: vec![0.0, 1e-7],
            bands: vec![
                BandOutcome::Failed {
                    name: "A549".to_string(),
                    error: AnalysisError::DegenerateControl {
                        condition: "A549".to_string(),
                        value: 0.0,
                    },
                },
                BandOutcome::Failed {
                    name: "H1299".to_string(),
                    error: AnalysisError::DegenerateControl {
                        condition: "H1299".to_string(),
                        value: 0.0,
                    },
                },
            ],
            ic50_ratio: None,
        };
        let text = format_gda_summary(&gda);
        assert!(text.contains("A549: not analyzed"));
        assert!(text.contains("IC50 ratio: undefined"));
        assert!(text.contains("0 (vehicle)"));
    }

    #[test]
    fn simple_summary_counts_wells() {
        let mut means = PlateGrid::filled(None);
        *means.get_mut("B2".parse().unwrap()) = Some(12.0);
        *means.get_mut("C5".parse().unwrap()) = Some(30.5);
        let text = format_simple_summary(&SimpleOutput {
            means,
            observed_wells: 2,
        });
        assert!(text.contains("Observed wells: 2/60"));
        assert!(text.contains("[12.00, 30.50]"));
    }
}
