//! Command-line parsing for the viability analysis tool.
//!
//! This module only describes arguments; converting them into a validated
//! [`RunConfig`](crate::domain::RunConfig) happens in `app`.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

/// Default output directory when neither `--output-dir` nor `VCURVE_OUTPUT_DIR` is set.
pub const DEFAULT_OUTPUT_DIR: &str = "viability_output";

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "vcurve",
    version,
    about = "Dose-response curves and Bliss synergy maps from 96-well nuclei counts"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Silence all logging.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Also write logs to this file.
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

/// CLI subcommands, one per experiment type.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Single-gradient assay: one drug, two conditions (rows B–D and E–G).
    Gda(GdaArgs),
    /// Two-gradient combination assay scored against Bliss independence.
    Synergy(SynergyArgs),
    /// Raw per-well mean counts, no normalization.
    Simple(CommonArgs),
}

/// Options shared by every experiment type.
#[derive(Debug, Args, Clone)]
pub struct CommonArgs {
    /// Counts table exported by the image-analysis tool.
    #[arg(long, value_name = "CSV")]
    pub counts: PathBuf,

    /// Experiment title; prefixes every output file.
    #[arg(short, long)]
    pub title: String,

    /// Output directory.
    #[arg(short, long, env = "VCURVE_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Column holding the image identifier (contains the well label).
    #[arg(long, default_value = "FileName_images")]
    pub id_column: String,

    /// Column holding the nuclei count.
    #[arg(long, default_value = "Count_nuclei")]
    pub count_column: String,
}

/// Optimizer budgets and curve export settings.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Function-evaluation budget of the first 5PL attempt.
    #[arg(long, default_value_t = 500)]
    pub first_budget: usize,

    /// Function-evaluation budget of the 5PL retry.
    #[arg(long, default_value_t = 5000)]
    pub retry_budget: usize,

    /// Function-evaluation budget of the Hill fallback.
    #[arg(long, default_value_t = 10_000)]
    pub hill_budget: usize,

    /// Minimum R² for a fit to be accepted.
    #[arg(long, default_value_t = 0.5)]
    pub min_r_squared: f64,

    /// Points per exported fitted curve.
    #[arg(long, default_value_t = 101)]
    pub curve_points: usize,
}

#[derive(Debug, Args, Clone)]
pub struct GdaArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Condition in rows B–D (e.g. a cell line).
    #[arg(long)]
    pub upper: String,

    /// Condition in rows E–G.
    #[arg(long)]
    pub lower: String,

    /// Top concentration (column 11).
    #[arg(long, required_unless_present = "doses", requires = "dilution")]
    pub top_conc: Option<f64>,

    /// Dilution factor between adjacent columns.
    #[arg(long, requires = "top_conc")]
    pub dilution: Option<f64>,

    /// Explicit ascending doses for columns 3..11 (comma separated).
    #[arg(long, value_delimiter = ',', conflicts_with_all = ["top_conc", "dilution"])]
    pub doses: Option<Vec<f64>>,

    #[command(flatten)]
    pub fit: FitArgs,
}

#[derive(Debug, Args, Clone)]
pub struct SynergyArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Drug dosed along columns 3..11.
    #[arg(long)]
    pub horizontal_drug: String,

    /// Drug dosed along rows C..G.
    #[arg(long)]
    pub vertical_drug: String,

    /// Horizontal top concentration (column 11).
    #[arg(long, required_unless_present = "h_doses", requires = "h_dilution")]
    pub h_top_conc: Option<f64>,

    #[arg(long, requires = "h_top_conc")]
    pub h_dilution: Option<f64>,

    /// Explicit ascending horizontal doses (9 values).
    #[arg(long, value_delimiter = ',', conflicts_with_all = ["h_top_conc", "h_dilution"])]
    pub h_doses: Option<Vec<f64>>,

    /// Vertical top concentration (row G).
    #[arg(long, required_unless_present = "v_doses", requires = "v_dilution")]
    pub v_top_conc: Option<f64>,

    #[arg(long, requires = "v_top_conc")]
    pub v_dilution: Option<f64>,

    /// Explicit ascending vertical doses (5 values).
    #[arg(long, value_delimiter = ',', conflicts_with_all = ["v_top_conc", "v_dilution"])]
    pub v_doses: Option<Vec<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gda_accepts_generated_gradient() {
        let cli = Cli::try_parse_from([
            "vcurve", "-vv", "gda", "--counts", "c.csv", "-t", "exp1", "-o", "out", "--upper", "A549", "--lower",
            "H1299", "--top-conc", "1e-6", "--dilution", "3",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Gda(args) = cli.command else {
            panic!("expected gda");
        };
        assert_eq!(args.top_conc, Some(1e-6));
        assert_eq!(args.fit.first_budget, 500);
        assert_eq!(args.common.id_column, "FileName_images");
    }

    #[test]
    fn gda_accepts_explicit_doses() {
        let cli = Cli::try_parse_from([
            "vcurve", "gda", "--counts", "c.csv", "-t", "x", "-o", "out", "--upper", "a", "--lower", "b", "--doses",
            "1,2,3,4,5,6,7,8,9",
        ])
        .unwrap();
        let Command::Gda(args) = cli.command else {
            panic!("expected gda");
        };
        assert_eq!(args.doses.unwrap().len(), 9);
    }

    #[test]
    fn gda_requires_some_dose_source() {
        let res = Cli::try_parse_from([
            "vcurve", "gda", "--counts", "c.csv", "-t", "x", "-o", "out", "--upper", "a", "--lower", "b",
        ]);
        assert!(res.is_err());
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let res = Cli::try_parse_from(["vcurve", "-q", "-v", "simple", "--counts", "c.csv", "-t", "x", "-o", "o"]);
        assert!(res.is_err());
    }
}
