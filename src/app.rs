//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - installs logging
//! - validates parameters into an immutable `RunConfig`
//! - runs the analysis pipeline for the chosen experiment
//! - prints the terminal summary

use std::path::PathBuf;

use clap::Parser;
use tracing::{debug, info};

use crate::assay::gradient::{DoseGradient, GDA_STEPS, HORIZONTAL_STEPS, VERTICAL_STEPS};
use crate::cli::{Cli, Command, CommonArgs, FitArgs, GdaArgs, SynergyArgs};
use crate::domain::{CountColumns, Experiment, FitSettings, GdaParams, RunConfig, SynergyParams};
use crate::error::{AnalysisError, AppError};

pub mod pipeline;

/// Entry point for the `vcurve` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env file is fine.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    crate::logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;

    let config = run_config_from_command(cli.command)?;
    info!(title = %config.title, experiment = config.experiment.label(), "Starting analysis.");

    let output = pipeline::run_analysis(&config)?;
    println!("{}", crate::report::format_run_summary(&output, &config));
    Ok(())
}

/// Validate parsed arguments into a run configuration.
pub fn run_config_from_command(command: Command) -> Result<RunConfig, AppError> {
    match command {
        Command::Gda(args) => gda_config(args),
        Command::Synergy(args) => synergy_config(args),
        Command::Simple(common) => Ok(base_config(common, Experiment::Simple, FitSettings::default())),
    }
}

fn gda_config(args: GdaArgs) -> Result<RunConfig, AppError> {
    let doses = gradient_from_args(args.top_conc, args.dilution, args.doses, "gda", GDA_STEPS)?;
    let fit = fit_settings_from_args(&args.fit)?;
    let experiment = Experiment::Gda(GdaParams {
        upper_name: args.upper,
        lower_name: args.lower,
        doses,
    });
    Ok(base_config(args.common, experiment, fit))
}

fn synergy_config(args: SynergyArgs) -> Result<RunConfig, AppError> {
    let horizontal = gradient_from_args(args.h_top_conc, args.h_dilution, args.h_doses, "horizontal", HORIZONTAL_STEPS)?;
    let vertical = gradient_from_args(args.v_top_conc, args.v_dilution, args.v_doses, "vertical", VERTICAL_STEPS)?;
    let experiment = Experiment::Synergy(SynergyParams {
        horizontal_name: args.horizontal_drug,
        vertical_name: args.vertical_drug,
        horizontal,
        vertical,
    });
    Ok(base_config(args.common, experiment, FitSettings::default()))
}

fn base_config(common: CommonArgs, experiment: Experiment, fit: FitSettings) -> RunConfig {
    RunConfig {
        title: common.title,
        counts_path: common.counts,
        output_dir: common.output_dir,
        columns: CountColumns {
            id: common.id_column,
            count: common.count_column,
        },
        experiment,
        fit,
    }
}

/// Build one gradient from either `top/dilution` or an explicit dose list.
pub fn gradient_from_args(
    top: Option<f64>,
    dilution: Option<f64>,
    doses: Option<Vec<f64>>,
    axis: &'static str,
    steps: usize,
) -> Result<DoseGradient, AppError> {
    let gradient = match (doses, top, dilution) {
        (Some(values), _, _) => DoseGradient::from_values(values, axis, steps)?,
        (None, Some(top), Some(dilution)) => DoseGradient::generate(top, dilution, steps)?,
        _ => {
            return Err(AppError::new(
                2,
                format!("The {axis} gradient needs either a dose list or a top concentration and a dilution factor."),
            ));
        }
    };
    debug!(axis, doses = ?gradient.as_slice(), "Gradient resolved.");
    Ok(gradient)
}

fn fit_settings_from_args(args: &FitArgs) -> Result<FitSettings, AppError> {
    if args.first_budget == 0 || args.retry_budget == 0 || args.hill_budget == 0 {
        return Err(AnalysisError::InvalidParameter {
            name: "budget",
            reason: "evaluation budgets must be > 0".to_string(),
        }
        .into());
    }
    if !(args.min_r_squared.is_finite() && args.min_r_squared <= 1.0) {
        return Err(AnalysisError::InvalidParameter {
            name: "min_r_squared",
            reason: format!("must be finite and <= 1 (got {})", args.min_r_squared),
        }
        .into());
    }
    if args.curve_points < 2 {
        return Err(AnalysisError::InvalidParameter {
            name: "curve_points",
            reason: "must be >= 2".to_string(),
        }
        .into());
    }
    Ok(FitSettings {
        first_budget: args.first_budget,
        retry_budget: args.retry_budget,
        hill_budget: args.hill_budget,
        min_r_squared: args.min_r_squared,
        curve_points: args.curve_points,
    })
}

/// Output path `{dir}/{title}_{suffix}`.
pub fn artifact_path(config: &RunConfig, suffix: &str) -> PathBuf {
    config.output_dir.join(format!("{}_{suffix}", config.title))
}
