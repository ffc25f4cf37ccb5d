//! Shared domain types.
//!
//! Fit outputs are serializable so they can be exported to JSON alongside the
//! CSV tables; the run configuration is built once at the CLI boundary and
//! passed down by reference.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::assay::gradient::DoseGradient;
use crate::assay::plate::WellAddress;
use crate::error::AnalysisError;

/// One analyzed image whose identifier resolved to an inner well.
#[derive(Debug, Clone, PartialEq)]
pub struct NucleiObservation {
    pub well: WellAddress,
    pub count: f64,
    /// Raw identifier the well was resolved from.
    pub source: String,
}

/// Concrete dose–response model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelKind {
    #[serde(rename = "5pl")]
    FivePl,
    #[serde(rename = "hill")]
    Hill,
}

impl ModelKind {
    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::FivePl => "5PL",
            ModelKind::Hill => "Hill",
        }
    }

    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            ModelKind::FivePl => &["A", "B", "C", "D", "G"],
            ModelKind::Hill => &["Emax", "EC50", "H"],
        }
    }

    pub fn param_count(self) -> usize {
        self.param_names().len()
    }

    /// Index of the dose-scale parameter (`C` or `EC50`), which must stay positive.
    pub fn scale_index(self) -> usize {
        match self {
            ModelKind::FivePl => 2,
            ModelKind::Hill => 1,
        }
    }
}

/// Tagged result of the fit pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitKind {
    #[serde(rename = "5pl")]
    FivePl,
    Hill,
    Unfit,
}

impl From<ModelKind> for FitKind {
    fn from(value: ModelKind) -> Self {
        match value {
            ModelKind::FivePl => FitKind::FivePl,
            ModelKind::Hill => FitKind::Hill,
        }
    }
}

impl FitKind {
    pub fn display_name(self) -> &'static str {
        match self {
            FitKind::FivePl => "5PL",
            FitKind::Hill => "Hill",
            FitKind::Unfit => "unfit",
        }
    }
}

/// States of the fit pipeline that run an optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitStage {
    TryA,
    TryB,
    TryHill,
}

impl FitStage {
    pub fn model(self) -> ModelKind {
        match self {
            FitStage::TryA | FitStage::TryB => ModelKind::FivePl,
            FitStage::TryHill => ModelKind::Hill,
        }
    }

    /// Evaluation budget for this stage.
    pub fn budget(self, settings: &FitSettings) -> usize {
        match self {
            FitStage::TryA => settings.first_budget,
            FitStage::TryB => settings.retry_budget,
            FitStage::TryHill => settings.hill_budget,
        }
    }
}

/// How a single optimizer attempt ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum AttemptStatus {
    Converged,
    BudgetExhausted,
    Infeasible,
    Degenerate,
    Stalled,
    /// The optimizer converged but the result failed a quality check.
    Rejected(String),
}

impl AttemptStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptStatus::Converged)
    }
}

/// Log entry for one optimizer attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitAttempt {
    pub stage: FitStage,
    pub model: ModelKind,
    pub budget: usize,
    pub evaluations: usize,
    pub status: AttemptStatus,
    pub r_squared: Option<f64>,
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    pub sse: f64,
    pub rmse: f64,
    pub r_squared: f64,
    pub n: usize,
    pub evaluations: usize,
}

/// Accepted model parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub model: ModelKind,
    pub params: Vec<f64>,
    pub quality: FitQuality,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FitOutcome {
    Fitted(FittedModel),
    Unfit,
}

/// Fit result for one condition (one curve).
#[derive(Debug, Clone, PartialEq)]
pub struct CurveFitResult {
    pub condition: String,
    pub outcome: FitOutcome,
    /// Dose where the fitted curve crosses 0.5; absent if unfit or the solve failed.
    pub ic50: Option<f64>,
    pub attempts: Vec<FitAttempt>,
    pub warnings: Vec<AnalysisError>,
}

impl CurveFitResult {
    pub fn kind(&self) -> FitKind {
        match &self.outcome {
            FitOutcome::Fitted(fit) => fit.model.into(),
            FitOutcome::Unfit => FitKind::Unfit,
        }
    }

    pub fn converged(&self) -> bool {
        matches!(self.outcome, FitOutcome::Fitted(_))
    }

    pub fn fitted(&self) -> Option<&FittedModel> {
        match &self.outcome {
            FitOutcome::Fitted(fit) => Some(fit),
            FitOutcome::Unfit => None,
        }
    }

    pub fn params(&self) -> &[f64] {
        self.fitted().map(|f| f.params.as_slice()).unwrap_or(&[])
    }
}

/// One interior cell of a combination grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SynergyCell {
    pub row_dose: f64,
    pub column_dose: f64,
    pub observed: f64,
    pub expected: f64,
    /// `expected - observed`; positive means synergy.
    pub bliss: f64,
}

/// Optimizer budgets and acceptance thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitSettings {
    /// Evaluation budget of the first 5PL attempt.
    pub first_budget: usize,
    /// Evaluation budget of the 5PL retry.
    pub retry_budget: usize,
    /// Evaluation budget of the Hill fallback.
    pub hill_budget: usize,
    /// Minimum coefficient of determination for an attempt to count as converged.
    pub min_r_squared: f64,
    /// Points per exported fitted curve.
    pub curve_points: usize,
}

impl Default for FitSettings {
    fn default() -> Self {
        Self {
            first_budget: 500,
            retry_budget: 5000,
            hill_budget: 10_000,
            min_r_squared: 0.5,
            curve_points: 101,
        }
    }
}

/// Column names of the counts table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountColumns {
    pub id: String,
    pub count: String,
}

impl Default for CountColumns {
    fn default() -> Self {
        Self {
            id: "FileName_images".to_string(),
            count: "Count_nuclei".to_string(),
        }
    }
}

/// Single-gradient assay: two cell lines, one drug.
#[derive(Debug, Clone, PartialEq)]
pub struct GdaParams {
    /// Condition in rows B–D.
    pub upper_name: String,
    /// Condition in rows E–G.
    pub lower_name: String,
    /// Columns 3..=11.
    pub doses: DoseGradient,
}

/// Two-gradient (combination) assay.
#[derive(Debug, Clone, PartialEq)]
pub struct SynergyParams {
    pub horizontal_name: String,
    pub vertical_name: String,
    /// Columns 3..=11.
    pub horizontal: DoseGradient,
    /// Rows C–G.
    pub vertical: DoseGradient,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Experiment {
    Gda(GdaParams),
    Synergy(SynergyParams),
    Simple,
}

impl Experiment {
    pub fn label(&self) -> &'static str {
        match self {
            Experiment::Gda(_) => "GDA",
            Experiment::Synergy(_) => "synergy",
            Experiment::Simple => "simple",
        }
    }
}

/// A full run's configuration, validated at the CLI boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub title: String,
    pub counts_path: PathBuf,
    pub output_dir: PathBuf,
    pub columns: CountColumns,
    pub experiment: Experiment,
    pub fit: FitSettings,
}
