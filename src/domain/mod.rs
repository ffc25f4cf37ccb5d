//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - run configuration (`RunConfig`, `Experiment`, `FitSettings`)
//! - resolved count observations (`NucleiObservation`)
//! - fit outputs (`CurveFitResult`, `FittedModel`, `FitAttempt`, etc.)
//! - synergy outputs (`SynergyCell`)

pub mod types;

pub use types::*;
