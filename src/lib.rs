//! `viability-curves` library crate.
//!
//! The binary (`vcurve`) is a thin wrapper around this library so that:
//!
//! - the assay analytics are testable without spawning processes
//! - plate geometry, fitting and Bliss scoring are reusable on their own
//! - I/O and presentation stay at the edges

pub mod app;
pub mod assay;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod logging;
pub mod math;
pub mod models;
pub mod report;
