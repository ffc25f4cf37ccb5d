//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - run one bounded optimizer attempt per model (`fitter`)
//! - drive the 5PL → 5PL retry → Hill fallback state machine and extract IC50 (`selection`)
//! - sample fitted curves on log-spaced dose grids (`grid`)

pub mod fitter;
pub mod grid;
pub mod selection;

pub use fitter::*;
pub use grid::*;
pub use selection::*;
