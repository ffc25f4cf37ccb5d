//! Numerical building blocks: linear and nonlinear least squares, root
//! finding and sample statistics.

pub mod lm;
pub mod ols;
pub mod root;
pub mod stats;

pub use lm::*;
pub use ols::*;
pub use root::*;
pub use stats::*;
