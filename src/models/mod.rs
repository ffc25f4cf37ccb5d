//! Dose–response model implementations.
//!
//! Models are small, pure functions of `(dose, params)` so the optimizer and
//! the root finder can stay generic.

pub mod model;

pub use model::*;
