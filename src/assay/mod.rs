//! Plate-level analytics: geometry, dilution series, condition layouts,
//! vehicle normalization and Bliss synergy scoring.

pub mod gradient;
pub mod layout;
pub mod normalize;
pub mod plate;
pub mod synergy;

pub use gradient::*;
pub use layout::*;
pub use normalize::*;
pub use plate::*;
pub use synergy::*;
