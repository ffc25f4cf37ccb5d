//! Formatted terminal output.
//!
//! Formatting lives here so the analysis modules stay free of presentation
//! concerns; the pipeline hands over a finished [`RunOutput`].

pub mod format;

pub use format::*;
