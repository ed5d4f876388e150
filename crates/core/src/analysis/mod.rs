//! Site-selection analyses: pure, synchronous functions over in-memory locations.

pub mod cannibalization;
pub mod competition;
pub mod error;
pub mod evaluate;
pub mod geo;
pub mod scoring;

pub use error::AnalysisError;
