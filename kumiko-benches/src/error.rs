//! Benchmark setup error type.

use kumiko_core::AggregateError;

use crate::source::SyntheticError;

/// Errors that may occur while preparing benchmark inputs.
#[derive(Debug, thiserror::Error)]
pub enum BenchSetupError {
    /// The synthetic lexicon configuration was rejected.
    #[error("synthetic lexicon generation failed: {0}")]
    Synthetic(#[from] SyntheticError),
    /// Building the lexicon or running the search failed.
    #[error("aggregation failed: {0}")]
    Aggregate(#[from] AggregateError),
}
