//! Benchmark support crate for kumiko.
//!
//! Generates synthetic lexicons of configurable size and connectivity for
//! the Criterion benchmarks covering lexicon construction and the random
//! aggregation search.

pub mod error;
pub mod params;
pub mod source;
