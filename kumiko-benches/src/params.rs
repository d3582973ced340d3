//! Benchmark parameter types.

use std::fmt;

/// Parameters for one aggregation benchmark case.
#[derive(Clone, Debug)]
pub struct AggregateBenchParams {
    /// Number of templates in the generated lexicon.
    pub template_count: usize,
    /// Number of seed points explored per run.
    pub seed_count: usize,
    /// Fraction of connectors that must be joined.
    pub close_fraction: f64,
}

impl fmt::Display for AggregateBenchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "templates={},seeds={},close={}",
            self.template_count, self.seed_count, self.close_fraction
        )
    }
}

/// Parameters for a lexicon construction benchmark case.
#[derive(Clone, Debug)]
pub struct LexiconBenchParams {
    /// Number of templates registered.
    pub template_count: usize,
    /// Number of connector types declared.
    pub connector_types: usize,
}

impl fmt::Display for LexiconBenchParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "templates={},types={}",
            self.template_count, self.connector_types
        )
    }
}
