//! Search limits and policy switches for an aggregation run.

use crate::{Result, error::AggregateError, policy::SearchState};

/// Configuration for [`crate::random_aggregate`] and [`crate::Aggregator`].
///
/// # Examples
/// ```
/// use kumiko_core::AggregateParams;
///
/// let params = AggregateParams::default()
///     .with_max_solutions(3)
///     .with_close_fraction(0.5)
///     .with_rng_seed(7);
/// params.validate()?;
/// assert_eq!(params.max_solutions(), 3);
/// # Ok::<(), kumiko_core::AggregateError>(())
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct AggregateParams {
    max_solutions: usize,
    max_steps: usize,
    max_depth: usize,
    max_network_size: usize,
    close_fraction: f64,
    connect_existing: bool,
    allow_self_loops: bool,
    branch_attempts: usize,
    rng_seed: u64,
}

impl Default for AggregateParams {
    fn default() -> Self {
        Self {
            max_solutions: 1,
            max_steps: 10_000,
            max_depth: 512,
            max_network_size: 64,
            close_fraction: 1.0,
            connect_existing: true,
            allow_self_loops: false,
            branch_attempts: 4,
            rng_seed: 0x5EED_CAFE,
        }
    }
}

impl AggregateParams {
    /// Stops the search once this many networks have been accepted.
    #[must_use]
    pub fn with_max_solutions(mut self, max_solutions: usize) -> Self {
        self.max_solutions = max_solutions;
        self
    }

    /// Caps the number of search steps spent on one seed point.
    #[must_use]
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Caps the search depth, which equals the number of edges committed
    /// along the current branch.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Caps the number of section instances in one network.
    #[must_use]
    pub fn with_max_network_size(mut self, max_network_size: usize) -> Self {
        self.max_network_size = max_network_size;
        self
    }

    /// Sets the fraction of connectors that must be joined before a network
    /// is accepted.
    #[must_use]
    pub fn with_close_fraction(mut self, close_fraction: f64) -> Self {
        self.close_fraction = close_fraction;
        self
    }

    /// Enables or disables reuse of open connectors before drawing fresh
    /// templates.
    #[must_use]
    pub fn with_connect_existing(mut self, connect_existing: bool) -> Self {
        self.connect_existing = connect_existing;
        self
    }

    /// Permits edges joining two connectors of the same instance.
    #[must_use]
    pub fn with_allow_self_loops(mut self, allow_self_loops: bool) -> Self {
        self.allow_self_loops = allow_self_loops;
        self
    }

    /// Sets how many selections the driver tries for one connector before it
    /// declares the branch a dead end.
    #[must_use]
    pub fn with_branch_attempts(mut self, branch_attempts: usize) -> Self {
        self.branch_attempts = branch_attempts;
        self
    }

    /// Seeds the random stream so runs are reproducible.
    #[must_use]
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = seed;
        self
    }

    /// Maximum number of accepted networks.
    #[must_use]
    pub fn max_solutions(&self) -> usize {
        self.max_solutions
    }

    /// Step budget per seed point.
    #[must_use]
    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Maximum search depth.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Maximum number of instances per network.
    #[must_use]
    pub fn max_network_size(&self) -> usize {
        self.max_network_size
    }

    /// Fraction of connectors that must be joined for acceptance.
    #[must_use]
    pub fn close_fraction(&self) -> f64 {
        self.close_fraction
    }

    /// Whether open-connector reuse is configured.
    #[must_use]
    pub fn connect_existing(&self) -> bool {
        self.connect_existing
    }

    /// Whether self-loops are permitted.
    #[must_use]
    pub fn allow_self_loops(&self) -> bool {
        self.allow_self_loops
    }

    /// Selections tried per connector before backtracking.
    #[must_use]
    pub fn branch_attempts(&self) -> usize {
        self.branch_attempts
    }

    /// Seed for the random stream.
    #[must_use]
    pub fn rng_seed(&self) -> u64 {
        self.rng_seed
    }

    /// Decides whether reuse is attempted for the current search state.
    /// Reuse is forced once the network is full, since no fresh instance
    /// could be placed anyway.
    #[must_use]
    pub fn connect_existing_for(&self, state: &SearchState<'_>) -> bool {
        self.connect_existing || state.network.len() >= self.max_network_size
    }

    /// Step predicate shared by the built-in policies: the search continues
    /// while fewer than `max_solutions` networks were accepted and the step
    /// budget of the current seed point is not spent.
    #[must_use]
    pub fn should_continue(&self, state: &SearchState<'_>, solutions: usize) -> bool {
        solutions < self.max_solutions && state.steps <= self.max_steps
    }

    /// Checks every limit for consistency.
    ///
    /// # Errors
    /// Returns [`AggregateError::InvalidParameters`] when `max_solutions`,
    /// `max_network_size` or `branch_attempts` is zero, or when
    /// `close_fraction` lies outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if self.max_solutions == 0 {
            return Err(AggregateError::InvalidParameters {
                reason: "max_solutions must be greater than zero".into(),
            });
        }
        if self.max_network_size == 0 {
            return Err(AggregateError::InvalidParameters {
                reason: "max_network_size must be greater than zero".into(),
            });
        }
        if self.branch_attempts == 0 {
            return Err(AggregateError::InvalidParameters {
                reason: "branch_attempts must be greater than zero".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.close_fraction) {
            return Err(AggregateError::InvalidParameters {
                reason: format!(
                    "close_fraction ({}) must lie within [0, 1]",
                    self.close_fraction
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[test]
    fn defaults_are_valid() {
        let params = AggregateParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.max_solutions(), 1);
        assert!(params.connect_existing());
        assert!(!params.allow_self_loops());
    }

    #[rstest]
    #[case::no_solutions(AggregateParams::default().with_max_solutions(0))]
    #[case::empty_networks(AggregateParams::default().with_max_network_size(0))]
    #[case::no_attempts(AggregateParams::default().with_branch_attempts(0))]
    #[case::fraction_above(AggregateParams::default().with_close_fraction(1.5))]
    #[case::fraction_below(AggregateParams::default().with_close_fraction(-0.1))]
    #[case::fraction_nan(AggregateParams::default().with_close_fraction(f64::NAN))]
    fn invalid_parameters_are_rejected(#[case] params: AggregateParams) {
        let err = params.validate().expect_err("parameters must be rejected");
        assert!(matches!(err, AggregateError::InvalidParameters { .. }));
    }
}
