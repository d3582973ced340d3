//! Depth-first search driver with checkpointed backtracking.
//!
//! The driver owns the network and the control flow. For every unmet
//! connector it pushes a policy frame onto an explicit branch stack, asks
//! the policy for a selection, commits the resulting edge and descends. A
//! dead end below rolls the network back to the checkpoint taken before the
//! attempt, so the policy's frame-scoped caches keep describing the frontier
//! they were built from.

use tracing::{debug, instrument, warn};

use crate::{
    Result,
    connector::ConnectorRef,
    error::AggregateError,
    lexicon::Lexicon,
    network::{InstanceId, Network, NetworkCheckpoint},
    params::AggregateParams,
    policy::{AggregationPolicy, SearchState, SelectRequest, Selection},
    template::TemplateId,
};

/// Chooses which open connector the driver satisfies next.
pub trait ExpansionOrder {
    /// Returns the next unmet connector, or `None` when the frontier is empty.
    fn next_unmet(&mut self, network: &Network) -> Option<ConnectorRef>;
}

/// Satisfies the oldest open connector first.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BreadthFirst;

impl ExpansionOrder for BreadthFirst {
    fn next_unmet(&mut self, network: &Network) -> Option<ConnectorRef> {
        network.open_connectors().next()
    }
}

/// Satisfies the newest open connector first.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DepthFirst;

impl ExpansionOrder for DepthFirst {
    fn next_unmet(&mut self, network: &Network) -> Option<ConnectorRef> {
        network.open_connectors().next_back()
    }
}

/// Result of one descent.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The network met the closure threshold and was handed to the policy.
    Solved,
    /// Every attempt below this point failed.
    DeadEnd,
    /// The policy's step predicate stopped the search.
    Halted,
}

/// Summary of the search on one seed point.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SeedReport {
    /// Seed template the search started from.
    pub seed: TemplateId,
    /// Networks accepted while exploring this seed point.
    pub accepted: usize,
    /// Steps spent on this seed point.
    pub steps: usize,
    /// How the final descent ended.
    pub outcome: Outcome,
}

/// An open branch of the descent: the connector being satisfied, the
/// network state to return to, and how many selections it has tried.
#[derive(Debug)]
struct Branch {
    request: SelectRequest,
    checkpoint: NetworkCheckpoint,
    attempts: usize,
}

#[derive(Debug)]
enum Entry {
    Done(Outcome),
    Branch(SelectRequest),
}

/// Search driver pairing a lexicon with a policy and an expansion order.
///
/// After a network is accepted the seed point restarts from a fresh
/// single-instance network, so one seed point can yield several solutions.
/// A dead end at the root, or a halt from the policy, ends the seed point.
///
/// # Examples
/// ```
/// use kumiko_core::{
///     AggregateParams, AggregationPolicy, Aggregator, LexiconBuilder, ReplayPolicy, SectionTemplate, Selection,
/// };
///
/// let mut builder = LexiconBuilder::new();
/// let friend = builder.declare_connector_type("friend");
/// builder.register_pole_pair(friend, friend, true)?;
/// let single = builder.register(SectionTemplate::new("single", vec![friend]))?;
/// let lexicon = builder.build()?;
///
/// let policy = ReplayPolicy::new([Some(Selection::Fresh(single))]);
/// let mut aggregator = Aggregator::new(&lexicon, AggregateParams::default(), policy)?;
/// let report = aggregator.run_seed(single)?;
/// assert_eq!(report.accepted, 1);
/// assert_eq!(aggregator.policy().solutions()[0].edges().len(), 1);
/// # Ok::<(), kumiko_core::AggregateError>(())
/// ```
#[derive(Debug)]
pub struct Aggregator<'a, P, O = BreadthFirst> {
    lexicon: &'a Lexicon,
    params: AggregateParams,
    policy: P,
    order: O,
}

impl<'a, P: AggregationPolicy> Aggregator<'a, P> {
    /// Creates a driver expanding connectors oldest first.
    ///
    /// # Errors
    /// Returns [`AggregateError::InvalidParameters`] when `params` fail
    /// validation.
    pub fn new(lexicon: &'a Lexicon, params: AggregateParams, policy: P) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            lexicon,
            params,
            policy,
            order: BreadthFirst,
        })
    }
}

impl<'a, P, O> Aggregator<'a, P, O>
where
    P: AggregationPolicy,
    O: ExpansionOrder,
{
    /// Replaces the expansion order.
    #[must_use]
    pub fn with_order<N: ExpansionOrder>(self, order: N) -> Aggregator<'a, P, N> {
        Aggregator {
            lexicon: self.lexicon,
            params: self.params,
            policy: self.policy,
            order,
        }
    }

    /// Returns the policy driving the search.
    #[must_use]
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Consumes the driver, returning its policy.
    #[must_use]
    pub fn into_policy(self) -> P {
        self.policy
    }

    /// Searches every seed point in order until the solution cap is reached.
    ///
    /// # Errors
    /// Propagates the first error raised by [`Self::run_seed`].
    pub fn run(&mut self, seeds: &[TemplateId]) -> Result<Vec<SeedReport>> {
        let mut reports = Vec::with_capacity(seeds.len());
        for seed in seeds {
            if self.policy.solutions().len() >= self.params.max_solutions() {
                break;
            }
            reports.push(self.run_seed(*seed)?);
        }
        Ok(reports)
    }

    /// Searches from a single seed template.
    ///
    /// # Errors
    /// Returns [`AggregateError::UnknownTemplate`] when `seed` is not in the
    /// lexicon, [`AggregateError::InvalidSelection`] when the policy answers
    /// with a selection that cannot be committed, and
    /// [`AggregateError::FrameUnderflow`] when the policy's frames go out of
    /// step with the driver.
    #[instrument(name = "aggregate.run_seed", err, skip_all, fields(seed = %seed))]
    pub fn run_seed(&mut self, seed: TemplateId) -> Result<SeedReport> {
        let lexicon = self.lexicon;
        let template = lexicon
            .template(seed)
            .ok_or(AggregateError::UnknownTemplate { template: seed })?;
        let mut steps = 0;
        let mut accepted = 0;
        loop {
            let mut network = Network::new();
            network.add_instance(seed, template);
            let outcome = self.search(&mut network, &mut steps)?;
            match outcome {
                Outcome::Solved => accepted += 1,
                Outcome::DeadEnd => {
                    debug!(steps, accepted, "seed point exhausted");
                    return Ok(SeedReport {
                        seed,
                        accepted,
                        steps,
                        outcome,
                    });
                }
                Outcome::Halted => {
                    if steps > self.params.max_steps() {
                        warn!(
                            steps,
                            accepted,
                            max_steps = self.params.max_steps(),
                            "step budget exhausted on seed point"
                        );
                    }
                    return Ok(SeedReport {
                        seed,
                        accepted,
                        steps,
                        outcome,
                    });
                }
            }
        }
    }

    /// Runs one descent from the seed network.
    ///
    /// Open branches live on an explicit stack so deep searches never grow
    /// the call stack. Every branch holds one policy frame, and every frame
    /// still held when the descent ends is popped before returning.
    fn search(&mut self, network: &mut Network, steps: &mut usize) -> Result<Outcome> {
        let mut branches = Vec::new();
        let result = self.explore(network, steps, &mut branches);
        let mut unwound = Ok(());
        while branches.pop().is_some() {
            let popped = self
                .policy
                .pop_frame(&search_state(network, branches.len(), *steps));
            if unwound.is_ok() {
                unwound = popped;
            }
        }
        let outcome = result?;
        unwound?;
        Ok(outcome)
    }

    fn explore(
        &mut self,
        network: &mut Network,
        steps: &mut usize,
        branches: &mut Vec<Branch>,
    ) -> Result<Outcome> {
        loop {
            let depth = branches.len();
            let child_failed = match self.enter(network, depth, steps)? {
                Entry::Done(Outcome::DeadEnd) => true,
                Entry::Done(outcome) => return Ok(outcome),
                Entry::Branch(request) => {
                    self.policy
                        .push_frame(&search_state(network, depth, *steps));
                    branches.push(Branch {
                        request,
                        checkpoint: network.checkpoint(),
                        attempts: 0,
                    });
                    false
                }
            };
            if !self.advance(network, *steps, branches, child_failed)? {
                return Ok(Outcome::DeadEnd);
            }
        }
    }

    /// Visits the network at `depth`: counts the step, then either ends the
    /// descent here or names the connector to branch on.
    fn enter(&mut self, network: &Network, depth: usize, steps: &mut usize) -> Result<Entry> {
        *steps += 1;
        record_step();
        let state = search_state(network, depth, *steps);
        if !self.policy.step(&state) {
            return Ok(Entry::Done(Outcome::Halted));
        }
        if network.is_acceptable(self.params.close_fraction()) {
            self.policy.solution(&state);
            record_solution();
            return Ok(Entry::Done(Outcome::Solved));
        }
        if depth >= self.params.max_depth() {
            debug!(depth, "depth limit reached");
            return Ok(Entry::Done(Outcome::DeadEnd));
        }
        let Some(connector) = self.order.next_unmet(network) else {
            return Ok(Entry::Done(Outcome::DeadEnd));
        };
        let connector_type =
            network
                .connector_type(connector)
                .ok_or_else(|| AggregateError::InvalidSelection {
                    reason: format!("expansion order returned unknown connector {connector}"),
                })?;
        Ok(Entry::Branch(SelectRequest {
            connector,
            connector_type,
        }))
    }

    /// Commits the next selection on the innermost open branch, retiring
    /// branches whose attempts run out. Returns `false` once the stack is
    /// empty.
    ///
    /// `child_failed` marks that the descent below the innermost branch hit
    /// a dead end, so its edge must be rolled back first.
    fn advance(
        &mut self,
        network: &mut Network,
        steps: usize,
        branches: &mut Vec<Branch>,
        mut child_failed: bool,
    ) -> Result<bool> {
        while !branches.is_empty() {
            let depth = branches.len() - 1;
            let branch = &mut branches[depth];
            if child_failed {
                network.rollback(branch.checkpoint);
                record_rollback();
            }
            let request = branch.request;
            let mut exhausted = true;
            while branch.attempts < self.params.branch_attempts() {
                let attempt = branch.attempts;
                branch.attempts += 1;
                let state = search_state(network, depth, steps);
                let Some(selection) = self.policy.select(&state, request) else {
                    debug!(connector = %request.connector, attempt, "no selection available");
                    exhausted = false;
                    break;
                };
                if self.commit(network, request, selection)? {
                    return Ok(true);
                }
            }
            if exhausted {
                debug!(
                    connector = %request.connector,
                    attempts = self.params.branch_attempts(),
                    "branch attempts exhausted"
                );
            }
            branches.pop();
            self.policy
                .pop_frame(&search_state(network, branches.len(), steps))?;
            child_failed = true;
        }
        Ok(false)
    }

    /// Applies `selection` to the network. Returns `false` when a fresh
    /// instance is refused because the network is full.
    fn commit(
        &self,
        network: &mut Network,
        request: SelectRequest,
        selection: Selection,
    ) -> Result<bool> {
        let instance = match selection {
            Selection::Existing(instance) => {
                if instance == request.requester() && !self.params.allow_self_loops() {
                    return Err(AggregateError::InvalidSelection {
                        reason: format!("instance {instance} cannot join itself"),
                    });
                }
                instance
            }
            Selection::Fresh(template_id) => {
                if network.len() >= self.params.max_network_size() {
                    debug!(
                        template = %template_id,
                        size = network.len(),
                        "network full; fresh instance refused"
                    );
                    record_refusal();
                    return Ok(false);
                }
                let template = self
                    .lexicon
                    .template(template_id)
                    .ok_or(AggregateError::UnknownTemplate {
                        template: template_id,
                    })?;
                network.add_instance(template_id, template)
            }
        };
        let acceptor = self.acceptor_on(network, instance, request)?;
        network.connect(request.connector, acceptor)?;
        Ok(true)
    }

    /// First open connector on `instance` that the requesting connector may
    /// join.
    fn acceptor_on(
        &self,
        network: &Network,
        instance: InstanceId,
        request: SelectRequest,
    ) -> Result<ConnectorRef> {
        let section = network
            .instance(instance)
            .ok_or_else(|| AggregateError::InvalidSelection {
                reason: format!("instance {instance} is not part of the network"),
            })?;
        section
            .connectors()
            .iter()
            .enumerate()
            .map(|(slot, connector_type)| (ConnectorRef::new(instance, slot), *connector_type))
            .find(|(connector, connector_type)| {
                *connector != request.connector
                    && network.is_open(*connector)
                    && self
                        .lexicon
                        .compatible(request.connector_type, *connector_type)
            })
            .map(|(connector, _)| connector)
            .ok_or_else(|| AggregateError::InvalidSelection {
                reason: format!(
                    "instance {instance} has no open connector accepting {}",
                    request.connector_type
                ),
            })
    }
}

#[cfg(feature = "metrics")]
fn record_step() {
    metrics::counter!("kumiko_search_steps").increment(1);
}

#[cfg(not(feature = "metrics"))]
fn record_step() {}

#[cfg(feature = "metrics")]
fn record_solution() {
    metrics::counter!("kumiko_solutions_accepted").increment(1);
}

#[cfg(not(feature = "metrics"))]
fn record_solution() {}

#[cfg(feature = "metrics")]
fn record_rollback() {
    metrics::counter!("kumiko_branch_rollbacks").increment(1);
}

#[cfg(not(feature = "metrics"))]
fn record_rollback() {}

#[cfg(feature = "metrics")]
fn record_refusal() {
    metrics::counter!("kumiko_fresh_refusals").increment(1);
}

#[cfg(not(feature = "metrics"))]
fn record_refusal() {}

fn search_state(network: &Network, depth: usize, steps: usize) -> SearchState<'_> {
    SearchState {
        network,
        depth,
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::{fixture, rstest};

    use crate::{
        connector::ConnectorType,
        lexicon::LexiconBuilder,
        policy::{ReplayPolicy, ReplayRecord},
        template::SectionTemplate,
    };

    struct Friends {
        lexicon: Lexicon,
        friend: ConnectorType,
        single: TemplateId,
        double: TemplateId,
    }

    #[fixture]
    fn friends() -> Friends {
        let mut builder = LexiconBuilder::new();
        let friend = builder.declare_connector_type("friend");
        builder
            .register_pole_pair(friend, friend, true)
            .expect("friend is declared");
        let single = builder
            .register(SectionTemplate::new("single", vec![friend]))
            .expect("friend is declared");
        let double = builder
            .register(SectionTemplate::new("double", vec![friend, friend]))
            .expect("friend is declared");
        Friends {
            lexicon: builder.build().expect("lexicon builds"),
            friend,
            single,
            double,
        }
    }

    fn selects(records: &[ReplayRecord]) -> usize {
        records
            .iter()
            .filter(|record| matches!(record, ReplayRecord::Select { .. }))
            .count()
    }

    #[rstest]
    fn fresh_selection_closes_the_seed(friends: Friends) -> Result<()> {
        let policy = ReplayPolicy::new([Some(Selection::Fresh(friends.single))]);
        let mut aggregator = Aggregator::new(&friends.lexicon, AggregateParams::default(), policy)?;
        let report = aggregator.run_seed(friends.single)?;

        assert_eq!(report.accepted, 1);
        assert_eq!(report.outcome, Outcome::Halted);
        let policy = aggregator.into_policy();
        assert_eq!(
            policy.records(),
            &[
                ReplayRecord::Step {
                    steps: 1,
                    proceed: true
                },
                ReplayRecord::Push { frames: 1 },
                ReplayRecord::Select {
                    request: SelectRequest {
                        connector: ConnectorRef::new(InstanceId::new(0), 0),
                        connector_type: friends.friend,
                    },
                    depth: 0,
                    answer: Some(Selection::Fresh(friends.single)),
                },
                ReplayRecord::Step {
                    steps: 2,
                    proceed: true
                },
                ReplayRecord::Solution {
                    instances: 2,
                    edges: 1
                },
                ReplayRecord::Pop { frames: 0 },
                ReplayRecord::Step {
                    steps: 3,
                    proceed: false
                },
            ]
        );
        Ok(())
    }

    #[rstest]
    fn dead_end_is_not_an_error(friends: Friends) -> Result<()> {
        let policy = ReplayPolicy::new([None]);
        let mut aggregator = Aggregator::new(&friends.lexicon, AggregateParams::default(), policy)?;
        let report = aggregator.run_seed(friends.single)?;

        assert_eq!(report.outcome, Outcome::DeadEnd);
        assert_eq!(report.accepted, 0);
        let policy = aggregator.into_policy();
        assert!(policy.solutions().is_empty());
        assert_eq!(policy.frame_depth(), 0);
        Ok(())
    }

    #[rstest]
    fn dead_end_rolls_back_before_the_next_attempt(friends: Friends) -> Result<()> {
        let policy = ReplayPolicy::new([
            Some(Selection::Fresh(friends.double)),
            None,
            Some(Selection::Fresh(friends.single)),
        ]);
        let params = AggregateParams::default().with_branch_attempts(2);
        let mut aggregator = Aggregator::new(&friends.lexicon, params, policy)?;
        let report = aggregator.run_seed(friends.single)?;

        assert_eq!(report.accepted, 1);
        let policy = aggregator.into_policy();
        let solution = &policy.solutions()[0];
        assert_eq!(solution.len(), 2);
        assert_eq!(solution.edges().len(), 1);
        assert_eq!(
            solution.instance(InstanceId::new(1)).map(|i| i.template()),
            Some(friends.single)
        );
        Ok(())
    }

    #[rstest]
    fn nested_dead_ends_pop_their_own_frames(friends: Friends) -> Result<()> {
        let policy = ReplayPolicy::new([
            Some(Selection::Fresh(friends.double)),
            None,
            Some(Selection::Fresh(friends.single)),
        ]);
        let params = AggregateParams::default().with_branch_attempts(2);
        let mut aggregator = Aggregator::new(&friends.lexicon, params, policy)?;
        aggregator.run_seed(friends.single)?;

        let policy = aggregator.into_policy();
        let frames: Vec<_> = policy
            .records()
            .iter()
            .filter(|record| {
                matches!(record, ReplayRecord::Push { .. } | ReplayRecord::Pop { .. })
            })
            .cloned()
            .collect();
        assert_eq!(
            frames,
            [
                ReplayRecord::Push { frames: 1 },
                ReplayRecord::Push { frames: 2 },
                ReplayRecord::Pop { frames: 1 },
                ReplayRecord::Pop { frames: 0 },
            ]
        );
        let depths: Vec<_> = policy
            .records()
            .iter()
            .filter_map(|record| match record {
                ReplayRecord::Select { depth, .. } => Some(*depth),
                _ => None,
            })
            .collect();
        assert_eq!(depths, [0, 1, 0]);
        Ok(())
    }

    #[rstest]
    fn full_networks_refuse_fresh_instances(friends: Friends) -> Result<()> {
        let policy = ReplayPolicy::new([
            Some(Selection::Fresh(friends.single)),
            Some(Selection::Fresh(friends.single)),
        ]);
        let params = AggregateParams::default()
            .with_max_network_size(1)
            .with_branch_attempts(2);
        let mut aggregator = Aggregator::new(&friends.lexicon, params, policy)?;
        let report = aggregator.run_seed(friends.single)?;

        assert_eq!(report.outcome, Outcome::DeadEnd);
        let policy = aggregator.into_policy();
        assert_eq!(selects(policy.records()), 2);
        assert_eq!(policy.remaining(), 0);
        Ok(())
    }

    #[rstest]
    fn depth_limit_prunes_without_selecting(friends: Friends) -> Result<()> {
        let policy = ReplayPolicy::new([Some(Selection::Fresh(friends.single))]);
        let params = AggregateParams::default().with_max_depth(0);
        let mut aggregator = Aggregator::new(&friends.lexicon, params, policy)?;
        let report = aggregator.run_seed(friends.single)?;

        assert_eq!(report.outcome, Outcome::DeadEnd);
        assert_eq!(selects(aggregator.policy().records()), 0);
        Ok(())
    }

    #[rstest]
    fn uncommittable_selection_is_reported(friends: Friends) -> Result<()> {
        let policy = ReplayPolicy::new([Some(Selection::Existing(InstanceId::new(9)))]);
        let mut aggregator = Aggregator::new(&friends.lexicon, AggregateParams::default(), policy)?;
        let err = aggregator
            .run_seed(friends.single)
            .expect_err("missing instance must be rejected");

        assert!(matches!(err, AggregateError::InvalidSelection { .. }));
        assert_eq!(aggregator.policy().frame_depth(), 0);
        Ok(())
    }

    #[rstest]
    fn self_join_is_rejected_unless_enabled(friends: Friends) -> Result<()> {
        let script = [Some(Selection::Existing(InstanceId::new(0)))];
        let mut refused =
            Aggregator::new(&friends.lexicon, AggregateParams::default(), ReplayPolicy::new(script))?;
        assert!(matches!(
            refused.run_seed(friends.double),
            Err(AggregateError::InvalidSelection { .. })
        ));

        let params = AggregateParams::default().with_allow_self_loops(true);
        let mut allowed = Aggregator::new(&friends.lexicon, params, ReplayPolicy::new(script))?;
        let report = allowed.run_seed(friends.double)?;
        assert_eq!(report.accepted, 1);
        let edge = allowed.policy().solutions()[0].edges()[0];
        assert!(edge.is_self_loop());
        Ok(())
    }

    #[rstest]
    #[case::breadth_first(false, 0)]
    #[case::depth_first(true, 1)]
    fn expansion_order_picks_the_request(
        friends: Friends,
        #[case] newest: bool,
        #[case] slot: usize,
    ) -> Result<()> {
        let policy = ReplayPolicy::new([None]);
        let aggregator = Aggregator::new(&friends.lexicon, AggregateParams::default(), policy)?;
        let policy = if newest {
            let mut aggregator = aggregator.with_order(DepthFirst);
            aggregator.run_seed(friends.double)?;
            aggregator.into_policy()
        } else {
            let mut aggregator = aggregator;
            aggregator.run_seed(friends.double)?;
            aggregator.into_policy()
        };
        let requested = policy.records().iter().find_map(|record| match record {
            ReplayRecord::Select { request, .. } => Some(request.connector.slot),
            _ => None,
        });
        assert_eq!(requested, Some(slot));
        Ok(())
    }

    #[rstest]
    fn unknown_seed_is_rejected(friends: Friends) -> Result<()> {
        let mut aggregator = Aggregator::new(
            &friends.lexicon,
            AggregateParams::default(),
            ReplayPolicy::new([]),
        )?;
        let ghost = TemplateId::new(99);
        assert_eq!(
            aggregator.run_seed(ghost),
            Err(AggregateError::UnknownTemplate { template: ghost })
        );
        Ok(())
    }
}
