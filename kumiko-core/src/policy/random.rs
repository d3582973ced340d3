//! Weighted random selection policy.
//!
//! Reuse of open connectors is tried first when enabled; otherwise, or when
//! nothing in the frontier fits, a fresh template is drawn from the lexicon
//! according to its weights. Open-connector distributions live in the frame
//! stack because the frontier differs per branch. Lexicon distributions only
//! depend on the lexicon, so they are cached once for the whole run.

use std::collections::HashMap;

use rand::{
    SeedableRng,
    distributions::{Distribution, WeightedIndex},
    rngs::SmallRng,
};
use tracing::{debug, info};

use crate::{
    Result,
    connector::ConnectorType,
    frame::FrameStack,
    lexicon::Lexicon,
    network::{InstanceId, Network},
    params::AggregateParams,
    template::TemplateId,
};

use super::{AggregationPolicy, SearchState, SelectRequest, Selection};

/// Open instances able to accept a connector type, one entry per compatible
/// open connector, with a uniform distribution when there is a real choice.
#[derive(Clone, Debug)]
pub(crate) struct OpenChoice {
    candidates: Vec<InstanceId>,
    distribution: Option<WeightedIndex<f64>>,
}

impl OpenChoice {
    fn collect(lexicon: &Lexicon, network: &Network, request: SelectRequest) -> Self {
        let candidates: Vec<InstanceId> = lexicon
            .mates(request.connector_type)
            .iter()
            .flat_map(|mate| network.open_of_type(*mate))
            .filter(|connector| *connector != request.connector)
            .map(|connector| connector.instance)
            .collect();
        // Reused instances carry no weight annotation, so every open
        // candidate counts equally.
        let distribution = if candidates.len() > 1 {
            WeightedIndex::new(vec![1.0_f64; candidates.len()]).ok()
        } else {
            None
        };
        Self {
            candidates,
            distribution,
        }
    }
}

/// Lexicon templates able to accept a connector type, weighted by their
/// annotations. `distribution` is `None` when no template carries mass.
#[derive(Clone, Debug)]
struct LexiconChoice {
    candidates: Vec<TemplateId>,
    distribution: Option<WeightedIndex<f64>>,
}

impl LexiconChoice {
    fn collect(lexicon: &Lexicon, connector_type: ConnectorType) -> Self {
        let candidates = lexicon.candidates(connector_type).to_vec();
        let weights: Vec<f64> = candidates
            .iter()
            .map(|template| lexicon.weight(*template).unwrap_or(0.0))
            .collect();
        let distribution = WeightedIndex::new(&weights).ok();
        if distribution.is_none() && !candidates.is_empty() {
            debug!(
                connector_type = %connector_type,
                candidates = candidates.len(),
                "no candidate template carries weight; type is never drawn"
            );
        }
        Self {
            candidates,
            distribution,
        }
    }
}

/// Production policy drawing from one seedable random stream.
///
/// The open-connector cache is keyed by connector type within the active
/// frame, which matches the driver's contract of one request per frame.
///
/// # Examples
/// ```
/// use kumiko_core::{AggregateParams, LexiconBuilder, RandomPolicy, SectionTemplate};
///
/// let mut builder = LexiconBuilder::new();
/// let friend = builder.declare_connector_type("friend");
/// builder.register_pole_pair(friend, friend, true)?;
/// builder.register(SectionTemplate::new("person", vec![friend, friend]))?;
/// let lexicon = builder.build()?;
///
/// let policy = RandomPolicy::new(&lexicon, AggregateParams::default())?;
/// assert_eq!(policy.frame_depth(), 0);
/// # Ok::<(), kumiko_core::AggregateError>(())
/// ```
#[derive(Debug)]
pub struct RandomPolicy<'a> {
    lexicon: &'a Lexicon,
    params: AggregateParams,
    rng: SmallRng,
    open_cache: FrameStack<OpenChoice>,
    lexicon_cache: HashMap<ConnectorType, LexiconChoice>,
    solutions: Vec<Network>,
}

impl<'a> RandomPolicy<'a> {
    /// Creates a policy whose random stream is seeded from
    /// [`AggregateParams::rng_seed`].
    ///
    /// # Errors
    /// Returns [`crate::AggregateError::InvalidParameters`] when `params`
    /// fail validation.
    pub fn new(lexicon: &'a Lexicon, params: AggregateParams) -> Result<Self> {
        let rng = SmallRng::seed_from_u64(params.rng_seed());
        Self::with_rng(lexicon, params, rng)
    }

    /// Creates a policy drawing from an explicitly supplied random stream.
    ///
    /// # Errors
    /// Returns [`crate::AggregateError::InvalidParameters`] when `params`
    /// fail validation.
    pub fn with_rng(lexicon: &'a Lexicon, params: AggregateParams, rng: SmallRng) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            lexicon,
            params,
            rng,
            open_cache: FrameStack::default(),
            lexicon_cache: HashMap::new(),
            solutions: Vec::new(),
        })
    }

    /// Parameters this policy was created with.
    #[must_use]
    pub fn params(&self) -> &AggregateParams {
        &self.params
    }

    /// Number of frames currently pushed.
    #[must_use]
    pub fn frame_depth(&self) -> usize {
        self.open_cache.depth()
    }

    /// Open candidates cached for `connector_type` in the active frame.
    #[must_use]
    pub fn open_candidates(&self, connector_type: ConnectorType) -> Option<&[InstanceId]> {
        self.open_cache
            .get(connector_type)
            .map(|choice| choice.candidates.as_slice())
    }

    /// Consumes the policy, returning the accepted networks.
    #[must_use]
    pub fn into_solutions(self) -> Vec<Network> {
        self.solutions
    }

    fn select_from_open(
        &mut self,
        state: &SearchState<'_>,
        request: SelectRequest,
    ) -> Option<InstanceId> {
        let lexicon = self.lexicon;
        let network = state.network;
        let choice = self
            .open_cache
            .get_or_insert_with(request.connector_type, || {
                OpenChoice::collect(lexicon, network, request)
            });
        let requester = request.requester();
        let allow_self = self.params.allow_self_loops();

        match choice.candidates.as_slice() {
            [] => None,
            [only] => (allow_self || *only != requester).then_some(*only),
            candidates => {
                // The redraw loop below only terminates because a non-self
                // candidate is known to exist.
                if !allow_self && candidates.iter().all(|candidate| *candidate == requester) {
                    return None;
                }
                let distribution = choice.distribution.as_ref()?;
                loop {
                    let pick = candidates.get(distribution.sample(&mut self.rng)).copied()?;
                    if allow_self || pick != requester {
                        return Some(pick);
                    }
                }
            }
        }
    }

    fn select_from_lexicon(&mut self, connector_type: ConnectorType) -> Option<TemplateId> {
        let lexicon = self.lexicon;
        let choice = self
            .lexicon_cache
            .entry(connector_type)
            .or_insert_with(|| LexiconChoice::collect(lexicon, connector_type));
        let distribution = choice.distribution.as_ref()?;
        choice
            .candidates
            .get(distribution.sample(&mut self.rng))
            .copied()
    }
}

impl AggregationPolicy for RandomPolicy<'_> {
    fn select(&mut self, state: &SearchState<'_>, request: SelectRequest) -> Option<Selection> {
        if self.params.connect_existing_for(state) {
            if let Some(instance) = self.select_from_open(state, request) {
                return Some(Selection::Existing(instance));
            }
        }
        if state.network.len() >= self.params.max_network_size() {
            debug!(
                connector = %request.connector,
                size = state.network.len(),
                "network is full and no open connector fits"
            );
            return None;
        }
        self.select_from_lexicon(request.connector_type)
            .map(Selection::Fresh)
    }

    fn push_frame(&mut self, _state: &SearchState<'_>) {
        self.open_cache.push();
    }

    fn pop_frame(&mut self, _state: &SearchState<'_>) -> Result<()> {
        self.open_cache.pop()
    }

    fn step(&mut self, state: &SearchState<'_>) -> bool {
        self.params.should_continue(state, self.solutions.len())
    }

    fn solution(&mut self, state: &SearchState<'_>) {
        info!(
            instances = state.network.len(),
            edges = state.network.edges().len(),
            open = state.network.open_count(),
            steps = state.steps,
            "network accepted"
        );
        self.solutions.push(state.network.clone());
    }

    fn solutions(&self) -> &[Network] {
        &self.solutions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    use crate::{
        connector::ConnectorRef,
        error::AggregateError,
        lexicon::{DEFAULT_WEIGHT_KEY, LexiconBuilder},
        template::SectionTemplate,
    };

    /// Upper bound of the chi-squared distribution with one degree of
    /// freedom at p = 0.01.
    const CHI_SQUARED_1DOF_P01: f64 = 6.635;

    struct Fixture {
        lexicon: Lexicon,
        donor: ConnectorType,
        acceptor: ConnectorType,
        seed: TemplateId,
        light: TemplateId,
        heavy: TemplateId,
    }

    fn weighted_fixture(light_weight: Option<f64>, heavy_weight: Option<f64>) -> Result<Fixture> {
        let mut builder = LexiconBuilder::new();
        let donor = builder.declare_connector_type("donor");
        let acceptor = builder.declare_connector_type("acceptor");
        builder.register_pole_pair(donor, acceptor, false)?;
        let seed = builder.register(SectionTemplate::new("seed", vec![donor, donor]))?;
        let light = builder.register_unweighted(SectionTemplate::new("light", vec![acceptor]))?;
        let heavy = builder.register_unweighted(SectionTemplate::new("heavy", vec![acceptor]))?;
        if let Some(weight) = light_weight {
            builder.annotate(light, DEFAULT_WEIGHT_KEY, weight)?;
        }
        if let Some(weight) = heavy_weight {
            builder.annotate(heavy, DEFAULT_WEIGHT_KEY, weight)?;
        }
        Ok(Fixture {
            lexicon: builder.build()?,
            donor,
            acceptor,
            seed,
            light,
            heavy,
        })
    }

    fn seeded_network(lexicon: &Lexicon, template: TemplateId) -> Result<Network> {
        let mut network = Network::new();
        let section = lexicon
            .template(template)
            .ok_or(AggregateError::UnknownTemplate { template })?;
        network.add_instance(template, section);
        Ok(network)
    }

    fn state(network: &Network) -> SearchState<'_> {
        SearchState {
            network,
            depth: 0,
            steps: 1,
        }
    }

    fn request(network: &Network, instance: usize, slot: usize) -> SelectRequest {
        let connector = ConnectorRef::new(InstanceId::new(instance), slot);
        let connector_type = network
            .connector_type(connector)
            .unwrap_or(ConnectorType::new(u32::MAX));
        SelectRequest {
            connector,
            connector_type,
        }
    }

    #[test]
    fn lexicon_draws_follow_template_weights() -> Result<()> {
        let fixture = weighted_fixture(Some(1.0), Some(3.0))?;
        let network = seeded_network(&fixture.lexicon, fixture.seed)?;
        let params = AggregateParams::default()
            .with_connect_existing(false)
            .with_rng_seed(42);
        let mut policy = RandomPolicy::new(&fixture.lexicon, params)?;
        let view = state(&network);
        let ask = request(&network, 0, 0);

        const DRAWS: u32 = 10_000;
        let mut heavy = 0_u32;
        for _ in 0..DRAWS {
            match policy.select(&view, ask) {
                Some(Selection::Fresh(template)) if template == fixture.heavy => heavy += 1,
                Some(Selection::Fresh(template)) => assert_eq!(template, fixture.light),
                other => panic!("unexpected selection: {other:?}"),
            }
        }

        let observed = [f64::from(DRAWS - heavy), f64::from(heavy)];
        let expected = [f64::from(DRAWS) * 0.25, f64::from(DRAWS) * 0.75];
        let chi_squared: f64 = observed
            .iter()
            .zip(expected)
            .map(|(obs, exp)| (obs - exp).powi(2) / exp)
            .sum();
        assert!(
            chi_squared < CHI_SQUARED_1DOF_P01,
            "chi-squared {chi_squared} rejects the 1:3 ratio (heavy={heavy})"
        );
        Ok(())
    }

    #[rstest]
    #[case::all_absent(None, None)]
    #[case::all_zero(Some(0.0), Some(0.0))]
    fn zero_mass_never_selects(
        #[case] light: Option<f64>,
        #[case] heavy: Option<f64>,
    ) -> Result<()> {
        let fixture = weighted_fixture(light, heavy)?;
        let network = seeded_network(&fixture.lexicon, fixture.seed)?;
        let mut policy = RandomPolicy::new(&fixture.lexicon, AggregateParams::default())?;
        assert_eq!(policy.select(&state(&network), request(&network, 0, 0)), None);
        Ok(())
    }

    #[test]
    fn zero_weight_templates_are_skipped() -> Result<()> {
        let fixture = weighted_fixture(Some(0.0), Some(2.0))?;
        let network = seeded_network(&fixture.lexicon, fixture.seed)?;
        let mut policy = RandomPolicy::new(&fixture.lexicon, AggregateParams::default())?;
        for _ in 0..100 {
            assert_eq!(
                policy.select(&state(&network), request(&network, 0, 0)),
                Some(Selection::Fresh(fixture.heavy))
            );
        }
        Ok(())
    }

    #[test]
    fn no_candidates_and_empty_frontier_is_a_dead_end() -> Result<()> {
        let fixture = weighted_fixture(Some(1.0), Some(1.0))?;
        let network = seeded_network(&fixture.lexicon, fixture.light)?;
        let mut policy = RandomPolicy::new(&fixture.lexicon, AggregateParams::default())?;
        let ask = request(&network, 0, 0);
        assert_eq!(ask.connector_type, fixture.acceptor);
        assert!(fixture.lexicon.candidates(fixture.acceptor).is_empty());
        assert_eq!(policy.select(&state(&network), ask), None);
        Ok(())
    }

    #[test]
    fn self_only_candidates_fall_back_to_the_lexicon() -> Result<()> {
        let mut builder = LexiconBuilder::new();
        let friend = builder.declare_connector_type("friend");
        builder.register_pole_pair(friend, friend, true)?;
        let person = builder.register(SectionTemplate::new("person", vec![friend, friend]))?;
        let lexicon = builder.build()?;
        let network = seeded_network(&lexicon, person)?;
        let mut policy = RandomPolicy::new(&lexicon, AggregateParams::default())?;
        policy.push_frame(&state(&network));

        let selection = policy.select(&state(&network), request(&network, 0, 0));
        assert_eq!(selection, Some(Selection::Fresh(person)));
        assert_eq!(
            policy.open_candidates(friend),
            Some([InstanceId::new(0)].as_slice())
        );
        Ok(())
    }

    #[rstest]
    #[case::self_loops_disallowed(false)]
    #[case::self_loops_allowed(true)]
    fn reuse_respects_the_self_loop_rule(#[case] allow_self: bool) -> Result<()> {
        let mut builder = LexiconBuilder::new();
        let friend = builder.declare_connector_type("friend");
        builder.register_pole_pair(friend, friend, true)?;
        let person =
            builder.register(SectionTemplate::new("person", vec![friend, friend, friend]))?;
        let lexicon = builder.build()?;
        let mut network = seeded_network(&lexicon, person)?;
        let section = lexicon
            .template(person)
            .ok_or(AggregateError::UnknownTemplate { template: person })?;
        network.add_instance(person, section);

        let params = AggregateParams::default()
            .with_allow_self_loops(allow_self)
            .with_rng_seed(9);
        let mut policy = RandomPolicy::new(&lexicon, params)?;
        policy.push_frame(&state(&network));
        let mut saw_self = false;
        for _ in 0..200 {
            match policy.select(&state(&network), request(&network, 0, 0)) {
                Some(Selection::Existing(instance)) => {
                    saw_self |= instance == InstanceId::new(0);
                }
                other => panic!("expected reuse, got {other:?}"),
            }
        }
        assert_eq!(saw_self, allow_self);
        Ok(())
    }

    #[test]
    fn pop_frame_restores_the_open_cache() -> Result<()> {
        let mut builder = LexiconBuilder::new();
        let friend = builder.declare_connector_type("friend");
        builder.register_pole_pair(friend, friend, true)?;
        let person = builder.register(SectionTemplate::new("person", vec![friend, friend]))?;
        let lexicon = builder.build()?;
        let mut network = seeded_network(&lexicon, person)?;
        let section = lexicon
            .template(person)
            .ok_or(AggregateError::UnknownTemplate { template: person })?;
        network.add_instance(person, section);
        let mut policy = RandomPolicy::new(&lexicon, AggregateParams::default())?;

        policy.push_frame(&state(&network));
        policy.select(&state(&network), request(&network, 0, 0));
        let cached = |policy: &RandomPolicy<'_>| {
            policy
                .open_cache
                .active()
                .iter()
                .map(|(key, choice)| (*key, choice.candidates.clone()))
                .collect::<Vec<_>>()
        };
        let before = cached(&policy);
        assert_eq!(before.len(), 1);

        policy.push_frame(&state(&network));
        assert!(policy.open_candidates(friend).is_none());
        policy.select(&state(&network), request(&network, 1, 1));
        policy.pop_frame(&state(&network))?;

        assert_eq!(cached(&policy), before);
        policy.pop_frame(&state(&network))?;
        assert_eq!(
            policy.pop_frame(&state(&network)),
            Err(AggregateError::FrameUnderflow)
        );
        Ok(())
    }

    #[test]
    fn lexicon_cache_survives_frame_changes() -> Result<()> {
        let fixture = weighted_fixture(Some(1.0), Some(3.0))?;
        let network = seeded_network(&fixture.lexicon, fixture.seed)?;
        let params = AggregateParams::default().with_rng_seed(77);
        let first = request(&network, 0, 0);
        let second = request(&network, 0, 1);
        let cached = |policy: &RandomPolicy<'_>| {
            policy
                .lexicon_cache
                .get(&fixture.donor)
                .map(|choice| choice.candidates.clone())
        };

        let mut framed = RandomPolicy::new(&fixture.lexicon, params.clone())?;
        framed.select(&state(&network), first);
        let before = cached(&framed);
        assert_eq!(fixture.lexicon.candidates(fixture.donor).len(), 2);
        assert_eq!(
            before.as_deref(),
            Some(fixture.lexicon.candidates(fixture.donor))
        );
        framed.push_frame(&state(&network));
        framed.select(&state(&network), second);
        framed.pop_frame(&state(&network))?;
        assert_eq!(cached(&framed), before);
        assert_eq!(framed.lexicon_cache.len(), 1);

        let mut flat = RandomPolicy::new(&fixture.lexicon, params)?;
        flat.select(&state(&network), first);
        flat.select(&state(&network), second);

        let draws = |policy: &mut RandomPolicy<'_>| {
            (0..32)
                .map(|_| policy.select(&state(&network), first))
                .collect::<Vec<_>>()
        };
        let framed_draws = draws(&mut framed);
        assert!(
            framed_draws
                .iter()
                .all(|draw| matches!(draw, Some(Selection::Fresh(_))))
        );
        assert_eq!(framed_draws, draws(&mut flat));
        Ok(())
    }

    #[test]
    fn identical_seeds_draw_identical_sequences() -> Result<()> {
        let fixture = weighted_fixture(Some(1.0), Some(1.0))?;
        let network = seeded_network(&fixture.lexicon, fixture.seed)?;
        let params = AggregateParams::default().with_rng_seed(1234);
        let mut left = RandomPolicy::new(&fixture.lexicon, params.clone())?;
        let mut right = RandomPolicy::new(&fixture.lexicon, params)?;
        for _ in 0..64 {
            let ask = request(&network, 0, 1);
            assert_eq!(
                left.select(&state(&network), ask),
                right.select(&state(&network), ask)
            );
        }
        assert_eq!(request(&network, 0, 1).connector_type, fixture.donor);
        Ok(())
    }

    #[test]
    fn step_stops_at_the_solution_cap() -> Result<()> {
        let fixture = weighted_fixture(Some(1.0), Some(1.0))?;
        let network = seeded_network(&fixture.lexicon, fixture.light)?;
        let params = AggregateParams::default().with_max_solutions(1);
        let mut policy = RandomPolicy::new(&fixture.lexicon, params)?;
        assert!(policy.step(&state(&network)));
        policy.solution(&state(&network));
        assert!(!policy.step(&state(&network)));
        assert_eq!(policy.into_solutions(), vec![network]);
        Ok(())
    }
}
