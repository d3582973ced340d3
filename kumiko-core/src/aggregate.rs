//! Public entry points running the random policy over a set of seed points.

use tracing::{info, instrument};

use crate::{
    Result,
    driver::{Aggregator, BreadthFirst, ExpansionOrder},
    error::AggregateError,
    lexicon::Lexicon,
    network::Network,
    params::AggregateParams,
    policy::RandomPolicy,
    template::TemplateId,
};

/// Assembles up to `params.max_solutions()` random networks, exploring the
/// seed points in order with a single random stream.
///
/// Identical lexicon, parameters and seed points always produce identical
/// networks.
///
/// # Errors
/// Returns [`AggregateError::InvalidParameters`] for inconsistent limits,
/// [`AggregateError::UnknownTemplate`] when a seed point is not part of the
/// lexicon, and propagates driver faults.
///
/// # Examples
/// ```
/// use kumiko_core::{AggregateParams, LexiconBuilder, SectionTemplate, random_aggregate};
///
/// let mut builder = LexiconBuilder::new();
/// let friend = builder.declare_connector_type("friend");
/// builder.register_pole_pair(friend, friend, true)?;
/// let pair = builder.register(SectionTemplate::new("pair", vec![friend, friend]))?;
/// let lexicon = builder.build()?;
///
/// let networks = random_aggregate(&lexicon, &AggregateParams::default(), &[pair])?;
/// assert_eq!(networks.len(), 1);
/// assert_eq!(networks[0].open_count(), 0);
/// # Ok::<(), kumiko_core::AggregateError>(())
/// ```
pub fn random_aggregate(
    lexicon: &Lexicon,
    params: &AggregateParams,
    seed_points: &[TemplateId],
) -> Result<Vec<Network>> {
    random_aggregate_with_order(lexicon, params, seed_points, BreadthFirst)
}

/// Same as [`random_aggregate`] with an explicit expansion order.
///
/// # Errors
/// See [`random_aggregate`].
#[instrument(
    name = "aggregate.random_aggregate",
    err,
    skip_all,
    fields(
        seeds = seed_points.len(),
        templates = lexicon.len(),
        max_solutions = params.max_solutions(),
        rng_seed = params.rng_seed(),
    ),
)]
pub fn random_aggregate_with_order<O: ExpansionOrder>(
    lexicon: &Lexicon,
    params: &AggregateParams,
    seed_points: &[TemplateId],
    order: O,
) -> Result<Vec<Network>> {
    params.validate()?;
    ensure_seed_points(lexicon, seed_points)?;

    let policy = RandomPolicy::new(lexicon, params.clone())?;
    let mut aggregator = Aggregator::new(lexicon, params.clone(), policy)?.with_order(order);
    let reports = aggregator.run(seed_points)?;
    let networks = aggregator.into_policy().into_solutions();
    info!(
        networks = networks.len(),
        seed_points_run = reports.len(),
        "aggregation finished"
    );
    Ok(networks)
}

/// Explores seed points concurrently on the Rayon pool.
///
/// Every seed point gets its own policy whose random stream is derived from
/// `params.rng_seed()` and the seed point's index, so the result does not
/// depend on scheduling. Networks are merged in seed-point order and
/// truncated to `params.max_solutions()`.
///
/// # Errors
/// See [`random_aggregate`].
#[cfg(feature = "parallel")]
#[cfg_attr(docsrs, doc(cfg(feature = "parallel")))]
pub fn random_aggregate_parallel(
    lexicon: &Lexicon,
    params: &AggregateParams,
    seed_points: &[TemplateId],
) -> Result<Vec<Network>> {
    random_aggregate_parallel_with_order(lexicon, params, seed_points, BreadthFirst)
}

/// Same as [`random_aggregate_parallel`] with an explicit expansion order,
/// cloned into every worker.
///
/// # Errors
/// See [`random_aggregate`].
#[cfg(feature = "parallel")]
#[cfg_attr(docsrs, doc(cfg(feature = "parallel")))]
#[instrument(
    name = "aggregate.random_aggregate_parallel",
    err,
    skip_all,
    fields(
        seeds = seed_points.len(),
        templates = lexicon.len(),
        max_solutions = params.max_solutions(),
        rng_seed = params.rng_seed(),
    ),
)]
pub fn random_aggregate_parallel_with_order<O>(
    lexicon: &Lexicon,
    params: &AggregateParams,
    seed_points: &[TemplateId],
    order: O,
) -> Result<Vec<Network>>
where
    O: ExpansionOrder + Clone + Send + Sync,
{
    use rand::{SeedableRng, rngs::SmallRng};
    use rayon::prelude::*;

    use crate::rng::seed_point_seed;

    params.validate()?;
    ensure_seed_points(lexicon, seed_points)?;

    let per_seed = seed_points
        .par_iter()
        .enumerate()
        .map(|(index, seed)| {
            let rng = SmallRng::seed_from_u64(seed_point_seed(params.rng_seed(), index));
            let policy = RandomPolicy::with_rng(lexicon, params.clone(), rng)?;
            let mut aggregator =
                Aggregator::new(lexicon, params.clone(), policy)?.with_order(order.clone());
            aggregator.run_seed(*seed)?;
            Ok(aggregator.into_policy().into_solutions())
        })
        .collect::<Result<Vec<Vec<Network>>>>()?;

    let networks: Vec<Network> = per_seed
        .into_iter()
        .flatten()
        .take(params.max_solutions())
        .collect();
    info!(networks = networks.len(), "parallel aggregation finished");
    Ok(networks)
}

fn ensure_seed_points(lexicon: &Lexicon, seed_points: &[TemplateId]) -> Result<()> {
    match seed_points
        .iter()
        .find(|seed| lexicon.template(**seed).is_none())
    {
        Some(seed) => Err(AggregateError::UnknownTemplate { template: *seed }),
        None => Ok(()),
    }
}
