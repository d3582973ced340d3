//! Kumiko core library: weighted random assembly of section networks.
//!
//! A [`Lexicon`] holds section templates whose typed connectors may join
//! according to a pole table. [`random_aggregate`] grows networks from seed
//! templates by repeatedly satisfying an open connector, either by reusing an
//! open connector already in the network or by placing a fresh instance drawn
//! by weight, and backtracks out of dead ends.
#![cfg_attr(docsrs, feature(doc_cfg))]

mod aggregate;
mod connector;
mod driver;
mod error;
mod frame;
mod lexicon;
mod network;
mod params;
mod policy;
#[cfg(feature = "parallel")]
mod rng;
mod template;

#[cfg(test)]
mod test_utils;

#[cfg(feature = "parallel")]
pub use crate::aggregate::{random_aggregate_parallel, random_aggregate_parallel_with_order};
pub use crate::{
    aggregate::{random_aggregate, random_aggregate_with_order},
    connector::{ConnectorRef, ConnectorType, PoleTable},
    driver::{Aggregator, BreadthFirst, DepthFirst, ExpansionOrder, Outcome, SeedReport},
    error::{AggregateError, AggregateErrorCode, Result},
    lexicon::{DEFAULT_WEIGHT, DEFAULT_WEIGHT_KEY, Lexicon, LexiconBuilder},
    network::{Edge, InstanceId, Network, SectionInstance},
    params::AggregateParams,
    policy::{
        AggregationPolicy, RandomPolicy, ReplayPolicy, ReplayRecord, SearchState, SelectRequest,
        Selection,
    },
    template::{SectionTemplate, TemplateId},
};
