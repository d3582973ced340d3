//! Selection policies consulted by the search driver.
//!
//! The driver owns the network and the control flow; a policy only answers
//! "attach this next" or "nothing fits here", keeps its own branch-local
//! caches in step with the driver's frames, and collects accepted networks.

mod random;
mod replay;

pub use self::{
    random::RandomPolicy,
    replay::{ReplayPolicy, ReplayRecord},
};

use crate::{
    Result,
    connector::{ConnectorRef, ConnectorType},
    network::{InstanceId, Network},
    template::TemplateId,
};

/// Read-only view of the driver's position in the search.
#[derive(Clone, Copy, Debug)]
pub struct SearchState<'n> {
    /// Network as currently assembled.
    pub network: &'n Network,
    /// Edges committed along the current branch.
    pub depth: usize,
    /// Steps taken on the current seed point, including the current one.
    pub steps: usize,
}

/// The unmet connector the driver wants satisfied.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SelectRequest {
    /// Open connector acting as the donor of the next edge.
    pub connector: ConnectorRef,
    /// Type of [`Self::connector`].
    pub connector_type: ConnectorType,
}

impl SelectRequest {
    /// Instance holding the requesting connector.
    #[must_use]
    pub fn requester(&self) -> InstanceId {
        self.connector.instance
    }
}

/// A policy's answer to a [`SelectRequest`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Selection {
    /// Join an open connector on an instance already in the network.
    Existing(InstanceId),
    /// Place a fresh instance of the template and join one of its connectors.
    Fresh(TemplateId),
}

/// Capability interface between the search driver and a selection strategy.
pub trait AggregationPolicy {
    /// Chooses what to attach to `request`, or `None` when this branch is a
    /// dead end.
    fn select(&mut self, state: &SearchState<'_>, request: SelectRequest) -> Option<Selection>;

    /// Called on entering a speculative branch.
    fn push_frame(&mut self, state: &SearchState<'_>);

    /// Called on leaving the branch opened by the matching
    /// [`Self::push_frame`].
    ///
    /// # Errors
    /// Returns [`crate::AggregateError::FrameUnderflow`] when no frame is
    /// left to pop.
    fn pop_frame(&mut self, state: &SearchState<'_>) -> Result<()>;

    /// Called before every search step; `false` halts the current seed point.
    fn step(&mut self, state: &SearchState<'_>) -> bool;

    /// Records an accepted network.
    fn solution(&mut self, state: &SearchState<'_>);

    /// Networks accepted so far, in acceptance order.
    fn solutions(&self) -> &[Network];
}
