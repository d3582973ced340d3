//! The network under construction: placed section instances, edges, and the
//! open-connector frontier.
//!
//! Instances and edges are append-only. The driver undoes speculative work by
//! truncating back to a [`NetworkCheckpoint`], which also restores every
//! connector the discarded edges had closed.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::Arc,
};

use crate::{
    Result,
    connector::{ConnectorRef, ConnectorType},
    error::AggregateError,
    template::{SectionTemplate, TemplateId},
};

/// Identity of one placed section instance, allocated in placement order.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct InstanceId(usize);

impl InstanceId {
    /// Wraps a raw placement index.
    #[must_use]
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    /// Returns the raw placement index.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// One concrete use of a template inside a network.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SectionInstance {
    id: InstanceId,
    template: TemplateId,
    label: Arc<str>,
    connectors: Vec<ConnectorType>,
}

impl SectionInstance {
    /// Returns the instance identity.
    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Returns the template this instance was drawn from.
    #[must_use]
    pub fn template(&self) -> TemplateId {
        self.template
    }

    /// Returns the template label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the connector types in slot order.
    #[must_use]
    pub fn connectors(&self) -> &[ConnectorType] {
        &self.connectors
    }
}

/// Pairing of a donor connector with an acceptor connector.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Edge {
    /// Connector that requested the join.
    pub donor: ConnectorRef,
    /// Connector the donor was joined to.
    pub acceptor: ConnectorRef,
}

impl Edge {
    /// Returns `true` when both endpoints sit on the same instance.
    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.donor.instance == self.acceptor.instance
    }
}

/// Marker for [`Network::rollback`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NetworkCheckpoint {
    instances: usize,
    edges: usize,
}

/// A partial or complete assembly of section instances.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Network {
    instances: Vec<SectionInstance>,
    edges: Vec<Edge>,
    open: BTreeSet<ConnectorRef>,
    open_by_type: BTreeMap<ConnectorType, BTreeSet<ConnectorRef>>,
    connector_count: usize,
}

impl Network {
    /// Creates an empty network.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the placed instances in placement order.
    #[must_use]
    pub fn instances(&self) -> &[SectionInstance] {
        &self.instances
    }

    /// Resolves an instance identity.
    #[must_use]
    pub fn instance(&self, id: InstanceId) -> Option<&SectionInstance> {
        self.instances.get(id.get())
    }

    /// Returns the committed edges in commit order.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Number of placed instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Returns `true` when no instance has been placed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Total number of connector slots across all instances.
    #[must_use]
    pub fn connector_count(&self) -> usize {
        self.connector_count
    }

    /// Number of connectors not yet joined.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Iterates over open connectors, oldest first.
    pub fn open_connectors(&self) -> impl DoubleEndedIterator<Item = ConnectorRef> + '_ {
        self.open.iter().copied()
    }

    /// Iterates over open connectors of `connector_type`, oldest first.
    pub fn open_of_type(
        &self,
        connector_type: ConnectorType,
    ) -> impl Iterator<Item = ConnectorRef> + '_ {
        self.open_by_type
            .get(&connector_type)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Returns `true` while `connector` is unjoined.
    #[must_use]
    pub fn is_open(&self, connector: ConnectorRef) -> bool {
        self.open.contains(&connector)
    }

    /// Returns the type of the connector at `connector`.
    #[must_use]
    pub fn connector_type(&self, connector: ConnectorRef) -> Option<ConnectorType> {
        self.instance(connector.instance)
            .and_then(|instance| instance.connectors.get(connector.slot).copied())
    }

    /// Fraction of connector slots that have been joined. An empty network
    /// counts as fully closed.
    #[must_use]
    pub fn closed_fraction(&self) -> f64 {
        if self.connector_count == 0 {
            return 1.0;
        }
        let closed = self.connector_count - self.open.len();
        closed as f64 / self.connector_count as f64
    }

    /// Returns `true` once at least `close_fraction` of the connectors have
    /// been joined.
    #[must_use]
    pub fn is_acceptable(&self, close_fraction: f64) -> bool {
        self.open.is_empty() || self.closed_fraction() >= close_fraction
    }

    pub(crate) fn add_instance(
        &mut self,
        template_id: TemplateId,
        template: &SectionTemplate,
    ) -> InstanceId {
        let id = InstanceId::new(self.instances.len());
        for (slot, connector_type) in template.connectors().iter().enumerate() {
            self.mark_open(ConnectorRef::new(id, slot), *connector_type);
        }
        self.connector_count += template.arity();
        self.instances.push(SectionInstance {
            id,
            template: template_id,
            label: template.shared_label(),
            connectors: template.connectors().to_vec(),
        });
        id
    }

    pub(crate) fn connect(&mut self, donor: ConnectorRef, acceptor: ConnectorRef) -> Result<()> {
        if donor == acceptor {
            return Err(AggregateError::InvalidSelection {
                reason: format!("connector {donor} cannot join itself"),
            });
        }
        for endpoint in [donor, acceptor] {
            if !self.is_open(endpoint) {
                return Err(AggregateError::InvalidSelection {
                    reason: format!("connector {endpoint} is not open"),
                });
            }
        }
        self.mark_closed(donor);
        self.mark_closed(acceptor);
        self.edges.push(Edge { donor, acceptor });
        Ok(())
    }

    pub(crate) fn checkpoint(&self) -> NetworkCheckpoint {
        NetworkCheckpoint {
            instances: self.instances.len(),
            edges: self.edges.len(),
        }
    }

    pub(crate) fn rollback(&mut self, checkpoint: NetworkCheckpoint) {
        while self.edges.len() > checkpoint.edges {
            let Some(edge) = self.edges.pop() else {
                break;
            };
            for endpoint in [edge.donor, edge.acceptor] {
                if let Some(connector_type) = self.connector_type(endpoint) {
                    self.mark_open(endpoint, connector_type);
                }
            }
        }
        while self.instances.len() > checkpoint.instances {
            let Some(instance) = self.instances.pop() else {
                break;
            };
            for (slot, connector_type) in instance.connectors.iter().enumerate() {
                self.unmark(ConnectorRef::new(instance.id, slot), *connector_type);
            }
            self.connector_count -= instance.connectors.len();
        }
    }

    fn mark_open(&mut self, connector: ConnectorRef, connector_type: ConnectorType) {
        self.open.insert(connector);
        self.open_by_type
            .entry(connector_type)
            .or_default()
            .insert(connector);
    }

    fn mark_closed(&mut self, connector: ConnectorRef) {
        if let Some(connector_type) = self.connector_type(connector) {
            self.unmark(connector, connector_type);
        }
    }

    fn unmark(&mut self, connector: ConnectorRef, connector_type: ConnectorType) {
        self.open.remove(&connector);
        if let Some(set) = self.open_by_type.get_mut(&connector_type) {
            set.remove(&connector);
            if set.is_empty() {
                self.open_by_type.remove(&connector_type);
            }
        }
    }
}
