//! Connector identifiers and the pole-compatibility table.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use crate::network::InstanceId;

/// Interned connector type declared through [`crate::LexiconBuilder`].
///
/// Identifiers are dense and allocated in declaration order, so ordering by
/// `ConnectorType` is stable across runs.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ConnectorType(u32);

impl ConnectorType {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ConnectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Addresses one connector slot on a placed section instance.
///
/// Ordering is by instance and then slot, which matches the order in which
/// connectors enter a network.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ConnectorRef {
    /// Instance holding the connector.
    pub instance: InstanceId,
    /// Position of the connector within the instance's template.
    pub slot: usize,
}

impl ConnectorRef {
    /// Creates a reference to `slot` on `instance`.
    #[must_use]
    pub const fn new(instance: InstanceId, slot: usize) -> Self {
        Self { instance, slot }
    }
}

impl fmt::Display for ConnectorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.instance.get(), self.slot)
    }
}

/// Set of ordered pole pairs describing which connector types may join.
///
/// A pair `(a, b)` means a donor connector of type `a` may be joined to an
/// acceptor connector of type `b`.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PoleTable {
    pairs: BTreeSet<(ConnectorType, ConnectorType)>,
    mates: BTreeMap<ConnectorType, Vec<ConnectorType>>,
}

impl PoleTable {
    /// Records a pole pair. Symmetric declarations also record the reverse
    /// pair when the two types differ.
    pub(crate) fn insert(&mut self, from: ConnectorType, to: ConnectorType, symmetric: bool) {
        self.insert_ordered(from, to);
        if symmetric && from != to {
            self.insert_ordered(to, from);
        }
    }

    fn insert_ordered(&mut self, from: ConnectorType, to: ConnectorType) {
        if self.pairs.insert((from, to)) {
            let mates = self.mates.entry(from).or_default();
            if let Err(position) = mates.binary_search(&to) {
                mates.insert(position, to);
            }
        }
    }

    /// Returns `true` when a donor of type `from` may join an acceptor of
    /// type `to`.
    #[must_use]
    pub fn compatible(&self, from: ConnectorType, to: ConnectorType) -> bool {
        self.pairs.contains(&(from, to))
    }

    /// Returns the acceptor types a donor of type `from` may join, in
    /// ascending order.
    #[must_use]
    pub fn mates(&self, from: ConnectorType) -> &[ConnectorType] {
        self.mates.get(&from).map_or(&[], Vec::as_slice)
    }

    /// Iterates over every recorded ordered pair.
    pub fn pairs(&self) -> impl Iterator<Item = (ConnectorType, ConnectorType)> + '_ {
        self.pairs.iter().copied()
    }

    /// Number of ordered pairs, counting symmetric reverses separately.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns `true` when no pole pair has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    const A: ConnectorType = ConnectorType::new(0);
    const B: ConnectorType = ConnectorType::new(1);

    #[rstest]
    #[case::symmetric(true, true)]
    #[case::asymmetric(false, false)]
    fn symmetric_pairs_record_the_reverse(#[case] symmetric: bool, #[case] reverse: bool) {
        let mut table = PoleTable::default();
        table.insert(A, B, symmetric);
        assert!(table.compatible(A, B));
        assert_eq!(table.compatible(B, A), reverse);
    }

    #[test]
    fn self_pairs_are_recorded_once() {
        let mut table = PoleTable::default();
        table.insert(A, A, true);
        table.insert(A, A, false);
        assert_eq!(table.len(), 1);
        assert_eq!(table.mates(A), &[A]);
    }

    #[test]
    fn mates_are_sorted_and_unique() {
        let mut table = PoleTable::default();
        table.insert(A, B, false);
        table.insert(A, A, false);
        table.insert(A, B, true);
        assert_eq!(table.mates(A), &[A, B]);
        assert_eq!(table.mates(B), &[A]);
        assert!(table.mates(ConnectorType::new(9)).is_empty());
    }
}
