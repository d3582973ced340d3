//! Backtracking frame stack for branch-local policy caches.
//!
//! All frames share one arena of `(ConnectorType, V)` entries. A frame is the
//! arena length at the moment it was pushed: lookups only see entries at or
//! above the active base, and popping truncates the arena back to that base.
//! Entries belonging to enclosing frames are never touched while a nested
//! frame is active, so a pop restores them exactly.

use crate::{Result, connector::ConnectorType, error::AggregateError};

/// Arena-backed stack of per-frame caches keyed by connector type.
#[derive(Clone, Debug)]
pub(crate) struct FrameStack<V> {
    entries: Vec<(ConnectorType, V)>,
    bases: Vec<usize>,
    base: usize,
}

impl<V> Default for FrameStack<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            bases: Vec::new(),
            base: 0,
        }
    }
}

impl<V> FrameStack<V> {
    /// Starts a new frame whose view is empty.
    pub(crate) fn push(&mut self) {
        self.bases.push(self.base);
        self.base = self.entries.len();
    }

    /// Discards the active frame and reinstates the enclosing one.
    pub(crate) fn pop(&mut self) -> Result<()> {
        let previous = self.bases.pop().ok_or(AggregateError::FrameUnderflow)?;
        self.entries.truncate(self.base);
        self.base = previous;
        Ok(())
    }

    /// Number of frames pushed and not yet popped.
    pub(crate) fn depth(&self) -> usize {
        self.bases.len()
    }

    /// Entries visible in the active frame, in insertion order.
    pub(crate) fn active(&self) -> &[(ConnectorType, V)] {
        self.entries.get(self.base..).unwrap_or(&[])
    }

    pub(crate) fn get(&self, connector_type: ConnectorType) -> Option<&V> {
        self.active()
            .iter()
            .find(|(key, _)| *key == connector_type)
            .map(|(_, value)| value)
    }

    /// Returns the active frame's entry for `connector_type`, building it
    /// with `make` on first use.
    pub(crate) fn get_or_insert_with(
        &mut self,
        connector_type: ConnectorType,
        make: impl FnOnce() -> V,
    ) -> &V {
        let position = self
            .active()
            .iter()
            .position(|(key, _)| *key == connector_type)
            .map(|offset| self.base + offset);
        let index = match position {
            Some(index) => index,
            None => {
                self.entries.push((connector_type, make()));
                self.entries.len() - 1
            }
        };
        &self.entries[index].1
    }
}
