//! Section templates: the vocabulary networks are assembled from.

use std::{fmt, sync::Arc};

use crate::connector::ConnectorType;

/// Position of a template within the [`crate::Lexicon`] registration order.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TemplateId(usize);

impl TemplateId {
    /// Wraps a raw registration index.
    #[must_use]
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    /// Returns the raw registration index.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// Immutable blueprint: a central label plus an ordered connector sequence.
///
/// # Examples
/// ```
/// use kumiko_core::{LexiconBuilder, SectionTemplate};
///
/// let mut builder = LexiconBuilder::new();
/// let friend = builder.declare_connector_type("friend");
/// let person = SectionTemplate::new("person", vec![friend, friend]);
/// assert_eq!(person.label(), "person");
/// assert_eq!(person.arity(), 2);
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SectionTemplate {
    label: Arc<str>,
    connectors: Vec<ConnectorType>,
}

impl SectionTemplate {
    /// Creates a template from its label and connector types.
    pub fn new(label: impl Into<Arc<str>>, connectors: Vec<ConnectorType>) -> Self {
        Self {
            label: label.into(),
            connectors,
        }
    }

    /// Returns the template label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn shared_label(&self) -> Arc<str> {
        Arc::clone(&self.label)
    }

    /// Returns the connector types in slot order.
    #[must_use]
    pub fn connectors(&self) -> &[ConnectorType] {
        &self.connectors
    }

    /// Number of connector slots.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.connectors.len()
    }
}
