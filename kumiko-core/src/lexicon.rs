//! Weighted template collection and pole-compatibility table.
//!
//! A [`Lexicon`] is populated once through [`LexiconBuilder`] and is read-only
//! afterwards, so it can be shared between concurrent aggregations. Template
//! weights live in a per-template annotation map under the lexicon's weight
//! key; a template without that annotation contributes no probability mass.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use tracing::debug;

use crate::{
    Result,
    connector::{ConnectorType, PoleTable},
    error::AggregateError,
    template::{SectionTemplate, TemplateId},
};

/// Annotation key holding template weights unless overridden.
pub const DEFAULT_WEIGHT_KEY: &str = "weights";

/// Weight stored by [`LexiconBuilder::register`].
pub const DEFAULT_WEIGHT: f64 = 1.0;

#[derive(Clone, Debug)]
struct LexiconEntry {
    template: SectionTemplate,
    values: BTreeMap<String, f64>,
}

#[derive(Clone, Debug, Default)]
struct ConnectorNames {
    names: Vec<Arc<str>>,
    by_name: HashMap<Arc<str>, ConnectorType>,
}

impl ConnectorNames {
    fn declare(&mut self, name: &str) -> ConnectorType {
        if let Some(existing) = self.by_name.get(name) {
            return *existing;
        }
        let raw = u32::try_from(self.names.len()).unwrap_or(u32::MAX);
        let connector_type = ConnectorType::new(raw);
        let shared: Arc<str> = Arc::from(name);
        self.names.push(Arc::clone(&shared));
        self.by_name.insert(shared, connector_type);
        connector_type
    }

    fn lookup(&self, name: &str) -> Option<ConnectorType> {
        self.by_name.get(name).copied()
    }

    fn name(&self, connector_type: ConnectorType) -> Option<&str> {
        self.names.get(connector_type.index()).map(AsRef::as_ref)
    }

    fn ensure_declared(&self, connector_type: ConnectorType) -> Result<()> {
        if connector_type.index() < self.names.len() {
            Ok(())
        } else {
            Err(AggregateError::UndeclaredConnectorType { connector_type })
        }
    }

    fn declared(&self) -> impl Iterator<Item = ConnectorType> + '_ {
        self.names
            .iter()
            .filter_map(|name| self.by_name.get(name).copied())
    }
}

/// Populates a [`Lexicon`].
///
/// # Examples
/// ```
/// use kumiko_core::{LexiconBuilder, SectionTemplate};
///
/// let mut builder = LexiconBuilder::new();
/// let friend = builder.declare_connector_type("friend");
/// builder.register_pole_pair(friend, friend, true)?;
/// let person = builder.register(SectionTemplate::new("person", vec![friend, friend]))?;
/// let lexicon = builder.build()?;
/// assert_eq!(lexicon.candidates(friend), &[person]);
/// assert_eq!(lexicon.weight(person), Some(1.0));
/// # Ok::<(), kumiko_core::AggregateError>(())
/// ```
#[derive(Clone, Debug)]
pub struct LexiconBuilder {
    weight_key: String,
    names: ConnectorNames,
    entries: Vec<LexiconEntry>,
    poles: PoleTable,
}

impl Default for LexiconBuilder {
    fn default() -> Self {
        Self {
            weight_key: DEFAULT_WEIGHT_KEY.to_owned(),
            names: ConnectorNames::default(),
            entries: Vec::new(),
            poles: PoleTable::default(),
        }
    }
}

impl LexiconBuilder {
    /// Creates an empty builder using [`DEFAULT_WEIGHT_KEY`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the annotation key that holds template weights.
    #[must_use]
    pub fn with_weight_key(mut self, key: impl Into<String>) -> Self {
        self.weight_key = key.into();
        self
    }

    /// Returns the annotation key that holds template weights.
    #[must_use]
    pub fn weight_key(&self) -> &str {
        &self.weight_key
    }

    /// Declares a connector type by name, returning the existing identifier
    /// when the name was declared before.
    pub fn declare_connector_type(&mut self, name: &str) -> ConnectorType {
        self.names.declare(name)
    }

    /// Looks up a previously declared connector type.
    #[must_use]
    pub fn connector_type(&self, name: &str) -> Option<ConnectorType> {
        self.names.lookup(name)
    }

    /// Registers `template` with the default weight of 1.0.
    ///
    /// # Errors
    /// Returns [`AggregateError::UndeclaredConnectorType`] when the template
    /// uses a connector type unknown to this builder.
    pub fn register(&mut self, template: SectionTemplate) -> Result<TemplateId> {
        self.register_weighted(template, DEFAULT_WEIGHT)
    }

    /// Registers `template` with an explicit selection weight.
    ///
    /// # Errors
    /// Returns [`AggregateError::InvalidWeight`] for negative or non-finite
    /// weights and [`AggregateError::UndeclaredConnectorType`] for unknown
    /// connector types.
    pub fn register_weighted(
        &mut self,
        template: SectionTemplate,
        weight: f64,
    ) -> Result<TemplateId> {
        validate_weight(&template, weight)?;
        let id = self.register_unweighted(template)?;
        self.annotate(id, self.weight_key.clone(), weight)?;
        Ok(id)
    }

    /// Registers `template` without a weight annotation. Such a template is
    /// never drawn from the lexicon unless a weight is attached later through
    /// [`Self::annotate`].
    ///
    /// # Errors
    /// Returns [`AggregateError::UndeclaredConnectorType`] for unknown
    /// connector types.
    pub fn register_unweighted(&mut self, template: SectionTemplate) -> Result<TemplateId> {
        for connector_type in template.connectors() {
            self.names.ensure_declared(*connector_type)?;
        }
        let id = TemplateId::new(self.entries.len());
        self.entries.push(LexiconEntry {
            template,
            values: BTreeMap::new(),
        });
        Ok(id)
    }

    /// Attaches a numeric annotation to a registered template, replacing any
    /// previous value under the same key.
    ///
    /// # Errors
    /// Returns [`AggregateError::UnknownTemplate`] when `template` was not
    /// registered by this builder.
    pub fn annotate(&mut self, template: TemplateId, key: impl Into<String>, value: f64) -> Result<()> {
        let entry = self
            .entries
            .get_mut(template.get())
            .ok_or(AggregateError::UnknownTemplate { template })?;
        entry.values.insert(key.into(), value);
        Ok(())
    }

    /// Declares that a donor of type `from` may join an acceptor of type
    /// `to`. Symmetric declarations also allow the reverse direction.
    ///
    /// # Errors
    /// Returns [`AggregateError::UndeclaredConnectorType`] when either type
    /// was not declared by this builder.
    pub fn register_pole_pair(
        &mut self,
        from: ConnectorType,
        to: ConnectorType,
        symmetric: bool,
    ) -> Result<()> {
        self.names.ensure_declared(from)?;
        self.names.ensure_declared(to)?;
        self.poles.insert(from, to, symmetric);
        Ok(())
    }

    /// Validates weights and freezes the lexicon.
    ///
    /// # Errors
    /// Returns [`AggregateError::InvalidWeight`] when a value stored under the
    /// weight key is negative or not finite.
    pub fn build(self) -> Result<Lexicon> {
        for entry in &self.entries {
            if let Some(weight) = entry.values.get(&self.weight_key) {
                validate_weight(&entry.template, *weight)?;
            }
        }

        let mut candidates: HashMap<ConnectorType, Vec<TemplateId>> = HashMap::new();
        for donor in self.names.declared() {
            let matching: Vec<TemplateId> = self
                .entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| {
                    entry
                        .template
                        .connectors()
                        .iter()
                        .any(|acceptor| self.poles.compatible(donor, *acceptor))
                })
                .map(|(index, _)| TemplateId::new(index))
                .collect();
            if !matching.is_empty() {
                candidates.insert(donor, matching);
            }
        }

        debug!(
            templates = self.entries.len(),
            connector_types = self.names.names.len(),
            pole_pairs = self.poles.len(),
            weight_key = %self.weight_key,
            "lexicon built"
        );

        Ok(Lexicon {
            weight_key: self.weight_key,
            names: self.names,
            entries: self.entries,
            poles: self.poles,
            candidates,
        })
    }
}

fn validate_weight(template: &SectionTemplate, weight: f64) -> Result<()> {
    if weight.is_finite() && weight >= 0.0 {
        Ok(())
    } else {
        Err(AggregateError::InvalidWeight {
            label: template.shared_label(),
            weight,
        })
    }
}

/// Read-only collection of section templates plus the pole table.
#[derive(Clone, Debug)]
pub struct Lexicon {
    weight_key: String,
    names: ConnectorNames,
    entries: Vec<LexiconEntry>,
    poles: PoleTable,
    candidates: HashMap<ConnectorType, Vec<TemplateId>>,
}

impl Lexicon {
    /// Returns every template holding a connector that a donor of
    /// `connector_type` may join, in registration order. Unknown types yield
    /// an empty slice.
    #[must_use]
    pub fn candidates(&self, connector_type: ConnectorType) -> &[TemplateId] {
        self.candidates
            .get(&connector_type)
            .map_or(&[], Vec::as_slice)
    }

    /// Resolves a template identifier.
    #[must_use]
    pub fn template(&self, template: TemplateId) -> Option<&SectionTemplate> {
        self.entries.get(template.get()).map(|entry| &entry.template)
    }

    /// Iterates over all templates in registration order.
    pub fn templates(&self) -> impl Iterator<Item = (TemplateId, &SectionTemplate)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (TemplateId::new(index), &entry.template))
    }

    /// Returns the first template registered under `label`.
    #[must_use]
    pub fn find_template(&self, label: &str) -> Option<TemplateId> {
        self.templates()
            .find(|(_, template)| template.label() == label)
            .map(|(id, _)| id)
    }

    /// Returns the annotation stored under `key` for `template`.
    #[must_use]
    pub fn value(&self, template: TemplateId, key: &str) -> Option<f64> {
        self.entries
            .get(template.get())
            .and_then(|entry| entry.values.get(key).copied())
    }

    /// Returns the selection weight of `template`, if it carries one.
    #[must_use]
    pub fn weight(&self, template: TemplateId) -> Option<f64> {
        self.value(template, &self.weight_key)
    }

    /// Returns the annotation key that holds template weights.
    #[must_use]
    pub fn weight_key(&self) -> &str {
        &self.weight_key
    }

    /// Returns the pole table.
    #[must_use]
    pub fn poles(&self) -> &PoleTable {
        &self.poles
    }

    /// Returns `true` when a donor of type `from` may join an acceptor of
    /// type `to`.
    #[must_use]
    pub fn compatible(&self, from: ConnectorType, to: ConnectorType) -> bool {
        self.poles.compatible(from, to)
    }

    /// Returns the acceptor types a donor of type `from` may join.
    #[must_use]
    pub fn mates(&self, from: ConnectorType) -> &[ConnectorType] {
        self.poles.mates(from)
    }

    /// Looks up a connector type by name.
    #[must_use]
    pub fn connector_type(&self, name: &str) -> Option<ConnectorType> {
        self.names.lookup(name)
    }

    /// Returns the declared name of a connector type.
    #[must_use]
    pub fn connector_name(&self, connector_type: ConnectorType) -> Option<&str> {
        self.names.name(connector_type)
    }

    /// Number of registered templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no template has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
