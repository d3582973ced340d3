//! Synthetic lexicons for benchmarking.
//!
//! Connector types are named `c0`, `c1` and so on. Every type joins itself
//! symmetrically and donates to its successor, so the generated lexicons
//! always admit closed networks. Templates draw their arity and connector
//! types from a seeded RNG and carry weights in `0.5..2.0`.

use kumiko_core::{
    AggregateError, ConnectorType, Lexicon, LexiconBuilder, SectionTemplate, TemplateId,
};
use rand::{Rng, SeedableRng, rngs::SmallRng};

/// Errors that may occur during synthetic lexicon generation.
#[derive(Clone, Debug, thiserror::Error, PartialEq)]
pub enum SyntheticError {
    /// The requested template count was zero.
    #[error("template count must be greater than zero")]
    ZeroTemplates,
    /// The requested connector type count was zero.
    #[error("connector type count must be greater than zero")]
    ZeroConnectorTypes,
    /// The maximum arity was zero.
    #[error("maximum arity must be greater than zero")]
    ZeroArity,
    /// The lexicon builder rejected the generated content.
    #[error("lexicon construction failed: {0}")]
    Lexicon(#[from] AggregateError),
}

/// Configuration for synthetic lexicon generation.
#[derive(Clone, Debug)]
pub struct SyntheticLexiconConfig {
    /// Number of section templates to register.
    pub template_count: usize,
    /// Number of connector types to declare.
    pub connector_types: usize,
    /// Largest number of connectors on one template.
    pub max_arity: usize,
    /// RNG seed for reproducibility.
    pub seed: u64,
}

/// A generated lexicon and the ids of its templates in registration order.
///
/// # Examples
///
/// ```
/// use kumiko_benches::source::{SyntheticLexicon, SyntheticLexiconConfig};
///
/// let config = SyntheticLexiconConfig {
///     template_count: 8,
///     connector_types: 3,
///     max_arity: 4,
///     seed: 42,
/// };
/// let synthetic = SyntheticLexicon::generate(&config).expect("valid config");
/// assert_eq!(synthetic.lexicon().len(), 8);
/// ```
#[derive(Clone, Debug)]
pub struct SyntheticLexicon {
    lexicon: Lexicon,
    templates: Vec<TemplateId>,
}

impl SyntheticLexicon {
    /// Generates and builds a lexicon from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SyntheticError`] when a count in `config` is zero.
    pub fn generate(config: &SyntheticLexiconConfig) -> Result<Self, SyntheticError> {
        let (builder, templates) = populate(config)?;
        Ok(Self {
            lexicon: builder.build()?,
            templates,
        })
    }

    /// Returns the generated lexicon.
    #[must_use]
    pub const fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    /// Returns `count` seed points, cycling through the templates.
    #[must_use]
    pub fn seeds(&self, count: usize) -> Vec<TemplateId> {
        self.templates.iter().copied().cycle().take(count).collect()
    }
}

/// Fills a builder with the synthetic content without freezing it, so
/// callers can measure [`LexiconBuilder::build`] on its own.
///
/// # Errors
///
/// Returns [`SyntheticError`] when a count in `config` is zero.
pub fn populate(
    config: &SyntheticLexiconConfig,
) -> Result<(LexiconBuilder, Vec<TemplateId>), SyntheticError> {
    if config.template_count == 0 {
        return Err(SyntheticError::ZeroTemplates);
    }
    if config.connector_types == 0 {
        return Err(SyntheticError::ZeroConnectorTypes);
    }
    if config.max_arity == 0 {
        return Err(SyntheticError::ZeroArity);
    }

    let mut builder = LexiconBuilder::new();
    let types: Vec<ConnectorType> = (0..config.connector_types)
        .map(|index| builder.declare_connector_type(&format!("c{index}")))
        .collect();
    for (index, from) in types.iter().enumerate() {
        builder.register_pole_pair(*from, *from, true)?;
        if let Some(next) = types.get(index.saturating_add(1)) {
            builder.register_pole_pair(*from, *next, false)?;
        }
    }

    let mut rng = SmallRng::seed_from_u64(config.seed);
    let mut templates = Vec::with_capacity(config.template_count);
    for index in 0..config.template_count {
        let arity = rng.gen_range(1..=config.max_arity);
        let connectors = (0..arity)
            .filter_map(|_| types.get(rng.gen_range(0..types.len())).copied())
            .collect();
        let weight = rng.gen_range(0.5..2.0);
        templates.push(
            builder.register_weighted(SectionTemplate::new(format!("t{index}"), connectors), weight)?,
        );
    }
    Ok((builder, templates))
}
