//! JSON lexicon files.
//!
//! ```json
//! {
//!   "connector_types": ["friend", "stranger"],
//!   "poles": [{ "from": "friend", "to": "friend", "symmetric": true }],
//!   "sections": [
//!     { "label": "person", "connectors": ["friend", "stranger"], "values": { "weights": 2.0 } }
//!   ]
//! }
//! ```
//!
//! Every connector name must be listed under `connector_types`. A section
//! without a value under the weight key gets the default weight of 1.0.

use std::{collections::BTreeMap, io::Read};

use kumiko_core::{AggregateError, ConnectorType, Lexicon, LexiconBuilder, SectionTemplate};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Errors raised while loading a lexicon file.
#[derive(Debug, Error)]
pub enum LexiconFileError {
    /// The document is not valid lexicon JSON.
    #[error("malformed lexicon file: {0}")]
    Parse(#[from] serde_json::Error),
    /// A pole or section used a connector name missing from
    /// `connector_types`.
    #[error("connector `{name}` used by {context} is not listed in connector_types")]
    UndeclaredConnector {
        /// The unknown connector name.
        name: String,
        /// Where the name appeared.
        context: String,
    },
    /// The lexicon builder rejected the content.
    #[error(transparent)]
    Core(#[from] AggregateError),
}

/// Serialized form of a lexicon.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LexiconFile {
    /// Connector type names, declared in order.
    #[serde(default)]
    pub connector_types: Vec<String>,
    /// Pole pair declarations.
    #[serde(default)]
    pub poles: Vec<PoleEntry>,
    /// Section templates, registered in order.
    pub sections: Vec<SectionEntry>,
}

/// One pole pair.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PoleEntry {
    /// Donor connector type.
    pub from: String,
    /// Acceptor connector type.
    pub to: String,
    /// Whether the reverse direction is allowed too.
    #[serde(default)]
    pub symmetric: bool,
}

/// One section template with its numeric annotations.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SectionEntry {
    /// Template label.
    pub label: String,
    /// Connector type names in slot order.
    pub connectors: Vec<String>,
    /// Annotations keyed by name; the weight key selects the weight.
    #[serde(default)]
    pub values: BTreeMap<String, f64>,
}

impl LexiconFile {
    /// Parses a lexicon document.
    ///
    /// # Errors
    /// Returns [`LexiconFileError::Parse`] for malformed JSON or unknown
    /// fields.
    pub fn from_reader(reader: impl Read) -> Result<Self, LexiconFileError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Builds the lexicon, reading weights from `weight_key` when given and
    /// from the default key otherwise.
    ///
    /// # Errors
    /// Returns [`LexiconFileError::UndeclaredConnector`] for unknown
    /// connector names and [`LexiconFileError::Core`] for invalid weights.
    ///
    /// # Examples
    /// ```
    /// use kumiko_cli::cli::LexiconFile;
    ///
    /// let file = LexiconFile::from_reader(
    ///     r#"{
    ///         "connector_types": ["friend"],
    ///         "poles": [{"from": "friend", "to": "friend", "symmetric": true}],
    ///         "sections": [{"label": "person", "connectors": ["friend", "friend"]}]
    ///     }"#
    ///     .as_bytes(),
    /// )?;
    /// let lexicon = file.into_lexicon(None)?;
    /// assert_eq!(lexicon.len(), 1);
    /// # Ok::<(), kumiko_cli::cli::LexiconFileError>(())
    /// ```
    pub fn into_lexicon(self, weight_key: Option<&str>) -> Result<Lexicon, LexiconFileError> {
        let mut builder = match weight_key {
            Some(key) => LexiconBuilder::new().with_weight_key(key),
            None => LexiconBuilder::new(),
        };
        for name in &self.connector_types {
            builder.declare_connector_type(name);
        }

        for pole in self.poles {
            let context = format!("pole {} -> {}", pole.from, pole.to);
            let from = resolve(&builder, &pole.from, &context)?;
            let to = resolve(&builder, &pole.to, &context)?;
            builder.register_pole_pair(from, to, pole.symmetric)?;
        }

        for section in self.sections {
            let context = format!("section `{}`", section.label);
            let connectors = section
                .connectors
                .iter()
                .map(|name| resolve(&builder, name, &context))
                .collect::<Result<Vec<_>, _>>()?;
            let template = SectionTemplate::new(section.label, connectors);
            let id = if section.values.contains_key(builder.weight_key()) {
                builder.register_unweighted(template)?
            } else {
                builder.register(template)?
            };
            for (key, value) in section.values {
                builder.annotate(id, key, value)?;
            }
        }

        let lexicon = builder.build()?;
        debug!(
            templates = lexicon.len(),
            weight_key = lexicon.weight_key(),
            "lexicon file loaded"
        );
        Ok(lexicon)
    }
}

fn resolve(
    builder: &LexiconBuilder,
    name: &str,
    context: &str,
) -> Result<ConnectorType, LexiconFileError> {
    builder
        .connector_type(name)
        .ok_or_else(|| LexiconFileError::UndeclaredConnector {
            name: name.to_owned(),
            context: context.to_owned(),
        })
}
