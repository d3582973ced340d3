//! Command-line interface for the random aggregation search.
//!
//! The `run` command loads a JSON lexicon, resolves seed templates by label
//! and prints every network the search returns.

mod commands;
mod lexicon_file;

pub use commands::{AggregationSummary, Cli, CliError, Command, Order, RunCommand, render_summary, run_cli};
pub use lexicon_file::{LexiconFile, LexiconFileError, PoleEntry, SectionEntry};
