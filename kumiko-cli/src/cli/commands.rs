//! Command implementations and argument parsing for the kumiko CLI.

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use kumiko_core::{
    AggregateError, AggregateParams, BreadthFirst, DepthFirst, Lexicon, Network, TemplateId,
    random_aggregate_parallel_with_order, random_aggregate_with_order,
};
use thiserror::Error;
use tracing::{Span, field, info, instrument};

use super::lexicon_file::{LexiconFile, LexiconFileError};

/// Top-level CLI options parsed by [`clap`].
#[derive(Debug, Parser, Clone)]
#[command(name = "kumiko", about = "Assemble random networks from a lexicon of sections.")]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the random aggregation search.
    Run(RunCommand),
}

/// Options accepted by the `run` command. Limits left unset keep the
/// library defaults.
#[derive(Debug, Args, Clone, Default)]
pub struct RunCommand {
    /// Path to the JSON lexicon.
    pub lexicon: PathBuf,

    /// Label of a seed template; repeat to search from several seed points.
    #[arg(long = "seed", required = true)]
    pub seeds: Vec<String>,

    /// Maximum number of networks to return.
    #[arg(long)]
    pub max_solutions: Option<usize>,

    /// Step budget per seed point.
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Maximum search depth.
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Maximum number of section instances per network.
    #[arg(long)]
    pub max_network_size: Option<usize>,

    /// Fraction of connectors that must be joined for acceptance.
    #[arg(long)]
    pub close_fraction: Option<f64>,

    /// Only draw fresh templates, never reuse open connectors.
    #[arg(long)]
    pub no_connect_existing: bool,

    /// Permit edges between connectors of the same instance.
    #[arg(long)]
    pub allow_self_loops: bool,

    /// Selections tried per connector before backtracking.
    #[arg(long)]
    pub branch_attempts: Option<usize>,

    /// Seed for the random stream.
    #[arg(long)]
    pub rng_seed: Option<u64>,

    /// Annotation key holding template weights.
    #[arg(long)]
    pub weight_key: Option<String>,

    /// Which open connector to satisfy next.
    #[arg(long, value_enum, default_value_t = Order::BreadthFirst)]
    pub order: Order,

    /// Explore seed points concurrently.
    #[arg(long)]
    pub parallel: bool,
}

/// Expansion orders selectable from the command line.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, ValueEnum)]
pub enum Order {
    /// Oldest open connector first.
    #[default]
    BreadthFirst,
    /// Newest open connector first.
    DepthFirst,
}

impl Order {
    fn label(self) -> &'static str {
        match self {
            Self::BreadthFirst => "breadth-first",
            Self::DepthFirst => "depth-first",
        }
    }
}

impl RunCommand {
    /// Maps the flags onto [`AggregateParams`], keeping defaults for unset
    /// limits.
    #[must_use]
    pub fn params(&self) -> AggregateParams {
        let mut params = AggregateParams::default()
            .with_connect_existing(!self.no_connect_existing)
            .with_allow_self_loops(self.allow_self_loops);
        if let Some(value) = self.max_solutions {
            params = params.with_max_solutions(value);
        }
        if let Some(value) = self.max_steps {
            params = params.with_max_steps(value);
        }
        if let Some(value) = self.max_depth {
            params = params.with_max_depth(value);
        }
        if let Some(value) = self.max_network_size {
            params = params.with_max_network_size(value);
        }
        if let Some(value) = self.close_fraction {
            params = params.with_close_fraction(value);
        }
        if let Some(value) = self.branch_attempts {
            params = params.with_branch_attempts(value);
        }
        if let Some(value) = self.rng_seed {
            params = params.with_rng_seed(value);
        }
        params
    }
}

/// Errors surfaced while executing CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// The lexicon file could not be opened.
    #[error("failed to open `{path}`: {source}")]
    Io {
        /// Path that triggered the failure.
        path: PathBuf,
        /// Underlying operating system error.
        #[source]
        source: io::Error,
    },
    /// The lexicon file could not be loaded.
    #[error("failed to load `{path}`: {source}")]
    Lexicon {
        /// Path of the lexicon file.
        path: PathBuf,
        /// Underlying load failure.
        #[source]
        source: LexiconFileError,
    },
    /// A `--seed` label matched no template.
    #[error("seed `{label}` does not name a template in the lexicon")]
    UnknownSeed {
        /// The unmatched label.
        label: String,
    },
    /// The aggregation itself failed.
    #[error(transparent)]
    Core(#[from] AggregateError),
}

impl CliError {
    /// Stable code of the underlying library error, when there is one.
    #[must_use]
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::Core(error)
            | Self::Lexicon {
                source: LexiconFileError::Core(error),
                ..
            } => Some(error.code().as_str()),
            _ => None,
        }
    }
}

/// Outcome of a `run` command.
#[derive(Debug, Clone)]
pub struct AggregationSummary {
    /// Name derived from the lexicon file.
    pub lexicon_name: String,
    /// The loaded lexicon, kept for rendering connector names.
    pub lexicon: Lexicon,
    /// Networks returned by the search.
    pub networks: Vec<Network>,
}

/// Executes the CLI command represented by `cli`.
///
/// # Errors
/// Returns [`CliError`] when loading the lexicon or running the search fails.
///
/// # Examples
/// ```
/// # use std::error::Error;
/// # use kumiko_cli::cli::{Cli, Command, RunCommand, run_cli};
/// # use tempfile::NamedTempFile;
/// #
/// # fn main() -> Result<(), Box<dyn Error>> {
/// let file = NamedTempFile::new()?;
/// std::fs::write(
///     file.path(),
///     r#"{"connector_types": ["friend"],
///         "poles": [{"from": "friend", "to": "friend", "symmetric": true}],
///         "sections": [{"label": "person", "connectors": ["friend", "friend"]}]}"#,
/// )?;
/// let cli = Cli {
///     command: Command::Run(RunCommand {
///         lexicon: file.path().to_path_buf(),
///         seeds: vec!["person".into()],
///         ..RunCommand::default()
///     }),
/// };
/// let summary = run_cli(cli)?;
/// assert_eq!(summary.networks.len(), 1);
/// # Ok(())
/// # }
/// ```
#[instrument(
    name = "cli.run",
    err,
    skip(cli),
    fields(command = field::Empty),
)]
pub fn run_cli(cli: Cli) -> Result<AggregationSummary, CliError> {
    match cli.command {
        Command::Run(run) => {
            Span::current().record("command", field::display("run"));
            run_command(run)
        }
    }
}

#[instrument(
    name = "cli.execute",
    err,
    skip(command),
    fields(lexicon = field::Empty, seeds = command.seeds.len(), order = command.order.label()),
)]
pub(super) fn run_command(command: RunCommand) -> Result<AggregationSummary, CliError> {
    Span::current().record("lexicon", field::display(command.lexicon.display()));
    let params = command.params();
    let lexicon = load_lexicon(&command.lexicon, command.weight_key.as_deref())?;
    let seeds = resolve_seeds(&lexicon, &command.seeds)?;

    let networks = match (command.parallel, command.order) {
        (false, Order::BreadthFirst) => {
            random_aggregate_with_order(&lexicon, &params, &seeds, BreadthFirst)?
        }
        (false, Order::DepthFirst) => {
            random_aggregate_with_order(&lexicon, &params, &seeds, DepthFirst)?
        }
        (true, Order::BreadthFirst) => {
            random_aggregate_parallel_with_order(&lexicon, &params, &seeds, BreadthFirst)?
        }
        (true, Order::DepthFirst) => {
            random_aggregate_parallel_with_order(&lexicon, &params, &seeds, DepthFirst)?
        }
    };

    info!(networks = networks.len(), "command completed");
    Ok(AggregationSummary {
        lexicon_name: derive_lexicon_name(&command.lexicon),
        lexicon,
        networks,
    })
}

#[instrument(name = "cli.load_lexicon", err, fields(path = %path.display()))]
pub(super) fn load_lexicon(path: &Path, weight_key: Option<&str>) -> Result<Lexicon, CliError> {
    let file = File::open(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    LexiconFile::from_reader(BufReader::new(file))
        .and_then(|parsed| parsed.into_lexicon(weight_key))
        .map_err(|source| CliError::Lexicon {
            path: path.to_path_buf(),
            source,
        })
}

pub(super) fn resolve_seeds(lexicon: &Lexicon, labels: &[String]) -> Result<Vec<TemplateId>, CliError> {
    labels
        .iter()
        .map(|label| {
            lexicon
                .find_template(label)
                .ok_or_else(|| CliError::UnknownSeed {
                    label: label.clone(),
                })
        })
        .collect()
}

pub(super) fn derive_lexicon_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|value| value.to_str())
        .map_or_else(|| "lexicon".to_owned(), ToOwned::to_owned)
}

/// Renders `summary` to `writer` as indented text: one block per network
/// listing its instances and edges.
///
/// # Errors
/// Returns [`io::Error`] if writing to the supplied writer fails.
pub fn render_summary(summary: &AggregationSummary, mut writer: impl Write) -> io::Result<()> {
    writeln!(writer, "lexicon: {}", summary.lexicon_name)?;
    writeln!(writer, "networks: {}", summary.networks.len())?;
    for (index, network) in summary.networks.iter().enumerate() {
        writeln!(
            writer,
            "network {index}: {} instances, {} edges, {:.2} closed",
            network.len(),
            network.edges().len(),
            network.closed_fraction()
        )?;
        for instance in network.instances() {
            writeln!(writer, "  {} {}", instance.id(), instance.label())?;
        }
        for edge in network.edges() {
            writeln!(
                writer,
                "  {} -> {} ({} -> {})",
                edge.donor,
                edge.acceptor,
                connector_name(&summary.lexicon, network, edge.donor),
                connector_name(&summary.lexicon, network, edge.acceptor)
            )?;
        }
    }
    Ok(())
}

fn connector_name<'a>(
    lexicon: &'a Lexicon,
    network: &Network,
    connector: kumiko_core::ConnectorRef,
) -> &'a str {
    network
        .connector_type(connector)
        .and_then(|connector_type| lexicon.connector_name(connector_type))
        .unwrap_or("?")
}
