use std::path::PathBuf;

use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};

#[derive(Debug, Default)]
pub struct CliSources {
    pub threshold_from_cli: bool,
    pub concurrency_from_cli: bool,
}

impl CliSources {
    pub(crate) fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            threshold_from_cli: value_from_cli(matches, "threshold"),
            concurrency_from_cli: value_from_cli(matches, "concurrency"),
        }
    }
}

fn value_from_cli(matches: &ArgMatches, id: &str) -> bool {
    matches
        .value_source(id)
        .is_some_and(|source| matches!(source, ValueSource::CommandLine))
}

pub fn parse_cli() -> (CliArgs, CliSources) {
    let command = CliArgs::command();
    let matches = command.get_matches();
    let args = match CliArgs::from_arg_matches(&matches) {
        Ok(args) => args,
        Err(err) => err.exit(),
    };
    let sources = CliSources::from_matches(&matches);
    (args, sources)
}

#[derive(Debug, Parser)]
#[command(
    name = "screen-translate",
    about = "Capture the screen, detect foreign text and overlay translations",
    disable_help_subcommand = true
)]
pub struct CliArgs {
    /// Capture backend (synthetic, still)
    #[arg(short = 'b', long = "backend")]
    pub backend: Option<String>,

    /// Override the configuration file path
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Image served by the still backend
    #[arg(long = "input", value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// JSON file describing the text regions to report
    #[arg(long = "regions", value_name = "FILE")]
    pub regions: Option<PathBuf>,

    /// Source language hint (ja, ko)
    #[arg(short = 'l', long = "language")]
    pub language: Option<String>,

    /// Scan automatically every N milliseconds
    #[arg(long = "interval-ms", value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_ms: Option<u64>,

    /// Exit after this many scan cycles
    #[arg(long = "cycles", value_parser = clap::value_parser!(u64).range(1..))]
    pub cycles: Option<u64>,

    /// Sampled-pixel match ratio at which two frames count as unchanged
    #[arg(long = "threshold", id = "threshold", default_value_t = 0.9)]
    pub threshold: f32,

    /// Translation calls in flight per cycle
    #[arg(
        long = "concurrency",
        id = "concurrency",
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub concurrency: u32,

    /// Print the list of available capture backends
    #[arg(long = "list-backends")]
    pub list_backends: bool,

    /// Print the models the configured translator endpoint offers
    #[arg(long = "list-models", conflicts_with = "list_backends")]
    pub list_models: bool,

    /// Log filter, e.g. "debug" or "screen_translate=trace"
    #[arg(long = "log-level", value_name = "FILTER")]
    pub log_level: Option<String>,
}
