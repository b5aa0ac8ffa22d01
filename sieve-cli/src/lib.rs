//! Command-line interface for the sieve selective extractor.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod error;
mod extract;

pub use error::CliError;

use extract::{ExtractArgs, resolve_extract_config, run_extract};

pub(crate) const ARG_OSM_PBF: &str = "osm-pbf";
pub(crate) const ARG_STORE: &str = "store";
pub(crate) const ARG_FLUSH_BYTES: &str = "flush-bytes";
pub(crate) const ARG_SELECT: &str = "select";
pub(crate) const ARG_POINT_LAYOUT: &str = "point-layout";
pub(crate) const ENV_OSM_PBF: &str = "SIEVE_CMDS_EXTRACT_OSM_PBF";
pub(crate) const ENV_STORE: &str = "SIEVE_CMDS_EXTRACT_STORE";
pub(crate) const ENV_SELECT: &str = "SIEVE_CMDS_EXTRACT_SELECT";

/// Run the sieve CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Extract(args) => {
            let config = resolve_extract_config(args)?;
            run_extract(&config)?;
        }
    }
    Ok(())
}

#[derive(Debug, Parser)]
#[command(
    name = "sieve",
    about = "Extract selected composites and their members from OSM datasets",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Index the selected composites of a PBF file into a key-value store.
    Extract(ExtractArgs),
}

#[cfg(test)]
mod tests;
