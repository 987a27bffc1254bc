//! Command-line interface converting OpenStreetMap extracts into tables.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use geotable_core::JobStats;
use log::info;

mod convert;
mod error;

pub use error::CliError;

use convert::{ConvertArgs, run_convert};

pub(crate) const ARG_INPUTS: &str = "inputs";
pub(crate) const ARG_OUTPUT_DIR: &str = "output-dir";
pub(crate) const ARG_SCRATCH_DIR: &str = "scratch-dir";
pub(crate) const ARG_CLASSIFICATION: &str = "classification";
pub(crate) const ARG_ATTRIBUTE_MAP: &str = "attribute-map";
pub(crate) const ARG_INDEX: &str = "index";
pub(crate) const ARG_MEMORY_BUDGET: &str = "memory-budget-mib";
pub(crate) const ARG_PROGRESS_INTERVAL: &str = "progress-interval";
pub(crate) const ARG_TARGET_SRID: &str = "target-srid";
pub(crate) const ENV_INPUTS: &str = "GEOTABLE_CMDS_CONVERT_INPUTS";
pub(crate) const ENV_OUTPUT_DIR: &str = "GEOTABLE_CMDS_CONVERT_OUTPUT_DIR";

/// Run the geotable CLI with the current process arguments and environment.
///
/// # Errors
///
/// Returns [`CliError`] when argument parsing, configuration or any
/// conversion job fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    match cli.command {
        Command::Convert(args) => {
            let summaries = run_convert(args)?;
            let inputs = summaries.len();
            let total = summaries
                .into_iter()
                .map(|summary| summary.stats)
                .fold(JobStats::default(), JobStats::combine);
            info!(
                "Converted {inputs} inputs: {} records written, {} named entities excluded",
                total.records, total.rejected
            );
        }
    }
    Ok(())
}

#[derive(Debug, Parser)]
#[command(
    name = "geotable",
    about = "Convert OpenStreetMap extracts into categorized tables",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Convert OSM XML or PBF files into pipe-delimited tables.
    Convert(ConvertArgs),
}

#[cfg(test)]
mod tests;
