//! Command-line interface for osmflow's file-based change processing.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod commands;
mod error;
mod fs;
pub mod jsonl;

pub use error::CliError;

use commands::{ApplyChangeArgs, DeriveChangeArgs, MergeArgs, MergeChangeArgs};

const ARG_BASE: &str = "base";
const ARG_CHANGE: &str = "change";
const ARG_FIRST: &str = "first";
const ARG_SECOND: &str = "second";
const ARG_FROM: &str = "from";
const ARG_TO: &str = "to";
const ARG_OUTPUT: &str = "output";
const ARG_QUEUE_CAPACITY: &str = "queue-capacity";
const ARG_CONFLICT_RESOLUTION: &str = "conflict-resolution";

const ENV_APPLY_BASE: &str = "OSMFLOW_CMDS_APPLY_CHANGE_BASE";
const ENV_APPLY_CHANGE: &str = "OSMFLOW_CMDS_APPLY_CHANGE_CHANGE";
const ENV_APPLY_OUTPUT: &str = "OSMFLOW_CMDS_APPLY_CHANGE_OUTPUT";
const ENV_MERGE_FIRST: &str = "OSMFLOW_CMDS_MERGE_FIRST";
const ENV_MERGE_SECOND: &str = "OSMFLOW_CMDS_MERGE_SECOND";
const ENV_MERGE_OUTPUT: &str = "OSMFLOW_CMDS_MERGE_OUTPUT";
const ENV_DERIVE_FROM: &str = "OSMFLOW_CMDS_DERIVE_CHANGE_FROM";
const ENV_DERIVE_TO: &str = "OSMFLOW_CMDS_DERIVE_CHANGE_TO";
const ENV_DERIVE_OUTPUT: &str = "OSMFLOW_CMDS_DERIVE_CHANGE_OUTPUT";
const ENV_MERGE_CHANGE_FIRST: &str = "OSMFLOW_CMDS_MERGE_CHANGE_FIRST";
const ENV_MERGE_CHANGE_SECOND: &str = "OSMFLOW_CMDS_MERGE_CHANGE_SECOND";
const ENV_MERGE_CHANGE_OUTPUT: &str = "OSMFLOW_CMDS_MERGE_CHANGE_OUTPUT";

/// Run the osmflow CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    dispatch(cli.command)
}

fn dispatch(command: Command) -> Result<(), CliError> {
    match command {
        Command::ApplyChange(args) => commands::run_apply_change(args),
        Command::Merge(args) => commands::run_merge(args),
        Command::DeriveChange(args) => commands::run_derive_change(args),
        Command::MergeChange(args) => commands::run_merge_change(args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "osmflow",
    about = "Streaming change processing for OpenStreetMap data",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Apply a change stream to an element snapshot.
    ApplyChange(ApplyChangeArgs),
    /// Merge two element snapshots into one.
    Merge(MergeArgs),
    /// Derive the change stream turning one snapshot into another.
    DeriveChange(DeriveChangeArgs),
    /// Merge two change streams into one.
    MergeChange(MergeChangeArgs),
}

#[cfg(test)]
mod tests;
