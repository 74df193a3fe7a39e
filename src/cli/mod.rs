//! Command-line interface definitions for the `atlas-lifecycle` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser};

/// Top-level CLI for the `atlas-lifecycle` binary.
#[derive(Debug, Parser)]
#[command(
    name = "atlas-lifecycle",
    about = "Create, stop, start and delete Atlas compute instances",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Run the full create, stop, start and delete sequence.
    #[command(name = "run", about = "Run the full create, stop, start and delete sequence")]
    Run(CreateCommand),
    /// Create an instance and wait until it is running.
    #[command(name = "create", about = "Create an instance and wait until it is running")]
    Create(CreateCommand),
    /// Print the current state of an instance.
    #[command(name = "status", about = "Print the current state of an instance")]
    Status(InstanceCommand),
    /// Stop an instance and wait until it is stopped.
    #[command(name = "stop", about = "Stop an instance and wait until it is stopped")]
    Stop(InstanceCommand),
    /// Start an instance and wait until it is running.
    #[command(name = "start", about = "Start an instance and wait until it is running")]
    Start(InstanceCommand),
    /// Delete an instance and wait until it is gone.
    #[command(name = "delete", about = "Delete an instance and wait until it is gone")]
    Delete(InstanceCommand),
}

/// Arguments shared by `run` and `create`.
#[derive(Debug, Args)]
pub(crate) struct CreateCommand {
    /// Override the configured instance name.
    #[arg(long, value_name = "NAME")]
    pub(crate) name: Option<String>,
    /// Override the configured instance type (for example `cpu.2x`).
    #[arg(long = "type", value_name = "TYPE")]
    pub(crate) instance_type: Option<String>,
}

/// Arguments for subcommands that act on an existing instance.
#[derive(Debug, Args)]
pub(crate) struct InstanceCommand {
    /// Identifier of the instance.
    #[arg(value_name = "ID")]
    pub(crate) id: String,
}
