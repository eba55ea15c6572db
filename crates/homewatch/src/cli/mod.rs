//! Command-line interface for homewatch.
//!
//! This module provides the CLI structure for the `hwatch` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{ConfigCommand, DecryptCommand, RunCommand, StatusCommand};

use crate::logging::Verbosity;

/// hwatch - encrypted keyword and screenshot recorder
///
/// Records filtered keywords and periodic screenshots on a supervised
/// computer into encrypted, day-partitioned logs.
#[derive(Debug, Parser)]
#[command(name = "hwatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the monitoring agent in the foreground
    Run(RunCommand),

    /// Decrypt recorded logs and screenshots
    #[command(subcommand)]
    Decrypt(DecryptCommand),

    /// Show agent status and storage locations
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}
