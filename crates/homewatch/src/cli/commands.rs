//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Run command arguments.
#[derive(Debug, Args)]
pub struct RunCommand {
    /// Seconds to run before stopping on its own (default: until Ctrl-C)
    #[arg(long, value_name = "SECS")]
    pub duration: Option<u64>,
}

/// Offline decryption commands.
#[derive(Debug, Subcommand)]
pub enum DecryptCommand {
    /// Print the lines of an encrypted keyword log
    Keywords {
        /// Path to a keywords.log.enc file
        file: PathBuf,

        /// Key file (defaults to the configured key)
        #[arg(short, long, value_name = "PATH")]
        key: Option<PathBuf>,
    },

    /// Decrypt a screenshot to an image file
    Screenshot {
        /// Path to a .png.enc file
        file: PathBuf,

        /// Where to write the decrypted image
        #[arg(short, long, value_name = "OUT")]
        output: PathBuf,

        /// Key file (defaults to the configured key)
        #[arg(short, long, value_name = "PATH")]
        key: Option<PathBuf>,
    },
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}
