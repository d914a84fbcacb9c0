use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::DEFAULT_CONFIG_FILE;

/// Top-level arguments.
#[derive(Debug, Parser)]
#[command(name = "deployflow")]
#[command(author, version, about = "Idempotent contract deployment across networks", long_about = None)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the project config
    #[arg(long, global = true, env = "DEPLOYFLOW_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Result format on stdout
    #[arg(short, long, global = true, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Log format on stderr
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// A single JSON document.
    Json,
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum LogFormat {
    /// Plain text.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Deploy the selected tasks to a network
    Deploy {
        /// Target network
        #[arg(short, long)]
        network: String,

        /// Only run tasks with these tags (and their dependencies)
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,

        /// Resolve and check without sending transactions
        #[arg(long)]
        dry_run: bool,

        /// Redeploy tasks whose arguments changed
        #[arg(long)]
        force: bool,

        /// Block all remaining tasks after the first failure
        #[arg(long)]
        fail_fast: bool,
    },

    /// Show recorded and pending deployments on a network
    Status {
        /// Network to inspect
        #[arg(short, long)]
        network: String,
    },

    /// Remove a network lock left behind by a killed run
    Unlock {
        /// Network to unlock
        #[arg(short, long)]
        network: String,
    },

    /// List tasks in execution order
    Tasks {
        /// Only list tasks with these tags (and their dependencies)
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,
    },
}

/// Normalizes `--tags` values into a set, dropping blanks.
#[must_use]
pub fn tag_set(tags: &[String]) -> BTreeSet<String> {
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
