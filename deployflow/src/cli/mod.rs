//! Command-line interface definitions.
//!
//! - `Cli`, `Commands`: argument definitions via clap
//! - `Display`: styled terminal output for runs, records and tasks

mod commands;
mod display;

pub use commands::{tag_set, Cli, Commands, LogFormat, OutputFormat};
pub use display::{describe_outcome, Display};
