//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{HistoryCommand, ListCommand, MatrixCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// Matrix CI pipeline executor
#[derive(Debug, Parser, Clone)]
#[command(name = "matrixci")]
#[command(version = "0.1.0")]
#[command(about = "Run matrix-parameterized, fail-fast CI pipelines", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a pipeline for an event
    Run(RunCommand),

    /// Validate a pipeline descriptor
    Validate(ValidateCommand),

    /// Print the expanded run configurations
    Matrix(MatrixCommand),

    /// List pipelines in history
    List(ListCommand),

    /// Show execution history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
