//! Command-line interface for txtrace.
//!
//! This module provides the CLI structure for the `txtrace` binary and the
//! step that folds command-line overrides into the loaded [`Config`].

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::error::Result;

pub use commands::{
    CacheCommand, ConfigCommand, LookupCommand, SummaryCommand, DEFAULT_OUTPUT_CSV,
    DEFAULT_TOLERANCE,
};

/// txtrace - Resolve Bitcoin transactions to their blocks
///
/// Looks up the block height and time of every transaction id in a CSV
/// using a public Esplora API, resumably, and summarizes transaction
/// datasets.
#[derive(Debug, Parser)]
#[command(name = "txtrace")]
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
    /// Look up block height and time for every txid in a CSV
    Lookup(LookupCommand),

    /// Summarize a transaction dataset
    Summary(SummaryCommand),

    /// Manage the lookup cache
    #[command(subcommand)]
    Cache(CacheCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

impl LookupCommand {
    /// Apply the flags given on the command line on top of `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the result fails validation.
    pub fn apply_to(&self, config: &mut Config) -> Result<()> {
        if let Some(source) = self.api_source {
            config.api.source = source;
        }
        if let Some(url) = &self.base_url {
            config.api.base_url = Some(url.clone());
        }
        if let Some(rate) = self.rate_limit_per_sec {
            config.lookup.rate_limit_per_sec = rate;
        }
        if let Some(every) = self.checkpoint_every {
            config.lookup.checkpoint_every = every;
        }
        if let Some(retries) = self.max_retries {
            config.lookup.max_retries = retries;
        }
        if let Some(column) = &self.txid_column {
            config.lookup.txid_column = column.clone();
        }
        if self.no_cache {
            config.cache.enabled = false;
        }
        config.validate()
    }
}
