//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::dataset::{Amount, DatasetColumns};
use crate::esplora::ApiSource;

/// Default results file written by `lookup`.
pub const DEFAULT_OUTPUT_CSV: &str = "tx_block_info.csv";

/// Default `--tolerance` for `summary --expect-total`, in BTC.
pub const DEFAULT_TOLERANCE: &str = "0.001";

/// Lookup command arguments.
#[derive(Debug, Args)]
pub struct LookupCommand {
    /// CSV file containing transaction ids
    #[arg(short, long, value_name = "PATH")]
    pub input_csv: PathBuf,

    /// Column holding the transaction ids [default: from config]
    #[arg(short = 't', long)]
    pub txid_column: Option<String>,

    /// Results file, appended to and used to resume
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_OUTPUT_CSV)]
    pub output_csv: PathBuf,

    /// Also write the input joined with the results
    #[arg(short, long, value_name = "PATH")]
    pub merged_output_csv: Option<PathBuf>,

    /// Esplora provider
    #[arg(long, value_name = "NAME")]
    pub api_source: Option<ApiSource>,

    /// Custom Esplora base URL (overrides --api-source)
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Maximum requests per second (0 disables pacing)
    #[arg(long, value_name = "RATE")]
    pub rate_limit_per_sec: Option<f64>,

    /// Write results every N lookups
    #[arg(long, value_name = "N")]
    pub checkpoint_every: Option<usize>,

    /// Retries after the first attempt for transient failures
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Do not read or write the lookup cache
    #[arg(long)]
    pub no_cache: bool,

    /// Output the run report as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Summary command arguments.
#[derive(Debug, Args)]
pub struct SummaryCommand {
    /// Transaction dataset CSV
    #[arg(short, long, value_name = "PATH")]
    pub input_csv: PathBuf,

    /// Column holding BTC amounts
    #[arg(long, default_value = "amount")]
    pub amount_column: String,

    /// Column holding labels
    #[arg(long, default_value = "label")]
    pub label_column: String,

    /// Column holding source addresses
    #[arg(long, default_value = "from_address")]
    pub from_column: String,

    /// Column holding destination addresses
    #[arg(long, default_value = "to_address")]
    pub to_column: String,

    /// Column holding timestamps
    #[arg(long, default_value = "timestamp")]
    pub time_column: String,

    /// Fail unless the total matches this amount in BTC
    #[arg(long, value_name = "BTC")]
    pub expect_total: Option<Amount>,

    /// Allowed difference for --expect-total, in BTC
    #[arg(long, value_name = "BTC", default_value = DEFAULT_TOLERANCE)]
    pub tolerance: Amount,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

impl SummaryCommand {
    /// Column names to summarize.
    #[must_use]
    pub fn columns(&self) -> DatasetColumns {
        DatasetColumns {
            amount: self.amount_column.clone(),
            label: Some(self.label_column.clone()),
            from: Some(self.from_column.clone()),
            to: Some(self.to_column.clone()),
            time: Some(self.time_column.clone()),
        }
    }
}

/// Lookup cache commands.
#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Show cache statistics
    Stats {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Delete every cached lookup
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show the cache database path
    Path,
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
