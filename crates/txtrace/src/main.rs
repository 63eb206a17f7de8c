//! `txtrace` - CLI for resolving Bitcoin transactions to their blocks
//!
//! This binary provides the command-line interface for the lookup pipeline,
//! dataset summaries, the lookup cache and configuration.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use clap::Parser;
use tracing::warn;

use txtrace::cli::{CacheCommand, Cli, Command, ConfigCommand, LookupCommand, SummaryCommand};
use txtrace::dataset::{summarize, DatasetSummary};
use txtrace::esplora::{EsploraClient, RateLimiter};
use txtrace::{init_logging, Config, EnrichReport, EnrichRequest, Enricher, LookupCache};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // A file being validated may differ from the one in use.
    if let Command::Config(ConfigCommand::Validate { file }) = &cli.command {
        let path = file.clone().or_else(|| cli.config.clone());
        return handle_validate(path);
    }

    let config = Config::load_from(cli.config.clone())?;

    let outcome = match cli.command {
        Command::Lookup(lookup_cmd) => handle_lookup(config, &lookup_cmd).await,
        Command::Summary(summary_cmd) => handle_summary(&summary_cmd),
        Command::Cache(cache_cmd) => handle_cache(&config, &cache_cmd),
        Command::Config(config_cmd) => handle_config(&config, &config_cmd),
    };

    if let Some(err) = outcome
        .as_ref()
        .err()
        .and_then(|e| e.downcast_ref::<txtrace::Error>())
    {
        print_hint(err);
    }
    outcome
}

fn print_hint(err: &txtrace::Error) {
    if err.is_interrupted() {
        eprintln!("Completed lookups were saved. Run the same command again to resume.");
    } else if err.is_total_mismatch() {
        eprintln!("Check --amount-column and --tolerance, or the dataset itself.");
    }
}

async fn handle_lookup(
    mut config: Config,
    cmd: &LookupCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    cmd.apply_to(&mut config)?;

    let client = match &config.api.base_url {
        Some(url) => EsploraClient::with_base_url(url, config.timeout())?,
        None => EsploraClient::new(config.api.source, config.timeout())?,
    };
    let limiter = RateLimiter::per_second(config.lookup.rate_limit_per_sec);
    let mut enricher = Enricher::new(client, config.retry_policy(), limiter);

    if config.cache.enabled {
        match LookupCache::open(config.cache_path()) {
            Ok(cache) => enricher = enricher.with_cache(cache),
            Err(e) => warn!("Lookup cache unavailable, continuing without it: {}", e),
        }
    }

    let request = EnrichRequest {
        input_csv: cmd.input_csv.clone(),
        txid_column: config.lookup.txid_column.clone(),
        output_csv: cmd.output_csv.clone(),
        merged_output_csv: cmd.merged_output_csv.clone(),
        checkpoint_every: config.lookup.checkpoint_every,
    };

    let report = enricher.run(&request).await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_lookup_report(&report, &request);
    }
    Ok(())
}

fn print_lookup_report(report: &EnrichReport, request: &EnrichRequest) {
    println!("Lookup complete");
    println!("---------------");
    println!("Unique TXIDs:   {}", report.unique_txids);
    println!("Already done:   {}", report.already_done);
    println!("Fetched:        {}", report.fetched);
    println!("Cache hits:     {}", report.cache_hits);
    println!("Failed:         {}", report.failed);
    println!(
        "Results:        {} ({} rows)",
        request.output_csv.display(),
        report.results.len()
    );
    if let (Some(path), Some(rows)) = (&request.merged_output_csv, report.merged_rows) {
        println!("Merged:         {} ({} rows)", path.display(), rows);
    }
}

fn handle_summary(cmd: &SummaryCommand) -> Result<(), Box<dyn std::error::Error>> {
    let summary = summarize(&cmd.input_csv, &cmd.columns())?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if let Some(expected) = cmd.expect_total {
        summary.check_total(expected, cmd.tolerance)?;
        if !cmd.json {
            println!();
            println!(
                "Total matches expected {expected} BTC (tolerance {} BTC).",
                cmd.tolerance
            );
        }
    }
    Ok(())
}

fn print_summary(summary: &DatasetSummary) {
    println!("Dataset summary");
    println!("---------------");
    println!("Rows:                {}", summary.rows);
    println!("Rows without amount: {}", summary.rows_without_amount);
    println!("Total:               {} BTC", summary.total);
    println!("Distinct addresses:  {}", summary.distinct_addresses);
    if let (Some(earliest), Some(latest)) = (summary.earliest, summary.latest) {
        println!("Earliest:            {}", earliest.to_rfc3339());
        println!("Latest:              {}", latest.to_rfc3339());
    }
    if !summary.by_label.is_empty() {
        println!();
        println!("By label:");
        for (label, totals) in &summary.by_label {
            println!(
                "  {label:<24} {:>5} rows {:>18} BTC",
                totals.rows,
                totals.total.to_string()
            );
        }
    }
}

fn handle_cache(config: &Config, cmd: &CacheCommand) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        CacheCommand::Stats { json } => {
            let cache = LookupCache::open(config.cache_path())?;
            let stats = cache.stats()?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("Lookup cache");
                println!("------------");
                println!("Path:          {}", cache.path().display());
                println!("Entries:       {}", stats.entries);
                println!("Size:          {} bytes", stats.db_size_bytes);
                if let Some(oldest) = stats.oldest_fetch {
                    println!("Oldest fetch:  {}", oldest.to_rfc3339());
                }
                if let Some(newest) = stats.newest_fetch {
                    println!("Newest fetch:  {}", newest.to_rfc3339());
                }
            }
        }
        CacheCommand::Clear { yes } => {
            if *yes {
                let cache = LookupCache::open(config.cache_path())?;
                let removed = cache.clear()?;
                println!("Removed {removed} cached lookups.");
            } else {
                println!("This will delete every cached lookup.");
                println!("Use --yes to confirm.");
            }
        }
        CacheCommand::Path => {
            println!("{}", config.cache_path().display());
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: &ConfigCommand) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        ConfigCommand::Show { json } => {
            if *json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Api]");
                println!("  Source:             {}", config.source_name());
                if let Some(url) = &config.api.base_url {
                    println!("  Base URL:           {url}");
                } else {
                    println!("  Base URL:           {}", config.api.source.base_url());
                }
                println!("  Timeout (secs):     {}", config.api.timeout_secs);
                println!();
                println!("[Lookup]");
                println!("  Rate limit (/sec):  {}", config.lookup.rate_limit_per_sec);
                println!("  Max retries:        {}", config.lookup.max_retries);
                println!("  Backoff base:       {}", config.lookup.backoff_base);
                println!("  Checkpoint every:   {}", config.lookup.checkpoint_every);
                println!("  TXID column:        {}", config.lookup.txid_column);
                println!();
                println!("[Cache]");
                println!("  Enabled:            {}", config.cache.enabled);
                println!("  Database path:      {}", config.cache_path().display());
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            return handle_validate(file.clone());
        }
    }
    Ok(())
}

fn handle_validate(file: Option<std::path::PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = file {
        println!("Validating configuration: {}", path.display());
        Config::load_file(path)?;
    } else {
        let path = Config::default_config_path();
        if path.is_file() {
            println!("Validating configuration: {}", path.display());
        } else {
            println!(
                "No configuration file at {}; checking defaults and environment.",
                path.display()
            );
        }
        Config::load_from(None)?;
    }
    println!("Configuration is valid.");
    Ok(())
}
