//! The TXID enrichment pipeline.
//!
//! Reads the unique txids of an input CSV, resolves each one that the
//! results file does not already contain, and appends the records to the
//! results file in checkpoints. A restarted run picks up where the last one
//! stopped.

use std::future::Future;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::LookupCache;
use crate::dataset::unique_txids;
use crate::error::{Error, Result};
use crate::esplora::{lookup_with_retry, RateLimiter, RetryPolicy, TxLookup};
use crate::merge::merge_results;
use crate::record::{LookupRecord, INVALID_TXID_ERROR};
use crate::results::{append_results, completed_txids, load_results};
use crate::txid::Txid;

/// Files and batching for one enrichment run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichRequest {
    /// CSV containing the txid column.
    pub input_csv: PathBuf,
    /// Name of the txid column.
    pub txid_column: String,
    /// Results file; appended to and used for resuming.
    pub output_csv: PathBuf,
    /// Where to write the input joined with the results, if anywhere.
    pub merged_output_csv: Option<PathBuf>,
    /// Write results every N lookups.
    pub checkpoint_every: usize,
}

impl EnrichRequest {
    /// Reject layouts where one file would overwrite another.
    ///
    /// The results file is the resume checkpoint, so neither the input nor
    /// the merged output may share it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] naming the clashing paths.
    pub fn check_paths(&self) -> Result<()> {
        if same_file(&self.output_csv, &self.input_csv) {
            return Err(Error::config_validation(format!(
                "output CSV '{}' must differ from the input CSV",
                self.output_csv.display()
            )));
        }
        if let Some(merged) = &self.merged_output_csv {
            if same_file(merged, &self.output_csv) {
                return Err(Error::config_validation(format!(
                    "merged output '{}' must differ from the results CSV",
                    merged.display()
                )));
            }
        }
        Ok(())
    }
}

/// Whether two paths name the same file, resolving links when both exist.
fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Outcome of an enrichment run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnrichReport {
    /// Distinct txids in the input.
    pub unique_txids: usize,
    /// Of those, how many already had a result.
    pub already_done: usize,
    /// Txids sent to the API this run.
    pub fetched: usize,
    /// Txids answered from the lookup cache.
    pub cache_hits: usize,
    /// New records that carry an error.
    pub failed: usize,
    /// Rows in the merged output, if one was written.
    pub merged_rows: Option<usize>,
    /// Every row of the results file after the run.
    #[serde(skip)]
    pub results: Vec<LookupRecord>,
}

/// Resolves txids and maintains the results file.
#[derive(Debug)]
pub struct Enricher<L> {
    lookup: L,
    policy: RetryPolicy,
    limiter: RateLimiter,
    cache: Option<LookupCache>,
}

/// How a single txid was resolved.
enum Resolution {
    Invalid,
    Cached,
    Fetched,
}

impl<L: TxLookup> Enricher<L> {
    /// Create an enricher without a cache.
    #[must_use]
    pub fn new(lookup: L, policy: RetryPolicy, limiter: RateLimiter) -> Self {
        Self {
            lookup,
            policy,
            limiter,
            cache: None,
        }
    }

    /// Use a lookup cache.
    #[must_use]
    pub fn with_cache(mut self, cache: LookupCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The cache in use, if any.
    #[must_use]
    pub fn cache(&self) -> Option<&LookupCache> {
        self.cache.as_ref()
    }

    /// Run until done or until Ctrl-C.
    ///
    /// # Errors
    ///
    /// See [`Enricher::run_until`].
    pub async fn run(&mut self, request: &EnrichRequest) -> Result<EnrichReport> {
        let ctrl_c = async {
            if tokio::signal::ctrl_c().await.is_err() {
                // No signal handler available: never interrupt.
                std::future::pending::<()>().await;
            }
        };
        self.run_until(request, ctrl_c).await
    }

    /// Run until done or until `shutdown` resolves.
    ///
    /// On shutdown, records resolved so far are flushed to the results file
    /// before [`Error::Interrupted`] is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is invalid, a file cannot be read or
    /// written, or the run is interrupted.
    pub async fn run_until<F>(&mut self, request: &EnrichRequest, shutdown: F) -> Result<EnrichReport>
    where
        F: Future<Output = ()>,
    {
        if request.checkpoint_every == 0 {
            return Err(Error::config_validation(
                "checkpoint_every must be greater than 0",
            ));
        }
        request.check_paths()?;

        let txids = unique_txids(&request.input_csv, &request.txid_column)?;
        info!(
            "Found {} unique TXIDs in '{}'.",
            txids.len(),
            request.input_csv.display()
        );

        let existing = load_results(&request.output_csv);
        let done = completed_txids(&existing);
        let total_unique = txids.len();
        let to_fetch: Vec<Txid> = txids.into_iter().filter(|t| !done.contains(t)).collect();
        let mut report = EnrichReport {
            unique_txids: total_unique,
            already_done: total_unique - to_fetch.len(),
            ..EnrichReport::default()
        };
        info!(
            "{} TXIDs to fetch (skipping {} already done).",
            to_fetch.len(),
            report.already_done
        );

        tokio::pin!(shutdown);
        let total = to_fetch.len();
        let mut batch: Vec<LookupRecord> = Vec::with_capacity(request.checkpoint_every.min(total));

        for (i, txid) in to_fetch.iter().enumerate() {
            let resolved = tokio::select! {
                biased;
                () = &mut shutdown => None,
                resolved = self.resolve(txid) => Some(resolved),
            };

            let Some((record, how)) = resolved else {
                let completed = i;
                if !batch.is_empty() {
                    append_results(&request.output_csv, &batch)?;
                    info!(
                        "Final flush: wrote {} rows to '{}'.",
                        batch.len(),
                        request.output_csv.display()
                    );
                }
                return Err(Error::Interrupted { completed, total });
            };

            match how {
                Resolution::Invalid => {}
                Resolution::Cached => report.cache_hits += 1,
                Resolution::Fetched => report.fetched += 1,
            }
            if record.is_error() {
                report.failed += 1;
            }
            batch.push(record);

            let n = i + 1;
            if n % request.checkpoint_every == 0 || n == total {
                append_results(&request.output_csv, &batch)?;
                info!(
                    "Checkpoint: wrote {} rows to '{}' (i={}/{}).",
                    batch.len(),
                    request.output_csv.display(),
                    n,
                    total
                );
                batch.clear();
            }
        }

        report.results = load_results(&request.output_csv);

        if let Some(merged) = &request.merged_output_csv {
            let merge = merge_results(
                &request.input_csv,
                &request.txid_column,
                &report.results,
                merged,
            )?;
            report.merged_rows = Some(merge.rows);
        }

        Ok(report)
    }

    async fn resolve(&mut self, txid: &Txid) -> (LookupRecord, Resolution) {
        if !txid.is_well_formed() {
            debug!("{}: not a 64-character hex txid", txid);
            let record = LookupRecord::failed(txid, self.lookup.source_name(), INVALID_TXID_ERROR);
            return (record, Resolution::Invalid);
        }

        if let Some(record) = self.cached(txid) {
            debug!("{}: cache hit", txid.short());
            return (record, Resolution::Cached);
        }

        self.limiter.acquire().await;
        let record = lookup_with_retry(&self.lookup, txid, &self.policy).await;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(&record) {
                warn!("{}: could not cache lookup: {}", txid.short(), e);
            }
        }
        (record, Resolution::Fetched)
    }

    fn cached(&self, txid: &Txid) -> Option<LookupRecord> {
        let cache = self.cache.as_ref()?;
        match cache.get(txid) {
            Ok(record) => record,
            Err(e) => {
                warn!("{}: cache lookup failed: {}", txid.short(), e);
                None
            }
        }
    }
}
