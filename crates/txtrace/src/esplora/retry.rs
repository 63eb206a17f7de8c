//! Retrying lookups.
//!
//! [`lookup_with_retry`] always yields a [`LookupRecord`]. Permanent
//! failures and exhausted retries end up in the record's `error` column
//! instead of aborting the run.

use std::time::Duration;

use tracing::{debug, warn};

use super::{FetchError, TxLookup};
use crate::record::LookupRecord;
use crate::txid::Txid;

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default base of the backoff curve.
pub const DEFAULT_BACKOFF_BASE: f64 = 0.8;

/// How often and how long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Base of `base^attempt` in the delay formula.
    pub backoff_base: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, after the `attempt`-th failure (1-based).
    ///
    /// `base^attempt * (1.5 + (attempt % 3) * 0.2)` seconds.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let factor = 1.5 + f64::from(attempt % 3) * 0.2;
        let secs = self.backoff_base.powi(exp) * factor;
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
    }
}

/// What to do after a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Disposition {
    /// Give up and record this error.
    Final(String),
    /// Try again; record this error if retries run out.
    Retry(String),
}

fn disposition(err: &FetchError, max_retries: u32) -> Disposition {
    match err {
        FetchError::Status(404) => Disposition::Final("404 Not Found".to_string()),
        FetchError::Status(code) if (400..500).contains(code) && *code != 429 => {
            Disposition::Final(format!("HTTP {code}"))
        }
        FetchError::Status(_) => {
            Disposition::Retry(format!("HTTP error after {max_retries} retries"))
        }
        FetchError::Connect(_) | FetchError::Timeout(_) => {
            Disposition::Retry(format!("Network/Timeout after {max_retries} retries"))
        }
        FetchError::Decode(msg) | FetchError::Other(msg) => {
            Disposition::Final(format!("Unexpected: {}: {msg}", err.kind()))
        }
    }
}

/// Look up one transaction, retrying transient failures.
pub async fn lookup_with_retry(
    lookup: &dyn TxLookup,
    txid: &Txid,
    policy: &RetryPolicy,
) -> LookupRecord {
    let source = lookup.source_name();
    let mut attempt: u32 = 0;

    loop {
        let err = match lookup.fetch_status(txid).await {
            Ok(status) => return LookupRecord::from_status(txid, &status, source),
            Err(err) => err,
        };

        match disposition(&err, policy.max_retries) {
            Disposition::Final(message) => {
                debug!("{}: {} ({})", txid.short(), message, err);
                return LookupRecord::failed(txid, source, message);
            }
            Disposition::Retry(exhausted) => {
                attempt += 1;
                if attempt > policy.max_retries {
                    warn!("{}: giving up: {}", txid.short(), err);
                    return LookupRecord::failed(txid, source, exhausted);
                }
                let delay = policy.delay(attempt);
                debug!(
                    "{}: {} - retry {}/{} in {:?}",
                    txid.short(),
                    err,
                    attempt,
                    policy.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
