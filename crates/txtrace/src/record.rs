//! Lookup result rows.
//!
//! A [`LookupRecord`] is one row of the results CSV. Field order is the
//! column order of the file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::esplora::TxStatus;
use crate::txid::Txid;

/// Column names of the results file, in order.
pub const RESULT_COLUMNS: [&str; 7] = [
    "txid",
    "block_height",
    "block_time_unix",
    "block_time_utc_iso",
    "block_hash",
    "api_source",
    "error",
];

/// Error text recorded for ids that are not 64 hex characters.
pub const INVALID_TXID_ERROR: &str = "Invalid TXID format";

/// Block information for one transaction, or the reason it is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupRecord {
    /// Normalized transaction id.
    pub txid: String,
    /// Height of the confirming block.
    pub block_height: Option<u64>,
    /// Block timestamp in unix seconds.
    pub block_time_unix: Option<i64>,
    /// Block timestamp as RFC 3339 UTC.
    pub block_time_utc_iso: Option<String>,
    /// Hash of the confirming block.
    pub block_hash: Option<String>,
    /// Which API produced this row.
    pub api_source: String,
    /// Failure description, empty on success.
    pub error: Option<String>,
}

impl LookupRecord {
    /// Build a record from an Esplora `status` object.
    ///
    /// Unconfirmed transactions produce empty block fields and no error.
    #[must_use]
    pub fn from_status(txid: &Txid, status: &TxStatus, api_source: &str) -> Self {
        if !status.confirmed {
            return Self::empty(txid, api_source, None);
        }
        Self {
            txid: txid.to_string(),
            block_height: status.block_height,
            block_time_unix: status.block_time,
            block_time_utc_iso: status.block_time.and_then(iso_utc),
            block_hash: status.block_hash.clone(),
            api_source: api_source.to_string(),
            error: None,
        }
    }

    /// Build a record for a lookup that failed.
    #[must_use]
    pub fn failed(txid: &Txid, api_source: &str, error: impl Into<String>) -> Self {
        Self::empty(txid, api_source, Some(error.into()))
    }

    fn empty(txid: &Txid, api_source: &str, error: Option<String>) -> Self {
        Self {
            txid: txid.to_string(),
            block_height: None,
            block_time_unix: None,
            block_time_utc_iso: None,
            block_hash: None,
            api_source: api_source.to_string(),
            error,
        }
    }

    /// Whether the lookup failed.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.as_deref().is_some_and(|e| !e.is_empty())
    }

    /// Whether the transaction was found in a block.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        !self.is_error() && self.block_height.is_some()
    }

    /// The normalized id of this row, if it has one.
    #[must_use]
    pub fn txid(&self) -> Option<Txid> {
        Txid::parse(&self.txid)
    }

    /// Cell values in [`RESULT_COLUMNS`] order.
    #[must_use]
    pub fn to_cells(&self) -> [String; 7] {
        [
            self.txid.clone(),
            self.block_height.map(|h| h.to_string()).unwrap_or_default(),
            self.block_time_unix
                .map(|t| t.to_string())
                .unwrap_or_default(),
            self.block_time_utc_iso.clone().unwrap_or_default(),
            self.block_hash.clone().unwrap_or_default(),
            self.api_source.clone(),
            self.error.clone().unwrap_or_default(),
        ]
    }
}

/// Format a unix timestamp as RFC 3339 UTC (`+00:00` offset).
#[must_use]
pub fn iso_utc(ts_unix: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(ts_unix, 0).map(|dt| dt.to_rfc3339())
}
