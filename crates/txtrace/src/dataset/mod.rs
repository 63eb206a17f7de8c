//! Transaction dataset access.
//!
//! The dataset is a CSV export of the traced transactions: one row per
//! transfer with a txid, timestamp, source and destination address, amount
//! and an analyst label such as `seized` or `linked wallet`.

pub mod amount;
pub mod summary;

use std::collections::HashSet;
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::txid::Txid;

pub use amount::{Amount, ParseAmountError};
pub use summary::{summarize, DatasetColumns, DatasetSummary, LabelTotal};

/// Open a CSV file with a header row, tolerating ragged rows.
pub(crate) fn open_csv(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    Ok(csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)?)
}

/// Index of `column` in `headers`.
///
/// # Errors
///
/// Returns [`Error::MissingColumn`] listing the available columns.
pub(crate) fn column_index(headers: &csv::StringRecord, column: &str, path: &Path) -> Result<usize> {
    headers.iter().position(|h| h == column).ok_or_else(|| {
        Error::missing_column(
            column,
            path,
            headers.iter().map(str::to_string).collect(),
        )
    })
}

/// Read the distinct txids of `column`, in first-seen order.
///
/// Empty cells are skipped; ids are trimmed and lowercased before
/// de-duplication.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the column is missing.
pub fn unique_txids(path: impl AsRef<Path>, column: &str) -> Result<Vec<Txid>> {
    let path = path.as_ref();
    let mut reader = open_csv(path)?;
    let idx = column_index(reader.headers()?, column, path)?;

    let mut seen = HashSet::new();
    let mut txids = Vec::new();
    for row in reader.records() {
        let row = row?;
        let Some(txid) = row.get(idx).and_then(Txid::parse) else {
            continue;
        };
        if seen.insert(txid.clone()) {
            txids.push(txid);
        }
    }

    debug!("Read {} unique txids from {}", txids.len(), path.display());
    Ok(txids)
}
