//! Dataset totals and the expected-total check.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::{column_index, open_csv, Amount};
use crate::error::{Error, Result};

/// Label used for rows without an annotation.
pub const UNLABELLED: &str = "(unlabelled)";

/// Column names to read. Only `amount` must exist in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetColumns {
    /// Transferred quantity in BTC.
    pub amount: String,
    /// Analyst annotation.
    pub label: Option<String>,
    /// Source address.
    pub from: Option<String>,
    /// Destination address.
    pub to: Option<String>,
    /// Transfer time.
    pub time: Option<String>,
}

impl Default for DatasetColumns {
    fn default() -> Self {
        Self {
            amount: "amount".to_string(),
            label: Some("label".to_string()),
            from: Some("from_address".to_string()),
            to: Some("to_address".to_string()),
            time: Some("timestamp".to_string()),
        }
    }
}

/// Per-label aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LabelTotal {
    /// Rows carrying this label.
    pub rows: usize,
    /// Sum of their amounts.
    pub total: Amount,
}

/// Aggregates over a transaction dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatasetSummary {
    /// Data rows read.
    pub rows: usize,
    /// Rows whose amount cell was empty.
    pub rows_without_amount: usize,
    /// Sum of all amounts.
    pub total: Amount,
    /// Totals keyed by label.
    pub by_label: BTreeMap<String, LabelTotal>,
    /// Distinct addresses seen as source or destination.
    pub distinct_addresses: usize,
    /// Earliest parseable timestamp.
    pub earliest: Option<DateTime<Utc>>,
    /// Latest parseable timestamp.
    pub latest: Option<DateTime<Utc>>,
}

impl DatasetSummary {
    /// Check that the total is within `tolerance` of `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TotalMismatch`] when the difference is larger.
    pub fn check_total(&self, expected: Amount, tolerance: Amount) -> Result<()> {
        if self.total.abs_diff(expected) <= tolerance {
            info!("Total {} BTC matches expected {} BTC", self.total, expected);
            Ok(())
        } else {
            Err(Error::TotalMismatch {
                actual: self.total.to_string(),
                expected: expected.to_string(),
                tolerance: tolerance.to_string(),
            })
        }
    }
}

/// Parse a timestamp cell.
///
/// Accepts unix seconds, RFC 3339, `YYYY-MM-DD HH:MM:SS` (also with `T`)
/// and `YYYY-MM-DD`. Naive values are read as UTC.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(secs) = raw.parse::<i64>() {
        return DateTime::<Utc>::from_timestamp(secs, 0);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Optional column index; a configured but absent column is skipped.
fn optional_index(headers: &csv::StringRecord, column: Option<&str>) -> Option<usize> {
    let column = column?;
    let idx = headers.iter().position(|h| h == column);
    if idx.is_none() {
        debug!("Column '{}' not present, skipping", column);
    }
    idx
}

fn cell(row: &csv::StringRecord, idx: Option<usize>) -> Option<&str> {
    idx.and_then(|i| row.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Summarize a transaction dataset.
///
/// # Errors
///
/// Returns an error if the file cannot be read, the amount column is
/// missing, or an amount cell cannot be parsed.
pub fn summarize(path: impl AsRef<Path>, columns: &DatasetColumns) -> Result<DatasetSummary> {
    let path = path.as_ref();
    let mut reader = open_csv(path)?;
    let headers = reader.headers()?.clone();

    let amount_idx = column_index(&headers, &columns.amount, path)?;
    let label_idx = optional_index(&headers, columns.label.as_deref());
    let from_idx = optional_index(&headers, columns.from.as_deref());
    let to_idx = optional_index(&headers, columns.to.as_deref());
    let time_idx = optional_index(&headers, columns.time.as_deref());

    let mut summary = DatasetSummary::default();
    let mut addresses: HashSet<String> = HashSet::new();

    for (i, row) in reader.records().enumerate() {
        let row = row?;
        let row_number = i + 1;
        summary.rows += 1;

        let amount = match cell(&row, Some(amount_idx)) {
            Some(raw) => raw.parse::<Amount>().map_err(|e| Error::InvalidAmount {
                value: raw.to_string(),
                row: row_number,
                reason: e.to_string(),
            })?,
            None => {
                summary.rows_without_amount += 1;
                Amount::ZERO
            }
        };

        let overflow = || Error::InvalidAmount {
            value: amount.to_string(),
            row: row_number,
            reason: "running total overflows".to_string(),
        };
        summary.total = summary.total.checked_add(amount).ok_or_else(overflow)?;

        let label = cell(&row, label_idx).unwrap_or(UNLABELLED).to_string();
        let entry = summary.by_label.entry(label).or_default();
        entry.rows += 1;
        entry.total = entry.total.checked_add(amount).ok_or_else(overflow)?;

        for address in [cell(&row, from_idx), cell(&row, to_idx)].into_iter().flatten() {
            addresses.insert(address.to_string());
        }

        if let Some(ts) = cell(&row, time_idx).and_then(parse_timestamp) {
            summary.earliest = Some(summary.earliest.map_or(ts, |e| e.min(ts)));
            summary.latest = Some(summary.latest.map_or(ts, |l| l.max(ts)));
        }
    }

    summary.distinct_addresses = addresses.len();
    info!(
        "Summarized {} rows from {}: total {} BTC",
        summary.rows,
        path.display(),
        summary.total
    );
    Ok(summary)
}
