//! The results CSV, used both as output and as the resume checkpoint.
//!
//! Rows are only ever appended. A run that is restarted with the same
//! output path reads the file back and skips every txid already in it.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::record::{iso_utc, LookupRecord, RESULT_COLUMNS};
use crate::txid::Txid;

/// A results row as stored on disk, before lenient parsing.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StoredRow {
    txid: Option<String>,
    block_height: Option<String>,
    block_time_unix: Option<String>,
    block_time_utc_iso: Option<String>,
    block_hash: Option<String>,
    api_source: Option<String>,
    error: Option<String>,
}

/// Parse an integer cell, accepting float renderings such as `412345.0`.
fn parse_int(raw: Option<&str>) -> Option<i64> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }
    let value = raw.parse::<f64>().ok()?;
    if !(value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15) {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let whole = value as i64;
    Some(whole)
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl StoredRow {
    fn into_record(self) -> Option<LookupRecord> {
        let txid = Txid::parse(self.txid.as_deref()?)?;
        let block_time_unix = parse_int(self.block_time_unix.as_deref());
        let block_time_utc_iso =
            non_empty(self.block_time_utc_iso).or_else(|| block_time_unix.and_then(iso_utc));
        Some(LookupRecord {
            txid: txid.to_string(),
            block_height: parse_int(self.block_height.as_deref())
                .and_then(|h| u64::try_from(h).ok()),
            block_time_unix,
            block_time_utc_iso,
            block_hash: non_empty(self.block_hash),
            api_source: non_empty(self.api_source).unwrap_or_default(),
            error: non_empty(self.error),
        })
    }
}

fn is_missing_or_empty(path: &Path) -> bool {
    std::fs::metadata(path).map_or(true, |m| m.len() == 0)
}

fn read_results(path: &Path) -> Result<Vec<LookupRecord>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize::<StoredRow>() {
        if let Some(record) = row?.into_record() {
            records.push(record);
        }
    }
    Ok(records)
}

/// Load every row of an existing results file.
///
/// A missing or empty file yields no rows. So does a file that cannot be
/// parsed; that case is logged as a warning and the run starts over.
#[must_use]
pub fn load_results(path: impl AsRef<Path>) -> Vec<LookupRecord> {
    let path = path.as_ref();
    if is_missing_or_empty(path) {
        return Vec::new();
    }
    match read_results(path) {
        Ok(records) => {
            debug!("Loaded {} existing results from {}", records.len(), path.display());
            records
        }
        Err(e) => {
            warn!(
                "Could not read existing results from {}: {}; starting fresh",
                path.display(),
                e
            );
            Vec::new()
        }
    }
}

/// Append rows to a results file.
///
/// The header is written only when the file is missing or empty.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or written.
pub fn append_results(path: impl AsRef<Path>, records: &[LookupRecord]) -> Result<()> {
    let path = path.as_ref();
    let write_header = is_missing_or_empty(path);

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    if write_header {
        writer.write_record(RESULT_COLUMNS)?;
    }
    for record in records {
        writer.write_record(record.to_cells())?;
    }
    writer.flush()?;
    Ok(())
}

/// Txids that already have a row.
#[must_use]
pub fn completed_txids(records: &[LookupRecord]) -> HashSet<Txid> {
    records.iter().filter_map(LookupRecord::txid).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::esplora::TxStatus;

    fn confirmed(txid: &str, height: u64) -> LookupRecord {
        let status = TxStatus {
            confirmed: true,
            block_height: Some(height),
            block_hash: Some("00ff".to_string()),
            block_time: Some(1_470_167_388),
        };
        LookupRecord::from_status(&Txid::parse(txid).unwrap(), &status, "blockstream")
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_results(dir.path().join("none.csv")).is_empty());
    }

    #[test]
    fn test_append_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");

        append_results(&path, &[confirmed("aa", 1)]).unwrap();
        append_results(&path, &[confirmed("bb", 2), confirmed("cc", 3)]).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let header = RESULT_COLUMNS.join(",");
        assert_eq!(contents.matches(&header).count(), 1);
        assert!(contents.starts_with(&header));
        assert_eq!(contents.lines().count(), 4);
    }

    #[test]
    fn test_append_to_empty_file_writes_header() {
        let file = tempfile::NamedTempFile::new().unwrap();
        append_results(file.path(), &[confirmed("aa", 1)]).unwrap();

        let contents = std::fs::read_to_string(file.path()).unwrap();
        assert!(contents.starts_with("txid,block_height"));
    }

    #[test]
    fn test_reload_appended_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let failed = LookupRecord::failed(&Txid::parse("dd").unwrap(), "mempool", "HTTP 400");

        append_results(&path, &[confirmed("aa", 170), failed.clone()]).unwrap();
        let loaded = load_results(&path);

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], confirmed("aa", 170));
        assert_eq!(loaded[1], failed);
    }

    #[test]
    fn test_load_accepts_float_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        std::fs::write(
            &path,
            "txid,block_height,block_time_unix,block_time_utc_iso,block_hash,api_source,error\n\
             AA,412345.0,1470167388.0,,00ff,blockstream,\n\
             bb,,,,,blockstream,404 Not Found\n",
        )
        .unwrap();

        let loaded = load_results(&path);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].txid, "aa");
        assert_eq!(loaded[0].block_height, Some(412_345));
        assert_eq!(
            loaded[0].block_time_utc_iso.as_deref(),
            Some("2016-08-02T19:49:48+00:00")
        );
        assert!(loaded[0].error.is_none());
        assert_eq!(loaded[1].error.as_deref(), Some("404 Not Found"));
    }

    #[test]
    fn test_load_unreadable_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        std::fs::write(&path, b"txid,block_height\n\xc3\x28,1\n").unwrap();

        assert!(load_results(&path).is_empty());
    }

    #[test]
    fn test_completed_txids() {
        let records = vec![confirmed("AA", 1), confirmed("bb", 2)];
        let done = completed_txids(&records);
        assert!(done.contains(&Txid::parse("aa").unwrap()));
        assert!(done.contains(&Txid::parse("BB").unwrap()));
        assert_eq!(done.len(), 2);
    }
}
