//! Joining lookup results back onto the input dataset.

use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use crate::dataset::{column_index, open_csv};
use crate::error::{Error, Result};
use crate::record::{LookupRecord, RESULT_COLUMNS};
use crate::txid::Txid;

/// Suffix for result columns whose name is already taken by the input.
pub const COLLISION_SUFFIX: &str = "_lookup";

/// Counts from a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Input rows written.
    pub rows: usize,
    /// Rows that found a result.
    pub matched: usize,
}

/// Which result columns to emit, and under what names.
///
/// Returns `(index into RESULT_COLUMNS, output name)` pairs.
fn result_columns(input_headers: &csv::StringRecord, txid_column: &str) -> Vec<(usize, String)> {
    RESULT_COLUMNS
        .iter()
        .enumerate()
        .filter(|(_, name)| !(**name == "txid" && txid_column == "txid"))
        .map(|(i, name)| {
            let taken = input_headers.iter().any(|h| h == *name);
            let output = if taken {
                format!("{name}{COLLISION_SUFFIX}")
            } else {
                (*name).to_string()
            };
            (i, output)
        })
        .collect()
}

/// Left-join `results` onto every row of `input` and write `output`.
///
/// Txids are compared after normalization. When several results share a
/// txid the last one wins. Rows without a result get empty result cells.
///
/// The merged rows go to a temporary file next to `output` that replaces it
/// once complete, so `output` may be the input file itself.
///
/// # Errors
///
/// Returns an error if either file cannot be read or written, or if
/// `txid_column` is not in the input header.
pub fn merge_results(
    input: impl AsRef<Path>,
    txid_column: &str,
    results: &[LookupRecord],
    output: impl AsRef<Path>,
) -> Result<MergeReport> {
    let input = input.as_ref();
    let output = output.as_ref();

    let mut reader = open_csv(input)?;
    let headers = reader.headers()?.clone();
    let key_idx = column_index(&headers, txid_column, input)?;
    let extra = result_columns(&headers, txid_column);

    let by_txid: HashMap<Txid, &LookupRecord> = results
        .iter()
        .filter_map(|r| r.txid().map(|t| (t, r)))
        .collect();

    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let staged = tempfile::NamedTempFile::new_in(dir)?;
    let mut writer = csv::Writer::from_writer(staged);
    let mut header_out: Vec<String> = headers.iter().map(str::to_string).collect();
    header_out.extend(extra.iter().map(|(_, name)| name.clone()));
    writer.write_record(&header_out)?;

    let mut report = MergeReport::default();
    for row in reader.records() {
        let row = row?;
        let mut cells: Vec<String> = (0..headers.len())
            .map(|i| row.get(i).unwrap_or_default().to_string())
            .collect();

        let found = row
            .get(key_idx)
            .and_then(Txid::parse)
            .and_then(|t| by_txid.get(&t));
        match found {
            Some(record) => {
                let values = record.to_cells();
                cells.extend(extra.iter().map(|(i, _)| values[*i].clone()));
                report.matched += 1;
            }
            None => cells.extend(extra.iter().map(|_| String::new())),
        }

        writer.write_record(&cells)?;
        report.rows += 1;
    }
    let staged = writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))?;
    staged.persist(output).map_err(|e| Error::Io(e.error))?;

    info!(
        "Enriched dataset written to '{}' ({} of {} rows matched)",
        output.display(),
        report.matched,
        report.rows
    );
    Ok(report)
}
