use crate::engine::{Reconciler, Reconciliation};
use crate::error::Result;
use crate::schema::{RawCell, RawRow, ReconcilerConfig};
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, info};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Reads a header-first CSV feed into raw rows.
///
/// Headers and cells are trimmed, empty cells become [`RawCell::Null`], rows
/// shorter than the header simply lack the trailing columns, and rows with no
/// non-blank cell are dropped.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<RawRow>> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let mut rows = Vec::new();
    let mut blank = 0;

    for record in csv_reader.records() {
        match row_from_record(&headers, &record?) {
            Some(row) => rows.push(row),
            None => blank += 1,
        }
    }

    debug!("Read {} rows ({} blank rows dropped)", rows.len(), blank);
    Ok(rows)
}

/// Converts one already-tokenized record into a raw row, or `None` when every
/// cell is blank.
pub fn row_from_record(headers: &StringRecord, record: &StringRecord) -> Option<RawRow> {
    if record.iter().all(|cell| cell.trim().is_empty()) {
        return None;
    }

    let row = headers
        .iter()
        .zip(record.iter())
        .filter(|(header, _)| !header.is_empty())
        .map(|(header, cell)| {
            let cell = if cell.trim().is_empty() {
                RawCell::Null
            } else {
                RawCell::Text(cell.to_string())
            };
            (header.to_string(), cell)
        })
        .collect();

    Some(row)
}

pub fn load_feed(path: impl AsRef<Path>) -> Result<Vec<RawRow>> {
    let path = path.as_ref();
    let rows = read_rows(File::open(path)?)?;
    info!("Loaded {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Loads the actual and budget feeds. Either failure aborts the whole load.
pub fn load_feeds(
    actual_path: impl AsRef<Path>,
    budget_path: impl AsRef<Path>,
) -> Result<(Vec<RawRow>, Vec<RawRow>)> {
    let actual = load_feed(actual_path)?;
    let budget = load_feed(budget_path)?;
    Ok((actual, budget))
}

/// Loads both feeds from disk and reconciles them with `config`.
pub fn reconcile_files(
    actual_path: impl AsRef<Path>,
    budget_path: impl AsRef<Path>,
    config: ReconcilerConfig,
) -> Result<Reconciliation> {
    let reconciler = Reconciler::new(config)?;
    let (actual, budget) = load_feeds(actual_path, budget_path)?;
    reconciler.reconcile(&actual, &budget)
}
