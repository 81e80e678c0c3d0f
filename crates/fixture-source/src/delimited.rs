//! CSV fixture parsing.
//!
//! The first row names the columns; every following row is one record. CSV
//! records carry no names of their own, so they are named after the entity:
//! `<record_prefix>_1`, `<record_prefix>_2`, ...

use fixture_core::{FixtureError, Record, RecordSet, Result};
use std::path::Path;

/// Parse (already template-expanded) CSV fixture text into a record set.
pub fn parse(text: &str, record_prefix: &str, path: &Path) -> Result<RecordSet> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut rows = reader.records();

    let headers: Vec<String> = match rows.next() {
        Some(row) => row
            .map_err(|e| csv_error(path, e))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect(),
        None => return Ok(RecordSet::new()),
    };
    tracing::debug!("CSV headers/columns: {headers:?}");

    let mut set = RecordSet::new();
    for (i, row) in rows.enumerate() {
        let row = row.map_err(|e| csv_error(path, e))?;
        let number = i + 1;

        if row.len() > headers.len() {
            return Err(FixtureError::format(
                path,
                format!(
                    "column count mismatch in CSV row {number}: expected at most {} columns ({}), but found {}",
                    headers.len(),
                    headers.join(", "),
                    row.len()
                ),
            ));
        }

        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(column, cell)| (column.clone(), cell.trim().to_string()))
            .collect();

        set.insert(format!("{record_prefix}_{number}"), record)
            .map_err(|dup| FixtureError::format(path, dup.to_string()))?;
    }

    Ok(set)
}

fn csv_error(path: &Path, e: csv::Error) -> FixtureError {
    FixtureError::format(path, format!("a CSV error occurred: {e}"))
}
