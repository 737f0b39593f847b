//! CSV export ingestion.

use std::path::Path;

use crate::error::{ReportError, ReportResult};
use crate::types::{RawTable, Value};

/// Read a CSV export into a single [`RawTable`] named after the file stem.
///
/// Rules:
///
/// - The first record is the header row.
/// - Ragged records are accepted; missing trailing cells read as null.
/// - Cells are kept as text; the row normalizer coerces numbers.
pub fn read_csv(path: impl AsRef<Path>) -> ReportResult<RawTable> {
    let path = path.as_ref();
    let sheet = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("csv")
        .to_string();

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)?;
    read_csv_from_reader(&mut rdr, sheet)
}

/// Read CSV data from an existing CSV reader.
pub fn read_csv_from_reader<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
    sheet: impl Into<String>,
) -> ReportResult<RawTable> {
    let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.trim_start_matches('\u{feff}').to_string()).collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(ReportError::schema("csv has no header row"));
    }

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        rows.push(record.iter().map(Value::from_text).collect());
    }

    Ok(RawTable::new(sheet, 1, headers, rows))
}
