//! Workbook ingestion (`.xlsx`, `.xlsm`, `.xls`, `.xlsb`, `.ods`) via calamine.

use std::path::Path;

use calamine::{Data, Range, Reader, open_workbook_auto};

use crate::error::{ReportError, ReportResult};
use crate::types::{RawTable, Value};

/// How to choose sheet(s) when reading a workbook.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SheetSelection {
    /// Read every sheet; sheets that lack the report's columns are skipped later.
    #[default]
    AllSheets,
    /// Read the first sheet only.
    First,
    /// Read the listed sheets, in order. A missing sheet is an error.
    Sheets(Vec<String>),
}

impl SheetSelection {
    /// Whether sheets were named explicitly (and must therefore satisfy the schema).
    pub fn is_explicit(&self) -> bool {
        matches!(self, Self::Sheets(_))
    }
}

/// Read the selected sheets of a workbook into raw tables.
///
/// Behavior:
/// - Detects the first non-empty row of each sheet as its header row
/// - Sheets without any non-empty row are skipped
/// - Blank data rows are kept (callers skip them) so row numbers match the sheet
/// - Cells keep their native type; nothing is coerced here
pub fn read_workbook(path: impl AsRef<Path>, selection: &SheetSelection) -> ReportResult<Vec<RawTable>> {
    let mut workbook = open_workbook_auto(path)?;

    let available = workbook.sheet_names();
    let sheets: Vec<String> = match selection {
        SheetSelection::AllSheets => available,
        SheetSelection::First => available.into_iter().take(1).collect(),
        SheetSelection::Sheets(names) => {
            if let Some(missing) = names.iter().find(|n| !available.contains(n)) {
                return Err(ReportError::schema(format!(
                    "sheet '{missing}' not found. sheets={available:?}"
                )));
            }
            names.clone()
        }
    };
    if sheets.is_empty() {
        return Err(ReportError::schema("workbook has no sheets"));
    }

    let mut tables = Vec::with_capacity(sheets.len());
    for sheet in sheets {
        let range = workbook.worksheet_range(&sheet)?;
        if let Some(table) = range_to_table(&sheet, &range) {
            tables.push(table);
        }
    }
    Ok(tables)
}

/// Read a single named sheet, failing if it is absent or empty.
pub fn read_sheet(path: impl AsRef<Path>, sheet: &str) -> ReportResult<RawTable> {
    let mut tables = read_workbook(path, &SheetSelection::Sheets(vec![sheet.to_string()]))?;
    tables
        .pop()
        .ok_or_else(|| ReportError::schema(format!("sheet '{sheet}' has no non-empty rows (no header row found)")))
}

fn range_to_table(sheet: &str, range: &Range<Data>) -> Option<RawTable> {
    let mut rows = range.rows().enumerate();

    let (header_idx, headers) = rows.by_ref().find_map(|(idx0, row)| {
        let non_empty = row.iter().any(|c| !matches!(c, Data::Empty));
        non_empty.then(|| (idx0, row.iter().map(cell_to_header_string).collect::<Vec<_>>()))
    })?;

    let data: Vec<Vec<Value>> = rows
        .map(|(_, row)| row.iter().map(cell_to_value).collect::<Vec<_>>())
        .collect();

    // Range rows are relative to the range start; report 1-based sheet row numbers.
    let start_row = range.start().map_or(0, |(r, _)| r as usize);
    Some(RawTable::new(sheet, start_row + header_idx + 1, headers, data))
}

fn cell_to_header_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.trim().to_string(),
        Data::Empty => String::new(),
        other => cell_to_value(other).to_string(),
    }
}

fn cell_to_value(c: &Data) -> Value {
    match c {
        Data::Empty => Value::Null,
        Data::String(s) => Value::from_text(s),
        Data::Int(i) => Value::Int64(*i),
        Data::Float(f) => Value::Float64(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => Value::Utf8(dt.to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Utf8(s.clone()),
        // Keep the error marker (e.g. `#N/A`) so numeric coercion rejects it explicitly.
        Data::Error(e) => Value::Utf8(e.to_string()),
    }
}
