//! Unified ingestion entrypoint and input discovery.
//!
//! - [`discover_inputs`] lists the spreadsheet exports directly under a source directory.
//! - [`read_tables`] reads one export into [`RawTable`]s, choosing the reader from the file
//!   extension (or [`IngestionOptions::format`]) and reporting the outcome to an optional
//!   [`IngestionObserver`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;

use crate::error::{ReportError, ReportResult};
use crate::types::RawTable;

use super::excel::{self, SheetSelection};
use super::observability::{IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats};

const LOG_TARGET: &str = "  discover";

/// Supported input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// Comma-separated export.
    Csv,
    /// Spreadsheet/workbook formats.
    Excel,
}

impl InputFormat {
    /// Parse an input format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Some(Self::Excel),
            _ => None,
        }
    }

    /// Format of a path, inferred from its extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension().and_then(|s| s.to_str()).and_then(Self::from_extension)
    }
}

/// Options controlling how a single export is read.
#[derive(Clone)]
pub struct IngestionOptions {
    /// If `None`, detect the format from the file extension.
    pub format: Option<InputFormat>,
    /// Which workbook sheets to read (ignored for CSV).
    pub sheet_selection: SheetSelection,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn IngestionObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: IngestionSeverity,
}

impl fmt::Debug for IngestionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionOptions")
            .field("format", &self.format)
            .field("sheet_selection", &self.sheet_selection)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            format: None,
            sheet_selection: SheetSelection::default(),
            observer: None,
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }
}

/// Read one export into raw tables.
///
/// When an observer is configured, this function reports:
///
/// - `on_success` with sheet/row counts
/// - `on_failure` with a computed severity
/// - `on_alert` when that severity is >= `options.alert_at_or_above`
pub fn read_tables(path: impl AsRef<Path>, options: &IngestionOptions) -> ReportResult<Vec<RawTable>> {
    let path = path.as_ref();
    let format = match options.format {
        Some(f) => f,
        None => InputFormat::from_path(path).ok_or_else(|| {
            ReportError::schema(format!("cannot infer input format for path ({})", path.display()))
        })?,
    };

    let result = match format {
        InputFormat::Csv => super::csv::read_csv(path).map(|t| vec![t]),
        InputFormat::Excel => excel::read_workbook(path, &options.sheet_selection),
    };

    if let Some(obs) = options.observer.as_ref() {
        let ctx = IngestionContext {
            path: path.to_path_buf(),
            format,
        };
        match &result {
            Ok(tables) => obs.on_success(
                &ctx,
                IngestionStats {
                    sheets: tables.len(),
                    rows: tables.iter().map(RawTable::row_count).sum(),
                },
            ),
            Err(e) => {
                let sev = IngestionSeverity::of(e);
                obs.on_failure(&ctx, sev, e);
                if sev >= options.alert_at_or_above {
                    obs.on_alert(&ctx, sev, e);
                }
            }
        }
    }

    result
}

/// List spreadsheet exports directly under `dir` (non-recursive), sorted by path.
///
/// Hidden files and Office lock files (`~$name.xlsx`) are skipped. A missing directory is a
/// configuration error; an empty one yields an empty list.
pub fn discover_inputs(dir: impl AsRef<Path>) -> ReportResult<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(ReportError::config(format!(
            "source directory '{}' does not exist or is not a directory",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| match e.into_io_error() {
            Some(io) => ReportError::Io(io),
            None => ReportError::config(format!("cannot list '{}'", dir.display())),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') || name.starts_with("~$") {
            log::debug!(target: LOG_TARGET, "ignoring {name}");
            continue;
        }
        if InputFormat::from_path(entry.path()).is_some() {
            files.push(entry.into_path());
        }
    }

    log::info!(target: LOG_TARGET, "found {} input file(s) in {}", files.len(), dir.display());
    Ok(files)
}
