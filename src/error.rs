use std::path::PathBuf;

use thiserror::Error;

/// Convenience result type for report operations.
pub type ReportResult<T> = Result<T, ReportError>;

/// Error type returned by ingestion, configuration and rendering functions.
///
/// File-level variants (`Io`, `Excel`, `Csv`, `SchemaMismatch`, `ParseError`) are recovered by the
/// ingestion loop and recorded against the offending file. `Config` is fatal: it is raised before
/// any file is read.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Workbook could not be opened or a sheet could not be read.
    #[error("excel error: {0}")]
    Excel(#[from] calamine::Error),

    /// CSV export could not be read.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Output workbook could not be written.
    #[error("xlsx writer error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// The input does not have the shape required by the report (missing columns, no sheets, etc.).
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// A cell could not be interpreted where a value is mandatory (e.g. mapping table keys).
    #[error("failed to parse value at row {row} column '{column}': {message} (raw='{raw}')")]
    ParseError {
        row: usize,
        column: String,
        raw: String,
        message: String,
    },

    /// Invalid configuration: capacity ranges, mapping table, ignore patterns, paths.
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// The run was cancelled before every file finished; no partial result is returned.
    #[error("run cancelled after {completed} of {total} files")]
    Cancelled { completed: usize, total: usize },
}

impl ReportError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub(crate) fn schema(message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            message: message.into(),
        }
    }
}

/// A file that could not be processed, recorded instead of aborting the run.
#[derive(Debug)]
pub struct FileFailure {
    /// Path of the input file.
    pub path: PathBuf,
    /// Why the file was skipped.
    pub error: ReportError,
}
