use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::ReportError;

use super::unified::InputFormat;

const LOG_TARGET: &str = "    ingest";

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IngestionSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (the file was skipped).
    Error,
    /// Critical error (I/O or other infrastructure failures).
    Critical,
}

impl IngestionSeverity {
    /// Severity of a file-level failure.
    pub fn of(error: &ReportError) -> Self {
        match error {
            ReportError::Io(_) => Self::Critical,
            ReportError::Csv(err) => match err.kind() {
                ::csv::ErrorKind::Io(_) => Self::Critical,
                _ => Self::Error,
            },
            ReportError::Excel(
                calamine::Error::Io(_)
                | calamine::Error::Xlsx(calamine::XlsxError::Io(_))
                | calamine::Error::Xls(calamine::XlsError::Io(_))
                | calamine::Error::Xlsb(calamine::XlsbError::Io(_))
                | calamine::Error::Ods(calamine::OdsError::Io(_)),
            ) => Self::Critical,
            ReportError::Excel(_)
            | ReportError::SchemaMismatch { .. }
            | ReportError::ParseError { .. }
            | ReportError::Xlsx(_) => Self::Error,
            ReportError::Config { .. } | ReportError::Cancelled { .. } => Self::Critical,
        }
    }
}

/// Context about one file being read.
#[derive(Debug, Clone)]
pub struct IngestionContext {
    /// The input path.
    pub path: PathBuf,
    /// Format used to read it.
    pub format: InputFormat,
}

/// Stats reported when a file was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionStats {
    /// Number of non-empty sheets read.
    pub sheets: usize,
    /// Number of data rows across those sheets.
    pub rows: usize,
}

/// Observer interface for per-file ingestion outcomes.
pub trait IngestionObserver: Send + Sync {
    /// Called when a file was read.
    fn on_success(&self, _ctx: &IngestionContext, _stats: IngestionStats) {}

    /// Called when a file could not be read.
    fn on_failure(&self, _ctx: &IngestionContext, _severity: IngestionSeverity, _error: &ReportError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &ReportError) {
        self.on_failure(ctx, severity, error)
    }
}

/// Fans callbacks out to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn IngestionObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn IngestionObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl IngestionObserver for CompositeObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &ReportError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &ReportError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Forwards ingestion events to the `log` facade.
#[derive(Debug, Default)]
pub struct LogObserver;

impl IngestionObserver for LogObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        log::debug!(
            target: LOG_TARGET,
            "read {} ({:?}): {} sheet(s), {} row(s)",
            ctx.path.display(),
            ctx.format,
            stats.sheets,
            stats.rows
        );
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &ReportError) {
        log::warn!(target: LOG_TARGET, "skipping {} [{severity:?}]: {error}", ctx.path.display());
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &ReportError) {
        log::error!(target: LOG_TARGET, "cannot read {} [{severity:?}]: {error}", ctx.path.display());
    }
}

/// Appends ingestion events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl IngestionObserver for FileObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        self.append_line(&format!(
            "{}\tok\t{:?}\t{}\tsheets={}\trows={}",
            unix_ts(),
            ctx.format,
            ctx.path.display(),
            stats.sheets,
            stats.rows
        ));
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &ReportError) {
        self.append_line(&format!(
            "{}\t{severity:?}\t{:?}\t{}\t{error}",
            unix_ts(),
            ctx.format,
            ctx.path.display()
        ));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
