//! Spreadsheet ingestion.
//!
//! Most callers should use [`read_tables`] (from [`unified`]) which:
//!
//! - detects the format by file extension (or you can override via [`IngestionOptions`])
//! - reads the selected sheets into [`crate::types::RawTable`]s without interpreting cells
//! - optionally reports success/failure/alerts to an [`IngestionObserver`]
//!
//! [`discover_inputs`] lists the exports of a source directory. Format-specific readers live under
//! [`csv`] and [`excel`].

pub mod csv;
pub mod excel;
pub mod observability;
pub mod unified;

pub use excel::SheetSelection;
pub use observability::{
    CompositeObserver, FileObserver, IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats,
    LogObserver,
};
pub use unified::{IngestionOptions, InputFormat, discover_inputs, read_tables};
