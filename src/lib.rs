//! `vm-inventory-report` aggregates virtual machine inventory exports (RVTools-style `vInfo`
//! sheets) into a single summary workbook.
//!
//! Two reports are supported, selected by [`types::ReportVariant`]:
//!
//! - **Disk**: VMs counted per operating system and disk-capacity range, with per-range subtotals,
//!   a grand total, a separate `All Capacities` section for Photon OS appliances, and a list of VMs
//!   without a cluster.
//! - **Cluster**: VMs, CPUs, memory and disk summed per cluster (optionally grouped by country via
//!   a [`mapping::MappingTable`]), plus the list of standalone VMs.
//!
//! ## Pipeline
//!
//! 1. [`ingestion::discover_inputs`] lists the spreadsheets of the source directory.
//! 2. [`execution::ExecutionEngine`] processes one file per task on a bounded rayon pool. Each task
//!    reads the file ([`ingestion::read_tables`]), normalizes every row
//!    ([`processing::RowNormalizer`]), classifies it ([`processing::CapacityRanges`]) and folds it
//!    into a private partial.
//! 3. Partials are merged on the calling thread. Merging is commutative and associative, so the
//!    result does not depend on completion order.
//! 4. [`processing::segregate_disk`] / [`processing::segregate_cluster`] split the merged tallies
//!    and [`report`] renders them with `rust_xlsxwriter`.
//!
//! A file that cannot be read or lacks the required columns is recorded as a
//! [`error::FileFailure`] and the run continues. Rows that cannot be used are counted by reason.
//!
//! ## Example
//!
//! ```no_run
//! use vm_inventory_report::config::ReportConfig;
//! use vm_inventory_report::report::{RunHooks, run};
//! use vm_inventory_report::types::ReportVariant;
//!
//! # fn main() -> Result<(), vm_inventory_report::ReportError> {
//! let mut config = ReportConfig::new(ReportVariant::Disk);
//! config.source_dir = "exports".into();
//! config.output_name = "capacity".to_string();
//!
//! let summary = run(&config, &RunHooks::default())?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod execution;
pub mod ingestion;
pub mod mapping;
pub mod processing;
pub mod report;
pub mod types;

pub use error::{ReportError, ReportResult};
