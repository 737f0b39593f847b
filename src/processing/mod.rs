//! Row normalization, capacity classification, aggregation and segregation.
//!
//! The pipeline for one sheet is:
//!
//! - [`ColumnLayout::resolve`] locates the schema's columns once per sheet
//! - [`RowNormalizer::normalize`] turns each row into a [`crate::types::NormalizedRecord`] or a
//!   [`RowRejection`]
//! - [`CapacityRanges::classify`] assigns a disk-capacity bucket (disk report)
//! - [`DiskTallies::fold`] / [`ClusterTallies::fold`] count the record into a private partial
//!
//! Partials from different files are combined with [`Merge::merge`], then split into renderable
//! tables by [`segregate_disk`] / [`segregate_cluster`].
//!
//! ## Example: classify and fold
//!
//! ```rust
//! use vm_inventory_report::processing::{CapacityRanges, DiskKey, DiskTallies, Merge};
//! use vm_inventory_report::types::NormalizedRecord;
//!
//! let ranges = CapacityRanges::default();
//! let vm = NormalizedRecord {
//!     vm_name: Some("web-1".to_string()),
//!     os_label: "Windows Server 2016".to_string(),
//!     tools_os_label: None,
//!     connection_state: "connected".to_string(),
//!     disk_capacity_mb: 140.0,
//!     cluster_name: Some("ClusterA".to_string()),
//!     vcenter: None,
//!     cpu_count: None,
//!     memory_mb: None,
//! };
//!
//! let mut a = DiskTallies::default();
//! a.fold(&vm, ranges.classify(vm.disk_capacity_mb).unwrap());
//! let merged = a.clone().merge(a);
//!
//! let key = DiskKey::new("Windows Server 2016", "0 MB - 150 MB");
//! assert_eq!(merged.get(&key).unwrap().count, 2);
//! ```

pub mod aggregate;
pub mod classify;
pub mod normalize;
pub mod segregate;

pub use aggregate::{
    ALL_CAPACITIES, ClusterKey, ClusterPartial, ClusterTallies, DiskKey, DiskPartial, DiskTallies, HostCounts, Merge,
    OrphanVm, PHOTON_OS, RowStats, Tally, is_variant,
};
pub use classify::{CapacityRange, CapacityRanges, ClassifyError};
pub use normalize::{
    ColumnLayout, RejectionCounts, RejectionKind, RowFilters, RowNormalizer, RowRejection, is_blank_row,
};
pub use segregate::{ClusterSegregation, DiskSegregation, segregate_cluster, segregate_disk};
