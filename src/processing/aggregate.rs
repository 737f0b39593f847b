//! Per-key tallies and their merge.
//!
//! Every worker folds its records into a private partial; the orchestrator combines partials with
//! [`Merge::merge`]. All sums are stored as integers so merging is exactly commutative and
//! associative: any split of the input across workers and any arrival order give the same result.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::NormalizedRecord;

use super::classify::CapacityRange;
use super::normalize::RejectionCounts;

/// Bucket label of the vendor-variant section.
pub const ALL_CAPACITIES: &str = "All Capacities";

/// OS label tallied a second time under [`ALL_CAPACITIES`].
pub const PHOTON_OS: &str = "VMware Photon OS (64-bit)";

/// MB per TB, as used in cluster summaries.
pub const MB_PER_TB: f64 = 1_048_576.0;

/// MB per GB.
pub const MB_PER_GB: f64 = 1024.0;

/// Commutative, associative combination of two partial results.
pub trait Merge: Sized {
    fn merge(self, other: Self) -> Self;
}

/// Counters for one aggregate key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub count: u64,
    /// Disk capacity in thousandths of a MB.
    pub disk_kb: u64,
    pub cpus: u64,
    pub memory_mb: u64,
}

impl Tally {
    /// Tally of a single record.
    pub fn of(record: &NormalizedRecord) -> Self {
        Self {
            count: 1,
            disk_kb: to_fixed(record.disk_capacity_mb * 1000.0),
            cpus: to_fixed(record.cpu_count.unwrap_or(0.0)),
            memory_mb: to_fixed(record.memory_mb.unwrap_or(0.0)),
        }
    }

    /// Field-wise sum, saturating at `u64::MAX`.
    pub fn add(&mut self, other: &Self) {
        self.count = self.count.saturating_add(other.count);
        self.disk_kb = self.disk_kb.saturating_add(other.disk_kb);
        self.cpus = self.cpus.saturating_add(other.cpus);
        self.memory_mb = self.memory_mb.saturating_add(other.memory_mb);
    }

    pub fn disk_mb(&self) -> f64 {
        self.disk_kb as f64 / 1000.0
    }

    pub fn disk_tb(&self) -> f64 {
        self.disk_mb() / MB_PER_TB
    }

    pub fn memory_gb(&self) -> f64 {
        self.memory_mb as f64 / MB_PER_GB
    }
}

impl Merge for Tally {
    fn merge(mut self, other: Self) -> Self {
        self.add(&other);
        self
    }
}

fn to_fixed(v: f64) -> u64 {
    if v.is_finite() && v > 0.0 { v.round() as u64 } else { 0 }
}

fn merge_maps<K: Ord>(mut into: BTreeMap<K, Tally>, from: BTreeMap<K, Tally>) -> BTreeMap<K, Tally> {
    for (k, t) in from {
        into.entry(k).or_default().add(&t);
    }
    into
}

/// Disk report key: OS label and capacity bucket (a range label or [`ALL_CAPACITIES`]).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DiskKey {
    pub os_label: String,
    pub bucket: String,
    /// VMware Tools OS label; only set on [`ALL_CAPACITIES`] keys.
    pub tools_label: Option<String>,
}

impl DiskKey {
    pub fn new(os_label: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            os_label: os_label.into(),
            bucket: bucket.into(),
            tools_label: None,
        }
    }

    /// Key of the `All Capacities` section.
    pub fn variant(os_label: impl Into<String>, tools_label: Option<&str>) -> Self {
        Self {
            os_label: os_label.into(),
            bucket: ALL_CAPACITIES.to_string(),
            tools_label: tools_label.map(str::to_string),
        }
    }

    pub fn is_variant(&self) -> bool {
        self.bucket == ALL_CAPACITIES
    }
}

/// Whether a record belongs to the vendor variant (exact, case-sensitive match).
pub fn is_variant(record: &NormalizedRecord) -> bool {
    record.os_label == PHOTON_OS || record.tools_os_label.as_deref() == Some(PHOTON_OS)
}

/// Tallies keyed by [`DiskKey`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskTallies {
    tallies: BTreeMap<DiskKey, Tally>,
}

impl DiskTallies {
    /// Count one record under its range; variant records are also counted under
    /// `(os_label, All Capacities, tools_os_label)`.
    pub fn fold(&mut self, record: &NormalizedRecord, range: &CapacityRange) {
        let tally = Tally::of(record);
        self.tallies
            .entry(DiskKey::new(record.os_label.as_str(), range.label.as_str()))
            .or_default()
            .add(&tally);
        if is_variant(record) {
            self.tallies
                .entry(DiskKey::variant(record.os_label.as_str(), record.tools_os_label.as_deref()))
                .or_default()
                .add(&tally);
        }
    }

    pub fn get(&self, key: &DiskKey) -> Option<&Tally> {
        self.tallies.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DiskKey, &Tally)> {
        self.tallies.iter()
    }

    pub fn len(&self) -> usize {
        self.tallies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tallies.is_empty()
    }

    /// Sum over every key, variant included.
    pub fn total(&self) -> Tally {
        self.tallies.values().fold(Tally::default(), |acc, t| acc.merge(*t))
    }

    pub(crate) fn into_inner(self) -> BTreeMap<DiskKey, Tally> {
        self.tallies
    }
}

impl Merge for DiskTallies {
    fn merge(self, other: Self) -> Self {
        Self {
            tallies: merge_maps(self.tallies, other.tallies),
        }
    }
}

impl FromIterator<(DiskKey, Tally)> for DiskTallies {
    fn from_iter<I: IntoIterator<Item = (DiskKey, Tally)>>(iter: I) -> Self {
        let mut out = Self::default();
        for (k, t) in iter {
            out.tallies.entry(k).or_default().add(&t);
        }
        out
    }
}

/// Cluster report key; `country` is `None` when no mapping table is used or the cluster is unmapped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterKey {
    pub country: Option<String>,
    pub cluster: String,
}

impl ClusterKey {
    pub fn new(country: Option<&str>, cluster: impl Into<String>) -> Self {
        Self {
            country: country.map(str::to_string),
            cluster: cluster.into(),
        }
    }
}

/// Tallies keyed by [`ClusterKey`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterTallies {
    tallies: BTreeMap<ClusterKey, Tally>,
}

impl ClusterTallies {
    /// Count one clustered record. Returns `false` (and counts nothing) for records without a
    /// cluster.
    pub fn fold(&mut self, record: &NormalizedRecord, country: Option<&str>) -> bool {
        let Some(cluster) = record.cluster_name.as_deref() else {
            return false;
        };
        self.tallies
            .entry(ClusterKey::new(country, cluster))
            .or_default()
            .add(&Tally::of(record));
        true
    }

    pub fn get(&self, key: &ClusterKey) -> Option<&Tally> {
        self.tallies.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ClusterKey, &Tally)> {
        self.tallies.iter()
    }

    pub fn len(&self) -> usize {
        self.tallies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tallies.is_empty()
    }

    pub fn total(&self) -> Tally {
        self.tallies.values().fold(Tally::default(), |acc, t| acc.merge(*t))
    }
}

impl Merge for ClusterTallies {
    fn merge(self, other: Self) -> Self {
        Self {
            tallies: merge_maps(self.tallies, other.tallies),
        }
    }
}

/// Hosts per cluster, from the optional `vCluster` sheet. Cluster names are compared trimmed
/// and case-insensitively, like mapping-table keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostCounts {
    hosts: BTreeMap<String, u64>,
}

fn fold_cluster(cluster: &str) -> String {
    cluster.trim().to_lowercase()
}

impl HostCounts {
    pub fn add(&mut self, cluster: &str, hosts: u64) {
        let entry = self.hosts.entry(fold_cluster(cluster)).or_default();
        *entry = entry.saturating_add(hosts);
    }

    pub fn get(&self, cluster: &str) -> u64 {
        self.hosts.get(&fold_cluster(cluster)).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

impl Merge for HostCounts {
    fn merge(mut self, other: Self) -> Self {
        for (cluster, n) in other.hosts {
            let entry = self.hosts.entry(cluster).or_default();
            *entry = entry.saturating_add(n);
        }
        self
    }
}

/// A VM without cluster membership.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrphanVm {
    /// Short vCenter name, empty when unknown.
    pub vcenter: String,
    /// VM name, empty when the export has no name column.
    pub vm_name: String,
}

impl OrphanVm {
    pub fn of(record: &NormalizedRecord) -> Self {
        Self {
            vcenter: record.vcenter.clone().unwrap_or_default(),
            vm_name: record.vm_name.clone().unwrap_or_default(),
        }
    }
}

/// Row bookkeeping shared by both partial kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowStats {
    /// Sheets that matched the schema.
    pub sheets: u64,
    /// Non-blank data rows seen.
    pub rows: u64,
    /// Rows that became records.
    pub records: u64,
}

impl Merge for RowStats {
    fn merge(self, other: Self) -> Self {
        Self {
            sheets: self.sheets + other.sheets,
            rows: self.rows + other.rows,
            records: self.records + other.records,
        }
    }
}

/// What one disk-report worker produces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskPartial {
    pub tallies: DiskTallies,
    pub orphans: Vec<OrphanVm>,
    pub rejections: RejectionCounts,
    pub stats: RowStats,
}

impl Merge for DiskPartial {
    fn merge(mut self, other: Self) -> Self {
        self.orphans.extend(other.orphans);
        Self {
            tallies: self.tallies.merge(other.tallies),
            orphans: self.orphans,
            rejections: self.rejections.merge(other.rejections),
            stats: self.stats.merge(other.stats),
        }
    }
}

/// What one cluster-report worker produces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterPartial {
    pub tallies: ClusterTallies,
    pub hosts: HostCounts,
    pub orphans: Vec<OrphanVm>,
    /// Names of VMs counted under a cluster, for conflict detection.
    pub clustered_vms: BTreeSet<String>,
    pub rejections: RejectionCounts,
    pub stats: RowStats,
}

impl Merge for ClusterPartial {
    fn merge(mut self, other: Self) -> Self {
        self.orphans.extend(other.orphans);
        self.clustered_vms.extend(other.clustered_vms);
        Self {
            tallies: self.tallies.merge(other.tallies),
            hosts: self.hosts.merge(other.hosts),
            orphans: self.orphans,
            clustered_vms: self.clustered_vms,
            rejections: self.rejections.merge(other.rejections),
            stats: self.stats.merge(other.stats),
        }
    }
}
