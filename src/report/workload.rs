//! Per-file work for each report variant.

use std::path::Path;
use std::sync::Arc;

use crate::error::{ReportError, ReportResult};
use crate::execution::FileWorkload;
use crate::ingestion::{IngestionOptions, read_tables};
use crate::mapping::MappingTable;
use crate::processing::{
    CapacityRanges, ClusterPartial, ColumnLayout, DiskPartial, HostCounts, OrphanVm, RejectionCounts, RejectionKind,
    RowFilters, RowNormalizer, RowStats, is_blank_row, is_variant,
};
use crate::types::{Column, NormalizedRecord, RawTable, ReportVariant, Schema};

const LOG_TARGET: &str = "    worker";

/// Name of the per-cluster host sheet in RVTools exports.
pub const HOST_SHEET: &str = "vCluster";

/// Normalize every row of every qualifying sheet, handing records to `on_record`, which may still
/// reject them.
///
/// Sheets lacking required columns are skipped unless they were named explicitly; a file with no
/// qualifying sheet is a schema error.
fn scan_tables<F>(
    tables: &[RawTable],
    variant: ReportVariant,
    filters: &RowFilters,
    explicit: bool,
    stats: &mut RowStats,
    rejections: &mut RejectionCounts,
    mut on_record: F,
) -> ReportResult<()>
where
    F: FnMut(&ColumnLayout, NormalizedRecord) -> Result<(), RejectionKind>,
{
    let schema = Schema::for_variant(variant);
    let mut first_error = None;

    for table in tables {
        let layout = match ColumnLayout::resolve(&table.headers, &schema) {
            Ok(layout) => layout,
            Err(e) if explicit => {
                return Err(ReportError::schema(format!("sheet '{}': {e}", table.sheet)));
            }
            Err(e) => {
                log::debug!(target: LOG_TARGET, "ignoring sheet '{}': {e}", table.sheet);
                let _ = first_error.get_or_insert(e);
                continue;
            }
        };

        stats.sheets += 1;
        let normalizer = RowNormalizer::new(layout, filters);
        for (idx, row) in table.rows.iter().enumerate() {
            if is_blank_row(row) {
                continue;
            }
            stats.rows += 1;
            match normalizer.normalize(row) {
                Ok(record) => match on_record(normalizer.layout(), record) {
                    Ok(()) => stats.records += 1,
                    Err(kind) => rejections.record(kind),
                },
                Err(rejection) => {
                    log::trace!(
                        target: LOG_TARGET,
                        "{} row {}: {rejection}",
                        table.sheet,
                        table.source_row(idx)
                    );
                    rejections.record(rejection.kind());
                }
            }
        }
    }

    if stats.sheets == 0 {
        let detail = first_error.map_or_else(|| "no data".to_string(), |e| e.to_string());
        return Err(ReportError::schema(format!("no sheet has the required columns ({detail})")));
    }
    Ok(())
}

/// Disk-capacity report: classify each VM and tally it per OS and range.
#[derive(Debug, Clone)]
pub struct DiskWorkload {
    ranges: CapacityRanges,
    filters: RowFilters,
    ingestion: IngestionOptions,
}

impl DiskWorkload {
    pub fn new(ranges: CapacityRanges, filters: RowFilters, ingestion: IngestionOptions) -> Self {
        Self {
            ranges,
            filters,
            ingestion,
        }
    }
}

impl FileWorkload for DiskWorkload {
    type Partial = DiskPartial;

    fn process(&self, path: &Path) -> ReportResult<DiskPartial> {
        let tables = read_tables(path, &self.ingestion)?;
        let mut partial = DiskPartial::default();
        let DiskPartial {
            tallies,
            orphans,
            rejections,
            stats,
        } = &mut partial;

        scan_tables(
            &tables,
            ReportVariant::Disk,
            &self.filters,
            self.ingestion.sheet_selection.is_explicit(),
            stats,
            rejections,
            |layout, record| {
                let range = self
                    .ranges
                    .classify(record.disk_capacity_mb)
                    .map_err(|_| RejectionKind::InvalidDiskCapacity)?;
                tallies.fold(&record, range);
                if layout.has(Column::Cluster) && record.cluster_name.is_none() {
                    orphans.push(OrphanVm::of(&record));
                }
                Ok(())
            },
        )?;

        log::debug!(
            target: LOG_TARGET,
            "{}: {} record(s), {} rejected",
            path.display(),
            partial.stats.records,
            partial.rejections.total()
        );
        Ok(partial)
    }
}

/// Cluster report: tally clustered VMs per (country, cluster) and list standalone VMs.
#[derive(Debug, Clone)]
pub struct ClusterWorkload {
    mapping: Option<Arc<MappingTable>>,
    filters: RowFilters,
    ingestion: IngestionOptions,
}

impl ClusterWorkload {
    pub fn new(mapping: Option<Arc<MappingTable>>, filters: RowFilters, ingestion: IngestionOptions) -> Self {
        Self {
            mapping,
            filters,
            ingestion,
        }
    }
}

impl FileWorkload for ClusterWorkload {
    type Partial = ClusterPartial;

    fn process(&self, path: &Path) -> ReportResult<ClusterPartial> {
        let tables = read_tables(path, &self.ingestion)?;
        let (host_tables, vm_tables): (Vec<RawTable>, Vec<RawTable>) = tables
            .into_iter()
            .partition(|t| t.sheet.trim().eq_ignore_ascii_case(HOST_SHEET));

        let mut partial = ClusterPartial::default();
        for table in &host_tables {
            read_host_counts(table, &mut partial.hosts);
        }

        let ClusterPartial {
            tallies,
            orphans,
            clustered_vms,
            rejections,
            stats,
            ..
        } = &mut partial;

        scan_tables(
            &vm_tables,
            ReportVariant::Cluster,
            &self.filters,
            self.ingestion.sheet_selection.is_explicit(),
            stats,
            rejections,
            |_, record| {
                if is_variant(&record) {
                    return Err(RejectionKind::Appliance);
                }
                let country = match (&self.mapping, record.cluster_name.as_deref()) {
                    (Some(mapping), Some(cluster)) => mapping.lookup(record.vcenter.as_deref(), cluster),
                    _ => None,
                };
                if tallies.fold(&record, country) {
                    if let Some(name) = &record.vm_name {
                        let _ = clustered_vms.insert(name.clone());
                    }
                } else {
                    orphans.push(OrphanVm::of(&record));
                }
                Ok(())
            },
        )?;

        Ok(partial)
    }
}

/// Add `Name` / `NumHosts` pairs of a host sheet. Unreadable rows are skipped.
fn read_host_counts(table: &RawTable, hosts: &mut HostCounts) {
    let find = |name: &str| table.headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name));
    let (Some(name_idx), Some(hosts_idx)) = (find("Name"), find("NumHosts")) else {
        log::warn!(target: LOG_TARGET, "sheet '{}' lacks Name/NumHosts columns", table.sheet);
        return;
    };

    for row in &table.rows {
        let name = row.get(name_idx).and_then(|v| v.as_text());
        let count = row.get(hosts_idx).and_then(|v| v.as_f64().ok().flatten());
        if let (Some(name), Some(count)) = (name, count) {
            if count.is_finite() && count >= 0.0 {
                hosts.add(&name, count.round() as u64);
            }
        }
    }
}
