//! Report assembly: run the workload over the source directory, shape the merged tallies into
//! rows, and write the workbook.
//!
//! [`run`] is the whole pipeline. [`DiskReport::build`] and [`ClusterReport::build`] are exposed
//! separately so the row layout can be checked without touching the filesystem.

mod excel;
mod workload;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ReportConfig;
use crate::error::{FileFailure, ReportError, ReportResult};
use crate::execution::{CancellationFlag, ExecutionEngine, ExecutionObserver, RunOutcome};
use crate::ingestion::{IngestionObserver, IngestionOptions, discover_inputs};
use crate::mapping::MappingTable;
use crate::processing::{
    ALL_CAPACITIES, CapacityRanges, ClusterSegregation, DiskSegregation, OrphanVm, RejectionCounts,
    RowStats, Tally, segregate_cluster, segregate_disk,
};
use crate::types::ReportVariant;

pub use excel::{
    CLUSTER_SHEET, DISK_SHEET, OS_SUMMARY_SHEET, SKIPPED_SHEET, STANDALONE_SHEET, write_cluster_report, write_disk_report,
};
pub use workload::{ClusterWorkload, DiskWorkload, HOST_SHEET};

const LOG_TARGET: &str = "    report";

/// Label of a per-section subtotal row.
pub const SECTION_TOTAL_LABEL: &str = "Disk OS Sum";
/// Label of the grand-total row of the disk report.
pub const GRAND_TOTAL_LABEL: &str = "Total Machine Count";
/// Country shown for clusters missing from the mapping table.
pub const UNMAPPED_COUNTRY: &str = "Unmapped";

/// A file that was left out of the report, as rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

impl SkippedFile {
    fn from_failures(failures: &[FileFailure]) -> Vec<Self> {
        failures
            .iter()
            .map(|f| Self {
                path: f.path.display().to_string(),
                reason: f.error.to_string(),
            })
            .collect()
    }
}

/// One OS line of a disk report section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskRow {
    pub os_label: String,
    pub count: u64,
    pub bucket: String,
    pub tools_label: Option<String>,
}

/// All OS lines of one capacity bucket, with their subtotal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskSection {
    pub bucket: String,
    pub rows: Vec<DiskRow>,
    pub subtotal: u64,
}

/// Per-OS totals across every range.
#[derive(Debug, Clone, PartialEq)]
pub struct OsSummaryRow {
    pub os_label: String,
    pub count: u64,
    pub disk_tb: f64,
}

/// Rows of the disk-capacity workbook.
#[derive(Debug, Clone, PartialEq)]
pub struct DiskReport {
    /// Non-empty buckets, in range order.
    pub sections: Vec<DiskSection>,
    /// Sum of the section subtotals; equals the number of accepted VMs.
    pub grand_total: u64,
    /// The `All Capacities` section, when any variant VM was seen.
    pub variant: Option<DiskSection>,
    pub os_summary: Vec<OsSummaryRow>,
    pub orphans: Vec<OrphanVm>,
    pub skipped: Vec<SkippedFile>,
}

impl DiskReport {
    pub fn build(seg: &DiskSegregation, ranges: &CapacityRanges, failures: &[FileFailure]) -> Self {
        let sections: Vec<DiskSection> = ranges
            .labels()
            .filter_map(|bucket| {
                let rows: Vec<DiskRow> = seg
                    .main
                    .iter()
                    .filter(|(k, _)| k.bucket == bucket)
                    .map(|(k, t)| DiskRow {
                        os_label: k.os_label.clone(),
                        count: t.count,
                        bucket: bucket.to_string(),
                        tools_label: None,
                    })
                    .collect();
                (!rows.is_empty()).then(|| section(bucket, rows))
            })
            .collect();

        let variant_rows: Vec<DiskRow> = seg
            .variant
            .iter()
            .map(|(k, t)| DiskRow {
                os_label: k.os_label.clone(),
                count: t.count,
                bucket: ALL_CAPACITIES.to_string(),
                tools_label: k.tools_label.clone(),
            })
            .collect();

        let mut per_os: Vec<(String, Tally)> = Vec::new();
        for (key, tally) in seg.main.iter() {
            match per_os.last_mut() {
                Some((os, acc)) if *os == key.os_label => acc.add(tally),
                _ => per_os.push((key.os_label.clone(), *tally)),
            }
        }

        Self {
            grand_total: sections.iter().map(|s| s.subtotal).sum(),
            sections,
            variant: (!variant_rows.is_empty()).then(|| section(ALL_CAPACITIES, variant_rows)),
            os_summary: per_os
                .into_iter()
                .map(|(os_label, t)| OsSummaryRow {
                    os_label,
                    count: t.count,
                    disk_tb: t.disk_tb(),
                })
                .collect(),
            orphans: seg.orphans.clone(),
            skipped: SkippedFile::from_failures(failures),
        }
    }
}

fn section(bucket: &str, rows: Vec<DiskRow>) -> DiskSection {
    DiskSection {
        bucket: bucket.to_string(),
        subtotal: rows.iter().map(|r| r.count).sum(),
        rows,
    }
}

/// One line of the cluster summary sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterLine {
    Cluster {
        country: Option<String>,
        cluster: String,
        hosts: u64,
        tally: Tally,
    },
    CountryTotal {
        country: String,
        hosts: u64,
        tally: Tally,
    },
    GrandTotal {
        hosts: u64,
        tally: Tally,
    },
}

/// Rows of the cluster workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterReport {
    /// Whether the country column and country subtotals are shown.
    pub with_country: bool,
    pub lines: Vec<ClusterLine>,
    pub orphans: Vec<OrphanVm>,
    pub conflicts: Vec<String>,
    pub skipped: Vec<SkippedFile>,
}

impl ClusterReport {
    /// Lines are sorted by country (unmapped last) then cluster; with a mapping table every
    /// country is followed by its subtotal.
    pub fn build(seg: &ClusterSegregation, with_country: bool, failures: &[FileFailure]) -> Self {
        let mut clusters: Vec<_> = seg.main.iter().collect();
        clusters.sort_by(|(a, _), (b, _)| {
            (a.country.is_none(), &a.country, &a.cluster).cmp(&(b.country.is_none(), &b.country, &b.cluster))
        });

        let mut lines = Vec::with_capacity(clusters.len() * 2 + 1);
        let (mut grand, mut grand_hosts) = (Tally::default(), 0u64);
        let mut current: Option<(String, Tally, u64)> = None;

        for (key, tally) in clusters {
            let hosts = seg.hosts.get(&key.cluster);
            if with_country {
                let country = key.country.clone().unwrap_or_else(|| UNMAPPED_COUNTRY.to_string());
                if current.as_ref().is_some_and(|(c, _, _)| *c != country) {
                    if let Some((c, t, h)) = current.take() {
                        lines.push(ClusterLine::CountryTotal {
                            country: c,
                            hosts: h,
                            tally: t,
                        });
                    }
                }
                let entry = current.get_or_insert_with(|| (country, Tally::default(), 0));
                entry.1.add(tally);
                entry.2 = entry.2.saturating_add(hosts);
            }

            grand.add(tally);
            grand_hosts = grand_hosts.saturating_add(hosts);
            lines.push(ClusterLine::Cluster {
                country: key.country.clone(),
                cluster: key.cluster.clone(),
                hosts,
                tally: *tally,
            });
        }
        if let Some((country, tally, hosts)) = current {
            lines.push(ClusterLine::CountryTotal { country, hosts, tally });
        }
        lines.push(ClusterLine::GrandTotal {
            hosts: grand_hosts,
            tally: grand,
        });

        Self {
            with_country,
            lines,
            orphans: seg.orphans.clone(),
            conflicts: seg.conflicts.clone(),
            skipped: SkippedFile::from_failures(failures),
        }
    }
}

/// Observers and cancellation shared with the caller of [`run`].
#[derive(Clone, Default)]
pub struct RunHooks {
    pub execution_observer: Option<Arc<dyn ExecutionObserver>>,
    pub ingestion_observer: Option<Arc<dyn IngestionObserver>>,
    pub cancel: CancellationFlag,
}

impl fmt::Debug for RunHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHooks")
            .field("execution_observer_set", &self.execution_observer.is_some())
            .field("ingestion_observer_set", &self.ingestion_observer.is_some())
            .field("cancel", &self.cancel)
            .finish()
    }
}

/// What a run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub output: PathBuf,
    pub files_total: usize,
    pub files_succeeded: usize,
    pub files_failed: usize,
    pub stats: RowStats,
    pub rejections: RejectionCounts,
    /// VMs in the main table (disk report) or in clusters (cluster report).
    pub vm_total: u64,
    pub orphans: usize,
    pub conflicts: usize,
}

impl RunSummary {
    /// True when input files existed but none could be processed.
    pub fn all_failed(&self) -> bool {
        self.files_total > 0 && self.files_succeeded == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} file(s) processed, {} skipped; {} row(s), {} VM(s) counted, {} rejected ({}); {} standalone",
            self.files_succeeded,
            self.files_total,
            self.files_failed,
            self.stats.rows,
            self.vm_total,
            self.rejections.total(),
            self.rejections,
            self.orphans
        )?;
        if self.conflicts > 0 {
            write!(f, "; {} conflicting VM name(s)", self.conflicts)?;
        }
        Ok(())
    }
}

/// Run the report described by `config` and write its workbook.
///
/// Configuration problems (including an unreadable mapping table) fail before any input is read.
/// Per-file problems are listed in the workbook and counted in the summary.
pub fn run(config: &ReportConfig, hooks: &RunHooks) -> ReportResult<RunSummary> {
    config.validate()?;

    let mapping = match (config.variant, &config.mapping) {
        (ReportVariant::Cluster, Some(source)) => Some(Arc::new(MappingTable::load(&source.path, &source.sheet)?)),
        _ => None,
    };

    let files = discover_inputs(&config.source_dir)?;
    if files.is_empty() {
        log::warn!(
            target: LOG_TARGET,
            "no spreadsheets found in {}; writing an empty report",
            config.source_dir.display()
        );
    }

    let mut engine = ExecutionEngine::new(config.execution.clone())?.with_cancellation(hooks.cancel.clone());
    if let Some(obs) = &hooks.execution_observer {
        engine = engine.with_observer(Arc::clone(obs));
    }
    let ingestion = IngestionOptions {
        sheet_selection: config.sheet_selection.clone(),
        observer: hooks.ingestion_observer.clone(),
        ..IngestionOptions::default()
    };

    config.prepare_destination()?;
    let output = config.output_path();

    let summary = match config.variant {
        ReportVariant::Disk => {
            let workload = DiskWorkload::new(config.ranges.clone(), config.filters.clone(), ingestion);
            let RunOutcome {
                merged,
                failures,
                files_succeeded,
                ..
            } = engine.run(&files, &workload)?;
            let (stats, rejections) = (merged.stats, merged.rejections.clone());
            let seg = segregate_disk(merged);
            let report = DiskReport::build(&seg, &config.ranges, &failures);
            write_disk_report(&report, &output)?;

            RunSummary {
                output,
                files_total: files.len(),
                files_succeeded,
                files_failed: failures.len(),
                stats,
                rejections,
                vm_total: report.grand_total,
                orphans: report.orphans.len(),
                conflicts: 0,
            }
        }
        ReportVariant::Cluster => {
            let with_country = mapping.is_some();
            let workload = ClusterWorkload::new(mapping, config.filters.clone(), ingestion);
            let RunOutcome {
                merged,
                failures,
                files_succeeded,
                ..
            } = engine.run(&files, &workload)?;
            let (stats, rejections) = (merged.stats, merged.rejections.clone());
            let seg = segregate_cluster(merged);
            let report = ClusterReport::build(&seg, with_country, &failures);
            write_cluster_report(&report, &output)?;

            RunSummary {
                output,
                files_total: files.len(),
                files_succeeded,
                files_failed: failures.len(),
                stats,
                rejections,
                vm_total: seg.main.total().count,
                orphans: report.orphans.len(),
                conflicts: report.conflicts.len(),
            }
        }
    };

    log::info!(target: LOG_TARGET, "{summary}");
    log::info!(target: LOG_TARGET, "report written to {}", summary.output.display());
    if summary.all_failed() {
        log::error!(target: LOG_TARGET, "none of the {} input file(s) could be processed", summary.files_total);
    }
    Ok(summary)
}

/// Error returned by the CLI when a run produced a report without any usable input.
pub fn no_usable_input(summary: &RunSummary) -> ReportError {
    ReportError::schema(format!(
        "none of the {} input file(s) could be processed; see the {SKIPPED_SHEET} sheet of {}",
        summary.files_total,
        summary.output.display()
    ))
}
