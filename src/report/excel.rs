//! Workbook rendering for both report variants.

use std::path::Path;

use rust_xlsxwriter::{Color, DocProperties, Format, Workbook, Worksheet};

use super::{
    ClusterLine, ClusterReport, DiskReport, DiskSection, GRAND_TOTAL_LABEL, SECTION_TOTAL_LABEL, SkippedFile,
    UNMAPPED_COUNTRY,
};
use crate::error::ReportResult;
use crate::processing::{OrphanVm, Tally};

pub const DISK_SHEET: &str = "OS_Disk_Count";
pub const OS_SUMMARY_SHEET: &str = "OS_Summary";
pub const CLUSTER_SHEET: &str = "vCluster Summary";
pub const STANDALONE_SHEET: &str = "Standalone_VMs";
pub const SKIPPED_SHEET: &str = "Skipped_Files";

const DISK_HEADERS: [&str; 4] = [
    "OS according to the configuration file",
    "Count",
    "Capacity Range",
    "OS according to the VMware Tools",
];

struct Formats {
    header: Format,
    total: Format,
    decimal: Format,
    total_decimal: Format,
}

impl Formats {
    fn new() -> Self {
        let total = Format::new().set_bold().set_background_color(Color::RGB(0x00DD_EBF7));
        Self {
            header: Format::new().set_bold().set_background_color(Color::RGB(0x00FE_D7AA)),
            total_decimal: total.clone().set_num_format("0.00"),
            total,
            decimal: Format::new().set_num_format("0.00"),
        }
    }
}

fn new_workbook() -> Workbook {
    let mut workbook = Workbook::new();
    let properties = DocProperties::new().set_author("vm-inventory-report");
    workbook.set_properties(&properties);
    workbook
}

fn write_header(sheet: &mut Worksheet, headers: &[&str], format: &Format) -> ReportResult<()> {
    for (col, header) in (0u16..).zip(headers) {
        sheet.write_string_with_format(0, col, *header, format)?;
    }
    sheet.set_freeze_panes(1, 0)?;
    Ok(())
}

/// Write the disk-capacity workbook to `path`.
pub fn write_disk_report(report: &DiskReport, path: &Path) -> ReportResult<()> {
    let formats = Formats::new();
    let mut workbook = new_workbook();

    let sheet = workbook.add_worksheet().set_name(DISK_SHEET)?;
    write_header(sheet, &DISK_HEADERS, &formats.header)?;
    let mut row = 1;
    for section in &report.sections {
        row = write_disk_section(sheet, row, section, &formats)?;
    }
    sheet.write_string_with_format(row, 0, GRAND_TOTAL_LABEL, &formats.total)?;
    sheet.write_number_with_format(row, 1, report.grand_total as f64, &formats.total)?;
    row += 2;
    if let Some(variant) = &report.variant {
        let _ = write_disk_section(sheet, row, variant, &formats)?;
    }
    sheet.autofit();

    let sheet = workbook.add_worksheet().set_name(OS_SUMMARY_SHEET)?;
    write_header(sheet, &["OS according to the configuration file", "Count", "Disk TB"], &formats.header)?;
    for (row, line) in (1u32..).zip(&report.os_summary) {
        sheet.write_string(row, 0, &line.os_label)?;
        sheet.write_number(row, 1, line.count as f64)?;
        sheet.write_number_with_format(row, 2, line.disk_tb, &formats.decimal)?;
    }
    sheet.autofit();

    if !report.orphans.is_empty() {
        write_standalone(&mut workbook, &report.orphans, &formats)?;
    }
    write_skipped(&mut workbook, &report.skipped, &formats)?;
    workbook.save(path)?;
    Ok(())
}

/// Rows of one section followed by its subtotal; returns the row after the trailing blank line.
fn write_disk_section(sheet: &mut Worksheet, mut row: u32, section: &DiskSection, formats: &Formats) -> ReportResult<u32> {
    for line in &section.rows {
        sheet.write_string(row, 0, &line.os_label)?;
        sheet.write_number(row, 1, line.count as f64)?;
        sheet.write_string(row, 2, &line.bucket)?;
        if let Some(tools) = &line.tools_label {
            sheet.write_string(row, 3, tools)?;
        }
        row += 1;
    }
    sheet.write_string_with_format(row, 0, SECTION_TOTAL_LABEL, &formats.total)?;
    sheet.write_number_with_format(row, 1, section.subtotal as f64, &formats.total)?;
    sheet.write_string_with_format(row, 2, &section.bucket, &formats.total)?;
    Ok(row + 2)
}

/// Write the cluster workbook to `path`.
pub fn write_cluster_report(report: &ClusterReport, path: &Path) -> ReportResult<()> {
    let formats = Formats::new();
    let mut workbook = new_workbook();

    let mut headers = vec!["vCluster", "Hosts", "VMs", "CPUs", "Memory GB", "Disk TB"];
    if report.with_country {
        headers.insert(0, "Country");
    }
    let offset = u16::from(report.with_country);

    let sheet = workbook.add_worksheet().set_name(CLUSTER_SHEET)?;
    write_header(sheet, &headers, &formats.header)?;
    for (row, line) in (1u32..).zip(&report.lines) {
        match line {
            ClusterLine::Cluster {
                country,
                cluster,
                hosts,
                tally,
            } => {
                if report.with_country {
                    sheet.write_string(row, 0, country.as_deref().unwrap_or(UNMAPPED_COUNTRY))?;
                }
                sheet.write_string(row, offset, cluster)?;
                write_tally(sheet, row, offset + 1, *hosts, tally, &Format::new(), &formats.decimal)?;
            }
            ClusterLine::CountryTotal { country, hosts, tally } => {
                sheet.write_string_with_format(row, 0, format!("{country} Total"), &formats.total)?;
                sheet.write_blank(row, offset, &formats.total)?;
                write_tally(sheet, row, offset + 1, *hosts, tally, &formats.total, &formats.total_decimal)?;
            }
            ClusterLine::GrandTotal { hosts, tally } => {
                sheet.write_string_with_format(row, 0, "Grand Total", &formats.total)?;
                if report.with_country {
                    sheet.write_blank(row, offset, &formats.total)?;
                }
                write_tally(sheet, row, offset + 1, *hosts, tally, &formats.total, &formats.total_decimal)?;
            }
        }
    }
    sheet.autofit();

    write_standalone(&mut workbook, &report.orphans, &formats)?;
    if !report.conflicts.is_empty() {
        let sheet = workbook.add_worksheet().set_name("Conflicts")?;
        write_header(sheet, &["VM clustered and standalone"], &formats.header)?;
        for (row, name) in (1u32..).zip(&report.conflicts) {
            sheet.write_string(row, 0, name)?;
        }
        sheet.autofit();
    }
    write_skipped(&mut workbook, &report.skipped, &formats)?;
    workbook.save(path)?;
    Ok(())
}

fn write_tally(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    hosts: u64,
    tally: &Tally,
    format: &Format,
    decimal: &Format,
) -> ReportResult<()> {
    sheet.write_number_with_format(row, col, hosts as f64, format)?;
    sheet.write_number_with_format(row, col + 1, tally.count as f64, format)?;
    sheet.write_number_with_format(row, col + 2, tally.cpus as f64, format)?;
    sheet.write_number_with_format(row, col + 3, tally.memory_gb(), decimal)?;
    sheet.write_number_with_format(row, col + 4, tally.disk_tb(), decimal)?;
    Ok(())
}

fn write_standalone(workbook: &mut Workbook, orphans: &[OrphanVm], formats: &Formats) -> ReportResult<()> {
    let sheet = workbook.add_worksheet().set_name(STANDALONE_SHEET)?;
    write_header(sheet, &["vCenter", "VM"], &formats.header)?;
    for (row, orphan) in (1u32..).zip(orphans) {
        sheet.write_string(row, 0, &orphan.vcenter)?;
        sheet.write_string(row, 1, &orphan.vm_name)?;
    }
    sheet.autofit();
    Ok(())
}

fn write_skipped(workbook: &mut Workbook, skipped: &[SkippedFile], formats: &Formats) -> ReportResult<()> {
    if skipped.is_empty() {
        return Ok(());
    }
    let sheet = workbook.add_worksheet().set_name(SKIPPED_SHEET)?;
    write_header(sheet, &["File", "Reason"], &formats.header)?;
    for (row, file) in (1u32..).zip(skipped) {
        sheet.write_string(row, 0, &file.path)?;
        sheet.write_string(row, 1, &file.reason)?;
    }
    sheet.autofit();
    Ok(())
}
