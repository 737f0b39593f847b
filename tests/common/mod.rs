#![allow(dead_code)]

use std::path::Path;

use calamine::{Reader, open_workbook_auto};
use rust_xlsxwriter::Workbook;

pub const VINFO_HEADERS: [&str; 10] = [
    "VM",
    "Powerstate",
    "CPUs",
    "Memory",
    "OS according to the configuration file",
    "OS according to the VMware Tools",
    "Connection state",
    "Total disk capacity MiB",
    "Cluster",
    "VI SDK Server",
];

/// Write one sheet; cells that parse as numbers are written as numbers, empty cells are left blank.
pub fn write_sheet(path: &Path, sheet: &str, headers: &[&str], rows: &[Vec<&str>]) {
    write_sheets(path, &[(sheet, headers, rows)]);
}

pub fn write_sheets(path: &Path, sheets: &[(&str, &[&str], &[Vec<&str>])]) {
    let mut wb = Workbook::new();
    for (name, headers, rows) in sheets {
        let ws = wb.add_worksheet();
        ws.set_name(*name).unwrap();
        for (col, h) in headers.iter().enumerate() {
            ws.write_string(0, col as u16, *h).unwrap();
        }
        for (r, row) in rows.iter().enumerate() {
            for (col, cell) in row.iter().enumerate() {
                let (r, col) = (r as u32 + 1, col as u16);
                if cell.is_empty() {
                    continue;
                }
                match cell.parse::<f64>() {
                    Ok(n) => ws.write_number(r, col, n).unwrap(),
                    Err(_) => ws.write_string(r, col, *cell).unwrap(),
                };
            }
        }
    }
    wb.save(path).unwrap();
}

/// `vInfo` row in [`VINFO_HEADERS`] order.
pub fn vm<'a>(name: &'a str, os: &'a str, state: &'a str, disk_mib: &'a str, cluster: &'a str) -> Vec<&'a str> {
    vec![name, "poweredOn", "2", "4096", os, "", state, disk_mib, cluster, "vc01.corp.local"]
}

/// Every cell of `sheet` rendered as text.
pub fn read_sheet(path: &Path, sheet: &str) -> Vec<Vec<String>> {
    let mut wb = open_workbook_auto(path).unwrap();
    let range = wb.worksheet_range(sheet).unwrap();
    range
        .rows()
        .map(|row| row.iter().map(|c| c.to_string()).collect())
        .collect()
}

pub fn sheet_names(path: &Path) -> Vec<String> {
    open_workbook_auto(path).unwrap().sheet_names()
}

/// Rows whose first cell equals `label`.
pub fn rows_labelled<'a>(rows: &'a [Vec<String>], label: &str) -> Vec<&'a Vec<String>> {
    rows.iter().filter(|r| r.first().is_some_and(|c| c == label)).collect()
}
