mod common;

use std::fs;
use std::sync::{Arc, Mutex};

use common::{VINFO_HEADERS, vm, write_sheet, write_sheets};
use vm_inventory_report::ReportError;
use vm_inventory_report::ingestion::excel::read_sheet;
use vm_inventory_report::ingestion::{
    FileObserver, IngestionContext, IngestionObserver, IngestionOptions, IngestionSeverity, IngestionStats,
    InputFormat, SheetSelection, discover_inputs, read_tables,
};
use vm_inventory_report::types::Value;

#[derive(Default)]
struct RecordingObserver {
    successes: Mutex<Vec<IngestionStats>>,
    failures: Mutex<Vec<IngestionSeverity>>,
    alerts: Mutex<Vec<IngestionSeverity>>,
}

impl IngestionObserver for RecordingObserver {
    fn on_success(&self, _ctx: &IngestionContext, stats: IngestionStats) {
        self.successes.lock().unwrap().push(stats);
    }

    fn on_failure(&self, _ctx: &IngestionContext, severity: IngestionSeverity, _error: &ReportError) {
        self.failures.lock().unwrap().push(severity);
    }

    fn on_alert(&self, _ctx: &IngestionContext, severity: IngestionSeverity, _error: &ReportError) {
        self.alerts.lock().unwrap().push(severity);
    }
}

#[test]
fn sheet_selection_controls_which_sheets_are_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.xlsx");
    let vms = [vm("a", "Linux", "connected", "1", "A")];
    let hosts = [vec!["A", "3"]];
    write_sheets(
        &path,
        &[
            ("vInfo", &VINFO_HEADERS[..], &vms[..]),
            ("vCluster", &["Name", "NumHosts"][..], &hosts[..]),
        ],
    );

    let read = |selection: SheetSelection| {
        let opts = IngestionOptions {
            sheet_selection: selection,
            ..IngestionOptions::default()
        };
        read_tables(&path, &opts).map(|t| t.into_iter().map(|t| t.sheet).collect::<Vec<_>>())
    };

    assert_eq!(read(SheetSelection::AllSheets).unwrap(), vec!["vInfo", "vCluster"]);
    assert_eq!(read(SheetSelection::First).unwrap(), vec!["vInfo"]);
    assert_eq!(read(SheetSelection::Sheets(vec!["vCluster".to_string()])).unwrap(), vec!["vCluster"]);

    let err = read(SheetSelection::Sheets(vec!["vHost".to_string()])).unwrap_err();
    assert!(matches!(err, ReportError::SchemaMismatch { .. }), "{err}");
}

#[test]
fn header_row_is_the_first_non_empty_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("offset.xlsx");
    let mut wb = rust_xlsxwriter::Workbook::new();
    let ws = wb.add_worksheet();
    ws.set_name("vInfo").unwrap();
    ws.write_string(2, 0, "VM").unwrap();
    ws.write_string(2, 1, "Total disk capacity MiB").unwrap();
    ws.write_string(3, 0, "web01").unwrap();
    ws.write_number(3, 1, 2048).unwrap();
    ws.write_string(5, 0, "web02").unwrap();
    wb.save(&path).unwrap();

    let table = read_sheet(&path, "vInfo").unwrap();
    assert_eq!(table.header_row, 3);
    assert_eq!(table.headers, vec!["VM", "Total disk capacity MiB"]);
    assert_eq!(table.row_count(), 3);
    assert_eq!(table.rows[0][1], Value::Float64(2048.0));
    assert_eq!(table.source_row(2), 6);
}

#[test]
fn csv_exports_are_read_as_one_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.CSV");
    fs::write(&path, "VM,Total disk capacity MB\nweb01,100\nweb02,\n").unwrap();

    let tables = read_tables(&path, &IngestionOptions::default()).unwrap();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].rows[0][1].as_f64(), Ok(Some(100.0)));
    assert!(tables[0].rows[1][1].is_null());
}

#[test]
fn observer_receives_success_and_critical_alerts() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.xlsx");
    write_sheet(&good, "vInfo", &VINFO_HEADERS, &[vm("a", "Linux", "connected", "1", "A")]);

    let obs = Arc::new(RecordingObserver::default());
    let opts = IngestionOptions {
        observer: Some(obs.clone()),
        ..IngestionOptions::default()
    };

    let _ = read_tables(&good, &opts).unwrap();
    let _ = read_tables(dir.path().join("missing.xlsx"), &opts).unwrap_err();
    fs::write(dir.path().join("garbage.xlsx"), b"garbage").unwrap();
    let _ = read_tables(dir.path().join("garbage.xlsx"), &opts).unwrap_err();

    assert_eq!(*obs.successes.lock().unwrap(), vec![IngestionStats { sheets: 1, rows: 1 }]);
    let failures = obs.failures.lock().unwrap().clone();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0], IngestionSeverity::Critical);
    assert_eq!(*obs.alerts.lock().unwrap(), vec![IngestionSeverity::Critical]);
}

#[test]
fn file_observer_appends_one_line_per_event() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("ingest.log");
    let opts = IngestionOptions {
        format: Some(InputFormat::Excel),
        observer: Some(Arc::new(FileObserver::new(&log))),
        alert_at_or_above: IngestionSeverity::Error,
        ..IngestionOptions::default()
    };

    let _ = read_tables(dir.path().join("missing.xlsx"), &opts).unwrap_err();
    let text = fs::read_to_string(&log).unwrap();
    // on_alert forwards to on_failure, so a critical failure is written twice.
    assert_eq!(text.lines().count(), 2);
    assert!(text.lines().all(|l| l.contains("Critical") && l.contains("missing.xlsx")));
}

#[test]
fn discovery_is_sorted_non_recursive_and_skips_noise() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["b.xlsx", "a.csv", "~$a.xlsx", ".hidden.xlsx", "notes.txt", "c.ods"] {
        fs::write(dir.path().join(name), b"").unwrap();
    }
    fs::create_dir(dir.path().join("nested")).unwrap();
    fs::write(dir.path().join("nested").join("d.xlsx"), b"").unwrap();

    let names: Vec<String> = discover_inputs(dir.path())
        .unwrap()
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["a.csv", "b.xlsx", "c.ods"]);
}
