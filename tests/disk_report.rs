mod common;

use std::fs;
use std::path::Path;

use common::{VINFO_HEADERS, read_sheet, rows_labelled, sheet_names, vm, write_sheet};
use vm_inventory_report::ReportError;
use vm_inventory_report::config::ReportConfig;
use vm_inventory_report::processing::{PHOTON_OS, RejectionKind};
use vm_inventory_report::report::{GRAND_TOTAL_LABEL, RunHooks, run};
use vm_inventory_report::types::ReportVariant;

const WIN: &str = "Microsoft Windows Server 2016 (64-bit)";
const UBUNTU: &str = "Ubuntu Linux (64-bit)";

fn config(src: &Path, dst: &Path) -> ReportConfig {
    let mut c = ReportConfig::new(ReportVariant::Disk);
    c.source_dir = src.to_path_buf();
    c.destination_dir = dst.to_path_buf();
    c.output_name = "capacity".to_string();
    c
}

fn count_for(rows: &[Vec<String>], os: &str, bucket: &str) -> Option<String> {
    rows.iter()
        .find(|r| r[0] == os && r[2] == bucket)
        .map(|r| r[1].clone())
}

fn write_inventory(dir: &Path) {
    let mut photon = vm("photon01", PHOTON_OS, "connected", "20480", "");
    photon[5] = PHOTON_OS;
    write_sheet(
        &dir.join("site-a.xlsx"),
        "vInfo",
        &VINFO_HEADERS,
        &[
            vm("web01", WIN, "connected", "140", "ClusterA"),
            vm("db01", WIN, "connected", "3145728", "ClusterA"),
            photon,
            vm("blank-os", "", "connected", "100", "ClusterA"),
            vm("gone01", WIN, "disconnected", "100", "ClusterA"),
        ],
    );
    fs::write(
        dir.join("site-b.csv"),
        "VM,OS according to the configuration file,Connection state,Total disk capacity MB,Cluster\n\
         lnx01,Ubuntu Linux (64-bit),connected,150,ClusterB\n",
    )
    .unwrap();
}

#[test]
fn disk_report_buckets_vms_per_os_and_range() {
    let (src, dst) = (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap());
    write_inventory(src.path());

    let summary = run(&config(src.path(), dst.path()), &RunHooks::default()).unwrap();
    assert_eq!(summary.files_total, 2);
    assert_eq!(summary.files_succeeded, 2);
    assert_eq!(summary.vm_total, 4);
    assert_eq!(summary.rejections.get(RejectionKind::MissingOs), 1);
    assert_eq!(summary.rejections.get(RejectionKind::Disconnected), 1);
    assert_eq!(summary.orphans, 1);
    assert_eq!(summary.output, dst.path().join("capacity.xlsx"));

    let rows = read_sheet(&summary.output, "OS_Disk_Count");
    assert_eq!(rows[0][0], "OS according to the configuration file");
    // 140 MiB is still below 150 MB; 3 TiB lands in 2 TB - 10 TB.
    assert_eq!(count_for(&rows, WIN, "0 MB - 150 MB").as_deref(), Some("1"));
    assert_eq!(count_for(&rows, WIN, "2 TB - 10 TB").as_deref(), Some("1"));
    // Lower bounds are inclusive.
    assert_eq!(count_for(&rows, UBUNTU, "150 MB - 2 TB").as_deref(), Some("1"));
    assert_eq!(count_for(&rows, UBUNTU, "0 MB - 150 MB"), None);

    let total = rows_labelled(&rows, GRAND_TOTAL_LABEL);
    assert_eq!(total.len(), 1);
    assert_eq!(total[0][1], "4");

    let photon: Vec<_> = rows.iter().filter(|r| r[0] == PHOTON_OS).collect();
    assert_eq!(photon.len(), 2, "{rows:?}");
    let variant = photon.iter().find(|r| r[2] == "All Capacities").unwrap();
    assert_eq!(variant[3], PHOTON_OS);

    let standalone = read_sheet(&summary.output, "Standalone_VMs");
    assert_eq!(standalone[1], vec!["vc01".to_string(), "photon01".to_string()]);
}

#[test]
fn file_missing_disk_column_is_skipped_without_affecting_others() {
    let (src, dst) = (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap());
    write_sheet(
        &src.path().join("good.xlsx"),
        "vInfo",
        &VINFO_HEADERS,
        &[vm("web01", WIN, "connected", "140", "ClusterA")],
    );
    write_sheet(
        &src.path().join("bad.xlsx"),
        "vInfo",
        &["VM", "OS according to the configuration file", "Connection state"],
        &[vec!["web02", WIN, "connected"]],
    );

    let summary = run(&config(src.path(), dst.path()), &RunHooks::default()).unwrap();
    assert_eq!(summary.files_failed, 1);
    assert_eq!(summary.vm_total, 1);
    assert!(!summary.all_failed());

    let skipped = read_sheet(&summary.output, "Skipped_Files");
    assert_eq!(skipped.len(), 2);
    assert!(skipped[1][0].ends_with("bad.xlsx"));
    assert!(skipped[1][1].contains("Total disk capacity"), "{}", skipped[1][1]);
}

#[test]
fn empty_directory_writes_an_empty_report() {
    let (src, dst) = (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap());

    let summary = run(&config(src.path(), dst.path()), &RunHooks::default()).unwrap();
    assert_eq!(summary.files_total, 0);
    assert!(!summary.all_failed());

    let rows = read_sheet(&summary.output, "OS_Disk_Count");
    assert_eq!(rows_labelled(&rows, GRAND_TOTAL_LABEL)[0][1], "0");
    assert_eq!(sheet_names(&summary.output), vec!["OS_Disk_Count", "OS_Summary"]);
}

#[test]
fn run_where_every_file_fails_still_writes_the_report() {
    let (src, dst) = (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap());
    fs::write(src.path().join("broken.xlsx"), b"not a workbook").unwrap();

    let summary = run(&config(src.path(), dst.path()), &RunHooks::default()).unwrap();
    assert!(summary.all_failed());
    assert!(summary.output.is_file());
    assert!(sheet_names(&summary.output).contains(&"Skipped_Files".to_string()));
}

#[test]
fn missing_source_directory_is_a_config_error() {
    let dst = tempfile::tempdir().unwrap();
    let err = run(&config(&dst.path().join("nope"), dst.path()), &RunHooks::default()).unwrap_err();
    assert!(matches!(err, ReportError::Config { .. }), "{err}");
}

#[test]
fn report_does_not_depend_on_worker_count() {
    let src = tempfile::tempdir().unwrap();
    for i in 0..6 {
        let disk = (i * 400_000).to_string();
        let name = format!("vm{i}");
        write_sheet(
            &src.path().join(format!("export-{i}.xlsx")),
            "vInfo",
            &VINFO_HEADERS,
            &[
                vm(&name, WIN, "connected", &disk, "ClusterA"),
                vm("shared", UBUNTU, "connected", "50", ""),
            ],
        );
    }

    let mut outputs = Vec::new();
    for workers in [1, 4] {
        let dst = tempfile::tempdir().unwrap();
        let mut c = config(src.path(), dst.path());
        c.execution.num_threads = Some(workers);
        c.execution.max_in_flight_files = workers;
        let summary = run(&c, &RunHooks::default()).unwrap();
        assert_eq!(summary.vm_total, 12);
        outputs.push((
            read_sheet(&summary.output, "OS_Disk_Count"),
            read_sheet(&summary.output, "Standalone_VMs"),
        ));
    }
    assert_eq!(outputs[0], outputs[1]);
}

#[test]
fn custom_ranges_replace_the_defaults() {
    let (src, dst) = (tempfile::tempdir().unwrap(), tempfile::tempdir().unwrap());
    write_sheet(
        &src.path().join("a.xlsx"),
        "vInfo",
        &VINFO_HEADERS,
        &[
            vm("small", WIN, "connected", "10", "A"),
            vm("large", WIN, "connected", "5000", "A"),
        ],
    );

    let mut c = config(src.path(), dst.path());
    c.ranges = vm_inventory_report::processing::CapacityRanges::parse(&["0:1000:small", "1000::large"]).unwrap();
    let summary = run(&c, &RunHooks::default()).unwrap();

    let rows = read_sheet(&summary.output, "OS_Disk_Count");
    assert_eq!(count_for(&rows, WIN, "small").as_deref(), Some("1"));
    assert_eq!(count_for(&rows, WIN, "large").as_deref(), Some("1"));
}
