use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use vm_inventory_report::processing::{CapacityRanges, DiskTallies, Merge};
use vm_inventory_report::types::NormalizedRecord;

const OS_LABELS: [&str; 4] = [
    "Microsoft Windows Server 2019 (64-bit)",
    "Red Hat Enterprise Linux 8 (64-bit)",
    "Ubuntu Linux (64-bit)",
    "VMware Photon OS (64-bit)",
];

fn records(n: usize) -> Vec<NormalizedRecord> {
    (0..n)
        .map(|i| NormalizedRecord {
            vm_name: Some(format!("vm{i:05}")),
            os_label: OS_LABELS[i % OS_LABELS.len()].to_string(),
            tools_os_label: None,
            connection_state: "connected".to_string(),
            disk_capacity_mb: (i as f64 * 7_919.0) % 30_000_000.0,
            cluster_name: Some(format!("Cluster{}", i % 8)),
            vcenter: Some("vc01".to_string()),
            cpu_count: Some(4.0),
            memory_mb: Some(8192.0),
        })
        .collect()
}

fn fold(ranges: &CapacityRanges, records: &[NormalizedRecord]) -> DiskTallies {
    let mut tallies = DiskTallies::default();
    for r in records {
        if let Ok(range) = ranges.classify(r.disk_capacity_mb) {
            tallies.fold(r, range);
        }
    }
    tallies
}

fn bench_classify(c: &mut Criterion) {
    let ranges = CapacityRanges::default();
    let sizes: Vec<f64> = (0..10_000).map(|i| f64::from(i) * 3_001.0).collect();

    let mut group = c.benchmark_group("classify");
    group.throughput(Throughput::Elements(sizes.len() as u64));
    group.bench_function("default_ranges", |b| {
        b.iter(|| {
            for size in &sizes {
                let _ = black_box(ranges.classify(black_box(*size)));
            }
        });
    });
    group.finish();
}

fn bench_fold_and_merge(c: &mut Criterion) {
    let ranges = CapacityRanges::default();
    let mut group = c.benchmark_group("aggregate");

    for n in [1_000usize, 20_000] {
        let data = records(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("fold", n), &data, |b, data| {
            b.iter(|| fold(&ranges, black_box(data)));
        });

        let partials: Vec<DiskTallies> = data.chunks(n / 8).map(|chunk| fold(&ranges, chunk)).collect();
        group.bench_with_input(BenchmarkId::new("merge_8_partials", n), &partials, |b, partials| {
            b.iter(|| {
                partials
                    .iter()
                    .cloned()
                    .fold(DiskTallies::default(), |acc, p| acc.merge(p))
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_classify, bench_fold_and_merge);
criterion_main!(benches);
