//! Splitting merged partials into the tables a report renders.

use super::aggregate::{ClusterPartial, ClusterTallies, DiskPartial, DiskTallies, HostCounts, OrphanVm};

const LOG_TARGET: &str = " segregate";

/// Disk report tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskSegregation {
    /// Per-range tallies; every accepted VM appears here exactly once.
    pub main: DiskTallies,
    /// `All Capacities` tallies of the vendor variant.
    pub variant: DiskTallies,
    /// VMs with an empty Cluster cell, sorted.
    pub orphans: Vec<OrphanVm>,
}

/// Cluster report tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterSegregation {
    pub main: ClusterTallies,
    pub hosts: HostCounts,
    /// Standalone VMs as `(vcenter, vm)`, sorted.
    pub orphans: Vec<OrphanVm>,
    /// VM names reported both inside a cluster and standalone.
    pub conflicts: Vec<String>,
}

pub fn segregate_disk(partial: DiskPartial) -> DiskSegregation {
    let (variant, main): (Vec<_>, Vec<_>) = partial
        .tallies
        .into_inner()
        .into_iter()
        .partition(|(key, _)| key.is_variant());

    let mut orphans = partial.orphans;
    orphans.sort();

    DiskSegregation {
        main: main.into_iter().collect(),
        variant: variant.into_iter().collect(),
        orphans,
    }
}

pub fn segregate_cluster(partial: ClusterPartial) -> ClusterSegregation {
    let mut orphans = partial.orphans;
    orphans.sort();

    let mut conflicts: Vec<String> = orphans
        .iter()
        .filter(|o| !o.vm_name.is_empty() && partial.clustered_vms.contains(&o.vm_name))
        .map(|o| o.vm_name.clone())
        .collect();
    conflicts.sort();
    conflicts.dedup();
    for name in &conflicts {
        log::warn!(target: LOG_TARGET, "VM '{name}' is reported both in a cluster and as standalone");
    }

    ClusterSegregation {
        main: partial.tallies,
        hosts: partial.hosts,
        orphans,
        conflicts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::aggregate::{DiskKey, PHOTON_OS};
    use crate::processing::classify::CapacityRanges;
    use crate::types::NormalizedRecord;

    fn record(name: &str, os: &str, tools: Option<&str>, cluster: Option<&str>) -> NormalizedRecord {
        NormalizedRecord {
            vm_name: Some(name.to_string()),
            os_label: os.to_string(),
            tools_os_label: tools.map(str::to_string),
            connection_state: "connected".to_string(),
            disk_capacity_mb: 1000.0,
            cluster_name: cluster.map(str::to_string),
            vcenter: Some("vc".to_string()),
            cpu_count: None,
            memory_mb: None,
        }
    }

    #[test]
    fn variant_moves_out_of_main_and_main_keeps_every_vm() {
        let ranges = CapacityRanges::default();
        let mut partial = DiskPartial::default();
        for r in [
            record("a", "Linux", None, Some("A")),
            record("b", "Photon OS (64-bit)", Some(PHOTON_OS), None),
        ] {
            partial.tallies.fold(&r, ranges.classify(r.disk_capacity_mb).unwrap());
            if r.cluster_name.is_none() {
                partial.orphans.push(OrphanVm::of(&r));
            }
        }

        let seg = segregate_disk(partial);
        assert_eq!(seg.main.total().count, 2);
        assert!(seg.main.iter().all(|(k, _)| !k.is_variant()));
        assert_eq!(seg.variant.len(), 1);
        assert_eq!(
            seg.variant
                .get(&DiskKey::variant("Photon OS (64-bit)", Some(PHOTON_OS)))
                .unwrap()
                .count,
            1
        );
        assert_eq!(seg.orphans.len(), 1);
    }

    #[test]
    fn orphans_are_sorted_and_conflicts_detected() {
        let mut partial = ClusterPartial::default();
        for r in [
            record("web-1", "Linux", None, Some("A")),
            record("zeta", "Linux", None, None),
            record("web-1", "Linux", None, None),
            record("alpha", "Linux", None, None),
        ] {
            if partial.tallies.fold(&r, None) {
                let _ = partial.clustered_vms.insert(r.vm_name.clone().unwrap());
            } else {
                partial.orphans.push(OrphanVm::of(&r));
            }
        }

        let seg = segregate_cluster(partial);
        let names: Vec<_> = seg.orphans.iter().map(|o| o.vm_name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "web-1", "zeta"]);
        assert_eq!(seg.conflicts, vec!["web-1".to_string()]);
        assert_eq!(seg.main.total().count, 1);
    }
}
