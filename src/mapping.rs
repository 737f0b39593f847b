//! `(vCenter, vCluster) -> Country` mapping table for the cluster report.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{ReportError, ReportResult};
use crate::ingestion::{IngestionOptions, SheetSelection, read_tables};
use crate::processing::is_blank_row;
use crate::types::RawTable;

const LOG_TARGET: &str = "   mapping";

/// Default sheet holding the mapping.
pub const DEFAULT_MAPPING_SHEET: &str = "vClusterLoc";

const COUNTRY: &str = "Country";
const VCENTER: &str = "vCenter";
const VCLUSTER: &str = "vCluster";

/// Read-only lookup from a cluster (qualified by its vCenter) to a country.
///
/// Keys are compared case-insensitively after trimming; vCenter names are shortened to the text
/// before the first `.` on both sides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingTable {
    by_vcenter: HashMap<(String, String), String>,
    /// Cluster-only lookup, for clusters whose name is unique across vCenters.
    by_cluster: HashMap<String, Option<String>>,
}

impl MappingTable {
    /// Load the mapping from `sheet` of a workbook (or from a CSV file).
    ///
    /// Any problem with the file is a configuration error: the run cannot produce the requested
    /// grouping without it.
    pub fn load(path: impl AsRef<Path>, sheet: &str) -> ReportResult<Self> {
        let path = path.as_ref();
        let opts = IngestionOptions {
            sheet_selection: SheetSelection::Sheets(vec![sheet.to_string()]),
            ..IngestionOptions::default()
        };
        let invalid = |e: ReportError| ReportError::config(format!("mapping table '{}': {e}", path.display()));

        let table = read_tables(path, &opts)
            .map_err(invalid)?
            .into_iter()
            .next()
            .ok_or_else(|| invalid(ReportError::schema(format!("sheet '{sheet}' is empty"))))?;
        let mapping = Self::from_table(&table).map_err(invalid)?;

        log::info!(target: LOG_TARGET, "loaded {} mapping entries from {}", mapping.len(), path.display());
        Ok(mapping)
    }

    /// Build the mapping from an already-read table.
    pub fn from_table(table: &RawTable) -> ReportResult<Self> {
        let find = |name: &str| {
            table
                .headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| ReportError::schema(format!("missing required column '{name}'")))
        };
        let (country_idx, vcenter_idx, cluster_idx) = (find(COUNTRY)?, find(VCENTER)?, find(VCLUSTER)?);

        let mut mapping = Self::default();
        for (i, row) in table.rows.iter().enumerate() {
            if is_blank_row(row) {
                continue;
            }
            let cell = |idx: usize, column: &str| {
                row.get(idx)
                    .and_then(|v| v.as_text())
                    .map(|t| t.into_owned())
                    .ok_or_else(|| ReportError::ParseError {
                        row: table.source_row(i),
                        column: column.to_string(),
                        raw: String::new(),
                        message: "value is required".to_string(),
                    })
            };
            let country = cell(country_idx, COUNTRY)?;
            let vcenter = cell(vcenter_idx, VCENTER)?;
            let cluster = cell(cluster_idx, VCLUSTER)?;
            mapping.insert(&vcenter, &cluster, country);
        }
        Ok(mapping)
    }

    /// Add one entry; the first entry for a key wins.
    pub fn insert(&mut self, vcenter: &str, cluster: &str, country: String) {
        let key = (short_vcenter(vcenter), fold(cluster));
        if let Some(existing) = self.by_vcenter.get(&key) {
            if *existing != country {
                log::warn!(
                    target: LOG_TARGET,
                    "conflicting countries for {vcenter}/{cluster}: keeping '{existing}', ignoring '{country}'"
                );
            }
            return;
        }

        let _ = self
            .by_cluster
            .entry(key.1.clone())
            .and_modify(|c| {
                if c.as_deref() != Some(country.as_str()) {
                    *c = None;
                }
            })
            .or_insert_with(|| Some(country.clone()));
        let _ = self.by_vcenter.insert(key, country);
    }

    /// Country of `cluster`. Without a vCenter, only clusters with an unambiguous country match.
    pub fn lookup(&self, vcenter: Option<&str>, cluster: &str) -> Option<&str> {
        let cluster = fold(cluster);
        match vcenter {
            Some(vc) => self.by_vcenter.get(&(short_vcenter(vc), cluster)).map(String::as_str),
            None => self.by_cluster.get(&cluster).and_then(|c| c.as_deref()),
        }
    }

    pub fn len(&self) -> usize {
        self.by_vcenter.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_vcenter.is_empty()
    }
}

fn fold(s: &str) -> String {
    s.trim().to_lowercase()
}

fn short_vcenter(s: &str) -> String {
    let s = s.trim();
    fold(s.split('.').next().unwrap_or(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    fn table(rows: &[[&str; 3]]) -> RawTable {
        RawTable::new(
            "vClusterLoc",
            1,
            vec!["Country".to_string(), "vCenter".to_string(), " vCluster ".to_string()],
            rows.iter().map(|r| r.iter().map(|c| Value::from_text(c)).collect()).collect(),
        )
    }

    #[test]
    fn lookup_is_case_insensitive_and_trimmed() {
        let m = MappingTable::from_table(&table(&[["Germany", "vc01", "ClusterA"], ["France", "vc02", "ClusterB"]]))
            .unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.lookup(Some("VC01"), " clustera "), Some("Germany"));
        assert_eq!(m.lookup(Some("vc01.example.com"), "ClusterA"), Some("Germany"));
        assert_eq!(m.lookup(Some("vc02"), "ClusterA"), None);
    }

    #[test]
    fn cluster_only_lookup_requires_an_unambiguous_country() {
        let m = MappingTable::from_table(&table(&[
            ["Germany", "vc01", "Shared"],
            ["France", "vc02", "Shared"],
            ["Spain", "vc03", "Unique"],
        ]))
        .unwrap();
        assert_eq!(m.lookup(None, "unique"), Some("Spain"));
        assert_eq!(m.lookup(None, "Shared"), None);
    }

    #[test]
    fn first_entry_wins_on_duplicates() {
        let m = MappingTable::from_table(&table(&[["Germany", "vc01", "A"], ["France", "VC01", "a"]])).unwrap();
        assert_eq!(m.len(), 1);
        assert_eq!(m.lookup(Some("vc01"), "A"), Some("Germany"));
    }

    #[test]
    fn blank_rows_are_skipped_and_partial_rows_rejected() {
        let m = MappingTable::from_table(&table(&[["", "", ""], ["Germany", "vc01", "A"]])).unwrap();
        assert_eq!(m.len(), 1);

        let err = MappingTable::from_table(&table(&[["Germany", "vc01", "A"], ["", "vc01", "B"]])).unwrap_err();
        match err {
            ReportError::ParseError { row, column, .. } => {
                assert_eq!(row, 3);
                assert_eq!(column, "Country");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn missing_columns_are_schema_errors() {
        let t = RawTable::new("x", 1, vec!["Country".to_string()], vec![]);
        assert!(matches!(
            MappingTable::from_table(&t),
            Err(ReportError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn unreadable_mapping_file_is_a_config_error() {
        let err = MappingTable::load("no/such/mapping.xlsx", DEFAULT_MAPPING_SHEET).unwrap_err();
        assert!(matches!(err, ReportError::Config { .. }));
    }
}
