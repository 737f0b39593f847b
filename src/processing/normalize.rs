//! Raw spreadsheet rows to validated [`NormalizedRecord`]s.
//!
//! A [`ColumnLayout`] is resolved once per sheet; a [`RowNormalizer`] then turns each row into a
//! record or a [`RowRejection`]. Rejections are counted per [`RejectionKind`] and dropped.

use std::collections::BTreeMap;
use std::fmt;

use regex::{Regex, RegexBuilder};
use thiserror::Error;

use crate::error::{ReportError, ReportResult};
use crate::types::{Column, NormalizedRecord, Schema, Value};

use super::aggregate::Merge;

/// Multiplier from MiB to MB.
pub const MIB_TO_MB: f64 = 1.048576;

const REJECTED_STATES: [&str; 3] = ["disconnected", "invalid", "inaccessible"];
const REJECTED_OS_FRAGMENTS: [&str; 3] = ["template", "srm placeholder", "additionalbackend"];

/// Column positions of one sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    positions: BTreeMap<Column, usize>,
    disk_factor: f64,
}

impl ColumnLayout {
    /// Locate the schema's columns among `headers`.
    ///
    /// Fails with a schema error naming every missing required column.
    pub fn resolve(headers: &[String], schema: &Schema) -> ReportResult<Self> {
        let mut positions = BTreeMap::new();
        let mut missing = Vec::new();
        for field in &schema.fields {
            match field.column.find_in(headers) {
                Some(idx) => {
                    let _ = positions.insert(field.column, idx);
                }
                None if field.required => missing.push(field.column.display_name()),
                None => {}
            }
        }
        if !missing.is_empty() {
            return Err(ReportError::schema(format!("missing required column(s): {}", missing.join(", "))));
        }

        let disk_factor = positions
            .get(&Column::DiskCapacity)
            .and_then(|&i| headers.get(i))
            .map_or(1.0, |h| if h.to_ascii_lowercase().contains("mib") { MIB_TO_MB } else { 1.0 });

        Ok(Self { positions, disk_factor })
    }

    pub fn get(&self, column: Column) -> Option<usize> {
        self.positions.get(&column).copied()
    }

    pub fn has(&self, column: Column) -> bool {
        self.positions.contains_key(&column)
    }

    /// Factor converting the sheet's disk unit to MB.
    pub fn disk_factor(&self) -> f64 {
        self.disk_factor
    }

    fn cell<'r>(&self, row: &'r [Value], column: Column) -> Option<&'r Value> {
        self.get(column).and_then(|i| row.get(i))
    }

    fn text(&self, row: &[Value], column: Column) -> Option<String> {
        self.cell(row, column).and_then(Value::as_text).map(|t| t.into_owned())
    }
}

/// Why a row was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RejectionKind {
    MissingOs,
    TemplateOs,
    TemplateFlag,
    SrmPlaceholderFlag,
    Disconnected,
    InvalidDiskCapacity,
    PoweredOff,
    IgnoredVm,
    IgnoredLocation,
    /// Photon OS appliance, left out of cluster summaries.
    Appliance,
}

impl RejectionKind {
    pub const ALL: [Self; 10] = [
        Self::MissingOs,
        Self::TemplateOs,
        Self::TemplateFlag,
        Self::SrmPlaceholderFlag,
        Self::Disconnected,
        Self::InvalidDiskCapacity,
        Self::PoweredOff,
        Self::IgnoredVm,
        Self::IgnoredLocation,
        Self::Appliance,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingOs => "missing OS",
            Self::TemplateOs => "template OS label",
            Self::TemplateFlag => "template",
            Self::SrmPlaceholderFlag => "SRM placeholder",
            Self::Disconnected => "disconnected",
            Self::InvalidDiskCapacity => "invalid disk capacity",
            Self::PoweredOff => "powered off",
            Self::IgnoredVm => "ignored VM name",
            Self::IgnoredLocation => "ignored cluster/folder",
            Self::Appliance => "Photon OS appliance",
        }
    }
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row that does not become a record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowRejection {
    #[error("operating system label is empty")]
    MissingOs,
    #[error("operating system label '{0}' marks a template, placeholder or backend VM")]
    TemplateOs(String),
    #[error("row is a template")]
    TemplateFlag,
    #[error("row is an SRM placeholder")]
    SrmPlaceholderFlag,
    #[error("connection state is '{0}'")]
    Disconnected(String),
    #[error("disk capacity {raw:?}: {message}")]
    InvalidDiskCapacity { raw: String, message: String },
    #[error("VM is powered off")]
    PoweredOff,
    #[error("VM '{0}' matches an ignore pattern")]
    IgnoredVm(String),
    #[error("cluster or folder '{0}' matches an ignore term")]
    IgnoredLocation(String),
}

impl RowRejection {
    pub fn kind(&self) -> RejectionKind {
        match self {
            Self::MissingOs => RejectionKind::MissingOs,
            Self::TemplateOs(_) => RejectionKind::TemplateOs,
            Self::TemplateFlag => RejectionKind::TemplateFlag,
            Self::SrmPlaceholderFlag => RejectionKind::SrmPlaceholderFlag,
            Self::Disconnected(_) => RejectionKind::Disconnected,
            Self::InvalidDiskCapacity { .. } => RejectionKind::InvalidDiskCapacity,
            Self::PoweredOff => RejectionKind::PoweredOff,
            Self::IgnoredVm(_) => RejectionKind::IgnoredVm,
            Self::IgnoredLocation(_) => RejectionKind::IgnoredLocation,
        }
    }
}

/// Per-kind rejection counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RejectionCounts {
    counts: BTreeMap<RejectionKind, u64>,
}

impl RejectionCounts {
    pub fn record(&mut self, kind: RejectionKind) {
        *self.counts.entry(kind).or_default() += 1;
    }

    pub fn get(&self, kind: RejectionKind) -> u64 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Non-zero counters in kind order.
    pub fn iter(&self) -> impl Iterator<Item = (RejectionKind, u64)> + '_ {
        self.counts.iter().map(|(k, v)| (*k, *v))
    }
}

impl Merge for RejectionCounts {
    fn merge(mut self, other: Self) -> Self {
        for (kind, n) in other.counts {
            *self.counts.entry(kind).or_default() += n;
        }
        self
    }
}

impl fmt::Display for RejectionCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.counts.is_empty() {
            return f.write_str("none");
        }
        let parts: Vec<String> = self.iter().map(|(k, n)| format!("{k}={n}")).collect();
        f.write_str(&parts.join(", "))
    }
}

/// Optional row filters taken from configuration.
#[derive(Debug, Clone, Default)]
pub struct RowFilters {
    pub skip_powered_off: bool,
    ignore_vm_patterns: Vec<Regex>,
    ignore_terms: Vec<String>,
}

impl RowFilters {
    /// Build filters; patterns are case-insensitive regexes searched anywhere in the VM name,
    /// terms are case-insensitive substrings of the Cluster or Folder cell.
    pub fn new<P, T>(skip_powered_off: bool, vm_patterns: &[P], location_terms: &[T]) -> ReportResult<Self>
    where
        P: AsRef<str>,
        T: AsRef<str>,
    {
        let ignore_vm_patterns = vm_patterns
            .iter()
            .map(|p| p.as_ref().trim())
            .filter(|p| !p.is_empty())
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| ReportError::config(format!("invalid ignore pattern '{p}': {e}")))
            })
            .collect::<ReportResult<Vec<_>>>()?;

        let ignore_terms = location_terms
            .iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();

        Ok(Self {
            skip_powered_off,
            ignore_vm_patterns,
            ignore_terms,
        })
    }

    pub fn is_empty(&self) -> bool {
        !self.skip_powered_off && self.ignore_vm_patterns.is_empty() && self.ignore_terms.is_empty()
    }

    fn ignores_vm(&self, name: &str) -> bool {
        self.ignore_vm_patterns.iter().any(|re| re.is_match(name))
    }

    fn ignores_location(&self, value: &str) -> bool {
        let value = value.to_lowercase();
        self.ignore_terms.iter().any(|t| value.contains(t.as_str()))
    }
}

/// Converts the rows of one sheet.
#[derive(Debug, Clone)]
pub struct RowNormalizer<'a> {
    layout: ColumnLayout,
    filters: &'a RowFilters,
}

impl<'a> RowNormalizer<'a> {
    pub fn new(layout: ColumnLayout, filters: &'a RowFilters) -> Self {
        Self { layout, filters }
    }

    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    /// Validate one raw row.
    pub fn normalize(&self, row: &[Value]) -> Result<NormalizedRecord, RowRejection> {
        let layout = &self.layout;

        let os_label = layout.text(row, Column::OsConfig).ok_or(RowRejection::MissingOs)?;
        let os_lower = os_label.to_lowercase();
        if REJECTED_OS_FRAGMENTS.iter().any(|f| os_lower.contains(f)) {
            return Err(RowRejection::TemplateOs(os_label));
        }
        if flag_set(layout.cell(row, Column::Template)) {
            return Err(RowRejection::TemplateFlag);
        }
        if flag_set(layout.cell(row, Column::SrmPlaceholder)) {
            return Err(RowRejection::SrmPlaceholderFlag);
        }

        let connection_state = layout.text(row, Column::ConnectionState).unwrap_or_default();
        if REJECTED_STATES.iter().any(|s| connection_state.eq_ignore_ascii_case(s)) {
            return Err(RowRejection::Disconnected(connection_state));
        }

        let vm_name = layout.text(row, Column::VmName);
        let cluster_name = layout.text(row, Column::Cluster);
        self.apply_filters(row, vm_name.as_deref(), cluster_name.as_deref())?;

        let disk_capacity_mb = self.disk_capacity(row)?;

        Ok(NormalizedRecord {
            vm_name,
            os_label,
            tools_os_label: layout.text(row, Column::OsTools),
            connection_state,
            disk_capacity_mb,
            cluster_name,
            vcenter: layout
                .text(row, Column::VcenterServer)
                .and_then(|s| s.split('.').next().map(str::to_string))
                .filter(|s| !s.is_empty()),
            cpu_count: optional_number(layout.cell(row, Column::Cpus)),
            memory_mb: optional_number(layout.cell(row, Column::Memory)),
        })
    }

    fn apply_filters(&self, row: &[Value], vm_name: Option<&str>, cluster: Option<&str>) -> Result<(), RowRejection> {
        let filters = self.filters;
        if filters.is_empty() {
            return Ok(());
        }

        if filters.skip_powered_off {
            let state = self.layout.text(row, Column::PowerState);
            if state.is_some_and(|s| s.eq_ignore_ascii_case("poweredOff")) {
                return Err(RowRejection::PoweredOff);
            }
        }
        if let Some(name) = vm_name {
            if filters.ignores_vm(name) {
                return Err(RowRejection::IgnoredVm(name.to_string()));
            }
        }
        let folder = self.layout.text(row, Column::Folder);
        for location in [cluster, folder.as_deref()].into_iter().flatten() {
            if filters.ignores_location(location) {
                return Err(RowRejection::IgnoredLocation(location.to_string()));
            }
        }
        Ok(())
    }

    fn disk_capacity(&self, row: &[Value]) -> Result<f64, RowRejection> {
        let cell = self.layout.cell(row, Column::DiskCapacity).unwrap_or(&Value::Null);
        let invalid = |message: &str| RowRejection::InvalidDiskCapacity {
            raw: cell.to_string(),
            message: message.to_string(),
        };

        let raw = match cell.as_f64() {
            Ok(Some(v)) => v,
            Ok(None) => return Err(invalid("missing")),
            Err(e) => return Err(invalid(&e)),
        };
        let mb = raw * self.layout.disk_factor();
        if !mb.is_finite() {
            return Err(invalid("not a finite number"));
        }
        if mb < 0.0 {
            return Err(invalid("negative"));
        }
        Ok(mb)
    }
}

/// True when every cell of the row is empty.
pub fn is_blank_row(row: &[Value]) -> bool {
    row.iter().all(|v| v.as_text().is_none())
}

fn flag_set(cell: Option<&Value>) -> bool {
    cell.and_then(Value::as_bool).unwrap_or(false)
}

fn optional_number(cell: Option<&Value>) -> Option<f64> {
    cell.and_then(|v| v.as_f64().ok().flatten()).filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReportVariant;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn text(s: &str) -> Value {
        Value::from_text(s)
    }

    fn disk_layout() -> ColumnLayout {
        let h = headers(&[
            "VM",
            "OS according to the configuration file",
            "OS according to the VMware Tools",
            "Connection state",
            "Total disk capacity MB",
            "Cluster",
            "Powerstate",
            "Template",
            "Folder",
            "VI SDK Server",
        ]);
        ColumnLayout::resolve(&h, &Schema::for_variant(ReportVariant::Disk)).unwrap()
    }

    fn row(vm: &str, os: &str, state: &str, disk: Value, cluster: &str) -> Vec<Value> {
        vec![
            text(vm),
            text(os),
            Value::Null,
            text(state),
            disk,
            text(cluster),
            text("poweredOn"),
            Value::Bool(false),
            text("/dc/vms"),
            text("vc01.example.com"),
        ]
    }

    #[test]
    fn valid_row_becomes_a_record() {
        let filters = RowFilters::default();
        let n = RowNormalizer::new(disk_layout(), &filters);
        let rec = n
            .normalize(&row("web-1", "Windows Server 2016", "connected", Value::Float64(140.0), "ClusterA"))
            .unwrap();
        assert_eq!(rec.os_label, "Windows Server 2016");
        assert_eq!(rec.disk_capacity_mb, 140.0);
        assert_eq!(rec.cluster_name.as_deref(), Some("ClusterA"));
        assert_eq!(rec.vcenter.as_deref(), Some("vc01"));
        assert_eq!(rec.vm_name.as_deref(), Some("web-1"));
    }

    #[test]
    fn missing_required_columns_are_listed() {
        let h = headers(&["VM", "OS according to the configuration file"]);
        let err = ColumnLayout::resolve(&h, &Schema::for_variant(ReportVariant::Cluster)).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Connection state"), "{msg}");
        assert!(msg.contains("Total disk capacity MiB"), "{msg}");
        assert!(msg.contains("CPUs"), "{msg}");
    }

    #[test]
    fn mib_header_converts_to_mb() {
        let h = headers(&[
            "OS according to the configuration file",
            "Connection state",
            "Total disk capacity MiB",
        ]);
        let layout = ColumnLayout::resolve(&h, &Schema::for_variant(ReportVariant::Disk)).unwrap();
        assert_eq!(layout.disk_factor(), MIB_TO_MB);

        let filters = RowFilters::default();
        let rec = RowNormalizer::new(layout, &filters)
            .normalize(&[text("Linux"), text("connected"), Value::Int64(1000)])
            .unwrap();
        assert!((rec.disk_capacity_mb - 1048.576).abs() < 1e-9);
        assert_eq!(rec.cluster_name, None);
    }

    #[test]
    fn rejections_carry_their_reason() {
        let filters = RowFilters::default();
        let n = RowNormalizer::new(disk_layout(), &filters);
        let cases = [
            (row("a", "", "connected", Value::Float64(1.0), ""), RejectionKind::MissingOs),
            (row("b", "Windows Template", "connected", Value::Float64(1.0), ""), RejectionKind::TemplateOs),
            (row("c", "SRM Placeholder (64-bit)", "connected", Value::Float64(1.0), ""), RejectionKind::TemplateOs),
            (row("c2", "AdditionalBackEnd Linux", "connected", Value::Float64(1.0), ""), RejectionKind::TemplateOs),
            (row("c3", "Other additionalbackend (32-bit)", "connected", Value::Float64(1.0), ""), RejectionKind::TemplateOs),
            (row("d", "Linux", "Disconnected", Value::Float64(1.0), ""), RejectionKind::Disconnected),
            (row("e", "Linux", "inaccessible", Value::Float64(1.0), ""), RejectionKind::Disconnected),
            (row("f", "Linux", "connected", text("abc"), ""), RejectionKind::InvalidDiskCapacity),
            (row("g", "Linux", "connected", Value::Null, ""), RejectionKind::InvalidDiskCapacity),
            (row("h", "Linux", "connected", Value::Float64(-5.0), ""), RejectionKind::InvalidDiskCapacity),
        ];
        for (r, kind) in cases {
            assert_eq!(n.normalize(&r).unwrap_err().kind(), kind, "{r:?}");
        }

        let mut templated = row("i", "Linux", "connected", Value::Float64(1.0), "");
        templated[7] = Value::Bool(true);
        assert_eq!(n.normalize(&templated).unwrap_err(), RowRejection::TemplateFlag);
    }

    #[test]
    fn optional_filters_apply_only_when_configured() {
        let filters = RowFilters::new(true, &["^tmp-"], &["decom"]).unwrap();
        let n = RowNormalizer::new(disk_layout(), &filters);

        let mut off = row("web", "Linux", "connected", Value::Float64(1.0), "A");
        off[6] = text("poweredOff");
        assert_eq!(n.normalize(&off).unwrap_err().kind(), RejectionKind::PoweredOff);

        let tmp = row("TMP-42", "Linux", "connected", Value::Float64(1.0), "A");
        assert_eq!(n.normalize(&tmp).unwrap_err().kind(), RejectionKind::IgnoredVm);

        let decom = row("web", "Linux", "connected", Value::Float64(1.0), "Decom-Cluster");
        assert_eq!(n.normalize(&decom).unwrap_err().kind(), RejectionKind::IgnoredLocation);

        let ok = row("web", "Linux", "connected", Value::Float64(1.0), "A");
        assert!(n.normalize(&ok).is_ok());
    }

    #[test]
    fn invalid_ignore_pattern_is_a_config_error() {
        let err = RowFilters::new(false, &["("], &[] as &[&str]).unwrap_err();
        assert!(matches!(err, ReportError::Config { .. }));
    }

    #[test]
    fn rejection_counts_merge_by_kind() {
        let mut a = RejectionCounts::default();
        a.record(RejectionKind::MissingOs);
        a.record(RejectionKind::Disconnected);
        let mut b = RejectionCounts::default();
        b.record(RejectionKind::Disconnected);

        let m = a.merge(b);
        assert_eq!(m.get(RejectionKind::Disconnected), 2);
        assert_eq!(m.get(RejectionKind::MissingOs), 1);
        assert_eq!(m.total(), 3);
        assert_eq!(m.to_string(), "missing OS=1, disconnected=2");
    }

    #[test]
    fn blank_rows_are_detected() {
        assert!(is_blank_row(&[Value::Null, text("  ")]));
        assert!(!is_blank_row(&[Value::Null, Value::Int64(0)]));
    }
}
