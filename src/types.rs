//! Core data model types.
//!
//! Ingestion produces [`RawTable`]s: header labels plus loosely-typed [`Value`] cells, one table per
//! worksheet. The row normalizer turns each raw row into a [`NormalizedRecord`] using a
//! [`Schema`] of logical [`Column`]s; untyped rows never travel past that boundary.

use std::borrow::Cow;
use std::fmt;

/// A single loosely-typed cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
}

impl Value {
    /// Build a value from raw text: empty or whitespace-only text becomes [`Value::Null`].
    pub fn from_text(raw: &str) -> Self {
        if raw.trim().is_empty() {
            Self::Null
        } else {
            Self::Utf8(raw.to_string())
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Text rendering of the cell, trimmed. `None` for null and blank strings.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Null => None,
            Self::Utf8(s) => {
                let t = s.trim();
                if t.is_empty() { None } else { Some(Cow::Borrowed(t)) }
            }
            Self::Int64(i) => Some(Cow::Owned(i.to_string())),
            Self::Float64(f) => Some(Cow::Owned(format_float(*f))),
            Self::Bool(b) => Some(Cow::Owned(b.to_string())),
        }
    }

    /// Numeric interpretation of the cell.
    ///
    /// - `Ok(None)` for null/blank cells
    /// - `Ok(Some(_))` for numbers and numeric strings (thousands separators are accepted)
    /// - `Err(message)` for anything else
    pub fn as_f64(&self) -> Result<Option<f64>, String> {
        match self {
            Self::Null => Ok(None),
            Self::Int64(i) => Ok(Some(*i as f64)),
            Self::Float64(f) => Ok(Some(*f)),
            Self::Bool(_) => Err("expected number (got bool)".to_string()),
            Self::Utf8(s) => {
                let t = s.trim();
                if t.is_empty() {
                    return Ok(None);
                }
                t.replace(',', "")
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|e| e.to_string())
            }
        }
    }

    /// Boolean interpretation of the cell; `None` when the cell is null or not boolean-like.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int64(i) => Some(*i != 0),
            Self::Float64(f) => Some(*f != 0.0),
            Self::Utf8(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" | "yes" | "y" => Some(true),
                "false" | "f" | "0" | "no" | "n" => Some(false),
                _ => None,
            },
            Self::Null => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Int64(i) => write!(f, "{i}"),
            Self::Float64(v) => f.write_str(&format_float(*v)),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Utf8(s) => f.write_str(s),
        }
    }
}

fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        (f as i64).to_string()
    } else {
        f.to_string()
    }
}

/// One worksheet (or CSV file) read into memory without interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// Sheet name (the file stem for CSV inputs).
    pub sheet: String,
    /// 1-based row number of the header row in the source.
    pub header_row: usize,
    /// Header labels, in column order.
    pub headers: Vec<String>,
    /// Data rows; rows may be shorter than `headers` when trailing cells are empty.
    pub rows: Vec<Vec<Value>>,
}

impl RawTable {
    pub fn new(sheet: impl Into<String>, header_row: usize, headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            sheet: sheet.into(),
            header_row,
            headers,
            rows,
        }
    }

    /// Number of data rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// 1-based source row number of data row `idx`.
    pub fn source_row(&self, idx: usize) -> usize {
        self.header_row + idx + 1
    }
}

/// Which summary a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportVariant {
    /// VMs bucketed by disk-capacity range and grouped by OS.
    Disk,
    /// VMs aggregated per cluster (optionally per country).
    Cluster,
}

/// How a logical column is located among a sheet's headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnMatch {
    /// Header equals one of the aliases (trimmed, case-insensitive), first alias wins.
    Exact(&'static [&'static str]),
    /// Header contains one of the fragments (case-insensitive), first header wins.
    Contains(&'static [&'static str]),
}

/// Logical columns of a VM inventory export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    VmName,
    OsConfig,
    OsTools,
    ConnectionState,
    DiskCapacity,
    Cluster,
    Folder,
    PowerState,
    Template,
    SrmPlaceholder,
    Cpus,
    Memory,
    VcenterServer,
}

impl Column {
    /// Header matching rule for the column.
    pub fn matcher(self) -> ColumnMatch {
        match self {
            Self::VmName => ColumnMatch::Exact(&["VM", "Name"]),
            Self::OsConfig => ColumnMatch::Contains(&["OS according to the configuration file"]),
            Self::OsTools => ColumnMatch::Contains(&["OS according to the VMware Tools"]),
            Self::ConnectionState => ColumnMatch::Exact(&["Connection state"]),
            Self::DiskCapacity => {
                ColumnMatch::Contains(&["Total disk capacity MiB", "Total disk capacity MB"])
            }
            Self::Cluster => ColumnMatch::Exact(&["Cluster"]),
            Self::Folder => ColumnMatch::Exact(&["Folder"]),
            Self::PowerState => ColumnMatch::Exact(&["Powerstate"]),
            Self::Template => ColumnMatch::Exact(&["Template"]),
            Self::SrmPlaceholder => ColumnMatch::Exact(&["SRM Placeholder"]),
            Self::Cpus => ColumnMatch::Exact(&["CPUs"]),
            Self::Memory => ColumnMatch::Exact(&["Memory"]),
            Self::VcenterServer => ColumnMatch::Exact(&["VI SDK Server"]),
        }
    }

    /// Human-readable name used in schema error messages.
    pub fn display_name(self) -> &'static str {
        match self.matcher() {
            ColumnMatch::Exact(names) | ColumnMatch::Contains(names) => names[0],
        }
    }

    /// Returns the index of the first header satisfying this column's matcher.
    pub fn find_in(self, headers: &[String]) -> Option<usize> {
        match self.matcher() {
            ColumnMatch::Exact(aliases) => aliases.iter().find_map(|alias| {
                headers
                    .iter()
                    .position(|h| h.trim().eq_ignore_ascii_case(alias))
            }),
            ColumnMatch::Contains(fragments) => {
                let lowered: Vec<String> = fragments.iter().map(|f| f.to_ascii_lowercase()).collect();
                headers.iter().position(|h| {
                    let h = h.to_ascii_lowercase();
                    lowered.iter().any(|frag| h.contains(frag.as_str()))
                })
            }
        }
    }
}

/// A logical column and whether the report needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub column: Column,
    pub required: bool,
}

impl Field {
    pub fn required(column: Column) -> Self {
        Self { column, required: true }
    }

    pub fn optional(column: Column) -> Self {
        Self {
            column,
            required: false,
        }
    }
}

/// The columns a report variant reads from each sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Columns read by the given report variant.
    pub fn for_variant(variant: ReportVariant) -> Self {
        let cluster_required = variant == ReportVariant::Cluster;
        let cluster_field = |column| {
            if cluster_required {
                Field::required(column)
            } else {
                Field::optional(column)
            }
        };

        Self::new(vec![
            Field::required(Column::OsConfig),
            Field::required(Column::ConnectionState),
            Field::required(Column::DiskCapacity),
            Field::optional(Column::OsTools),
            Field::optional(Column::VmName),
            cluster_field(Column::Cluster),
            cluster_field(Column::Cpus),
            cluster_field(Column::Memory),
            Field::optional(Column::Folder),
            Field::optional(Column::PowerState),
            Field::optional(Column::Template),
            Field::optional(Column::SrmPlaceholder),
            Field::optional(Column::VcenterServer),
        ])
    }

    /// Required columns, in schema order.
    pub fn required_columns(&self) -> impl Iterator<Item = Column> + '_ {
        self.fields.iter().filter(|f| f.required).map(|f| f.column)
    }
}

/// A validated VM entry.
///
/// Invariant: `os_label` is non-empty and `disk_capacity_mb` is finite and non-negative.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub vm_name: Option<String>,
    pub os_label: String,
    pub tools_os_label: Option<String>,
    pub connection_state: String,
    /// Provisioned disk capacity in MB (MiB sources are converted).
    pub disk_capacity_mb: f64,
    /// `None` when the VM has no cluster membership.
    pub cluster_name: Option<String>,
    /// Short vCenter name (host part before the first `.`).
    pub vcenter: Option<String>,
    pub cpu_count: Option<f64>,
    pub memory_mb: Option<f64>,
}
