//! Disk-capacity classification into labeled half-open ranges.

use std::fmt;

use thiserror::Error;

use crate::error::{ReportError, ReportResult};

use super::aggregate::ALL_CAPACITIES;

/// One capacity bucket: `[lower, upper)` in MB, `upper == None` meaning unbounded.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityRange {
    pub lower: f64,
    pub upper: Option<f64>,
    pub label: String,
}

impl CapacityRange {
    pub fn new(lower: f64, upper: Option<f64>, label: impl Into<String>) -> Self {
        Self {
            lower,
            upper,
            label: label.into(),
        }
    }

    /// Lower-inclusive, upper-exclusive containment.
    pub fn contains(&self, size_mb: f64) -> bool {
        size_mb >= self.lower && self.upper.is_none_or(|u| size_mb < u)
    }
}

impl fmt::Display for CapacityRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upper {
            Some(u) => write!(f, "{} [{}, {})", self.label, self.lower, u),
            None => write!(f, "{} [{}, inf)", self.label, self.lower),
        }
    }
}

/// A size that cannot be placed in any range.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ClassifyError {
    #[error("disk capacity {0} is negative")]
    Negative(f64),
    #[error("disk capacity {0} is not a finite number")]
    NotFinite(f64),
}

/// Ordered, validated list of capacity ranges.
///
/// Invariants: the first range starts at 0, ranges are contiguous and non-overlapping, the last
/// range is unbounded, and labels are unique, non-empty and never the reserved
/// [`ALL_CAPACITIES`] label. Every finite non-negative size therefore falls in exactly one range.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityRanges {
    ranges: Vec<CapacityRange>,
}

impl CapacityRanges {
    /// Validate and wrap a list of ranges.
    pub fn new(ranges: Vec<CapacityRange>) -> ReportResult<Self> {
        let Some(first) = ranges.first() else {
            return Err(ReportError::config("at least one capacity range is required"));
        };
        if first.lower != 0.0 {
            return Err(ReportError::config(format!(
                "first capacity range '{}' must start at 0",
                first.label
            )));
        }

        let mut labels: Vec<&str> = Vec::with_capacity(ranges.len());
        for (i, r) in ranges.iter().enumerate() {
            let label = r.label.trim();
            if label.is_empty() {
                return Err(ReportError::config(format!("capacity range #{} has an empty label", i + 1)));
            }
            if label.eq_ignore_ascii_case(ALL_CAPACITIES) {
                return Err(ReportError::config(format!("'{ALL_CAPACITIES}' is a reserved label")));
            }
            if labels.contains(&label) {
                return Err(ReportError::config(format!("duplicate capacity range label '{label}'")));
            }
            labels.push(label);

            if !r.lower.is_finite() {
                return Err(ReportError::config(format!("range '{label}' has a non-finite lower bound")));
            }

            let is_last = i + 1 == ranges.len();
            match (r.upper, is_last) {
                (None, true) => {}
                (None, false) => {
                    return Err(ReportError::config(format!(
                        "only the last capacity range may be unbounded (got '{label}')"
                    )));
                }
                (Some(_), true) => {
                    return Err(ReportError::config(format!(
                        "the last capacity range '{label}' must be unbounded"
                    )));
                }
                (Some(upper), false) => {
                    if !upper.is_finite() || upper <= r.lower {
                        return Err(ReportError::config(format!(
                            "range '{label}' needs lower < upper (got {} .. {upper})",
                            r.lower
                        )));
                    }
                    let next = &ranges[i + 1];
                    if next.lower != upper {
                        return Err(ReportError::config(format!(
                            "ranges '{label}' and '{}' are not contiguous ({upper} != {})",
                            next.label, next.lower
                        )));
                    }
                }
            }
        }

        Ok(Self { ranges })
    }

    /// Parse `min:max:label` specs; an empty or `inf` max means unbounded.
    pub fn parse<S: AsRef<str>>(specs: &[S]) -> ReportResult<Self> {
        let ranges = specs
            .iter()
            .map(|s| parse_one(s.as_ref()))
            .collect::<ReportResult<Vec<_>>>()?;
        Self::new(ranges)
    }

    /// Find the range containing `size_mb`.
    pub fn classify(&self, size_mb: f64) -> Result<&CapacityRange, ClassifyError> {
        if !size_mb.is_finite() {
            return Err(ClassifyError::NotFinite(size_mb));
        }
        if size_mb < 0.0 {
            return Err(ClassifyError::Negative(size_mb));
        }
        // Validation guarantees full coverage of [0, inf).
        self.ranges
            .iter()
            .find(|r| r.contains(size_mb))
            .ok_or(ClassifyError::NotFinite(size_mb))
    }

    pub fn iter(&self) -> impl Iterator<Item = &CapacityRange> {
        self.ranges.iter()
    }

    /// Labels in ascending range order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.ranges.iter().map(|r| r.label.as_str())
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

impl Default for CapacityRanges {
    fn default() -> Self {
        Self {
            ranges: vec![
                CapacityRange::new(0.0, Some(150.0), "0 MB - 150 MB"),
                CapacityRange::new(150.0, Some(2_000_000.0), "150 MB - 2 TB"),
                CapacityRange::new(2_000_000.0, Some(10_000_000.0), "2 TB - 10 TB"),
                CapacityRange::new(10_000_000.0, Some(20_000_000.0), "10 TB - 20 TB"),
                CapacityRange::new(20_000_000.0, None, "20 TB - 40 TB"),
            ],
        }
    }
}

fn parse_one(entry: &str) -> ReportResult<CapacityRange> {
    let mut parts = entry.splitn(3, ':');
    let (Some(min), Some(max), Some(label)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ReportError::config(format!(
            "capacity range '{entry}' must look like min:max:label"
        )));
    };

    let lower = parse_bound(min, entry)?;
    let max = max.trim();
    let upper = if max.is_empty() || max.eq_ignore_ascii_case("inf") {
        None
    } else {
        Some(parse_bound(max, entry)?)
    };

    Ok(CapacityRange::new(lower, upper, label.trim()))
}

fn parse_bound(raw: &str, entry: &str) -> ReportResult<f64> {
    raw.trim()
        .replace('_', "")
        .parse::<f64>()
        .map_err(|e| ReportError::config(format!("invalid bound '{raw}' in capacity range '{entry}': {e}")))
}
