//! Run configuration, built once by the CLI and threaded through the pipeline.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ReportError, ReportResult};
use crate::execution::ExecutionOptions;
use crate::ingestion::SheetSelection;
use crate::mapping::DEFAULT_MAPPING_SHEET;
use crate::processing::{CapacityRanges, RowFilters};
use crate::types::ReportVariant;

pub const DEFAULT_SOURCE_DIR: &str = "./data";
pub const DEFAULT_DESTINATION_DIR: &str = "./output";
pub const DEFAULT_OUTPUT_NAME: &str = "output";
pub const OUTPUT_EXTENSION: &str = "xlsx";

/// Where the optional cluster-to-country mapping lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingSource {
    pub path: PathBuf,
    pub sheet: String,
}

impl MappingSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sheet: DEFAULT_MAPPING_SHEET.to_string(),
        }
    }
}

/// Everything a report run needs to know.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub variant: ReportVariant,
    pub source_dir: PathBuf,
    pub destination_dir: PathBuf,
    /// Output file name; `.xlsx` is appended when missing.
    pub output_name: String,
    /// Cluster report only.
    pub mapping: Option<MappingSource>,
    /// Disk report only.
    pub ranges: CapacityRanges,
    pub sheet_selection: SheetSelection,
    pub filters: RowFilters,
    pub execution: ExecutionOptions,
}

impl ReportConfig {
    /// Configuration with every default for `variant`.
    pub fn new(variant: ReportVariant) -> Self {
        Self {
            variant,
            source_dir: PathBuf::from(DEFAULT_SOURCE_DIR),
            destination_dir: PathBuf::from(DEFAULT_DESTINATION_DIR),
            output_name: DEFAULT_OUTPUT_NAME.to_string(),
            mapping: None,
            ranges: CapacityRanges::default(),
            sheet_selection: SheetSelection::default(),
            filters: RowFilters::default(),
            execution: ExecutionOptions::default(),
        }
    }

    /// Full path of the workbook to write.
    pub fn output_path(&self) -> PathBuf {
        self.destination_dir.join(output_file_name(&self.output_name))
    }

    /// Check paths and names before any file is read.
    pub fn validate(&self) -> ReportResult<()> {
        let name = self.output_name.trim();
        if name.is_empty() {
            return Err(ReportError::config("output name must not be empty"));
        }
        if name.contains(['/', '\\']) {
            return Err(ReportError::config(format!(
                "output name '{name}' must be a file name, not a path"
            )));
        }
        if self.execution.max_in_flight_files == 0 || self.execution.num_threads == Some(0) {
            return Err(ReportError::config("worker counts must be > 0"));
        }
        if let Some(mapping) = &self.mapping {
            if !mapping.path.is_file() {
                return Err(ReportError::config(format!(
                    "mapping file '{}' does not exist",
                    mapping.path.display()
                )));
            }
        }
        Ok(())
    }

    /// Create the destination directory if needed.
    pub fn prepare_destination(&self) -> ReportResult<()> {
        fs::create_dir_all(&self.destination_dir).map_err(|e| {
            ReportError::config(format!(
                "cannot create destination directory '{}': {e}",
                self.destination_dir.display()
            ))
        })
    }
}

/// `name` with the workbook extension appended when it has none.
pub fn output_file_name(name: &str) -> String {
    let name = name.trim();
    let has_ext = Path::new(name)
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case(OUTPUT_EXTENSION));
    if has_ext {
        name.to_string()
    } else {
        format!("{name}.{OUTPUT_EXTENSION}")
    }
}

/// Read VM-name ignore patterns: one regex per line, `#` starts a comment line.
pub fn load_ignore_patterns(path: impl AsRef<Path>) -> ReportResult<Vec<String>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .map_err(|e| ReportError::config(format!("cannot read ignore file '{}': {e}", path.display())))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_layout() {
        let c = ReportConfig::new(ReportVariant::Disk);
        assert_eq!(c.source_dir, PathBuf::from("./data"));
        assert_eq!(c.output_path(), PathBuf::from("./output").join("output.xlsx"));
        assert_eq!(c.ranges.len(), 5);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn extension_is_appended_once() {
        assert_eq!(output_file_name("report"), "report.xlsx");
        assert_eq!(output_file_name("report.xlsx"), "report.xlsx");
        assert_eq!(output_file_name("report.XLSX"), "report.XLSX");
        assert_eq!(output_file_name("q3.summary"), "q3.summary.xlsx");
    }

    #[test]
    fn bad_names_and_missing_mapping_fail_validation() {
        let mut c = ReportConfig::new(ReportVariant::Cluster);
        c.output_name = "  ".to_string();
        assert!(c.validate().is_err());

        c.output_name = "a/b".to_string();
        assert!(c.validate().is_err());

        c.output_name = "ok".to_string();
        c.mapping = Some(MappingSource::new("missing/mapping.xlsx"));
        assert!(matches!(c.validate(), Err(ReportError::Config { .. })));
    }

    #[test]
    fn destination_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let mut c = ReportConfig::new(ReportVariant::Disk);
        c.destination_dir = dir.path().join("nested").join("out");
        c.prepare_destination().unwrap();
        assert!(c.destination_dir.is_dir());
    }

    #[test]
    fn ignore_file_skips_comments_and_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ignore.txt");
        fs::write(&path, "# test VMs\n^tmp-\n\n  .*-old$  \n").unwrap();
        assert_eq!(load_ignore_patterns(&path).unwrap(), vec!["^tmp-", ".*-old$"]);
        assert!(load_ignore_patterns(dir.path().join("missing.txt")).is_err());
    }
}
