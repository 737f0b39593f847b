//! Arguments and run logic shared by the `disk` and `cluster` commands.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, ValueEnum};
use vm_inventory_report::ReportResult;
use vm_inventory_report::config::{DEFAULT_DESTINATION_DIR, DEFAULT_OUTPUT_NAME, DEFAULT_SOURCE_DIR, ReportConfig, load_ignore_patterns};
use vm_inventory_report::execution::{ExecutionObserver, ExecutionOptions, LogExecutionObserver};
use vm_inventory_report::ingestion::{CompositeObserver, FileObserver, IngestionObserver, LogObserver, SheetSelection};
use vm_inventory_report::processing::RowFilters;
use vm_inventory_report::report::{self, RunHooks, RunSummary};
use vm_inventory_report::types::ReportVariant;

use super::progress::ProgressObserver;

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,
    /// Only error messages
    Error,
    /// Warning and error messages
    Warn,
    /// Info, warning, and error messages
    Info,
    /// Debug and above messages
    Debug,
    /// All messages including trace
    Trace,
}

/// Arguments shared by both report commands
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Directory holding the inventory exports (.xlsx, .xls, .xlsm, .xlsb, .ods, .csv)
    #[arg(long, short = 's', value_name = "DIR", default_value = DEFAULT_SOURCE_DIR)]
    pub src: PathBuf,

    /// Directory the report is written to; created when missing
    #[arg(long, short = 'd', value_name = "DIR", default_value = DEFAULT_DESTINATION_DIR)]
    pub dst: PathBuf,

    /// Output file name; `.xlsx` is appended when missing
    #[arg(long, short = 'n', value_name = "NAME", default_value = DEFAULT_OUTPUT_NAME)]
    pub name: String,

    /// Only read the named sheet (repeatable) [default: every sheet with the required columns]
    #[arg(long = "sheet", value_name = "NAME", conflicts_with = "first_sheet", help_heading = "Input")]
    pub sheets: Vec<String>,

    /// Only read the first sheet of each workbook
    #[arg(long, help_heading = "Input")]
    pub first_sheet: bool,

    /// Skip VMs whose power state is "poweredOff"
    #[arg(long, help_heading = "Filters")]
    pub ignore_powered_off: bool,

    /// File of VM-name regular expressions to skip, one per line
    #[arg(long, value_name = "PATH", help_heading = "Filters")]
    pub ignore_file: Option<PathBuf>,

    /// Skip VMs whose cluster or folder contains this text (repeatable, case-insensitive)
    #[arg(long = "ignore-term", value_name = "TEXT", help_heading = "Filters")]
    pub ignore_terms: Vec<String>,

    /// Number of worker threads [default: available parallelism]
    #[arg(long, short = 'j', value_name = "N")]
    pub workers: Option<usize>,

    /// Maximum number of files read at the same time [default: number of workers]
    #[arg(long, value_name = "N")]
    pub max_in_flight: Option<usize>,

    /// Append one line per skipped input file to this log
    #[arg(long, value_name = "PATH")]
    pub failure_log: Option<PathBuf>,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none", global = true)]
    pub log_level: LogLevel,
}

impl CommonArgs {
    /// Configuration for `variant` with these arguments applied.
    pub fn to_config(&self, variant: ReportVariant) -> ReportResult<ReportConfig> {
        let patterns = match &self.ignore_file {
            Some(path) => load_ignore_patterns(path)?,
            None => Vec::new(),
        };

        let mut config = ReportConfig::new(variant);
        config.source_dir.clone_from(&self.src);
        config.destination_dir.clone_from(&self.dst);
        config.output_name.clone_from(&self.name);
        config.filters = RowFilters::new(self.ignore_powered_off, &patterns, &self.ignore_terms)?;
        config.sheet_selection = if self.first_sheet {
            SheetSelection::First
        } else if self.sheets.is_empty() {
            SheetSelection::AllSheets
        } else {
            SheetSelection::Sheets(self.sheets.clone())
        };

        let defaults = ExecutionOptions::default();
        config.execution = ExecutionOptions {
            num_threads: self.workers.or(defaults.num_threads),
            max_in_flight_files: self.max_in_flight.or(self.workers).unwrap_or(defaults.max_in_flight_files),
        };
        Ok(config)
    }

    /// Initialize logging, wire observers, and run the report.
    pub fn execute(&self, config: &ReportConfig) -> ReportResult<RunSummary> {
        init_logging(self.log_level);

        // Per-file logging and the progress bar would interleave, so only one of them is used.
        let execution_observer: Arc<dyn ExecutionObserver> = if self.log_level == LogLevel::None {
            Arc::new(ProgressObserver::new())
        } else {
            Arc::new(LogExecutionObserver)
        };

        let mut ingestion: Vec<Arc<dyn IngestionObserver>> = vec![Arc::new(LogObserver)];
        if let Some(path) = &self.failure_log {
            ingestion.push(Arc::new(FileObserver::new(path)));
        }

        let hooks = RunHooks {
            execution_observer: Some(execution_observer),
            ingestion_observer: Some(Arc::new(CompositeObserver::new(ingestion))),
            ..RunHooks::default()
        };
        report::run(config, &hooks)
    }
}

/// Initialize logger based on log level
fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);
    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        common: CommonArgs,
    }

    #[test]
    fn defaults_produce_the_default_config() {
        let cli = TestCli::parse_from(["test"]);
        let config = cli.common.to_config(ReportVariant::Disk).unwrap();
        assert_eq!(config.source_dir, PathBuf::from(DEFAULT_SOURCE_DIR));
        assert_eq!(config.sheet_selection, SheetSelection::AllSheets);
        assert!(config.filters.is_empty());
        assert_eq!(cli.common.log_level, LogLevel::None);
    }

    #[test]
    fn workers_also_bound_in_flight_files() {
        let cli = TestCli::parse_from(["test", "-j", "3", "--sheet", "vInfo", "--ignore-term", "test"]);
        let config = cli.common.to_config(ReportVariant::Cluster).unwrap();
        assert_eq!(config.execution.num_threads, Some(3));
        assert_eq!(config.execution.max_in_flight_files, 3);
        assert_eq!(config.sheet_selection, SheetSelection::Sheets(vec!["vInfo".to_string()]));
        assert!(!config.filters.is_empty());
    }

    #[test]
    fn sheet_and_first_sheet_conflict() {
        assert!(TestCli::try_parse_from(["test", "--sheet", "a", "--first-sheet"]).is_err());
    }
}
