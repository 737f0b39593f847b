use clap::Parser;
use vm_inventory_report::ReportResult;
use vm_inventory_report::processing::CapacityRanges;
use vm_inventory_report::report::RunSummary;
use vm_inventory_report::types::ReportVariant;

use super::common::CommonArgs;

#[derive(Parser, Debug)]
pub struct DiskArgs {
    /// Capacity range as `min:max:label` in MB, repeatable; leave `max` empty for the last,
    /// unbounded range [default: 0-150 MB, 150 MB-2 TB, 2-10 TB, 10-20 TB, 20 TB+]
    #[arg(long = "range", value_name = "MIN:MAX:LABEL")]
    pub ranges: Vec<String>,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub fn process_disk(args: &DiskArgs) -> ReportResult<RunSummary> {
    let mut config = args.common.to_config(ReportVariant::Disk)?;
    if !args.ranges.is_empty() {
        config.ranges = CapacityRanges::parse(&args.ranges)?;
    }
    args.common.execute(&config)
}
