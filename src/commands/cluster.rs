use std::path::PathBuf;

use clap::Parser;
use vm_inventory_report::ReportResult;
use vm_inventory_report::config::MappingSource;
use vm_inventory_report::mapping::DEFAULT_MAPPING_SHEET;
use vm_inventory_report::report::RunSummary;
use vm_inventory_report::types::ReportVariant;

use super::common::CommonArgs;

#[derive(Parser, Debug)]
pub struct ClusterArgs {
    /// Workbook mapping (vCenter, vCluster) to Country; adds a country column and subtotals
    #[arg(long, short = 'm', value_name = "PATH")]
    pub mapping: Option<PathBuf>,

    /// Sheet of the mapping workbook holding the table
    #[arg(long, value_name = "NAME", default_value = DEFAULT_MAPPING_SHEET)]
    pub mapping_sheet: String,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub fn process_cluster(args: &ClusterArgs) -> ReportResult<RunSummary> {
    let mut config = args.common.to_config(ReportVariant::Cluster)?;
    config.mapping = args.mapping.as_ref().map(|path| MappingSource {
        path: path.clone(),
        sheet: args.mapping_sheet.clone(),
    });
    args.common.execute(&config)
}
