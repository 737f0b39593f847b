//! Aggregate virtual machine inventory exports into a summary workbook.
//!
//! # Usage
//!
//! Count VMs per operating system and disk-capacity range:
//!
//! ```bash
//! vm-inventory-report disk --src ./data --dst ./output --name capacity
//! ```
//!
//! Count VMs, CPUs, memory and disk per cluster, optionally grouped by country:
//!
//! ```bash
//! vm-inventory-report cluster --mapping locations.xlsx --mapping-sheet vClusterLoc
//! ```
//!
//! Every `.xlsx`, `.xls`, `.xlsm`, `.xlsb`, `.ods` and `.csv` file directly under the source
//! directory is read. Files that cannot be used are listed in the `Skipped_Files` sheet; when none
//! of them can be used the report is still written and the command exits with a failure code.

use std::process::ExitCode;

use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};
use vm_inventory_report::report::no_usable_input;

mod commands;

use crate::commands::{ClusterArgs, DiskArgs, process_cluster, process_disk};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "vm-inventory-report", version, about)]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Count VMs per operating system and disk-capacity range
    Disk(Box<DiskArgs>),
    /// Count VMs and resources per cluster and list standalone VMs
    Cluster(Box<ClusterArgs>),
}

fn main() -> ExitCode {
    let result = match &Cli::parse().command {
        Command::Disk(args) => process_disk(args),
        Command::Cluster(args) => process_cluster(args),
    };

    match result {
        Ok(summary) if summary.all_failed() => {
            eprintln!("error: {}", no_usable_input(&summary));
            ExitCode::FAILURE
        }
        Ok(summary) => {
            println!("{summary}");
            println!("report written to {}", summary.output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
