mod cluster;
mod common;
mod disk;
mod progress;

pub use cluster::{ClusterArgs, process_cluster};
pub use disk::{DiskArgs, process_disk};
