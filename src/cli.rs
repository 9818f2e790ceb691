use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "near-scanner",
    version,
    about = "NEAR block scanning and transfer extraction service"
)]
pub struct Cli {
    /// Specify the config file path (default: ./config.toml)
    #[arg(long, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the scanning service
    Run,
    /// Scan a single block and exit; the scan cursor is left untouched
    ScanBlock {
        /// Block height to scan
        height: u64,
    },
    /// Rewind the scan cursor so the next run resumes from a height
    SetRescanHeight {
        /// Height scanning should resume from (must be > 0)
        height: u64,
    },
}
