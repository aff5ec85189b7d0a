//! Command-line interface parsing for the bomwatch service
//!
//! This module handles parsing of CLI arguments using clap, including the
//! --once flag for a single forced refresh cycle and overrides for the
//! config file location and scheduler cadence.

use std::path::PathBuf;

use clap::Parser;

/// bomwatch - weather bureau feed ingestion and risk scoring service
#[derive(Parser, Debug)]
#[command(name = "bomwatch")]
#[command(about = "Ingests bureau XML feeds and publishes risk-scored station snapshots")]
#[command(version)]
pub struct Cli {
    /// Path to a JSON config file; defaults apply when omitted
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Run one forced refresh cycle, log the snapshot summaries, and exit
    #[arg(long)]
    pub once: bool,

    /// Override the scheduler tick interval in seconds
    #[arg(long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Disable the on-disk document cache
    #[arg(long)]
    pub no_disk_cache: bool,
}
