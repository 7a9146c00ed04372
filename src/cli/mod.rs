//! CLI argument definitions for prefapply.

use clap::Parser;
use std::path::PathBuf;

/// Apply macOS defaults from TOML configuration files.
///
/// Reads one or more TOML documents describing desired preference values,
/// merges them into the matching plist stores, and restarts the affected
/// processes - touching nothing when the stores already match.
#[derive(Parser, Debug)]
#[command(name = "prefapply")]
#[command(author, version, about = "Apply macOS defaults from TOML configuration files", long_about = None)]
pub struct Cli {
    /// TOML file or directory containing TOML files
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Show what would be done without making changes
    #[arg(short = 'd', long = "dry-run")]
    pub dry_run: bool,

    /// Verbose output (repeat for more: -v, -vv)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Exit with code N if changes were made
    #[arg(short = 'e', long = "exit-code", value_name = "N")]
    pub exit_code: Option<u8>,
}
