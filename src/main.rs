//! prefapply CLI - declaratively reconcile macOS preference plists.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::filter::LevelFilter;

use prefapply::cli::Cli;
use prefapply::locate::Locator;
use prefapply::run::{cleanup_backups, process_path, restart_processes, RunOptions};
use prefapply::sys;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Wrong platform is fatal before any domain processing begins.
    if let Err(err) = sys::ensure_macos() {
        eprintln!("Error: {err}");
        process::exit(1);
    }

    let home = match dirs::home_dir() {
        Some(home) => home,
        None => {
            eprintln!("Error: could not determine home directory");
            process::exit(1);
        }
    };

    process::exit(run(&cli, home));
}

fn run(cli: &Cli, home: PathBuf) -> i32 {
    let mut locator = Locator::new(home);
    let opts = RunOptions {
        dry_run: cli.dry_run,
    };

    let outcome = match process_path(&cli.path, &mut locator, opts) {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("Error: {err}");
            return 1;
        }
    };

    if outcome.changed {
        restart_processes(&outcome, cli.dry_run);
    }

    cleanup_backups(&outcome.backups);

    if outcome.changed {
        if let Some(code) = cli.exit_code {
            return i32::from(code);
        }
    }
    0
}

/// Map the -v count onto a level filter: info by default, debug at -v,
/// trace at -vv and beyond.
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .init();
}
