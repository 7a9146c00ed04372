//! Run orchestration: iterate configuration units, aggregate results,
//! trigger restarts, and clean up backups.
//!
//! Units and the domains within them are processed strictly sequentially,
//! so a later domain always observes the filesystem state left by earlier
//! writes. The only state shared across domains is the restart set and
//! backup list accumulated here.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::apply::apply_domain;
use crate::locate::Locator;
use crate::unit::{toml_to_plist, Unit};
use crate::{sys, Error, Result};

/// A backup created during the run, deleted only after the whole run
/// finishes. The elevated flag records how the backing store is accessed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupRecord {
    pub path: PathBuf,
    pub elevated: bool,
}

/// Aggregated result of processing every unit under a path.
#[derive(Debug, Default)]
pub struct RunOutcome {
    /// Whether any domain in any unit changed.
    pub changed: bool,
    /// Deduplicated processes to restart, from units that changed.
    pub restart: BTreeSet<String>,
    /// Every backup created, changed or not, across all units.
    pub backups: Vec<BackupRecord>,
}

/// Options for one run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub dry_run: bool,
}

/// Process a TOML file or a directory of TOML files.
///
/// A missing path is fatal; an unparseable document only skips that unit.
pub fn process_path(path: &Path, locator: &mut Locator, opts: RunOptions) -> Result<RunOutcome> {
    let mut outcome = RunOutcome::default();

    if path.is_file() {
        if path.extension().is_some_and(|ext| ext == "toml") {
            process_unit_file(path, locator, opts, &mut outcome);
        }
    } else if path.is_dir() {
        let mut files: Vec<PathBuf> = fs::read_dir(path)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "toml"))
            .collect();
        files.sort();
        for file in files {
            process_unit_file(&file, locator, opts, &mut outcome);
        }
    } else {
        return Err(Error::InvalidInput(format!("{} not found", path.display())));
    }

    Ok(outcome)
}

/// Process one unit document, accumulating into `outcome`.
///
/// Unit-level failures (unreadable or unparseable documents) are reported
/// and skipped; the run continues with the remaining units.
fn process_unit_file(path: &Path, locator: &mut Locator, opts: RunOptions, outcome: &mut RunOutcome) {
    debug!("Processing {}...", path.display());

    let unit = match Unit::from_file(path) {
        Ok(unit) => unit,
        Err(err) => {
            info!("Error reading {}: {err}", path.display());
            return;
        }
    };

    if unit.is_empty() {
        return;
    }
    if let Some(description) = &unit.description {
        debug!("  {description}");
    }

    let mut unit_changed = false;
    for (domain, values) in &unit.data {
        let desired = toml_to_plist(values);
        match apply_domain(
            locator,
            domain,
            &desired,
            unit.current_host,
            unit.sudo,
            opts.dry_run,
        ) {
            Ok(applied) => {
                if applied.changed {
                    unit_changed = true;
                }
                if let Some(backup) = applied.backup {
                    outcome.backups.push(BackupRecord {
                        path: backup,
                        elevated: unit.sudo,
                    });
                }
            }
            // A failed write aborts only this domain; its backup (if one
            // was created) stays on disk for recovery.
            Err(err) => warn!("Failed to apply {domain}: {err}"),
        }
    }

    if unit_changed {
        outcome.changed = true;
        outcome.restart.extend(unit.kill.iter().cloned());
    }
}

/// Restart every process named by changed units, then flush the system
/// preference cache exactly once.
pub fn restart_processes(outcome: &RunOutcome, dry_run: bool) {
    for process in &outcome.restart {
        if dry_run {
            info!("DRY RUN: Would kill process: {process}");
        } else {
            sys::kill_process(process);
        }
    }
    if dry_run {
        info!("DRY RUN: Would restart cfprefsd");
    } else {
        sys::flush_preference_cache();
        debug!("Restarted cfprefsd");
    }
}

/// Remove the run's backups, best-effort and independent per path.
///
/// A permission failure retries once through sudo; anything still failing
/// is logged and does not abort cleanup of the remaining backups.
pub fn cleanup_backups(backups: &[BackupRecord]) {
    for backup in backups {
        match fs::remove_file(&backup.path) {
            Ok(()) => debug!("Removed backup {}", backup.path.display()),
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                match sys::sudo_remove(&backup.path) {
                    Ok(()) => debug!("Removed backup {} with sudo", backup.path.display()),
                    Err(err) => {
                        warn!("Failed to remove backup {}: {err}", backup.path.display())
                    }
                }
            }
            Err(err) => warn!("Failed to remove backup {}: {err}", backup.path.display()),
        }
    }
}
