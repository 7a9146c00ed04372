//! Per-domain reconciliation: read, merge, write if changed.

use std::path::PathBuf;

use plist::Value;
use tracing::{debug, info};

use crate::locate::Locator;
use crate::merge::{merge, Merged};
use crate::{store, Result};

/// Result of reconciling one domain.
#[derive(Debug, Default)]
pub struct ApplyOutcome {
    /// Whether an effective change was (or in dry-run, would be) applied.
    pub changed: bool,
    /// Backup created before the write, if any.
    pub backup: Option<PathBuf>,
}

/// Reconcile one domain against its desired values.
///
/// At most one store read, one backup, and one write happen here; process
/// restarts are aggregated by the caller across the whole run.
pub fn apply_domain(
    locator: &mut Locator,
    domain: &str,
    desired: &Value,
    current_host: bool,
    elevated: bool,
    dry_run: bool,
) -> Result<ApplyOutcome> {
    let path = locator.resolve(domain, current_host);
    let current = store::read(&path, elevated);

    match merge(&current, desired) {
        Merged::Unchanged => {
            debug!("No changes needed for {domain}");
            Ok(ApplyOutcome::default())
        }
        Merged::Changed(merged) => {
            if dry_run {
                info!("DRY RUN: Applying changes to {domain}");
            } else {
                info!("Applying changes to {domain}");
            }
            let backup = store::write(&path, &merged, elevated, dry_run)?;
            Ok(ApplyOutcome {
                changed: true,
                backup,
            })
        }
    }
}
