//! Prefapply - declarative reconciliation of macOS preference plists.
//!
//! This library provides the core functionality for the `prefapply` CLI
//! tool: resolving preference domains to their on-disk plist stores,
//! structurally merging desired values into existing ones (with `"!"`
//! clear and `"..."` preserve operators), and applying only the deltas
//! with backup semantics and a sudo fallback for privileged stores.

pub mod apply;
pub mod cli;
pub mod locate;
pub mod merge;
pub mod run;
pub mod store;
pub mod sys;
pub mod unit;

/// Library-level error type for prefapply operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plist error: {0}")]
    Plist(#[from] plist::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("sudo {command} failed for {path}: {detail}")]
    Sudo {
        command: &'static str,
        path: std::path::PathBuf,
        detail: String,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("This tool only works on macOS")]
    UnsupportedPlatform,
}

/// Result type alias for prefapply operations.
pub type Result<T> = std::result::Result<T, Error>;
