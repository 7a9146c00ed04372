//! Domain-to-store path resolution.
//!
//! Maps a preference domain (bundle identifier, global-domain alias, or
//! literal path) plus a ByHost flag to the plist file backing it. A domain
//! with no existing store is not an error: callers treat a missing store
//! as an empty dictionary.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

/// Sentinel used for ByHost paths when the hardware UUID cannot be read.
/// Resolution proceeds with a stable but non-unique name.
pub const UNKNOWN_UUID: &str = "UNKNOWN";

/// Global-domain aliases accepted everywhere a domain is.
const GLOBAL_ALIASES: [&str; 2] = ["NSGlobalDomain", "-g"];

/// Resolves domains to store paths for one run.
///
/// Holds the per-run caches: the hardware UUID (computed at most once, on
/// first ByHost resolution) and the sandboxed-container existence probes
/// (one filesystem check per domain). Tests construct a locator with an
/// explicit home and injected UUID instead of touching the real system.
pub struct Locator {
    home: PathBuf,
    hardware_uuid: Option<String>,
    container_cache: HashMap<String, bool>,
}

impl Locator {
    /// Locator rooted at the given home directory.
    pub fn new(home: PathBuf) -> Self {
        Self {
            home,
            hardware_uuid: None,
            container_cache: HashMap::new(),
        }
    }

    /// Locator with a fixed hardware UUID, for tests.
    pub fn with_hardware_uuid(home: PathBuf, uuid: impl Into<String>) -> Self {
        Self {
            home,
            hardware_uuid: Some(uuid.into()),
            container_cache: HashMap::new(),
        }
    }

    /// Resolve a domain to the absolute path of its plist store.
    pub fn resolve(&mut self, domain: &str, current_host: bool) -> PathBuf {
        // Literal paths pass through, normalized to a .plist suffix.
        if let Some(path) = self.literal_path(domain) {
            return path;
        }

        if GLOBAL_ALIASES.contains(&domain) {
            if current_host {
                let uuid = self.hardware_uuid().to_string();
                return self
                    .home
                    .join(format!("Library/Preferences/ByHost/.GlobalPreferences.{uuid}.plist"));
            }
            return self.home.join("Library/Preferences/.GlobalPreferences.plist");
        }

        // Sandboxed apps keep their preferences inside their container.
        if self.container_exists(domain) {
            return self.container_path(domain);
        }

        if current_host {
            let uuid = self.hardware_uuid().to_string();
            return self
                .home
                .join(format!("Library/Preferences/ByHost/{domain}.{uuid}.plist"));
        }

        self.home.join(format!("Library/Preferences/{domain}.plist"))
    }

    fn literal_path(&self, domain: &str) -> Option<PathBuf> {
        if domain.starts_with('/') {
            let path = PathBuf::from(domain);
            if path.extension().is_some_and(|ext| ext == "plist") {
                return Some(path);
            }
            return Some(path.with_extension("plist"));
        }
        if domain.ends_with(".plist") {
            return Some(expand_tilde(domain, &self.home));
        }
        None
    }

    fn container_path(&self, domain: &str) -> PathBuf {
        self.home
            .join(format!("Library/Containers/{domain}/Data/Library/Preferences/{domain}.plist"))
    }

    fn container_exists(&mut self, domain: &str) -> bool {
        if let Some(&exists) = self.container_cache.get(domain) {
            return exists;
        }
        let exists = self.container_path(domain).exists();
        self.container_cache.insert(domain.to_string(), exists);
        exists
    }

    /// Hardware UUID for ByHost paths, computed once per locator.
    fn hardware_uuid(&mut self) -> &str {
        if self.hardware_uuid.is_none() {
            let uuid = query_hardware_uuid().unwrap_or_else(|| {
                debug!("hardware UUID unavailable, using sentinel");
                UNKNOWN_UUID.to_string()
            });
            self.hardware_uuid = Some(uuid);
        }
        self.hardware_uuid.as_deref().unwrap_or(UNKNOWN_UUID)
    }
}

/// Query the platform hardware UUID via `ioreg`.
fn query_hardware_uuid() -> Option<String> {
    let output = Command::new("ioreg")
        .args(["-rd1", "-c", "IOPlatformExpertDevice"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        if line.contains("IOPlatformUUID") {
            // "IOPlatformUUID" = "XXXXXXXX-..."
            return line.split('"').nth(3).map(str::to_string);
        }
    }
    None
}

fn expand_tilde(path: &str, home: &Path) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(path)
}
