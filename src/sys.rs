//! System utilities: elevated file access and process management.
//!
//! Every privileged operation shells out to `sudo` rather than managing
//! privileges in-process; these wrappers treat the external tools as
//! opaque capabilities and surface their failures as [`Error::Sudo`].

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::{Error, Result};

/// Fail fast on anything but macOS, before any domain processing begins.
pub fn ensure_macos() -> Result<()> {
    if cfg!(target_os = "macos") {
        Ok(())
    } else {
        Err(Error::UnsupportedPlatform)
    }
}

/// Read the first `count` bytes of a file using sudo.
pub fn sudo_read_bytes(path: &Path, count: usize) -> Result<Vec<u8>> {
    let output = Command::new("sudo")
        .arg("head")
        .arg("-c")
        .arg(count.to_string())
        .arg(path)
        .stderr(Stdio::null())
        .output()?;
    if !output.status.success() {
        return Err(sudo_error("head", path, &output.stderr, output.status.code()));
    }
    Ok(output.stdout)
}

/// Read and parse a plist file using sudo, converting to XML in flight.
pub fn sudo_read_plist(path: &Path) -> Result<plist::Value> {
    let output = Command::new("sudo")
        .args(["plutil", "-convert", "xml1", "-o", "-"])
        .arg(path)
        .output()?;
    if !output.status.success() {
        return Err(sudo_error("plutil", path, &output.stderr, output.status.code()));
    }
    Ok(plist::Value::from_reader(std::io::Cursor::new(output.stdout))?)
}

/// Copy a file using sudo, preserving attributes.
pub fn sudo_copy(src: &Path, dst: &Path) -> Result<()> {
    run_sudo("cp", Command::new("sudo").arg("cp").arg("-p").arg(src).arg(dst), src)
}

/// Move a file into place using sudo.
pub fn sudo_move(src: &Path, dst: &Path) -> Result<()> {
    run_sudo("mv", Command::new("sudo").arg("mv").arg(src).arg(dst), dst)
}

/// Remove a file using sudo.
pub fn sudo_remove(path: &Path) -> Result<()> {
    run_sudo("rm", Command::new("sudo").arg("rm").arg(path), path)
}

fn run_sudo(name: &'static str, command: &mut Command, path: &Path) -> Result<()> {
    let output = command.output()?;
    if !output.status.success() {
        return Err(sudo_error(name, path, &output.stderr, output.status.code()));
    }
    Ok(())
}

fn sudo_error(command: &'static str, path: &Path, stderr: &[u8], code: Option<i32>) -> Error {
    let stderr = String::from_utf8_lossy(stderr);
    let detail = if stderr.trim().is_empty() {
        format!("exit code {}", code.map_or_else(|| "unknown".into(), |c| c.to_string()))
    } else {
        stderr.trim().to_string()
    };
    Error::Sudo {
        command,
        path: PathBuf::from(path),
        detail,
    }
}

/// Best-effort terminate a process by name. A missing process, or a
/// missing `killall` binary, is not an error.
pub fn kill_process(name: &str) {
    match Command::new("killall")
        .arg(name)
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) if status.success() => debug!("Restarted {name}"),
        Ok(_) => debug!("{name} was not running"),
        Err(err) => debug!("Failed to kill {name}: {err}"),
    }
}

/// Restart the preference daemon so written changes take effect.
pub fn flush_preference_cache() {
    kill_process("cfprefsd");
}
