//! Plist store codec: encoding-preserving reads and writes with backup.
//!
//! Stores are read best-effort (a missing or unreadable store is an empty
//! dictionary), and written in whatever encoding the store already uses -
//! binary plists stay binary, XML stays XML, and new stores default to
//! binary. Every write to an existing store first copies it to a `.prev`
//! backup next to it.

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Read};
use std::path::{Path, PathBuf};

use plist::Value;
use tracing::{debug, info, trace};

use crate::{sys, Result};

/// Suffix appended to a store's file name for its pre-write backup.
pub const BACKUP_SUFFIX: &str = ".prev";

/// Magic prefix of a binary plist.
const BINARY_MAGIC: &[u8; 8] = b"bplist00";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Binary,
    Xml,
}

/// Backup location for a store: the same path with `.prev` appended.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map_or_else(Default::default, |n| n.to_os_string());
    name.push(BACKUP_SUFFIX);
    path.with_file_name(name)
}

/// Detect the on-disk encoding. Missing or unreadable files report binary,
/// which is the format new stores are written in.
fn detect_encoding(path: &Path, elevated: bool) -> Encoding {
    if !path.exists() {
        return Encoding::Binary;
    }
    let head = if elevated {
        sys::sudo_read_bytes(path, BINARY_MAGIC.len())
    } else {
        read_head(path).map_err(crate::Error::from)
    };
    match head {
        Ok(head) if head.as_slice() == BINARY_MAGIC => Encoding::Binary,
        Ok(_) => Encoding::Xml,
        Err(_) => Encoding::Binary,
    }
}

fn read_head(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut buf = vec![0u8; BINARY_MAGIC.len()];
    let mut file = File::open(path)?;
    let n = file.read(&mut buf)?;
    buf.truncate(n);
    Ok(buf)
}

/// Whether the store at `path` is a binary plist (or would be written as
/// one). Exposed for change reporting.
pub fn is_binary(path: &Path, elevated: bool) -> bool {
    detect_encoding(path, elevated) == Encoding::Binary
}

/// Read a store, auto-detecting its encoding.
///
/// Best-effort by contract: a missing or unreadable store is an empty
/// dictionary, logged at debug verbosity and never propagated.
pub fn read(path: &Path, elevated: bool) -> Value {
    if !path.exists() {
        return Value::Dictionary(plist::Dictionary::new());
    }

    let result = if elevated {
        sys::sudo_read_plist(path)
    } else {
        Value::from_file(path).map_err(Into::into)
    };

    match result {
        Ok(value) => value,
        Err(err) => {
            debug!("Failed to read {}: {err}", path.display());
            Value::Dictionary(plist::Dictionary::new())
        }
    }
}

/// Write a store, preserving its prior encoding.
///
/// Returns the backup path when the target existed and was backed up
/// first. In dry-run mode nothing is touched and `None` is returned.
///
/// Elevated writes serialize to a private temporary file and `sudo mv`
/// it into place, so a privileged store is never left half-written.
/// A non-elevated write that hits a permission error falls back to the
/// elevated path exactly once.
pub fn write(path: &Path, value: &Value, elevated: bool, dry_run: bool) -> Result<Option<PathBuf>> {
    if dry_run {
        info!("DRY RUN: Would write to {}", path.display());
        return Ok(None);
    }

    if !elevated {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
    }

    // Encoding is decided from the pre-write state of the file.
    let encoding = detect_encoding(path, elevated);
    trace!("Writing {} as {encoding:?}", path.display());

    let mut backup = None;
    if path.exists() {
        let backup_path = backup_path(path);
        if elevated {
            sys::sudo_copy(path, &backup_path)?;
        } else {
            fs::copy(path, &backup_path)?;
        }
        debug!("Backed up {}", path.display());
        backup = Some(backup_path);
    }

    if elevated {
        write_elevated(path, value, encoding)?;
        return Ok(backup);
    }

    match write_direct(path, value, encoding) {
        Ok(()) => debug!("Wrote {}", path.display()),
        Err(err) if err.kind() == ErrorKind::PermissionDenied => {
            info!("Permission denied writing {}, trying with sudo...", path.display());
            write_elevated(path, value, encoding)?;
        }
        Err(err) => return Err(err.into()),
    }

    Ok(backup)
}

fn write_direct(path: &Path, value: &Value, encoding: Encoding) -> std::io::Result<()> {
    let file = File::create(path)?;
    serialize(BufWriter::new(file), value, encoding)
}

fn write_elevated(path: &Path, value: &Value, encoding: Encoding) -> Result<()> {
    let staging = tempfile::NamedTempFile::new()?;
    serialize(BufWriter::new(staging.as_file()), value, encoding)?;
    // Keep the staging file alive past the NamedTempFile guard so sudo can
    // move it; mv consumes it on success, and we remove it ourselves if
    // the move fails.
    let staging_path = staging.into_temp_path().keep().map_err(std::io::Error::from)?;
    match sys::sudo_move(&staging_path, path) {
        Ok(()) => {
            debug!("Wrote {} with sudo", path.display());
            Ok(())
        }
        Err(err) => {
            let _ = fs::remove_file(&staging_path);
            Err(err)
        }
    }
}

fn serialize<W: std::io::Write>(writer: W, value: &Value, encoding: Encoding) -> std::io::Result<()> {
    let result = match encoding {
        Encoding::Binary => value.to_writer_binary(writer),
        Encoding::Xml => value.to_writer_xml(writer),
    };
    result.map_err(std::io::Error::other)
}

#[cfg(test)]
mod tests {
    use super::*;
    use plist::Dictionary;
    use tempfile::TempDir;

    fn sample() -> Value {
        let mut dict = Dictionary::new();
        dict.insert("ShowPathbar".into(), Value::Boolean(true));
        dict.insert("Count".into(), Value::Integer(3.into()));
        Value::Dictionary(dict)
    }

    #[test]
    fn backup_path_appends_suffix() {
        assert_eq!(
            backup_path(Path::new("/tmp/a/com.example.plist")),
            PathBuf::from("/tmp/a/com.example.plist.prev")
        );
    }

    #[test]
    fn missing_store_reads_as_empty_dictionary() {
        let dir = TempDir::new().unwrap();
        let value = read(&dir.path().join("absent.plist"), false);
        assert_eq!(value, Value::Dictionary(Dictionary::new()));
    }

    #[test]
    fn corrupt_store_reads_as_empty_dictionary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.plist");
        fs::write(&path, b"not a plist at all").unwrap();
        assert_eq!(read(&path, false), Value::Dictionary(Dictionary::new()));
    }

    #[test]
    fn new_store_is_written_binary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("new.plist");
        let backup = write(&path, &sample(), false, false).unwrap();
        assert!(backup.is_none());
        assert!(is_binary(&path, false));
        assert_eq!(read(&path, false), sample());
    }

    #[test]
    fn xml_store_stays_xml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.plist");
        sample().to_file_xml(&path).unwrap();
        assert!(!is_binary(&path, false));

        let mut updated = sample();
        if let Value::Dictionary(dict) = &mut updated {
            dict.insert("Count".into(), Value::Integer(4.into()));
        }
        let backup = write(&path, &updated, false, false).unwrap();
        assert!(!is_binary(&path, false));
        assert_eq!(read(&path, false), updated);

        // Backup holds the exact prior byte content.
        let backup = backup.unwrap();
        assert_eq!(backup, backup_path(&path));
        let prior = Value::from_file(&backup).unwrap();
        assert_eq!(prior, sample());
    }

    #[test]
    fn binary_store_stays_binary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.plist");
        sample().to_file_binary(&path).unwrap();

        write(&path, &sample(), false, false).unwrap();
        assert!(is_binary(&path, false));
    }

    #[test]
    fn write_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Library/Preferences/com.example.plist");
        write(&path, &sample(), false, false).unwrap();
        assert_eq!(read(&path, false), sample());
    }

    #[test]
    fn dry_run_touches_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("untouched.plist");
        sample().to_file_binary(&path).unwrap();
        let before = fs::read(&path).unwrap();

        let backup = write(&path, &Value::Boolean(false), false, true).unwrap();
        assert!(backup.is_none());
        assert_eq!(fs::read(&path).unwrap(), before);
        assert!(!backup_path(&path).exists());
    }
}
