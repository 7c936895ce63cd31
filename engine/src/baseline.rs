//! Snapshot directory naming and baseline selection.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};

use crate::error::EngineError;

/// Name format of snapshot directories, second precision.
pub const SNAPSHOT_NAME_FORMAT: &str = "%Y-%m-%d %H-%M-%S";

/// Directory name for a snapshot taken at `at`.
pub fn snapshot_dir_name(at: DateTime<Local>) -> String {
    at.format(SNAPSHOT_NAME_FORMAT).to_string()
}

/// Pick the most recently created child directory of `target_root`.
///
/// Creation time falls back to modification time where the filesystem does
/// not record it; ties are broken by name. Returns `None` for an empty root.
pub fn select_baseline(target_root: &Path) -> Result<Option<PathBuf>, EngineError> {
    let enumeration_failed = |e: io::Error| EngineError::EnumerationFailed {
        path: target_root.to_path_buf(),
        source: e,
    };

    let mut candidates: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in fs::read_dir(target_root).map_err(enumeration_failed)? {
        let entry = entry.map_err(enumeration_failed)?;
        // DirEntry::file_type does not follow links, so junctions are skipped
        if !entry.file_type().map_err(enumeration_failed)?.is_dir() {
            continue;
        }
        let meta = entry.metadata().map_err(enumeration_failed)?;
        let created = meta
            .created()
            .or_else(|_| meta.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        candidates.push((created, entry.path()));
    }

    candidates.sort();
    Ok(candidates.pop().map(|(_, path)| path))
}

/// Create the snapshot directory for this run under `target_root`.
///
/// If a directory with the timestamp name exists already (two runs within
/// one second), ` (2)`, ` (3)`, ... is appended.
pub fn create_snapshot_dir(target_root: &Path, at: DateTime<Local>) -> Result<PathBuf, EngineError> {
    let name = snapshot_dir_name(at);
    let mut attempt = 1;
    loop {
        let candidate = if attempt == 1 {
            target_root.join(&name)
        } else {
            target_root.join(format!("{name} ({attempt})"))
        };
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => {
                return Err(EngineError::config(
                    format!("cannot create snapshot directory: {e}"),
                    candidate,
                ))
            }
        }
    }
}
