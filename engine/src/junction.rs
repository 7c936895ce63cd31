//! Directory junction primitives.
//!
//! The walker never touches junctions directly; it goes through a
//! [`JunctionAdapter`] so hosts can supply their own implementation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::EngineError;

/// Existence, target lookup, creation and deletion of directory junctions.
pub trait JunctionAdapter: Send + Sync {
    /// True if `path` itself is a junction (its target is not followed).
    fn exists(&self, path: &Path) -> bool;

    /// Path the junction at `path` redirects to, exactly as stored.
    fn target(&self, path: &Path) -> Result<PathBuf, EngineError>;

    /// Create a junction at `path` pointing at `target`.
    ///
    /// With `overwrite`, an existing junction at `path` is removed first.
    fn create(&self, path: &Path, target: &Path, overwrite: bool) -> Result<(), EngineError>;

    /// Remove the junction at `path` without touching what it points at.
    fn delete(&self, path: &Path) -> Result<(), EngineError>;
}

/// Junctions backed by the host's directory links.
///
/// Unix uses symbolic links; Windows uses directory symlinks, which share
/// the name-surrogate reparse behavior of junctions.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeJunctions;

impl JunctionAdapter for NativeJunctions {
    fn exists(&self, path: &Path) -> bool {
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.file_type().is_symlink() => {
                // links to regular files are treated as files
                !fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
            }
            _ => false,
        }
    }

    fn target(&self, path: &Path) -> Result<PathBuf, EngineError> {
        fs::read_link(path).map_err(|e| EngineError::fs("read junction", path, e))
    }

    fn create(&self, path: &Path, target: &Path, overwrite: bool) -> Result<(), EngineError> {
        if overwrite && self.exists(path) {
            self.delete(path)?;
        }
        link_dir(target, path).map_err(|e| EngineError::JunctionCreate {
            path: path.to_path_buf(),
            target: target.to_path_buf(),
            source: e,
        })
    }

    fn delete(&self, path: &Path) -> Result<(), EngineError> {
        unlink_dir(path).map_err(|e| EngineError::fs("delete junction", path, e))
    }
}

#[cfg(unix)]
fn link_dir(target: &Path, path: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, path)
}

#[cfg(windows)]
fn link_dir(target: &Path, path: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(target, path)
}

#[cfg(unix)]
fn unlink_dir(path: &Path) -> io::Result<()> {
    fs::remove_file(path)
}

#[cfg(windows)]
fn unlink_dir(path: &Path) -> io::Result<()> {
    fs::remove_dir(path)
}
