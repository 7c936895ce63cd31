//! Filesystem operations module.
//!
//! This module provides the low-level operations the walker builds on:
//! - Listing one directory level, split into subdirectories and files
//! - Copying files with modification time preservation
//! - Removing whole directory trees without following junctions

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::EngineError;
use crate::junction::JunctionAdapter;

/// Entries found directly under one directory, in listing order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirListing {
    /// Real subdirectories and junctions
    pub directories: Vec<PathBuf>,
    /// Regular files (including links that resolve to files)
    pub files: Vec<PathBuf>,
}

/// List one directory level.
///
/// Junctions are reported as directories and are not followed. Entries that
/// are neither (sockets, devices) are left out.
///
/// # Errors
/// Returns `EnumerationFailed` if the directory or one of its entries cannot be read.
pub fn list_directory(
    path: &Path,
    junctions: &dyn JunctionAdapter,
) -> Result<DirListing, EngineError> {
    let enumeration_failed = |e: io::Error| EngineError::EnumerationFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let mut listing = DirListing::default();
    for entry in fs::read_dir(path).map_err(enumeration_failed)? {
        let entry = entry.map_err(enumeration_failed)?;
        let file_type = entry.file_type().map_err(enumeration_failed)?;
        let entry_path = entry.path();

        if file_type.is_dir() || junctions.exists(&entry_path) {
            listing.directories.push(entry_path);
        } else if file_type.is_file()
            || fs::metadata(&entry_path).map(|m| m.is_file()).unwrap_or(false)
        {
            listing.files.push(entry_path);
        } else {
            tracing::debug!(path = %entry_path.display(), "skipping special file");
        }
    }
    Ok(listing)
}

/// Last modification time of `path`, following links.
pub fn modified_time(path: &Path) -> Result<SystemTime, EngineError> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| EngineError::fs("read modification time of", path, e))
}

/// True if `path` exists as a regular file whose mtime equals `mtime`.
pub fn file_matches_mtime(path: &Path, mtime: SystemTime) -> bool {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => meta.modified().map(|t| t == mtime).unwrap_or(false),
        _ => false,
    }
}

/// Copy a file from source to destination with metadata preservation.
///
/// An existing destination file is overwritten.
///
/// # Returns
/// Number of bytes copied
///
/// # Errors
/// Returns `FilesystemAccess` naming the side (read or write) that failed.
pub fn copy_file_with_metadata(src: &Path, dst: &Path) -> Result<u64, EngineError> {
    ensure_parent_dir_exists(dst)?;

    let mut src_file = fs::File::open(src).map_err(|e| EngineError::fs("open", src, e))?;

    let src_mtime = src_file
        .metadata()
        .and_then(|m| m.modified())
        .map_err(|e| EngineError::fs("read metadata of", src, e))?;

    let mut dst_file = fs::File::create(dst).map_err(|e| EngineError::fs("create", dst, e))?;

    let bytes_copied = io::copy(&mut src_file, &mut dst_file).map_err(|e| {
        if e.kind() == io::ErrorKind::PermissionDenied {
            EngineError::fs("write", dst, e)
        } else {
            EngineError::fs("read", src, e)
        }
    })?;
    drop(dst_file);

    // mtime is the change signal for the next run, so failing to set it is an error
    filetime::set_file_mtime(dst, filetime::FileTime::from_system_time(src_mtime))
        .map_err(|e| EngineError::fs("set modification time of", dst, e))?;

    Ok(bytes_copied)
}

/// Ensure the parent directory of a path exists, creating it if necessary.
///
/// # Errors
/// Returns `FilesystemAccess` if the parent is not a directory or cannot be created.
pub fn ensure_parent_dir_exists(path: &Path) -> Result<(), EngineError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    match fs::metadata(parent) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(EngineError::fs(
            "create directory",
            parent,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "Parent path exists but is not a directory",
            ),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(parent).map_err(|e| EngineError::fs("create directory", parent, e))
        }
        Err(e) => Err(EngineError::fs("inspect", parent, e)),
    }
}

/// Remove the directory tree at `root`.
///
/// Junctions inside the tree are unlinked through `junctions` and never
/// followed. `on_file_removed` is called once per regular file deleted.
/// Stops at the first failure; whatever was removed before stays removed.
pub fn remove_tree(
    root: &Path,
    junctions: &dyn JunctionAdapter,
    mut on_file_removed: impl FnMut(),
) -> Result<(), EngineError> {
    let mut pending = vec![root.to_path_buf()];
    let mut emptied = Vec::new();

    while let Some(dir) = pending.pop() {
        let listing = list_directory(&dir, junctions)?;
        for sub in listing.directories {
            if junctions.exists(&sub) {
                junctions.delete(&sub)?;
            } else {
                pending.push(sub);
            }
        }
        for file in listing.files {
            remove_file(&file)?;
            on_file_removed();
        }
        emptied.push(dir);
    }

    // children were pushed after their parents
    for dir in emptied.iter().rev() {
        fs::remove_dir(dir).map_err(|e| EngineError::fs("delete directory", dir, e))?;
    }
    Ok(())
}

/// Remove a single file, clearing the read-only flag if that is what blocks it.
pub fn remove_file(path: &Path) -> Result<(), EngineError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            let mut perms = fs::metadata(path)
                .map_err(|e| EngineError::fs("delete file", path, e))?
                .permissions();
            if !perms.readonly() {
                return Err(EngineError::fs("delete file", path, e));
            }
            perms.set_readonly(false);
            fs::set_permissions(path, perms)
                .and_then(|_| fs::remove_file(path))
                .map_err(|e| EngineError::fs("delete file", path, e))
        }
        Err(e) => Err(EngineError::fs("delete file", path, e)),
    }
}
