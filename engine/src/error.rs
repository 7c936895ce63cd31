//! Error types for the sync engine.
//!
//! `EngineError` covers both job-level failures (bad configuration, calls made
//! in the wrong lifecycle state) and per-entry failures. Per-entry errors are
//! never returned from the job controller: the walker logs them, counts them
//! and moves on to the next entry.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::JobState;

/// Errors raised by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing or invalid job configuration; fails `start` before any worker runs.
    #[error("Invalid configuration: {reason} ({})", .path.display())]
    Configuration { reason: String, path: PathBuf },

    /// Operation requested while the job is in a state that does not allow it.
    #[error("Cannot {operation} while job is {state}")]
    InvalidState {
        operation: &'static str,
        state: JobState,
    },

    /// A junction could not be created at `path`.
    #[error("Failed to create junction {} -> {}: {source}", .path.display(), .target.display())]
    JunctionCreate {
        path: PathBuf,
        target: PathBuf,
        source: io::Error,
    },

    /// A filesystem call on a single entry failed.
    #[error("Failed to {action} {}: {source}", .path.display())]
    FilesystemAccess {
        action: &'static str,
        path: PathBuf,
        source: io::Error,
    },

    /// Failed to enumerate a directory
    #[error("Failed to enumerate directory {}: {source}", .path.display())]
    EnumerationFailed { path: PathBuf, source: io::Error },

    /// The target holds a different kind of entry than the source (a file
    /// where a directory belongs, or the reverse) and the mode may not delete it.
    #[error("Target {} is in the way of a {expected}", .path.display())]
    KindConflict {
        path: PathBuf,
        expected: &'static str,
    },

    /// Path handed to a root mapping is not located under that root.
    #[error("Path {} is not under root {}", .path.display(), .root.display())]
    PathOutsideRoot { path: PathBuf, root: PathBuf },

    /// A job configuration file could not be loaded.
    #[error("Failed to load job configuration {}: {reason}", .path.display())]
    ConfigFile { path: PathBuf, reason: String },
}

impl EngineError {
    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<u32> {
        match self {
            Self::JunctionCreate { source, .. }
            | Self::FilesystemAccess { source, .. }
            | Self::EnumerationFailed { source, .. } => source.raw_os_error().map(|e| e as u32),
            _ => None,
        }
    }

    pub(crate) fn fs(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        EngineError::FilesystemAccess {
            action,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn config(reason: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        EngineError::Configuration {
            reason: reason.into(),
            path: path.into(),
        }
    }
}
