//! Core data model for backup jobs.
//!
//! This module defines the data the engine passes around:
//! - Mode, JobState: enums controlling job behavior and lifecycle
//! - EntryAction: the decision taken for one filesystem entry
//! - SyncCounters / CounterSnapshot: live and copied job counters
//! - JobConfig: the serializable configuration surface of a job

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// How a job treats the target tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Copy new and changed entries; never delete anything at the target
    Protocol,
    /// Full mirror: copy changes and remove orphans
    Sync,
    /// Write a new timestamped tree, reusing unchanged files from the last one
    Snapshot,
}

impl Mode {
    /// Parse a mode name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "protocol" => Some(Mode::Protocol),
            "sync" => Some(Mode::Sync),
            "snapshot" => Some(Mode::Snapshot),
            _ => None,
        }
    }

    /// Whether this mode removes entries from the target.
    pub fn deletes_orphans(&self) -> bool {
        matches!(self, Mode::Sync)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Protocol => write!(f, "Protocol"),
            Mode::Sync => write!(f, "Sync"),
            Mode::Snapshot => write!(f, "Snapshot"),
        }
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Created, never started
    New,
    /// Worker is traversing
    Running,
    /// Worker is blocked at a directory boundary
    Paused,
    /// Traversal completed (individual entries may have failed)
    Finished,
    /// Abort was observed by the worker
    Aborted,
}

impl JobState {
    /// Returns true if no worker is active for this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Finished | JobState::Aborted)
    }

    /// Whether configuration may be changed (and the job started) in this state.
    pub fn is_idle(&self) -> bool {
        matches!(self, JobState::New | JobState::Finished | JobState::Aborted)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Decision for one filesystem entry. Produced fresh per entry per pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryAction {
    CreateDirectory {
        target: PathBuf,
    },
    RecurseDirectory {
        source: PathBuf,
    },
    ReplicateJunction {
        target: PathBuf,
        link: PathBuf,
    },
    /// Delete the target junction and recreate it pointing at `link`
    RepointJunction {
        target: PathBuf,
        link: PathBuf,
    },
    /// Remove the real directory at `target`, then create the junction
    DeleteThenReplicateJunction {
        target: PathBuf,
        link: PathBuf,
    },
    CopyFile {
        source: PathBuf,
        target: PathBuf,
    },
    /// Hard-link the unchanged baseline copy into a snapshot tree
    LinkFromBaseline {
        source: PathBuf,
        baseline: PathBuf,
        target: PathBuf,
    },
    DeleteFile {
        target: PathBuf,
    },
    DeleteDirectory {
        target: PathBuf,
    },
    DeleteJunction {
        target: PathBuf,
    },
    NoOp,
}

impl EntryAction {
    /// True for the actions that put a junction at the target.
    pub fn is_junction_replication(&self) -> bool {
        matches!(
            self,
            EntryAction::ReplicateJunction { .. }
                | EntryAction::RepointJunction { .. }
                | EntryAction::DeleteThenReplicateJunction { .. }
        )
    }

    /// Target-side path the action touches, if any.
    pub fn target(&self) -> Option<&Path> {
        match self {
            EntryAction::CreateDirectory { target }
            | EntryAction::ReplicateJunction { target, .. }
            | EntryAction::RepointJunction { target, .. }
            | EntryAction::DeleteThenReplicateJunction { target, .. }
            | EntryAction::CopyFile { target, .. }
            | EntryAction::LinkFromBaseline { target, .. }
            | EntryAction::DeleteFile { target }
            | EntryAction::DeleteDirectory { target }
            | EntryAction::DeleteJunction { target } => Some(target),
            EntryAction::RecurseDirectory { .. } | EntryAction::NoOp => None,
        }
    }
}

impl fmt::Display for EntryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryAction::CreateDirectory { target } => {
                write!(f, "create directory {}", target.display())
            }
            EntryAction::RecurseDirectory { source } => {
                write!(f, "descend into {}", source.display())
            }
            EntryAction::ReplicateJunction { target, link } => {
                write!(f, "create junction {} -> {}", target.display(), link.display())
            }
            EntryAction::RepointJunction { target, link } => {
                write!(f, "repoint junction {} -> {}", target.display(), link.display())
            }
            EntryAction::DeleteThenReplicateJunction { target, link } => write!(
                f,
                "replace directory {} with junction -> {}",
                target.display(),
                link.display()
            ),
            EntryAction::CopyFile { source, target } => {
                write!(f, "copy file {} -> {}", source.display(), target.display())
            }
            EntryAction::LinkFromBaseline {
                source,
                baseline,
                target,
            } => write!(
                f,
                "link unchanged file {} from {} -> {}",
                source.display(),
                baseline.display(),
                target.display()
            ),
            EntryAction::DeleteFile { target } => write!(f, "delete file {}", target.display()),
            EntryAction::DeleteDirectory { target } => {
                write!(f, "delete directory {}", target.display())
            }
            EntryAction::DeleteJunction { target } => {
                write!(f, "delete junction {}", target.display())
            }
            EntryAction::NoOp => write!(f, "no change"),
        }
    }
}

/// Live job counters. Written only by the worker, readable from anywhere.
#[derive(Debug, Default)]
pub struct SyncCounters {
    pub files_copied: AtomicU64,
    pub files_deleted: AtomicU64,
    pub directories_copied: AtomicU64,
    pub directories_deleted: AtomicU64,
    pub junctions_created: AtomicU64,
    pub junctions_deleted: AtomicU64,
    pub files_linked: AtomicU64,
    pub bytes_copied: AtomicU64,
    pub errors: AtomicU64,
}

impl SyncCounters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn reset(&self) {
        for counter in [
            &self.files_copied,
            &self.files_deleted,
            &self.directories_copied,
            &self.directories_deleted,
            &self.junctions_created,
            &self.junctions_deleted,
            &self.files_linked,
            &self.bytes_copied,
            &self.errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    /// Copy the current values.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            files_copied: self.files_copied.load(Ordering::Relaxed),
            files_deleted: self.files_deleted.load(Ordering::Relaxed),
            directories_copied: self.directories_copied.load(Ordering::Relaxed),
            directories_deleted: self.directories_deleted.load(Ordering::Relaxed),
            junctions_created: self.junctions_created.load(Ordering::Relaxed),
            junctions_deleted: self.junctions_deleted.load(Ordering::Relaxed),
            files_linked: self.files_linked.load(Ordering::Relaxed),
            bytes_copied: self.bytes_copied.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SyncCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub files_copied: u64,
    pub files_deleted: u64,
    pub directories_copied: u64,
    pub directories_deleted: u64,
    pub junctions_created: u64,
    pub junctions_deleted: u64,
    pub files_linked: u64,
    pub bytes_copied: u64,
    pub errors: u64,
}

impl CounterSnapshot {
    /// Number of entries the run changed at the target.
    pub fn changes(&self) -> u64 {
        self.files_copied
            + self.files_deleted
            + self.directories_copied
            + self.directories_deleted
            + self.junctions_created
            + self.junctions_deleted
            + self.files_linked
    }
}

impl fmt::Display for CounterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "files copied {}, files deleted {}, directories copied {}, directories deleted {}, \
             junctions created {}, junctions deleted {}, files linked {}, bytes copied {}, errors {}",
            self.files_copied,
            self.files_deleted,
            self.directories_copied,
            self.directories_deleted,
            self.junctions_created,
            self.junctions_deleted,
            self.files_linked,
            self.bytes_copied,
            self.errors
        )
    }
}

/// Configuration surface of a job, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub mode: Mode,
    pub source_root: Option<PathBuf>,
    pub target_root: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
}

impl Default for JobConfig {
    fn default() -> Self {
        JobConfig {
            mode: Mode::Sync,
            source_root: None,
            target_root: None,
            log_path: None,
        }
    }
}

impl JobConfig {
    /// Load a job configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let content = fs::read_to_string(path).map_err(|e| EngineError::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| EngineError::ConfigFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}
