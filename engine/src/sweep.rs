//! Removal decisions for target entries whose source counterpart is gone.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::EngineError;
use crate::fs_ops;
use crate::junction::JunctionAdapter;
use crate::model::EntryAction;
use crate::paths::PathMap;

/// Removal decisions for one target level, plus the entries that could not be judged.
#[derive(Debug, Default)]
pub struct SweepPlan {
    pub actions: Vec<EntryAction>,
    /// Entries whose source counterpart could not be inspected; left in place
    pub failures: Vec<(PathBuf, EngineError)>,
}

/// Finds orphans in one target directory level.
///
/// The sweeper is a side pass: it never schedules directories for traversal.
pub struct OrphanSweeper<'a> {
    reverse: &'a PathMap,
    junctions: &'a dyn JunctionAdapter,
}

impl<'a> OrphanSweeper<'a> {
    /// `reverse` maps target paths back to source paths.
    pub fn new(reverse: &'a PathMap, junctions: &'a dyn JunctionAdapter) -> Self {
        OrphanSweeper { reverse, junctions }
    }

    /// Deletion actions for every entry of `target_dir` that has no source.
    ///
    /// A missing `target_dir` has nothing to sweep. Only a failure to list
    /// `target_dir` itself is returned as an error.
    pub fn sweep(&self, target_dir: &Path) -> Result<SweepPlan, EngineError> {
        let mut plan = SweepPlan::default();
        if !target_dir.is_dir() {
            return Ok(plan);
        }
        let listing = fs_ops::list_directory(target_dir, self.junctions)?;

        for target in listing.directories {
            match self.source_exists(&target) {
                Ok(true) => {}
                Ok(false) if self.junctions.exists(&target) => {
                    plan.actions.push(EntryAction::DeleteJunction { target });
                }
                Ok(false) => plan.actions.push(EntryAction::DeleteDirectory { target }),
                Err(e) => plan.failures.push((target, e)),
            }
        }
        for target in listing.files {
            match self.source_exists(&target) {
                Ok(true) => {}
                Ok(false) => plan.actions.push(EntryAction::DeleteFile { target }),
                Err(e) => plan.failures.push((target, e)),
            }
        }
        Ok(plan)
    }

    fn source_exists(&self, target: &Path) -> Result<bool, EngineError> {
        let source = self.reverse.map(target)?;
        // symlink_metadata so a dangling source junction still counts as present
        match fs::symlink_metadata(&source) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(EngineError::fs("inspect", source, e)),
        }
    }
}
