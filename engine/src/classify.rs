//! Per-entry decisions for one source directory level.
//!
//! The classifier only inspects the filesystem; carrying out the returned
//! actions is the executor's job.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::EngineError;
use crate::fs_ops;
use crate::junction::JunctionAdapter;
use crate::model::{EntryAction, Mode};
use crate::paths::PathMap;

/// Classifies source entries against their mapped target entries.
pub struct EntryClassifier<'a> {
    mode: Mode,
    forward: &'a PathMap,
    baseline: Option<&'a PathMap>,
    junctions: &'a dyn JunctionAdapter,
}

impl<'a> EntryClassifier<'a> {
    pub fn new(
        mode: Mode,
        forward: &'a PathMap,
        baseline: Option<&'a PathMap>,
        junctions: &'a dyn JunctionAdapter,
    ) -> Self {
        EntryClassifier {
            mode,
            forward,
            baseline,
            junctions,
        }
    }

    /// Decide what to do with the source subdirectory (or junction) `src_dir`.
    ///
    /// Actions are returned in the order they must be applied.
    pub fn classify_directory(&self, src_dir: &Path) -> Result<Vec<EntryAction>, EngineError> {
        let dst_dir = self.forward.map(src_dir)?;
        let existing = self.target_kind(&dst_dir)?;

        if self.junctions.exists(src_dir) {
            let link = self.junctions.target(src_dir)?;
            let actions = match existing {
                TargetKind::Junction => {
                    if self.junctions.target(&dst_dir)? == link {
                        vec![EntryAction::NoOp]
                    } else {
                        vec![EntryAction::RepointJunction {
                            target: dst_dir,
                            link,
                        }]
                    }
                }
                TargetKind::Directory if self.mode.deletes_orphans() => {
                    vec![EntryAction::DeleteThenReplicateJunction {
                        target: dst_dir,
                        link,
                    }]
                }
                // copy-only modes keep the real directory
                TargetKind::Directory => vec![EntryAction::NoOp],
                TargetKind::File => vec![
                    self.make_room(
                        EntryAction::DeleteFile {
                            target: dst_dir.clone(),
                        },
                        "junction",
                    )?,
                    EntryAction::ReplicateJunction {
                        target: dst_dir,
                        link,
                    },
                ],
                TargetKind::Missing => vec![EntryAction::ReplicateJunction {
                    target: dst_dir,
                    link,
                }],
            };
            return Ok(actions);
        }

        let mut actions = Vec::with_capacity(3);
        match existing {
            TargetKind::Directory => {}
            TargetKind::Missing => actions.push(EntryAction::CreateDirectory { target: dst_dir }),
            TargetKind::Junction => {
                // never descend through a stale junction into the data it points at
                actions.push(EntryAction::DeleteJunction {
                    target: dst_dir.clone(),
                });
                actions.push(EntryAction::CreateDirectory { target: dst_dir });
            }
            TargetKind::File => {
                actions.push(self.make_room(
                    EntryAction::DeleteFile {
                        target: dst_dir.clone(),
                    },
                    "directory",
                )?);
                actions.push(EntryAction::CreateDirectory { target: dst_dir });
            }
        }
        actions.push(EntryAction::RecurseDirectory {
            source: src_dir.to_path_buf(),
        });
        Ok(actions)
    }

    /// Decide what to do with the source file `src_file`.
    ///
    /// Any difference in modification time counts as a change. A directory or
    /// junction in the file's place is removed first in Sync mode.
    pub fn classify_file(&self, src_file: &Path) -> Result<Vec<EntryAction>, EngineError> {
        let dst_file = self.forward.map(src_file)?;
        let src_mtime = fs_ops::modified_time(src_file)?;

        let mut actions = Vec::with_capacity(2);
        match self.target_kind(&dst_file)? {
            TargetKind::Missing => {}
            TargetKind::File => {
                let dst_mtime = fs_ops::modified_time(&dst_file)?;
                if dst_mtime == src_mtime {
                    return Ok(vec![EntryAction::NoOp]);
                }
            }
            TargetKind::Directory => actions.push(self.make_room(
                EntryAction::DeleteDirectory {
                    target: dst_file.clone(),
                },
                "file",
            )?),
            TargetKind::Junction => actions.push(self.make_room(
                EntryAction::DeleteJunction {
                    target: dst_file.clone(),
                },
                "file",
            )?),
        }

        if self.mode == Mode::Snapshot {
            if let Some(baseline) = self.baseline {
                let baseline_file = baseline.map(src_file)?;
                if fs_ops::file_matches_mtime(&baseline_file, src_mtime) {
                    actions.push(EntryAction::LinkFromBaseline {
                        source: src_file.to_path_buf(),
                        baseline: baseline_file,
                        target: dst_file,
                    });
                    return Ok(actions);
                }
            }
        }

        actions.push(EntryAction::CopyFile {
            source: src_file.to_path_buf(),
            target: dst_file,
        });
        Ok(actions)
    }

    /// What currently occupies `path` in the target tree.
    fn target_kind(&self, path: &Path) -> Result<TargetKind, EngineError> {
        match fs::symlink_metadata(path) {
            Ok(_) if self.junctions.exists(path) => Ok(TargetKind::Junction),
            Ok(meta) if meta.is_dir() => Ok(TargetKind::Directory),
            Ok(_) => Ok(TargetKind::File),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(TargetKind::Missing),
            Err(e) => Err(EngineError::fs("inspect", path, e)),
        }
    }

    /// Clearing an entry of the wrong kind is a deletion, so only Sync may do it.
    fn make_room(
        &self,
        removal: EntryAction,
        wanted: &'static str,
    ) -> Result<EntryAction, EngineError> {
        if self.mode.deletes_orphans() {
            return Ok(removal);
        }
        let path = removal.target().map(Path::to_path_buf).unwrap_or_default();
        Err(EngineError::KindConflict {
            path,
            expected: wanted,
        })
    }
}

/// Kind of entry found at a target path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetKind {
    Missing,
    File,
    Directory,
    Junction,
}
