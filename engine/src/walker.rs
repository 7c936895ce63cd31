//! Depth-first traversal of the source tree using an explicit work stack.

use std::fs;
use std::path::{Path, PathBuf};

use crate::classify::EntryClassifier;
use crate::control::JobControl;
use crate::executor::ActionExecutor;
use crate::fs_ops;
use crate::junction::JunctionAdapter;
use crate::model::{EntryAction, Mode};
use crate::paths::PathMap;
use crate::progress::ProgressCallback;
use crate::sweep::OrphanSweeper;

/// How a traversal ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    /// The work stack ran empty
    Completed,
    /// Abort was observed at a directory boundary
    Aborted,
}

/// Root mappings for one run.
#[derive(Debug, Clone)]
pub struct WalkRoots {
    /// source -> effective target
    pub forward: PathMap,
    /// effective target -> source
    pub reverse: PathMap,
    /// source -> baseline snapshot, Snapshot mode only
    pub baseline: Option<PathMap>,
}

impl WalkRoots {
    pub fn new(source: &Path, target: &Path, baseline: Option<&Path>) -> Self {
        let forward = PathMap::new(source, target);
        WalkRoots {
            reverse: forward.reversed(),
            baseline: baseline.map(|b| PathMap::new(source, b)),
            forward,
        }
    }
}

/// Walks source and target trees in lock-step for one job run.
pub struct TreeWalker<'a> {
    mode: Mode,
    roots: &'a WalkRoots,
    junctions: &'a dyn JunctionAdapter,
    control: &'a JobControl,
    progress: Option<&'a dyn ProgressCallback>,
    pending: Vec<PathBuf>,
}

impl<'a> TreeWalker<'a> {
    pub fn new(
        mode: Mode,
        roots: &'a WalkRoots,
        junctions: &'a dyn JunctionAdapter,
        control: &'a JobControl,
        progress: Option<&'a dyn ProgressCallback>,
    ) -> Self {
        TreeWalker {
            mode,
            roots,
            junctions,
            control,
            progress,
            pending: vec![roots.forward.from_root().to_path_buf()],
        }
    }

    /// Run until the stack is empty or an abort is observed.
    ///
    /// Pause and abort are checked between directory levels only; a file copy
    /// in progress always completes.
    pub fn run(&mut self, executor: &mut ActionExecutor<'_>) -> WalkOutcome {
        loop {
            if self.control.is_paused() {
                tracing::debug!("traversal paused");
            }
            if self.control.is_abort_requested() || !self.control.wait_while_paused() {
                return WalkOutcome::Aborted;
            }
            let Some(dir) = self.pending.pop() else {
                return WalkOutcome::Completed;
            };
            self.visit(&dir, executor);
        }
    }

    /// Reconcile one source directory level against its target.
    fn visit(&mut self, src_dir: &Path, executor: &mut ActionExecutor<'_>) {
        if let Some(progress) = self.progress {
            progress.on_directory_started(src_dir);
        }

        let listing = match fs_ops::list_directory(src_dir, self.junctions) {
            Ok(listing) => listing,
            Err(e) => {
                executor.record_failure(format_args!("list {}", src_dir.display()), &e);
                return;
            }
        };

        let roots = self.roots;
        let classifier = EntryClassifier::new(
            self.mode,
            &roots.forward,
            roots.baseline.as_ref(),
            self.junctions,
        );

        for sub in &listing.directories {
            match classifier.classify_directory(sub) {
                Ok(actions) => self.apply_in_order(actions, executor),
                Err(e) => executor.record_failure(format_args!("classify {}", sub.display()), &e),
            }
        }

        for file in &listing.files {
            match classifier.classify_file(file) {
                Ok(actions) => self.apply_in_order(actions, executor),
                Err(e) => executor.record_failure(format_args!("classify {}", file.display()), &e),
            }
        }

        if self.mode.deletes_orphans() {
            self.sweep(src_dir, executor);
        }
    }

    /// Apply one entry's actions; each depends on the ones before it.
    fn apply_in_order(&mut self, actions: Vec<EntryAction>, executor: &mut ActionExecutor<'_>) {
        for action in actions {
            match action {
                EntryAction::RecurseDirectory { source } => self.pending.push(source),
                action => {
                    let applied = executor.execute(&action);
                    if action.is_junction_replication() {
                        ensure_directory_after_junction(&action, executor);
                    } else if !applied {
                        break;
                    }
                }
            }
        }
    }

    fn sweep(&self, src_dir: &Path, executor: &mut ActionExecutor<'_>) {
        let target_dir = match self.roots.forward.map(src_dir) {
            Ok(dir) => dir,
            Err(e) => {
                executor.record_failure(format_args!("sweep {}", src_dir.display()), &e);
                return;
            }
        };
        let sweeper = OrphanSweeper::new(&self.roots.reverse, self.junctions);
        match sweeper.sweep(&target_dir) {
            Ok(plan) => {
                for (path, e) in &plan.failures {
                    executor.record_failure(format_args!("sweep {}", path.display()), e);
                }
                for action in &plan.actions {
                    executor.execute(action);
                }
            }
            Err(e) => executor.record_failure(format_args!("sweep {}", target_dir.display()), &e),
        }
    }
}

/// A replicated junction must leave a directory behind; fall back to a real
/// one only when nothing at all was created.
fn ensure_directory_after_junction(action: &EntryAction, executor: &mut ActionExecutor<'_>) {
    if let Some(target) = action.target() {
        // symlink_metadata: a link with a dangling or relative target still counts
        if fs::symlink_metadata(target).is_err() {
            executor.execute(&EntryAction::CreateDirectory {
                target: target.to_path_buf(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::junction::NativeJunctions;
    use crate::log::JobLog;
    use crate::model::SyncCounters;
    use std::fs;
    use uuid::Uuid;

    fn walk(mode: Mode, src: &Path, dst: &Path, log_dir: &Path) -> (WalkOutcome, SyncCounters) {
        let roots = WalkRoots::new(src, dst, None);
        let control = JobControl::new();
        let counters = SyncCounters::default();
        let mut log = JobLog::open(&log_dir.join("walk.log"), Uuid::new_v4())
            .expect("Failed to open log");
        let outcome = {
            let mut executor = ActionExecutor::new(&NativeJunctions, &counters, &mut log, None);
            TreeWalker::new(mode, &roots, &NativeJunctions, &control, None).run(&mut executor)
        };
        (outcome, counters)
    }

    #[test]
    fn test_walk_mirrors_nested_tree() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        fs::create_dir_all(src.join("a").join("b").join("c")).expect("Failed to create tree");
        fs::create_dir(&dst).expect("Failed to create dst");
        fs::write(src.join("top.txt"), "1").expect("Failed to write file");
        fs::write(src.join("a").join("b").join("c").join("deep.txt"), "2")
            .expect("Failed to write file");

        let (outcome, counters) = walk(Mode::Sync, &src, &dst, temp_dir.path());
        assert_eq!(outcome, WalkOutcome::Completed);

        let snap = counters.snapshot();
        assert_eq!(snap.directories_copied, 3);
        assert_eq!(snap.files_copied, 2);
        assert!(dst.join("a").join("b").join("c").join("deep.txt").exists());
    }

    #[test]
    fn test_protocol_mode_never_deletes() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        fs::create_dir(&src).expect("Failed to create src");
        fs::create_dir_all(dst.join("b")).expect("Failed to create dst");
        fs::write(dst.join("b").join("old.txt"), "x").expect("Failed to write file");

        let (_, counters) = walk(Mode::Protocol, &src, &dst, temp_dir.path());
        assert_eq!(counters.snapshot().changes(), 0);
        assert!(dst.join("b").join("old.txt").exists());
    }

    #[test]
    fn test_abort_before_first_directory() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        fs::create_dir(&src).expect("Failed to create src");
        fs::create_dir(&dst).expect("Failed to create dst");
        fs::write(src.join("file.txt"), "x").expect("Failed to write file");

        let roots = WalkRoots::new(&src, &dst, None);
        let control = JobControl::new();
        control.request_abort();
        let counters = SyncCounters::default();
        let mut log = JobLog::open(&temp_dir.path().join("walk.log"), Uuid::new_v4())
            .expect("Failed to open log");
        let mut executor = ActionExecutor::new(&NativeJunctions, &counters, &mut log, None);
        let outcome =
            TreeWalker::new(Mode::Sync, &roots, &NativeJunctions, &control, None).run(&mut executor);

        assert_eq!(outcome, WalkOutcome::Aborted);
        assert!(!dst.join("file.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let dst = temp_dir.path().join("dst");
        let locked = src.join("locked");
        fs::create_dir_all(&locked).expect("Failed to create tree");
        fs::create_dir(&dst).expect("Failed to create dst");
        fs::write(locked.join("secret.txt"), "x").expect("Failed to write file");
        fs::write(src.join("open.txt"), "x").expect("Failed to write file");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000))
            .expect("Failed to lock dir");

        let (outcome, counters) = walk(Mode::Sync, &src, &dst, temp_dir.path());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))
            .expect("Failed to unlock dir");

        assert_eq!(outcome, WalkOutcome::Completed);
        assert!(dst.join("open.txt").exists());
        // root bypasses permission bits, so the listing may succeed there
        let snap = counters.snapshot();
        assert!(snap.errors == 1 || snap.files_copied == 2);
    }
}
