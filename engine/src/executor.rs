//! Carries out entry actions, one at a time, with per-entry failure isolation.

use std::fs;

use crate::error::EngineError;
use crate::fs_ops;
use crate::junction::JunctionAdapter;
use crate::log::JobLog;
use crate::model::{EntryAction, SyncCounters};
use crate::progress::ProgressCallback;

/// Applies actions to the target tree and keeps the job counters.
pub struct ActionExecutor<'a> {
    junctions: &'a dyn JunctionAdapter,
    counters: &'a SyncCounters,
    log: &'a mut JobLog,
    progress: Option<&'a dyn ProgressCallback>,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(
        junctions: &'a dyn JunctionAdapter,
        counters: &'a SyncCounters,
        log: &'a mut JobLog,
        progress: Option<&'a dyn ProgressCallback>,
    ) -> Self {
        ActionExecutor {
            junctions,
            counters,
            log,
            progress,
        }
    }

    /// Apply `action`, logging the outcome. Failures are recorded, never returned.
    ///
    /// `RecurseDirectory` is scheduling, not a filesystem change, and is ignored here.
    pub fn execute(&mut self, action: &EntryAction) -> bool {
        let result = self.apply(action);
        match &result {
            Ok(()) => match action {
                EntryAction::NoOp | EntryAction::RecurseDirectory { .. } => {
                    tracing::trace!("{action}");
                }
                _ => self.log.action(action),
            },
            Err(e) => self.record_failure(action, e),
        }
        if let Some(progress) = self.progress {
            progress.on_action_completed(action, result.as_ref().map(|_| ()));
        }
        result.is_ok()
    }

    /// Log a failure that happened outside `execute` (listing, classification).
    pub fn record_failure(&mut self, context: impl std::fmt::Display, error: &EngineError) {
        SyncCounters::bump(&self.counters.errors);
        self.log.failure(format_args!("{context}: {error}"));
    }

    fn apply(&self, action: &EntryAction) -> Result<(), EngineError> {
        let counters = self.counters;
        match action {
            EntryAction::NoOp | EntryAction::RecurseDirectory { .. } => {}
            EntryAction::CreateDirectory { target } => {
                fs::create_dir_all(target)
                    .map_err(|e| EngineError::fs("create directory", target, e))?;
                SyncCounters::bump(&counters.directories_copied);
            }
            EntryAction::ReplicateJunction { target, link } => {
                self.junctions.create(target, link, false)?;
                SyncCounters::bump(&counters.junctions_created);
            }
            EntryAction::RepointJunction { target, link } => {
                self.junctions.delete(target)?;
                SyncCounters::bump(&counters.junctions_deleted);
                self.junctions.create(target, link, false)?;
                SyncCounters::bump(&counters.junctions_created);
            }
            EntryAction::DeleteThenReplicateJunction { target, link } => {
                self.remove_directory(target)?;
                self.junctions.create(target, link, false)?;
                SyncCounters::bump(&counters.junctions_created);
            }
            EntryAction::CopyFile { source, target } => {
                let bytes = fs_ops::copy_file_with_metadata(source, target)?;
                SyncCounters::bump(&counters.files_copied);
                SyncCounters::add(&counters.bytes_copied, bytes);
            }
            EntryAction::LinkFromBaseline {
                source,
                baseline,
                target,
            } => match fs::hard_link(baseline, target) {
                Ok(()) => SyncCounters::bump(&counters.files_linked),
                Err(e) => {
                    tracing::debug!(
                        baseline = %baseline.display(),
                        "hard link failed ({e}), copying instead"
                    );
                    let bytes = fs_ops::copy_file_with_metadata(source, target)?;
                    SyncCounters::bump(&counters.files_copied);
                    SyncCounters::add(&counters.bytes_copied, bytes);
                }
            },
            EntryAction::DeleteFile { target } => {
                fs_ops::remove_file(target)?;
                SyncCounters::bump(&counters.files_deleted);
            }
            EntryAction::DeleteDirectory { target } => {
                self.remove_directory(target)?;
            }
            EntryAction::DeleteJunction { target } => {
                self.junctions.delete(target)?;
                SyncCounters::bump(&counters.junctions_deleted);
            }
        }
        Ok(())
    }

    /// Remove a real directory tree; the tree counts as one directory deleted.
    fn remove_directory(&self, target: &std::path::Path) -> Result<(), EngineError> {
        let files_deleted = &self.counters.files_deleted;
        fs_ops::remove_tree(target, self.junctions, || SyncCounters::bump(files_deleted))?;
        SyncCounters::bump(&self.counters.directories_deleted);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::junction::NativeJunctions;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct RecordingProgress {
        outcomes: Mutex<Vec<(String, bool)>>,
    }

    impl ProgressCallback for RecordingProgress {
        fn on_job_started(&self, _: crate::Mode, _: &std::path::Path, _: &std::path::Path) {}
        fn on_directory_started(&self, _: &std::path::Path) {}
        fn on_action_completed(&self, action: &EntryAction, outcome: Result<(), &EngineError>) {
            self.outcomes
                .lock()
                .unwrap()
                .push((action.to_string(), outcome.is_ok()));
        }
        fn on_job_completed(&self, _: crate::JobState, _: &crate::CounterSnapshot) {}
    }

    fn open_log(dir: &std::path::Path) -> JobLog {
        JobLog::open(&dir.join("job.log"), Uuid::new_v4()).expect("Failed to open log")
    }

    #[test]
    fn test_copy_and_delete_update_counters() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("a.txt");
        let dst = temp_dir.path().join("out").join("a.txt");
        fs::write(&src, "hello").expect("Failed to write file");

        let counters = SyncCounters::default();
        let mut log = open_log(temp_dir.path());
        let mut executor = ActionExecutor::new(&NativeJunctions, &counters, &mut log, None);

        assert!(executor.execute(&EntryAction::CopyFile {
            source: src.clone(),
            target: dst.clone(),
        }));
        assert!(executor.execute(&EntryAction::DeleteFile { target: dst.clone() }));

        let snap = counters.snapshot();
        assert_eq!(snap.files_copied, 1);
        assert_eq!(snap.bytes_copied, 5);
        assert_eq!(snap.files_deleted, 1);
        assert!(!dst.exists());
    }

    #[test]
    fn test_failure_is_logged_and_counted_not_returned() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let counters = SyncCounters::default();
        let progress = RecordingProgress {
            outcomes: Mutex::new(Vec::new()),
        };
        let mut log = open_log(temp_dir.path());
        let mut executor =
            ActionExecutor::new(&NativeJunctions, &counters, &mut log, Some(&progress));

        let missing = PathBuf::from(temp_dir.path().join("missing.txt"));
        assert!(!executor.execute(&EntryAction::CopyFile {
            source: missing.clone(),
            target: temp_dir.path().join("copy.txt"),
        }));
        drop(executor);
        drop(log);

        assert_eq!(counters.snapshot().errors, 1);
        assert_eq!(counters.snapshot().files_copied, 0);
        let outcomes = progress.outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].1);

        let content =
            fs::read_to_string(temp_dir.path().join("job.log")).expect("Failed to read log");
        assert!(content.contains("FAILED copy file"));
        assert!(content.contains("missing.txt"));
    }

    #[test]
    fn test_delete_directory_counts_tree_once() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let doomed = temp_dir.path().join("b");
        fs::create_dir_all(doomed.join("inner")).expect("Failed to create tree");
        fs::write(doomed.join("old.txt"), "x").expect("Failed to write file");
        fs::write(doomed.join("inner").join("older.txt"), "x").expect("Failed to write file");

        let counters = SyncCounters::default();
        let mut log = open_log(temp_dir.path());
        let mut executor = ActionExecutor::new(&NativeJunctions, &counters, &mut log, None);
        assert!(executor.execute(&EntryAction::DeleteDirectory { target: doomed.clone() }));

        let snap = counters.snapshot();
        assert_eq!(snap.directories_deleted, 1);
        assert_eq!(snap.files_deleted, 2);
        assert!(!doomed.exists());
    }

    #[test]
    fn test_link_from_baseline_shares_content() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let source = temp_dir.path().join("src.txt");
        let baseline = temp_dir.path().join("base.txt");
        let target = temp_dir.path().join("snap.txt");
        fs::write(&source, "same").expect("Failed to write file");
        fs::write(&baseline, "same").expect("Failed to write file");

        let counters = SyncCounters::default();
        let mut log = open_log(temp_dir.path());
        let mut executor = ActionExecutor::new(&NativeJunctions, &counters, &mut log, None);
        assert!(executor.execute(&EntryAction::LinkFromBaseline {
            source,
            baseline,
            target: target.clone(),
        }));

        let snap = counters.snapshot();
        assert_eq!(snap.files_linked + snap.files_copied, 1);
        assert_eq!(fs::read_to_string(&target).expect("Failed to read"), "same");
    }
}
