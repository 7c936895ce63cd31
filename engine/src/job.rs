//! Job orchestration module.
//!
//! A [`BackupJob`] owns the configuration of one mirroring run and the worker
//! thread that performs it:
//! - `start` validates the roots, resolves the effective target (and the
//!   baseline for snapshots) and spawns the worker
//! - `abort` and `suspend_or_resume` signal the worker cooperatively
//! - `wait` joins the worker and returns the terminal state
//!
//! State and counters can be polled at any time, from any thread, through a
//! [`JobHandle`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use chrono::Local;
use uuid::Uuid;

use crate::baseline;
use crate::control::JobControl;
use crate::error::EngineError;
use crate::executor::ActionExecutor;
use crate::junction::{JunctionAdapter, NativeJunctions};
use crate::log::JobLog;
use crate::model::{CounterSnapshot, JobConfig, JobState, Mode, SyncCounters};
use crate::progress::ProgressCallback;
use crate::walker::{TreeWalker, WalkOutcome, WalkRoots};

/// State shared between a job, its handles and its worker.
#[derive(Debug)]
struct JobShared {
    state: Mutex<JobState>,
    control: JobControl,
    counters: SyncCounters,
}

impl JobShared {
    fn lock_state(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cloneable view of a job for observers on other threads.
#[derive(Debug, Clone)]
pub struct JobHandle {
    shared: Arc<JobShared>,
}

impl JobHandle {
    pub fn state(&self) -> JobState {
        *self.shared.lock_state()
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.shared.counters.snapshot()
    }

    /// Request termination. The worker stops at the next directory boundary.
    pub fn abort(&self) -> Result<(), EngineError> {
        let state = self.shared.lock_state();
        match *state {
            JobState::Running | JobState::Paused => {
                self.shared.control.request_abort();
                Ok(())
            }
            other => Err(EngineError::InvalidState {
                operation: "abort",
                state: other,
            }),
        }
    }

    /// Toggle between Running and Paused. Returns the new state.
    pub fn suspend_or_resume(&self) -> Result<JobState, EngineError> {
        let mut state = self.shared.lock_state();
        match *state {
            JobState::Running => {
                self.shared.control.pause();
                *state = JobState::Paused;
            }
            JobState::Paused => {
                self.shared.control.resume();
                *state = JobState::Running;
            }
            other => {
                return Err(EngineError::InvalidState {
                    operation: "suspend or resume",
                    state: other,
                })
            }
        }
        Ok(*state)
    }
}

/// One directory-tree backup job.
pub struct BackupJob {
    id: Uuid,
    mode: Mode,
    source_root: Option<PathBuf>,
    target_root: Option<PathBuf>,
    log_path: Option<PathBuf>,
    effective_target_root: Option<PathBuf>,
    baseline_root: Option<PathBuf>,
    junctions: Arc<dyn JunctionAdapter>,
    progress: Option<Arc<dyn ProgressCallback>>,
    shared: Arc<JobShared>,
    worker: Option<JoinHandle<()>>,
}

impl BackupJob {
    /// Create an unconfigured job in state New.
    pub fn new(mode: Mode) -> Self {
        BackupJob {
            id: Uuid::new_v4(),
            mode,
            source_root: None,
            target_root: None,
            log_path: None,
            effective_target_root: None,
            baseline_root: None,
            junctions: Arc::new(NativeJunctions),
            progress: None,
            shared: Arc::new(JobShared {
                state: Mutex::new(JobState::New),
                control: JobControl::new(),
                counters: SyncCounters::default(),
            }),
            worker: None,
        }
    }

    pub fn from_config(config: JobConfig) -> Self {
        let mut job = BackupJob::new(config.mode);
        job.source_root = config.source_root;
        job.target_root = config.target_root;
        job.log_path = config.log_path;
        job
    }

    /// Use a different junction implementation.
    pub fn with_junctions(mut self, junctions: Arc<dyn JunctionAdapter>) -> Self {
        self.junctions = junctions;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn source_root(&self) -> Option<&Path> {
        self.source_root.as_deref()
    }

    pub fn target_root(&self) -> Option<&Path> {
        self.target_root.as_deref()
    }

    pub fn log_path(&self) -> Option<&Path> {
        self.log_path.as_deref()
    }

    /// Where the last started run writes; a timestamped subdirectory in Snapshot mode.
    pub fn effective_target_root(&self) -> Option<&Path> {
        self.effective_target_root.as_deref()
    }

    /// Snapshot the last started run compared against, if any.
    pub fn baseline_root(&self) -> Option<&Path> {
        self.baseline_root.as_deref()
    }

    pub fn config(&self) -> JobConfig {
        JobConfig {
            mode: self.mode,
            source_root: self.source_root.clone(),
            target_root: self.target_root.clone(),
            log_path: self.log_path.clone(),
        }
    }

    pub fn set_mode(&mut self, mode: Mode) -> Result<(), EngineError> {
        self.ensure_idle("change mode")?;
        self.mode = mode;
        Ok(())
    }

    pub fn set_source_root(&mut self, path: impl Into<PathBuf>) -> Result<(), EngineError> {
        self.ensure_idle("change source root")?;
        self.source_root = Some(path.into());
        Ok(())
    }

    pub fn set_target_root(&mut self, path: impl Into<PathBuf>) -> Result<(), EngineError> {
        self.ensure_idle("change target root")?;
        self.target_root = Some(path.into());
        Ok(())
    }

    pub fn set_log_path(&mut self, path: impl Into<PathBuf>) -> Result<(), EngineError> {
        self.ensure_idle("change log path")?;
        self.log_path = Some(path.into());
        Ok(())
    }

    pub fn set_progress_callback(
        &mut self,
        progress: Arc<dyn ProgressCallback>,
    ) -> Result<(), EngineError> {
        self.ensure_idle("change progress callback")?;
        self.progress = Some(progress);
        Ok(())
    }

    pub fn handle(&self) -> JobHandle {
        JobHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn state(&self) -> JobState {
        *self.shared.lock_state()
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.shared.counters.snapshot()
    }

    pub fn abort(&self) -> Result<(), EngineError> {
        self.handle().abort()
    }

    pub fn suspend_or_resume(&self) -> Result<JobState, EngineError> {
        self.handle().suspend_or_resume()
    }

    /// Validate the configuration and start the worker.
    ///
    /// Allowed from New, Finished and Aborted; a restart is a fresh run with
    /// reset counters and a newly derived effective target.
    ///
    /// # Errors
    /// `InvalidState` if a run is active, `Configuration` if the roots or the
    /// log path are unusable. Nothing has been written to the target when
    /// this fails.
    pub fn start(&mut self) -> Result<(), EngineError> {
        let shared = Arc::clone(&self.shared);
        let mut state = shared.lock_state();
        if !state.is_idle() {
            return Err(EngineError::InvalidState {
                operation: "start",
                state: *state,
            });
        }
        if let Some(previous) = self.worker.take() {
            // already terminal, so this returns immediately
            if previous.join().is_err() {
                tracing::error!(job = %self.id, "previous worker thread panicked");
            }
        }

        let (source, target, log_path) = self.validated_paths()?;
        let mut log = JobLog::open(&log_path, self.id)?;

        let (effective_target, baseline_root) = match self.mode {
            Mode::Snapshot => {
                let baseline_root = baseline::select_baseline(&target).map_err(|e| {
                    EngineError::config(format!("cannot list snapshots: {e}"), &target)
                })?;
                let snapshot_dir = baseline::create_snapshot_dir(&target, Local::now())?;
                (snapshot_dir, baseline_root)
            }
            Mode::Protocol | Mode::Sync => (target.clone(), None),
        };

        self.shared.counters.reset();
        self.shared.control.reset();
        log.action(format_args!(
            "Job {} started: mode {}, source {}, target {}, baseline {}",
            self.id,
            self.mode,
            source.display(),
            effective_target.display(),
            baseline_root
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "none".to_string()),
        ));

        let context = WorkerContext {
            mode: self.mode,
            roots: WalkRoots::new(&source, &effective_target, baseline_root.as_deref()),
            junctions: Arc::clone(&self.junctions),
            progress: self.progress.clone(),
            shared: Arc::clone(&self.shared),
            log,
        };
        let worker = thread::Builder::new()
            .name(format!("backup-{}", self.id))
            .spawn(move || context.run())
            .map_err(|e| EngineError::config(format!("cannot spawn worker: {e}"), &source))?;

        self.worker = Some(worker);
        self.effective_target_root = Some(effective_target);
        self.baseline_root = baseline_root;
        *state = JobState::Running;
        tracing::debug!(job = %self.id, "worker started");
        Ok(())
    }

    /// Block until the worker has finished and return the terminal state.
    ///
    /// Returns the current state immediately if no worker was started.
    pub fn wait(&mut self) -> JobState {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!(job = %self.id, "worker thread panicked");
            }
        }
        self.state()
    }

    fn ensure_idle(&self, operation: &'static str) -> Result<(), EngineError> {
        let state = self.state();
        if state.is_idle() {
            Ok(())
        } else {
            Err(EngineError::InvalidState { operation, state })
        }
    }

    /// Both roots must be existing, distinct, non-nested directories, and the
    /// log must live outside both of them.
    fn validated_paths(&self) -> Result<(PathBuf, PathBuf, PathBuf), EngineError> {
        let source = self
            .source_root
            .clone()
            .ok_or_else(|| EngineError::config("source root not set", ""))?;
        let target = self
            .target_root
            .clone()
            .ok_or_else(|| EngineError::config("target root not set", ""))?;
        let log_path = self
            .log_path
            .clone()
            .ok_or_else(|| EngineError::config("log path not set", ""))?;

        let source_real = existing_dir(&source, "source root")?;
        let target_real = existing_dir(&target, "target root")?;
        if source_real == target_real {
            return Err(EngineError::config(
                "source and target root are the same directory",
                &target,
            ));
        }
        if target_real.starts_with(&source_real) || source_real.starts_with(&target_real) {
            return Err(EngineError::config(
                "source and target root must not contain each other",
                &target,
            ));
        }

        // a log under either root would be swept or copied by the run writing it
        let log_real = resolve_log_location(&log_path);
        if log_real.starts_with(&source_real) || log_real.starts_with(&target_real) {
            return Err(EngineError::config(
                "log file must not be inside the source or target root",
                &log_path,
            ));
        }
        Ok((source, target, log_path))
    }
}

impl Drop for BackupJob {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.shared.control.request_abort();
            self.wait();
        }
    }
}

/// Canonical form of `path`, which must be an existing directory.
fn existing_dir(path: &Path, what: &str) -> Result<PathBuf, EngineError> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => fs::canonicalize(path)
            .map_err(|e| EngineError::config(format!("cannot resolve {what}: {e}"), path)),
        Ok(_) => Err(EngineError::config(format!("{what} is not a directory"), path)),
        Err(e) => Err(EngineError::config(format!("{what} is not accessible: {e}"), path)),
    }
}

/// Absolute location of a log file that may not exist yet.
fn resolve_log_location(path: &Path) -> PathBuf {
    if let Ok(real) = fs::canonicalize(path) {
        return real;
    }
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    match (fs::canonicalize(parent), path.file_name()) {
        (Ok(dir), Some(name)) => dir.join(name),
        _ => path.to_path_buf(),
    }
}

/// Everything the worker thread owns for one run.
struct WorkerContext {
    mode: Mode,
    roots: WalkRoots,
    junctions: Arc<dyn JunctionAdapter>,
    progress: Option<Arc<dyn ProgressCallback>>,
    shared: Arc<JobShared>,
    log: JobLog,
}

impl WorkerContext {
    fn run(mut self) {
        let _guard = TerminalGuard(Arc::clone(&self.shared));
        let progress = self.progress.as_deref();
        if let Some(progress) = progress {
            progress.on_job_started(
                self.mode,
                self.roots.forward.from_root(),
                self.roots.forward.to_root(),
            );
        }

        let outcome = {
            let mut executor = ActionExecutor::new(
                &*self.junctions,
                &self.shared.counters,
                &mut self.log,
                progress,
            );
            TreeWalker::new(
                self.mode,
                &self.roots,
                &*self.junctions,
                &self.shared.control,
                progress,
            )
            .run(&mut executor)
        };

        let (terminal, counters) = {
            let mut state = self.shared.lock_state();
            let terminal = if outcome == WalkOutcome::Aborted
                || self.shared.control.is_abort_requested()
            {
                JobState::Aborted
            } else {
                JobState::Finished
            };
            let counters = self.shared.counters.snapshot();
            // summary is on disk before anyone can observe the terminal state
            self.log.summary(terminal, &counters);
            *state = terminal;
            (terminal, counters)
        };

        if let Some(progress) = progress {
            progress.on_job_completed(terminal, &counters);
        }
    }
}

/// Moves a job whose worker died without finishing into Aborted.
struct TerminalGuard(Arc<JobShared>);

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let mut state = self.0.lock_state();
        if !state.is_terminal() {
            *state = JobState::Aborted;
        }
    }
}
