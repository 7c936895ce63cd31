//! TreeSync - Command-line interface for the directory mirroring engine.
//!
//! Runs a single backup job to completion and reports the outcome on stderr.
//! Settings come from a JSON config file, from flags, or both; flags win.

use clap::Parser;
use engine::{
    BackupJob, CounterSnapshot, EngineError, EntryAction, JobConfig, JobState, Mode,
    ProgressCallback,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// TreeSync - Mirror a directory tree into a backup location
#[derive(Parser, Debug)]
#[command(name = "treesync")]
#[command(version = "0.1.0")]
#[command(about = "Mirror, sync or snapshot a directory tree")]
struct Args {
    /// Source directory
    #[arg(long, value_name = "PATH")]
    src: Option<PathBuf>,

    /// Target directory (the snapshot root in snapshot mode)
    #[arg(long, value_name = "PATH")]
    dst: Option<PathBuf>,

    /// Operation mode: protocol, sync or snapshot
    #[arg(long, value_name = "MODE")]
    mode: Option<String>,

    /// Job log file, appended to
    #[arg(long, value_name = "FILE")]
    log: Option<PathBuf>,

    /// JSON job configuration; explicit flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print every action
    #[arg(long)]
    verbose: bool,
}

/// CLI implementation of ProgressCallback, reporting to stderr
struct CliProgress {
    verbose: bool,
    start_time: Instant,
}

impl CliProgress {
    fn new(verbose: bool) -> Self {
        CliProgress {
            verbose,
            start_time: Instant::now(),
        }
    }

    fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_idx = 0;

        while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
            size /= 1024.0;
            unit_idx += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_idx])
    }

    fn format_duration(elapsed: Duration) -> String {
        let secs = elapsed.as_secs();
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, mins, secs)
        } else if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}s", secs)
        }
    }
}

impl ProgressCallback for CliProgress {
    fn on_job_started(&self, mode: Mode, source_root: &Path, effective_target_root: &Path) {
        eprintln!("Starting {} job...", mode);
        eprintln!("  Source: {}", source_root.display());
        eprintln!("  Target: {}", effective_target_root.display());
        eprintln!();
    }

    fn on_directory_started(&self, source_dir: &Path) {
        if self.verbose {
            eprintln!("Entering {}", source_dir.display());
        }
    }

    fn on_action_completed(&self, action: &EntryAction, outcome: Result<(), &EngineError>) {
        match outcome {
            Err(e) => eprintln!("  FAILED {}: {}", action, e),
            Ok(()) if self.verbose => match action {
                EntryAction::NoOp | EntryAction::RecurseDirectory { .. } => {}
                _ => eprintln!("  {}", action),
            },
            Ok(()) => {}
        }
    }

    fn on_job_completed(&self, state: JobState, counters: &CounterSnapshot) {
        eprintln!();
        eprintln!("Job {}", state);
        eprintln!(
            "Files: {} copied, {} linked, {} deleted",
            counters.files_copied, counters.files_linked, counters.files_deleted
        );
        eprintln!(
            "Directories: {} created, {} deleted",
            counters.directories_copied, counters.directories_deleted
        );
        eprintln!(
            "Junctions: {} created, {} deleted",
            counters.junctions_created, counters.junctions_deleted
        );
        eprintln!("Bytes copied: {}", Self::format_bytes(counters.bytes_copied));
        eprintln!("Errors: {}", counters.errors);
        eprintln!("Elapsed: {}", Self::format_duration(self.start_time.elapsed()));
    }
}

/// Parse and validate command-line arguments, then run the job
fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let exit_code = match run_cli(&args) {
        Ok(()) => 0,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Diagnostics go to stderr; `RUST_LOG` overrides the default level.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Merge the config file (if any) with explicit flags.
fn resolve_config(args: &Args) -> Result<JobConfig, String> {
    let mut config = match &args.config {
        Some(path) => JobConfig::load(path).map_err(|e| e.to_string())?,
        None => JobConfig::default(),
    };

    if let Some(mode) = &args.mode {
        config.mode = Mode::parse(mode).ok_or_else(|| {
            format!(
                "Invalid mode '{}'. Must be 'protocol', 'sync' or 'snapshot'",
                mode
            )
        })?;
    }
    if let Some(src) = &args.src {
        config.source_root = Some(src.clone());
    }
    if let Some(dst) = &args.dst {
        config.target_root = Some(dst.clone());
    }
    if let Some(log) = &args.log {
        config.log_path = Some(log.clone());
    }

    if config.source_root.is_none() {
        return Err("No source directory given (use --src or a config file)".to_string());
    }
    if config.target_root.is_none() {
        return Err("No target directory given (use --dst or a config file)".to_string());
    }
    if config.log_path.is_none() {
        return Err("No log file given (use --log or a config file)".to_string());
    }
    Ok(config)
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args) -> Result<(), String> {
    let config = resolve_config(args)?;

    let mut job = BackupJob::from_config(config);
    job.set_progress_callback(Arc::new(CliProgress::new(args.verbose)))
        .map_err(|e| e.to_string())?;
    job.start().map_err(|e| format!("Job could not start: {}", e))?;

    let state = job.wait();
    let counters = job.counters();
    if state != JobState::Finished {
        return Err(format!("Job ended in state {}", state));
    }
    if counters.errors > 0 {
        return Err(format!(
            "{} entries failed, see the log for details",
            counters.errors
        ));
    }
    Ok(())
}
