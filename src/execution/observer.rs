use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

const LOG_TARGET: &str = "       run";

/// Execution events emitted by the engine.
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        files: usize,
    },
    ThrottleWaited {
        duration: Duration,
    },
    /// Emitted by the worker that picked the file up.
    FileStarted {
        path: PathBuf,
    },
    /// Emitted by the orchestrating thread once the file's partial was merged.
    FileFinished {
        path: PathBuf,
        completed: usize,
        total: usize,
    },
    /// Emitted by the orchestrating thread once the failure was recorded.
    FileFailed {
        path: PathBuf,
        error: String,
        completed: usize,
        total: usize,
    },
    /// The file was not started because the run was cancelled.
    FileSkipped {
        path: PathBuf,
    },
    RunFinished {
        elapsed: Duration,
        metrics: ExecutionMetricsSnapshot,
    },
}

/// Observer hook for execution events.
pub trait ExecutionObserver: Send + Sync {
    fn on_event(&self, event: &ExecutionEvent);
}

/// Forwards execution events to the `log` facade.
#[derive(Debug, Default)]
pub struct LogExecutionObserver;

impl ExecutionObserver for LogExecutionObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::RunStarted { files } => log::info!(target: LOG_TARGET, "processing {files} file(s)"),
            ExecutionEvent::FileFinished { path, completed, total } => {
                log::debug!(target: LOG_TARGET, "[{completed}/{total}] {}", path.display());
            }
            ExecutionEvent::FileFailed {
                path,
                error,
                completed,
                total,
            } => log::warn!(target: LOG_TARGET, "[{completed}/{total}] skipped {}: {error}", path.display()),
            ExecutionEvent::RunFinished { metrics, .. } => log::info!(target: LOG_TARGET, "finished: {metrics}"),
            other => log::trace!(target: LOG_TARGET, "{other:?}"),
        }
    }
}

/// Real-time metrics for an execution run.
///
/// The engine updates these counters during execution; callers can snapshot them at any time.
pub struct ExecutionMetrics {
    run_id: AtomicU64,
    elapsed_ns: AtomicU64,

    files_started: AtomicU64,
    files_succeeded: AtomicU64,
    files_failed: AtomicU64,
    files_skipped: AtomicU64,
    throttle_wait_ns: AtomicU64,

    active_files: AtomicUsize,
    max_active_files: AtomicUsize,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self {
            run_id: AtomicU64::new(0),
            elapsed_ns: AtomicU64::new(0),
            files_started: AtomicU64::new(0),
            files_succeeded: AtomicU64::new(0),
            files_failed: AtomicU64::new(0),
            files_skipped: AtomicU64::new(0),
            throttle_wait_ns: AtomicU64::new(0),
            active_files: AtomicUsize::new(0),
            max_active_files: AtomicUsize::new(0),
        }
    }

    pub fn begin_run(&self) {
        let _ = self.run_id.fetch_add(1, Ordering::SeqCst);

        self.elapsed_ns.store(0, Ordering::SeqCst);
        self.files_started.store(0, Ordering::SeqCst);
        self.files_succeeded.store(0, Ordering::SeqCst);
        self.files_failed.store(0, Ordering::SeqCst);
        self.files_skipped.store(0, Ordering::SeqCst);
        self.throttle_wait_ns.store(0, Ordering::SeqCst);
        self.active_files.store(0, Ordering::SeqCst);
        self.max_active_files.store(0, Ordering::SeqCst);
    }

    pub fn end_run(&self, elapsed: Duration) {
        self.elapsed_ns.store(saturating_nanos(elapsed), Ordering::SeqCst);
    }

    pub fn on_file_start(&self) {
        let _ = self.files_started.fetch_add(1, Ordering::SeqCst);
        let now = self.active_files.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.max_active_files.fetch_max(now, Ordering::SeqCst);
    }

    pub fn on_file_end(&self, ok: bool) {
        let counter = if ok { &self.files_succeeded } else { &self.files_failed };
        let _ = counter.fetch_add(1, Ordering::SeqCst);
        let _ = self.active_files.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn on_file_skipped(&self) {
        let _ = self.files_skipped.fetch_add(1, Ordering::SeqCst);
    }

    pub fn on_throttle_wait(&self, d: Duration) {
        let _ = self.throttle_wait_ns.fetch_add(saturating_nanos(d), Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ExecutionMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        let elapsed = (elapsed_ns > 0).then(|| Duration::from_nanos(elapsed_ns));

        ExecutionMetricsSnapshot {
            run_id: self.run_id.load(Ordering::SeqCst),
            elapsed,
            files_started: self.files_started.load(Ordering::SeqCst),
            files_succeeded: self.files_succeeded.load(Ordering::SeqCst),
            files_failed: self.files_failed.load(Ordering::SeqCst),
            files_skipped: self.files_skipped.load(Ordering::SeqCst),
            throttle_wait: Duration::from_nanos(self.throttle_wait_ns.load(Ordering::SeqCst)),
            max_active_files: self.max_active_files.load(Ordering::SeqCst),
        }
    }
}

impl Default for ExecutionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn saturating_nanos(d: Duration) -> u64 {
    d.as_nanos().min(u128::from(u64::MAX)) as u64
}

/// Immutable snapshot of [`ExecutionMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionMetricsSnapshot {
    pub run_id: u64,
    pub elapsed: Option<Duration>,
    pub files_started: u64,
    pub files_succeeded: u64,
    pub files_failed: u64,
    pub files_skipped: u64,
    pub throttle_wait: Duration,
    pub max_active_files: usize,
}

impl fmt::Display for ExecutionMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_id={}, files ok={} failed={} skipped={} (started {}), max_active_files={}, throttle_wait={:?}, elapsed={:?}",
            self.run_id,
            self.files_succeeded,
            self.files_failed,
            self.files_skipped,
            self.files_started,
            self.max_active_files,
            self.throttle_wait,
            self.elapsed
        )
    }
}
