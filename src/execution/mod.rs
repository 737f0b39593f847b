//! Bounded parallel execution of one unit of work per input file.
//!
//! This module sits "above" [`crate::processing`] and provides:
//!
//! - A rayon pool of `num_threads` workers, one task per file
//! - Throttling of in-flight files with a counting semaphore
//! - Fan-in over a channel: partials are merged on the calling thread in completion order
//! - Per-file failure isolation, cooperative cancellation, real-time metrics and observer hooks

mod observer;
mod semaphore;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::{FileFailure, ReportError, ReportResult};
use crate::processing::Merge;

pub use observer::{
    ExecutionEvent, ExecutionMetrics, ExecutionMetricsSnapshot, ExecutionObserver, LogExecutionObserver,
};

use semaphore::Semaphore;

/// Work done for each input file.
///
/// `process` must be pure with respect to shared state: everything it produces goes into the
/// returned partial, which the engine merges.
pub trait FileWorkload: Sync {
    type Partial: Merge + Default + Send;

    fn process(&self, path: &Path) -> ReportResult<Self::Partial>;
}

/// Shared flag requesting that a run stop starting new files.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Configuration for the [`ExecutionEngine`].
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Number of worker threads used by the engine.
    ///
    /// If `None`, uses the platform's available parallelism.
    pub num_threads: Option<usize>,
    /// Upper bound on files being read concurrently.
    ///
    /// This is an additional throttle on top of `num_threads`, bounding peak memory.
    pub max_in_flight_files: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        let n = available_parallelism();
        Self {
            num_threads: Some(n),
            max_in_flight_files: n,
        }
    }
}

fn available_parallelism() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

/// Result of a completed (non-cancelled) run.
#[derive(Debug)]
pub struct RunOutcome<P> {
    /// Merge of every successful file's partial.
    pub merged: P,
    /// Files that could not be processed, sorted by path.
    pub failures: Vec<FileFailure>,
    pub files_total: usize,
    pub files_succeeded: usize,
    pub elapsed: Duration,
}

enum Message<P> {
    Done(usize, ReportResult<P>),
    Skipped(usize),
}

/// A configurable execution engine for per-file workloads.
pub struct ExecutionEngine {
    pool: ThreadPool,
    opts: ExecutionOptions,
    observer: Option<Arc<dyn ExecutionObserver>>,
    metrics: Arc<ExecutionMetrics>,
    cancel: CancellationFlag,
}

impl ExecutionEngine {
    /// Create a new engine with the given options.
    ///
    /// Zero thread or in-flight counts are configuration errors.
    pub fn new(opts: ExecutionOptions) -> ReportResult<Self> {
        if opts.max_in_flight_files == 0 {
            return Err(ReportError::config("max_in_flight_files must be > 0"));
        }
        if opts.num_threads == Some(0) {
            return Err(ReportError::config("num_threads must be > 0 when set"));
        }

        let n_threads = opts.num_threads.unwrap_or_else(available_parallelism).max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .thread_name(|i| format!("report-worker-{i}"))
            .build()
            .map_err(|e| ReportError::config(format!("failed to build worker pool: {e}")))?;

        Ok(Self {
            pool,
            opts,
            observer: None,
            metrics: Arc::new(ExecutionMetrics::new()),
            cancel: CancellationFlag::new(),
        })
    }

    /// Attach an observer for execution events (progress/logging).
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Share a cancellation flag with the caller.
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancel = flag;
        self
    }

    /// Get a handle to real-time execution metrics.
    pub fn metrics(&self) -> Arc<ExecutionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run `workload` over every file and merge the partials.
    ///
    /// A failing file is recorded in [`RunOutcome::failures`] and does not affect the others. If the
    /// cancellation flag is raised before every file started, the run returns
    /// [`ReportError::Cancelled`] and every partial is discarded.
    pub fn run<W: FileWorkload>(&self, files: &[PathBuf], workload: &W) -> ReportResult<RunOutcome<W::Partial>> {
        let start = Instant::now();
        let total = files.len();
        self.metrics.begin_run();
        self.emit(ExecutionEvent::RunStarted { files: total });

        let sem = Semaphore::new(self.opts.max_in_flight_files);
        let mut merged = W::Partial::default();
        let mut failures = Vec::new();
        let mut succeeded = 0usize;
        let mut skipped = 0usize;

        self.pool.in_place_scope(|scope| {
            let (tx, rx) = mpsc::channel::<Message<W::Partial>>();

            for (idx, path) in files.iter().enumerate() {
                let tx = tx.clone();
                let sem = &sem;
                scope.spawn(move |_| {
                    let msg = self.process_one(idx, path, workload, sem);
                    // The receiver outlives every sender inside this scope.
                    let _ = tx.send(msg);
                });
            }
            drop(tx);

            for msg in rx {
                match msg {
                    Message::Done(idx, Ok(partial)) => {
                        merged = std::mem::take(&mut merged).merge(partial);
                        succeeded += 1;
                        self.emit(ExecutionEvent::FileFinished {
                            path: files[idx].clone(),
                            completed: succeeded + failures.len(),
                            total,
                        });
                    }
                    Message::Done(idx, Err(error)) => {
                        let message = error.to_string();
                        failures.push(FileFailure {
                            path: files[idx].clone(),
                            error,
                        });
                        self.emit(ExecutionEvent::FileFailed {
                            path: files[idx].clone(),
                            error: message,
                            completed: succeeded + failures.len(),
                            total,
                        });
                    }
                    Message::Skipped(idx) => {
                        skipped += 1;
                        self.emit(ExecutionEvent::FileSkipped {
                            path: files[idx].clone(),
                        });
                    }
                }
            }
        });

        let elapsed = start.elapsed();
        self.metrics.end_run(elapsed);
        self.emit(ExecutionEvent::RunFinished {
            elapsed,
            metrics: self.metrics.snapshot(),
        });

        if skipped > 0 {
            return Err(ReportError::Cancelled {
                completed: succeeded + failures.len(),
                total,
            });
        }

        failures.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(RunOutcome {
            merged,
            failures,
            files_total: total,
            files_succeeded: succeeded,
            elapsed,
        })
    }

    fn process_one<W: FileWorkload>(
        &self,
        idx: usize,
        path: &Path,
        workload: &W,
        sem: &Semaphore,
    ) -> Message<W::Partial> {
        let (_permit, waited) = sem.permit();
        if waited > Duration::ZERO {
            self.metrics.on_throttle_wait(waited);
            self.emit(ExecutionEvent::ThrottleWaited { duration: waited });
        }

        if self.cancel.is_cancelled() {
            self.metrics.on_file_skipped();
            return Message::Skipped(idx);
        }

        self.metrics.on_file_start();
        self.emit(ExecutionEvent::FileStarted {
            path: path.to_path_buf(),
        });
        let result = workload.process(path);
        self.metrics.on_file_end(result.is_ok());
        Message::Done(idx, result)
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}
