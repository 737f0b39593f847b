use std::fmt::{Debug, Formatter};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use vm_inventory_report::execution::{ExecutionEvent, ExecutionObserver};

const TEMPLATE: &str = "{prefix:>12.bold.cyan} [{bar:25}] {pos}/{len} {msg}";

/// Progress bar over the input files, drawn to stderr.
pub struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    pub fn new() -> Self {
        let bar = ProgressBar::hidden();
        let style = ProgressStyle::default_bar()
            .template(TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        bar.set_prefix("Processing");
        Self { bar }
    }

    fn set_current(&self, path: &std::path::Path) {
        let name = path.file_name().map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        self.bar.set_message(name);
    }
}

impl Debug for ProgressObserver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressObserver")
            .field("position", &self.bar.position())
            .field("length", &self.bar.length())
            .finish()
    }
}

impl ExecutionObserver for ProgressObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::RunStarted { files } => {
                self.bar.set_length(*files as u64);
                self.bar.set_position(0);
                if *files > 0 {
                    self.bar.set_draw_target(ProgressDrawTarget::stderr());
                }
            }
            ExecutionEvent::FileStarted { path } => self.set_current(path),
            ExecutionEvent::FileFinished { completed, .. } | ExecutionEvent::FileFailed { completed, .. } => {
                self.bar.set_position(*completed as u64);
            }
            ExecutionEvent::RunFinished { .. } => self.bar.finish_and_clear(),
            ExecutionEvent::ThrottleWaited { .. } | ExecutionEvent::FileSkipped { .. } => {}
        }
    }
}
