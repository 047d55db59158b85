use crate::algorithms::DoDWipe;
use crate::Device;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Pending → Running → Succeeded | Failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskState::Pending => "PENDING",
            TaskState::Running => "RUNNING",
            TaskState::Succeeded => "SUCCEEDED",
            TaskState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Observable state of one device's wipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WipeTask {
    pub device: Device,
    /// Report file, set once the task has created it
    pub log_path: Option<PathBuf>,
    pub state: TaskState,
    pub started_at: Option<DateTime<Local>>,
    pub finished_at: Option<DateTime<Local>>,
    /// 1-based pass in progress, 0 before the first pass
    pub current_pass: usize,
    /// Bytes written in the current pass
    pub pass_bytes: u64,
    pub error: Option<String>,
    pub warnings: Vec<String>,
}

impl WipeTask {
    pub fn pending(device: Device) -> Self {
        Self {
            device,
            log_path: None,
            state: TaskState::Pending,
            started_at: None,
            finished_at: None,
            current_pass: 0,
            pass_bytes: 0,
            error: None,
            warnings: Vec::new(),
        }
    }

    /// Overall completion across all passes, `None` if the size is unknown
    pub fn progress_percent(&self) -> Option<f64> {
        if self.state == TaskState::Succeeded {
            return Some(100.0);
        }

        let size = self.device.size_bytes;
        if size == 0 {
            return None;
        }

        let passes_done = self.current_pass.saturating_sub(1) as f64;
        let within = (self.pass_bytes.min(size) as f64) / size as f64;
        let pct = (passes_done + within) / DoDWipe::PASS_COUNT as f64 * 100.0;
        Some(pct.clamp(0.0, 100.0))
    }

    /// Time since start, up to the finish time once terminal
    pub fn elapsed(&self) -> Duration {
        let Some(start) = self.started_at else {
            return Duration::ZERO;
        };
        let end = self.finished_at.unwrap_or_else(Local::now);
        (end - start).to_std().unwrap_or_default()
    }
}

/// Read side of a running wipe task.
///
/// The task itself is the only writer of its state; handles observe it
/// through a watch channel and can request cancellation.
pub struct WipeTaskHandle {
    path: String,
    state: watch::Receiver<WipeTask>,
    cancel: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl WipeTaskHandle {
    pub(crate) fn new(
        path: String,
        state: watch::Receiver<WipeTask>,
        cancel: Arc<AtomicBool>,
        join: JoinHandle<()>,
    ) -> Self {
        Self {
            path,
            state,
            cancel,
            join: Some(join),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn snapshot(&self) -> WipeTask {
        self.state.borrow().clone()
    }

    /// Terminal, or the task went away without reporting an outcome
    pub fn is_done(&self) -> bool {
        self.state.borrow().state.is_terminal() || self.state.has_changed().is_err()
    }

    /// Ask the task to stop at its next chunk boundary. Not a safe
    /// cancellation: the device is left partially overwritten.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Wait for the task to end and return its final state
    pub async fn join(&mut self) -> WipeTask {
        let mut outcome = None;
        if let Some(handle) = self.join.take() {
            outcome = handle.await.err();
        }

        let mut task = self.snapshot();
        if !task.state.is_terminal() {
            task.state = TaskState::Failed;
            task.finished_at = Some(Local::now());
            task.error = Some(match outcome {
                Some(join_error) => format!("wipe task aborted: {}", join_error),
                None => "wipe task ended without reporting a result".to_string(),
            });
        }
        task
    }
}
