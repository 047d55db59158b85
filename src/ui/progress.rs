use crate::algorithms::DoDWipe;
use crate::wipe_orchestrator::{TaskState, WipeTask, WipeTaskHandle};
use crate::WipeResult;
use futures::future::join_all;
use std::fmt::Write as _;
use std::io::Write;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub(crate) const CAT_FRAMES: [&str; 6] = [
    "ฅ(^･ω･^=)  ", // cat happy
    "ฅ(=^･ω･^ ) ",
    "ฅ(^･ᴥ･^=)  ",
    "ฅ(=^ᴥ^= )  ",
    "ฅ(^･ω･^=)  ",
    "ฅ(=^･ω･^ ) ",
];

pub(crate) const PAW_FRAMES: [&str; 4] = ["·", "˚", "•", "˚"];

pub const INDETERMINATE_WARNING: &str = "\
WARNING: the wipe was interrupted. Devices that had not finished are in an
indeterminate, partially overwritten state. Their contents can be neither
trusted nor recovered; wipe them again before reuse.";

/// Polls wipe tasks on a fixed interval and redraws their state until all
/// of them are terminal or the operator interrupts.
pub struct ProgressMonitor {
    interval: Duration,
    grace_period: Duration,
    bar_width: usize,
}

impl ProgressMonitor {
    pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);
    const INTERRUPT_POLL: Duration = Duration::from_millis(100);

    /// `interval` is taken as given; range clamping happens in Settings
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            grace_period: Self::DEFAULT_GRACE_PERIOD,
            bar_width: 30,
        }
    }

    /// Upper bound on waiting for tasks to stop after an interrupt
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Block until every task is terminal. On interrupt, request
    /// cancellation of all tasks, wait at most the grace period and warn
    /// about partially wiped devices.
    pub async fn run<W: Write>(
        &self,
        mut tasks: Vec<WipeTaskHandle>,
        out: &mut W,
    ) -> WipeResult<MonitorSummary> {
        let started = Instant::now();
        let mut ticker = tokio::time::interval(self.interval);
        let mut frame = 0usize;
        let mut drawn_lines = 0usize;
        let mut interrupted = false;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = wait_for_interrupt() => {}
            }

            let snapshots: Vec<WipeTask> = tasks.iter().map(WipeTaskHandle::snapshot).collect();
            let screen = self.render(&snapshots, frame, started.elapsed());
            if drawn_lines > 0 {
                // redraw in place
                write!(out, "\x1b[{}A\x1b[J", drawn_lines)?;
            }
            write!(out, "{}", screen)?;
            out.flush()?;
            drawn_lines = screen.lines().count();
            frame = frame.wrapping_add(1);

            if crate::is_interrupted() {
                interrupted = true;
                break;
            }
            if tasks.iter().all(WipeTaskHandle::is_done) {
                break;
            }
        }

        let finished = if interrupted {
            warn!("Interrupt received, cancelling running wipe tasks");
            for task in &tasks {
                task.cancel();
            }
            writeln!(out)?;
            writeln!(out, "{}", INDETERMINATE_WARNING)?;
            out.flush()?;

            let joined =
                tokio::time::timeout(self.grace_period, join_all(tasks.iter_mut().map(|t| t.join())))
                    .await;
            match joined {
                Ok(finished) => finished,
                Err(_) => {
                    warn!("Some wipe tasks did not stop within the grace period");
                    tasks.iter().map(WipeTaskHandle::snapshot).collect()
                }
            }
        } else {
            join_all(tasks.iter_mut().map(|t| t.join())).await
        };

        let summary = MonitorSummary {
            tasks: finished,
            interrupted,
        };
        info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            interrupted,
            "Wipe run finished"
        );
        Ok(summary)
    }

    fn render(&self, tasks: &[WipeTask], frame: usize, elapsed: Duration) -> String {
        let mut screen = String::new();
        let active = tasks.iter().filter(|t| !t.state.is_terminal()).count();

        let _ = writeln!(
            screen,
            "{}  Active: {}/{}  Elapsed: {}",
            CAT_FRAMES[frame % CAT_FRAMES.len()],
            active,
            tasks.len(),
            format_duration(elapsed.as_secs())
        );

        for task in tasks {
            let _ = writeln!(screen, "{}", self.task_line(task, frame));
        }

        screen
    }

    fn task_line(&self, task: &WipeTask, frame: usize) -> String {
        let pass = if task.current_pass == 0 {
            "-".to_string()
        } else {
            format!("{}/{}", task.current_pass, DoDWipe::PASS_COUNT)
        };

        let progress = match task.progress_percent() {
            Some(pct) => format!("{} {:5.1}%", bar(pct, self.bar_width), pct),
            None if task.state == TaskState::Running => format!(
                "{} working...{}",
                human_bytes(task.pass_bytes as f64),
                PAW_FRAMES[frame % PAW_FRAMES.len()]
            ),
            None => String::new(),
        };

        let mut line = format!(
            "  {:<14} {:<9} pass {:<4} {}  {}",
            task.device.path,
            task.state.label(),
            pass,
            progress,
            format_duration(task.elapsed().as_secs())
        );
        if let Some(error) = &task.error {
            let _ = write!(line, "  {}", error);
        }
        line
    }
}

/// Final state of every task after the monitor returns
#[derive(Debug, Clone)]
pub struct MonitorSummary {
    pub tasks: Vec<WipeTask>,
    pub interrupted: bool,
}

impl MonitorSummary {
    pub fn succeeded(&self) -> usize {
        self.count(TaskState::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(TaskState::Failed)
    }

    /// Tasks still pending or running when the monitor gave up on them
    pub fn unfinished(&self) -> usize {
        self.tasks.len() - self.succeeded() - self.failed()
    }

    fn count(&self, state: TaskState) -> usize {
        self.tasks.iter().filter(|t| t.state == state).count()
    }

    /// Summary table: device, final state, duration and report path
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\n=== Wipe Summary ===");
        let _ = writeln!(
            out,
            "{:<16} {:<10} {:>9}  {}",
            "Device", "Result", "Duration", "Report"
        );
        let _ = writeln!(out, "{}", "-".repeat(80));

        for task in &self.tasks {
            let report = task
                .log_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "{:<16} {:<10} {:>9}  {}",
                task.device.path,
                task.state.label(),
                format_duration(task.elapsed().as_secs()),
                report
            );
        }

        let failures: Vec<&WipeTask> = self.tasks.iter().filter(|t| t.error.is_some()).collect();
        if !failures.is_empty() {
            let _ = writeln!(out, "\nErrors:");
            for task in failures {
                let _ = writeln!(
                    out,
                    "  {}: {}",
                    task.device.path,
                    task.error.as_deref().unwrap_or_default()
                );
            }
        }

        let _ = writeln!(
            out,
            "\n{} succeeded, {} failed, {} unfinished",
            self.succeeded(),
            self.failed(),
            self.unfinished()
        );
        out
    }
}

async fn wait_for_interrupt() {
    while !crate::is_interrupted() {
        tokio::time::sleep(ProgressMonitor::INTERRUPT_POLL).await;
    }
}

/// Bar of `width` slots, filled proportionally to `progress` (0.0..=100.0)
pub(crate) fn bar(progress: f64, width: usize) -> String {
    let pct = if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 100.0)
    };

    let filled = ((pct / 100.0) * width as f64).round() as usize;
    let empty = width.saturating_sub(filled);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}

/// Convert bytes (or bytes/sec) to readable string
pub(crate) fn human_bytes(bps: f64) -> String {
    let units = ["B", "KB", "MB", "GB", "TB"];
    if bps <= 0.0 {
        return "0B".to_string();
    }
    let mut val = bps;
    let mut i = 0usize;
    while val >= 1024.0 && i + 1 < units.len() {
        val /= 1024.0;
        i += 1;
    }
    format!("{:.2}{}", val, units[i])
}

/// Format seconds to H:MM:SS or M:SS
pub(crate) fn format_duration(secs: u64) -> String {
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}
