// Wipe Orchestrator - fans out one independent wipe task per selected device
//
// Each task unmounts its device (best effort), then runs the DoD pass
// sequence strictly in order. Tasks share nothing but the terminal; a
// failure in one never touches another.

mod task;

pub use task::{TaskState, WipeTask, WipeTaskHandle};

use crate::algorithms::{BlockOverwriter, DoDWipe, Overwriter};
use crate::drives::mounts::{MountTableReader, ProcMountTable, SWAP_MOUNT};
use crate::report::WipeReport;
use crate::selection::SelectionSet;
use crate::settings::Settings;
use crate::{Device, WipeError, WipeResult};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Unmount primitive; failures are reported but never stop a wipe
#[cfg_attr(test, mockall::automock)]
pub trait Unmounter: Send + Sync {
    fn unmount(&self, target: &str) -> WipeResult<()>;

    /// Deactivate `source` if it is an active swap area
    fn swapoff(&self, source: &str) -> WipeResult<()>;
}

/// Unmounts with `umount` and `swapoff`
pub struct CommandUnmounter {
    mounts: Box<dyn MountTableReader>,
}

impl CommandUnmounter {
    pub fn new() -> Self {
        Self::with_mount_table(Box::new(ProcMountTable::new()))
    }

    pub fn with_mount_table(mounts: Box<dyn MountTableReader>) -> Self {
        Self { mounts }
    }

    fn run(program: &str, arg: &str) -> WipeResult<()> {
        let output = Command::new(program)
            .arg(arg)
            .output()
            .map_err(|e| WipeError::UnmountFailure {
                target: arg.to_string(),
                reason: format!("{}: {}", program, e),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(WipeError::UnmountFailure {
                target: arg.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

impl Default for CommandUnmounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Unmounter for CommandUnmounter {
    fn unmount(&self, target: &str) -> WipeResult<()> {
        Self::run("umount", target)
    }

    fn swapoff(&self, source: &str) -> WipeResult<()> {
        if !self.mounts.read()?.is_swap(source) {
            return Ok(());
        }
        Self::run("swapoff", source)
    }
}

/// One step of the pre-wipe unmount plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnmountStep {
    Swapoff(String),
    Unmount(String),
}

/// Swap areas first, then mount targets deepest first so nested mounts
/// come off before their parents.
pub fn unmount_plan(device: &Device) -> Vec<UnmountStep> {
    let mut steps = Vec::new();

    if device.mount_points.iter().any(|m| m == SWAP_MOUNT) {
        for source in device.partitions.iter().chain(std::iter::once(&device.path)) {
            steps.push(UnmountStep::Swapoff(source.clone()));
        }
    }

    let mut targets: Vec<&String> = device
        .mount_points
        .iter()
        .filter(|m| m.as_str() != SWAP_MOUNT)
        .collect();
    targets.sort_by_key(|t| std::cmp::Reverse(Path::new(t.as_str()).components().count()));
    steps.extend(targets.into_iter().map(|t| UnmountStep::Unmount(t.clone())));

    steps
}

pub struct WipeOrchestrator {
    unmounter: Arc<dyn Unmounter>,
    overwriter: Arc<dyn Overwriter>,
    mounts: Option<Arc<dyn MountTableReader>>,
    report_dir: PathBuf,
    stagger: Duration,
    run_id: Uuid,
}

impl WipeOrchestrator {
    pub const MAX_STAGGER: Duration = Duration::from_secs(Settings::MAX_STAGGER_SECS);
    const CANCEL_POLL: Duration = Duration::from_millis(100);

    pub fn new(
        unmounter: Arc<dyn Unmounter>,
        overwriter: Arc<dyn Overwriter>,
        report_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            unmounter,
            overwriter,
            mounts: None,
            report_dir: report_dir.into(),
            stagger: Duration::ZERO,
            run_id: Uuid::new_v4(),
        }
    }

    /// Orchestrator writing to real block devices
    pub fn system(settings: &Settings) -> Self {
        Self::new(
            Arc::new(CommandUnmounter::new()),
            Arc::new(BlockOverwriter::new(settings.chunk_size_bytes())),
            settings.report_dir.clone(),
        )
        .with_mount_table(Arc::new(ProcMountTable::new()))
        .with_stagger(settings.stagger_delay())
    }

    /// Mount table re-read by each task just before it unmounts, so mounts
    /// made after the scan are taken off too
    pub fn with_mount_table(mut self, mounts: Arc<dyn MountTableReader>) -> Self {
        self.mounts = Some(mounts);
        self
    }

    /// Delay between consecutive task launches, clamped to 30s
    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger.min(Self::MAX_STAGGER);
        self
    }

    pub fn stagger(&self) -> Duration {
        self.stagger
    }

    /// Tags every log line of this run's tasks
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Start one task per selected device. Must be called from within a
    /// tokio runtime; returns immediately.
    pub fn launch(&self, selection: &SelectionSet) -> Vec<WipeTaskHandle> {
        info!(
            run_id = %self.run_id,
            devices = selection.len(),
            stagger_secs = self.stagger.as_secs(),
            "Launching wipe tasks"
        );

        selection
            .devices()
            .iter()
            .enumerate()
            .map(|(i, entry)| self.spawn_task(entry.device.clone(), self.stagger * i as u32))
            .collect()
    }

    fn spawn_task(&self, device: Device, delay: Duration) -> WipeTaskHandle {
        let path = device.path.clone();
        let (sender, receiver) = watch::channel(WipeTask::pending(device.clone()));
        let cancel = Arc::new(AtomicBool::new(false));

        let job = DeviceJob {
            device,
            unmounter: Arc::clone(&self.unmounter),
            overwriter: Arc::clone(&self.overwriter),
            mounts: self.mounts.clone(),
            report_dir: self.report_dir.clone(),
            cancel: Arc::clone(&cancel),
            state: Arc::new(sender),
        };

        let span = info_span!("wipe_task", run_id = %self.run_id, device = %path);
        let blocking_span = span.clone();

        let join = tokio::spawn(
            async move {
                if !wait_stagger(delay, &job.cancel).await {
                    job.fail("cancelled before start".to_string());
                    return;
                }

                let state = Arc::clone(&job.state);
                let device = job.device.path.clone();
                let work = tokio::task::spawn_blocking(move || {
                    let _entered = blocking_span.enter();
                    job.run()
                });
                if let Err(join_error) = work.await {
                    error!(device = %device, error = %join_error, "Wipe task aborted");
                    state.send_modify(|t| {
                        t.state = TaskState::Failed;
                        t.finished_at = Some(Local::now());
                        t.error = Some(format!("wipe task aborted: {}", join_error));
                    });
                }
            }
            .instrument(span),
        );

        WipeTaskHandle::new(path, receiver, cancel, join)
    }
}

/// Sleep out the launch offset; false if cancelled meanwhile
async fn wait_stagger(delay: Duration, cancel: &AtomicBool) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        if cancel.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        tokio::time::sleep((deadline - now).min(WipeOrchestrator::CANCEL_POLL)).await;
    }
}

/// Everything one task needs, moved onto a blocking thread
struct DeviceJob {
    device: Device,
    unmounter: Arc<dyn Unmounter>,
    overwriter: Arc<dyn Overwriter>,
    mounts: Option<Arc<dyn MountTableReader>>,
    report_dir: PathBuf,
    cancel: Arc<AtomicBool>,
    state: Arc<watch::Sender<WipeTask>>,
}

impl DeviceJob {
    fn run(self) {
        self.state.send_modify(|t| {
            t.state = TaskState::Running;
            t.started_at = Some(Local::now());
        });
        info!(device = %self.device.path, "Wipe task started");

        // No report, no wipe
        let mut report = match WipeReport::create(&self.report_dir, &self.device) {
            Ok(report) => report,
            Err(e) => {
                self.fail(format!("cannot create report file: {}", e));
                return;
            }
        };
        let log_path = report.path().to_path_buf();
        self.state.send_modify(|t| t.log_path = Some(log_path));

        for warning in self.unmount_all() {
            if let Err(e) = report.record_warning(&warning) {
                warn!(device = %self.device.path, error = %e, "Report write failed");
            }
            self.state.send_modify(|t| t.warnings.push(warning));
        }

        if let Err(e) = report.begin_transcript() {
            warn!(device = %self.device.path, error = %e, "Report write failed");
        }

        let outcome = self.run_passes(&mut report);
        let success = outcome.is_ok();
        if let Err(e) = report.finish(success) {
            warn!(device = %self.device.path, error = %e, "Report write failed");
        }

        match outcome {
            Ok(()) => {
                info!(device = %self.device.path, "Wipe task succeeded");
                self.state.send_modify(|t| {
                    t.state = TaskState::Succeeded;
                    t.finished_at = Some(Local::now());
                });
            }
            Err(e) => self.fail(e.to_string()),
        }
    }

    /// Best-effort unmount; returns one warning per failed step
    fn unmount_all(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let mut device = self.device.clone();
        if let Some(mounts) = &self.mounts {
            match mounts.read() {
                Ok(table) => table.merge_into(&mut device),
                Err(e) => warn!(
                    device = %self.device.path,
                    error = %e,
                    "Mount table unavailable, unmounting scanned mount points only"
                ),
            }
        }

        for step in unmount_plan(&device) {
            let result = match &step {
                UnmountStep::Swapoff(source) => self.unmounter.swapoff(source),
                UnmountStep::Unmount(target) => self.unmounter.unmount(target),
            };

            if let Err(e) = result {
                warn!(device = %self.device.path, error = %e, "Unmount failed, wiping anyway");
                warnings.push(e.to_string());
            }
        }

        warnings
    }

    fn run_passes(&self, report: &mut WipeReport) -> WipeResult<()> {
        let total = DoDWipe::PASS_COUNT;

        for (i, pattern) in DoDWipe::PASSES.iter().enumerate() {
            let pass = i + 1;
            self.state.send_modify(|t| {
                t.current_pass = pass;
                t.pass_bytes = 0;
            });

            let start = Local::now();
            let result = self.overwriter.write_pass(
                &self.device.path,
                self.device.size_bytes,
                *pattern,
                &self.cancel,
                &mut |written| self.state.send_modify(|t| t.pass_bytes = written),
            );
            let end = Local::now();

            let failure = result.err().map(|e| e.to_string());
            if let Err(e) = report.record_pass(pass, start, end, failure.as_deref()) {
                warn!(device = %self.device.path, error = %e, "Report write failed");
            }

            if let Some(reason) = failure {
                return Err(WipeError::WipePassFailure {
                    device: self.device.path.clone(),
                    pass,
                    total,
                    reason,
                });
            }

            info!(device = %self.device.path, pass, total, "Pass complete");
        }

        Ok(())
    }

    fn fail(&self, reason: String) {
        error!(device = %self.device.path, error = %reason, "Wipe task failed");
        self.state.send_modify(|t| {
            t.state = TaskState::Failed;
            t.finished_at = Some(Local::now());
            t.error = Some(reason);
        });
    }
}
