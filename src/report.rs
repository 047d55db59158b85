// Per-device wipe report
//
// Plain text, written only by the task that owns the device. The header goes
// out at creation, one line per pass as it ends, status and duration last.

use crate::algorithms::DoDWipe;
use crate::ui::progress::human_bytes;
use crate::{Device, WipeResult};
use chrono::{DateTime, Local};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub const TRANSCRIPT_MARKER: &str = "--- pass transcript ---";

pub struct WipeReport {
    path: PathBuf,
    file: File,
    started: Instant,
}

impl WipeReport {
    /// `wipe_<device-name>_<YYYYmmdd_HHMMSS>.txt`
    pub fn file_name(device_name: &str, at: DateTime<Local>) -> String {
        format!("wipe_{}_{}.txt", device_name, at.format("%Y%m%d_%H%M%S"))
    }

    /// Create the report file and write its header
    pub fn create(report_dir: &Path, device: &Device) -> WipeResult<Self> {
        fs::create_dir_all(report_dir)?;

        let now = Local::now();
        let path = report_dir.join(Self::file_name(device.name(), now));
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;

        writeln!(file, "Date: {}", now.format("%Y-%m-%d %H:%M:%S %z"))?;
        writeln!(file, "Device: {}", device.path)?;
        writeln!(file, "Model: {}", device.display_model())?;
        writeln!(
            file,
            "Size: {} ({} bytes)",
            human_bytes(device.size_bytes as f64),
            device.size_bytes
        )?;
        writeln!(file, "Standard: {}", DoDWipe::STANDARD)?;

        Ok(Self {
            path,
            file,
            started: Instant::now(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Non-fatal problems noted before the transcript starts
    pub fn record_warning(&mut self, message: &str) -> WipeResult<()> {
        writeln!(self.file, "Warning: {}", message)?;
        Ok(())
    }

    pub fn begin_transcript(&mut self) -> WipeResult<()> {
        writeln!(self.file, "{}", TRANSCRIPT_MARKER)?;
        Ok(())
    }

    /// One line per finished or failed pass
    pub fn record_pass(
        &mut self,
        pass: usize,
        start: DateTime<Local>,
        end: DateTime<Local>,
        failure: Option<&str>,
    ) -> WipeResult<()> {
        let elapsed = (end - start).to_std().unwrap_or_default();
        let mut line = format!(
            "{} start={} end={} duration={:.1}s",
            DoDWipe::pass_label(pass),
            start.format("%H:%M:%S"),
            end.format("%H:%M:%S"),
            elapsed.as_secs_f64()
        );
        if let Some(reason) = failure {
            line.push_str(&format!(" FAILED: {}", reason));
        }

        writeln!(self.file, "{}", line)?;
        Ok(())
    }

    /// Write the final status and duration, returning the report path
    pub fn finish(mut self, success: bool) -> WipeResult<PathBuf> {
        let status = if success { "SUCCESS" } else { "FAILED" };
        writeln!(self.file, "Final Status: {}", status)?;
        writeln!(self.file, "Duration: {}", format_seconds(self.started.elapsed()))?;
        self.file.sync_all()?;
        Ok(self.path)
    }
}

fn format_seconds(duration: Duration) -> String {
    format!("{:.2}", duration.as_secs_f64())
}
