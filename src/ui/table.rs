use super::progress::human_bytes;
use crate::safety::SafetyLevel;
use crate::selection::ClassifiedDevice;
use std::fmt::Write;

#[cfg(feature = "color-output")]
use colored::Colorize;

/// Level label padded to `width`, coloured by severity
pub fn level_label(level: SafetyLevel, width: usize) -> String {
    let padded = format!("{:<width$}", level.label(), width = width);

    #[cfg(feature = "color-output")]
    {
        match level {
            SafetyLevel::Safe => padded.green().bold().to_string(),
            SafetyLevel::Caution => padded.yellow().bold().to_string(),
            SafetyLevel::Dangerous => padded.red().bold().to_string(),
            SafetyLevel::System => padded.on_red().white().bold().to_string(),
        }
    }

    #[cfg(not(feature = "color-output"))]
    {
        padded
    }
}

/// Numbered device table as shown by the selection session and `--list`
pub fn render_device_table(devices: &[ClassifiedDevice]) -> String {
    let mut out = String::new();

    if devices.is_empty() {
        let _ = writeln!(out, "No block devices found. Use 'refresh' to scan again.");
        return out;
    }

    let _ = writeln!(
        out,
        "{:>3}  {:<16} {:>10} {:<7} {:<24} {:<10} {}",
        "#", "Device", "Size", "Bus", "Model", "Level", "Reasons"
    );
    let _ = writeln!(out, "{}", "-".repeat(100));

    for (i, entry) in devices.iter().enumerate() {
        let device = &entry.device;
        let reasons = if entry.assessment.reasons.is_empty() {
            "-".to_string()
        } else {
            entry.assessment.reason_summary()
        };

        let _ = writeln!(
            out,
            "{:>3}  {:<16} {:>10} {:<7} {:<24} {} {}",
            i + 1,
            device.path,
            human_bytes(device.size_bytes as f64),
            device.bus_type.to_string(),
            truncate_string(&device.display_model(), 24),
            level_label(entry.level(), 10),
            reasons
        );
    }

    out
}

pub(crate) fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
