// Allow uppercase acronyms for industry-standard terms like USB, SATA, NVMe
#![allow(clippy::upper_case_acronyms)]

pub mod algorithms;
pub mod confirmation;
pub mod drives;
pub mod logging;
pub mod report;
pub mod safety;
pub mod selection;
pub mod settings;
pub mod ui;
pub mod wipe_orchestrator;

// Re-export the main pipeline types for convenience
pub use confirmation::ConfirmationGate;
pub use drives::{DeviceInventory, InventorySnapshot};
pub use safety::{HostFacts, SafetyAssessment, SafetyClassifier, SafetyLevel, SafetyReason};
pub use selection::{ClassifiedDevice, SelectionCommand, SelectionSession, SelectionSet};
pub use settings::Settings;
pub use ui::progress::{MonitorSummary, ProgressMonitor};
pub use wipe_orchestrator::{TaskState, WipeOrchestrator, WipeTask, WipeTaskHandle};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

// Global flag for handling Ctrl+C interrupts
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

// Set while wipe tasks are running; the signal handler only defers to the
// progress monitor during that window.
static WIPE_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Set the interrupt flag (called by signal handler)
pub fn set_interrupted() {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Check if an interrupt has been received
pub fn is_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Reset the interrupt flag (primarily for testing)
pub fn reset_interrupted() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}

pub fn set_wipe_active(active: bool) {
    WIPE_ACTIVE.store(active, Ordering::SeqCst);
}

pub fn is_wipe_active() -> bool {
    WIPE_ACTIVE.load(Ordering::SeqCst)
}

#[derive(Error, Debug)]
pub enum WipeError {
    #[error("Device enumeration failed: {0}")]
    Enumeration(String),

    #[error("Device query timed out after {}s: {path}", timeout.as_secs())]
    DeviceQueryTimeout { path: String, timeout: Duration },

    #[error("Device query failed for {path}: {reason}")]
    DeviceQuery { path: String, reason: String },

    #[error("Invalid selection: {0}")]
    InvalidSelectionInput(String),

    #[error("Failed to unmount {target}: {reason}")]
    UnmountFailure { target: String, reason: String },

    #[error("Pass {pass}/{total} failed on {device}: {reason}")]
    WipePassFailure {
        device: String,
        pass: usize,
        total: usize,
        reason: String,
    },

    #[error("Confirmation phrase did not match")]
    ConfirmationMismatch,

    #[error("Required tool not found in PATH: {0}")]
    MissingTool(String),

    #[error("No block devices found")]
    NoDevices,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation interrupted by user")]
    Interrupted,
}

impl WipeError {
    /// Errors that terminate the whole program rather than one device or one prompt.
    pub fn is_global(&self) -> bool {
        matches!(self, WipeError::NoDevices | WipeError::MissingTool(_))
    }
}

impl From<config::ConfigError> for WipeError {
    fn from(err: config::ConfigError) -> Self {
        WipeError::Config(err.to_string())
    }
}

pub type WipeResult<T> = Result<T, WipeError>;

/// Host-reported transport of a block device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BusType {
    USB,
    SATA,
    NVMe,
    SCSI,
    Unknown,
}

impl BusType {
    /// Map an lsblk `TRAN` value onto a bus type
    pub fn from_transport(transport: &str) -> Self {
        match transport.trim().to_ascii_lowercase().as_str() {
            "usb" => BusType::USB,
            "sata" | "ata" => BusType::SATA,
            "nvme" => BusType::NVMe,
            "scsi" | "sas" | "spi" | "fc" | "iscsi" => BusType::SCSI,
            _ => BusType::Unknown,
        }
    }
}

impl fmt::Display for BusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusType::USB => write!(f, "USB"),
            BusType::SATA => write!(f, "SATA"),
            BusType::NVMe => write!(f, "NVMe"),
            BusType::SCSI => write!(f, "SCSI"),
            BusType::Unknown => write!(f, "Unknown"),
        }
    }
}

pub const UNKNOWN_FIELD: &str = "Unknown";

/// Immutable snapshot of one block device taken at scan time.
///
/// `mount_points` covers the device itself and every partition below it,
/// in the order lsblk reported them. A re-scan produces new values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub path: String,
    pub vendor_name: String,
    pub model_name: String,
    pub serial: String,
    pub size_bytes: u64,
    pub bus_type: BusType,
    pub mount_points: Vec<String>,
    /// `None` when the OS did not (or could not in time) report removability
    pub removable: Option<bool>,
    pub partitions: Vec<String>,
}

impl Device {
    /// Device with every queried attribute set to `Unknown`
    pub fn placeholder(path: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            vendor_name: UNKNOWN_FIELD.to_string(),
            model_name: UNKNOWN_FIELD.to_string(),
            serial: UNKNOWN_FIELD.to_string(),
            size_bytes,
            bus_type: BusType::Unknown,
            mount_points: Vec::new(),
            removable: None,
            partitions: Vec::new(),
        }
    }

    /// Kernel name of the device, e.g. `sda` for `/dev/sda`
    pub fn name(&self) -> &str {
        Path::new(&self.path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.path)
    }

    /// Vendor and model joined for display, skipping unknown parts
    pub fn display_model(&self) -> String {
        let parts: Vec<&str> = [self.vendor_name.as_str(), self.model_name.as_str()]
            .into_iter()
            .map(str::trim)
            .filter(|p| !p.is_empty() && *p != UNKNOWN_FIELD)
            .collect();

        if parts.is_empty() {
            UNKNOWN_FIELD.to_string()
        } else {
            parts.join(" ")
        }
    }

    pub fn is_mounted(&self) -> bool {
        !self.mount_points.is_empty()
    }
}
