// Safety classification of block devices
//
// - classifier.rs: the rule set turning a Device plus HostFacts into an assessment
// - this file: levels, tagged reasons and the host facts the rules read

pub mod classifier;


pub use classifier::SafetyClassifier;

use crate::drives::mounts::MountTable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Ordered by increasing restrictiveness
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SafetyLevel {
    Safe,
    Caution,
    Dangerous,
    System,
}

impl SafetyLevel {
    pub fn label(&self) -> &'static str {
        match self {
            SafetyLevel::Safe => "SAFE",
            SafetyLevel::Caution => "CAUTION",
            SafetyLevel::Dangerous => "DANGEROUS",
            SafetyLevel::System => "SYSTEM",
        }
    }
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One fired classification rule. Each variant maps to exactly one level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SafetyReason {
    /// Device or a partition is mounted at a root-or-critical path
    SystemMountPoint(String),
    /// Device or a partition is an active swap area
    ActiveSwap(String),

    NonRemovableInternal,
    VirtualDevice,
    TooSmall(u64),
    LinuxFilesystemNotRemovable(String),
    VolumeManagerMember(String),
    InstallationMedia(String),
    FirstSystemDisk,

    MountedElsewhere(String),
    LargeCapacityUnclearRemovability,
    RemovabilityUnknown,
}

impl SafetyReason {
    pub fn level(&self) -> SafetyLevel {
        match self {
            SafetyReason::SystemMountPoint(_) | SafetyReason::ActiveSwap(_) => SafetyLevel::System,
            SafetyReason::NonRemovableInternal
            | SafetyReason::VirtualDevice
            | SafetyReason::TooSmall(_)
            | SafetyReason::LinuxFilesystemNotRemovable(_)
            | SafetyReason::VolumeManagerMember(_)
            | SafetyReason::InstallationMedia(_)
            | SafetyReason::FirstSystemDisk => SafetyLevel::Dangerous,
            SafetyReason::MountedElsewhere(_)
            | SafetyReason::LargeCapacityUnclearRemovability
            | SafetyReason::RemovabilityUnknown => SafetyLevel::Caution,
        }
    }
}

impl fmt::Display for SafetyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SafetyReason::SystemMountPoint(path) => write!(f, "system mount point ({})", path),
            SafetyReason::ActiveSwap(source) => write!(f, "active swap ({})", source),
            SafetyReason::NonRemovableInternal => write!(f, "internal non-removable device"),
            SafetyReason::VirtualDevice => write!(f, "virtual or loopback device"),
            SafetyReason::TooSmall(bytes) => {
                write!(f, "too small ({} bytes, under 100 MiB)", bytes)
            }
            SafetyReason::LinuxFilesystemNotRemovable(fstype) => {
                write!(f, "Linux filesystem ({}) on non-removable device", fstype)
            }
            SafetyReason::VolumeManagerMember(fstype) => {
                write!(f, "LVM/RAID metadata ({})", fstype)
            }
            SafetyReason::InstallationMedia(label) => {
                write!(f, "installation media label ({})", label)
            }
            SafetyReason::FirstSystemDisk => write!(f, "first system disk"),
            SafetyReason::MountedElsewhere(path) => write!(f, "mounted at {}", path),
            SafetyReason::LargeCapacityUnclearRemovability => {
                write!(f, "large capacity with unclear removability")
            }
            SafetyReason::RemovabilityUnknown => write!(f, "removability unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyAssessment {
    pub level: SafetyLevel,
    /// Every fired rule, in evaluation order, without duplicates
    pub reasons: Vec<SafetyReason>,
}

impl SafetyAssessment {
    pub fn safe() -> Self {
        Self {
            level: SafetyLevel::Safe,
            reasons: Vec::new(),
        }
    }

    pub fn from_reasons(reasons: Vec<SafetyReason>) -> Self {
        let level = reasons
            .iter()
            .map(SafetyReason::level)
            .max()
            .unwrap_or(SafetyLevel::Safe);
        Self { level, reasons }
    }

    pub fn is_safe(&self) -> bool {
        self.level == SafetyLevel::Safe
    }

    pub fn reason_summary(&self) -> String {
        self.reasons
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// On-disk signature of one block path (whole device or partition)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FsSignature {
    pub fstype: Option<String>,
    pub label: Option<String>,
}

/// Host-wide facts the classifier reads besides the Device itself
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostFacts {
    pub mount_table: MountTable,
    signatures: BTreeMap<String, FsSignature>,
}

impl HostFacts {
    pub fn new(mount_table: MountTable) -> Self {
        Self {
            mount_table,
            signatures: BTreeMap::new(),
        }
    }

    pub fn with_signature(mut self, path: impl Into<String>, signature: FsSignature) -> Self {
        self.insert_signature(path, signature);
        self
    }

    pub fn insert_signature(&mut self, path: impl Into<String>, signature: FsSignature) {
        self.signatures.insert(path.into(), signature);
    }

    pub fn signature(&self, path: &str) -> Option<&FsSignature> {
        self.signatures.get(path)
    }
}
