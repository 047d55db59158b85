// Host mount table and active swap areas
//
// Parsed from /proc/mounts and /proc/swaps. The classifier only ever sees the
// parsed `MountTable`, never the files, so tests can feed literal text.

use crate::safety::SafetyClassifier;
use crate::{Device, WipeResult};
use std::fs;
use std::path::PathBuf;

/// Pseudo mount point lsblk reports for an active swap partition
pub const SWAP_MOUNT: &str = "[SWAP]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub source: String,
    pub target: String,
    pub fstype: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountTable {
    entries: Vec<MountEntry>,
    swaps: Vec<String>,
}

impl MountTable {
    pub fn new(entries: Vec<MountEntry>, swaps: Vec<String>) -> Self {
        Self { entries, swaps }
    }

    /// Parse the text of /proc/mounts and /proc/swaps
    pub fn parse(mounts: &str, swaps: &str) -> Self {
        let entries = mounts
            .lines()
            .filter_map(|line| {
                let mut parts = line.split_whitespace();
                let source = parts.next()?;
                let target = parts.next()?;
                let fstype = parts.next().unwrap_or_default();
                Some(MountEntry {
                    source: decode_octal_escapes(source),
                    target: decode_octal_escapes(target),
                    fstype: fstype.to_string(),
                })
            })
            .collect();

        // First line of /proc/swaps is the column header
        let swaps = swaps
            .lines()
            .skip(1)
            .filter_map(|line| line.split_whitespace().next())
            .map(decode_octal_escapes)
            .collect();

        Self { entries, swaps }
    }

    pub fn entries(&self) -> &[MountEntry] {
        &self.entries
    }

    pub fn swaps(&self) -> &[String] {
        &self.swaps
    }

    pub fn is_swap(&self, source: &str) -> bool {
        self.swaps.iter().any(|s| s == source)
    }

    /// Append mounts of `device` or its partitions that the device does not
    /// list yet. An active swap area on it adds the `[SWAP]` marker and its
    /// source joins the partitions so it can be swapped off.
    pub fn merge_into(&self, device: &mut Device) {
        for entry in &self.entries {
            if SafetyClassifier::belongs_to(&entry.source, device)
                && !device.mount_points.contains(&entry.target)
            {
                device.mount_points.push(entry.target.clone());
            }
        }

        let mut has_swap = false;
        for swap in &self.swaps {
            if !SafetyClassifier::belongs_to(swap, device) {
                continue;
            }
            has_swap = true;
            if *swap != device.path && !device.partitions.contains(swap) {
                device.partitions.push(swap.clone());
            }
        }
        if has_swap && !device.mount_points.iter().any(|m| m == SWAP_MOUNT) {
            device.mount_points.push(SWAP_MOUNT.to_string());
        }
    }
}

/// /proc/mounts encodes space, tab, newline and backslash as `\ooo`
pub(crate) fn decode_octal_escapes(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            // Leading digit capped at 3 keeps the value within a byte
            if (b'0'..=b'3').contains(&digits[0])
                && digits[1..].iter().all(|b| (b'0'..=b'7').contains(b))
            {
                let value = digits.iter().fold(0u8, |acc, d| acc * 8 + (d - b'0'));
                out.push(value);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

pub trait MountTableReader: Send + Sync {
    fn read(&self) -> WipeResult<MountTable>;
}

/// Reads the live mount table from procfs
pub struct ProcMountTable {
    mounts_path: PathBuf,
    swaps_path: PathBuf,
}

impl ProcMountTable {
    pub fn new() -> Self {
        Self {
            mounts_path: PathBuf::from("/proc/mounts"),
            swaps_path: PathBuf::from("/proc/swaps"),
        }
    }

    pub fn with_paths(mounts_path: impl Into<PathBuf>, swaps_path: impl Into<PathBuf>) -> Self {
        Self {
            mounts_path: mounts_path.into(),
            swaps_path: swaps_path.into(),
        }
    }
}

impl Default for ProcMountTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MountTableReader for ProcMountTable {
    fn read(&self) -> WipeResult<MountTable> {
        let mounts = fs::read_to_string(&self.mounts_path)?;
        // Kernels built without swap support have no /proc/swaps
        let swaps = fs::read_to_string(&self.swaps_path).unwrap_or_default();
        Ok(MountTable::parse(&mounts, &swaps))
    }
}
