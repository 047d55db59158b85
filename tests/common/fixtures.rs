#![allow(dead_code)]

use wipe_sentinel::drives::{BlockEntry, DeviceAttributes};
use wipe_sentinel::safety::SafetyAssessment;
use wipe_sentinel::selection::{ClassifiedDevice, SelectionSet};
use wipe_sentinel::{BusType, Device};

pub const GIB: u64 = 1024 * 1024 * 1024;

pub fn disk(path: &str, size_bytes: u64) -> BlockEntry {
    BlockEntry {
        path: path.to_string(),
        size_bytes,
        kind: "disk".to_string(),
        ..BlockEntry::default()
    }
}

pub fn partition(path: &str, fstype: &str, mount: Option<&str>) -> BlockEntry {
    BlockEntry {
        path: path.to_string(),
        size_bytes: GIB,
        kind: "part".to_string(),
        fstype: Some(fstype.to_string()),
        mount_points: mount.map(|m| vec![m.to_string()]).unwrap_or_default(),
        ..BlockEntry::default()
    }
}

pub fn usb_attributes(model: &str, serial: &str) -> DeviceAttributes {
    DeviceAttributes {
        vendor: "SanDisk".to_string(),
        model: model.to_string(),
        serial: serial.to_string(),
        bus_type: BusType::USB,
        removable: Some(true),
    }
}

pub fn internal_attributes(model: &str, serial: &str, bus_type: BusType) -> DeviceAttributes {
    DeviceAttributes {
        vendor: "Samsung".to_string(),
        model: model.to_string(),
        serial: serial.to_string(),
        bus_type,
        removable: Some(false),
    }
}

/// Selection of SAFE placeholder devices of the given size
pub fn safe_selection(paths: &[&str], size_bytes: u64) -> SelectionSet {
    paths
        .iter()
        .map(|path| ClassifiedDevice {
            device: Device::placeholder(*path, size_bytes),
            assessment: SafetyAssessment::safe(),
        })
        .collect()
}
