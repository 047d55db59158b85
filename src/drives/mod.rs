// Drive discovery
//
// Organized structure:
// - detection.rs: DeviceInventory plus the lsblk-backed enumerator and attribute query
// - mounts.rs: /proc/mounts and /proc/swaps parsing

pub mod detection;
pub mod mounts;

#[cfg(test)]
mod detection_tests;

pub use detection::{
    AttributeQuery, BlockEntry, BlockEnumerator, DeviceAttributes, DeviceInventory,
    InventorySnapshot, LsblkAttributeQuery, LsblkEnumerator,
};
pub use mounts::{MountEntry, MountTable, MountTableReader, ProcMountTable};
