// Interactive device selection
//
// - command.rs: one input line parsed into a typed SelectionCommand
// - session.rs: the ShowList / AwaitInput / Validating state machine
// - this file: classified devices, the selection set and the device source seam

pub mod command;
pub mod session;


pub use command::SelectionCommand;
pub use session::{SelectionSession, SessionOutcome, SessionState};

use crate::drives::DeviceInventory;
use crate::safety::{HostFacts, SafetyAssessment, SafetyClassifier, SafetyLevel};
use crate::{Device, WipeResult};
use tokio::runtime::Handle;
use tracing::warn;

/// A device together with the assessment computed for the current display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedDevice {
    pub device: Device,
    pub assessment: SafetyAssessment,
}

impl ClassifiedDevice {
    pub fn classify(device: Device, facts: &HostFacts) -> Self {
        let assessment = SafetyClassifier::classify(&device, facts);
        Self { device, assessment }
    }

    pub fn level(&self) -> SafetyLevel {
        self.assessment.level
    }

    pub fn path(&self) -> &str {
        &self.device.path
    }
}

/// Ordered, add-only set of devices keyed by path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    entries: Vec<ClassifiedDevice>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device; returns false if its path is already selected
    pub fn insert(&mut self, device: ClassifiedDevice) -> bool {
        if self.contains(device.path()) {
            return false;
        }
        self.entries.push(device);
        true
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.iter().any(|e| e.path() == path)
    }

    pub fn paths(&self) -> Vec<&str> {
        self.entries.iter().map(ClassifiedDevice::path).collect()
    }

    pub fn devices(&self) -> &[ClassifiedDevice] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most severe level across the selection, `None` when empty
    pub fn max_level(&self) -> Option<SafetyLevel> {
        self.entries.iter().map(ClassifiedDevice::level).max()
    }

    /// Keep only selected devices that are still present with the same
    /// serial, taking their fresh snapshot (current mount points) in place of
    /// the one from selection time. Returns the paths that were dropped.
    pub fn retain_present(&mut self, current: &[Device]) -> Vec<String> {
        let mut dropped = Vec::new();
        self.entries.retain_mut(|entry| {
            let fresh = current
                .iter()
                .find(|d| d.path == entry.device.path && d.serial == entry.device.serial);
            match fresh {
                Some(device) => {
                    entry.device = device.clone();
                    true
                }
                None => {
                    dropped.push(entry.device.path.clone());
                    false
                }
            }
        });
        dropped
    }
}

impl FromIterator<ClassifiedDevice> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = ClassifiedDevice>>(iter: I) -> Self {
        let mut set = SelectionSet::new();
        for device in iter {
            set.insert(device);
        }
        set
    }
}

/// Where the session gets its device list from
pub trait DeviceSource {
    /// Full rescan; the previous device list is discarded
    fn scan(&mut self) -> WipeResult<Vec<ClassifiedDevice>>;

    /// Re-run classification for already scanned devices against fresh host facts
    fn reassess(&mut self, devices: &[Device]) -> WipeResult<Vec<ClassifiedDevice>>;
}

/// DeviceSource backed by the real inventory, driven from synchronous code
pub struct InventorySource<'a> {
    inventory: &'a DeviceInventory,
    runtime: Handle,
    facts: HostFacts,
}

impl<'a> InventorySource<'a> {
    pub fn new(inventory: &'a DeviceInventory, runtime: Handle) -> Self {
        Self {
            inventory,
            runtime,
            facts: HostFacts::default(),
        }
    }

    /// Raw device snapshot without classification, used for re-validation
    pub fn current_devices(&self) -> WipeResult<Vec<Device>> {
        self.runtime.block_on(self.inventory.list_devices())
    }
}

impl DeviceSource for InventorySource<'_> {
    fn scan(&mut self) -> WipeResult<Vec<ClassifiedDevice>> {
        let snapshot = self.runtime.block_on(self.inventory.scan())?;
        self.facts = snapshot.facts;

        Ok(snapshot
            .devices
            .into_iter()
            .map(|d| ClassifiedDevice::classify(d, &self.facts))
            .collect())
    }

    fn reassess(&mut self, devices: &[Device]) -> WipeResult<Vec<ClassifiedDevice>> {
        // Mounts change between screens; filesystem signatures come from the last scan
        match self.inventory.read_mount_table() {
            Ok(table) => self.facts.mount_table = table,
            Err(e) => warn!(error = %e, "Mount table unavailable, keeping previous one"),
        }

        Ok(devices
            .iter()
            .cloned()
            .map(|d| ClassifiedDevice::classify(d, &self.facts))
            .collect())
    }
}
