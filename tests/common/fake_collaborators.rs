#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use wipe_sentinel::algorithms::{Overwriter, PassPattern};
use wipe_sentinel::drives::{
    AttributeQuery, BlockEntry, BlockEnumerator, DeviceAttributes, MountTable, MountTableReader,
};
use wipe_sentinel::wipe_orchestrator::Unmounter;
use wipe_sentinel::{WipeError, WipeResult};

/// Enumerator returning a fixed block device tree
pub struct FakeEnumerator {
    pub entries: Vec<BlockEntry>,
}

impl BlockEnumerator for FakeEnumerator {
    fn enumerate(&self) -> WipeResult<Vec<BlockEntry>> {
        Ok(self.entries.clone())
    }
}

/// Attribute query answering from a table; listed paths stall
pub struct FakeAttributes {
    pub answers: HashMap<String, DeviceAttributes>,
    pub stall: Vec<String>,
    pub stall_for: Duration,
}

impl FakeAttributes {
    pub fn new() -> Self {
        Self {
            answers: HashMap::new(),
            stall: Vec::new(),
            stall_for: Duration::from_secs(3),
        }
    }

    pub fn answer(mut self, path: &str, attributes: DeviceAttributes) -> Self {
        self.answers.insert(path.to_string(), attributes);
        self
    }

    pub fn stall_on(mut self, path: &str) -> Self {
        self.stall.push(path.to_string());
        self
    }
}

impl AttributeQuery for FakeAttributes {
    fn query(&self, path: &str) -> WipeResult<DeviceAttributes> {
        if self.stall.iter().any(|p| p == path) {
            std::thread::sleep(self.stall_for);
        }
        self.answers
            .get(path)
            .cloned()
            .ok_or_else(|| WipeError::DeviceQuery {
                path: path.to_string(),
                reason: "no such device".to_string(),
            })
    }
}

/// Mount table built from literal /proc text
pub struct FakeMounts {
    pub mounts: String,
    pub swaps: String,
}

impl FakeMounts {
    pub fn new(mounts: &str, swaps: &str) -> Self {
        Self {
            mounts: mounts.to_string(),
            swaps: swaps.to_string(),
        }
    }

    pub fn empty() -> Self {
        Self::new("", "Filename Type Size Used Priority\n")
    }
}

impl MountTableReader for FakeMounts {
    fn read(&self) -> WipeResult<MountTable> {
        Ok(MountTable::parse(&self.mounts, &self.swaps))
    }
}

/// Records every unmount and swapoff request, always succeeds
#[derive(Default)]
pub struct RecordingUnmounter {
    pub calls: Mutex<Vec<String>>,
}

impl Unmounter for RecordingUnmounter {
    fn unmount(&self, target: &str) -> WipeResult<()> {
        self.calls.lock().unwrap().push(format!("umount {}", target));
        Ok(())
    }

    fn swapoff(&self, source: &str) -> WipeResult<()> {
        self.calls.lock().unwrap().push(format!("swapoff {}", source));
        Ok(())
    }
}

/// Pretends to write each pass in a few paced chunks; can fail one device
/// at a given 1-based pass
pub struct ScriptedOverwriter {
    pub fail_device: Option<(String, usize)>,
    pub pace: Duration,
    pub passes: Mutex<Vec<(String, PassPattern)>>,
}

impl ScriptedOverwriter {
    pub fn new() -> Self {
        Self {
            fail_device: None,
            pace: Duration::from_millis(5),
            passes: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(device: &str, pass: usize) -> Self {
        Self {
            fail_device: Some((device.to_string(), pass)),
            ..Self::new()
        }
    }

    pub fn passes_for(&self, device: &str) -> Vec<PassPattern> {
        self.passes
            .lock()
            .unwrap()
            .iter()
            .filter(|(d, _)| d == device)
            .map(|(_, p)| *p)
            .collect()
    }
}

impl Overwriter for ScriptedOverwriter {
    fn write_pass(
        &self,
        device: &str,
        size_bytes: u64,
        pattern: PassPattern,
        cancel: &AtomicBool,
        progress: &mut dyn FnMut(u64),
    ) -> WipeResult<u64> {
        let pass = {
            let mut passes = self.passes.lock().unwrap();
            passes.push((device.to_string(), pattern));
            passes.iter().filter(|(d, _)| d == device).count()
        };

        for step in 1..=4u64 {
            if cancel.load(Ordering::SeqCst) {
                return Err(WipeError::Interrupted);
            }
            std::thread::sleep(self.pace);
            progress(size_bytes * step / 4);
        }

        if let Some((failing, failing_pass)) = &self.fail_device {
            if failing == device && *failing_pass == pass {
                return Err(WipeError::Io(io::Error::other("write error at sector 2048")));
            }
        }

        Ok(size_bytes)
    }
}
