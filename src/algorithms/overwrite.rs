// Byte-level overwrite primitive
//
// One call writes one full pass over the device from offset 0. The
// orchestrator owns pass ordering; this layer only knows how to fill a
// device once with a given pattern.

use super::dod::PassPattern;
use crate::{WipeError, WipeResult};
use rand::RngCore;
use std::fs::OpenOptions;
use std::io::{self, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

pub trait Overwriter: Send + Sync {
    /// Overwrite `size_bytes` of `device` with `pattern`, reporting the bytes
    /// written so far in this pass after every chunk. Stops with
    /// `WipeError::Interrupted` once `cancel` is set.
    fn write_pass(
        &self,
        device: &str,
        size_bytes: u64,
        pattern: PassPattern,
        cancel: &AtomicBool,
        progress: &mut dyn FnMut(u64),
    ) -> WipeResult<u64>;
}

/// Writes directly to the block device node with buffered sequential writes
pub struct BlockOverwriter {
    chunk_size: usize,
}

impl BlockOverwriter {
    pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl Default for BlockOverwriter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CHUNK_SIZE)
    }
}

impl Overwriter for BlockOverwriter {
    fn write_pass(
        &self,
        device: &str,
        size_bytes: u64,
        pattern: PassPattern,
        cancel: &AtomicBool,
        progress: &mut dyn FnMut(u64),
    ) -> WipeResult<u64> {
        let mut file = OpenOptions::new().write(true).open(device)?;

        // Size unknown at scan time: ask the device itself
        let size = if size_bytes == 0 {
            let end = file.seek(SeekFrom::End(0))?;
            file.seek(SeekFrom::Start(0))?;
            end
        } else {
            size_bytes
        };

        if size == 0 {
            return Err(WipeError::Io(io::Error::other(format!(
                "{} reports a size of 0 bytes",
                device
            ))));
        }

        debug!(device, size, pattern = %pattern, "Starting overwrite pass");

        let mut rng = rand::thread_rng();
        let mut buffer = vec![0u8; self.chunk_size];
        let mut written = 0u64;

        while written < size {
            if cancel.load(Ordering::SeqCst) {
                return Err(WipeError::Interrupted);
            }

            let len = (size - written).min(self.chunk_size as u64) as usize;
            let chunk = &mut buffer[..len];
            match pattern {
                PassPattern::Random => rng.fill_bytes(chunk),
                PassPattern::Zero => chunk.fill(0),
            }

            file.write_all(chunk)?;
            written += len as u64;
            progress(written);
        }

        file.sync_all()?;
        Ok(written)
    }
}
