use crate::error::{ErrorKind, Result};

/// `RAM_CAP` from spec.md §3. Fixed regardless of `DeviceConfig` — the RAM
/// region is a hardware fact, not a per-board policy knob.
pub const RAM_CAP: usize = 4096;

/// A fixed 4 KiB RAM region with an append cursor. Owned by the command
/// engine; never visible to bus clients directly (they only ever see the
/// ack/nack a `SEND_DATA` frame produced).
///
/// The cursor is monotonically non-decreasing during a streaming episode,
/// and is reset to zero after any flash commit (`PROGRAM`,
/// `UPDATE_BOOT_DESC`) or sector erase.
pub struct StagingBuffer {
    ram: [u8; RAM_CAP],
    cursor: usize,
}

impl StagingBuffer {
    pub const CAP: usize = RAM_CAP;

    pub fn new() -> Self {
        StagingBuffer {
            ram: [0u8; RAM_CAP],
            cursor: 0,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Append `bytes` at the current cursor.
    ///
    /// Refuses (without truncating or mutating the cursor) if
    /// `cursor + bytes.len() >= CAP`. The strict `<` check means the
    /// buffer is considered full one byte before its true capacity; this
    /// conservative boundary is load-bearing protocol behavior, not an
    /// off-by-one to be "fixed".
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        if self.cursor + bytes.len() >= Self::CAP {
            return Err(ErrorKind::RamOverflow);
        }
        self.ram[self.cursor..self.cursor + bytes.len()].copy_from_slice(bytes);
        self.cursor += bytes.len();
        Ok(())
    }

    /// Reset the cursor to its initial state. Called after `ERASE_SECTOR`,
    /// and after any successful `PROGRAM`/`UPDATE_BOOT_DESC` commit.
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Read view of the first `n` staged bytes. `n` is expected not to
    /// exceed the cursor, but is clamped to the buffer's capacity so a
    /// wire-supplied length larger than `RAM_CAP` (never enforced by the
    /// engine — see spec's "required byte counts" note) can't index past
    /// the RAM region.
    pub fn slice(&self, n: usize) -> &[u8] {
        &self.ram[..n.min(Self::CAP)]
    }
}

impl Default for StagingBuffer {
    fn default() -> Self {
        Self::new()
    }
}
