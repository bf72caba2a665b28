use byteorder::{BigEndian, ByteOrder};
use bus_updater_hal::FlashRead;

use crate::config::DeviceConfig;
use crate::crc::crc32;
use crate::error::{ErrorKind, Result};

/// Size in bytes of one boot descriptor block, per spec.md §3.
pub const DESCRIPTOR_SIZE: usize = 256;

/// Field offsets within a 256-byte descriptor block. The spec fixes the
/// field set (`startAddress`, `endAddress`, `crc`, `appVersionAddress`) but
/// not their byte offsets; we lay them out sequentially as big-endian u32s,
/// the same convention the rest of the wire protocol uses. See DESIGN.md.
mod offset {
    pub const START_ADDRESS: usize = 0;
    pub const END_ADDRESS: usize = 4;
    pub const CRC: usize = 8;
    pub const APP_VERSION_ADDRESS: usize = 12;
}

/// Number of bytes making up the application version metadata region.
pub const APP_VERSION_LEN: usize = 12;

/// A candidate 256-byte boot descriptor, parsed (not validated) from a
/// staged or flash-resident block. Multi-byte fields are decoded by
/// explicit big-endian byte shifts, never by reinterpreting memory, so
/// parsing tolerates an unaligned frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootDescriptor {
    pub start_address: u32,
    pub end_address: u32,
    pub crc: u32,
    pub app_version_address: u32,
}

impl BootDescriptor {
    /// Parse a candidate descriptor out of a 256-byte block.
    pub fn parse(block: &[u8; DESCRIPTOR_SIZE]) -> Self {
        BootDescriptor {
            start_address: BigEndian::read_u32(&block[offset::START_ADDRESS..]),
            end_address: BigEndian::read_u32(&block[offset::END_ADDRESS..]),
            crc: BigEndian::read_u32(&block[offset::CRC..]),
            app_version_address: BigEndian::read_u32(&block[offset::APP_VERSION_ADDRESS..]),
        }
    }

    /// Does this descriptor point to a startable application?
    ///
    /// All five checks are necessary; the first failure short-circuits
    /// (spec.md §4.3 doesn't require the non-short-circuiting sweep that
    /// §4.4's UID comparison does — only the lock manager's comparison is
    /// specified that way).
    pub fn validate(&self, cfg: &DeviceConfig, flash: &impl FlashRead) -> Result<()> {
        if self.start_address > cfg.descriptor_start_ceiling {
            return Err(ErrorKind::AppNotStartable);
        }
        if self.end_address > cfg.descriptor_end_ceiling {
            return Err(ErrorKind::AppNotStartable);
        }
        if self.start_address == self.end_address {
            return Err(ErrorKind::AppNotStartable);
        }

        let len = (self.end_address - self.start_address) as usize;
        let app_bytes = flash.read(self.start_address, len);
        if crc32(app_bytes) != self.crc {
            return Err(ErrorKind::AppNotStartable);
        }

        if !vector_table_checksum_ok(flash, self.start_address) {
            return Err(ErrorKind::AppNotStartable);
        }

        Ok(())
    }

    /// The 12 bytes of printable version metadata this descriptor points
    /// at, or `None` if the pointer exceeds the configured guard ceiling
    /// (an uninitialized-descriptor defense, per spec.md §4.3).
    pub fn app_version<'f>(
        &self,
        cfg: &DeviceConfig,
        flash: &'f impl FlashRead,
    ) -> Option<&'f [u8]> {
        if self.app_version_address > cfg.app_version_ceiling {
            return None;
        }
        Some(flash.read(self.app_version_address, APP_VERSION_LEN))
    }
}

/// ARM Cortex-M convention: the first eight 32-bit words at the image
/// entry point (the interrupt vector table) must sum to zero modulo
/// 2^32 — the reset vector's checksum word is chosen to make this hold.
fn vector_table_checksum_ok(flash: &impl FlashRead, start_address: u32) -> bool {
    let vectors = flash.read(start_address, 8 * 4);
    let mut sum: u32 = 0;
    for i in 0..8 {
        sum = sum.wrapping_add(BigEndian::read_u32(&vectors[i * 4..]));
    }
    sum == 0
}
