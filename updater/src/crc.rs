//! CRC-32 wrapper. The polynomial and table logic live in the `crc` crate
//! (the same dependency `oxidecomputer-hubris` reaches for); this module
//! only fixes the algorithm and the 0xFFFFFFFF seed the protocol mandates.

use crc::{Crc, CRC_32_ISO_HDLC};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// CRC-32 over a byte slice, seeded per protocol with `0xFFFFFFFF`. Used
/// for the commit-time checks in `PROGRAM` and `UPDATE_BOOT_DESC`, and for
/// validating a candidate boot descriptor's `crc` field against the
/// application bytes it describes.
pub fn crc32(bytes: &[u8]) -> u32 {
    CRC32.checksum(bytes)
}
