use byteorder::{ByteOrder, LittleEndian};

/// Outbound opcodes, reply-frame counterparts of their request opcode.
pub const OP_RESPONSE_UID: u8 = 32;
pub const OP_APP_VERSION_RESPONSE: u8 = 34;
pub const OP_SEND_LAST_ERROR: u8 = 21;

/// A typed reply payload, alongside the raw telegram bytes framer.rs must
/// still produce bit-for-bit. This typed shape is additive — see
/// SPEC_FULL.md §11 — mirroring the `Response` enum the closest pack
/// example (`crispy-common::protocol`) uses for its own reply-producing
/// commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Uid([u8; 12]),
    Version([u8; 12]),
    LastError(u16),
}

impl Reply {
    fn response_opcode(&self) -> u8 {
        match self {
            Reply::Uid(_) => OP_RESPONSE_UID,
            Reply::Version(_) => OP_APP_VERSION_RESPONSE,
            Reply::LastError(_) => OP_SEND_LAST_ERROR,
        }
    }

    fn payload_len(&self) -> usize {
        match self {
            Reply::Uid(_) | Reply::Version(_) => 12,
            Reply::LastError(_) => 4,
        }
    }
}

/// Maximum telegram size this framer ever produces: 10 header bytes plus
/// the largest reply payload (12 bytes, for UID/version).
pub const MAX_FRAME_LEN: usize = 22;

/// Fill a fixed-layout outbound telegram for one of the three
/// reply-producing commands. The byte layout (§4.6) is protocol-visible
/// and must match the bus peer's expectations exactly:
///
/// - byte 5: `0x63 + payload_length`
/// - byte 6: `0x42`
/// - byte 7: `0x40 | payload_length`
/// - byte 8: `0x00`
/// - byte 9: response opcode
/// - bytes 10..: payload (UID/version: 12 raw bytes; last-error: 4 bytes
///   little-endian, matching how it sits in device memory)
///
/// Returns the number of bytes written into `out`. `out` must be at least
/// `MAX_FRAME_LEN` bytes.
pub fn build_reply_frame(out: &mut [u8], reply: Reply) -> usize {
    let payload_len = reply.payload_len();
    out[5] = 0x63u8.wrapping_add(payload_len as u8);
    out[6] = 0x42;
    out[7] = 0x40 | (payload_len as u8);
    out[8] = 0x00;
    out[9] = reply.response_opcode();

    match reply {
        Reply::Uid(bytes) | Reply::Version(bytes) => {
            out[10..10 + 12].copy_from_slice(&bytes);
        }
        Reply::LastError(code) => {
            LittleEndian::write_u32(&mut out[10..14], code as u32);
        }
    }

    10 + payload_len
}
