use byteorder::{BigEndian, ByteOrder};
use bus_updater_hal::{FlashDriver, FlashRead, ProgramPin};

use crate::config::DeviceConfig;
use crate::crc;
use crate::descriptor::{BootDescriptor, DESCRIPTOR_SIZE};
use crate::error::{ErrorKind, Result};
use crate::framer::{self, Reply};
use crate::lock::LockManager;
use crate::policy;
use crate::staging::StagingBuffer;

/// Wire-level opcode constants (spec.md §4.5). Values are protocol-visible
/// and must not change.
pub mod opcode {
    pub const ERASE_SECTOR: u8 = 0;
    pub const SEND_DATA: u8 = 1;
    pub const PROGRAM: u8 = 2;
    pub const UPDATE_BOOT_DESC: u8 = 3;
    pub const REQ_DATA: u8 = 10;
    pub const GET_LAST_ERROR: u8 = 20;
    pub const UNLOCK_DEVICE: u8 = 30;
    pub const REQUEST_UID: u8 = 31;
    pub const APP_VERSION_REQUEST: u8 = 33;
    pub const SET_EMULATION: u8 = 100;
}

/// A view over an inbound bus frame: byte 0's low nibble is a count used
/// only by `SEND_DATA`, byte 2 is the opcode, bytes 3.. are the payload.
/// This fixed geometry is inherited from the bus frame being overloaded
/// and is preserved verbatim.
struct Frame<'a> {
    bytes: &'a [u8],
}

impl<'a> Frame<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Frame { bytes }
    }

    fn count_nibble(&self) -> u8 {
        self.bytes.first().copied().unwrap_or(0) & 0x0F
    }

    fn opcode(&self) -> Option<u8> {
        self.bytes.get(2).copied()
    }

    fn payload(&self) -> &'a [u8] {
        if self.bytes.len() > 3 {
            &self.bytes[3..]
        } else {
            &[]
        }
    }
}

/// A decoded command, tagged by variant rather than dispatched from a raw
/// opcode switch (per spec.md §9's redesign note). Each variant carries
/// only the fields its handler needs.
#[derive(Debug, Clone, Copy)]
enum Command<'a> {
    EraseSector { sector: u8 },
    SendData { data: &'a [u8] },
    Program { count: u32, address: u32, crc: u32 },
    UpdateBootDesc { crc: u32, slot: u8 },
    ReqData,
    GetLastError,
    UnlockDevice { payload: &'a [u8] },
    RequestUid,
    AppVersionRequest { slot: u8 },
    SetEmulation { mask: u8 },
}

/// Decode a frame into a tagged command. Opcodes the engine doesn't
/// recognize, and frames too short to carry the fields their opcode
/// requires, both yield `UnknownCommand` — spec.md's frame layout is fixed
/// but silent on truncated frames, so we follow the nearest real-world
/// precedent (see SPEC_FULL.md §11) rather than panicking on a short
/// slice index.
fn decode<'a>(frame: &Frame<'a>) -> Result<Command<'a>> {
    let op = frame.opcode().ok_or(ErrorKind::UnknownCommand)?;
    let payload = frame.payload();
    match op {
        opcode::ERASE_SECTOR => {
            let sector = payload.first().copied().ok_or(ErrorKind::UnknownCommand)?;
            Ok(Command::EraseSector { sector })
        }
        opcode::SEND_DATA => {
            let n = frame.count_nibble() as usize;
            if payload.len() < n {
                return Err(ErrorKind::UnknownCommand);
            }
            Ok(Command::SendData { data: &payload[..n] })
        }
        opcode::PROGRAM => {
            if payload.len() < 12 {
                return Err(ErrorKind::UnknownCommand);
            }
            Ok(Command::Program {
                count: BigEndian::read_u32(&payload[0..4]),
                address: BigEndian::read_u32(&payload[4..8]),
                crc: BigEndian::read_u32(&payload[8..12]),
            })
        }
        opcode::UPDATE_BOOT_DESC => {
            if payload.len() < 5 {
                return Err(ErrorKind::UnknownCommand);
            }
            Ok(Command::UpdateBootDesc {
                crc: BigEndian::read_u32(&payload[0..4]),
                slot: payload[4],
            })
        }
        opcode::REQ_DATA => Ok(Command::ReqData),
        opcode::GET_LAST_ERROR => Ok(Command::GetLastError),
        opcode::UNLOCK_DEVICE => Ok(Command::UnlockDevice { payload }),
        opcode::REQUEST_UID => Ok(Command::RequestUid),
        opcode::APP_VERSION_REQUEST => Ok(Command::AppVersionRequest {
            slot: payload.first().copied().unwrap_or(0),
        }),
        opcode::SET_EMULATION => Ok(Command::SetEmulation {
            mask: payload.first().copied().unwrap_or(0),
        }),
        _ => Err(ErrorKind::UnknownCommand),
    }
}

/// What a dispatched frame produced for the bus peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckKind {
    Ack,
    Nack,
}

/// The result of dispatching one frame: the ack/nack, and — only on a
/// success that produces one — the raw reply telegram plus its length.
pub struct Outcome {
    pub ack: AckKind,
    pub reply: Option<([u8; framer::MAX_FRAME_LEN], usize)>,
}

/// The single-threaded command engine. Owns every piece of mutable state
/// named in spec.md's data model (staging cursor, lock state, last-error
/// register, emulation flag) as plain fields rather than function-local
/// statics, so it can be constructed fresh in a test without linking
/// against a real bus — the redesign spec.md §9 calls for explicitly.
pub struct Engine<F, P, M> {
    cfg: DeviceConfig,
    flash: F,
    pin: P,
    map_driver_error: M,
    staging: StagingBuffer,
    lock: LockManager,
    last_error: ErrorKind,
    emulation_mask: u8,
}

impl<F, P, M> Engine<F, P, M>
where
    F: FlashDriver + FlashRead,
    P: ProgramPin,
    M: Fn(F::Error) -> ErrorKind,
{
    /// `map_driver_error` folds the flash driver's board-specific failure
    /// type into the wire-visible `ErrorKind`, typically via
    /// `ErrorKind::from_driver_code`.
    pub fn new(cfg: DeviceConfig, flash: F, pin: P, map_driver_error: M) -> Self {
        Engine {
            cfg,
            flash,
            pin,
            map_driver_error,
            staging: StagingBuffer::new(),
            lock: LockManager::new(),
            last_error: ErrorKind::Success,
            emulation_mask: 0,
        }
    }

    pub fn last_error(&self) -> ErrorKind {
        self.last_error
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    pub fn staging_cursor(&self) -> usize {
        self.staging.cursor()
    }

    /// `SET_EMULATION`'s low nibble: when any bit is set, mutating
    /// commands skip the actual flash dispatch and unconditionally
    /// succeed.
    fn emulation_active(&self) -> bool {
        self.emulation_mask & 0x0F != 0
    }

    /// Decode and run one inbound frame to completion, updating the
    /// last-error register and returning the ack/nack (plus an optional
    /// reply telegram) for the bus layer to send back.
    pub fn dispatch(&mut self, frame_bytes: &[u8]) -> Outcome {
        let frame = Frame::new(frame_bytes);
        let outcome = match decode(&frame).and_then(|cmd| self.run(cmd)) {
            Ok(reply) => {
                self.last_error = ErrorKind::Success;
                (AckKind::Ack, reply)
            }
            Err(err) => {
                log_warn!("command refused: {}", err);
                self.last_error = err;
                (AckKind::Nack, None)
            }
        };

        let reply_frame = outcome.1.map(|reply| {
            let mut buf = [0u8; framer::MAX_FRAME_LEN];
            let n = framer::build_reply_frame(&mut buf, reply);
            (buf, n)
        });

        Outcome {
            ack: outcome.0,
            reply: reply_frame,
        }
    }

    fn run(&mut self, command: Command) -> Result<Option<Reply>> {
        match command {
            Command::EraseSector { sector } => self.handle_erase_sector(sector).map(|_| None),
            Command::SendData { data } => self.handle_send_data(data).map(|_| None),
            Command::Program { count, address, crc } => {
                self.handle_program(count, address, crc).map(|_| None)
            }
            Command::UpdateBootDesc { crc, slot } => {
                self.handle_update_boot_desc(crc, slot).map(|_| None)
            }
            Command::ReqData => self.require_unlocked().and(Err(ErrorKind::NotImplemented)),
            Command::GetLastError => {
                let code = self.last_error.code();
                Ok(Some(Reply::LastError(code)))
            }
            Command::UnlockDevice { payload } => self.handle_unlock(payload),
            Command::RequestUid => self.handle_request_uid(),
            Command::AppVersionRequest { slot } => self.handle_app_version_request(slot),
            Command::SetEmulation { mask } => {
                self.emulation_mask = mask;
                Ok(None)
            }
        }
    }

    fn require_unlocked(&self) -> Result<()> {
        if self.lock.is_locked() {
            return Err(ErrorKind::DeviceLocked);
        }
        Ok(())
    }

    fn handle_erase_sector(&mut self, sector: u8) -> Result<()> {
        self.require_unlocked()?;
        if !self.emulation_active() {
            if !policy::sector_erasable(&self.cfg, sector as u32) {
                return Err(ErrorKind::SectorNotAllowed);
            }
            self.flash
                .erase_sector(sector as u32)
                .map_err(|e| (self.map_driver_error)(e))?;
        }
        self.staging.reset();
        log_trace!("erased sector {}", sector);
        Ok(())
    }

    fn handle_send_data(&mut self, data: &[u8]) -> Result<()> {
        self.require_unlocked()?;
        self.staging.append(data)
    }

    fn handle_program(&mut self, count: u32, address: u32, crc: u32) -> Result<()> {
        self.require_unlocked()?;
        if self.emulation_active() {
            self.staging.reset();
            return Ok(());
        }
        if !policy::range_programmable(&self.cfg, address, count) {
            self.staging.reset();
            return Err(ErrorKind::AddressNotAllowed);
        }
        let staged = self.staging.slice(count as usize);
        if crate::crc::crc32(staged) != crc {
            self.staging.reset();
            return Err(ErrorKind::CrcError);
        }
        let result = self
            .flash
            .program(address, staged)
            .map_err(|e| (self.map_driver_error)(e));
        self.staging.reset();
        result.map(|_| log_trace!("programmed {} bytes at 0x{:x}", count, address))
    }

    fn handle_update_boot_desc(&mut self, supplied_crc: u32, slot: u8) -> Result<()> {
        self.require_unlocked()?;
        if self.emulation_active() {
            self.staging.reset();
            return Ok(());
        }
        if slot >= self.cfg.num_descriptor_slots {
            self.staging.reset();
            return Err(ErrorKind::WrongDescriptorBlock);
        }

        if self.staging.cursor() < DESCRIPTOR_SIZE {
            self.staging.reset();
            return Err(ErrorKind::UnknownCommand);
        }
        let staged = self.staging.slice(DESCRIPTOR_SIZE);
        if crc::crc32(staged) != supplied_crc {
            self.staging.reset();
            return Err(ErrorKind::CrcError);
        }

        let mut block = [0u8; DESCRIPTOR_SIZE];
        block.copy_from_slice(staged);
        let descriptor = BootDescriptor::parse(&block);
        if let Err(e) = descriptor.validate(&self.cfg, &self.flash) {
            self.staging.reset();
            return Err(e);
        }

        let slot_addr = self.cfg.descriptor_slot_address(slot);
        let result = self
            .flash
            .erase_page(slot_addr)
            .and_then(|_| self.flash.program(slot_addr, &block))
            .map_err(|e| (self.map_driver_error)(e));
        self.staging.reset();
        result.map(|_| log_trace!("updated boot descriptor slot {}", slot))
    }

    fn handle_unlock(&mut self, payload: &[u8]) -> Result<Option<Reply>> {
        if self.pin.asserted() {
            self.lock.unlock_via_program_pin();
            log_trace!("unlocked via program pin");
            return Ok(None);
        }
        let unique_id = self.flash.read_unique_id();
        match self.lock.unlock_via_uid(&unique_id, payload) {
            ErrorKind::Success => {
                log_trace!("unlocked via UID match");
                Ok(None)
            }
            err => Err(err),
        }
    }

    fn handle_request_uid(&mut self) -> Result<Option<Reply>> {
        // Requires physical presence but, unlike the mutating commands,
        // does not require the logical lock to be open (spec.md §4.4).
        // There is no dedicated error code for "program pin not
        // asserted"; we reuse `DeviceLocked` as the nearest fit (see
        // DESIGN.md).
        if !self.pin.asserted() {
            return Err(ErrorKind::DeviceLocked);
        }
        let unique_id = self.flash.read_unique_id();
        let mut uid12 = [0u8; 12];
        uid12.copy_from_slice(&unique_id[..12]);
        Ok(Some(Reply::Uid(uid12)))
    }

    fn handle_app_version_request(&mut self, slot: u8) -> Result<Option<Reply>> {
        if slot >= self.cfg.num_descriptor_slots {
            return Err(ErrorKind::WrongDescriptorBlock);
        }
        let slot_addr = self.cfg.descriptor_slot_address(slot);
        let mut block = [0u8; DESCRIPTOR_SIZE];
        block.copy_from_slice(self.flash.read(slot_addr, DESCRIPTOR_SIZE));
        let descriptor = BootDescriptor::parse(&block);
        descriptor.validate(&self.cfg, &self.flash)?;
        let version = descriptor
            .app_version(&self.cfg, &self.flash)
            .ok_or(ErrorKind::AppNotStartable)?;
        let mut v = [0u8; 12];
        v.copy_from_slice(version);
        Ok(Some(Reply::Version(v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bus_updater_hal::mock::{MockFlash, MockPin};

    fn test_engine(
        pin_asserted: bool,
        unique_id: [u8; 16],
    ) -> Engine<MockFlash, MockPin, fn(bus_updater_hal::mock::MockFlashError) -> ErrorKind> {
        let cfg = DeviceConfig {
            updater_start: 0x1000,
            updater_end: 0x3FFF,
            ..Default::default()
        };
        let flash = MockFlash::new(0x200000, cfg.sector_size as usize, 4096, unique_id);
        let pin = MockPin::new(pin_asserted);
        Engine::new(cfg, flash, pin, |_| ErrorKind::Other(0xFFF0))
    }

    fn frame(bytes: &[u8]) -> Vec<u8> {
        bytes.to_vec()
    }

    /// Scenario 1: unlock via program pin, erase sector 2.
    #[test]
    fn scenario_unlock_via_pin_then_erase() {
        let mut engine = test_engine(true, [0u8; 16]);

        let f = frame(&[0x00, 0x00, opcode::UNLOCK_DEVICE]);
        let outcome = engine.dispatch(&f);
        assert_eq!(outcome.ack, AckKind::Ack);
        assert_eq!(engine.last_error(), ErrorKind::Success);
        assert!(!engine.is_locked());

        let f = frame(&[0x00, 0x00, opcode::ERASE_SECTOR, 0x02]);
        let outcome = engine.dispatch(&f);
        assert_eq!(outcome.ack, AckKind::Ack);
        assert_eq!(engine.last_error(), ErrorKind::Success);
    }

    /// Scenario 2: unlock via UID mismatch.
    #[test]
    fn scenario_unlock_uid_mismatch() {
        let uid = [
            0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0, 0, 0, 0,
        ];
        let mut engine = test_engine(false, uid);

        let mut payload = vec![0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCD];
        let mut f = vec![0x00, 0x00, opcode::UNLOCK_DEVICE];
        f.append(&mut payload);

        let outcome = engine.dispatch(&f);
        assert_eq!(outcome.ack, AckKind::Nack);
        assert_eq!(engine.last_error(), ErrorKind::UidMismatch);
        assert!(engine.is_locked());
    }

    /// Scenario 3: streamed image then commit.
    ///
    /// `SEND_DATA`'s length nibble can only carry 0-15, so a 64-byte
    /// payload must be sent 16 bytes at a time to land entirely in the
    /// staging buffer. This exercises the literal round trip from
    /// spec.md's scenario 3 with a frame size the wire format can
    /// actually express.
    #[test]
    fn scenario_stream_then_program_in_16_byte_chunks() {
        let mut engine = test_engine(true, [0u8; 16]);
        engine.dispatch(&frame(&[0x00, 0x00, opcode::UNLOCK_DEVICE]));
        engine.dispatch(&frame(&[0x00, 0x00, opcode::ERASE_SECTOR, 0x02]));

        let payload: Vec<u8> = (0..256u32).map(|i| (i % 251) as u8).collect();
        for chunk in payload.chunks(15) {
            let mut f = vec![chunk.len() as u8, 0x00, opcode::SEND_DATA];
            f.extend_from_slice(chunk);
            let outcome = engine.dispatch(&f);
            assert_eq!(outcome.ack, AckKind::Ack);
        }
        assert_eq!(engine.staging_cursor(), payload.len());

        let crc = crate::crc::crc32(&payload);
        let mut prog_payload = vec![0u8; 12];
        BigEndian::write_u32(&mut prog_payload[0..4], payload.len() as u32);
        BigEndian::write_u32(&mut prog_payload[4..8], 0x2000);
        BigEndian::write_u32(&mut prog_payload[8..12], crc);
        let mut f = vec![0x00, 0x00, opcode::PROGRAM];
        f.extend_from_slice(&prog_payload);

        let outcome = engine.dispatch(&f);
        assert_eq!(outcome.ack, AckKind::Ack, "{:?}", engine.last_error());
        assert_eq!(engine.staging_cursor(), 0);
        assert_eq!(engine.flash.read(0x2000, payload.len()), payload.as_slice());
    }

    /// Scenario 4: PROGRAM with a bad CRC.
    #[test]
    fn scenario_program_bad_crc_nacks_and_resets_cursor() {
        let mut engine = test_engine(true, [0u8; 16]);
        engine.dispatch(&frame(&[0x00, 0x00, opcode::UNLOCK_DEVICE]));
        engine.dispatch(&frame(&[0x00, 0x00, opcode::ERASE_SECTOR, 0x02]));

        let payload: Vec<u8> = (0..16u32).map(|i| i as u8).collect();
        let mut f = vec![payload.len() as u8, 0x00, opcode::SEND_DATA];
        f.extend_from_slice(&payload);
        engine.dispatch(&f);

        let mut crc = crate::crc::crc32(&payload);
        crc ^= 1; // flip a bit

        let mut prog_payload = vec![0u8; 12];
        BigEndian::write_u32(&mut prog_payload[0..4], payload.len() as u32);
        BigEndian::write_u32(&mut prog_payload[4..8], 0x2000);
        BigEndian::write_u32(&mut prog_payload[8..12], crc);
        let mut f = vec![0x00, 0x00, opcode::PROGRAM];
        f.extend_from_slice(&prog_payload);

        let outcome = engine.dispatch(&f);
        assert_eq!(outcome.ack, AckKind::Nack);
        assert_eq!(engine.last_error(), ErrorKind::CrcError);
        assert_eq!(engine.staging_cursor(), 0);
    }

    /// Scenario 5: UPDATE_BOOT_DESC on an unstartable image.
    #[test]
    fn scenario_update_boot_desc_unstartable_image() {
        let mut engine = test_engine(true, [0u8; 16]);
        engine.dispatch(&frame(&[0x00, 0x00, opcode::UNLOCK_DEVICE]));
        engine.dispatch(&frame(&[0x00, 0x00, opcode::ERASE_SECTOR, 0x02]));

        // startAddress == endAddress == 0 fails rule 3 regardless of CRC.
        let mut block = [0u8; DESCRIPTOR_SIZE];
        let crc = crate::crc::crc32(&block);
        BigEndian::write_u32(&mut block[8..12], crc);

        for chunk in block.chunks(15) {
            let mut f = vec![chunk.len() as u8, 0x00, opcode::SEND_DATA];
            f.extend_from_slice(chunk);
            engine.dispatch(&f);
        }

        let mut payload = vec![0u8; 5];
        BigEndian::write_u32(&mut payload[0..4], crc);
        payload[4] = 0; // slot 0
        let mut f = vec![0x00, 0x00, opcode::UPDATE_BOOT_DESC];
        f.extend_from_slice(&payload);

        let outcome = engine.dispatch(&f);
        assert_eq!(outcome.ack, AckKind::Nack);
        assert_eq!(engine.last_error(), ErrorKind::AppNotStartable);
    }

    /// `UPDATE_BOOT_DESC` issued before a full 256-byte descriptor has
    /// been streamed in must refuse rather than validate whatever stale
    /// bytes are left over in the staging buffer from an earlier session.
    #[test]
    fn update_boot_desc_refuses_when_fewer_than_256_bytes_staged() {
        let mut engine = test_engine(true, [0u8; 16]);
        engine.dispatch(&frame(&[0x00, 0x00, opcode::UNLOCK_DEVICE]));
        engine.dispatch(&frame(&[0x00, 0x00, opcode::ERASE_SECTOR, 0x02]));

        let short = [0xAAu8; 10];
        let mut f = vec![short.len() as u8, 0x00, opcode::SEND_DATA];
        f.extend_from_slice(&short);
        engine.dispatch(&f);
        assert_eq!(engine.staging_cursor(), 10);

        let mut payload = vec![0u8; 5];
        BigEndian::write_u32(&mut payload[0..4], 0); // any CRC value
        payload[4] = 0; // slot 0
        let mut f = vec![0x00, 0x00, opcode::UPDATE_BOOT_DESC];
        f.extend_from_slice(&payload);

        let outcome = engine.dispatch(&f);
        assert_eq!(outcome.ack, AckKind::Nack);
        assert_eq!(engine.last_error(), ErrorKind::UnknownCommand);
        assert_eq!(engine.staging_cursor(), 0);
    }

    /// Scenario 6: refuse to erase an updater-owned sector.
    #[test]
    fn scenario_refuse_updater_sector_erase() {
        let mut engine = test_engine(true, [0u8; 16]);
        engine.dispatch(&frame(&[0x00, 0x00, opcode::UNLOCK_DEVICE]));

        // UPDATER_START=0x1000, UPDATER_END=0x3FFF -> sector 1 at 4096-byte
        // granularity (ceil(0x1000/4096)==1, ceil(0x3FFF/4096)==1). Use
        // sector 1, matching the policy test fixture above.
        let f = frame(&[0x00, 0x00, opcode::ERASE_SECTOR, 0x01]);
        let outcome = engine.dispatch(&f);
        assert_eq!(outcome.ack, AckKind::Nack);
        assert_eq!(engine.last_error(), ErrorKind::SectorNotAllowed);
    }

    /// Scenario 7: GET_LAST_ERROR clears the register after reading it.
    #[test]
    fn scenario_get_last_error_clears_register() {
        let uid = [0x11u8; 16];
        let mut engine = test_engine(false, uid);
        let mut bad_payload = vec![0u8; 12];
        bad_payload.copy_from_slice(&[0u8; 12]); // all-zero, won't match uid
        let mut f = vec![0x00, 0x00, opcode::UNLOCK_DEVICE];
        f.extend_from_slice(&bad_payload);
        engine.dispatch(&f);
        assert_eq!(engine.last_error(), ErrorKind::UidMismatch);

        let outcome = engine.dispatch(&frame(&[0x00, 0x00, opcode::GET_LAST_ERROR]));
        assert_eq!(outcome.ack, AckKind::Ack);
        let (buf, n) = outcome.reply.expect("GET_LAST_ERROR must reply");
        assert_eq!(n, 14);
        assert_eq!(&buf[10..14], &[0x08, 0x01, 0x00, 0x00]); // 0x0108 little-endian

        assert_eq!(engine.last_error(), ErrorKind::Success);
    }

    #[test]
    fn locked_device_refuses_mutating_commands() {
        let mut engine = test_engine(true, [0u8; 16]);
        let outcome = engine.dispatch(&frame(&[0x00, 0x00, opcode::ERASE_SECTOR, 0x02]));
        assert_eq!(outcome.ack, AckKind::Nack);
        assert_eq!(engine.last_error(), ErrorKind::DeviceLocked);
    }

    #[test]
    fn req_data_is_not_implemented() {
        let mut engine = test_engine(true, [0u8; 16]);
        engine.dispatch(&frame(&[0x00, 0x00, opcode::UNLOCK_DEVICE]));
        let outcome = engine.dispatch(&frame(&[0x00, 0x00, opcode::REQ_DATA]));
        assert_eq!(outcome.ack, AckKind::Nack);
        assert_eq!(engine.last_error(), ErrorKind::NotImplemented);
    }

    /// REQ_DATA is listed among the mutating, lock-gated commands in
    /// spec.md §4.4 — a locked device refuses it with `DeviceLocked`
    /// rather than leaking `NotImplemented` before the lock check.
    #[test]
    fn req_data_is_lock_gated() {
        let mut engine = test_engine(true, [0u8; 16]);
        let outcome = engine.dispatch(&frame(&[0x00, 0x00, opcode::REQ_DATA]));
        assert_eq!(outcome.ack, AckKind::Nack);
        assert_eq!(engine.last_error(), ErrorKind::DeviceLocked);
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        let mut engine = test_engine(true, [0u8; 16]);
        let outcome = engine.dispatch(&frame(&[0x00, 0x00, 0xEF]));
        assert_eq!(outcome.ack, AckKind::Nack);
        assert_eq!(engine.last_error(), ErrorKind::UnknownCommand);
    }

    #[test]
    fn emulation_mode_bypasses_flash_dispatch_but_always_succeeds() {
        let mut engine = test_engine(true, [0u8; 16]);
        engine.dispatch(&frame(&[0x00, 0x00, opcode::UNLOCK_DEVICE]));
        engine.dispatch(&frame(&[0x00, 0x00, opcode::SET_EMULATION, 0x01]));

        // Sector 1 is updater-owned and would normally be refused.
        let outcome = engine.dispatch(&frame(&[0x00, 0x00, opcode::ERASE_SECTOR, 0x01]));
        assert_eq!(outcome.ack, AckKind::Ack);
        assert_eq!(engine.last_error(), ErrorKind::Success);
    }
}
