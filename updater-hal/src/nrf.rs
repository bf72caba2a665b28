//! Sketch of a real board adapter: wires [`FlashDriver`]/[`ProgramPin`] to an
//! nRF52840's NVMC and a GPIO input. Not built by default and not exercised
//! by any test in this workspace — it exists to show how a board crate would
//! plug into the engine, the same role `rustBoot-hal`'s `nrf52840.rs` plays
//! for the teacher's bootloader.

use embedded_hal::digital::v2::InputPin;
use nrf52840_hal::gpio::{Input, Pin, PullUp};
use nrf52840_hal::pac::{FICR, NVMC};

use crate::{FlashDriver, ProgramPin};

pub const FLASH_PAGE_SIZE: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NvmcError {
    Misaligned,
    OutOfRange,
}

pub struct Nvmc {
    nvmc: NVMC,
    ficr: FICR,
    flash_len: u32,
}

impl Nvmc {
    pub fn new(nvmc: NVMC, ficr: FICR, flash_len: u32) -> Self {
        Nvmc {
            nvmc,
            ficr,
            flash_len,
        }
    }

    fn erase_range(&mut self, addr: u32, len: u32) -> Result<(), NvmcError> {
        if addr % FLASH_PAGE_SIZE != 0 || len % FLASH_PAGE_SIZE != 0 {
            return Err(NvmcError::Misaligned);
        }
        if addr + len > self.flash_len {
            return Err(NvmcError::OutOfRange);
        }
        self.nvmc.config.write(|w| w.wen().een());
        let mut page = addr;
        while page < addr + len {
            while self.nvmc.ready.read().ready().is_busy() {}
            unsafe {
                self.nvmc.erasepage().write(|w| w.bits(page));
            }
            while self.nvmc.ready.read().ready().is_busy() {}
            page += FLASH_PAGE_SIZE;
        }
        self.nvmc.config.write(|w| w.wen().ren());
        Ok(())
    }
}

impl FlashDriver for Nvmc {
    type Error = NvmcError;

    fn erase_sector(&mut self, sector: u32) -> Result<(), Self::Error> {
        self.erase_range(sector * FLASH_PAGE_SIZE, FLASH_PAGE_SIZE)
    }

    fn erase_page(&mut self, addr: u32) -> Result<(), Self::Error> {
        let page_start = (addr / FLASH_PAGE_SIZE) * FLASH_PAGE_SIZE;
        self.erase_range(page_start, FLASH_PAGE_SIZE)
    }

    fn program(&mut self, dst: u32, src: &[u8]) -> Result<(), Self::Error> {
        if dst + src.len() as u32 > self.flash_len {
            return Err(NvmcError::OutOfRange);
        }
        self.nvmc.config.write(|w| w.wen().wen());
        for (i, chunk) in src.chunks(4).enumerate() {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            let word = u32::from_le_bytes(word);
            let addr = dst + (i as u32) * 4;
            while self.nvmc.ready.read().ready().is_busy() {}
            unsafe {
                core::ptr::write_volatile(addr as *mut u32, word);
            }
        }
        while self.nvmc.ready.read().ready().is_busy() {}
        self.nvmc.config.write(|w| w.wen().ren());
        Ok(())
    }

    fn read_unique_id(&mut self) -> [u8; 16] {
        let mut id = [0u8; 16];
        for (i, word) in [
            self.ficr.deviceid[0].read().bits(),
            self.ficr.deviceid[1].read().bits(),
            self.ficr.deviceaddr[0].read().bits(),
            self.ficr.deviceaddr[1].read().bits(),
        ]
        .iter()
        .enumerate()
        {
            id[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }
        id
    }
}

pub struct ProgramButton {
    pin: Pin<Input<PullUp>>,
}

impl ProgramButton {
    pub fn new(pin: Pin<Input<PullUp>>) -> Self {
        ProgramButton { pin }
    }
}

impl ProgramPin for ProgramButton {
    fn asserted(&self) -> bool {
        self.pin.is_low().unwrap_or(false)
    }
}
