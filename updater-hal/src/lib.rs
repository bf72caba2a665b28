#![cfg_attr(not(feature = "mock"), no_std)]
#![allow(non_snake_case)]

//! Hardware-facing traits for the bus-updater command engine.
//!
//! `bus-updater` is generic over a [`FlashDriver`] and a [`ProgramPin`] so
//! that the protocol/safety logic can be unit-tested on a host without ever
//! linking against a real flash peripheral. A board crate implements both
//! traits against its own NVMC/GPIO and hands the engine a value; this crate
//! itself only ships a RAM-backed [`mock`] pair (used by `bus-updater`'s own
//! test suite) and, behind the `nrf52840` feature, a sketch of what a real
//! board adapter looks like.

#[cfg(feature = "mock")]
extern crate std;

#[cfg(feature = "nrf52840")]
pub mod nrf;

#[cfg(feature = "mock")]
pub mod mock;

/// Abstracts the HW-specific flash operations the command engine needs:
/// erasing a sector, erasing a single page (used for boot-descriptor
/// updates, which are smaller than a full sector), programming a run of
/// bytes, and reading back the chip's unique ID.
///
/// Implementors own the actual NVMC/flash-controller register access; the
/// engine only ever calls through this trait, so it never needs `unsafe`
/// and never depends on a particular MCU family.
pub trait FlashDriver {
    /// Board-specific failure code (timeout, protection fault, bad
    /// alignment, ...). The engine folds this into its own `ErrorKind` via
    /// a mapping closure supplied at construction; it never inspects the
    /// variant itself.
    type Error;

    fn erase_sector(&mut self, sector: u32) -> Result<(), Self::Error>;
    fn erase_page(&mut self, addr: u32) -> Result<(), Self::Error>;
    fn program(&mut self, dst: u32, src: &[u8]) -> Result<(), Self::Error>;
    fn read_unique_id(&mut self) -> [u8; 16];
}

/// The physical "program" GPIO: asserted means an operator is present at
/// the device, which lets the unlock command bypass the UID-comparison
/// path (see the lock manager in `bus-updater`).
pub trait ProgramPin {
    fn asserted(&self) -> bool;
}

/// Flash is memory-mapped on every target this engine ships on, so a real
/// board implements this as a raw volatile read rather than a driver call —
/// there is no `readFlash` entry in the spec's external-interface table for
/// the same reason. It is still a trait (not raw pointer reads sprinkled
/// through `bus-updater`) so the descriptor validator and CRC checks can run
/// against a [`mock::MockFlash`] on the host.
pub trait FlashRead {
    fn read(&self, addr: u32, len: usize) -> &[u8];
}
