#![cfg_attr(not(test), no_std)]
#![allow(non_snake_case)]

//! The command engine and safety envelope for a bus-connected firmware
//! updater: frame decoding, RAM staging, the lock/authorization model, CRC
//! integrity checks, the address/sector admission policy, and boot
//! descriptor validation.
//!
//! The bus framing, the flash-programming primitives, the "program"
//! button's GPIO, and the bootloader that eventually consumes a boot
//! descriptor all live outside this crate, behind the
//! [`bus_updater_hal::FlashDriver`], [`bus_updater_hal::FlashRead`] and
//! [`bus_updater_hal::ProgramPin`] traits `Engine` is generic over.

/// Emits a structured log line through whichever of `log`/`defmt` is
/// enabled, or nothing at all if neither is. Mirrors the teacher's
/// dual-facade logging: `defmt` for on-target builds, `log` for host
/// tests.
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::trace!($($arg)*);
        #[cfg(feature = "defmt")]
        defmt::trace!($($arg)*);
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::warn!($($arg)*);
        #[cfg(feature = "defmt")]
        defmt::warn!($($arg)*);
    };
}

pub mod config;
pub mod crc;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod framer;
pub mod lock;
pub mod policy;
pub mod staging;

pub use config::DeviceConfig;
pub use engine::{AckKind, Engine, Outcome};
pub use error::{ErrorKind, Result};
