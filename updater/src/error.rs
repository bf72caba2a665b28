use core::fmt;

/// The last-error register's value type. Numeric codes are wire-visible and
/// must round-trip exactly as specified: a bus peer reads them back via
/// `GET_LAST_ERROR`, so the repr is an explicit `u16`, not a bare enum
/// discriminant that could be reordered by a refactor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Success,
    UnknownCommand,
    CrcError,
    AddressNotAllowed,
    SectorNotAllowed,
    RamOverflow,
    WrongDescriptorBlock,
    AppNotStartable,
    DeviceLocked,
    UidMismatch,
    NotImplemented,
    /// A code surfaced by the flash driver itself, passed through
    /// unchanged rather than mapped onto one of the codes above.
    Other(u16),
}

impl ErrorKind {
    pub const SUCCESS: u16 = 0x000;
    pub const UNKNOWN_COMMAND: u16 = 0x100;
    pub const CRC_ERROR: u16 = 0x101;
    pub const ADDRESS_NOT_ALLOWED: u16 = 0x102;
    pub const SECTOR_NOT_ALLOWED: u16 = 0x103;
    pub const RAM_OVERFLOW: u16 = 0x104;
    pub const WRONG_DESCRIPTOR_BLOCK: u16 = 0x105;
    pub const APP_NOT_STARTABLE: u16 = 0x106;
    pub const DEVICE_LOCKED: u16 = 0x107;
    pub const UID_MISMATCH: u16 = 0x108;
    pub const NOT_IMPLEMENTED: u16 = 0xFFFF;

    /// The wire-level code for this error, as read back via `GET_LAST_ERROR`.
    pub fn code(self) -> u16 {
        match self {
            ErrorKind::Success => Self::SUCCESS,
            ErrorKind::UnknownCommand => Self::UNKNOWN_COMMAND,
            ErrorKind::CrcError => Self::CRC_ERROR,
            ErrorKind::AddressNotAllowed => Self::ADDRESS_NOT_ALLOWED,
            ErrorKind::SectorNotAllowed => Self::SECTOR_NOT_ALLOWED,
            ErrorKind::RamOverflow => Self::RAM_OVERFLOW,
            ErrorKind::WrongDescriptorBlock => Self::WRONG_DESCRIPTOR_BLOCK,
            ErrorKind::AppNotStartable => Self::APP_NOT_STARTABLE,
            ErrorKind::DeviceLocked => Self::DEVICE_LOCKED,
            ErrorKind::UidMismatch => Self::UID_MISMATCH,
            ErrorKind::NotImplemented => Self::NOT_IMPLEMENTED,
            ErrorKind::Other(code) => code,
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, ErrorKind::Success)
    }

    /// Wrap a board-specific flash-driver failure code for passthrough.
    pub fn from_driver_code(code: u16) -> Self {
        ErrorKind::Other(code)
    }
}

#[rustfmt::skip]
impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErrorKind::Success               => write!(f, "success"),
            ErrorKind::UnknownCommand        => write!(f, "opcode not recognized"),
            ErrorKind::CrcError              => write!(f, "frame CRC disagrees with computed CRC"),
            ErrorKind::AddressNotAllowed     => write!(f, "target range intersects the updater reservation"),
            ErrorKind::SectorNotAllowed      => write!(f, "target sector is bootloader- or updater-owned"),
            ErrorKind::RamOverflow           => write!(f, "staging buffer would exceed capacity"),
            ErrorKind::WrongDescriptorBlock  => write!(f, "invalid descriptor slot"),
            ErrorKind::AppNotStartable       => write!(f, "candidate descriptor fails startability checks"),
            ErrorKind::DeviceLocked          => write!(f, "mutating command attempted while locked"),
            ErrorKind::UidMismatch           => write!(f, "unlock failed the UID comparison"),
            ErrorKind::NotImplemented        => write!(f, "opcode recognized but not implemented"),
            ErrorKind::Other(code)           => write!(f, "flash driver error 0x{:04x}", code),
        }
    }
}

pub type Result<T> = core::result::Result<T, ErrorKind>;
