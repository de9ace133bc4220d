//! CAN identifier word with embedded status flags
//!
//! A SocketCAN `can_id_t` is a 32-bit word. The low 29 bits carry the
//! address (11 bits for standard frames, 29 bits for extended frames) and
//! the top three bits are out-of-band flags:
//!
//! ```text
//!  31  30  29  28                                   0
//! ┌───┬───┬───┬──────────────────────────────────────┐
//! │EFF│RTR│ERR│              address                 │
//! └───┴───┴───┴──────────────────────────────────────┘
//! ```
//!
//! All operations are pure mask arithmetic and total over `u32`.

use std::fmt;

/// Extended frame format flag (29-bit address when set)
pub const EFF_FLAG: u32 = 0x8000_0000;
/// Remote transmission request flag
pub const RTR_FLAG: u32 = 0x4000_0000;
/// Error frame flag
pub const ERR_FLAG: u32 = 0x2000_0000;

/// Valid address bits of a standard (11-bit) identifier
pub const SFF_MASK: u32 = 0x0000_07FF;
/// Valid address bits of an extended (29-bit) identifier
pub const EFF_MASK: u32 = 0x1FFF_FFFF;
/// Error class bits of an error frame identifier
pub const ERR_MASK: u32 = 0x1FFF_FFFF;

/// One of the three status flags carried in the top bits of a [`CanId`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdFlag {
    /// Extended frame format (EFF/SFF indicator, bit 31)
    Eff,
    /// Remote transmission request (bit 30)
    Rtr,
    /// Error frame (bit 29)
    Err,
}

impl IdFlag {
    /// All flags, in bit order from most significant
    pub const ALL: [IdFlag; 3] = [IdFlag::Eff, IdFlag::Rtr, IdFlag::Err];

    /// The single bit this flag occupies
    pub const fn mask(self) -> u32 {
        match self {
            IdFlag::Eff => EFF_FLAG,
            IdFlag::Rtr => RTR_FLAG,
            IdFlag::Err => ERR_FLAG,
        }
    }
}

impl fmt::Display for IdFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IdFlag::Eff => "EFF",
            IdFlag::Rtr => "RTR",
            IdFlag::Err => "ERR",
        };
        f.write_str(s)
    }
}

/// A raw SocketCAN identifier word
///
/// Equality and hashing are over the full 32-bit word, flags included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanId(u32);

impl CanId {
    /// Wrap a raw identifier word as-is
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Standard-format identifier, `None` if `address` exceeds 11 bits
    pub const fn standard(address: u16) -> Option<Self> {
        if address as u32 > SFF_MASK {
            None
        } else {
            Some(Self(address as u32))
        }
    }

    /// Extended-format identifier with EFF set, `None` if `address` exceeds 29 bits
    pub const fn extended(address: u32) -> Option<Self> {
        if address > EFF_MASK {
            None
        } else {
            Some(Self(address | EFF_FLAG))
        }
    }

    /// The raw 32-bit word, flags included
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Copy with `flag` set; address bits are untouched
    pub const fn with_flag(self, flag: IdFlag) -> Self {
        Self(self.0 | flag.mask())
    }

    /// Copy with `flag` cleared; address bits are untouched
    pub const fn without_flag(self, flag: IdFlag) -> Self {
        Self(self.0 & !flag.mask())
    }

    /// Whether `flag` is set
    pub const fn is_set(self, flag: IdFlag) -> bool {
        self.0 & flag.mask() != 0
    }

    /// Low 11 bits
    pub const fn standard_address(self) -> u32 {
        self.0 & SFF_MASK
    }

    /// Low 29 bits
    pub const fn extended_address(self) -> u32 {
        self.0 & EFF_MASK
    }

    /// Error class bits, meaningful when [`IdFlag::Err`] is set
    pub const fn error_class(self) -> u32 {
        self.0 & ERR_MASK
    }

    /// Address according to the frame format: 29 bits if EFF is set, else 11 bits
    pub const fn address(self) -> u32 {
        if self.is_extended() {
            self.extended_address()
        } else {
            self.standard_address()
        }
    }

    pub const fn set_eff(self) -> Self {
        self.with_flag(IdFlag::Eff)
    }

    pub const fn set_rtr(self) -> Self {
        self.with_flag(IdFlag::Rtr)
    }

    pub const fn set_err(self) -> Self {
        self.with_flag(IdFlag::Err)
    }

    pub const fn clear_eff(self) -> Self {
        self.without_flag(IdFlag::Eff)
    }

    pub const fn clear_rtr(self) -> Self {
        self.without_flag(IdFlag::Rtr)
    }

    pub const fn clear_err(self) -> Self {
        self.without_flag(IdFlag::Err)
    }

    pub const fn is_extended(self) -> bool {
        self.is_set(IdFlag::Eff)
    }

    pub const fn is_remote(self) -> bool {
        self.is_set(IdFlag::Rtr)
    }

    pub const fn is_error(self) -> bool {
        self.is_set(IdFlag::Err)
    }

    /// Flags currently set, in bit order from most significant
    pub fn flags(self) -> Vec<IdFlag> {
        IdFlag::ALL
            .into_iter()
            .filter(|flag| self.is_set(*flag))
            .collect()
    }
}

impl From<u32> for CanId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<CanId> for u32 {
    fn from(id: CanId) -> Self {
        id.0
    }
}

impl fmt::Display for CanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_extended() {
            write!(f, "{:08X}", self.extended_address())?;
        } else {
            write!(f, "{:03X}", self.standard_address())?;
        }
        let mut shown = 0;
        for flag in IdFlag::ALL {
            if flag == IdFlag::Eff || !self.is_set(flag) {
                continue;
            }
            f.write_str(if shown == 0 { " [" } else { "," })?;
            write!(f, "{}", flag)?;
            shown += 1;
        }
        if shown > 0 {
            f.write_str("]")?;
        }
        Ok(())
    }
}
