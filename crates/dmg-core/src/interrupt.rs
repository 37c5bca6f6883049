//! Interrupt sources shared by the bus (which raises them) and the CPU
//! (which dispatches them).

use serde::{Deserialize, Serialize};

/// The five DMG interrupt sources, highest service priority first.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Interrupt {
    VBlank,
    Stat,
    Timer,
    Serial,
    Joypad,
}

impl Interrupt {
    /// Bit position in IF/IE.
    #[inline]
    pub const fn bit(self) -> u8 {
        match self {
            Self::VBlank => 0x01,
            Self::Stat => 0x02,
            Self::Timer => 0x04,
            Self::Serial => 0x08,
            Self::Joypad => 0x10,
        }
    }

    /// Dispatch vector address.
    #[inline]
    pub const fn vector(self) -> u16 {
        match self {
            Self::VBlank => 0x0040,
            Self::Stat => 0x0048,
            Self::Timer => 0x0050,
            Self::Serial => 0x0058,
            Self::Joypad => 0x0060,
        }
    }

    /// Highest-priority source set in a pending mask (`IE & IF`).
    #[inline]
    pub fn highest_pending(pending: u8) -> Option<Self> {
        match (pending & 0x1F).trailing_zeros() {
            0 => Some(Self::VBlank),
            1 => Some(Self::Stat),
            2 => Some(Self::Timer),
            3 => Some(Self::Serial),
            4 => Some(Self::Joypad),
            _ => None,
        }
    }
}

/// Sources both enabled and requested. Only the low five bits take part.
#[inline]
pub const fn pending_mask(ie: u8, iflag: u8) -> u8 {
    ie & iflag & 0x1F
}
