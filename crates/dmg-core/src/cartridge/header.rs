use serde::{Deserialize, Serialize};

/// Mapper variants this core supports (header byte 0x147).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartridgeType {
    RomOnly,
    Mbc1,
    Mbc1Ram,
    Mbc1RamBattery,
}

impl CartridgeType {
    fn from_byte(byte: u8) -> Result<Self, HeaderError> {
        match byte {
            0x00 => Ok(CartridgeType::RomOnly),
            0x01 => Ok(CartridgeType::Mbc1),
            0x02 => Ok(CartridgeType::Mbc1Ram),
            0x03 => Ok(CartridgeType::Mbc1RamBattery),
            _ => Err(HeaderError::UnsupportedCartridgeType(byte)),
        }
    }
}

/// External RAM size (header byte 0x149).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RamSize {
    None,
    Kilobytes2,
    Kilobytes8,
    Kilobytes32,
    Kilobytes128,
    Kilobytes64,
}

impl RamSize {
    pub fn byte_len(self) -> usize {
        match self {
            RamSize::None => 0,
            RamSize::Kilobytes2 => 0x0800,
            RamSize::Kilobytes8 => 0x2000,
            RamSize::Kilobytes32 => 0x8000,
            RamSize::Kilobytes128 => 0x20000,
            RamSize::Kilobytes64 => 0x10000,
        }
    }

    fn from_byte(byte: u8) -> Result<Self, HeaderError> {
        match byte {
            0x00 => Ok(RamSize::None),
            0x01 => Ok(RamSize::Kilobytes2),
            0x02 => Ok(RamSize::Kilobytes8),
            0x03 => Ok(RamSize::Kilobytes32),
            0x04 => Ok(RamSize::Kilobytes128),
            0x05 => Ok(RamSize::Kilobytes64),
            _ => Err(HeaderError::UnsupportedRamSize(byte)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub cartridge_type: CartridgeType,
    pub ram_size: RamSize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HeaderError {
    RomTooSmall,
    UnsupportedCartridgeType(u8),
    UnsupportedRamSize(u8),
}

impl Header {
    pub fn parse(rom: &[u8]) -> Result<Self, HeaderError> {
        if rom.len() < 0x014A {
            return Err(HeaderError::RomTooSmall);
        }

        let cartridge_type = CartridgeType::from_byte(rom[0x0147])?;
        let ram_size = RamSize::from_byte(rom[0x0149])?;

        Ok(Header {
            cartridge_type,
            ram_size,
        })
    }
}
