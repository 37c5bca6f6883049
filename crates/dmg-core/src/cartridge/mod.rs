pub mod header;
pub mod mbc;
pub mod mbc0;
pub mod mbc1;

use self::header::{CartridgeType, Header};
use self::mbc::MbcKind;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CartridgeError {
    InvalidHeader(header::HeaderError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SaveError {
    Io(String),
}

impl From<std::io::Error> for SaveError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

#[derive(Serialize, Deserialize)]
pub struct Cartridge {
    #[serde(with = "serde_bytes")]
    pub rom: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub ram: Vec<u8>,
    pub header: Header,
    pub mbc: MbcKind,
}

impl Cartridge {
    pub fn from_rom(rom: Vec<u8>) -> Result<Self, CartridgeError> {
        let header = Header::parse(&rom).map_err(CartridgeError::InvalidHeader)?;
        let ram = vec![0; header.ram_size.byte_len()];

        let mbc = match header.cartridge_type {
            CartridgeType::RomOnly => MbcKind::Rom(mbc0::Mbc0),
            CartridgeType::Mbc1 | CartridgeType::Mbc1Ram | CartridgeType::Mbc1RamBattery => {
                MbcKind::Mbc1(mbc1::Mbc1::new())
            }
        };

        Ok(Self {
            rom,
            ram,
            header,
            mbc,
        })
    }

    pub fn has_battery(&self) -> bool {
        matches!(self.header.cartridge_type, CartridgeType::Mbc1RamBattery)
    }

    /// Battery RAM persists as a raw image; non-battery carts are a no-op.
    pub fn save_to_path(&self, path: &Path) -> Result<(), SaveError> {
        if !self.has_battery() || self.ram.is_empty() {
            return Ok(());
        }
        std::fs::write(path, &self.ram)?;
        Ok(())
    }

    /// Loads as much of a previous save as fits; short or missing files
    /// are tolerated so a fresh cartridge still boots.
    pub fn load_from_path(&mut self, path: &Path) -> Result<(), SaveError> {
        if !self.has_battery() || !path.exists() {
            return Ok(());
        }
        let data = std::fs::read(path)?;
        let len = data.len().min(self.ram.len());
        self.ram[..len].copy_from_slice(&data[..len]);
        Ok(())
    }
}
