use serde::{Deserialize, Serialize};

use super::{mbc0::Mbc0, mbc1::Mbc1};

/// Mapper interface. The cartridge owns the ROM/RAM bytes; the mapper owns
/// the banking state and decodes control writes.
pub trait Mbc {
    fn read_rom(&self, rom: &[u8], addr: u16) -> u8;
    fn write_rom(&mut self, addr: u16, val: u8);
    fn read_ram(&self, ram: &[u8], addr: u16) -> u8;
    fn write_ram(&mut self, ram: &mut [u8], addr: u16, val: u8);
}

/// Concrete mapper dispatch; keeps `Cartridge` serializable without trait
/// objects.
#[derive(Serialize, Deserialize)]
pub enum MbcKind {
    Rom(Mbc0),
    Mbc1(Mbc1),
}

impl Mbc for MbcKind {
    fn read_rom(&self, rom: &[u8], addr: u16) -> u8 {
        match self {
            MbcKind::Rom(m) => m.read_rom(rom, addr),
            MbcKind::Mbc1(m) => m.read_rom(rom, addr),
        }
    }

    fn write_rom(&mut self, addr: u16, val: u8) {
        match self {
            MbcKind::Rom(m) => m.write_rom(addr, val),
            MbcKind::Mbc1(m) => m.write_rom(addr, val),
        }
    }

    fn read_ram(&self, ram: &[u8], addr: u16) -> u8 {
        match self {
            MbcKind::Rom(m) => m.read_ram(ram, addr),
            MbcKind::Mbc1(m) => m.read_ram(ram, addr),
        }
    }

    fn write_ram(&mut self, ram: &mut [u8], addr: u16, val: u8) {
        match self {
            MbcKind::Rom(m) => m.write_ram(ram, addr, val),
            MbcKind::Mbc1(m) => m.write_ram(ram, addr, val),
        }
    }
}
