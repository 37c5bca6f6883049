use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_big_array::BigArray;

use crate::cartridge::mbc::Mbc;
use crate::cartridge::{Cartridge, SaveError};
use crate::dma::OamDma;
use crate::input::{Buttons, Joypad};
use crate::ppu::Ppu;
use crate::serial::Serial;
use crate::timer::Timer;

/// The 16-bit address space and everything behind it. `tick` is the single
/// cycle sink: every machine cycle the CPU charges flows through it, in
/// access order, keeping the timer, DMA engine, PPU and serial port in
/// phase with the interpreter.
#[derive(Serialize, Deserialize)]
pub struct Bus {
    pub cart: Cartridge,
    pub ppu: Ppu,
    pub timer: Timer,
    pub input: Joypad,
    pub serial: Serial,
    #[serde(with = "BigArray")]
    pub wram: [u8; 0x2000],
    #[serde(with = "BigArray")]
    pub vram: [u8; 0x2000],
    #[serde(with = "BigArray")]
    pub oam: [u8; 0xA0],
    #[serde(with = "BigArray")]
    pub io: [u8; 0x80],
    #[serde(with = "BigArray")]
    pub hram: [u8; 0x7F],
    pub ie: u8,
    pub iflag: u8,
    pub oam_dma: OamDma,
}

impl Bus {
    pub fn new(cart: Cartridge) -> Self {
        Self {
            cart,
            ppu: Ppu::new(),
            timer: Timer::new(),
            input: Joypad::new(),
            serial: Serial::new(),
            wram: [0; 0x2000],
            vram: [0; 0x2000],
            oam: [0; 0xA0],
            io: [0; 0x80],
            hram: [0; 0x7F],
            ie: 0,
            iflag: 0,
            oam_dma: OamDma::default(),
        }
    }

    /// DMG post-boot IO state for the registers this core models.
    pub fn reset_dmg(&mut self) {
        self.ie = 0x00;
        self.iflag = 0x01;

        let io_inits: &[(u16, u8)] = &[
            (0xFF00, 0xCF), // JOYP
            (0xFF05, 0x00), // TIMA
            (0xFF06, 0x00), // TMA
            (0xFF07, 0x00), // TAC
            (0xFF40, 0x91), // LCDC
            (0xFF42, 0x00), // SCY
            (0xFF43, 0x00), // SCX
            (0xFF45, 0x00), // LYC
            (0xFF47, 0xFC), // BGP
            (0xFF48, 0xFF), // OBP0
            (0xFF49, 0xFF), // OBP1
            (0xFF4A, 0x00), // WY
            (0xFF4B, 0x00), // WX
        ];
        for &(addr, val) in io_inits {
            self.write8(addr, val);
        }
    }

    fn lcd_enabled(&self) -> bool {
        self.io[0x40] & 0x80 != 0
    }

    fn ppu_mode(&self) -> u8 {
        self.io[0x41] & 0x03
    }

    /// While the LCD runs, VRAM is the PPU's during mode 3 and OAM during
    /// modes 2 and 3.
    fn blocked_by_ppu(&self, addr: u16) -> bool {
        if !self.lcd_enabled() {
            return false;
        }
        match addr {
            0x8000..=0x9FFF => self.ppu_mode() == 3,
            0xFE00..=0xFE9F => self.ppu_mode() >= 2,
            _ => false,
        }
    }

    pub fn read8(&self, addr: u16) -> u8 {
        if self.oam_dma.blocks_cpu_addr(addr) || self.blocked_by_ppu(addr) {
            return 0xFF;
        }
        self.read8_direct(addr)
    }

    fn read8_direct(&self, addr: u16) -> u8 {
        match addr {
            // Cartridge ROM
            0x0000..=0x7FFF => self.cart.mbc.read_rom(&self.cart.rom, addr),

            0x8000..=0x9FFF => self.vram[(addr - 0x8000) as usize],

            // Cartridge external RAM
            0xA000..=0xBFFF => self.cart.mbc.read_ram(&self.cart.ram, addr),

            0xC000..=0xDFFF => self.wram[(addr - 0xC000) as usize],

            // Echo of WRAM
            0xE000..=0xFDFF => self.wram[(addr - 0xE000) as usize],

            0xFE00..=0xFE9F => self.oam[(addr - 0xFE00) as usize],

            // Unusable
            0xFEA0..=0xFEFF => 0xFF,

            0xFF00..=0xFF7F => match addr {
                0xFF00 => self.input.read_joyp(),
                0xFF04 => self.timer.read_div(),
                0xFF05 => self.timer.read_tima(),
                0xFF06 => self.timer.read_tma(),
                0xFF07 => self.timer.read_tac(),
                0xFF0F => self.iflag | 0xE0,
                _ => self.io[(addr - 0xFF00) as usize],
            },

            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize],

            0xFFFF => self.ie | 0xE0,
        }
    }

    pub fn write8(&mut self, addr: u16, val: u8) {
        if self.oam_dma.blocks_cpu_addr(addr) || self.blocked_by_ppu(addr) {
            return;
        }
        self.write8_direct(addr, val);
    }

    fn write8_direct(&mut self, addr: u16, val: u8) {
        match addr {
            // Bank-control commands; ROM itself never changes.
            0x0000..=0x7FFF => self.cart.mbc.write_rom(addr, val),

            0x8000..=0x9FFF => self.vram[(addr - 0x8000) as usize] = val,

            0xA000..=0xBFFF => self.cart.mbc.write_ram(&mut self.cart.ram, addr, val),

            0xC000..=0xDFFF => self.wram[(addr - 0xC000) as usize] = val,

            // Echo writes land on the mirrored WRAM location.
            0xE000..=0xFDFF => self.wram[(addr - 0xE000) as usize] = val,

            0xFE00..=0xFE9F => self.oam[(addr - 0xFE00) as usize] = val,

            0xFEA0..=0xFEFF => {}

            0xFF00..=0xFF7F => {
                let idx = (addr - 0xFF00) as usize;
                match addr {
                    0xFF00 => self.input.write_joyp(val),
                    0xFF04 => self.timer.write_div(),
                    0xFF05 => self.timer.write_tima(val),
                    0xFF06 => self.timer.write_tma(val),
                    0xFF07 => self.timer.write_tac(val),
                    0xFF0F => self.iflag = val & 0x1F,
                    0xFF02 => {
                        self.io[idx] = val;
                        // Test-ROM convention: a byte in SB, then 0x81 to
                        // SC, starts a transfer.
                        if val & 0x80 != 0 {
                            self.serial.start_transfer(self.io[0x01]);
                        } else {
                            self.serial.stop_transfer();
                        }
                    }
                    // STAT: only the source-enable bits are writable.
                    0xFF41 => self.io[idx] = (self.io[idx] & 0x07) | (val & 0x78),
                    // LY: writing restarts the line sequence.
                    0xFF44 => {
                        self.io[idx] = 0;
                        self.ppu.reset_ly();
                    }
                    0xFF46 => {
                        self.io[idx] = val;
                        self.oam_dma.start(val);
                    }
                    _ => self.io[idx] = val,
                }
            }

            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize] = val,

            0xFFFF => self.ie = val & 0x1F,
        }
    }

    /// Feed the host adapter's sampled button state to the joypad.
    pub fn set_buttons(&mut self, buttons: Buttons) {
        self.input.set_buttons(buttons, &mut self.iflag);
    }

    pub fn set_button(&mut self, button: Buttons, pressed: bool) {
        self.input.set_button(button, pressed, &mut self.iflag);
    }

    /// The tick sink. Fans charged T-cycles out to the timer first, then
    /// the DMA engine, the PPU, and the serial port.
    pub fn tick(&mut self, cycles: u32) {
        self.timer.tick(cycles, &mut self.iflag);
        self.tick_oam_dma(cycles);
        self.ppu
            .tick(cycles, &self.vram, &self.oam, &mut self.io, &mut self.iflag);
        self.serial
            .tick(cycles, &mut self.iflag, &mut self.io[0x02]);
    }

    fn tick_oam_dma(&mut self, cycles: u32) {
        self.oam_dma.add_cycles(cycles);
        while let Some((src, dst)) = self.oam_dma.pop_transfer() {
            self.oam[dst] = self.read8_direct(src);
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), SaveError> {
        self.cart.save_to_path(path)
    }

    pub fn load_from_path(&mut self, path: &Path) -> Result<(), SaveError> {
        self.cart.load_from_path(path)
    }
}
