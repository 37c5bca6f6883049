use serde::{Deserialize, Serialize};

use crate::bus::Bus;
use crate::cartridge::Cartridge;
use crate::cpu::Cpu;

/// T-cycles in one full frame (154 lines of 456 dots).
pub const FRAME_CYCLES: u32 = 456 * 154;

#[derive(Serialize, Deserialize)]
pub struct GameBoy {
    pub cpu: Cpu,
    pub bus: Bus,
}

impl GameBoy {
    /// A machine in the DMG post-boot state, ready to fetch at 0x0100.
    pub fn new(cart: Cartridge) -> Self {
        let mut gb = Self {
            cpu: Cpu::new(),
            bus: Bus::new(cart),
        };
        gb.reset();
        gb
    }

    /// Apply the no-boot-ROM power-on state to CPU registers and IO.
    pub fn reset(&mut self) {
        self.cpu.reset_dmg();
        self.bus.reset_dmg();
    }

    pub fn step(&mut self) -> u32 {
        self.cpu.step(&mut self.bus)
    }

    /// Run until the PPU presents a frame. Bounded by one frame's worth of
    /// cycles so a disabled LCD or a locked CPU cannot spin forever.
    pub fn run_frame(&mut self) {
        let mut budget = FRAME_CYCLES as i64;
        while !self.bus.ppu.frame_ready() {
            budget -= self.step() as i64;
            if budget <= 0 {
                return;
            }
        }
        self.bus.ppu.clear_frame_ready();
    }
}
