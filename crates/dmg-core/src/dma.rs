//! OAM DMA engine (FF46).

use serde::{Deserialize, Serialize};

pub const OAM_DMA_BYTES: u16 = 0x00A0;
const CYCLES_PER_BYTE: u32 = 4;

/// Transfers 160 bytes from `page << 8` into OAM, one byte per machine
/// cycle after a one machine-cycle startup delay. While active, the CPU
/// only reaches HRAM; everything else reads 0xFF.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize)]
pub struct OamDma {
    active: bool,
    source: u16,
    index: u16,
    startup: u32,
    budget: u32,
}

impl OamDma {
    pub fn start(&mut self, page: u8) {
        self.active = true;
        self.source = (page as u16) << 8;
        self.index = 0;
        self.startup = CYCLES_PER_BYTE;
        self.budget = 0;
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn blocks_cpu_addr(&self, addr: u16) -> bool {
        self.active && !(0xFF80..=0xFFFE).contains(&addr)
    }

    pub fn add_cycles(&mut self, cycles: u32) {
        if self.active {
            self.budget = self.budget.saturating_add(cycles);
        }
    }

    /// Next (source address, OAM offset) pair whose cycle cost has been
    /// paid, if any. Deactivates itself after the 160th byte.
    pub fn pop_transfer(&mut self) -> Option<(u16, usize)> {
        if !self.active {
            return None;
        }

        if self.startup > 0 {
            let consumed = self.startup.min(self.budget);
            self.startup -= consumed;
            self.budget -= consumed;
            if self.startup > 0 {
                return None;
            }
        }

        if self.budget < CYCLES_PER_BYTE {
            return None;
        }
        self.budget -= CYCLES_PER_BYTE;

        let pair = (self.source.wrapping_add(self.index), self.index as usize);
        self.index += 1;

        if self.index >= OAM_DMA_BYTES {
            self.active = false;
            self.startup = 0;
            self.budget = 0;
        }

        Some(pair)
    }
}
