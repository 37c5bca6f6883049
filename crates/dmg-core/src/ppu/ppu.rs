use serde::{Deserialize, Serialize};
use serde_big_array::BigArray;

use crate::interrupt::Interrupt;

use super::fetch::Fetcher;
use super::{Framebuffer, Lcdc, FRAMEBUFFER_LEN, LCD_HEIGHT};

const MODE_HBLANK: u8 = 0;
const MODE_VBLANK: u8 = 1;
const MODE_OAM_SCAN: u8 = 2;
const MODE_TRANSFER: u8 = 3;

const OAM_SCAN_DOTS: u32 = 80;
const TRANSFER_END_DOTS: u32 = 252;
const LINE_DOTS: u32 = 456;
const LAST_LINE: u8 = 153;

/// Four-mode scanline state machine. Driven by the bus tick sink at the
/// CPU's T-cycle rate; rendering is committed per tile by the fetcher when
/// a line's transfer window closes.
#[derive(Serialize, Deserialize)]
pub struct Ppu {
    #[serde(with = "BigArray")]
    framebuffer: Framebuffer,
    frame_ready: bool,
    dots: u32,
    ly: u8,
    mode: u8,
    lcd_enabled: bool,
    prev_coincidence: bool,
    fetcher: Fetcher,
}

impl Ppu {
    const LCDC: usize = 0x40;
    const STAT: usize = 0x41;
    const LY: usize = 0x44;
    const LYC: usize = 0x45;

    pub fn new() -> Self {
        Self {
            framebuffer: [0; FRAMEBUFFER_LEN],
            frame_ready: false,
            dots: 0,
            ly: 0,
            mode: MODE_HBLANK,
            lcd_enabled: false,
            prev_coincidence: false,
            fetcher: Fetcher::new(),
        }
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    /// Latched after the last dot of line 153; the embedder presents the
    /// frame and clears it.
    pub fn frame_ready(&self) -> bool {
        self.frame_ready
    }

    pub fn clear_frame_ready(&mut self) {
        self.frame_ready = false;
    }

    /// Mode as the bus should see it for access gating.
    pub fn current_mode(&self) -> u8 {
        if self.lcd_enabled {
            self.mode
        } else {
            MODE_HBLANK
        }
    }

    /// A write to LY (FF44) restarts the line sequence.
    pub fn reset_ly(&mut self) {
        self.dots = 0;
        self.ly = 0;
        self.mode = if self.lcd_enabled {
            MODE_OAM_SCAN
        } else {
            MODE_HBLANK
        };
        self.prev_coincidence = false;
        self.frame_ready = false;
        self.fetcher.start_frame();
    }

    pub fn tick(
        &mut self,
        mut cycles: u32,
        vram: &[u8; 0x2000],
        oam: &[u8; 0xA0],
        io: &mut [u8; 0x80],
        iflag: &mut u8,
    ) {
        let lcdc = Lcdc::from_bits_truncate(io[Self::LCDC]);
        if !lcdc.contains(Lcdc::LCD_ENABLE) {
            // Disabled: LY pinned to 0, mode 0, nothing raised.
            self.lcd_enabled = false;
            self.dots = 0;
            self.ly = 0;
            self.mode = MODE_HBLANK;
            self.prev_coincidence = false;
            self.frame_ready = false;
            self.fetcher.start_frame();
            self.mirror_stat(io);
            return;
        }

        if !self.lcd_enabled {
            self.lcd_enabled = true;
            self.dots = 0;
            self.ly = 0;
            self.mode = MODE_OAM_SCAN;
            self.prev_coincidence = false;
            self.fetcher.start_frame();
        }

        while cycles > 0 {
            let step = self.dots_to_next_event().min(cycles);
            self.dots += step;
            cycles -= step;

            if self.ly < LCD_HEIGHT as u8 {
                if self.mode == MODE_OAM_SCAN && self.dots == OAM_SCAN_DOTS {
                    let lcdc = Lcdc::from_bits_truncate(io[Self::LCDC]);
                    self.fetcher.scan_oam(self.ly, oam, lcdc);
                    self.set_mode(MODE_TRANSFER, io, iflag);
                } else if self.mode == MODE_TRANSFER && self.dots == TRANSFER_END_DOTS {
                    self.fetcher
                        .run_scanline(&mut self.framebuffer, self.ly, vram, io);
                    self.set_mode(MODE_HBLANK, io, iflag);
                }
            }

            if self.dots == LINE_DOTS {
                self.dots = 0;
                self.fetcher.finish_line();
                self.ly += 1;

                if self.ly == LCD_HEIGHT as u8 {
                    *iflag |= Interrupt::VBlank.bit();
                    self.set_mode(MODE_VBLANK, io, iflag);
                } else if self.ly > LAST_LINE {
                    // End of frame: present and restart the line sequence.
                    self.ly = 0;
                    self.frame_ready = true;
                    self.fetcher.start_frame();
                    self.set_mode(MODE_OAM_SCAN, io, iflag);
                } else if self.ly < LCD_HEIGHT as u8 {
                    self.set_mode(MODE_OAM_SCAN, io, iflag);
                }

                self.sync_registers(io, iflag);
            }
        }

        self.sync_registers(io, iflag);
    }

    fn dots_to_next_event(&self) -> u32 {
        if self.ly >= LCD_HEIGHT as u8 {
            return LINE_DOTS - self.dots;
        }
        match self.mode {
            MODE_OAM_SCAN => OAM_SCAN_DOTS - self.dots,
            MODE_TRANSFER => TRANSFER_END_DOTS - self.dots,
            _ => LINE_DOTS - self.dots,
        }
    }

    /// Mode transition; raises the STAT interrupt when the new mode's
    /// source-enable bit is set.
    fn set_mode(&mut self, mode: u8, io: &[u8; 0x80], iflag: &mut u8) {
        if mode == self.mode {
            return;
        }
        self.mode = mode;

        let source_enabled = match mode {
            MODE_HBLANK => io[Self::STAT] & 0x08 != 0,
            MODE_VBLANK => io[Self::STAT] & 0x10 != 0,
            MODE_OAM_SCAN => io[Self::STAT] & 0x20 != 0,
            _ => false,
        };
        if source_enabled {
            *iflag |= Interrupt::Stat.bit();
        }
    }

    /// Mirror LY, the mode bits, and the LY=LYC flag into the IO file, and
    /// raise the STAT interrupt on a fresh coincidence.
    fn sync_registers(&mut self, io: &mut [u8; 0x80], iflag: &mut u8) {
        let coincidence = self.ly == io[Self::LYC];
        if coincidence && !self.prev_coincidence && io[Self::STAT] & 0x40 != 0 {
            *iflag |= Interrupt::Stat.bit();
        }
        self.mirror_stat(io);
    }

    /// Register mirror alone; used while the LCD is off, where no
    /// interrupt may fire.
    fn mirror_stat(&mut self, io: &mut [u8; 0x80]) {
        io[Self::LY] = self.ly;

        let coincidence = self.ly == io[Self::LYC];
        self.prev_coincidence = coincidence;

        let mut stat = io[Self::STAT] & 0x78;
        stat |= self.mode & 0x03;
        if coincidence {
            stat |= 0x04;
        }
        io[Self::STAT] = stat;
    }
}

impl Default for Ppu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LCDC: usize = 0x40;
    const STAT: usize = 0x41;
    const LY: usize = 0x44;
    const LYC: usize = 0x45;

    struct Rig {
        ppu: Ppu,
        vram: [u8; 0x2000],
        oam: [u8; 0xA0],
        io: [u8; 0x80],
        iflag: u8,
    }

    impl Rig {
        fn new(lcdc: u8) -> Self {
            let mut rig = Self {
                ppu: Ppu::new(),
                vram: [0; 0x2000],
                oam: [0; 0xA0],
                io: [0; 0x80],
                iflag: 0,
            };
            rig.io[LCDC] = lcdc;
            rig
        }

        fn tick(&mut self, cycles: u32) {
            self.ppu
                .tick(cycles, &self.vram, &self.oam, &mut self.io, &mut self.iflag);
        }

        fn mode(&self) -> u8 {
            self.io[STAT] & 0x03
        }
    }

    #[test]
    fn disabled_lcd_pins_ly_and_mode_to_zero() {
        let mut rig = Rig::new(0x00);
        rig.tick(456 * 10);

        assert_eq!(rig.io[LY], 0);
        assert_eq!(rig.mode(), 0);
        assert_eq!(rig.iflag, 0);
    }

    #[test]
    fn visible_line_walks_modes_2_3_0() {
        let mut rig = Rig::new(0x80);
        rig.tick(0);
        assert_eq!(rig.io[LY], 0);
        assert_eq!(rig.mode(), 2);

        rig.tick(80);
        assert_eq!(rig.mode(), 3);

        rig.tick(172);
        assert_eq!(rig.mode(), 0);

        rig.tick(204);
        assert_eq!(rig.io[LY], 1);
        assert_eq!(rig.mode(), 2);
    }

    #[test]
    fn vblank_entry_raises_interrupt_and_mode_1() {
        let mut rig = Rig::new(0x80);
        rig.tick(456 * 144);

        assert_eq!(rig.io[LY], 144);
        assert_eq!(rig.mode(), 1);
        assert_ne!(rig.iflag & 0x01, 0);
    }

    #[test]
    fn frame_latches_after_line_153_and_ly_wraps() {
        let mut rig = Rig::new(0x80);

        rig.tick(456 * 154 - 4);
        assert!(!rig.ppu.frame_ready());
        assert_eq!(rig.io[LY], 153);

        rig.tick(4);
        assert!(rig.ppu.frame_ready());
        assert_eq!(rig.io[LY], 0);
        assert_eq!(rig.mode(), 2);
    }

    #[test]
    fn lyc_coincidence_interrupts_once_per_edge() {
        let mut rig = Rig::new(0x80);
        rig.io[LYC] = 1;
        rig.io[STAT] = 0x40;

        rig.tick(456);
        assert_eq!(rig.io[LY], 1);
        assert_ne!(rig.io[STAT] & 0x04, 0);
        assert_ne!(rig.iflag & 0x02, 0);

        // Still coincident; no re-trigger.
        rig.iflag = 0;
        rig.tick(4);
        assert_eq!(rig.iflag & 0x02, 0);
    }
}
