//! Emulator core for the original Game Boy (DMG): Sharp LR35902
//! interpreter, memory bus with ROM-only/MBC1 cartridges, scanline PPU,
//! timer, OAM DMA, joypad and interrupt controller — all driven in
//! lockstep from the bus's cycle sink.
//!
//! The core is headless. Frontends read [`ppu::Ppu::framebuffer`] when a
//! frame latches and feed button state through [`bus::Bus::set_buttons`].

pub mod bus;
pub mod cartridge;
pub mod cpu;
pub mod dma;
pub mod gb;
pub mod input;
pub mod interrupt;
pub mod ppu;
pub mod serial;
pub mod timer;
