use bitflags::bitflags;

pub const LCD_WIDTH: usize = 160;
pub const LCD_HEIGHT: usize = 144;
pub const FRAMEBUFFER_LEN: usize = LCD_WIDTH * LCD_HEIGHT;

/// One byte per pixel, shade index 0 (lightest) to 3 (darkest), row-major.
pub type Framebuffer = [u8; FRAMEBUFFER_LEN];

bitflags! {
    /// LCDC (FF40) control bits.
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct Lcdc: u8 {
        const BG_WINDOW_ENABLE = 1 << 0;
        const OBJ_ENABLE = 1 << 1;
        const OBJ_TALL = 1 << 2;
        const BG_TILEMAP_HIGH = 1 << 3;
        const TILEDATA_UNSIGNED = 1 << 4;
        const WINDOW_ENABLE = 1 << 5;
        const WINDOW_TILEMAP_HIGH = 1 << 6;
        const LCD_ENABLE = 1 << 7;
    }
}

mod fetch;
#[allow(clippy::module_inception)]
mod ppu;

pub use ppu::Ppu;
