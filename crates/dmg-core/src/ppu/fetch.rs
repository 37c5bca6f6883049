//! Mode-3 pixel pipeline: the per-scanline sprite buffer filled during OAM
//! scan, and the tile fetcher that emits eight pixels per iteration and
//! commits them at each tile boundary.

use serde::{Deserialize, Serialize};

use super::{Framebuffer, Lcdc, LCD_WIDTH};

const LCDC: usize = 0x40;
const SCY: usize = 0x42;
const SCX: usize = 0x43;
const BGP: usize = 0x47;
const OBP0: usize = 0x48;
const OBP1: usize = 0x49;
const WY: usize = 0x4A;
const WX: usize = 0x4B;

const SPRITES_PER_LINE: usize = 10;
const TILE_PIXELS: usize = 8;

/// OAM entry captured by the mode-2 scan. `fetched` flips once the
/// fetcher has consumed the sprite on this line.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize)]
struct SpriteEntry {
    y: u8,
    x: u8,
    tile: u8,
    flags: u8,
    fetched: bool,
}

impl SpriteEntry {
    fn behind_bg(&self) -> bool {
        self.flags & 0x80 != 0
    }

    fn y_flip(&self) -> bool {
        self.flags & 0x40 != 0
    }

    fn x_flip(&self) -> bool {
        self.flags & 0x20 != 0
    }

    fn uses_obp1(&self) -> bool {
        self.flags & 0x10 != 0
    }
}

/// One background/window pixel queued for the current tile.
#[derive(Copy, Clone, Default)]
struct Pixel {
    /// 2-bit color number, pre-palette.
    color: u8,
}

/// Scanline fetcher state. The sprite buffer is rebuilt each line; the
/// window line counter survives for the whole frame.
#[derive(Serialize, Deserialize)]
pub(super) struct Fetcher {
    sprites: [SpriteEntry; SPRITES_PER_LINE],
    sprite_count: u8,
    /// Window-internal row; advances only after lines that drew window
    /// pixels.
    window_line: u8,
    window_drawn: bool,
}

impl Fetcher {
    pub fn new() -> Self {
        Self {
            sprites: [SpriteEntry::default(); SPRITES_PER_LINE],
            sprite_count: 0,
            window_line: 0,
            window_drawn: false,
        }
    }

    /// Frame boundary: the window restarts at its first row.
    pub fn start_frame(&mut self) {
        self.window_line = 0;
        self.window_drawn = false;
        self.sprite_count = 0;
    }

    /// End of a scanline: advance the window row if the line used the
    /// window, and drop the sprite buffer.
    pub fn finish_line(&mut self) {
        if self.window_drawn {
            self.window_line = self.window_line.wrapping_add(1);
            self.window_drawn = false;
        }
        self.sprite_count = 0;
    }

    /// Mode-2 OAM scan: collect the first ten on-screen sprites whose Y
    /// span contains LY+16.
    pub fn scan_oam(&mut self, ly: u8, oam: &[u8; 0xA0], lcdc: Lcdc) {
        self.sprite_count = 0;
        let height: u16 = if lcdc.contains(Lcdc::OBJ_TALL) { 16 } else { 8 };
        let line = ly as u16 + 16;

        for entry in oam.chunks_exact(4) {
            if self.sprite_count as usize == SPRITES_PER_LINE {
                break;
            }
            let y = entry[0] as u16;
            if entry[1] == 0 || line < y || line >= y + height {
                continue;
            }
            self.sprites[self.sprite_count as usize] = SpriteEntry {
                y: entry[0],
                x: entry[1],
                tile: entry[2],
                flags: entry[3],
                fetched: false,
            };
            self.sprite_count += 1;
        }
    }

    /// Mode-3 pixel transfer for one scanline: twenty fetcher iterations,
    /// each emitting one tile of background or window pixels and any
    /// sprites whose span has been reached, then committing the tile.
    pub fn run_scanline(
        &mut self,
        fb: &mut Framebuffer,
        ly: u8,
        vram: &[u8; 0x2000],
        io: &[u8; 0x80],
    ) {
        let lcdc = Lcdc::from_bits_truncate(io[LCDC]);
        let bgp = io[BGP];

        let mut window_col: u16 = 0;
        // Columns already claimed by a sprite this line; the first sprite
        // to reach a column keeps it.
        let mut claimed = [false; LCD_WIDTH];

        for tile_index in 0..LCD_WIDTH / TILE_PIXELS {
            let x0 = (tile_index * TILE_PIXELS) as u8;

            let mut queue = [Pixel::default(); TILE_PIXELS];
            if lcdc.contains(Lcdc::BG_WINDOW_ENABLE) {
                self.fetch_bg_tile(&mut queue, tile_index as u16, ly, vram, io, lcdc);

                if self.window_reached(ly, x0, io, lcdc) {
                    self.fetch_window_tile(&mut queue, window_col, vram, io, lcdc);
                    window_col += 1;
                    self.window_drawn = true;
                }
            }

            // Commit the tile: background/window first, sprites on top.
            let row = &mut fb[ly as usize * LCD_WIDTH..][..LCD_WIDTH];
            for (i, px) in queue.iter().enumerate() {
                row[x0 as usize + i] = shade(bgp, px.color);
            }

            if lcdc.contains(Lcdc::OBJ_ENABLE) {
                self.overlay_sprites(row, &mut claimed, x0, ly, vram, io, lcdc);
            }
        }
    }

    /// Window takes over once enabled, WY has been reached, and the
    /// current x is at or past WX-7.
    fn window_reached(&self, ly: u8, x0: u8, io: &[u8; 0x80], lcdc: Lcdc) -> bool {
        lcdc.contains(Lcdc::WINDOW_ENABLE)
            && io[WY] <= ly
            && (io[WX] as i16 - 7) <= x0 as i16
    }

    fn fetch_bg_tile(
        &self,
        queue: &mut [Pixel; TILE_PIXELS],
        x_offset: u16,
        ly: u8,
        vram: &[u8; 0x2000],
        io: &[u8; 0x80],
        lcdc: Lcdc,
    ) {
        let map_base: usize = if lcdc.contains(Lcdc::BG_TILEMAP_HIGH) {
            0x1C00
        } else {
            0x1800
        };

        let y = ly.wrapping_add(io[SCY]);
        let tile_col = (io[SCX] as u16 / 8 + x_offset) % 32;
        let tile_row = 32 * (y as u16 / 8);
        let tile_id = vram[map_base + (tile_row + tile_col) as usize];

        let row_addr = tile_row_addr(tile_id, y as u16 % 8, lcdc);
        fill_tile_queue(queue, vram[row_addr], vram[row_addr + 1]);
    }

    fn fetch_window_tile(
        &self,
        queue: &mut [Pixel; TILE_PIXELS],
        window_col: u16,
        vram: &[u8; 0x2000],
        io: &[u8; 0x80],
        lcdc: Lcdc,
    ) {
        let map_base: usize = if lcdc.contains(Lcdc::WINDOW_TILEMAP_HIGH) {
            0x1C00
        } else {
            0x1800
        };

        let tile_row = 32 * (self.window_line as u16 / 8);
        let tile_id = vram[map_base + (tile_row + window_col % 32) as usize];

        let row_addr = tile_row_addr(tile_id, self.window_line as u16 % 8, lcdc);
        fill_tile_queue(queue, vram[row_addr], vram[row_addr + 1]);
    }

    /// Fetch every buffered sprite whose span has been reached and lay its
    /// pixels over the committed scanline. Sprite tile data always reads
    /// from 0x8000.
    #[allow(clippy::too_many_arguments)]
    fn overlay_sprites(
        &mut self,
        row: &mut [u8],
        claimed: &mut [bool; LCD_WIDTH],
        x0: u8,
        ly: u8,
        vram: &[u8; 0x2000],
        io: &[u8; 0x80],
        lcdc: Lcdc,
    ) {
        let tall = lcdc.contains(Lcdc::OBJ_TALL);
        let height: i16 = if tall { 16 } else { 8 };
        let bg_zero_shade = io[BGP] & 0x03;

        for i in 0..self.sprite_count as usize {
            let sprite = self.sprites[i];
            let start_x = sprite.x as i16 - 8;
            if sprite.fetched || start_x > x0 as i16 {
                continue;
            }
            self.sprites[i].fetched = true;

            let mut line = ly as i16 + 16 - sprite.y as i16;
            if sprite.y_flip() {
                line = height - 1 - line;
            }

            let mut tile = sprite.tile;
            if tall {
                tile &= 0xFE;
                if line >= 8 {
                    tile = tile.wrapping_add(1);
                    line -= 8;
                }
            }

            let row_addr = tile as usize * 16 + line as usize * 2;
            let lo = vram[row_addr];
            let hi = vram[row_addr + 1];

            let palette = if sprite.uses_obp1() {
                io[OBP1]
            } else {
                io[OBP0]
            };

            for px in 0..TILE_PIXELS {
                let x = start_x + px as i16;
                if !(0..LCD_WIDTH as i16).contains(&x) {
                    continue;
                }
                let x = x as usize;

                let bit = if sprite.x_flip() { px } else { 7 - px };
                let color = ((hi >> bit) & 1) << 1 | ((lo >> bit) & 1);
                // Color 0 is transparent.
                if color == 0 || claimed[x] {
                    continue;
                }
                claimed[x] = true;

                if sprite.behind_bg() && row[x] != bg_zero_shade {
                    continue;
                }
                row[x] = shade(palette, color);
            }
        }
    }
}

/// VRAM offset of a background/window tile row for the LCDC addressing
/// mode: unsigned indices from 0x8000 or signed indices around 0x9000.
fn tile_row_addr(tile_id: u8, fine_row: u16, lcdc: Lcdc) -> usize {
    let base = if lcdc.contains(Lcdc::TILEDATA_UNSIGNED) {
        tile_id as usize * 16
    } else {
        (0x1000i32 + tile_id as i8 as i32 * 16) as usize
    };
    base + fine_row as usize * 2
}

/// Decode one tile row (low bit-plane, high bit-plane) into the queue,
/// bit 7 first.
fn fill_tile_queue(queue: &mut [Pixel; TILE_PIXELS], lo: u8, hi: u8) {
    for (i, px) in queue.iter_mut().enumerate() {
        let bit = 7 - i;
        px.color = ((hi >> bit) & 1) << 1 | ((lo >> bit) & 1);
    }
}

/// Map a 2-bit color number through a palette register to a shade.
#[inline]
fn shade(palette: u8, color: u8) -> u8 {
    (palette >> (color * 2)) & 0x03
}
