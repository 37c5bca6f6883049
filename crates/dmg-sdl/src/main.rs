//! SDL2 frontend: window + streaming texture for the shade framebuffer,
//! keyboard polling for the joypad, battery-save sidecar handling.

use std::path::PathBuf;

use dmg_core::cartridge::Cartridge;
use dmg_core::gb::GameBoy;
use dmg_core::input::Buttons;
use dmg_core::ppu::{Framebuffer, LCD_HEIGHT, LCD_WIDTH};

use sdl2::event::Event;
use sdl2::keyboard::{KeyboardState, Keycode, Scancode};
use sdl2::pixels::PixelFormatEnum;

/// Shade 0 (lightest) to 3 (darkest) as RGB.
const SHADES: [[u8; 3]; 4] = [
    [0xFF, 0xFF, 0xFF],
    [0xAA, 0xAA, 0xAA],
    [0x55, 0x55, 0x55],
    [0x00, 0x00, 0x00],
];

fn scancode_button(sc: Scancode) -> Option<Buttons> {
    match sc {
        Scancode::Right => Some(Buttons::RIGHT),
        Scancode::Left => Some(Buttons::LEFT),
        Scancode::Up => Some(Buttons::UP),
        Scancode::Down => Some(Buttons::DOWN),
        Scancode::Z => Some(Buttons::A),
        Scancode::X => Some(Buttons::B),
        Scancode::Backspace => Some(Buttons::SELECT),
        Scancode::Return => Some(Buttons::START),
        _ => None,
    }
}

/// Poll the full keyboard state into the eight-button set.
fn sample_buttons(ks: &KeyboardState) -> Buttons {
    ks.pressed_scancodes()
        .filter_map(scancode_button)
        .fold(Buttons::empty(), |acc, b| acc | b)
}

fn write_framebuffer_rgb24(fb: &Framebuffer, out: &mut [u8]) {
    assert_eq!(out.len(), fb.len() * 3);
    for (shade, px) in fb.iter().zip(out.chunks_exact_mut(3)) {
        px.copy_from_slice(&SHADES[(*shade & 0x03) as usize]);
    }
}

fn run() -> Result<(), String> {
    let rom_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .ok_or("usage: dmg-sdl <rom.gb>")?;

    let rom = std::fs::read(&rom_path)
        .map_err(|e| format!("failed to read ROM {}: {e}", rom_path.display()))?;
    let cart = Cartridge::from_rom(rom).map_err(|e| format!("unsupported ROM: {e:?}"))?;

    let save_path: PathBuf = rom_path.with_extension("sav");

    let mut gb = GameBoy::new(cart);
    gb.bus
        .load_from_path(&save_path)
        .map_err(|e| format!("failed to load save {}: {e:?}", save_path.display()))?;

    let sdl = sdl2::init()?;
    let video = sdl.video()?;

    let window = video
        .window("dmg-sdl", (LCD_WIDTH as u32) * 3, (LCD_HEIGHT as u32) * 3)
        .position_centered()
        .resizable()
        .build()
        .map_err(|e| e.to_string())?;

    let mut canvas = window
        .into_canvas()
        .present_vsync()
        .build()
        .map_err(|e| e.to_string())?;
    canvas
        .set_logical_size(LCD_WIDTH as u32, LCD_HEIGHT as u32)
        .map_err(|e| e.to_string())?;

    let texture_creator = canvas.texture_creator();
    let mut texture = texture_creator
        .create_texture_streaming(PixelFormatEnum::RGB24, LCD_WIDTH as u32, LCD_HEIGHT as u32)
        .map_err(|e| e.to_string())?;
    let mut pixels = vec![0u8; LCD_WIDTH * LCD_HEIGHT * 3];

    let mut event_pump = sdl.event_pump()?;

    'running: loop {
        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => break 'running,
                _ => {}
            }
        }

        let buttons = sample_buttons(&event_pump.keyboard_state());
        gb.bus.set_buttons(buttons);

        gb.run_frame();
        write_framebuffer_rgb24(gb.bus.ppu.framebuffer(), &mut pixels);

        texture
            .update(None, &pixels, LCD_WIDTH * 3)
            .map_err(|e| e.to_string())?;

        canvas.clear();
        canvas
            .copy(&texture, None, None)
            .map_err(|e| e.to_string())?;
        canvas.present();
    }

    gb.bus
        .save_to_path(&save_path)
        .map_err(|e| format!("failed to write save {}: {e:?}", save_path.display()))?;

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
