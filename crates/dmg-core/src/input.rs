use crate::interrupt::Interrupt;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Host-side button state; a set bit means pressed.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
    pub struct Buttons: u8 {
        const RIGHT = 1 << 0;
        const LEFT = 1 << 1;
        const UP = 1 << 2;
        const DOWN = 1 << 3;
        const A = 1 << 4;
        const B = 1 << 5;
        const SELECT = 1 << 6;
        const START = 1 << 7;
    }
}

/// Joypad (JOYP/P1) register + sampled button state.
///
/// - 0xFF00 bits 4-5 are row-select lines (active low)
/// - bits 0-3 are input lines (active low), computed at read time
/// - bits 6-7 read as 1
#[derive(Serialize, Deserialize)]
pub struct Joypad {
    /// Raw select bits (4-5) as last written by the CPU.
    select: u8,
    /// Pressed-button mask in `Buttons` layout.
    state: u8,
}

impl Joypad {
    pub fn new() -> Self {
        Self {
            select: 0x30,
            state: 0,
        }
    }

    #[inline]
    pub fn read_joyp(&self) -> u8 {
        let directions_selected = (self.select & 0x10) == 0;
        let buttons_selected = (self.select & 0x20) == 0;

        // Exactly one row may drive the input lines; both or neither
        // selected reads as released.
        let nibble = match (directions_selected, buttons_selected) {
            (true, false) => !self.state & 0x0F,
            (false, true) => !(self.state >> 4) & 0x0F,
            _ => 0x0F,
        };

        0xC0 | (self.select & 0x30) | nibble
    }

    #[inline]
    pub fn write_joyp(&mut self, val: u8) {
        self.select = val & 0x30;
    }

    /// Sample the host adapter's full button state. Newly pressed buttons
    /// raise the joypad interrupt.
    pub fn set_buttons(&mut self, buttons: Buttons, iflag: &mut u8) {
        let new = buttons.bits();
        if new & !self.state != 0 {
            *iflag |= Interrupt::Joypad.bit();
        }
        self.state = new;
    }

    /// Event-driven variant for frontends that track key transitions.
    pub fn set_button(&mut self, button: Buttons, pressed: bool, iflag: &mut u8) {
        let mut buttons = Buttons::from_bits_truncate(self.state);
        buttons.set(button, pressed);
        self.set_buttons(buttons, iflag);
    }
}

impl Default for Joypad {
    fn default() -> Self {
        Self::new()
    }
}
