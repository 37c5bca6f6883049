//! Serial port (SB/SC), modelled just far enough for the test-ROM
//! convention of writing a byte to SB and 0x81 to SC. There is no link
//! partner: the outgoing byte is captured at transfer start (programs
//! often rewrite SB/SC faster than a real shift-out), while SC bit 7 and
//! the serial interrupt follow the 8192 Hz transfer timing.

use crate::interrupt::Interrupt;
use serde::{Deserialize, Serialize};

/// 8 bits at the 8192 Hz internal clock.
const TRANSFER_CYCLES: u32 = 512 * 8;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Serial {
    /// Cycles left until the in-flight transfer completes.
    remaining: Option<u32>,
    #[serde(with = "serde_bytes")]
    output: Vec<u8>,
}

impl Serial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_transfer(&mut self, sb: u8) {
        self.output.push(sb);
        self.remaining = Some(TRANSFER_CYCLES);
    }

    pub fn stop_transfer(&mut self) {
        self.remaining = None;
    }

    /// Advance an in-flight transfer. On completion SC bit 7 clears and
    /// the serial interrupt is raised.
    pub fn tick(&mut self, cycles: u32, iflag: &mut u8, sc: &mut u8) {
        let Some(remaining) = &mut self.remaining else {
            return;
        };

        if *remaining > cycles {
            *remaining -= cycles;
            return;
        }

        self.remaining = None;
        *sc &= 0x7F;
        *iflag |= Interrupt::Serial.bit();
    }

    pub fn drain_output(&mut self) -> std::vec::Drain<'_, u8> {
        self.output.drain(..)
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }
}
