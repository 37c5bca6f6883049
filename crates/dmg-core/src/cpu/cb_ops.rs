//! CB-prefixed opcode grid: one shift/rotate block, then BIT/RES/SET,
//! each indexed by (operation, operand) with `[HL]` as operand column 6.

use crate::bus::Bus;

use super::cpu::{Cpu, Flag, R8};
use super::ops::r8_from_code;

#[inline]
fn rw_cycles(r: R8) -> u32 {
    if r == R8::HlInd {
        16
    } else {
        8
    }
}

pub fn exec(cpu: &mut Cpu, bus: &mut Bus, opcode: u8) -> u32 {
    let r = r8_from_code(opcode);
    let bit = (opcode >> 3) & 0x07;

    match opcode {
        // RLC / RRC / RL / RR / SLA / SRA / SWAP / SRL
        0x00..=0x3F => {
            let v = cpu.read_r8(bus, r);
            let carry_in = cpu.flag(Flag::C) as u8;

            let (res, carry_out) = match bit {
                0x0 => (v.rotate_left(1), v & 0x80 != 0),
                0x1 => (v.rotate_right(1), v & 0x01 != 0),
                0x2 => ((v << 1) | carry_in, v & 0x80 != 0),
                0x3 => ((v >> 1) | (carry_in << 7), v & 0x01 != 0),
                0x4 => (v << 1, v & 0x80 != 0),
                // SRA keeps the sign bit.
                0x5 => ((v >> 1) | (v & 0x80), v & 0x01 != 0),
                0x6 => (v.rotate_right(4), false),
                _ => (v >> 1, v & 0x01 != 0),
            };

            cpu.write_r8(bus, r, res);
            cpu.set_flag(Flag::Z, res == 0);
            cpu.set_flag(Flag::N, false);
            cpu.set_flag(Flag::H, false);
            cpu.set_flag(Flag::C, carry_out);

            rw_cycles(r)
        }

        // BIT b,r: read-only, C untouched.
        0x40..=0x7F => {
            let v = cpu.read_r8(bus, r);
            cpu.set_flag(Flag::Z, v & (1 << bit) == 0);
            cpu.set_flag(Flag::N, false);
            cpu.set_flag(Flag::H, true);
            if r == R8::HlInd {
                12
            } else {
                8
            }
        }

        // RES b,r
        0x80..=0xBF => {
            let v = cpu.read_r8(bus, r);
            cpu.write_r8(bus, r, v & !(1 << bit));
            rw_cycles(r)
        }

        // SET b,r
        0xC0..=0xFF => {
            let v = cpu.read_r8(bus, r);
            cpu.write_r8(bus, r, v | (1 << bit));
            rw_cycles(r)
        }
    }
}
