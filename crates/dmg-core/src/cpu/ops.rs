//! Primary (non-CB) opcode dispatch. Opcodes are decoded over the regular
//! operation x operand grid; each arm returns its documented T-cycle cost.

use crate::bus::Bus;
use crate::interrupt::pending_mask;

use super::cpu::{Cpu, Flag, R8};

pub(super) fn r8_from_code(code: u8) -> R8 {
    match code & 0x07 {
        0 => R8::B,
        1 => R8::C,
        2 => R8::D,
        3 => R8::E,
        4 => R8::H,
        5 => R8::L,
        6 => R8::HlInd,
        _ => R8::A,
    }
}

/// H from the nibble sum, C from the widened sum, then the result and Z.
fn alu_add(cpu: &mut Cpu, a: u8, b: u8, carry_in: u8) -> u8 {
    let sum = a as u16 + b as u16 + carry_in as u16;
    cpu.set_flag(Flag::N, false);
    cpu.set_flag(Flag::H, (a & 0x0F) + (b & 0x0F) + carry_in > 0x0F);
    cpu.set_flag(Flag::C, sum > 0xFF);
    let res = sum as u8;
    cpu.set_flag(Flag::Z, res == 0);
    res
}

fn alu_sub(cpu: &mut Cpu, a: u8, b: u8, carry_in: u8) -> u8 {
    let res = a.wrapping_sub(b).wrapping_sub(carry_in);
    cpu.set_flag(Flag::N, true);
    cpu.set_flag(Flag::H, (a & 0x0F) < (b & 0x0F) + carry_in);
    cpu.set_flag(Flag::C, (a as u16) < b as u16 + carry_in as u16);
    cpu.set_flag(Flag::Z, res == 0);
    res
}

/// One column of the 0x80..=0xBF block (also reused by the d8 variants):
/// ADD/ADC/SUB/SBC/AND/XOR/OR/CP selected by bits 3-5 of the opcode.
fn alu_apply(cpu: &mut Cpu, op: u8, v: u8) {
    let carry = cpu.flag(Flag::C) as u8;
    match op & 0x07 {
        0 => cpu.a = alu_add(cpu, cpu.a, v, 0),
        1 => cpu.a = alu_add(cpu, cpu.a, v, carry),
        2 => cpu.a = alu_sub(cpu, cpu.a, v, 0),
        3 => cpu.a = alu_sub(cpu, cpu.a, v, carry),
        4 => {
            cpu.a &= v;
            let z = cpu.a == 0;
            cpu.set_flag(Flag::Z, z);
            cpu.set_flag(Flag::N, false);
            cpu.set_flag(Flag::H, true);
            cpu.set_flag(Flag::C, false);
        }
        5 => {
            cpu.a ^= v;
            let z = cpu.a == 0;
            cpu.set_flag(Flag::Z, z);
            cpu.set_flag(Flag::N, false);
            cpu.set_flag(Flag::H, false);
            cpu.set_flag(Flag::C, false);
        }
        6 => {
            cpu.a |= v;
            let z = cpu.a == 0;
            cpu.set_flag(Flag::Z, z);
            cpu.set_flag(Flag::N, false);
            cpu.set_flag(Flag::H, false);
            cpu.set_flag(Flag::C, false);
        }
        _ => {
            // CP: flags of a subtraction, A untouched.
            let _ = alu_sub(cpu, cpu.a, v, 0);
        }
    }
}

/// Condition field shared by JR/JP/CALL/RET: NZ, Z, NC, C.
fn cond(cpu: &Cpu, opcode: u8) -> bool {
    match (opcode >> 3) & 0x03 {
        0 => !cpu.flag(Flag::Z),
        1 => cpu.flag(Flag::Z),
        2 => !cpu.flag(Flag::C),
        _ => cpu.flag(Flag::C),
    }
}

/// BCD adjust after an ADD/SUB-class instruction, driven by N/H/C.
fn daa(cpu: &mut Cpu) {
    let mut adjust = 0u8;
    let mut carry = cpu.flag(Flag::C);

    if !cpu.flag(Flag::N) {
        if cpu.flag(Flag::H) || (cpu.a & 0x0F) > 0x09 {
            adjust |= 0x06;
        }
        if carry || cpu.a > 0x99 {
            adjust |= 0x60;
            carry = true;
        }
        cpu.a = cpu.a.wrapping_add(adjust);
    } else {
        if cpu.flag(Flag::H) {
            adjust |= 0x06;
        }
        if carry {
            adjust |= 0x60;
        }
        cpu.a = cpu.a.wrapping_sub(adjust);
    }

    let z = cpu.a == 0;
    cpu.set_flag(Flag::Z, z);
    cpu.set_flag(Flag::H, false);
    cpu.set_flag(Flag::C, carry);
}

/// SP + sign-extended immediate; H and C come from the low nibble/byte of
/// the unsigned addition, Z and N are always clear. Shared by ADD SP,e8
/// and LD HL,SP+e8.
fn sp_plus_e8(cpu: &mut Cpu, bus: &mut Bus) -> u16 {
    let e = cpu.fetch8(bus) as i8 as i16 as u16;
    let sp = cpu.sp;
    cpu.set_flag(Flag::Z, false);
    cpu.set_flag(Flag::N, false);
    cpu.set_flag(Flag::H, (sp & 0x0F) + (e & 0x0F) > 0x0F);
    cpu.set_flag(Flag::C, (sp & 0xFF) + (e & 0xFF) > 0xFF);
    sp.wrapping_add(e)
}

pub fn exec(cpu: &mut Cpu, bus: &mut Bus, opcode: u8) -> u32 {
    match opcode {
        0x00 => 4, // NOP

        0x10 => {
            // STOP consumes its padding byte; without a speed switch to
            // perform it parks the CPU like HALT.
            let _ = cpu.fetch8(bus);
            cpu.halted = true;
            8
        }

        // LD rr,d16
        0x01 | 0x11 | 0x21 | 0x31 => {
            let v = cpu.fetch16(bus);
            match opcode {
                0x01 => cpu.set_bc(v),
                0x11 => cpu.set_de(v),
                0x21 => cpu.set_hl(v),
                _ => cpu.sp = v,
            }
            12
        }

        // LD (a16),SP
        0x08 => {
            let addr = cpu.fetch16(bus);
            let [lo, hi] = cpu.sp.to_le_bytes();
            cpu.write8(bus, addr, lo);
            cpu.write8(bus, addr.wrapping_add(1), hi);
            20
        }

        // LD (BC/DE),A and LD A,(BC/DE)
        0x02 => {
            let addr = cpu.bc();
            cpu.write8(bus, addr, cpu.a);
            8
        }
        0x12 => {
            let addr = cpu.de();
            cpu.write8(bus, addr, cpu.a);
            8
        }
        0x0A => {
            let addr = cpu.bc();
            cpu.a = cpu.read8(bus, addr);
            8
        }
        0x1A => {
            let addr = cpu.de();
            cpu.a = cpu.read8(bus, addr);
            8
        }

        // LD (HL+/-),A and LD A,(HL+/-)
        0x22 | 0x32 | 0x2A | 0x3A => {
            let addr = cpu.hl();
            if (opcode & 0x08) == 0 {
                cpu.write8(bus, addr, cpu.a);
            } else {
                cpu.a = cpu.read8(bus, addr);
            }
            let next = if (opcode & 0x10) == 0 {
                addr.wrapping_add(1)
            } else {
                addr.wrapping_sub(1)
            };
            cpu.set_hl(next);
            8
        }

        // LD (a16),A / LD A,(a16)
        0xEA => {
            let addr = cpu.fetch16(bus);
            cpu.write8(bus, addr, cpu.a);
            16
        }
        0xFA => {
            let addr = cpu.fetch16(bus);
            cpu.a = cpu.read8(bus, addr);
            16
        }

        // LDH (a8),A / LDH A,(a8)
        0xE0 => {
            let n = cpu.fetch8(bus) as u16;
            cpu.write8(bus, 0xFF00 | n, cpu.a);
            12
        }
        0xF0 => {
            let n = cpu.fetch8(bus) as u16;
            cpu.a = cpu.read8(bus, 0xFF00 | n);
            12
        }

        // LD (FF00+C),A / LD A,(FF00+C)
        0xE2 => {
            let addr = 0xFF00 | cpu.c as u16;
            cpu.write8(bus, addr, cpu.a);
            8
        }
        0xF2 => {
            let addr = 0xFF00 | cpu.c as u16;
            cpu.a = cpu.read8(bus, addr);
            8
        }

        // LD r,d8
        0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
            let r = r8_from_code(opcode >> 3);
            let v = cpu.fetch8(bus);
            cpu.write_r8(bus, r, v);
            if r == R8::HlInd {
                12
            } else {
                8
            }
        }

        0x76 => {
            // HALT. With IME off and an interrupt already pending, the
            // halt bug makes the next fetch repeat without advancing PC.
            if !cpu.ime && pending_mask(bus.ie, bus.iflag) != 0 {
                cpu.halt_bug = true;
            }
            cpu.halted = true;
            4
        }

        // LD r,r' (the 0x76 hole above is HALT)
        0x40..=0x7F => {
            let dst = r8_from_code(opcode >> 3);
            let src = r8_from_code(opcode);
            let v = cpu.read_r8(bus, src);
            cpu.write_r8(bus, dst, v);
            if dst == R8::HlInd || src == R8::HlInd {
                8
            } else {
                4
            }
        }

        // INC r / DEC r
        0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C | 0x05 | 0x0D | 0x15 | 0x1D
        | 0x25 | 0x2D | 0x35 | 0x3D => {
            let r = r8_from_code(opcode >> 3);
            let v = cpu.read_r8(bus, r);
            let res = if (opcode & 0x01) == 0 {
                let res = v.wrapping_add(1);
                cpu.set_flag(Flag::N, false);
                cpu.set_flag(Flag::H, (v & 0x0F) == 0x0F);
                res
            } else {
                let res = v.wrapping_sub(1);
                cpu.set_flag(Flag::N, true);
                cpu.set_flag(Flag::H, (v & 0x0F) == 0x00);
                res
            };
            cpu.set_flag(Flag::Z, res == 0);
            cpu.write_r8(bus, r, res);
            if r == R8::HlInd {
                12
            } else {
                4
            }
        }

        // INC rr / DEC rr (no flags)
        0x03 | 0x13 | 0x23 | 0x33 | 0x0B | 0x1B | 0x2B | 0x3B => {
            let delta: u16 = if (opcode & 0x08) == 0 { 1 } else { 0xFFFF };
            match opcode & 0x30 {
                0x00 => cpu.set_bc(cpu.bc().wrapping_add(delta)),
                0x10 => cpu.set_de(cpu.de().wrapping_add(delta)),
                0x20 => cpu.set_hl(cpu.hl().wrapping_add(delta)),
                _ => cpu.sp = cpu.sp.wrapping_add(delta),
            }
            8
        }

        // ADD HL,rr
        0x09 | 0x19 | 0x29 | 0x39 => {
            let hl = cpu.hl();
            let rr = match opcode {
                0x09 => cpu.bc(),
                0x19 => cpu.de(),
                0x29 => hl,
                _ => cpu.sp,
            };
            let sum = hl as u32 + rr as u32;
            cpu.set_flag(Flag::N, false);
            cpu.set_flag(Flag::H, (hl & 0x0FFF) + (rr & 0x0FFF) > 0x0FFF);
            cpu.set_flag(Flag::C, sum > 0xFFFF);
            cpu.set_hl(sum as u16);
            8
        }

        // ALU A,r
        0x80..=0xBF => {
            let r = r8_from_code(opcode);
            let v = cpu.read_r8(bus, r);
            alu_apply(cpu, opcode >> 3, v);
            if r == R8::HlInd {
                8
            } else {
                4
            }
        }

        // ALU A,d8
        0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
            let v = cpu.fetch8(bus);
            alu_apply(cpu, opcode >> 3, v);
            8
        }

        // JR e8 (0x18 unconditional)
        0x18 | 0x20 | 0x28 | 0x30 | 0x38 => {
            let off = cpu.fetch8(bus) as i8;
            if opcode == 0x18 || cond(cpu, opcode) {
                cpu.pc = cpu.pc.wrapping_add(off as u16);
                12
            } else {
                8
            }
        }

        // JP
        0xC3 => {
            cpu.pc = cpu.fetch16(bus);
            16
        }
        0xE9 => {
            cpu.pc = cpu.hl();
            4
        }
        0xC2 | 0xCA | 0xD2 | 0xDA => {
            let addr = cpu.fetch16(bus);
            if cond(cpu, opcode) {
                cpu.pc = addr;
                16
            } else {
                12
            }
        }

        // CALL
        0xCD => {
            let addr = cpu.fetch16(bus);
            cpu.push16(bus, cpu.pc);
            cpu.pc = addr;
            24
        }
        0xC4 | 0xCC | 0xD4 | 0xDC => {
            let addr = cpu.fetch16(bus);
            if cond(cpu, opcode) {
                cpu.push16(bus, cpu.pc);
                cpu.pc = addr;
                24
            } else {
                12
            }
        }

        // RET / RETI; a taken conditional return costs 20.
        0xC9 => {
            cpu.pc = cpu.pop16(bus);
            16
        }
        0xD9 => {
            cpu.pc = cpu.pop16(bus);
            cpu.ime = true;
            16
        }
        0xC0 | 0xC8 | 0xD0 | 0xD8 => {
            if cond(cpu, opcode) {
                cpu.pc = cpu.pop16(bus);
                20
            } else {
                8
            }
        }

        // RST
        0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
            let vec = (opcode & 0x38) as u16;
            cpu.push16(bus, cpu.pc);
            cpu.pc = vec;
            16
        }

        // PUSH rr / POP rr
        0xC5 | 0xD5 | 0xE5 | 0xF5 => {
            let v = match opcode {
                0xC5 => cpu.bc(),
                0xD5 => cpu.de(),
                0xE5 => cpu.hl(),
                _ => cpu.af(),
            };
            cpu.push16(bus, v);
            16
        }
        0xC1 | 0xD1 | 0xE1 | 0xF1 => {
            let v = cpu.pop16(bus);
            match opcode {
                0xC1 => cpu.set_bc(v),
                0xD1 => cpu.set_de(v),
                0xE1 => cpu.set_hl(v),
                // POP AF forces the low flag nibble to zero.
                _ => cpu.set_af(v),
            }
            12
        }

        0x27 => {
            daa(cpu);
            4
        }
        0x2F => {
            // CPL
            cpu.a = !cpu.a;
            cpu.set_flag(Flag::N, true);
            cpu.set_flag(Flag::H, true);
            4
        }
        0x37 => {
            // SCF
            cpu.set_flag(Flag::N, false);
            cpu.set_flag(Flag::H, false);
            cpu.set_flag(Flag::C, true);
            4
        }
        0x3F => {
            // CCF
            let c = cpu.flag(Flag::C);
            cpu.set_flag(Flag::N, false);
            cpu.set_flag(Flag::H, false);
            cpu.set_flag(Flag::C, !c);
            4
        }
        0xF3 => {
            // DI
            cpu.ime = false;
            cpu.ei_pending = false;
            4
        }
        0xFB => {
            // EI (takes effect after the next instruction)
            cpu.ei_pending = true;
            4
        }

        // RLCA / RRCA / RLA / RRA: the one-byte A rotates always clear Z.
        0x07 | 0x0F | 0x17 | 0x1F => {
            let carry_in = cpu.flag(Flag::C) as u8;
            let (res, carry_out) = match opcode {
                0x07 => (cpu.a.rotate_left(1), cpu.a & 0x80 != 0),
                0x0F => (cpu.a.rotate_right(1), cpu.a & 0x01 != 0),
                0x17 => ((cpu.a << 1) | carry_in, cpu.a & 0x80 != 0),
                _ => ((cpu.a >> 1) | (carry_in << 7), cpu.a & 0x01 != 0),
            };
            cpu.a = res;
            cpu.set_flag(Flag::Z, false);
            cpu.set_flag(Flag::N, false);
            cpu.set_flag(Flag::H, false);
            cpu.set_flag(Flag::C, carry_out);
            4
        }

        // ADD SP,e8 / LD HL,SP+e8
        0xE8 => {
            cpu.sp = sp_plus_e8(cpu, bus);
            16
        }
        0xF8 => {
            let v = sp_plus_e8(cpu, bus);
            cpu.set_hl(v);
            12
        }

        // LD SP,HL
        0xF9 => {
            cpu.sp = cpu.hl();
            8
        }

        // The 11 unassigned opcodes lock the CPU for good.
        _ => {
            cpu.locked = true;
            4
        }
    }
}
