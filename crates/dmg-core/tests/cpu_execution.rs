use dmg_core::bus::Bus;
use dmg_core::cartridge::Cartridge;
use dmg_core::cpu::{Cpu, Flag};

fn make_rom(program: &[u8]) -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];
    rom[0x0147] = 0x00; // ROM only
    rom[0x0149] = 0x00; // no RAM
    rom[..program.len()].copy_from_slice(program);
    rom
}

fn setup(program: &[u8]) -> (Cpu, Bus) {
    let cart = Cartridge::from_rom(make_rom(program)).unwrap();
    (Cpu::new(), Bus::new(cart))
}

fn assert_flags(cpu: &Cpu, z: bool, n: bool, h: bool, c: bool) {
    assert_eq!(cpu.flag(Flag::Z), z, "Z");
    assert_eq!(cpu.flag(Flag::N), n, "N");
    assert_eq!(cpu.flag(Flag::H), h, "H");
    assert_eq!(cpu.flag(Flag::C), c, "C");
}

#[test]
fn nop_costs_four_cycles_and_leaves_flags() {
    let mut rom = make_rom(&[]);
    rom[0x0100] = 0x00; // NOP
    let cart = Cartridge::from_rom(rom).unwrap();
    let mut bus = Bus::new(cart);
    let mut cpu = Cpu::new();

    cpu.a = 0x01;
    cpu.f = 0xB0;
    cpu.sp = 0xFFFE;
    cpu.pc = 0x0100;

    let cycles = cpu.step(&mut bus);

    assert_eq!(cycles, 4);
    assert_eq!(cpu.pc, 0x0101);
    assert_eq!(cpu.f, 0xB0);
}

#[test]
fn ei_enables_ime_after_following_instruction() {
    let (mut cpu, mut bus) = setup(&[0xFB, 0x00]); // EI ; NOP

    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 4);
    assert!(!cpu.ime);
    assert!(cpu.ei_pending);

    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 4);
    assert!(cpu.ime);
    assert!(!cpu.ei_pending);
}

#[test]
fn di_cancels_a_pending_ei() {
    let (mut cpu, mut bus) = setup(&[0xFB, 0xF3, 0x00]); // EI ; DI ; NOP

    cpu.step(&mut bus);
    assert!(cpu.ei_pending);

    cpu.step(&mut bus);
    assert!(!cpu.ime);
    assert!(!cpu.ei_pending);

    cpu.step(&mut bus);
    assert!(!cpu.ime);
}

#[test]
fn interrupt_after_ei_is_serviced_on_third_step() {
    let (mut cpu, mut bus) = setup(&[0xFB, 0x00, 0x00]); // EI ; NOP ; NOP
    cpu.sp = 0xFFFE;

    bus.ie = 0x01;
    bus.iflag = 0x01;

    cpu.step(&mut bus);
    assert_eq!(cpu.pc, 1);
    assert!(!cpu.ime);

    cpu.step(&mut bus);
    assert_eq!(cpu.pc, 2);
    assert!(cpu.ime);

    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 20);
    assert_eq!(cpu.pc, 0x0040);
    assert_eq!(cpu.sp, 0xFFFC);
    assert_eq!(bus.read8(0xFFFC), 0x02);
    assert_eq!(bus.read8(0xFFFD), 0x00);
}

#[test]
fn reti_restores_pc_and_enables_ime_immediately() {
    let (mut cpu, mut bus) = setup(&[0xD9]); // RETI
    cpu.sp = 0xFFFC;
    bus.write8(0xFFFC, 0x34);
    bus.write8(0xFFFD, 0x12);

    let cycles = cpu.step(&mut bus);

    assert_eq!(cycles, 16);
    assert_eq!(cpu.pc, 0x1234);
    assert_eq!(cpu.sp, 0xFFFE);
    assert!(cpu.ime);
}

#[test]
fn halt_without_pending_interrupt_stays_halted() {
    let (mut cpu, mut bus) = setup(&[]);
    cpu.halted = true;
    cpu.pc = 0x1234;

    let cycles = cpu.step(&mut bus);

    assert_eq!(cycles, 4);
    assert!(cpu.halted);
    assert_eq!(cpu.pc, 0x1234);
}

#[test]
fn halt_wakes_on_pending_interrupt_with_ime_off() {
    let (mut cpu, mut bus) = setup(&[0x00]); // NOP
    cpu.halted = true;
    cpu.ime = false;

    bus.ie = 0x01;
    bus.iflag = 0x01;

    let cycles = cpu.step(&mut bus);

    assert_eq!(cycles, 4);
    assert!(!cpu.halted);
    // Wake with IME off triggers the halt bug: PC did not advance.
    assert_eq!(cpu.pc, 0);
    assert_ne!(bus.iflag & 0x01, 0);
}

#[test]
fn halt_dispatches_on_pending_interrupt_with_ime_on() {
    let (mut cpu, mut bus) = setup(&[]);
    cpu.halted = true;
    cpu.ime = true;
    cpu.pc = 0x2000;
    cpu.sp = 0xFFFE;

    bus.ie = 0x01;
    bus.iflag = 0x01;

    let cycles = cpu.step(&mut bus);

    assert_eq!(cycles, 20);
    assert!(!cpu.halted);
    assert!(!cpu.ime);
    assert_eq!(cpu.pc, 0x0040);
    assert_eq!(cpu.sp, 0xFFFC);
    assert_eq!(bus.read8(0xFFFC), 0x00);
    assert_eq!(bus.read8(0xFFFD), 0x20);
}

#[test]
fn halt_bug_repeats_the_following_opcode_fetch() {
    let (mut cpu, mut bus) = setup(&[0x76, 0x00, 0x00]); // HALT ; NOP ; NOP
    cpu.ime = false;
    bus.ie = 0x01;
    bus.iflag = 0x01;

    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 4);
    assert_eq!(cpu.pc, 1);
    assert!(cpu.halted);

    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 4);
    // Duplicated fetch: PC stays on the first NOP.
    assert_eq!(cpu.pc, 1);

    cpu.step(&mut bus);
    assert_eq!(cpu.pc, 2);
}

#[test]
fn jr_taken_and_not_taken_costs() {
    // JR +2 lands on LD A,0x42.
    let (mut cpu, mut bus) = setup(&[0x18, 0x02, 0x00, 0x00, 0x3E, 0x42]);
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 12);
    assert_eq!(cpu.pc, 4);

    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 8);
    assert_eq!(cpu.a, 0x42);

    // JR NZ not taken when Z is set: only the length is consumed.
    let (mut cpu, mut bus) = setup(&[0x20, 0x7F]);
    cpu.set_flag(Flag::Z, true);
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 8);
    assert_eq!(cpu.pc, 2);
}

#[test]
fn jr_minus_two_spins_in_place() {
    let (mut cpu, mut bus) = setup(&[0x18, 0xFE]); // JR -2

    let cycles = cpu.step(&mut bus);

    assert_eq!(cycles, 12);
    assert_eq!(cpu.pc, 0);
}

#[test]
fn call_pushes_return_address_and_ret_restores_it() {
    let mut rom = make_rom(&[]);
    rom[0x0100] = 0xCD; // CALL 0x1234
    rom[0x0101] = 0x34;
    rom[0x0102] = 0x12;
    rom[0x1234] = 0xC9; // RET
    let cart = Cartridge::from_rom(rom).unwrap();
    let mut bus = Bus::new(cart);
    let mut cpu = Cpu::new();
    cpu.pc = 0x0100;
    cpu.sp = 0xFFFE;

    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 24);
    assert_eq!(cpu.pc, 0x1234);
    assert_eq!(cpu.sp, 0xFFFC);
    assert_eq!(bus.read8(0xFFFD), 0x01);
    assert_eq!(bus.read8(0xFFFC), 0x03);

    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 16);
    assert_eq!(cpu.pc, 0x0103);
    assert_eq!(cpu.sp, 0xFFFE);
}

#[test]
fn conditional_ret_costs_twenty_when_taken() {
    let (mut cpu, mut bus) = setup(&[0xC0]); // RET NZ
    cpu.sp = 0xFFFC;
    cpu.set_flag(Flag::Z, false);
    bus.write8(0xFFFC, 0x00);
    bus.write8(0xFFFD, 0x80);

    let cycles = cpu.step(&mut bus);

    assert_eq!(cycles, 20);
    assert_eq!(cpu.pc, 0x8000);

    // Not taken: 8 cycles, fall through.
    let (mut cpu, mut bus) = setup(&[0xC0]);
    cpu.set_flag(Flag::Z, true);
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 8);
    assert_eq!(cpu.pc, 1);
}

#[test]
fn rst_jumps_to_fixed_vector() {
    let (mut cpu, mut bus) = setup(&[0xFF]); // RST 38h
    cpu.sp = 0xFFFE;

    let cycles = cpu.step(&mut bus);

    assert_eq!(cycles, 16);
    assert_eq!(cpu.pc, 0x0038);
    assert_eq!(cpu.sp, 0xFFFC);
    assert_eq!(bus.read8(0xFFFC), 0x01);
    assert_eq!(bus.read8(0xFFFD), 0x00);
}

#[test]
fn push_pop_af_masks_the_low_flag_nibble() {
    let (mut cpu, mut bus) = setup(&[0xF5, 0x3E, 0x12, 0xF1]); // PUSH AF ; LD A,0x12 ; POP AF
    cpu.sp = 0xFFFE;
    cpu.a = 0xAB;
    cpu.f = 0xF3;

    cpu.step(&mut bus);
    assert_eq!(cpu.sp, 0xFFFC);
    assert_eq!(bus.read8(0xFFFC), 0xF0);
    assert_eq!(bus.read8(0xFFFD), 0xAB);

    cpu.step(&mut bus);
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0xAB);
    assert_eq!(cpu.f, 0xF0);
}

#[test]
fn push_pop_rr_round_trips() {
    let (mut cpu, mut bus) = setup(&[0xC5, 0x01, 0x00, 0x00, 0xC1]); // PUSH BC ; LD BC,0 ; POP BC
    cpu.sp = 0xFFFE;
    cpu.set_bc(0xBEEF);

    cpu.step(&mut bus);
    cpu.step(&mut bus);
    assert_eq!(cpu.bc(), 0x0000);

    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 12);
    assert_eq!(cpu.bc(), 0xBEEF);
    assert_eq!(cpu.sp, 0xFFFE);
}

#[test]
fn cb_rlc_and_bit_hl_flags_and_cycles() {
    // RLC B: 0x80 -> 0x01, carry out.
    let (mut cpu, mut bus) = setup(&[0xCB, 0x00]);
    cpu.b = 0x80;
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 8);
    assert_eq!(cpu.b, 0x01);
    assert_flags(&cpu, false, false, false, true);

    // BIT 0,(HL): 12 cycles, C untouched.
    let (mut cpu, mut bus) = setup(&[0xCB, 0x46]);
    cpu.set_hl(0xC000);
    bus.write8(0xC000, 0x00);
    cpu.set_flag(Flag::C, true);

    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 12);
    assert_flags(&cpu, true, false, true, true);
}

#[test]
fn cb_swap_twice_is_identity() {
    let (mut cpu, mut bus) = setup(&[0xCB, 0x37, 0xCB, 0x37]); // SWAP A ; SWAP A
    cpu.a = 0x5C;

    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0xC5);

    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x5C);
    assert_flags(&cpu, false, false, false, false);
}

#[test]
fn cb_set_res_hl_write_back_to_memory() {
    let (mut cpu, mut bus) = setup(&[0xCB, 0xC6, 0xCB, 0x86]); // SET 0,(HL) ; RES 0,(HL)
    cpu.set_hl(0xC123);
    bus.write8(0xC123, 0x00);

    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 16);
    assert_eq!(bus.read8(0xC123), 0x01);

    cpu.step(&mut bus);
    assert_eq!(bus.read8(0xC123), 0x00);
}

#[test]
fn unassigned_opcode_locks_the_cpu() {
    let (mut cpu, mut bus) = setup(&[0xD3, 0x00]); // unassigned

    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 4);
    assert!(cpu.locked);
    let pc_after = cpu.pc;

    // Locked forever: idle ticks, PC frozen, even with interrupts pending.
    bus.ie = 0x01;
    bus.iflag = 0x01;
    cpu.ime = true;
    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 4);
    assert_eq!(cpu.pc, pc_after);
    assert!(cpu.locked);
}

#[test]
fn step_cycles_drive_the_timer_through_the_bus() {
    let (mut cpu, mut bus) = setup(&[0x00, 0x00, 0x00, 0x00]); // 4x NOP

    bus.write8(0xFF05, 0x00); // TIMA
    bus.write8(0xFF07, 0x05); // enable, 16-cycle period

    for _ in 0..4 {
        assert_eq!(cpu.step(&mut bus), 4);
    }

    assert_eq!(bus.read8(0xFF05), 0x01);
}

#[test]
fn ld_a16_sp_stores_both_bytes() {
    let (mut cpu, mut bus) = setup(&[0x08, 0x00, 0xC0]); // LD (0xC000),SP
    cpu.sp = 0xBEEF;

    let cycles = cpu.step(&mut bus);

    assert_eq!(cycles, 20);
    assert_eq!(bus.read8(0xC000), 0xEF);
    assert_eq!(bus.read8(0xC001), 0xBE);
}

#[test]
fn ldh_addresses_high_page() {
    let (mut cpu, mut bus) = setup(&[0xE0, 0x80, 0xF0, 0x80]); // LDH (0x80),A ; LDH A,(0x80)
    cpu.a = 0x77;

    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 12);
    assert_eq!(bus.read8(0xFF80), 0x77);

    cpu.a = 0x00;
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x77);
}

#[test]
fn ld_hli_and_hld_move_hl() {
    let (mut cpu, mut bus) = setup(&[0x22, 0x3A]); // LD (HL+),A ; LD A,(HL-)
    cpu.set_hl(0xC000);
    cpu.a = 0x99;

    cpu.step(&mut bus);
    assert_eq!(cpu.hl(), 0xC001);
    assert_eq!(bus.read8(0xC000), 0x99);

    bus.write8(0xC001, 0x55);
    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x55);
    assert_eq!(cpu.hl(), 0xC000);
}
