use dmg_core::bus::Bus;
use dmg_core::cartridge::Cartridge;
use dmg_core::cpu::Cpu;
use dmg_core::interrupt::Interrupt;

fn setup() -> (Cpu, Bus) {
    let cart = Cartridge::from_rom(vec![0u8; 0x8000]).unwrap();
    (Cpu::new(), Bus::new(cart))
}

#[test]
fn transfer_completes_after_4096_cycles_and_interrupts() {
    let (_cpu, mut bus) = setup();

    bus.write8(0xFF01, 0x55);
    bus.write8(0xFF02, 0x81);

    // The byte is captured up front; completion is what takes time.
    assert_eq!(bus.serial.take_output(), vec![0x55]);

    bus.tick(4095);
    assert_eq!(bus.iflag & Interrupt::Serial.bit(), 0);
    assert_ne!(bus.read8(0xFF02) & 0x80, 0);

    bus.tick(1);
    assert_ne!(bus.iflag & Interrupt::Serial.bit(), 0);
    assert_eq!(bus.read8(0xFF02) & 0x80, 0);
}

#[test]
fn clearing_sc_bit7_cancels_the_completion_interrupt() {
    let (_cpu, mut bus) = setup();

    bus.write8(0xFF01, 0x99);
    bus.write8(0xFF02, 0x81);
    bus.write8(0xFF02, 0x01);

    bus.tick(8192);
    assert_eq!(bus.iflag & Interrupt::Serial.bit(), 0);
}

#[test]
fn rapid_rewrites_capture_every_byte() {
    let (_cpu, mut bus) = setup();

    for b in b"ok" {
        bus.write8(0xFF01, *b);
        bus.write8(0xFF02, 0x81);
        bus.tick(64);
    }

    assert_eq!(bus.serial.take_output(), b"ok".to_vec());
}

#[test]
fn halt_wakes_on_serial_interrupt_with_ime_off() {
    let (mut cpu, mut bus) = setup();
    cpu.halted = true;
    cpu.ime = false;

    bus.ie = Interrupt::Serial.bit();
    bus.write8(0xFF01, 0x99);
    bus.write8(0xFF02, 0x81);

    bus.tick(4096);

    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 4);
    assert!(!cpu.halted);
    assert_ne!(bus.iflag & Interrupt::Serial.bit(), 0);
}

#[test]
fn serial_interrupt_dispatches_to_its_vector() {
    let (mut cpu, mut bus) = setup();
    cpu.halted = true;
    cpu.ime = true;
    cpu.pc = 0x1234;
    cpu.sp = 0xFFFE;

    bus.ie = Interrupt::Serial.bit();
    bus.write8(0xFF01, 0x42);
    bus.write8(0xFF02, 0x81);

    bus.tick(4096);

    let cycles = cpu.step(&mut bus);
    assert_eq!(cycles, 20);
    assert_eq!(cpu.pc, 0x0058);
    assert_eq!(cpu.sp, 0xFFFC);
    assert_eq!(bus.read8(0xFFFC), 0x34);
    assert_eq!(bus.read8(0xFFFD), 0x12);
    assert_eq!(bus.iflag & Interrupt::Serial.bit(), 0);
}
