use dmg_core::bus::Bus;
use dmg_core::cartridge::Cartridge;

fn make_bus() -> Bus {
    Bus::new(Cartridge::from_rom(vec![0u8; 0x8000]).unwrap())
}

#[test]
fn oam_is_cpu_inaccessible_during_modes_2_and_3() {
    let mut bus = make_bus();
    bus.oam[0] = 0x42;

    bus.write8(0xFF40, 0x80);
    bus.tick(10); // mode 2
    assert_eq!(bus.read8(0xFF41) & 0x03, 2);

    assert_eq!(bus.read8(0xFE00), 0xFF);
    bus.write8(0xFE00, 0x99);
    assert_eq!(bus.oam[0], 0x42);

    bus.tick(100); // mode 3
    assert_eq!(bus.read8(0xFF41) & 0x03, 3);
    assert_eq!(bus.read8(0xFE00), 0xFF);

    bus.tick(200); // mode 0
    assert_eq!(bus.read8(0xFF41) & 0x03, 0);
    assert_eq!(bus.read8(0xFE00), 0x42);
    bus.write8(0xFE00, 0x99);
    assert_eq!(bus.oam[0], 0x99);
}

#[test]
fn vram_is_cpu_inaccessible_during_mode_3_only() {
    let mut bus = make_bus();
    bus.vram[0] = 0x5A;

    bus.write8(0xFF40, 0x80);
    bus.tick(10); // mode 2: VRAM still open
    assert_eq!(bus.read8(0x8000), 0x5A);

    bus.tick(100); // mode 3
    assert_eq!(bus.read8(0x8000), 0xFF);
    bus.write8(0x8000, 0x77);
    assert_eq!(bus.vram[0], 0x5A);

    bus.tick(200); // mode 0
    assert_eq!(bus.read8(0x8000), 0x5A);
}

#[test]
fn vblank_opens_both_regions() {
    let mut bus = make_bus();
    bus.vram[0] = 0x11;
    bus.oam[0] = 0x22;

    bus.write8(0xFF40, 0x80);
    bus.tick(456 * 144 + 8); // inside mode 1

    assert_eq!(bus.read8(0xFF41) & 0x03, 1);
    assert_eq!(bus.read8(0x8000), 0x11);
    assert_eq!(bus.read8(0xFE00), 0x22);
}

#[test]
fn lcd_off_leaves_everything_open() {
    let mut bus = make_bus();

    bus.write8(0x8000, 0xAB);
    bus.write8(0xFE00, 0xCD);

    assert_eq!(bus.read8(0x8000), 0xAB);
    assert_eq!(bus.read8(0xFE00), 0xCD);
}
