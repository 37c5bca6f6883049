use dmg_core::bus::Bus;
use dmg_core::cartridge::Cartridge;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

fn temp_sav_path(prefix: &str) -> PathBuf {
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("dmg-core-{prefix}-{}-{id}.sav", std::process::id()))
}

fn remove_if_exists(path: &Path) {
    if path.exists() {
        let _ = std::fs::remove_file(path);
    }
}

fn battery_rom() -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];
    rom[0x0147] = 0x03; // MBC1 + RAM + battery
    rom[0x0149] = 0x03; // 32 KiB
    rom
}

#[test]
fn battery_ram_round_trips_through_the_sidecar_file() {
    let sav = temp_sav_path("mbc1");
    remove_if_exists(&sav);

    let mut bus = Bus::new(Cartridge::from_rom(battery_rom()).unwrap());
    bus.write8(0x0000, 0x0A); // enable RAM
    bus.write8(0x6000, 0x01); // RAM banking mode

    bus.write8(0x4000, 0x00);
    bus.write8(0xA123, 0x5A);
    bus.write8(0x4000, 0x02);
    bus.write8(0xA456, 0xC3);

    bus.save_to_path(&sav).unwrap();

    let mut bus2 = Bus::new(Cartridge::from_rom(battery_rom()).unwrap());
    bus2.load_from_path(&sav).unwrap();
    bus2.write8(0x0000, 0x0A);
    bus2.write8(0x6000, 0x01);

    bus2.write8(0x4000, 0x00);
    assert_eq!(bus2.read8(0xA123), 0x5A);
    bus2.write8(0x4000, 0x02);
    assert_eq!(bus2.read8(0xA456), 0xC3);

    remove_if_exists(&sav);
}

#[test]
fn non_battery_cartridges_write_no_save_file() {
    let sav = temp_sav_path("no-batt");
    remove_if_exists(&sav);

    let mut rom = vec![0u8; 0x8000];
    rom[0x0147] = 0x02; // MBC1 + RAM, no battery
    rom[0x0149] = 0x02;

    let mut bus = Bus::new(Cartridge::from_rom(rom).unwrap());
    bus.write8(0x0000, 0x0A);
    bus.write8(0xA000, 0x11);

    bus.save_to_path(&sav).unwrap();
    assert!(!sav.exists());
}

#[test]
fn short_save_files_load_what_fits() {
    let sav = temp_sav_path("short");
    remove_if_exists(&sav);
    std::fs::write(&sav, [0xAA, 0xBB]).unwrap();

    let mut bus = Bus::new(Cartridge::from_rom(battery_rom()).unwrap());
    bus.load_from_path(&sav).unwrap();
    bus.write8(0x0000, 0x0A);

    assert_eq!(bus.read8(0xA000), 0xAA);
    assert_eq!(bus.read8(0xA001), 0xBB);
    assert_eq!(bus.read8(0xA002), 0x00);

    remove_if_exists(&sav);
}
