//! Headless runner and test-ROM harness. Detects pass/fail from the
//! serial capture buffer or from text a ROM draws into the BG tile maps.

use std::io::Write;
use std::path::{Path, PathBuf};

use dmg_core::bus::Bus;
use dmg_core::cartridge::Cartridge;
use dmg_core::gb::GameBoy;

#[derive(Debug)]
enum Command {
    Run(RunArgs),
    Suite(SuiteArgs),
    SelfTest(SelfTestArgs),
}

#[derive(Debug)]
struct RunArgs {
    rom_path: PathBuf,
    max_frames: Option<u64>,
    max_cycles: Option<u64>,
    verbose: bool,
    trace_cpu: bool,
    trace_ppu: bool,
    log_serial: bool,
    print_serial: bool,
    print_vram: bool,
}

#[derive(Debug)]
struct SuiteArgs {
    rom_dir: PathBuf,
    rom_paths: Vec<PathBuf>,
    max_frames: Option<u64>,
    max_cycles: Option<u64>,
    pass_text: Vec<String>,
    fail_text: Vec<String>,
    print_serial: bool,
}

#[derive(Debug)]
struct SelfTestArgs {
    max_cycles: Option<u64>,
    pass_text: Vec<String>,
    fail_text: Vec<String>,
    print_serial: bool,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum RomResult {
    Pass,
    Fail,
    Timeout,
}

impl RomResult {
    fn as_str(self) -> &'static str {
        match self {
            RomResult::Pass => "PASS",
            RomResult::Fail => "FAIL",
            RomResult::Timeout => "TIMEOUT",
        }
    }
}

fn print_usage() {
    eprintln!(
        "Usage:\n\
  dmg-cli <rom.gb> [--frames N] [--cycles N] [-v|--verbose]\n\
        [--trace-cpu] [--trace-ppu] [--log-serial] [--print-serial] [--print-vram]\n\
  dmg-cli run <rom.gb> [same flags as above]\n\
  dmg-cli suite [--rom-dir DIR] [--frames N] [--cycles N]\n\
        [--pass-text S] [--fail-text S] [--print-serial] [ROM...]+\n\
  dmg-cli self-test [--cycles N] [--pass-text S] [--fail-text S] [--print-serial]\n\
\n\
Commands:\n\
  run        Run a single ROM (default when no subcommand is given).\n\
  suite      Discover and run a set of ROMs (default dir: ./roms).\n\
  self-test  Run a built-in ROM that prints 'Passed' over serial.\n\
\n\
Debug output (run command):\n\
  -v, --verbose   ROM metadata + run summary (stderr).\n\
  --trace-cpu     Per-instruction CPU trace (stderr).\n\
  --trace-ppu     LY/mode transitions (stderr).\n\
  --log-serial    Stream serial bytes to stdout as they appear.\n\
  --print-serial  Print the captured serial output at the end.\n\
  --print-vram    Dump the BG tile maps as text on FAIL/TIMEOUT.\n\
\n\
Suite pass/fail detection:\n\
  - Captures bytes sent over serial (SB/SC, as blargg/mooneye ROMs do).\n\
  - Also scrapes ASCII the ROM draws into either BG tile map.\n\
  - PASS on any --pass-text match (default 'passed'); FAIL on any\n\
    --fail-text match (default 'failed', 'fail'); TIMEOUT at the limits.\n"
    );
}

fn parse_args() -> Result<Command, String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        return Err("missing args".to_string());
    }

    match args[0].as_str() {
        "-h" | "--help" => {
            print_usage();
            std::process::exit(0);
        }
        "run" => parse_run_args(&args[1..]).map(Command::Run),
        "suite" => parse_suite_args(&args[1..]).map(Command::Suite),
        "self-test" => parse_self_test_args(&args[1..]).map(Command::SelfTest),
        _ => parse_run_args(&args).map(Command::Run),
    }
}

fn parse_count(flag: &str, value: Option<&String>) -> Result<u64, String> {
    let v = value.ok_or_else(|| format!("{flag} requires a value"))?;
    v.parse::<u64>()
        .map_err(|_| format!("invalid {flag} value: {v}"))
}

fn parse_run_args(args: &[String]) -> Result<RunArgs, String> {
    if args.is_empty() {
        return Err("missing ROM path".to_string());
    }

    let mut it = args.iter();
    let rom_path = PathBuf::from(it.next().unwrap());

    let mut out = RunArgs {
        rom_path,
        max_frames: None,
        max_cycles: None,
        verbose: false,
        trace_cpu: false,
        trace_ppu: false,
        log_serial: false,
        print_serial: false,
        print_vram: false,
    };

    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            "-v" | "--verbose" => out.verbose = true,
            "--trace-cpu" => out.trace_cpu = true,
            "--trace-ppu" => out.trace_ppu = true,
            "--log-serial" => out.log_serial = true,
            "--print-serial" => out.print_serial = true,
            "--print-vram" => out.print_vram = true,
            "--frames" => out.max_frames = Some(parse_count(arg, it.next())?),
            "--cycles" => out.max_cycles = Some(parse_count(arg, it.next())?),
            _ if arg.starts_with('-') => return Err(format!("unknown flag: {arg}")),
            _ => return Err(format!("unexpected extra positional arg: {arg}")),
        }
    }

    Ok(out)
}

fn parse_suite_args(args: &[String]) -> Result<SuiteArgs, String> {
    let mut out = SuiteArgs {
        rom_dir: PathBuf::from("roms"),
        rom_paths: Vec::new(),
        max_frames: None,
        max_cycles: Some(300_000_000),
        pass_text: vec!["passed".to_string()],
        fail_text: vec!["failed".to_string(), "fail".to_string()],
        print_serial: false,
    };

    let mut it = args.iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            "--rom-dir" => {
                let v = it
                    .next()
                    .ok_or_else(|| "--rom-dir requires a value".to_string())?;
                out.rom_dir = PathBuf::from(v);
            }
            "--frames" => out.max_frames = Some(parse_count(arg, it.next())?),
            "--cycles" => out.max_cycles = Some(parse_count(arg, it.next())?),
            "--pass-text" => {
                let v = it
                    .next()
                    .ok_or_else(|| "--pass-text requires a value".to_string())?;
                out.pass_text.push(v.to_string());
            }
            "--fail-text" => {
                let v = it
                    .next()
                    .ok_or_else(|| "--fail-text requires a value".to_string())?;
                out.fail_text.push(v.to_string());
            }
            "--print-serial" => out.print_serial = true,
            _ if arg.starts_with('-') => return Err(format!("unknown flag: {arg}")),
            _ => out.rom_paths.push(PathBuf::from(arg)),
        }
    }

    Ok(out)
}

fn parse_self_test_args(args: &[String]) -> Result<SelfTestArgs, String> {
    let mut out = SelfTestArgs {
        max_cycles: Some(5_000_000),
        pass_text: vec!["passed".to_string()],
        fail_text: vec!["failed".to_string(), "fail".to_string()],
        print_serial: false,
    };

    let mut it = args.iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage();
                std::process::exit(0);
            }
            "--cycles" => out.max_cycles = Some(parse_count(arg, it.next())?),
            "--pass-text" => {
                let v = it
                    .next()
                    .ok_or_else(|| "--pass-text requires a value".to_string())?;
                out.pass_text.push(v.to_string());
            }
            "--fail-text" => {
                let v = it
                    .next()
                    .ok_or_else(|| "--fail-text requires a value".to_string())?;
                out.fail_text.push(v.to_string());
            }
            "--print-serial" => out.print_serial = true,
            _ if arg.starts_with('-') => return Err(format!("unknown flag: {arg}")),
            _ => return Err(format!("unexpected positional arg: {arg}")),
        }
    }

    Ok(out)
}

fn discover_roms(dir: &Path) -> Result<Vec<PathBuf>, String> {
    fn visit(out: &mut Vec<PathBuf>, p: &Path) -> Result<(), String> {
        let rd = std::fs::read_dir(p)
            .map_err(|e| format!("failed to read ROM directory {}: {e}", p.display()))?;
        for ent in rd {
            let ent = ent.map_err(|e| format!("failed to read entry in {}: {e}", p.display()))?;
            let path = ent.path();
            if path.is_dir() {
                visit(out, &path)?;
            } else if path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("gb"))
            {
                out.push(path);
            }
        }
        Ok(())
    }

    let mut out = Vec::new();
    visit(&mut out, dir)?;
    out.sort();
    Ok(out)
}

fn contains_any(haystack_lower: &str, needles: &[String]) -> bool {
    needles
        .iter()
        .any(|n| !n.is_empty() && haystack_lower.contains(&n.to_ascii_lowercase()))
}

/// Many test ROMs draw results as ASCII tile indices in a BG map; the high
/// bit is often set, so mask it off.
fn screen_char(tile_id: u8) -> u8 {
    let c = tile_id & 0x7F;
    if (0x20..=0x7E).contains(&c) {
        c
    } else {
        b' '
    }
}

/// Decode one 32x32 BG tile map as text.
fn scrape_tilemap_text(vram: &[u8], map_offset: usize) -> String {
    const MAP_W: usize = 32;
    const MAP_H: usize = 32;

    let mut out = Vec::with_capacity(MAP_W * MAP_H + MAP_H);
    for y in 0..MAP_H {
        for x in 0..MAP_W {
            out.push(screen_char(vram[map_offset + y * MAP_W + x]));
        }
        out.push(b'\n');
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Both BG maps concatenated; ROMs differ in which one they draw into.
fn screen_text(bus: &Bus) -> String {
    let t9800 = scrape_tilemap_text(&bus.vram, 0x1800);
    let t9c00 = scrape_tilemap_text(&bus.vram, 0x1C00);
    format!("{t9800}\n{t9c00}")
}

fn run_for_result(
    cart: Cartridge,
    max_frames: Option<u64>,
    max_cycles: Option<u64>,
    pass_text: &[String],
    fail_text: &[String],
) -> (RomResult, Vec<u8>, u64, u64) {
    let mut gb = GameBoy::new(cart);

    let mut frames: u64 = 0;
    let mut cycles: u64 = 0;
    let mut output: Vec<u8> = Vec::new();

    let verdict = |text: &str| -> Option<RomResult> {
        if contains_any(text, fail_text) {
            Some(RomResult::Fail)
        } else if contains_any(text, pass_text) {
            Some(RomResult::Pass)
        } else {
            None
        }
    };

    loop {
        if max_frames.is_some_and(|m| frames >= m) || max_cycles.is_some_and(|m| cycles >= m) {
            // Last chance: some ROMs only report on screen.
            let screen = screen_text(&gb.bus).to_ascii_lowercase();
            return (verdict(&screen).unwrap_or(RomResult::Timeout), output, frames, cycles);
        }

        cycles += gb.step() as u64;

        if gb.cpu.locked {
            // An unassigned opcode wedged the CPU; nothing more will happen.
            return (RomResult::Fail, output, frames, cycles);
        }

        let new = gb.bus.serial.take_output();
        if !new.is_empty() {
            output.extend_from_slice(&new);
            let text = String::from_utf8_lossy(&output).to_ascii_lowercase();
            if let Some(res) = verdict(&text) {
                return (res, output, frames, cycles);
            }
        }

        if gb.bus.ppu.frame_ready() {
            frames += 1;
            gb.bus.ppu.clear_frame_ready();

            // Screen scrape on early frames, then periodically.
            if frames <= 3 || frames % 5 == 0 {
                let screen = screen_text(&gb.bus).to_ascii_lowercase();
                if let Some(res) = verdict(&screen) {
                    return (res, output, frames, cycles);
                }
            }
        }
    }
}

/// A ROM that prints "Passed\n" over serial, then loops.
fn make_self_test_rom() -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];

    // Entry point jumps over the header area.
    let start = 0x0150usize;
    rom[0x0100] = 0xC3; // JP a16
    rom[0x0101] = (start & 0xFF) as u8;
    rom[0x0102] = (start >> 8) as u8;

    let mut pc = start;
    for &b in b"Passed\n" {
        // LD A,d8 ; LD (FF01),A ; LD A,0x81 ; LD (FF02),A
        for chunk in [[0x3E, b], [0xEA, 0x01], [0x3E, 0x81], [0xEA, 0x02]] {
            rom[pc] = chunk[0];
            rom[pc + 1] = chunk[1];
            pc += 2;
            if chunk[0] == 0xEA {
                rom[pc] = 0xFF;
                pc += 1;
            }
        }
    }
    // JR -2: spin forever.
    rom[pc] = 0x18;
    rom[pc + 1] = 0xFE;

    rom[0x0147] = 0x00; // ROM only
    rom[0x0149] = 0x00; // no RAM

    rom
}

fn run_single(args: RunArgs) -> Result<i32, String> {
    let rom = std::fs::read(&args.rom_path)
        .map_err(|e| format!("failed to read ROM {}: {e}", args.rom_path.display()))?;
    let cart = Cartridge::from_rom(rom).map_err(|e| format!("invalid ROM: {e:?}"))?;

    if args.verbose {
        eprintln!(
            "Loaded ROM: {} ({:?}, {:?})",
            args.rom_path.display(),
            cart.header.cartridge_type,
            cart.header.ram_size
        );
    }

    let mut gb = GameBoy::new(cart);

    let mut frames: u64 = 0;
    let mut cycles: u64 = 0;
    let mut last_ly = gb.bus.io[0x44];
    let mut last_mode = gb.bus.io[0x41] & 0x03;

    let mut serial_out: Vec<u8> = Vec::new();
    let mut stdout = std::io::stdout();

    loop {
        if args.max_frames.is_some_and(|m| frames >= m)
            || args.max_cycles.is_some_and(|m| cycles >= m)
        {
            if args.print_vram {
                println!("--- BG tile maps (at limit) ---\n{}", screen_text(&gb.bus));
            }
            break;
        }

        if args.trace_cpu {
            let pc = gb.cpu.pc;
            let b0 = gb.bus.read8(pc);
            let b1 = gb.bus.read8(pc.wrapping_add(1));
            let b2 = gb.bus.read8(pc.wrapping_add(2));
            eprintln!(
                "CYC={cycles:010} PC={pc:04X} OP={b0:02X} {b1:02X} {b2:02X} AF={:02X}{:02X} BC={:02X}{:02X} DE={:02X}{:02X} HL={:02X}{:02X} SP={:04X} IME={} HALT={} IE={:02X} IF={:02X}",
                gb.cpu.a,
                gb.cpu.f,
                gb.cpu.b,
                gb.cpu.c,
                gb.cpu.d,
                gb.cpu.e,
                gb.cpu.h,
                gb.cpu.l,
                gb.cpu.sp,
                gb.cpu.ime,
                gb.cpu.halted,
                gb.bus.ie,
                gb.bus.iflag
            );
        }

        cycles += gb.step() as u64;

        if gb.cpu.locked {
            eprintln!("CPU locked by an unassigned opcode near PC={:04X}", gb.cpu.pc);
            return Ok(1);
        }

        if args.trace_ppu {
            let ly = gb.bus.io[0x44];
            let mode = gb.bus.io[0x41] & 0x03;
            if ly != last_ly || mode != last_mode {
                eprintln!("PPU ly={ly} mode={mode}");
                last_ly = ly;
                last_mode = mode;
            }
        }

        let batch: Vec<u8> = gb.bus.serial.drain_output().collect();
        if !batch.is_empty() {
            if args.log_serial {
                stdout
                    .write_all(&batch)
                    .and_then(|_| stdout.flush())
                    .map_err(|e| format!("failed to write serial output: {e}"))?;
            }
            if args.print_serial {
                serial_out.extend_from_slice(&batch);
            }
        }

        if gb.bus.ppu.frame_ready() {
            frames += 1;
            gb.bus.ppu.clear_frame_ready();

            if args.verbose {
                let checksum: u64 = gb
                    .bus
                    .ppu
                    .framebuffer()
                    .iter()
                    .fold(0u64, |acc, &px| acc.wrapping_add(px as u64));
                eprintln!("frame {frames} (cycles={cycles}) fb_checksum={checksum}");
            }
        }
    }

    if args.verbose {
        eprintln!("Done: frames={frames} cycles={cycles}");
    }
    if args.print_serial && !serial_out.is_empty() {
        print!("{}", String::from_utf8_lossy(&serial_out));
    }

    Ok(0)
}

fn run_suite(args: SuiteArgs) -> Result<i32, String> {
    let mut roms = if args.rom_paths.is_empty() {
        discover_roms(&args.rom_dir)?
    } else {
        args.rom_paths
    };
    roms.sort();

    if roms.is_empty() {
        println!("No ROMs found. Use: dmg-cli suite --rom-dir <dir>  (or: dmg-cli self-test)");
        return Ok(1);
    }

    let mut pass = 0usize;
    let mut fail = 0usize;
    let mut timeout = 0usize;

    for path in roms {
        let cart = match std::fs::read(&path)
            .map_err(|e| format!("read error: {e}"))
            .and_then(|rom| Cartridge::from_rom(rom).map_err(|e| format!("invalid ROM: {e:?}")))
        {
            Ok(c) => c,
            Err(e) => {
                println!("FAIL {} ({e})", path.display());
                fail += 1;
                continue;
            }
        };

        let (res, serial, frames, cycles) = run_for_result(
            cart,
            args.max_frames,
            args.max_cycles,
            &args.pass_text,
            &args.fail_text,
        );

        match res {
            RomResult::Pass => pass += 1,
            RomResult::Fail => fail += 1,
            RomResult::Timeout => timeout += 1,
        }

        println!(
            "{} {} (frames={frames} cycles={cycles})",
            res.as_str(),
            path.display()
        );

        if args.print_serial && !serial.is_empty() {
            print!("{}", String::from_utf8_lossy(&serial));
            if !serial.ends_with(b"\n") {
                println!();
            }
        }
    }

    println!("Summary: {pass} passed, {fail} failed, {timeout} timed out");

    Ok(if fail == 0 && timeout == 0 { 0 } else { 1 })
}

fn run_self_test(args: SelfTestArgs) -> Result<i32, String> {
    let cart = Cartridge::from_rom(make_self_test_rom()).map_err(|e| format!("invalid ROM: {e:?}"))?;

    let (res, serial, frames, cycles) = run_for_result(
        cart,
        None,
        args.max_cycles,
        &args.pass_text,
        &args.fail_text,
    );

    println!(
        "{} self-test (frames={frames} cycles={cycles})",
        res.as_str()
    );
    if args.print_serial && !serial.is_empty() {
        print!("{}", String::from_utf8_lossy(&serial));
        if !serial.ends_with(b"\n") {
            println!();
        }
    }

    Ok(if res == RomResult::Pass { 0 } else { 1 })
}

fn run() -> Result<i32, String> {
    match parse_args()? {
        Command::Run(a) => run_single(a),
        Command::Suite(a) => run_suite(a),
        Command::SelfTest(a) => run_self_test(a),
    }
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            print_usage();
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tilemap_scrape_finds_drawn_text() {
        let mut vram = [0u8; 0x2000];
        for (i, &b) in b"Passed".iter().enumerate() {
            vram[0x1800 + i] = b;
        }
        let text = scrape_tilemap_text(&vram, 0x1800);
        assert!(text.contains("Passed"));
    }

    #[test]
    fn tilemap_scrape_masks_high_bit() {
        let mut vram = [0u8; 0x2000];
        vram[0x1800] = 0xD0; // 0xD0 & 0x7F = 'P'
        let text = scrape_tilemap_text(&vram, 0x1800);
        assert!(text.starts_with('P'));
    }

    #[test]
    fn self_test_rom_prints_passed_over_serial() {
        let cart = Cartridge::from_rom(make_self_test_rom()).unwrap();
        let (res, serial, _, _) = run_for_result(
            cart,
            None,
            Some(5_000_000),
            &["passed".to_string()],
            &["failed".to_string()],
        );
        assert_eq!(res, RomResult::Pass);
        assert!(serial.starts_with(b"Passed"));
    }
}
