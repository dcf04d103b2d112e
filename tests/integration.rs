//! Integration tests for the GBA emulator
//!
//! These tests verify that all components work together correctly.

use rgba::{Cpu, Gba, KeyState, Memory};

/// Scenario: GBA system initializes correctly
#[test]
fn gba_system_initializes_correctly() {
    let gba = Gba::new();

    // CPU should be ready, pointing at ROM.
    assert_eq!(gba.cpu.get_pc(), 0x0800_0000, "PC should point to ROM");
    assert_eq!(gba.cpu.is_thumb_mode(), false, "Should start in ARM mode");

    // KEYINPUT should read as all-released.
    assert_eq!(gba.mem.io_read16(rgba::regs::KEYINPUT), 0x03FF);
}

/// Scenario: GBA can be reset to clean state
#[test]
fn gba_can_be_reset() {
    let mut gba = Gba::new();

    gba.cpu.set_reg(5, 0xDEAD_BEEF);
    gba.key_down(KeyState::A);

    gba.reset();

    assert_eq!(gba.cpu.get_reg(5), 0);
    assert_eq!(gba.mem.io_read16(rgba::regs::KEYINPUT), 0x03FF, "keys should be released again");
}

/// Scenario: ROM can be loaded and executed
#[test]
fn rom_can_be_loaded() {
    let mut gba = Gba::new();

    let rom_data: Vec<u8> = vec![
        0x00, 0x00, 0x00, 0x0A, // Entry point
        0x00, 0x00, 0x00, 0x00, // Nintendo logo (simplified)
    ];

    gba.load_rom(rom_data);

    assert_eq!(gba.mem.read_byte(0x0800_0000), 0x00);
    assert_eq!(gba.mem.read_byte(0x0800_0003), 0x0A);
}

/// Scenario: loading a ROM resets the console so execution starts clean.
#[test]
fn loading_rom_resets_the_console() {
    let mut gba = Gba::new();
    gba.cpu.set_reg(3, 0x1234);

    gba.load_rom(vec![0u8; 16]);

    assert_eq!(gba.cpu.get_reg(3), 0, "register state should not survive a ROM load");
    assert_eq!(gba.cpu.get_pc(), 0x0800_0000);
}

/// Scenario: CPU can execute from ROM
#[test]
fn cpu_can_execute_from_rom() {
    let mut cpu = Cpu::new();
    let mut mem = Memory::new();

    let mut rom = vec![0u8; 0x200];
    let insn = 0xE081_0002u32; // ADD r0, r1, r2
    rom[0..4].copy_from_slice(&insn.to_le_bytes());

    mem.load_rom(rom);

    cpu.set_reg(1, 10);
    cpu.set_reg(2, 5);
    cpu.set_pc(0x0800_0000);

    cpu.step(&mut mem);

    assert_eq!(cpu.get_reg(0), 15);
}

/// Scenario: System can run a frame and the scanline counter wraps back
/// to 0 with VCOUNT mirroring it.
#[test]
fn system_can_run_one_frame() {
    let mut gba = Gba::new();

    gba.run_frame();

    assert_eq!(gba.scheduler.scanline(), 0, "a full frame should wrap the scanline counter");
    assert_eq!(gba.mem.io_read16(rgba::regs::VCOUNT), 0);
}

/// Scenario: running several frames pushes rewind snapshots, one per
/// frame, bounded by the ring's capacity.
#[test]
fn running_frames_accumulates_rewind_history() {
    let mut gba = Gba::new();

    for _ in 0..5 {
        gba.run_frame();
    }

    assert_eq!(gba.save_states.rewind_len(), 5);
}

/// Scenario: pressing and releasing a key mirrors into KEYINPUT.
#[test]
fn key_press_is_reflected_in_keyinput_register() {
    let mut gba = Gba::new();

    gba.key_down(KeyState::START);
    let reg = gba.mem.io_read16(rgba::regs::KEYINPUT);
    assert_eq!(reg & (KeyState::START.bits()), 0, "START bit should read low while held");

    gba.key_up(KeyState::START);
    let reg = gba.mem.io_read16(rgba::regs::KEYINPUT);
    assert_eq!(reg & (KeyState::START.bits()), KeyState::START.bits());
}

/// Scenario: the frame buffer is the right size for 240x160 RGB24.
#[test]
fn frame_buffer_has_expected_size() {
    let gba = Gba::new();
    assert_eq!(gba.frame_buffer().len(), 240 * 160 * 3);
}
