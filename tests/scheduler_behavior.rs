//! Behavior Driven Development tests for the scanline-driven scheduler.

use rgba::{CheatEngine, Cpu, Memory, Ppu, Scheduler};

/// Scenario: scheduler monotonicity - after a full frame the scanline
/// counter wraps back to 0 and VCOUNT mirrors it.
#[test]
fn full_frame_wraps_scanline_counter_to_zero() {
    let mut cpu = Cpu::new();
    let mut mem = Memory::new();
    let mut ppu = Ppu::new();
    let cheats = CheatEngine::new();
    let mut scheduler = Scheduler::new();

    scheduler.run_frame(&mut cpu, &mut mem, &mut ppu, &cheats);

    assert_eq!(scheduler.scanline(), 0);
    assert_eq!(mem.io_read16(rgba::regs::VCOUNT), 0);
}

/// Scenario: entering VBlank raises IF's VBlank bit when DISPSTAT's
/// VBlank-IRQ-enable bit is set.
#[test]
fn vblank_entry_raises_interrupt_when_enabled() {
    let mut cpu = Cpu::new();
    let mut mem = Memory::new();
    let mut ppu = Ppu::new();
    let cheats = CheatEngine::new();
    let mut scheduler = Scheduler::new();

    mem.io_write16(rgba::regs::DISPSTAT, rgba::regs::DISPSTAT_VBLANK_IRQ_ENABLE);

    // Advance through the 160 visible scanlines; line 160 is VBlank entry.
    for _ in 0..=160 {
        scheduler.step_scanline(&mut cpu, &mut mem, &mut ppu, &cheats);
    }

    assert_ne!(mem.io_read16(rgba::regs::IF) & 0x1, 0, "IF's VBlank bit should be set");
}

/// Scenario: HBlank interrupts are not raised when DISPSTAT's HBlank-IRQ
/// enable bit is left clear.
#[test]
fn hblank_not_raised_when_disabled() {
    let mut cpu = Cpu::new();
    let mut mem = Memory::new();
    let mut ppu = Ppu::new();
    let cheats = CheatEngine::new();
    let mut scheduler = Scheduler::new();

    scheduler.step_scanline(&mut cpu, &mut mem, &mut ppu, &cheats);

    assert_eq!(mem.io_read16(rgba::regs::IF) & 0x2, 0);
}

/// Scenario: a cheat applied at VBlank entry takes effect once per frame.
#[test]
fn cheat_engine_applies_at_vblank_entry() {
    use rgba::{Cheat, CheatKind};

    let mut cpu = Cpu::new();
    let mut mem = Memory::new();
    let mut ppu = Ppu::new();
    let mut cheats = CheatEngine::new();
    cheats.add(Cheat::new("max hp", "02000000:63", CheatKind::Raw));
    let mut scheduler = Scheduler::new();

    for _ in 0..=160 {
        scheduler.step_scanline(&mut cpu, &mut mem, &mut ppu, &cheats);
    }

    assert_eq!(mem.read_byte(0x0200_0000), 0x63);
}
