//! Scanline-driven scheduler (C5).
//!
//! Ties the CPU, memory bus, PPU and cheat engine together: advances the
//! CPU by a fixed cycle quantum per scanline, updates the scanline-timing
//! I/O registers, renders visible lines, and raises the three scanline
//! interrupt sources. A frame is 228 scanlines; 160 are visible, 68 are
//! blank.

use crate::cheats::CheatEngine;
use crate::cpu::Cpu;
use crate::interrupt;
use crate::mem::Memory;
use crate::ppu::Ppu;
use crate::regs::{self, IrqFlags};

const CYCLES_PER_SCANLINE: u32 = 1232;
const VISIBLE_SCANLINES: u16 = 160;
const SCANLINES_PER_FRAME: u16 = 228;

/// Owns only the scanline counter; every other piece of state it drives
/// lives in its owner's other components.
pub struct Scheduler {
    scanline: u16,
}

impl Scheduler {
    pub fn new() -> Self {
        Self { scanline: 0 }
    }

    pub fn reset(&mut self) {
        self.scanline = 0;
    }

    pub fn scanline(&self) -> u16 {
        self.scanline
    }

    /// Advance the CPU through one scanline's worth of cycles, update
    /// scanline-timing registers, render the line if visible, and apply
    /// cheats at VBlank entry. Returns `true` if this call wrapped the
    /// scanline counter back to 0 (one full frame just completed).
    pub fn step_scanline(&mut self, cpu: &mut Cpu, mem: &mut Memory, ppu: &mut Ppu, cheats: &CheatEngine) -> bool {
        let mut consumed = 0u32;
        while consumed < CYCLES_PER_SCANLINE {
            cpu.check_irq(mem);
            consumed += cpu.step(mem);
        }

        mem.io_write16(regs::VCOUNT, self.scanline);
        let mut dispstat = mem.io_read16(regs::DISPSTAT);

        if self.scanline < VISIBLE_SCANLINES {
            ppu.render_scanline(self.scanline, mem);
            dispstat |= regs::DISPSTAT_HBLANK_FLAG;
            if dispstat & regs::DISPSTAT_HBLANK_IRQ_ENABLE != 0 {
                interrupt::raise(mem, IrqFlags::HBLANK);
            }
        } else if self.scanline == VISIBLE_SCANLINES {
            dispstat |= regs::DISPSTAT_VBLANK_FLAG;
            if dispstat & regs::DISPSTAT_VBLANK_IRQ_ENABLE != 0 {
                interrupt::raise(mem, IrqFlags::VBLANK);
            }
            cheats.apply(mem);
        }

        let vcount_target = (dispstat >> 8) & 0xFF;
        if self.scanline == vcount_target {
            dispstat |= regs::DISPSTAT_VCOUNTER_FLAG;
            if dispstat & regs::DISPSTAT_VCOUNT_IRQ_ENABLE != 0 {
                interrupt::raise(mem, IrqFlags::VCOUNT);
            }
        } else {
            dispstat &= !regs::DISPSTAT_VCOUNTER_FLAG;
        }
        mem.io_write16(regs::DISPSTAT, dispstat);

        self.scanline += 1;
        if self.scanline >= SCANLINES_PER_FRAME {
            self.scanline = 0;
            dispstat &= !regs::DISPSTAT_VBLANK_FLAG;
            mem.io_write16(regs::DISPSTAT, dispstat);
            true
        } else {
            false
        }
    }

    /// Walk all 228 scanlines of one frame.
    pub fn run_frame(&mut self, cpu: &mut Cpu, mem: &mut Memory, ppu: &mut Ppu, cheats: &CheatEngine) {
        for _ in 0..SCANLINES_PER_FRAME {
            self.step_scanline(cpu, mem, ppu, cheats);
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
