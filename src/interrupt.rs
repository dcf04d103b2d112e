//! Interrupt request plumbing (C4: Interrupt/Keypad).
//!
//! The CPU's own `check_irq` already gates delivery on IME/IE/IF and the
//! CPSR's IRQ-disable bit (see `Cpu::check_irq`); this module is the other
//! half - raising a source into IF from the scheduler's scanline timing.
//! Raising never clears IF itself: write-one-to-clear is software's job,
//! not modeled beyond the plain OR-set this core implements.

use crate::mem::Memory;
use crate::regs::{self, IrqFlags};

/// OR `flags` into IF. Safe to call with a source whose IE bit is unset -
/// `Cpu::check_irq` will simply never see it as pending.
pub fn raise(mem: &mut Memory, flags: IrqFlags) {
    let current = mem.io_read16(regs::IF);
    mem.io_write16(regs::IF, current | flags.bits());
}
