//! ARM7TDMI CPU implementation for the GBA
//!
//! The GBA uses an ARM7TDMI processor supporting:
//! - ARM mode (32-bit instructions)
//! - Thumb mode (16-bit instructions)
//! - Multiple processor modes (User, IRQ, FIQ, Supervisor, Abort, Undefined, System)
//!
//! Every ARM instruction is gated by its top four condition bits: a failing
//! condition still costs one cycle but has no other effect. All arithmetic
//! flag computation routes through `add_with_carry`/`sub_with_carry` - there
//! is no separately coded borrow path for subtraction.

use crate::regs;
use log::warn;
use serde::{Deserialize, Serialize};

/// The banked registers a save state needs beyond the live `r[0..16]` and
/// CPSR: FIQ's private r8-r12 and every privileged mode's banked sp/lr,
/// indexed [Fiq, Irq, Supervisor, Abort, Undefined, System].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BankedRegs {
    pub fiq_r8_12: [u32; 5],
    pub sp: [u32; 6],
    pub lr: [u32; 6],
}

bitflags::bitflags! {
    /// CPU Status Register flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CpsrFlags: u32 {
        const N = 1 << 31; // Negative
        const Z = 1 << 30; // Zero
        const C = 1 << 29; // Carry
        const V = 1 << 28; // Overflow
        const IRQ = 1 << 7; // IRQ disable
        const FIQ = 1 << 6; // FIQ disable
        const THUMB = 1 << 5; // Thumb state bit
    }
}

/// Processor operating modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    User = 0b10000,
    Fiq = 0b10001,
    Irq = 0b10010,
    Supervisor = 0b10011,
    Abort = 0b10111,
    Undefined = 0b11011,
    System = 0b11111,
}

impl Mode {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 0x1F {
            0b10000 => Mode::User,
            0b10001 => Mode::Fiq,
            0b10010 => Mode::Irq,
            0b10011 => Mode::Supervisor,
            0b10111 => Mode::Abort,
            0b11011 => Mode::Undefined,
            0b11111 => Mode::System,
            _ => Mode::System,
        }
    }
}

/// Add with carry: the single primitive all arithmetic flag computation
/// routes through. Returns (sum, carry_out, overflow).
fn add_with_carry(a: u32, b: u32, cin: u32) -> (u32, bool, bool) {
    let sum = a as u64 + b as u64 + cin as u64;
    let result = sum as u32;
    let carry = sum > 0xFFFF_FFFF;
    let overflow = ((a ^ b) & 0x8000_0000 == 0) && ((a ^ result) & 0x8000_0000 != 0);
    (result, carry, overflow)
}

/// Subtract with carry: add-with-carry on the bitwise complement of `b`
/// with carry-in forced to the caller's borrow-in (1 = no borrow).
fn sub_with_carry(a: u32, b: u32, cin: u32) -> (u32, bool, bool) {
    add_with_carry(a, !b, cin)
}

/// The four-type barrel shifter, covering the documented zero-amount and
/// >=32 edge cases. `immediate` distinguishes an immediate shift amount
/// (where LSR/ASR #0 encode #32 and ROR #0 means RRX) from a
/// register-specified amount (where #0 truly means no shift at all).
fn barrel_shift(value: u32, shift_type: u32, amount: u32, carry_in: bool, immediate: bool) -> (u32, bool) {
    match shift_type & 0x3 {
        0 => {
            // LSL
            if amount == 0 {
                (value, carry_in)
            } else if amount < 32 {
                let carry = (value >> (32 - amount)) & 1 != 0;
                (value << amount, carry)
            } else if amount == 32 {
                (0, value & 1 != 0)
            } else {
                (0, false)
            }
        }
        1 => {
            // LSR
            let amt = if immediate && amount == 0 { 32 } else { amount };
            if amt == 0 {
                (value, carry_in)
            } else if amt < 32 {
                let carry = (value >> (amt - 1)) & 1 != 0;
                (value >> amt, carry)
            } else if amt == 32 {
                (0, (value >> 31) & 1 != 0)
            } else {
                (0, false)
            }
        }
        2 => {
            // ASR
            let amt = if immediate && amount == 0 { 32 } else { amount };
            if amt == 0 {
                (value, carry_in)
            } else if amt < 32 {
                let carry = ((value as i32) >> (amt - 1)) & 1 != 0;
                (((value as i32) >> amt) as u32, carry)
            } else {
                let sign = (value >> 31) & 1 != 0;
                (if sign { 0xFFFF_FFFF } else { 0 }, sign)
            }
        }
        3 => {
            // ROR, with ROR #0 (immediate) meaning RRX
            if immediate && amount == 0 {
                let carry = value & 1 != 0;
                let result = (value >> 1) | ((carry_in as u32) << 31);
                (result, carry)
            } else if amount == 0 {
                (value, carry_in)
            } else {
                let amt = amount % 32;
                if amt == 0 {
                    (value, (value >> 31) & 1 != 0)
                } else {
                    let result = value.rotate_right(amt);
                    (result, (result >> 31) & 1 != 0)
                }
            }
        }
        _ => unreachable!(),
    }
}

/// ARM7TDMI CPU
pub struct Cpu {
    // General purpose registers
    r: [u32; 16],

    // Banked registers for different modes
    banked_r8_fiq: u32,
    banked_r9_fiq: u32,
    banked_r10_fiq: u32,
    banked_r11_fiq: u32,
    banked_r12_fiq: u32,

    banked_sp: [u32; 6], // For FIQ, IRQ, Supervisor, Abort, Undefined, System
    banked_lr: [u32; 6],
    banked_spsr: [u32; 6], // Saved PSR for privileged modes

    // Current program status register
    cpsr: u32,

    // Pipeline state: two prefetched instructions, per the ARM7TDMI's
    // fetch/decode/execute overlap.
    pipeline: [u32; 2],
    pipeline_pc: [u32; 2],
    pipeline_loaded: bool,

    halted: bool,
}

impl Cpu {
    pub fn new() -> Self {
        Self {
            r: [0; 16],
            banked_r8_fiq: 0,
            banked_r9_fiq: 0,
            banked_r10_fiq: 0,
            banked_r11_fiq: 0,
            banked_r12_fiq: 0,
            banked_sp: [0; 6],
            banked_lr: [0; 6],
            banked_spsr: [0; 6],
            cpsr: 0x0000001F, // System mode
            pipeline: [0; 2],
            pipeline_pc: [0; 2],
            pipeline_loaded: false,
            halted: false,
        }
    }

    pub fn reset(&mut self) {
        self.r = [0; 16];
        self.banked_r8_fiq = 0;
        self.banked_r9_fiq = 0;
        self.banked_r10_fiq = 0;
        self.banked_r11_fiq = 0;
        self.banked_r12_fiq = 0;
        self.banked_sp = [0; 6];
        self.banked_lr = [0; 6];
        self.banked_spsr = [0; 6];
        // Supervisor mode, IRQ/FIQ masked, ARM state - as if BIOS had already
        // run its mode-setup and jumped straight to the cartridge entry point.
        self.cpsr = (Mode::Supervisor as u32) | 0xC0;
        self.r[15] = 0x0800_0000; // PC - ROM entry point
        self.pipeline = [0; 2];
        self.pipeline_pc = [0; 2];
        self.pipeline_loaded = false;
        self.halted = false;
    }

    /// Force the pipeline to reload on the next `step`; required after any
    /// out-of-band PC change such as a save-state restore.
    pub fn flush_pipeline(&mut self) {
        self.pipeline_loaded = false;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn set_halted(&mut self, halted: bool) {
        self.halted = halted;
    }

    // Register access
    pub fn get_reg(&self, n: usize) -> u32 {
        self.r[n]
    }

    pub fn set_reg(&mut self, n: usize, val: u32) {
        self.r[n] = val;
    }

    pub fn get_sp(&self) -> u32 {
        self.r[13]
    }

    pub fn set_sp(&mut self, val: u32) {
        self.r[13] = val;
    }

    pub fn get_lr(&self) -> u32 {
        self.r[14]
    }

    pub fn set_lr(&mut self, val: u32) {
        self.r[14] = val;
    }

    pub fn get_pc(&self) -> u32 {
        self.r[15]
    }

    pub fn set_pc(&mut self, val: u32) {
        if self.is_thumb_mode() {
            self.r[15] = val & 0xFFFF_FFFE;
        } else {
            self.r[15] = val & 0xFFFF_FFFC;
        }
    }

    pub fn get_cpsr(&self) -> u32 {
        self.cpsr
    }

    pub fn set_cpsr(&mut self, val: u32) {
        let mode = Mode::from_bits(val);
        self.cpsr = val;
        self.set_mode(mode);
    }

    pub fn banked_spsr(&self) -> [u32; 6] {
        self.banked_spsr
    }

    pub fn set_banked_spsr(&mut self, spsr: [u32; 6]) {
        self.banked_spsr = spsr;
    }

    /// All sixteen live general-purpose registers.
    pub fn registers(&self) -> [u32; 16] {
        self.r
    }

    /// The banked register slots not otherwise reachable through `r[..]`:
    /// FIQ's private r8-r12, and every mode's banked sp/lr. Needed for a
    /// save state to be restorable from any mode, not just the one it was
    /// captured in.
    pub fn banked_registers(&self) -> BankedRegs {
        BankedRegs {
            fiq_r8_12: [
                self.banked_r8_fiq,
                self.banked_r9_fiq,
                self.banked_r10_fiq,
                self.banked_r11_fiq,
                self.banked_r12_fiq,
            ],
            sp: self.banked_sp,
            lr: self.banked_lr,
        }
    }

    /// Replace the entire live and banked register file in one shot, with
    /// no mode-switch bank-swap logic involved - the caller supplies an
    /// already-consistent snapshot. Forces a pipeline flush, per the
    /// save-state restore contract.
    pub fn restore(&mut self, r: [u32; 16], cpsr: u32, spsr: [u32; 6], banked: BankedRegs, halted: bool) {
        self.r = r;
        self.cpsr = cpsr;
        self.banked_spsr = spsr;
        self.banked_r8_fiq = banked.fiq_r8_12[0];
        self.banked_r9_fiq = banked.fiq_r8_12[1];
        self.banked_r10_fiq = banked.fiq_r8_12[2];
        self.banked_r11_fiq = banked.fiq_r8_12[3];
        self.banked_r12_fiq = banked.fiq_r8_12[4];
        self.banked_sp = banked.sp;
        self.banked_lr = banked.lr;
        self.halted = halted;
        self.flush_pipeline();
    }

    // Mode access
    pub fn get_mode(&self) -> Mode {
        Mode::from_bits(self.cpsr)
    }

    pub fn set_mode(&mut self, mode: Mode) {
        let current = self.get_mode();
        if current == mode {
            return;
        }

        let idx = self.mode_index(current);
        if idx < 6 {
            self.banked_sp[idx] = self.r[13];
            self.banked_lr[idx] = self.r[14];
        }

        let idx = self.mode_index(mode);
        self.cpsr = (self.cpsr & !0x1F) | (mode as u32);

        if idx < 6 {
            self.r[13] = self.banked_sp[idx];
            self.r[14] = self.banked_lr[idx];
        }

        if mode == Mode::Fiq {
            self.banked_r8_fiq = self.r[8];
            self.banked_r9_fiq = self.r[9];
            self.banked_r10_fiq = self.r[10];
            self.banked_r11_fiq = self.r[11];
            self.banked_r12_fiq = self.r[12];
        } else if current == Mode::Fiq {
            self.r[8] = self.banked_r8_fiq;
            self.r[9] = self.banked_r9_fiq;
            self.r[10] = self.banked_r10_fiq;
            self.r[11] = self.banked_r11_fiq;
            self.r[12] = self.banked_r12_fiq;
        }
    }

    fn mode_index(&self, mode: Mode) -> usize {
        match mode {
            Mode::Fiq => 0,
            Mode::Irq => 1,
            Mode::Supervisor => 2,
            Mode::Abort => 3,
            Mode::Undefined => 4,
            Mode::System => 5,
            Mode::User => 5,
        }
    }

    fn get_spsr(&self) -> u32 {
        let mode = self.get_mode();
        let idx = self.mode_index(mode);
        if idx < 6 {
            self.banked_spsr[idx]
        } else {
            self.cpsr
        }
    }

    fn set_spsr(&mut self, val: u32) {
        let mode = self.get_mode();
        let idx = self.mode_index(mode);
        if idx < 6 {
            self.banked_spsr[idx] = val;
        }
    }

    // Flag access
    pub fn get_flag_n(&self) -> bool {
        self.cpsr & CpsrFlags::N.bits() != 0
    }

    pub fn set_flag_n(&mut self, val: bool) {
        if val {
            self.cpsr |= CpsrFlags::N.bits();
        } else {
            self.cpsr &= !CpsrFlags::N.bits();
        }
    }

    pub fn get_flag_z(&self) -> bool {
        self.cpsr & CpsrFlags::Z.bits() != 0
    }

    pub fn set_flag_z(&mut self, val: bool) {
        if val {
            self.cpsr |= CpsrFlags::Z.bits();
        } else {
            self.cpsr &= !CpsrFlags::Z.bits();
        }
    }

    pub fn get_flag_c(&self) -> bool {
        self.cpsr & CpsrFlags::C.bits() != 0
    }

    pub fn set_flag_c(&mut self, val: bool) {
        if val {
            self.cpsr |= CpsrFlags::C.bits();
        } else {
            self.cpsr &= !CpsrFlags::C.bits();
        }
    }

    pub fn get_flag_v(&self) -> bool {
        self.cpsr & CpsrFlags::V.bits() != 0
    }

    pub fn set_flag_v(&mut self, val: bool) {
        if val {
            self.cpsr |= CpsrFlags::V.bits();
        } else {
            self.cpsr &= !CpsrFlags::V.bits();
        }
    }

    fn set_nz(&mut self, result: u32) {
        self.set_flag_n((result as i32) < 0);
        self.set_flag_z(result == 0);
    }

    // State access
    pub fn is_thumb_mode(&self) -> bool {
        self.cpsr & CpsrFlags::THUMB.bits() != 0
    }

    pub fn set_thumb_mode(&mut self, thumb: bool) {
        if thumb {
            self.cpsr |= CpsrFlags::THUMB.bits();
        } else {
            self.cpsr &= !CpsrFlags::THUMB.bits();
        }
    }

    pub fn are_interrupts_enabled(&self) -> bool {
        self.cpsr & CpsrFlags::IRQ.bits() == 0
    }

    pub fn set_interrupts_enabled(&mut self, enabled: bool) {
        if enabled {
            self.cpsr &= !CpsrFlags::IRQ.bits();
        } else {
            self.cpsr |= CpsrFlags::IRQ.bits();
        }
    }

    fn check_condition(&self, cond: usize) -> bool {
        match cond {
            0x0 => self.get_flag_z(),                                          // EQ
            0x1 => !self.get_flag_z(),                                         // NE
            0x2 => self.get_flag_c(),                                          // CS
            0x3 => !self.get_flag_c(),                                         // CC
            0x4 => self.get_flag_n(),                                         // MI
            0x5 => !self.get_flag_n(),                                        // PL
            0x6 => self.get_flag_v(),                                         // VS
            0x7 => !self.get_flag_v(),                                        // VC
            0x8 => self.get_flag_c() && !self.get_flag_z(),                   // HI
            0x9 => !self.get_flag_c() || self.get_flag_z(),                   // LS
            0xA => self.get_flag_n() == self.get_flag_v(),                    // GE
            0xB => self.get_flag_n() != self.get_flag_v(),                    // LT
            0xC => !self.get_flag_z() && (self.get_flag_n() == self.get_flag_v()), // GT
            0xD => self.get_flag_z() || (self.get_flag_n() != self.get_flag_v()),  // LE
            0xE => true,                                                      // AL
            _ => false,
        }
    }

    /// Raises the IRQ exception if the guest hasn't masked it and a pending
    /// source is both enabled (IE) and flagged (IF), gated on IME. Does not
    /// clear IF - that is software's job once it services the interrupt.
    pub fn check_irq(&mut self, mem: &super::Memory) -> bool {
        if !self.are_interrupts_enabled() {
            return false;
        }
        let ime = mem.io_read16(regs::IME);
        if ime == 0 {
            return false;
        }
        let ie = mem.io_read16(regs::IE);
        let iflags = mem.io_read16(regs::IF);
        if ie & iflags == 0 {
            return false;
        }

        self.halted = false;
        let old_cpsr = self.cpsr;
        let return_addr = self.r[15];
        let was_thumb = self.is_thumb_mode();
        self.set_mode(Mode::Irq);
        self.cpsr = (self.cpsr & !0x1F) | (Mode::Irq as u32);
        self.set_spsr(old_cpsr);
        self.set_thumb_mode(false);
        self.r[14] = if was_thumb { return_addr.wrapping_add(2) } else { return_addr };
        self.r[15] = 0x18;
        self.set_interrupts_enabled(false);
        self.pipeline_loaded = false;
        true
    }

    /// Execute one instruction, return cycles taken
    pub fn step(&mut self, mem: &mut super::Memory) -> u32 {
        if self.halted {
            return 1;
        }
        if self.is_thumb_mode() {
            self.step_thumb(mem)
        } else {
            self.step_arm(mem)
        }
    }

    fn step_arm(&mut self, mem: &mut super::Memory) -> u32 {
        if !self.pipeline_loaded {
            self.pipeline_pc[0] = self.r[15];
            self.pipeline[0] = mem.read_word(self.r[15]);
            self.r[15] = self.r[15].wrapping_add(4);

            self.pipeline_pc[1] = self.r[15];
            self.pipeline[1] = mem.read_word(self.r[15]);
            self.r[15] = self.r[15].wrapping_add(4);

            self.pipeline_loaded = true;
        }

        let opcode = self.pipeline[0];
        let instruction_pc = self.pipeline_pc[0];
        let pc_at_execution = self.r[15];

        self.pipeline[0] = self.pipeline[1];
        self.pipeline_pc[0] = self.pipeline_pc[1];

        let cycles = self.execute_arm_with_pc(opcode, mem, instruction_pc, pc_at_execution);

        if self.r[15] == pc_at_execution.wrapping_add(4) {
            self.pipeline_pc[1] = self.r[15];
            self.pipeline[1] = mem.read_word(self.r[15]);
            self.r[15] = self.r[15].wrapping_add(4);
        } else {
            self.pipeline_loaded = false;
        }

        cycles
    }

    fn execute_arm_with_pc(
        &mut self,
        opcode: u32,
        mem: &mut super::Memory,
        instruction_pc: u32,
        pc_at_execution: u32,
    ) -> u32 {
        let cond = ((opcode >> 28) & 0xF) as usize;
        if !self.check_condition(cond) {
            self.r[15] = pc_at_execution.wrapping_add(4);
            return 1;
        }

        let category = (opcode >> 25) & 0x7;

        match category {
            0b000 => {
                if (opcode & 0x0FFF_FFF0) == 0x012F_FF10 {
                    self.execute_arm_bx(opcode)
                } else if (opcode & 0x0FB0_0000) == 0x0100_0000 && (opcode & 0x10) == 0 {
                    self.execute_arm_psr(opcode)
                } else if (opcode & 0x0FC0_00F0) == 0x0000_0090 {
                    self.execute_arm_mul(opcode, false)
                } else if (opcode & 0x0FE0_00F0) == 0x0020_0090 {
                    self.execute_arm_mul(opcode, true)
                } else if (opcode & 0x90) == 0x90 {
                    warn!("unimplemented ARM extension opcode {:#010X}", opcode);
                    self.r[15] = self.r[15].wrapping_add(4);
                    1
                } else {
                    self.execute_arm_data_processing(opcode)
                }
            }
            0b001 => {
                if (opcode & 0x0FB0_0000) == 0x0320_0000 {
                    self.execute_arm_psr(opcode)
                } else {
                    self.execute_arm_data_processing(opcode)
                }
            }
            0b010 => self.execute_arm_single_transfer(opcode, mem, false),
            0b011 => {
                if opcode & 0x10 != 0 {
                    warn!("undefined ARM opcode {:#010X}", opcode);
                    self.r[15] = self.r[15].wrapping_add(4);
                    1
                } else {
                    self.execute_arm_single_transfer(opcode, mem, true)
                }
            }
            0b100 => self.execute_arm_block_transfer(opcode, mem),
            0b101 => self.execute_arm_branch(opcode, instruction_pc),
            0b110 => {
                warn!("unimplemented coprocessor data transfer {:#010X}", opcode);
                self.r[15] = self.r[15].wrapping_add(4);
                1
            }
            0b111 => {
                if opcode & 0x0100_0000 != 0 {
                    self.execute_arm_swi(opcode, mem)
                } else {
                    warn!("unimplemented coprocessor op {:#010X}", opcode);
                    self.r[15] = self.r[15].wrapping_add(4);
                    1
                }
            }
            _ => unreachable!(),
        }
    }

    /// Resolves operand2 for a data-processing instruction, returning the
    /// value and the shifter's carry-out (used when S is set on a logical
    /// op). Bit 25 of the full opcode - not bit 0 of operand2 - selects the
    /// immediate form.
    fn decode_operand2_full(&self, opcode: u32) -> (u32, bool) {
        if opcode & (1 << 25) != 0 {
            let imm8 = opcode & 0xFF;
            let rotate = ((opcode >> 8) & 0xF) * 2;
            let val = imm8.rotate_right(rotate);
            let carry = if rotate == 0 { self.get_flag_c() } else { (val >> 31) & 1 != 0 };
            (val, carry)
        } else {
            let rm = (opcode & 0xF) as usize;
            let shift_type = (opcode >> 5) & 0x3;
            let reg_shift = opcode & 0x10 != 0;
            let mut val = self.r[rm];
            if rm == 15 {
                val = val.wrapping_add(if reg_shift { 12 } else { 8 });
            }
            if reg_shift {
                let rs = ((opcode >> 8) & 0xF) as usize;
                let amount = self.r[rs] & 0xFF;
                barrel_shift(val, shift_type, amount, self.get_flag_c(), false)
            } else {
                let amount = (opcode >> 7) & 0x1F;
                barrel_shift(val, shift_type, amount, self.get_flag_c(), true)
            }
        }
    }

    fn read_rn(&self, rn: usize, opcode: u32) -> u32 {
        if rn == 15 {
            let reg_shift = opcode & (1 << 25) == 0 && opcode & 0x10 != 0;
            self.r[15].wrapping_add(if reg_shift { 12 } else { 8 })
        } else {
            self.r[rn]
        }
    }

    fn execute_arm_data_processing(&mut self, opcode: u32) -> u32 {
        let op = (opcode >> 21) & 0xF;
        let s = ((opcode >> 20) & 1) != 0;
        let rn = ((opcode >> 16) & 0xF) as usize;
        let rd = ((opcode >> 12) & 0xF) as usize;

        let rn_val = self.read_rn(rn, opcode);
        let (op2_val, shifter_carry) = self.decode_operand2_full(opcode);
        let cin = if self.get_flag_c() { 1 } else { 0 };

        let mut write_result = true;

        match op {
            0x0 => {
                // AND
                let result = rn_val & op2_val;
                self.r[rd] = result;
                if s {
                    self.set_nz(result);
                    self.set_flag_c(shifter_carry);
                }
            }
            0x1 => {
                // EOR
                let result = rn_val ^ op2_val;
                self.r[rd] = result;
                if s {
                    self.set_nz(result);
                    self.set_flag_c(shifter_carry);
                }
            }
            0x2 => {
                // SUB
                let (result, carry, overflow) = sub_with_carry(rn_val, op2_val, 1);
                self.r[rd] = result;
                if s {
                    self.set_nz(result);
                    self.set_flag_c(carry);
                    self.set_flag_v(overflow);
                }
            }
            0x3 => {
                // RSB
                let (result, carry, overflow) = sub_with_carry(op2_val, rn_val, 1);
                self.r[rd] = result;
                if s {
                    self.set_nz(result);
                    self.set_flag_c(carry);
                    self.set_flag_v(overflow);
                }
            }
            0x4 => {
                // ADD
                let (result, carry, overflow) = add_with_carry(rn_val, op2_val, 0);
                self.r[rd] = result;
                if s {
                    self.set_nz(result);
                    self.set_flag_c(carry);
                    self.set_flag_v(overflow);
                }
            }
            0x5 => {
                // ADC
                let (result, carry, overflow) = add_with_carry(rn_val, op2_val, cin);
                self.r[rd] = result;
                if s {
                    self.set_nz(result);
                    self.set_flag_c(carry);
                    self.set_flag_v(overflow);
                }
            }
            0x6 => {
                // SBC
                let (result, carry, overflow) = sub_with_carry(rn_val, op2_val, cin);
                self.r[rd] = result;
                if s {
                    self.set_nz(result);
                    self.set_flag_c(carry);
                    self.set_flag_v(overflow);
                }
            }
            0x7 => {
                // RSC
                let (result, carry, overflow) = sub_with_carry(op2_val, rn_val, cin);
                self.r[rd] = result;
                if s {
                    self.set_nz(result);
                    self.set_flag_c(carry);
                    self.set_flag_v(overflow);
                }
            }
            0x8 => {
                // TST
                write_result = false;
                let result = rn_val & op2_val;
                self.set_nz(result);
                self.set_flag_c(shifter_carry);
            }
            0x9 => {
                // TEQ
                write_result = false;
                let result = rn_val ^ op2_val;
                self.set_nz(result);
                self.set_flag_c(shifter_carry);
            }
            0xA => {
                // CMP
                write_result = false;
                let (result, carry, overflow) = sub_with_carry(rn_val, op2_val, 1);
                self.set_nz(result);
                self.set_flag_c(carry);
                self.set_flag_v(overflow);
            }
            0xB => {
                // CMN
                write_result = false;
                let (result, carry, overflow) = add_with_carry(rn_val, op2_val, 0);
                self.set_nz(result);
                self.set_flag_c(carry);
                self.set_flag_v(overflow);
            }
            0xC => {
                // ORR
                let result = rn_val | op2_val;
                self.r[rd] = result;
                if s {
                    self.set_nz(result);
                    self.set_flag_c(shifter_carry);
                }
            }
            0xD => {
                // MOV
                self.r[rd] = op2_val;
                if s {
                    self.set_nz(op2_val);
                    self.set_flag_c(shifter_carry);
                }
            }
            0xE => {
                // BIC
                let result = rn_val & !op2_val;
                self.r[rd] = result;
                if s {
                    self.set_nz(result);
                    self.set_flag_c(shifter_carry);
                }
            }
            0xF => {
                // MVN
                let result = !op2_val;
                self.r[rd] = result;
                if s {
                    self.set_nz(result);
                    self.set_flag_c(shifter_carry);
                }
            }
            _ => unreachable!(),
        }

        if write_result && rd == 15 {
            if s {
                let spsr = self.get_spsr();
                let mode = Mode::from_bits(spsr);
                self.cpsr = spsr;
                self.set_mode(mode);
            }
            self.set_pc(self.r[15]);
        } else if rd != 15 || !write_result {
            self.r[15] = self.r[15].wrapping_add(4);
        }

        1
    }

    fn execute_arm_mul(&mut self, opcode: u32, accumulate: bool) -> u32 {
        let s = (opcode >> 20) & 1 != 0;
        let rd = ((opcode >> 16) & 0xF) as usize;
        let rn = ((opcode >> 12) & 0xF) as usize;
        let rs = ((opcode >> 8) & 0xF) as usize;
        let rm = (opcode & 0xF) as usize;

        let mut result = self.r[rm].wrapping_mul(self.r[rs]);
        if accumulate {
            result = result.wrapping_add(self.r[rn]);
        }
        self.r[rd] = result;
        if s {
            self.set_nz(result);
        }

        self.r[15] = self.r[15].wrapping_add(4);
        2
    }

    fn execute_arm_psr(&mut self, opcode: u32) -> u32 {
        let mrs = (opcode & (1 << 21)) == 0;
        let psr = (opcode & (1 << 22)) != 0; // 0 = CPSR, 1 = SPSR

        if mrs {
            let rd = ((opcode >> 12) & 0xF) as usize;
            self.r[rd] = if psr { self.get_spsr() } else { self.cpsr };
        } else {
            let immediate = (opcode & (1 << 25)) != 0;
            let val = if immediate {
                let imm = opcode & 0xFF;
                let rotate = ((opcode >> 8) & 0xF) * 2;
                imm.rotate_right(rotate)
            } else {
                let rm = (opcode & 0xF) as usize;
                self.r[rm]
            };

            let apply_flags = (opcode & 0x0008_0000) != 0;
            let apply_control = (opcode & 0x0001_0000) != 0;

            if psr {
                let mut spsr = self.get_spsr();
                if apply_flags {
                    spsr = (spsr & 0x00FF_FFFF) | (val & 0xFF00_0000);
                }
                if apply_control {
                    spsr = (spsr & 0xFFFF_FF00) | (val & 0x0000_00FF);
                }
                self.set_spsr(spsr);
            } else {
                if apply_flags {
                    self.cpsr = (self.cpsr & 0x00FF_FFFF) | (val & 0xFF00_0000);
                }
                if apply_control {
                    let new_cpsr = (self.cpsr & 0xFFFF_FF00) | (val & 0x0000_00FF);
                    let new_mode = Mode::from_bits(new_cpsr);
                    self.cpsr = new_cpsr;
                    self.set_mode(new_mode);
                }
            }
        }

        self.r[15] = self.r[15].wrapping_add(4);
        1
    }

    fn execute_arm_bx(&mut self, opcode: u32) -> u32 {
        let rm = (opcode & 0xF) as usize;
        let target = self.r[rm];

        self.set_thumb_mode((target & 1) != 0);
        self.set_pc(target);

        2
    }

    fn execute_arm_single_transfer(&mut self, opcode: u32, mem: &mut super::Memory, register_offset: bool) -> u32 {
        let load = ((opcode >> 20) & 1) != 0;
        let byte = ((opcode >> 22) & 1) != 0;
        let writeback = ((opcode >> 21) & 1) != 0;
        let pre_index = ((opcode >> 24) & 1) != 0;
        let add = ((opcode >> 23) & 1) != 0;
        let rn = ((opcode >> 16) & 0xF) as usize;
        let rd = ((opcode >> 12) & 0xF) as usize;

        let offset = if register_offset {
            let rm = (opcode & 0xF) as usize;
            let shift_type = (opcode >> 5) & 0x3;
            let amount = (opcode >> 7) & 0x1F;
            let (val, _) = barrel_shift(self.r[rm], shift_type, amount, self.get_flag_c(), true);
            val
        } else {
            opcode & 0xFFF
        };

        let base = self.r[rn];
        let indexed = if add { base.wrapping_add(offset) } else { base.wrapping_sub(offset) };
        let access_addr = if pre_index { indexed } else { base };

        if load {
            self.r[rd] = if byte {
                mem.read_byte(access_addr) as u32
            } else {
                mem.read_word(access_addr)
            };
        } else {
            let val = if rd == 15 { self.r[15].wrapping_add(4) } else { self.r[rd] };
            if byte {
                mem.write_byte(access_addr, val as u8);
            } else {
                mem.write_word(access_addr, val);
            }
        }

        if pre_index {
            if writeback {
                self.r[rn] = indexed;
            }
        } else {
            self.r[rn] = indexed;
        }

        if load && rd == 15 {
            self.set_pc(self.r[15]);
        } else {
            self.r[15] = self.r[15].wrapping_add(4);
        }

        if load { 3 } else { 2 }
    }

    /// Block data transfer (LDM/STM): compute the start address from the
    /// up/down and pre/post bits, iterate registers low-to-high advancing
    /// the address by 4 each time, then writeback base +/- count*4.
    fn execute_arm_block_transfer(&mut self, opcode: u32, mem: &mut super::Memory) -> u32 {
        let load = (opcode >> 20) & 1 != 0;
        let writeback = (opcode >> 21) & 1 != 0;
        let up = (opcode >> 23) & 1 != 0;
        let pre_index = (opcode >> 24) & 1 != 0;
        let rn = ((opcode >> 16) & 0xF) as usize;
        // An empty register list is a documented hardware quirk: the transfer
        // still moves 16 words' worth of address and (on real silicon) R15.
        let (reg_list, count) = if opcode & 0xFFFF == 0 {
            (1u16 << 15, 16u32)
        } else {
            let rl = (opcode & 0xFFFF) as u16;
            (rl, rl.count_ones())
        };
        let base = self.r[rn];
        let (start, new_base) = if up {
            (base, base.wrapping_add(count * 4))
        } else {
            (base.wrapping_sub(count * 4), base.wrapping_sub(count * 4))
        };

        let mut addr = start;
        if pre_index == up {
            addr = addr.wrapping_add(4);
        }

        let mut cycles = 1;
        for i in 0..16usize {
            if reg_list & (1 << i) != 0 {
                if load {
                    self.r[i] = mem.read_word(addr);
                } else {
                    let val = if i == 15 { self.r[15].wrapping_add(4) } else { self.r[i] };
                    mem.write_word(addr, val);
                }
                addr = addr.wrapping_add(4);
                cycles += 1;
            }
        }

        if writeback {
            self.r[rn] = new_base;
        }

        if load && reg_list & (1 << 15) != 0 {
            self.set_pc(self.r[15]);
        } else {
            self.r[15] = self.r[15].wrapping_add(4);
        }

        cycles
    }

    fn execute_arm_branch(&mut self, opcode: u32, instruction_pc: u32) -> u32 {
        let offset_imm = opcode & 0x00FF_FFFF;
        let offset = ((offset_imm << 8) as i32) >> 6; // sign-extend 24-bit, then *4

        let link = ((opcode >> 24) & 1) != 0;

        if link {
            self.set_lr(instruction_pc.wrapping_add(4));
        }

        let target = instruction_pc.wrapping_add(8).wrapping_add(offset as u32);
        self.set_pc(target);

        2
    }

    /// Dispatches a BIOS SWI. A loaded BIOS image always wins: the real
    /// exception path is taken unconditionally, exactly as hardware does.
    /// Only in the absence of a BIOS image do the convenience shortcuts for
    /// a handful of common calls run, so unmodified homebrew can still make
    /// forward progress.
    fn dispatch_swi(&mut self, func: u32, mem: &super::Memory, thumb_return_bit: u32) -> u32 {
        if mem.has_bios() {
            let old_cpsr = self.cpsr;
            self.set_mode(Mode::Supervisor);
            self.set_spsr(old_cpsr);
            self.set_lr(self.r[15]);
            self.set_thumb_mode(false);
            self.r[15] = 0x08;
            self.set_interrupts_enabled(false);
            self.pipeline_loaded = false;
            return 3;
        }

        match func {
            0x00 => {
                self.reset();
                self.r[15] = 0x0800_0000 | thumb_return_bit;
            }
            0x01 => {
                self.r[15] = self.r[14] | thumb_return_bit;
            }
            0x02 | 0x03 => {
                self.halted = true;
                self.r[15] = self.r[14] | thumb_return_bit;
            }
            0x04 | 0x05 => {
                self.halted = true;
                self.r[15] = self.r[14] | thumb_return_bit;
            }
            0x06 | 0x08 => {
                let r0 = self.r[0] as i32;
                let r1 = self.r[1] as i32;
                if r1 != 0 {
                    self.r[0] = (r0 / r1) as u32;
                    self.r[3] = (r0 % r1) as u32;
                } else {
                    self.r[0] = 0xFFFF_FFFF;
                    self.r[3] = r0 as u32;
                }
                self.r[15] = self.r[14] | thumb_return_bit;
            }
            0x0E => {
                let r0 = self.r[0] as f64;
                self.r[0] = r0.sqrt() as u32;
                self.r[15] = self.r[14] | thumb_return_bit;
            }
            _ => {
                warn!("unknown SWI 0x{:06X} with no BIOS loaded, returning without effect", func);
                self.r[15] = self.r[14] | thumb_return_bit;
            }
        }

        3
    }

    fn execute_arm_swi(&mut self, opcode: u32, mem: &mut super::Memory) -> u32 {
        let swi_func = (opcode & 0x00FF_FFFF) >> 16;
        self.dispatch_swi(swi_func, mem, 0)
    }

    fn step_thumb(&mut self, mem: &mut super::Memory) -> u32 {
        if !self.pipeline_loaded {
            let pc = self.r[15];
            self.pipeline_pc[0] = pc;
            self.pipeline[0] = mem.read_half(pc) as u32;
            self.r[15] = self.r[15].wrapping_add(2);

            self.pipeline_pc[1] = self.r[15];
            self.pipeline[1] = mem.read_half(self.r[15]) as u32;
            self.r[15] = self.r[15].wrapping_add(2);

            self.pipeline_loaded = true;
        }

        let opcode = self.pipeline[0] as u16;
        let instruction_pc = self.pipeline_pc[0];
        let pc_at_execution = self.r[15];

        self.pipeline[0] = self.pipeline[1];
        self.pipeline_pc[0] = self.pipeline_pc[1];

        let cycles = self.execute_thumb(opcode, mem, instruction_pc);

        if self.r[15] == pc_at_execution.wrapping_add(2) {
            self.pipeline_pc[1] = self.r[15];
            self.pipeline[1] = mem.read_half(self.r[15]) as u32;
            self.r[15] = self.r[15].wrapping_add(2);
        } else {
            self.pipeline_loaded = false;
        }

        cycles
    }

    fn execute_thumb(&mut self, opcode: u16, mem: &mut super::Memory, instruction_pc: u32) -> u32 {
        let category = (opcode >> 13) & 0x7;

        match category {
            0b000 => {
                if (opcode & 0x1800) == 0x1800 {
                    self.thumb_add_sub_imm(opcode)
                } else {
                    self.thumb_shift_register(opcode)
                }
            }
            0b001 => self.thumb_data_proc_imm(opcode),
            0b010 => {
                if (opcode & 0xFC00) == 0x4000 {
                    self.thumb_data_proc_reg(opcode)
                } else if (opcode & 0xFC00) == 0x4400 {
                    self.thumb_hi_reg_ops(opcode)
                } else if (opcode & 0xF800) == 0x4800 {
                    self.thumb_load_pc_rel(opcode, mem)
                } else if (opcode & 0x0200) == 0 {
                    let byte = (opcode >> 10) & 1 != 0;
                    self.thumb_load_store_reg_offset(opcode, mem, byte)
                } else {
                    self.thumb_load_store_sign_ext(opcode, mem)
                }
            }
            0b011 => {
                let op = (opcode >> 11) & 0x3;
                match op {
                    0b00 => self.thumb_load_store_word_byte(opcode, mem, false),
                    0b01 => self.thumb_load_store_word_byte(opcode, mem, false),
                    0b10 => self.thumb_load_store_word_byte(opcode, mem, true),
                    _ => self.thumb_load_store_word_byte(opcode, mem, true),
                }
            }
            0b100 => {
                let op = (opcode >> 11) & 0x3;
                match op {
                    0b00 => self.thumb_load_store_halfword(opcode, mem, false),
                    0b01 => self.thumb_load_store_halfword(opcode, mem, true),
                    0b10 => self.thumb_load_store_sp_rel(opcode, mem, false),
                    _ => self.thumb_load_store_sp_rel(opcode, mem, true),
                }
            }
            0b101 => {
                if (opcode & 0xF800) == 0xA000 || (opcode & 0xF800) == 0xA800 {
                    self.thumb_load_addr(opcode)
                } else if (opcode & 0xFF00) == 0xB000 {
                    self.thumb_add_sp(opcode)
                } else if (opcode & 0xF600) == 0xB400 {
                    self.thumb_push_pop(opcode, mem, false)
                } else if (opcode & 0xF600) == 0xBC00 {
                    self.thumb_push_pop(opcode, mem, true)
                } else {
                    warn!("unimplemented Thumb opcode {:#06X}", opcode);
                    self.r[15] = self.r[15].wrapping_add(2);
                    1
                }
            }
            0b110 => {
                if (opcode & 0xF000) == 0xC000 {
                    self.thumb_load_store_multiple(opcode, mem, (opcode >> 11) & 1 != 0)
                } else if (opcode & 0xFF00) == 0xDF00 {
                    self.thumb_software_interrupt(mem)
                } else if (opcode & 0xF000) == 0xD000 {
                    self.thumb_branch_cond(opcode, instruction_pc)
                } else {
                    warn!("unimplemented Thumb opcode {:#06X}", opcode);
                    self.r[15] = self.r[15].wrapping_add(2);
                    1
                }
            }
            0b111 => {
                if (opcode & 0xF800) == 0xE000 {
                    self.thumb_branch(opcode, instruction_pc)
                } else if (opcode & 0xF800) == 0xF000 {
                    self.thumb_bl_prefix(opcode, instruction_pc)
                } else {
                    self.thumb_bl_suffix(opcode, instruction_pc)
                }
            }
            _ => 1,
        }
    }

    // Thumb instruction implementations

    fn thumb_shift_register(&mut self, opcode: u16) -> u32 {
        let op = (opcode >> 11) & 0x3;
        let rm = ((opcode >> 3) & 0x7) as usize;
        let rd = (opcode & 0x7) as usize;
        let amount = ((opcode >> 6) & 0x1F) as u32;

        let value = self.r[rm];
        let shift_type = op;
        let (result, carry) = barrel_shift(value, shift_type as u32, amount, self.get_flag_c(), true);

        self.r[rd] = result;
        self.set_flag_c(carry);
        self.set_nz(result);
        self.r[15] = self.r[15].wrapping_add(2);
        1
    }

    fn thumb_add_sub_imm(&mut self, opcode: u16) -> u32 {
        let op = (opcode >> 9) & 0x3;
        let rn_field = ((opcode >> 6) & 0x7) as usize;
        let rd = (opcode & 0x7) as usize;

        match op {
            0b00 => {
                let rn_val = self.r[rn_field];
                let rm = ((opcode >> 6) & 0x7) as usize;
                let (result, carry, overflow) = add_with_carry(rn_val, self.r[rm], 0);
                self.r[rd] = result;
                self.set_nz(result);
                self.set_flag_c(carry);
                self.set_flag_v(overflow);
            }
            0b01 => {
                let rn_val = self.r[rn_field];
                let rm = ((opcode >> 6) & 0x7) as usize;
                let (result, carry, overflow) = sub_with_carry(rn_val, self.r[rm], 1);
                self.r[rd] = result;
                self.set_nz(result);
                self.set_flag_c(carry);
                self.set_flag_v(overflow);
            }
            0b10 => {
                let imm = ((opcode >> 6) & 0x7) as u32;
                let rs = (opcode & 0x7) as usize;
                let rn_val = self.r[rs];
                let (result, carry, overflow) = add_with_carry(rn_val, imm, 0);
                self.r[rd] = result;
                self.set_nz(result);
                self.set_flag_c(carry);
                self.set_flag_v(overflow);
            }
            _ => {
                let imm = ((opcode >> 6) & 0x7) as u32;
                let rs = (opcode & 0x7) as usize;
                let rn_val = self.r[rs];
                let (result, carry, overflow) = sub_with_carry(rn_val, imm, 1);
                self.r[rd] = result;
                self.set_nz(result);
                self.set_flag_c(carry);
                self.set_flag_v(overflow);
            }
        }

        self.r[15] = self.r[15].wrapping_add(2);
        1
    }

    fn thumb_data_proc_imm(&mut self, opcode: u16) -> u32 {
        let op = (opcode >> 11) & 0x3;
        let rd = ((opcode >> 8) & 0x7) as usize;
        let imm = (opcode & 0xFF) as u32;

        let rd_val = self.r[rd];

        match op {
            0b00 => {
                self.r[rd] = imm;
                self.set_nz(imm);
            }
            0b01 => {
                let (result, carry, overflow) = sub_with_carry(rd_val, imm, 1);
                self.set_nz(result);
                self.set_flag_c(carry);
                self.set_flag_v(overflow);
            }
            0b10 => {
                let (result, carry, overflow) = add_with_carry(rd_val, imm, 0);
                self.r[rd] = result;
                self.set_nz(result);
                self.set_flag_c(carry);
                self.set_flag_v(overflow);
            }
            _ => {
                let (result, carry, overflow) = sub_with_carry(rd_val, imm, 1);
                self.r[rd] = result;
                self.set_nz(result);
                self.set_flag_c(carry);
                self.set_flag_v(overflow);
            }
        }

        self.r[15] = self.r[15].wrapping_add(2);
        1
    }

    fn thumb_data_proc_reg(&mut self, opcode: u16) -> u32 {
        let op = (opcode >> 6) & 0xF;
        let rms = ((opcode >> 3) & 0x7) as usize;
        let rds = (opcode & 0x7) as usize;

        let rm_val = self.r[rms];
        let rd_val = self.r[rds];
        let cin = if self.get_flag_c() { 1 } else { 0 };

        match op {
            0x0 => {
                let result = rd_val & rm_val;
                self.r[rds] = result;
                self.set_nz(result);
            }
            0x1 => {
                let result = rd_val ^ rm_val;
                self.r[rds] = result;
                self.set_nz(result);
            }
            0x2 => {
                let (result, carry) = barrel_shift(rd_val, 0, rm_val & 0xFF, self.get_flag_c(), false);
                self.r[rds] = result;
                self.set_flag_c(carry);
                self.set_nz(result);
            }
            0x3 => {
                let (result, carry) = barrel_shift(rd_val, 1, rm_val & 0xFF, self.get_flag_c(), false);
                self.r[rds] = result;
                self.set_flag_c(carry);
                self.set_nz(result);
            }
            0x4 => {
                let (result, carry) = barrel_shift(rd_val, 2, rm_val & 0xFF, self.get_flag_c(), false);
                self.r[rds] = result;
                self.set_flag_c(carry);
                self.set_nz(result);
            }
            0x5 => {
                let (result, carry, overflow) = add_with_carry(rd_val, rm_val, cin);
                self.r[rds] = result;
                self.set_nz(result);
                self.set_flag_c(carry);
                self.set_flag_v(overflow);
            }
            0x6 => {
                let (result, carry, overflow) = sub_with_carry(rd_val, rm_val, cin);
                self.r[rds] = result;
                self.set_nz(result);
                self.set_flag_c(carry);
                self.set_flag_v(overflow);
            }
            0x7 => {
                let (result, carry) = barrel_shift(rd_val, 3, rm_val & 0xFF, self.get_flag_c(), false);
                self.r[rds] = result;
                self.set_flag_c(carry);
                self.set_nz(result);
            }
            0x8 => {
                let result = rd_val & rm_val;
                self.set_nz(result);
            }
            0x9 => {
                let (result, carry, overflow) = sub_with_carry(0, rm_val, 1);
                self.r[rds] = result;
                self.set_nz(result);
                self.set_flag_c(carry);
                self.set_flag_v(overflow);
            }
            0xA => {
                let (result, carry, overflow) = sub_with_carry(rd_val, rm_val, 1);
                self.set_nz(result);
                self.set_flag_c(carry);
                self.set_flag_v(overflow);
            }
            0xB => {
                let (result, carry, overflow) = add_with_carry(rd_val, rm_val, 0);
                self.set_nz(result);
                self.set_flag_c(carry);
                self.set_flag_v(overflow);
            }
            0xC => {
                let result = rd_val | rm_val;
                self.r[rds] = result;
                self.set_nz(result);
            }
            0xD => {
                let result = rd_val.wrapping_mul(rm_val);
                self.r[rds] = result;
                self.set_nz(result);
            }
            0xE => {
                let result = rd_val & !rm_val;
                self.r[rds] = result;
                self.set_nz(result);
            }
            _ => {
                let result = !rm_val;
                self.r[rds] = result;
                self.set_nz(result);
            }
        }

        self.r[15] = self.r[15].wrapping_add(2);
        1
    }

    fn thumb_hi_reg_ops(&mut self, opcode: u16) -> u32 {
        let op = (opcode >> 8) & 0x3;
        let hd = ((opcode >> 7) & 1) != 0;
        let hs = ((opcode >> 6) & 1) != 0;

        let rd = ((opcode & 0x7) | ((hd as u16) << 3)) as usize;
        let rs = (((opcode >> 3) & 0x7) | ((hs as u16) << 3)) as usize;

        match op {
            0b00 => {
                let result = self.r[rd].wrapping_add(self.r[rs]);
                self.r[rd] = result;
            }
            0b01 => {
                let (result, carry, overflow) = sub_with_carry(self.r[rd], self.r[rs], 1);
                self.set_nz(result);
                self.set_flag_c(carry);
                self.set_flag_v(overflow);
            }
            0b10 => {
                self.r[rd] = self.r[rs];
            }
            _ => {
                let target = self.r[rs];
                self.set_thumb_mode((target & 1) != 0);
                self.set_pc(target);
                return 2;
            }
        }

        if rd == 15 {
            self.set_pc(self.r[15]);
        } else {
            self.r[15] = self.r[15].wrapping_add(2);
        }
        1
    }

    fn thumb_load_pc_rel(&mut self, opcode: u16, mem: &mut super::Memory) -> u32 {
        let rd = ((opcode >> 8) & 0x7) as usize;
        let imm = ((opcode & 0xFF) * 4) as u32;

        let pc = self.r[15] & !0x3;
        let addr = pc.wrapping_add(imm);

        self.r[rd] = mem.read_word(addr);
        self.r[15] = self.r[15].wrapping_add(2);
        2
    }

    fn thumb_load_store_reg_offset(&mut self, opcode: u16, mem: &mut super::Memory, byte: bool) -> u32 {
        let load = (opcode >> 11) & 1 != 0;
        let ro = ((opcode >> 6) & 0x7) as usize;
        let rb = ((opcode >> 3) & 0x7) as usize;
        let rd = (opcode & 0x7) as usize;

        let addr = self.r[rb].wrapping_add(self.r[ro]);

        if load {
            self.r[rd] = if byte { mem.read_byte(addr) as u32 } else { mem.read_word(addr) };
        } else if byte {
            mem.write_byte(addr, self.r[rd] as u8);
        } else {
            mem.write_word(addr, self.r[rd]);
        }

        self.r[15] = self.r[15].wrapping_add(2);
        2
    }

    /// Thumb format 8: `STRH`/`LDRH`/`LDSB`/`LDSH Rd,[Rb,Ro]`. `H` (bit 11)
    /// picks halfword vs byte, `S` (bit 10) picks sign-extend vs zero-extend;
    /// `S=0,H=0` is the one plain store (`STRH`).
    fn thumb_load_store_sign_ext(&mut self, opcode: u16, mem: &mut super::Memory) -> u32 {
        let h = (opcode >> 11) & 1 != 0;
        let s = (opcode >> 10) & 1 != 0;
        let ro = ((opcode >> 6) & 0x7) as usize;
        let rb = ((opcode >> 3) & 0x7) as usize;
        let rd = (opcode & 0x7) as usize;

        let addr = self.r[rb].wrapping_add(self.r[ro]);

        match (s, h) {
            (false, false) => mem.write_half(addr, self.r[rd] as u16),
            (false, true) => self.r[rd] = mem.read_half(addr) as u32,
            (true, false) => self.r[rd] = (mem.read_byte(addr) as i8) as i32 as u32,
            (true, true) => self.r[rd] = (mem.read_half(addr) as i16) as i32 as u32,
        }

        self.r[15] = self.r[15].wrapping_add(2);
        2
    }

    fn thumb_load_store_word_byte(&mut self, opcode: u16, mem: &mut super::Memory, byte: bool) -> u32 {
        let load = (opcode >> 11) & 1 != 0;
        let imm = ((opcode >> 6) & 0x1F) as u32;
        let offset = if byte { imm } else { imm * 4 };
        let rb = ((opcode >> 3) & 0x7) as usize;
        let rd = (opcode & 0x7) as usize;

        let addr = self.r[rb].wrapping_add(offset);

        if load {
            self.r[rd] = if byte { mem.read_byte(addr) as u32 } else { mem.read_word(addr) };
        } else if byte {
            mem.write_byte(addr, self.r[rd] as u8);
        } else {
            mem.write_word(addr, self.r[rd]);
        }

        self.r[15] = self.r[15].wrapping_add(2);
        2
    }

    fn thumb_load_store_halfword(&mut self, opcode: u16, mem: &mut super::Memory, load: bool) -> u32 {
        let offset = (((opcode >> 6) & 0x1F) * 2) as u32;
        let rb = ((opcode >> 3) & 0x7) as usize;
        let rd = (opcode & 0x7) as usize;

        let addr = self.r[rb].wrapping_add(offset);

        if load {
            self.r[rd] = mem.read_half(addr) as u32;
        } else {
            mem.write_half(addr, self.r[rd] as u16);
        }

        self.r[15] = self.r[15].wrapping_add(2);
        2
    }

    fn thumb_load_store_sp_rel(&mut self, opcode: u16, mem: &mut super::Memory, load: bool) -> u32 {
        let rd = ((opcode >> 8) & 0x7) as usize;
        let offset = ((opcode & 0xFF) * 4) as u32;

        let addr = self.r[13].wrapping_add(offset);

        if load {
            self.r[rd] = mem.read_word(addr);
        } else {
            mem.write_word(addr, self.r[rd]);
        }

        self.r[15] = self.r[15].wrapping_add(2);
        2
    }

    fn thumb_load_addr(&mut self, opcode: u16) -> u32 {
        let rd = ((opcode >> 8) & 0x7) as usize;
        let offset = ((opcode & 0xFF) * 4) as u32;

        let sp = ((opcode >> 11) & 1) != 0;

        let base = if sp { self.r[13] } else { self.r[15] & !0x3 };
        self.r[rd] = base.wrapping_add(offset);

        self.r[15] = self.r[15].wrapping_add(2);
        1
    }

    fn thumb_add_sp(&mut self, opcode: u16) -> u32 {
        let offset = ((opcode & 0x7F) as u32) * 4;
        let sign = ((opcode >> 7) & 1) != 0;

        if sign {
            self.r[13] = self.r[13].wrapping_sub(offset);
        } else {
            self.r[13] = self.r[13].wrapping_add(offset);
        }

        self.r[15] = self.r[15].wrapping_add(2);
        1
    }

    fn thumb_push_pop(&mut self, opcode: u16, mem: &mut super::Memory, load: bool) -> u32 {
        let pc_lr = ((opcode >> 8) & 1) != 0;
        let reg_list = opcode & 0xFF;

        let mut addr = self.r[13];

        if load {
            for i in 0..8 {
                if reg_list & (1 << i) != 0 {
                    self.r[i] = mem.read_word(addr);
                    addr = addr.wrapping_add(4);
                }
            }
            if pc_lr {
                self.r[15] = mem.read_word(addr) & !1;
                addr = addr.wrapping_add(4);
            }
            self.r[13] = addr;
        } else {
            if pc_lr {
                addr = addr.wrapping_sub(4);
                mem.write_word(addr, self.r[14]);
            }
            for i in (0..8).rev() {
                if reg_list & (1 << i) != 0 {
                    addr = addr.wrapping_sub(4);
                    mem.write_word(addr, self.r[i]);
                }
            }
            self.r[13] = addr;
        }

        if !(load && pc_lr) {
            self.r[15] = self.r[15].wrapping_add(2);
        }
        (reg_list.count_ones() + if pc_lr { 1 } else { 0 }) as u32
    }

    fn thumb_load_store_multiple(&mut self, opcode: u16, mem: &mut super::Memory, load: bool) -> u32 {
        let rb = ((opcode >> 8) & 0x7) as usize;
        let reg_list = opcode & 0xFF;

        let mut addr = self.r[rb];

        if load {
            for i in 0..8 {
                if reg_list & (1 << i) != 0 {
                    self.r[i] = mem.read_word(addr);
                    addr = addr.wrapping_add(4);
                }
            }
            if reg_list & (1 << rb) == 0 {
                self.r[rb] = addr;
            }
        } else {
            for i in 0..8 {
                if reg_list & (1 << i) != 0 {
                    mem.write_word(addr, self.r[i]);
                    addr = addr.wrapping_add(4);
                }
            }
            if reg_list & (1 << rb) == 0 {
                self.r[rb] = addr;
            }
        }

        self.r[15] = self.r[15].wrapping_add(2);
        reg_list.count_ones().max(1)
    }

    fn thumb_branch_cond(&mut self, opcode: u16, instruction_pc: u32) -> u32 {
        let cond = ((opcode >> 8) & 0xF) as usize;
        let offset = ((opcode as i8) as i32 * 2) as u32;

        if self.check_condition(cond) {
            let target = instruction_pc.wrapping_add(offset).wrapping_add(4);
            self.set_pc(target);
            return 1;
        }

        self.r[15] = self.r[15].wrapping_add(2);
        1
    }

    fn thumb_software_interrupt(&mut self, mem: &mut super::Memory) -> u32 {
        let swi_num = self.r[7] & 0xFF;
        self.dispatch_swi(swi_num, mem, 1)
    }

    fn thumb_branch(&mut self, opcode: u16, instruction_pc: u32) -> u32 {
        let offset = (((opcode & 0x7FF) as i32) << 21) >> 20;
        let target = instruction_pc.wrapping_add(offset as u32).wrapping_add(4);
        self.set_pc(target);
        1
    }

    fn thumb_bl_prefix(&mut self, opcode: u16, instruction_pc: u32) -> u32 {
        let offset = (((opcode & 0x7FF) as i32) << 21) >> 9;
        self.r[14] = instruction_pc.wrapping_add(4).wrapping_add(offset as u32);
        self.r[15] = self.r[15].wrapping_add(2);
        1
    }

    fn thumb_bl_suffix(&mut self, opcode: u16, _instruction_pc: u32) -> u32 {
        let offset = ((opcode & 0x7FF) as u32) * 2;
        let target = self.r[14].wrapping_add(offset);
        let return_addr = self.r[15].wrapping_sub(2) | 1;
        self.r[14] = return_addr;
        self.set_pc(target);
        1
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("pc", &format!("{:#010X}", self.r[15]))
            .field("lr", &format!("{:#010X}", self.r[14]))
            .field("sp", &format!("{:#010X}", self.r[13]))
            .field("mode", &self.get_mode())
            .field("thumb", &self.is_thumb_mode())
            .finish()
    }
}
