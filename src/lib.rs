mod cheats;
mod cpu;
mod error;
mod input;
mod interrupt;
mod mem;
mod ppu;
pub mod regs;
mod savestate;
mod scheduler;

pub use cheats::{Cheat, CheatEngine, CheatKind};
pub use cpu::{BankedRegs, Cpu};
pub use error::GbaError;
pub use input::{Input, KeyState};
pub use mem::Memory;
pub use ppu::{PaletteFilter, Ppu};
pub use savestate::{SaveState, SaveStateManager};
pub use scheduler::Scheduler;

use std::fmt;
use std::path::{Path, PathBuf};

/// Offsets 0xA0..0xAB of a ROM header hold its ASCII title.
const TITLE_OFFSET: usize = 0xA0;
const TITLE_LEN: usize = 12;

/// Reset value of KEYINPUT: all ten keys unpressed (active-low, so all
/// bits set).
const KEYINPUT_RESET: u16 = 0x03FF;

/// Top-level console: owns the CPU, bus, PPU, keypad latch, scheduler,
/// cheat engine and save-state manager, and wires them together exactly
/// as the scheduler's scanline loop expects.
pub struct Gba {
    pub cpu: Cpu,
    pub mem: Memory,
    pub ppu: Ppu,
    pub input: Input,
    pub scheduler: Scheduler,
    pub cheats: CheatEngine,
    pub save_states: SaveStateManager,
    rom_path: Option<PathBuf>,
}

impl Gba {
    pub fn new() -> Self {
        let mut gba = Self {
            cpu: Cpu::new(),
            mem: Memory::new(),
            ppu: Ppu::new(),
            input: Input::new(),
            scheduler: Scheduler::new(),
            cheats: CheatEngine::new(),
            save_states: SaveStateManager::new(),
            rom_path: None,
        };
        gba.reset();
        gba
    }

    /// Resets every component and re-establishes the keypad's idle
    /// register mirror. Cheats and save slots survive a reset; they are
    /// host-side configuration, not console state.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.mem.reset();
        self.ppu.reset();
        self.input.reset();
        self.scheduler.reset();
        self.mem.io_write16(regs::KEYINPUT, KEYINPUT_RESET);
    }

    /// Loads a raw ROM image. Infallible: oversized images are silently
    /// truncated by the bus (and logged there), matching the way every
    /// other guest-facing fault in this core is absorbed rather than
    /// surfaced.
    pub fn load_rom(&mut self, data: Vec<u8>) {
        self.mem.load_rom(data);
        self.reset();
    }

    /// Loads a ROM from disk, validating size before touching any live
    /// state, then loads a sibling `.sav` file into SRAM if present.
    /// Leaves the current console untouched on failure.
    pub fn load_rom_path(&mut self, path: impl AsRef<Path>) -> Result<(), GbaError> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(GbaError::Io)?;
        let max = Memory::max_rom_size();
        if data.len() > max {
            return Err(GbaError::RomTooLarge { size: data.len(), max });
        }
        self.mem.load_rom(data);
        self.reset();

        let sav_path = path.with_extension("sav");
        if let Ok(sram) = std::fs::read(&sav_path) {
            self.mem.load_sram(&sram);
        }
        self.rom_path = Some(path.to_path_buf());
        Ok(())
    }

    /// Loads a BIOS image from disk. A BIOS is optional: without one the
    /// CPU falls back to its HLE SWI table (see `Cpu::step`).
    pub fn load_bios_path(&mut self, path: impl AsRef<Path>) -> Result<(), GbaError> {
        let data = std::fs::read(path.as_ref()).map_err(GbaError::Io)?;
        self.mem.load_bios(data);
        Ok(())
    }

    /// The ASCII title from the loaded ROM's header, trailing NULs
    /// stripped. Empty if no ROM (or a too-short one) is loaded.
    pub fn rom_title(&self) -> String {
        let rom = self.mem.rom();
        if rom.len() < TITLE_OFFSET + TITLE_LEN {
            return String::new();
        }
        let bytes = &rom[TITLE_OFFSET..TITLE_OFFSET + TITLE_LEN];
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        String::from_utf8_lossy(&bytes[..end]).into_owned()
    }

    /// Writes the current SRAM contents back to the ROM's sidecar `.sav`
    /// file. No-op if no ROM was loaded from a path.
    pub fn save_sram(&self) -> Result<(), GbaError> {
        let Some(rom_path) = &self.rom_path else {
            return Ok(());
        };
        let sav_path = rom_path.with_extension("sav");
        std::fs::write(sav_path, self.mem.sram()).map_err(GbaError::Io)
    }

    /// A key has been pressed. Mirrors the new latch into KEYINPUT only
    /// when it actually changed.
    pub fn key_down(&mut self, mask: KeyState) {
        self.input.key_down(mask);
        self.sync_keyinput();
    }

    /// A key has been released.
    pub fn key_up(&mut self, mask: KeyState) {
        self.input.key_up(mask);
        self.sync_keyinput();
    }

    fn sync_keyinput(&mut self) {
        if self.input.changed() {
            self.mem.io_write16(regs::KEYINPUT, self.input.get_key_register());
            self.input.clear_changed();
        }
    }

    /// Runs one full frame (228 scanlines), pushing a rewind snapshot
    /// once the scanline counter wraps.
    pub fn run_frame(&mut self) {
        loop {
            let wrapped = self
                .scheduler
                .step_scanline(&mut self.cpu, &mut self.mem, &mut self.ppu, &self.cheats);
            if wrapped {
                self.save_states.push_rewind_frame(&self.cpu, &self.mem);
                break;
            }
        }
    }

    /// The most recently rendered frame, RGB24, 240x160.
    pub fn frame_buffer(&self) -> &[u8] {
        self.ppu.frame_buffer()
    }

    pub fn ppu(&self) -> &Ppu {
        &self.ppu
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn input_mut(&mut self) -> &mut Input {
        &mut self.input
    }
}

impl Default for Gba {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Gba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gba")
            .field("cpu", &self.cpu)
            .field("scanline", &self.scheduler.scanline())
            .finish()
    }
}
