//! Save states (C7): capture/restore a serialized, zlib-compressed
//! snapshot of everything mutable in the console, plus a bounded
//! frame-boundary rewind ring. The container is `bincode` then `flate2`,
//! matching the reference implementation's `json.dumps(...)` then
//! `zlib.compress`.

use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::path::Path;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::cpu::{BankedRegs, Cpu};
use crate::error::GbaError;
use crate::mem::Memory;

/// The bounded rewind ring keeps at most this many frame-boundary
/// snapshots, oldest dropped first.
const REWIND_CAPACITY: usize = 300;

/// Everything that must round-trip for "restore reproduces behavior
/// bit-for-bit": the full CPU register file (live and banked) and every
/// mutable memory array. BIOS and ROM are excluded - they are immutable
/// host-supplied images, not part of the console's runtime state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveState {
    pub r: [u32; 16],
    pub cpsr: u32,
    pub spsr: [u32; 6],
    pub banked: BankedRegs,
    pub halted: bool,
    pub ewram: Vec<u8>,
    pub iwram: Vec<u8>,
    pub io: Vec<u8>,
    pub palette: Vec<u8>,
    pub vram: Vec<u8>,
    pub oam: Vec<u8>,
    pub sram: Vec<u8>,
}

impl SaveState {
    pub fn capture(cpu: &Cpu, mem: &Memory) -> Self {
        Self {
            r: cpu.registers(),
            cpsr: cpu.get_cpsr(),
            spsr: cpu.banked_spsr(),
            banked: cpu.banked_registers(),
            halted: cpu.is_halted(),
            ewram: mem.wram().to_vec(),
            iwram: mem.iwram().to_vec(),
            io: mem.io().to_vec(),
            palette: mem.palette().to_vec(),
            vram: mem.vram().to_vec(),
            oam: mem.oam().to_vec(),
            sram: mem.sram().to_vec(),
        }
    }

    /// Restore this snapshot into a live `Cpu`/`Memory`, then force a
    /// pipeline flush so the prefetch buffer is reconstructed from the
    /// freshly-restored memory before the next `step`.
    pub fn restore(&self, cpu: &mut Cpu, mem: &mut Memory) {
        cpu.restore(self.r, self.cpsr, self.spsr, self.banked, self.halted);
        mem.load_wram(&self.ewram);
        mem.load_iwram(&self.iwram);
        mem.load_io(&self.io);
        mem.load_palette(&self.palette);
        mem.load_vram(&self.vram);
        mem.load_oam(&self.oam);
        mem.load_sram(&self.sram);
    }
}

fn encode(state: &SaveState) -> Result<Vec<u8>, GbaError> {
    let raw = bincode::serialize(state).map_err(|e| GbaError::Decode(e.to_string()))?;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw).map_err(GbaError::Io)?;
    encoder.finish().map_err(GbaError::Io)
}

fn decode(bytes: &[u8]) -> Result<SaveState, GbaError> {
    let mut decoder = ZlibDecoder::new(bytes);
    let mut raw = Vec::new();
    decoder
        .read_to_end(&mut raw)
        .map_err(|e| GbaError::Decode(e.to_string()))?;
    bincode::deserialize(&raw).map_err(|e| GbaError::Decode(e.to_string()))
}

/// Owns numbered save slots (survive only for the process lifetime unless
/// written to a file) and the per-frame rewind ring.
#[derive(Default)]
pub struct SaveStateManager {
    slots: HashMap<u32, Vec<u8>>,
    rewind: VecDeque<Vec<u8>>,
}

impl SaveStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_state(&mut self, slot: u32, cpu: &Cpu, mem: &Memory) -> Result<(), GbaError> {
        let bytes = encode(&SaveState::capture(cpu, mem))?;
        self.slots.insert(slot, bytes);
        Ok(())
    }

    pub fn load_state(&self, slot: u32, cpu: &mut Cpu, mem: &mut Memory) -> bool {
        match self.slots.get(&slot) {
            Some(bytes) => match decode(bytes) {
                Ok(state) => {
                    state.restore(cpu, mem);
                    true
                }
                Err(_) => false,
            },
            None => false,
        }
    }

    pub fn save_to_file(&mut self, slot: u32, path: &Path, cpu: &Cpu, mem: &Memory) -> Result<(), GbaError> {
        self.save_state(slot, cpu, mem)?;
        let bytes = self.slots.get(&slot).expect("just inserted");
        std::fs::write(path, bytes).map_err(GbaError::Io)
    }

    pub fn load_from_file(
        &mut self,
        slot: u32,
        path: &Path,
        cpu: &mut Cpu,
        mem: &mut Memory,
    ) -> Result<(), GbaError> {
        let bytes = std::fs::read(path).map_err(GbaError::Io)?;
        let state = decode(&bytes)?;
        self.slots.insert(slot, bytes);
        state.restore(cpu, mem);
        Ok(())
    }

    /// Called once per completed frame from the scheduler's wrap point.
    pub fn push_rewind_frame(&mut self, cpu: &Cpu, mem: &Memory) {
        if let Ok(bytes) = encode(&SaveState::capture(cpu, mem)) {
            if self.rewind.len() >= REWIND_CAPACITY {
                self.rewind.pop_front();
            }
            self.rewind.push_back(bytes);
        }
    }

    /// Pop up to `frames` entries and restore the new top. Returns `false`
    /// without mutating state if the ring holds fewer than `frames`
    /// entries.
    pub fn rewind(&mut self, frames: u32, cpu: &mut Cpu, mem: &mut Memory) -> bool {
        if (self.rewind.len() as u32) < frames {
            return false;
        }
        for _ in 0..frames {
            self.rewind.pop_back();
        }
        match self.rewind.back() {
            Some(bytes) => match decode(bytes) {
                Ok(state) => {
                    state.restore(cpu, mem);
                    true
                }
                Err(_) => false,
            },
            None => false,
        }
    }

    pub fn rewind_len(&self) -> usize {
        self.rewind.len()
    }
}
