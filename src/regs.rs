//! I/O register byte offsets within the 1 KiB I/O region (0x0400_0000-based).
//!
//! Mirrors the GBA's real register map closely enough for the subset this
//! core implements; offsets not listed here still read/write as plain bytes
//! through the bus.

pub const DISPCNT: u32 = 0x000;
pub const DISPSTAT: u32 = 0x004;
pub const VCOUNT: u32 = 0x006;
pub const BG0CNT: u32 = 0x008;
pub const BG1CNT: u32 = 0x00A;
pub const BG2CNT: u32 = 0x00C;
pub const BG3CNT: u32 = 0x00E;
pub const BG0HOFS: u32 = 0x010;
pub const BG0VOFS: u32 = 0x012;
pub const BG1HOFS: u32 = 0x014;
pub const BG1VOFS: u32 = 0x016;
pub const BG2HOFS: u32 = 0x018;
pub const BG2VOFS: u32 = 0x01A;
pub const BG3HOFS: u32 = 0x01C;
pub const BG3VOFS: u32 = 0x01E;
pub const KEYINPUT: u32 = 0x130;
pub const IE: u32 = 0x200;
pub const IF: u32 = 0x202;
pub const IME: u32 = 0x208;

bitflags::bitflags! {
    /// Interrupt request sources this core raises from the scheduler.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IrqFlags: u16 {
        const VBLANK = 1 << 0;
        const HBLANK = 1 << 1;
        const VCOUNT = 1 << 2;
    }
}

/// DISPSTAT bit layout: low three bits are status flags the scheduler
/// sets, bits 3-5 are the matching per-source IRQ enables, bits 8-15 hold
/// the VCount-match scanline.
pub const DISPSTAT_VBLANK_FLAG: u16 = 1 << 0;
pub const DISPSTAT_HBLANK_FLAG: u16 = 1 << 1;
pub const DISPSTAT_VCOUNTER_FLAG: u16 = 1 << 2;
pub const DISPSTAT_VBLANK_IRQ_ENABLE: u16 = 1 << 3;
pub const DISPSTAT_HBLANK_IRQ_ENABLE: u16 = 1 << 4;
pub const DISPSTAT_VCOUNT_IRQ_ENABLE: u16 = 1 << 5;
