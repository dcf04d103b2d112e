//! Error types for the handful of host-facing operations that can fail:
//! loading a ROM or BIOS image from disk, and saving/loading a compressed
//! save-state file. No guest-side fault (bad opcode, unmapped access,
//! unparseable cheat line) ever produces one of these - those are logged
//! and absorbed at the point of occurrence instead.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GbaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to decode save state: {0}")]
    Decode(String),

    #[error("ROM too large: {size} bytes exceeds the {max} byte limit")]
    RomTooLarge { size: usize, max: usize },
}
