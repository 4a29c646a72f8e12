use std::path::PathBuf;

use crate::{emulator::CoreError, transport::TransportState};

#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    #[error("failed to open audio device: {error}")]
    StartupFailure { error: String },
    #[error("audio device error during {op}: {error}")]
    AudioDevice { op: &'static str, error: String },
    #[error("cartridge rejected: {path}: {reason}")]
    CartridgeRejected { path: PathBuf, reason: CoreError },
    #[error("cannot {op} while {from:?}")]
    InvalidTransition {
        from: TransportState,
        op: &'static str,
    },
    #[error("no cartridge inserted")]
    NoCartridge,
    #[error("emulation core is not installed")]
    CoreUnavailable,
    #[error("audio device is not open")]
    ClockNotOpen,
    #[error("clock is not paused")]
    ClockNotPaused,
    #[error("clock has been shut down")]
    ClockDestroyed,
    #[error("unsupported sample rate: {rate}")]
    UnsupportedSampleRate { rate: u32 },
    #[error("invalid display scale: {scale}")]
    InvalidScale { scale: u8 },
}

#[derive(Debug, thiserror::Error)]
pub enum SaveStateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("no program is loaded")]
    NoProgram,
    #[error("save slot must be 1..=5 (got {0})")]
    InvalidSlot(u8),
    #[error("corrupt save state {path}: {error}")]
    Corrupt { path: PathBuf, error: String },
    #[error("save state belongs to {found:?}, not {expected:?}")]
    TitleMismatch { expected: String, found: String },
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
