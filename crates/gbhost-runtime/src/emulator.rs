//! Contract between the host and an external emulation core.
//!
//! The core owns CPU/PPU/APU state. The host never steps it directly: the
//! audio clock pulls samples through [`EmulationCore::collect_audio_samples`]
//! and emulated time advances as a side effect. Completed frames are handed
//! out through a [`FrameSink`] during that same call.

use std::path::{Path, PathBuf};

use crate::joypad::JoypadSnapshot;

pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;
pub const BYTES_PER_PIXEL: usize = 3;
/// RGB24 frame length in bytes.
pub const FRAME_LEN: usize = SCREEN_WIDTH * SCREEN_HEIGHT * BYTES_PER_PIXEL;

/// Receives completed frames from inside sample collection.
///
/// Called on the audio thread; implementations must not block or allocate.
pub trait FrameSink {
    fn frame_ready(&mut self, rgb: &[u8]);
}

/// Metadata reported by a successful cartridge insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartridgeInfo {
    pub title: String,
    pub path: PathBuf,
}

/// Paths handed to a core when it is constructed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoreInit {
    /// Directory for battery-backed cartridge RAM.
    pub save_dir: PathBuf,
    pub boot_rom_path: Option<PathBuf>,
}

/// Which palette a custom 4-colour scheme applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteTarget {
    Background,
    Window,
    Sprite0,
    Sprite1,
    /// Applies to every layer when individual palettes are disabled.
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("unsupported cartridge: {0}")]
    UnsupportedCartridge(String),
    #[error("cartridge I/O error: {0}")]
    Io(String),
    #[error("no cartridge inserted")]
    NoCartridge,
    #[error("invalid save state: {0}")]
    InvalidState(String),
}

/// A cycle-accurate handheld emulation core.
pub trait EmulationCore: Send + 'static {
    /// Loads a cartridge image. On error the previously loaded program, if
    /// any, stays in place.
    fn insert_cartridge(&mut self, path: &Path) -> Result<CartridgeInfo, CoreError>;

    /// Full reset with the current cartridge.
    fn power_on(&mut self);

    /// Flushes battery saves and stops the machine.
    fn power_off(&mut self);

    fn set_inputs(&mut self, pad: JoypadSnapshot);

    /// Fills `out` with interleaved stereo samples, running the machine for
    /// exactly `out.len() / 2` sample periods.
    fn collect_audio_samples(&mut self, out: &mut [f32], frames: &mut dyn FrameSink);

    fn set_clock_multiplier(&mut self, multiplier: f32);

    fn save_state(&mut self) -> Result<Vec<u8>, CoreError>;

    fn load_state(&mut self, state: &[u8]) -> Result<(), CoreError>;

    /// `channel` is 1..=4.
    fn enable_sound_channel(&mut self, channel: u8, enabled: bool);

    fn set_volume(&mut self, volume: f32);

    fn set_sample_rate(&mut self, rate: u32);

    fn set_mono_audio(&mut self, mono: bool);

    fn set_custom_palette(&mut self, target: PaletteTarget, colors: [u8; 12]);

    fn prefer_dmg_colors(&mut self, prefer: bool);
}

/// Settings the UI thread may change while the clock runs. They are queued
/// and applied by the audio thread between pulls, so the core never needs a
/// second writer.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreSetting {
    ClockMultiplier(f32),
    Volume(f32),
    SoundChannel { channel: u8, enabled: bool },
    MonoAudio(bool),
    CustomPalette { target: PaletteTarget, colors: [u8; 12] },
    PreferDmgColors(bool),
}

impl CoreSetting {
    pub(crate) fn apply(self, core: &mut dyn EmulationCore) {
        match self {
            CoreSetting::ClockMultiplier(m) => core.set_clock_multiplier(m),
            CoreSetting::Volume(v) => core.set_volume(v),
            CoreSetting::SoundChannel { channel, enabled } => {
                core.enable_sound_channel(channel, enabled)
            }
            CoreSetting::MonoAudio(mono) => core.set_mono_audio(mono),
            CoreSetting::CustomPalette { target, colors } => {
                core.set_custom_palette(target, colors)
            }
            CoreSetting::PreferDmgColors(prefer) => core.prefer_dmg_colors(prefer),
        }
    }
}
