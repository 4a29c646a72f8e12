//! Host audio output abstraction.
//!
//! The host owns the real-time thread. It repeatedly hands the registered
//! callback an interleaved stereo `f32` buffer which must be filled before
//! the callback returns.

#[cfg(feature = "cpal")]
mod cpal_host;
mod manual;

#[cfg(feature = "cpal")]
pub use cpal_host::CpalHost;
pub use manual::{ManualDevice, ManualHost, ManualPump};

use crate::error::RuntimeError;

pub const CHANNELS: u16 = 2;
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
/// Stereo frames per callback.
pub const DEFAULT_BUFFER_FRAMES: u32 = 512;
pub const SUPPORTED_SAMPLE_RATES: [u32; 6] = [8_000, 11_025, 22_050, 24_000, 44_100, 48_000];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub buffer_frames: u32,
}

impl Default for AudioSpec {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_frames: DEFAULT_BUFFER_FRAMES,
        }
    }
}

impl AudioSpec {
    pub fn with_sample_rate(self, sample_rate: u32) -> Result<Self, RuntimeError> {
        if !SUPPORTED_SAMPLE_RATES.contains(&sample_rate) {
            return Err(RuntimeError::UnsupportedSampleRate { rate: sample_rate });
        }
        Ok(Self {
            sample_rate,
            ..self
        })
    }

    /// Interleaved sample count of one callback buffer.
    #[inline]
    pub fn buffer_len(&self) -> usize {
        self.buffer_frames as usize * CHANNELS as usize
    }
}

/// Fills one interleaved stereo buffer. Runs on the host's audio thread.
pub type AudioCallback = Box<dyn FnMut(&mut [f32]) + Send + 'static>;

/// A platform audio subsystem able to open output devices.
pub trait AudioHost {
    /// Opens an output device. The returned device starts paused.
    fn open(
        &self,
        spec: AudioSpec,
        callback: AudioCallback,
    ) -> Result<Box<dyn AudioDevice>, RuntimeError>;
}

/// An open output device. Dropping it closes the device; once `drop`
/// returns the callback is never invoked again.
pub trait AudioDevice {
    fn play(&mut self) -> Result<(), RuntimeError>;

    /// Stops callback invocations. Returns once the host has accepted the
    /// request; an invocation already in flight may still be finishing.
    fn pause(&mut self) -> Result<(), RuntimeError>;
}
