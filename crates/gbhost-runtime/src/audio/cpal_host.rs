use cpal::{
    BufferSize, SampleFormat, SupportedBufferSize,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};

use super::{AudioCallback, AudioDevice, AudioHost, AudioSpec, CHANNELS};
use crate::error::RuntimeError;

/// Default output device of the platform's default cpal host.
///
/// Only 32-bit float output is accepted. Devices wider than stereo get the
/// right channel repeated on the extra outputs.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalHost;

impl CpalHost {
    pub fn new() -> Self {
        Self
    }
}

fn startup(error: impl std::fmt::Display) -> RuntimeError {
    RuntimeError::StartupFailure {
        error: error.to_string(),
    }
}

/// Finds an f32 output config that runs at `rate` with at least stereo,
/// preferring the fewest channels.
fn pick_config(
    device: &cpal::Device,
    rate: u32,
) -> Result<cpal::SupportedStreamConfig, RuntimeError> {
    device
        .supported_output_configs()
        .map_err(startup)?
        .filter(|range| range.sample_format() == SampleFormat::F32 && range.channels() >= CHANNELS)
        .filter_map(|range| range.try_with_sample_rate(rate))
        .min_by_key(|config| config.channels())
        .ok_or_else(|| {
            startup(format!(
                "no f32 output config with at least {CHANNELS} channels at {rate} Hz"
            ))
        })
}

/// Copies interleaved stereo onto a device with `channels` >= 2. Extra
/// channels repeat the right sample.
fn fan_out(stereo: &[f32], data: &mut [f32], channels: usize) {
    for (frame, pair) in data.chunks_exact_mut(channels).zip(stereo.chunks_exact(2)) {
        frame[0] = pair[0];
        frame[1] = pair[1];
        for ch in &mut frame[2..] {
            *ch = pair[1];
        }
    }
}

impl AudioHost for CpalHost {
    fn open(
        &self,
        spec: AudioSpec,
        mut callback: AudioCallback,
    ) -> Result<Box<dyn AudioDevice>, RuntimeError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| startup("no default output device"))?;

        let supported = pick_config(&device, spec.sample_rate)?;
        let buffer_size = match supported.buffer_size() {
            SupportedBufferSize::Range { min, max }
                if (*min..=*max).contains(&spec.buffer_frames) =>
            {
                BufferSize::Fixed(spec.buffer_frames)
            }
            _ => {
                tracing::debug!(
                    frames = spec.buffer_frames,
                    "fixed buffer size unavailable, using device default"
                );
                BufferSize::Default
            }
        };
        let mut config = supported.config();
        config.buffer_size = buffer_size;
        let channels = usize::from(config.channels);

        // The clock always produces stereo; wider devices get it fanned out.
        let mut scratch: Vec<f32> = Vec::new();
        let data_fn = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            if channels == usize::from(CHANNELS) {
                callback(data);
                return;
            }
            scratch.resize(data.len() / channels * usize::from(CHANNELS), 0.0);
            callback(&mut scratch);
            fan_out(&scratch, data, channels);
        };

        let err_fn = |err| tracing::error!("Audio stream error: {err}");
        let stream = device
            .build_output_stream(&config, data_fn, err_fn, None)
            .map_err(startup)?;

        // Some backends start streams eagerly.
        stream.pause().map_err(startup)?;

        tracing::info!(
            sample_rate = spec.sample_rate,
            channels,
            ?buffer_size,
            "audio output opened"
        );
        Ok(Box::new(CpalDevice { stream }))
    }
}

struct CpalDevice {
    stream: cpal::Stream,
}

impl AudioDevice for CpalDevice {
    fn play(&mut self) -> Result<(), RuntimeError> {
        self.stream.play().map_err(|e| RuntimeError::AudioDevice {
            op: "play",
            error: e.to_string(),
        })
    }

    fn pause(&mut self) -> Result<(), RuntimeError> {
        self.stream.pause().map_err(|e| RuntimeError::AudioDevice {
            op: "pause",
            error: e.to_string(),
        })
    }
}
