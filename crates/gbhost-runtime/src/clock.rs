//! Audio-driven clock.
//!
//! Emulated time only advances when the host audio device asks for samples.
//! The callback pulls exactly the requested number of samples from the core,
//! and the core runs exactly that long. There is no other heartbeat.
//!
//! The core sits behind a mutex that the callback only ever `try_lock`s.
//! Pausing stops the device and then takes that lock, waiting out any
//! in-flight callback; the held guard is what keeps the core frozen until
//! resume. A callback that finds the lock taken, or no core installed,
//! writes silence.

use std::sync::{
    Arc,
    atomic::{AtomicU8, AtomicU64, Ordering},
};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::{ArcMutexGuard, Mutex, RawMutex};

use crate::{
    audio::{AudioCallback, AudioDevice, AudioHost, AudioSpec},
    emulator::{CoreSetting, EmulationCore},
    error::RuntimeError,
    frame::FrameWriter,
    joypad::JoypadSnapshot,
};

/// Fixed attenuation applied to every sample.
pub const OUTPUT_GAIN: f32 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Uninitialized,
    Running,
    Paused,
    Destroyed,
}

/// Everything the callback touches under the lock.
struct Engine {
    core: Option<Box<dyn EmulationCore>>,
    frames: FrameWriter,
    settings: Receiver<CoreSetting>,
}

#[derive(Default)]
struct ClockCounters {
    pad: AtomicU8,
    pulls: AtomicU64,
    silent_pulls: AtomicU64,
    samples: AtomicU64,
}

fn fill(engine: &Mutex<Engine>, counters: &ClockCounters, out: &mut [f32]) {
    counters.pulls.fetch_add(1, Ordering::Relaxed);
    counters
        .samples
        .fetch_add(out.len() as u64, Ordering::Relaxed);

    let Some(mut guard) = engine.try_lock() else {
        out.fill(0.0);
        counters.silent_pulls.fetch_add(1, Ordering::Relaxed);
        return;
    };
    let engine = &mut *guard;
    let Some(core) = engine.core.as_deref_mut() else {
        out.fill(0.0);
        counters.silent_pulls.fetch_add(1, Ordering::Relaxed);
        return;
    };

    while let Ok(setting) = engine.settings.try_recv() {
        setting.apply(core);
    }
    core.set_inputs(JoypadSnapshot::from_bits(
        counters.pad.load(Ordering::Acquire),
    ));
    core.collect_audio_samples(out, &mut engine.frames);

    for sample in out.iter_mut() {
        *sample = if sample.is_finite() {
            (*sample * OUTPUT_GAIN).clamp(-1.0, 1.0)
        } else {
            0.0
        };
    }
}

pub struct ClockSource {
    host: Box<dyn AudioHost>,
    spec: AudioSpec,
    engine: Arc<Mutex<Engine>>,
    counters: Arc<ClockCounters>,
    settings: Sender<CoreSetting>,
    device: Option<Box<dyn AudioDevice>>,
    /// Held while paused; the callback cannot reach the core.
    quiesced: Option<ArcMutexGuard<RawMutex, Engine>>,
    state: ClockState,
}

impl ClockSource {
    pub fn new(host: Box<dyn AudioHost>, spec: AudioSpec, frames: FrameWriter) -> Self {
        let (settings, settings_rx) = unbounded();
        Self {
            host,
            spec,
            engine: Arc::new(Mutex::new(Engine {
                core: None,
                frames,
                settings: settings_rx,
            })),
            counters: Arc::new(ClockCounters::default()),
            settings,
            device: None,
            quiesced: None,
            state: ClockState::Uninitialized,
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn spec(&self) -> AudioSpec {
        self.spec
    }

    fn callback(&self) -> AudioCallback {
        let engine = self.engine.clone();
        let counters = self.counters.clone();
        Box::new(move |out: &mut [f32]| fill(&engine, &counters, out))
    }

    /// Opens the audio device. The clock comes up paused.
    pub fn open(&mut self) -> Result<(), RuntimeError> {
        match self.state {
            ClockState::Uninitialized => {}
            ClockState::Destroyed => return Err(RuntimeError::ClockDestroyed),
            _ => return Ok(()),
        }
        let guard = self.engine.lock_arc();
        self.device = Some(self.host.open(self.spec, self.callback())?);
        self.quiesced = Some(guard);
        self.state = ClockState::Paused;
        Ok(())
    }

    /// Halts the clock. Once this returns no sample collection happens until
    /// [`resume`](Self::resume).
    pub fn pause(&mut self) -> Result<(), RuntimeError> {
        match self.state {
            ClockState::Running => {}
            ClockState::Paused => return Ok(()),
            ClockState::Uninitialized => return Err(RuntimeError::ClockNotOpen),
            ClockState::Destroyed => return Err(RuntimeError::ClockDestroyed),
        }
        if let Some(device) = self.device.as_mut() {
            if let Err(e) = device.pause() {
                // The lock below still keeps the core frozen.
                tracing::warn!(error = %e, "audio device refused to pause");
            }
        }
        self.quiesced = Some(self.engine.lock_arc());
        self.state = ClockState::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), RuntimeError> {
        match self.state {
            ClockState::Paused => {}
            ClockState::Running => return Ok(()),
            ClockState::Uninitialized => return Err(RuntimeError::ClockNotOpen),
            ClockState::Destroyed => return Err(RuntimeError::ClockDestroyed),
        }
        if self.device.is_none() {
            // Lost by a failed rebuild; try the current spec again.
            self.device = Some(self.host.open(self.spec, self.callback())?);
        }
        let Some(device) = self.device.as_mut() else {
            return Err(RuntimeError::ClockNotOpen);
        };
        self.quiesced = None;
        if let Err(e) = device.play() {
            self.quiesced = Some(self.engine.lock_arc());
            return Err(e);
        }
        self.state = ClockState::Running;
        Ok(())
    }

    /// Exclusive access to the core. Only available while paused.
    pub fn core_mut(&mut self) -> Result<&mut (dyn EmulationCore + 'static), RuntimeError> {
        let guard = self
            .quiesced
            .as_mut()
            .ok_or(RuntimeError::ClockNotPaused)?;
        guard
            .core
            .as_deref_mut()
            .ok_or(RuntimeError::CoreUnavailable)
    }

    /// Installs a core, returning the previous one.
    pub fn install_core(
        &mut self,
        core: Box<dyn EmulationCore>,
    ) -> Result<Option<Box<dyn EmulationCore>>, RuntimeError> {
        if self.state == ClockState::Destroyed {
            return Err(RuntimeError::ClockDestroyed);
        }
        let rate = self.spec.sample_rate;
        let was_running = self.state == ClockState::Running;
        if was_running {
            self.pause()?;
        }
        let prev = self.with_engine(move |engine| {
            let mut core = core;
            core.set_sample_rate(rate);
            engine.core.replace(core)
        });
        if was_running {
            self.resume()?;
        }
        Ok(prev)
    }

    fn with_engine<R>(&mut self, f: impl FnOnce(&mut Engine) -> R) -> R {
        match self.quiesced.as_mut() {
            Some(guard) => f(&mut **guard),
            None => f(&mut *self.engine.lock()),
        }
    }

    /// Tears the device down and rebuilds it at `rate`. Once the new device
    /// is open the core is told the rate while still quiesced, and the clock
    /// resumes if it was running.
    ///
    /// If the device cannot be opened at `rate` the previous spec is
    /// restored and the core keeps its old rate. Should that reopen fail too the error is returned with the
    /// clock left paused and without a device; a later [`resume`](Self::resume)
    /// retries the open.
    pub fn set_sample_rate(&mut self, rate: u32) -> Result<(), RuntimeError> {
        let spec = self.spec.with_sample_rate(rate)?;
        let was_running = match self.state {
            ClockState::Destroyed => return Err(RuntimeError::ClockDestroyed),
            ClockState::Uninitialized => {
                self.spec = spec;
                self.tell_core_rate(rate);
                return Ok(());
            }
            ClockState::Running => true,
            ClockState::Paused => false,
        };

        self.pause()?;
        let previous = self.spec;
        self.device = None;
        match self.host.open(spec, self.callback()) {
            Ok(device) => {
                self.device = Some(device);
                self.spec = spec;
                self.tell_core_rate(rate);
                tracing::info!(sample_rate = rate, "audio device rebuilt");
            }
            Err(e) => {
                tracing::warn!(
                    sample_rate = rate,
                    error = %e,
                    "audio device rebuild failed, restoring previous rate"
                );
                match self.host.open(previous, self.callback()) {
                    Ok(device) => {
                        self.device = Some(device);
                        if was_running {
                            self.resume()?;
                        }
                    }
                    Err(fallback) => {
                        tracing::error!(error = %fallback, "audio device lost");
                    }
                }
                return Err(e);
            }
        }

        if was_running {
            self.resume()?;
        }
        Ok(())
    }

    fn tell_core_rate(&mut self, rate: u32) {
        self.with_engine(|engine| {
            if let Some(core) = engine.core.as_deref_mut() {
                core.set_sample_rate(rate);
            }
        });
    }

    /// Publishes the joypad state applied before the next pull.
    pub fn publish_joypad(&self, pad: JoypadSnapshot) {
        self.counters.pad.store(pad.bits(), Ordering::Release);
    }

    /// Queues a setting for the audio thread. Never pauses.
    pub fn send_setting(&self, setting: CoreSetting) {
        // The receiver lives as long as `self`.
        let _ = self.settings.send(setting);
    }

    /// Closes the device and hands back the core.
    pub fn shutdown(&mut self) -> Option<Box<dyn EmulationCore>> {
        if self.state == ClockState::Destroyed {
            return None;
        }
        if self.state == ClockState::Running {
            let _ = self.pause();
        }
        self.device = None;
        let core = self.with_engine(|engine| engine.core.take());
        self.quiesced = None;
        self.state = ClockState::Destroyed;
        core
    }

    /// Callback invocations, including silent ones.
    pub fn pulls(&self) -> u64 {
        self.counters.pulls.load(Ordering::Relaxed)
    }

    pub fn silent_pulls(&self) -> u64 {
        self.counters.silent_pulls.load(Ordering::Relaxed)
    }

    /// Interleaved samples handed to the device so far.
    pub fn samples_delivered(&self) -> u64 {
        self.counters.samples.load(Ordering::Relaxed)
    }
}

impl Drop for ClockSource {
    fn drop(&mut self) {
        self.device = None;
    }
}
