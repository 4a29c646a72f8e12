use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use crate::{
    audio::{AudioHost, AudioSpec},
    clock::{ClockSource, ClockState},
    emulator::{CartridgeInfo, CoreSetting, EmulationCore},
    error::{RuntimeError, SaveStateError},
    frame::{FrameReader, frame_channel},
    joypad::JoypadSnapshot,
    savestate::{LoadOutcome, SaveStateManager, SlotIndex, SlotInfo},
    transport::{TransportController, TransportState},
};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub audio: AudioSpec,
    pub save_states_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            audio: AudioSpec::default(),
            save_states_dir: PathBuf::from("save_states"),
        }
    }
}

/// Everything with process lifetime: the clock and its device, the
/// transport and the save-state slots. Created once at startup, torn down
/// on drop.
pub struct Session {
    clock: ClockSource,
    transport: TransportController,
    saves: SaveStateManager,
    closed: bool,
}

impl Session {
    /// Opens the audio device and installs `core`. Returns the session and
    /// the reader end of the frame channel for presentation.
    ///
    /// Fails with [`RuntimeError::StartupFailure`] if the device cannot be
    /// opened.
    pub fn start(
        host: Box<dyn AudioHost>,
        core: Box<dyn EmulationCore>,
        config: SessionConfig,
    ) -> Result<(Self, FrameReader), RuntimeError> {
        let (writer, reader) = frame_channel();
        let mut clock = ClockSource::new(host, config.audio, writer);
        clock.install_core(core)?;
        clock.open()?;
        tracing::info!(
            sample_rate = config.audio.sample_rate,
            buffer_frames = config.audio.buffer_frames,
            save_states = %config.save_states_dir.display(),
            "session started"
        );
        Ok((
            Self {
                clock,
                transport: TransportController::new(),
                saves: SaveStateManager::new(config.save_states_dir),
                closed: false,
            },
            reader,
        ))
    }

    pub fn state(&self) -> TransportState {
        self.transport.state()
    }

    pub fn clock_state(&self) -> ClockState {
        self.clock.state()
    }

    pub fn program(&self) -> Option<&CartridgeInfo> {
        self.transport.program()
    }

    pub fn clock(&self) -> &ClockSource {
        &self.clock
    }

    pub fn insert_cartridge(&mut self, path: &Path) -> Result<CartridgeInfo, RuntimeError> {
        self.transport.insert_cartridge(&mut self.clock, path)
    }

    pub fn power_on(&mut self) -> Result<(), RuntimeError> {
        self.transport.power_on(&mut self.clock)
    }

    pub fn power_off(&mut self) -> Result<(), RuntimeError> {
        self.transport.power_off(&mut self.clock)
    }

    pub fn pause(&mut self) -> Result<(), RuntimeError> {
        self.transport.pause(&mut self.clock)
    }

    pub fn resume(&mut self) -> Result<(), RuntimeError> {
        self.transport.resume(&mut self.clock)
    }

    pub fn reset(&mut self) -> Result<(), RuntimeError> {
        self.transport.reset(&mut self.clock)
    }

    /// Rebuilds the audio device. The transport state is unchanged unless
    /// the clock could not be restarted, in which case it drops to paused.
    pub fn set_sample_rate(&mut self, rate: u32) -> Result<(), RuntimeError> {
        let result = self.clock.set_sample_rate(rate);
        if result.is_err() {
            self.transport.clock_halted(&self.clock);
        }
        result
    }

    /// Hands this frame's input to the clock.
    pub fn publish_joypad(&self, pad: JoypadSnapshot) {
        self.clock.publish_joypad(pad);
    }

    pub fn send_setting(&self, setting: CoreSetting) {
        self.clock.send_setting(setting);
    }

    pub fn save_state(&mut self, slot: SlotIndex) -> Result<PathBuf, SaveStateError> {
        self.with_paused(|saves, core, title| saves.save(core, title, slot))
    }

    pub fn load_state(&mut self, slot: SlotIndex) -> Result<LoadOutcome, SaveStateError> {
        self.with_paused(|saves, core, title| saves.load(core, title, slot))
    }

    /// Pauses if running, runs `f` against the quiesced core and puts the
    /// transport back. A failing `f` never leaves the transport paused.
    fn with_paused<R>(
        &mut self,
        f: impl FnOnce(&mut SaveStateManager, &mut dyn EmulationCore, &str) -> Result<R, SaveStateError>,
    ) -> Result<R, SaveStateError> {
        let Session {
            clock,
            transport,
            saves,
            ..
        } = self;
        if transport.program().is_none() {
            return Err(SaveStateError::NoProgram);
        }
        let was_running = transport.state() == TransportState::Running;
        if was_running {
            transport.pause(clock)?;
        }

        let result = transport.with_paused_core(clock, |core, program| f(saves, core, &program.title));

        if was_running {
            if let Err(e) = transport.resume(clock) {
                tracing::error!(error = %e, "failed to resume after save-state operation");
            }
        }
        result?
    }

    pub fn set_save_states_dir(&mut self, dir: impl Into<PathBuf>) {
        self.saves.set_dir(dir);
        tracing::info!(dir = %self.saves.dir().display(), "save state directory changed");
    }

    /// Slot metadata for the current program, rescanned lazily.
    pub fn slots(&mut self, now: Instant) -> &[SlotInfo] {
        if let Some(program) = self.transport.program() {
            let title = program.title.clone();
            self.saves.poll_refresh(&title, now);
        }
        self.saves.slots()
    }

    /// Powers off and closes the device.
    pub fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.transport.power_off(&mut self.clock) {
            tracing::warn!(error = %e, "power off during shutdown failed");
        }
        drop(self.clock.shutdown());
        tracing::info!("session closed");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}
