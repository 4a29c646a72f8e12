#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use gbhost_runtime::{
    AudioDevice, AudioHost, AudioSpec, CartridgeInfo, CoreError, EmulationCore, FRAME_LEN,
    FrameSink, JoypadSnapshot, ManualHost, ManualPump, PaletteTarget, RuntimeError, Session,
    SessionConfig, audio::AudioCallback,
};
use parking_lot::Mutex;

/// Pairs per emitted frame.
pub const PAIRS_PER_FRAME: u64 = 735;

/// Observations of a [`ScriptedCore`] that stay readable after the core has
/// been moved into the clock.
#[derive(Default)]
pub struct Probe {
    pub collect_calls: AtomicU64,
    pub cycles: AtomicU64,
    pub power_ons: AtomicU64,
    pub power_offs: AtomicU64,
    pub inputs: AtomicU64,
    pub sample_rate: AtomicU64,
    pub volume_milli: AtomicU64,
    pub frames: AtomicU64,
}

impl Probe {
    pub fn collect_calls(&self) -> u64 {
        self.collect_calls.load(Ordering::SeqCst)
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    pub fn power_ons(&self) -> u64 {
        self.power_ons.load(Ordering::SeqCst)
    }
}

/// Deterministic stand-in core. Rejects any path without a `.gb` extension.
pub struct ScriptedCore {
    probe: Arc<Probe>,
    loaded: Option<CartridgeInfo>,
    cycles: u64,
    frame_no: u64,
    amplitude: f32,
    frame: Vec<u8>,
}

impl ScriptedCore {
    pub fn new() -> (Self, Arc<Probe>) {
        Self::with_amplitude(1.0)
    }

    /// `amplitude` scales the raw (pre-gain) output, which ranges over
    /// `[-amplitude, amplitude]`.
    pub fn with_amplitude(amplitude: f32) -> (Self, Arc<Probe>) {
        let probe = Arc::new(Probe::default());
        (
            Self {
                probe: probe.clone(),
                loaded: None,
                cycles: 0,
                frame_no: 0,
                amplitude,
                frame: vec![0; FRAME_LEN],
            },
            probe,
        )
    }

    fn publish_cycles(&self) {
        self.probe.cycles.store(self.cycles, Ordering::SeqCst);
    }
}

impl EmulationCore for ScriptedCore {
    fn insert_cartridge(&mut self, path: &Path) -> Result<CartridgeInfo, CoreError> {
        if path.extension().and_then(|e| e.to_str()) != Some("gb") {
            return Err(CoreError::UnsupportedCartridge(path.display().to_string()));
        }
        let title = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("untitled")
            .to_uppercase();
        let info = CartridgeInfo {
            title,
            path: path.to_path_buf(),
        };
        self.loaded = Some(info.clone());
        Ok(info)
    }

    fn power_on(&mut self) {
        self.cycles = 0;
        self.frame_no = 0;
        self.publish_cycles();
        self.probe.power_ons.fetch_add(1, Ordering::SeqCst);
    }

    fn power_off(&mut self) {
        self.probe.power_offs.fetch_add(1, Ordering::SeqCst);
    }

    fn set_inputs(&mut self, pad: JoypadSnapshot) {
        self.probe.inputs.store(u64::from(pad.bits()), Ordering::SeqCst);
    }

    fn collect_audio_samples(&mut self, out: &mut [f32], frames: &mut dyn FrameSink) {
        self.probe.collect_calls.fetch_add(1, Ordering::SeqCst);
        for pair in out.chunks_mut(2) {
            self.cycles += 1;
            let phase = (self.cycles % 200) as f32 / 100.0 - 1.0;
            pair.fill(phase * self.amplitude);
            if self.cycles % PAIRS_PER_FRAME == 0 {
                self.frame_no += 1;
                self.frame.fill((self.frame_no % 256) as u8);
                frames.frame_ready(&self.frame);
                self.probe.frames.fetch_add(1, Ordering::SeqCst);
            }
        }
        self.publish_cycles();
    }

    fn set_clock_multiplier(&mut self, _multiplier: f32) {}

    fn save_state(&mut self) -> Result<Vec<u8>, CoreError> {
        if self.loaded.is_none() {
            return Err(CoreError::NoCartridge);
        }
        let mut bytes = self.cycles.to_le_bytes().to_vec();
        bytes.extend_from_slice(&self.frame_no.to_le_bytes());
        Ok(bytes)
    }

    fn load_state(&mut self, state: &[u8]) -> Result<(), CoreError> {
        let (cycles, frame_no) = state
            .split_at_checked(8)
            .and_then(|(a, b)| Some((<[u8; 8]>::try_from(a).ok()?, <[u8; 8]>::try_from(b).ok()?)))
            .ok_or_else(|| CoreError::InvalidState(format!("{} bytes", state.len())))?;
        self.cycles = u64::from_le_bytes(cycles);
        self.frame_no = u64::from_le_bytes(frame_no);
        self.publish_cycles();
        Ok(())
    }

    fn enable_sound_channel(&mut self, _channel: u8, _enabled: bool) {}

    fn set_volume(&mut self, volume: f32) {
        self.probe
            .volume_milli
            .store((volume * 1000.0) as u64, Ordering::SeqCst);
    }

    fn set_sample_rate(&mut self, rate: u32) {
        self.probe.sample_rate.store(u64::from(rate), Ordering::SeqCst);
    }

    fn set_mono_audio(&mut self, _mono: bool) {}

    fn set_custom_palette(&mut self, _target: PaletteTarget, _colors: [u8; 12]) {}

    fn prefer_dmg_colors(&mut self, _prefer: bool) {}
}

/// Audio host whose devices ignore `pause`, so only the clock's own lock
/// stands between a paused session and the core.
#[derive(Clone, Default)]
pub struct StubbornHost {
    callback: Arc<Mutex<Option<AudioCallback>>>,
}

impl StubbornHost {
    /// Invokes the callback regardless of pause state.
    pub fn pull(&self, len: usize) -> Option<Vec<f32>> {
        let mut slot = self.callback.lock();
        let callback = slot.as_mut()?;
        let mut buf = vec![0.0; len];
        callback(&mut buf);
        Some(buf)
    }
}

impl AudioHost for StubbornHost {
    fn open(
        &self,
        _spec: AudioSpec,
        callback: AudioCallback,
    ) -> Result<Box<dyn AudioDevice>, RuntimeError> {
        *self.callback.lock() = Some(callback);
        Ok(Box::new(StubbornDevice))
    }
}

struct StubbornDevice;

impl AudioDevice for StubbornDevice {
    fn play(&mut self) -> Result<(), RuntimeError> {
        Ok(())
    }

    fn pause(&mut self) -> Result<(), RuntimeError> {
        Ok(())
    }
}

/// Manual host that refuses to open devices at one sample rate.
#[derive(Clone, Default)]
pub struct PickyHost {
    pub inner: ManualHost,
    pub refused_rate: u32,
}

impl AudioHost for PickyHost {
    fn open(
        &self,
        spec: AudioSpec,
        callback: AudioCallback,
    ) -> Result<Box<dyn AudioDevice>, RuntimeError> {
        if spec.sample_rate == self.refused_rate {
            return Err(RuntimeError::StartupFailure {
                error: format!("{} Hz not supported", spec.sample_rate),
            });
        }
        self.inner.open(spec, callback)
    }
}

pub fn temp_dir(name: &str) -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let dir = std::env::temp_dir().join(format!(
        "gbhost-{name}-{}-{nanos}",
        std::process::id()
    ));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

pub struct Rig {
    pub session: Session,
    pub host: ManualHost,
    pub reader: gbhost_runtime::FrameReader,
    pub pump: ManualPump,
    pub probe: Arc<Probe>,
    pub dir: PathBuf,
}

/// A started session on a manual host with a scripted core.
pub fn rig(name: &str) -> Rig {
    let host = ManualHost::new();
    let pump = host.pump();
    let (core, probe) = ScriptedCore::new();
    let dir = temp_dir(name);
    let (session, reader) = Session::start(
        Box::new(host.clone()),
        Box::new(core),
        SessionConfig {
            audio: AudioSpec::default(),
            save_states_dir: dir.join("save_states"),
        },
    )
    .expect("session start");
    Rig {
        session,
        host,
        reader,
        pump,
        probe,
        dir,
    }
}
