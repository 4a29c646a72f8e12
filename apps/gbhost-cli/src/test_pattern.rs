//! Built-in stand-in core. It validates cartridge headers and produces a
//! scrolling pattern plus a tone, which is enough to exercise the audio
//! clock, frame hand-off, input and save states without a real emulator.

use std::{
    f32::consts::TAU,
    fs,
    path::{Path, PathBuf},
};

use gbhost_runtime::{
    CartridgeInfo, CoreError, CoreInit, EmulationCore, FRAME_LEN, FrameSink,
    JoypadSnapshot, PaletteTarget, SCREEN_HEIGHT, SCREEN_WIDTH,
};
use serde::{Deserialize, Serialize};

/// Master clock over cycles per frame.
const FRAMES_PER_SECOND: f64 = 4_194_304.0 / 70_224.0;
const HEADER_END: usize = 0x150;
const TITLE: std::ops::Range<usize> = 0x134..0x144;
const BASE_TONE_HZ: f32 = 220.0;

const DMG_SHADES: [u8; 12] = [
    0xe0, 0xf8, 0xd0, 0x88, 0xc0, 0x70, 0x34, 0x68, 0x56, 0x08, 0x18, 0x20,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Snapshot {
    title: String,
    frame: u64,
    frame_progress: f64,
    phase: f32,
}

pub struct TestPatternCore {
    init: CoreInit,
    program: Option<CartridgeInfo>,
    powered: bool,
    sample_rate: u32,
    multiplier: f32,
    volume: f32,
    mono: bool,
    channels: [bool; 4],
    palette: [u8; 12],
    prefer_dmg: bool,
    pad: JoypadSnapshot,
    frame: u64,
    frame_progress: f64,
    phase: f32,
    pixels: Vec<u8>,
}

impl TestPatternCore {
    pub fn new(init: CoreInit) -> Self {
        if let Some(boot) = &init.boot_rom_path {
            tracing::debug!(path = %boot.display(), "boot ROM ignored by test pattern core");
        }
        Self {
            init,
            program: None,
            powered: false,
            sample_rate: gbhost_runtime::audio::DEFAULT_SAMPLE_RATE,
            multiplier: 1.0,
            volume: 1.0,
            mono: false,
            channels: [true; 4],
            palette: DMG_SHADES,
            prefer_dmg: false,
            pad: JoypadSnapshot::RELEASED,
            frame: 0,
            frame_progress: 0.0,
            phase: 0.0,
            pixels: vec![0; FRAME_LEN],
        }
    }

    fn tone_hz(&self) -> f32 {
        // Each held button raises the pitch by a semitone step.
        let steps = self.pad.pressed().map(|b| b.index() + 1).sum::<usize>() as f32;
        BASE_TONE_HZ * 2f32.powf(steps / 12.0)
    }

    fn render(&mut self) {
        let shift = (self.frame % SCREEN_WIDTH as u64) as usize;
        for y in 0..SCREEN_HEIGHT {
            for x in 0..SCREEN_WIDTH {
                let shade = ((x + shift) / 20 + y / 36) % 4;
                let i = (y * SCREEN_WIDTH + x) * 3;
                self.pixels[i..i + 3].copy_from_slice(&self.palette[shade * 3..shade * 3 + 3]);
            }
        }
        // One marker square per held button along the top edge.
        for button in self.pad.pressed() {
            let x0 = 8 + button.index() * 18;
            for y in 4..12 {
                for x in x0..x0 + 8 {
                    let i = (y * SCREEN_WIDTH + x) * 3;
                    self.pixels[i..i + 3].copy_from_slice(&self.palette[9..12]);
                }
            }
        }
    }
}

fn read_title(rom: &[u8], path: &Path) -> String {
    let raw: String = rom[TITLE]
        .iter()
        .take_while(|&&b| b != 0)
        .filter(|b| b.is_ascii_graphic() || **b == b' ')
        .map(|&b| b as char)
        .collect();
    let raw = raw.trim();
    if raw.is_empty() {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "UNTITLED".into())
    } else {
        raw.to_string()
    }
}

impl EmulationCore for TestPatternCore {
    fn insert_cartridge(&mut self, path: &Path) -> Result<CartridgeInfo, CoreError> {
        let rom = fs::read(path).map_err(|e| CoreError::Io(format!("{}: {e}", path.display())))?;
        if rom.len() < HEADER_END {
            return Err(CoreError::UnsupportedCartridge(format!(
                "{} is {} bytes, shorter than a cartridge header",
                path.display(),
                rom.len()
            )));
        }
        let info = CartridgeInfo {
            title: read_title(&rom, path),
            path: PathBuf::from(path),
        };
        tracing::debug!(title = %info.title, save_dir = %self.init.save_dir.display(), "cartridge loaded");
        self.program = Some(info.clone());
        Ok(info)
    }

    fn power_on(&mut self) {
        self.powered = self.program.is_some();
        self.frame = 0;
        self.frame_progress = 0.0;
        self.phase = 0.0;
    }

    fn power_off(&mut self) {
        self.powered = false;
    }

    fn set_inputs(&mut self, pad: JoypadSnapshot) {
        self.pad = pad;
    }

    fn collect_audio_samples(&mut self, out: &mut [f32], frames: &mut dyn FrameSink) {
        if !self.powered {
            out.fill(0.0);
            return;
        }
        let step = self.tone_hz() * self.multiplier / self.sample_rate as f32;
        let frame_step = FRAMES_PER_SECOND * f64::from(self.multiplier) / f64::from(self.sample_rate);

        for pair in out.chunks_exact_mut(2) {
            let square = if self.phase < 0.5 { 1.0 } else { -1.0 };
            let sine = (self.phase * TAU).sin();
            let left = if self.channels[0] { square } else { 0.0 };
            let right = if self.channels[2] { sine } else { 0.0 };
            let (l, r) = if self.mono {
                let m = (left + right) * 0.5;
                (m, m)
            } else {
                (left, right)
            };
            pair[0] = l * self.volume;
            pair[1] = r * self.volume;

            self.phase = (self.phase + step).fract();
            self.frame_progress += frame_step;
            if self.frame_progress >= 1.0 {
                self.frame_progress -= 1.0;
                self.frame += 1;
                self.render();
                frames.frame_ready(&self.pixels);
            }
        }
    }

    fn set_clock_multiplier(&mut self, multiplier: f32) {
        if multiplier.is_finite() && multiplier > 0.0 {
            self.multiplier = multiplier;
        }
    }

    fn save_state(&mut self) -> Result<Vec<u8>, CoreError> {
        let program = self.program.as_ref().ok_or(CoreError::NoCartridge)?;
        postcard::to_stdvec(&Snapshot {
            title: program.title.clone(),
            frame: self.frame,
            frame_progress: self.frame_progress,
            phase: self.phase,
        })
        .map_err(|e| CoreError::InvalidState(e.to_string()))
    }

    fn load_state(&mut self, state: &[u8]) -> Result<(), CoreError> {
        let program = self.program.as_ref().ok_or(CoreError::NoCartridge)?;
        let snap: Snapshot =
            postcard::from_bytes(state).map_err(|e| CoreError::InvalidState(e.to_string()))?;
        if snap.title != program.title {
            return Err(CoreError::InvalidState(format!(
                "state belongs to {:?}",
                snap.title
            )));
        }
        self.frame = snap.frame;
        self.frame_progress = snap.frame_progress;
        self.phase = snap.phase;
        self.powered = true;
        Ok(())
    }

    fn enable_sound_channel(&mut self, channel: u8, enabled: bool) {
        let index = usize::from(channel).checked_sub(1);
        if let Some(slot) = index.and_then(|i| self.channels.get_mut(i)) {
            *slot = enabled;
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    fn set_sample_rate(&mut self, rate: u32) {
        if rate > 0 {
            self.sample_rate = rate;
        }
    }

    fn set_mono_audio(&mut self, mono: bool) {
        self.mono = mono;
    }

    fn set_custom_palette(&mut self, target: PaletteTarget, colors: [u8; 12]) {
        if self.prefer_dmg {
            return;
        }
        // Only one layer exists in the pattern, so every target maps to it.
        tracing::debug!(?target, "palette updated");
        self.palette = colors;
    }

    fn prefer_dmg_colors(&mut self, prefer: bool) {
        self.prefer_dmg = prefer;
        if prefer {
            self.palette = DMG_SHADES;
        }
    }
}
