use std::path::PathBuf;

use gbhost_input::ButtonBindings;
use gbhost_runtime::CoreSetting;
use serde::{Deserialize, Serialize};

use crate::{palette::PaletteSettings, recent::RecentPrograms};

pub const MAX_VOLUME: u8 = 100;
pub const SOUND_CHANNELS: u8 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    pub last_program_dir: Option<PathBuf>,
    pub boot_rom: Option<PathBuf>,
    pub saves_dir: PathBuf,
    pub save_states_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            last_program_dir: None,
            boot_rom: None,
            saves_dir: PathBuf::from("saves"),
            save_states_dir: PathBuf::from("save_states"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundSettings {
    /// 0..=100. Kept while muted so unmuting restores it.
    pub volume: u8,
    pub muted: bool,
    pub mono: bool,
    /// Enable flags for channels 1..=4.
    pub channels: [bool; SOUND_CHANNELS as usize],
}

impl Default for SoundSettings {
    fn default() -> Self {
        Self {
            volume: MAX_VOLUME,
            muted: false,
            mono: false,
            channels: [true; SOUND_CHANNELS as usize],
        }
    }
}

impl SoundSettings {
    pub fn gain(&self) -> f32 {
        if self.muted {
            return 0.0;
        }
        f32::from(self.volume.min(MAX_VOLUME)) / f32::from(MAX_VOLUME)
    }

}

/// Everything the host persists between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathSettings,
    pub recent: RecentPrograms,
    pub palettes: PaletteSettings,
    pub sound: SoundSettings,
    #[serde(flatten)]
    pub bindings: ButtonBindings,
}

impl Settings {
    /// Core settings to replay after a core is installed.
    pub fn core_settings(&self) -> Vec<CoreSetting> {
        let mut out = vec![
            CoreSetting::Volume(self.sound.gain()),
            CoreSetting::MonoAudio(self.sound.mono),
            CoreSetting::PreferDmgColors(self.palettes.prefer_dmg_colors),
        ];
        out.extend((1..=SOUND_CHANNELS).zip(self.sound.channels).map(
            |(channel, enabled)| CoreSetting::SoundChannel { channel, enabled },
        ));
        match self.palettes.selected().map(|p| p.rgb()) {
            Some(Ok(colors)) => out.push(CoreSetting::CustomPalette {
                target: gbhost_runtime::PaletteTarget::All,
                colors,
            }),
            Some(Err(e)) => tracing::warn!(error = %e, "ignoring selected palette"),
            None => tracing::warn!(name = %self.palettes.selected, "selected palette not found"),
        }
        out
    }
}
