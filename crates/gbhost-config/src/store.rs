use std::{
    fs, io,
    path::{Path, PathBuf},
};

use gbhost_input::{ButtonBindings, GamepadInput};
use gbhost_runtime::Button;

use crate::{
    error::ConfigError,
    palette::Palette,
    settings::{MAX_VOLUME, SOUND_CHANNELS, Settings},
};

pub const SETTINGS_FILE: &str = "settings.json";

/// Owns the settings file. Reads it once; every setter writes it back
/// before returning.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    settings: Settings,
}

impl SettingsStore {
    /// Opens `<dir>/settings.json`, creating it with defaults if missing. A
    /// file that cannot be parsed is replaced with defaults.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = dir.join(SETTINGS_FILE);

        let settings = match read(&path) {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                tracing::info!(path = %path.display(), "no settings file, writing defaults");
                let settings = Settings::default();
                write(&path, &settings)?;
                settings
            }
            Err(e @ ConfigError::Corrupt { .. }) => {
                tracing::warn!(error = %e, "regenerating default settings");
                let settings = Settings::default();
                write(&path, &settings)?;
                settings
            }
            Err(e) => return Err(e),
        };

        Ok(Self { path, settings })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Applies `f` and persists the result.
    pub fn update<T>(&mut self, f: impl FnOnce(&mut Settings) -> T) -> Result<T, ConfigError> {
        let out = f(&mut self.settings);
        write(&self.path, &self.settings)?;
        Ok(out)
    }

    pub fn push_recent(&mut self, program: &Path) -> Result<(), ConfigError> {
        self.update(|s| {
            s.recent.promote(program);
            if let Some(dir) = program.parent().filter(|d| !d.as_os_str().is_empty()) {
                s.paths.last_program_dir = Some(dir.to_path_buf());
            }
        })
    }

    pub fn forget_recent(&mut self, program: &Path) -> Result<bool, ConfigError> {
        self.update(|s| s.recent.remove(program))
    }

    pub fn clear_recent(&mut self) -> Result<(), ConfigError> {
        self.update(|s| s.recent.clear())
    }

    /// Also unmutes, like dragging a volume slider would.
    pub fn set_volume(&mut self, volume: u8) -> Result<(), ConfigError> {
        self.update(|s| {
            s.sound.volume = volume.min(MAX_VOLUME);
            s.sound.muted = false;
        })
    }

    pub fn set_muted(&mut self, muted: bool) -> Result<(), ConfigError> {
        self.update(|s| s.sound.muted = muted)
    }

    pub fn set_mono(&mut self, mono: bool) -> Result<(), ConfigError> {
        self.update(|s| s.sound.mono = mono)
    }

    /// `channel` is 1..=4.
    pub fn set_sound_channel(&mut self, channel: u8, enabled: bool) -> Result<(), ConfigError> {
        let slot = usize::from(channel)
            .checked_sub(1)
            .filter(|i| *i < usize::from(SOUND_CHANNELS))
            .ok_or(ConfigError::InvalidChannel(channel))?;
        self.update(|s| s.sound.channels[slot] = enabled)
    }

    pub fn set_key_binding(&mut self, button: Button, key: Option<u32>) -> Result<(), ConfigError> {
        self.update(|s| s.bindings.set_key(button, key))
    }

    pub fn set_gamepad_binding(
        &mut self,
        button: Button,
        input: Option<GamepadInput>,
    ) -> Result<(), ConfigError> {
        self.update(|s| s.bindings.set_gamepad(button, input))
    }

    /// Puts both keyboard and gamepad bindings back to their defaults.
    pub fn restore_default_controls(&mut self) -> Result<&ButtonBindings, ConfigError> {
        self.update(|s| s.bindings = ButtonBindings::default())?;
        Ok(&self.settings.bindings)
    }

    pub fn save_palette(&mut self, palette: Palette) -> Result<(), ConfigError> {
        // Validate before touching the in-memory copy.
        palette.rgb()?;
        self.update(|s| s.palettes.upsert(palette))?
    }

    pub fn select_palette(&mut self, name: &str) -> Result<(), ConfigError> {
        if self.settings.palettes.get(name).is_none() {
            return Err(ConfigError::UnknownPalette(name.into()));
        }
        self.update(|s| s.palettes.select(name))?
    }

    pub fn delete_palette(&mut self, name: &str) -> Result<(), ConfigError> {
        if self.settings.palettes.get(name).is_none() {
            return Err(ConfigError::UnknownPalette(name.into()));
        }
        self.update(|s| s.palettes.remove(name))?
    }

    pub fn set_boot_rom(&mut self, path: Option<PathBuf>) -> Result<(), ConfigError> {
        self.update(|s| s.paths.boot_rom = path)
    }

    pub fn set_saves_dir(&mut self, dir: PathBuf) -> Result<(), ConfigError> {
        self.update(|s| s.paths.saves_dir = dir)
    }

    pub fn set_save_states_dir(&mut self, dir: PathBuf) -> Result<(), ConfigError> {
        self.update(|s| s.paths.save_states_dir = dir)
    }
}

fn read(path: &Path) -> Result<Option<Settings>, ConfigError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let mut settings: Settings =
        serde_json::from_slice(&bytes).map_err(|source| ConfigError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
    settings.recent.normalize();
    Ok(Some(settings))
}

fn write(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    let json = serde_json::to_vec_pretty(settings).map_err(|e| io_err(io::Error::other(e)))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)
}
