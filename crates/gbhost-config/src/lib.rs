//! Persistent host settings: paths, recent programs, palettes, sound and
//! input bindings.

pub mod error;
pub mod palette;
pub mod recent;
pub mod settings;
pub mod store;

pub use error::ConfigError;
pub use palette::{Palette, PaletteSettings, default_palettes};
pub use recent::{MAX_RECENT, RecentPrograms};
pub use settings::{PathSettings, SOUND_CHANNELS, Settings, SoundSettings};
pub use store::{SETTINGS_FILE, SettingsStore};
