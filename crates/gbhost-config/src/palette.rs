//! Named four-colour schemes for monochrome programs.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Colours are stored the way users edit them: four space separated
/// `rrggbb` values, lightest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Palette {
    pub name: String,
    pub colors: String,
}

impl Palette {
    pub fn new(name: impl Into<String>, colors: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            colors: colors.into(),
        }
    }

    /// Packs the scheme into the RGB triples the core expects.
    pub fn rgb(&self) -> Result<[u8; 12], ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidPalette {
            name: self.name.clone(),
            reason,
        };
        let mut out = [0u8; 12];
        let mut count = 0;
        for (i, word) in self.colors.split_whitespace().enumerate() {
            if i >= 4 {
                return Err(invalid("more than four colours".into()));
            }
            let word = word.trim_start_matches('#');
            if word.len() != 6 {
                return Err(invalid(format!("{word:?} is not rrggbb")));
            }
            let value =
                u32::from_str_radix(word, 16).map_err(|e| invalid(format!("{word:?}: {e}")))?;
            out[i * 3..i * 3 + 3].copy_from_slice(&value.to_be_bytes()[1..]);
            count += 1;
        }
        if count != 4 {
            return Err(invalid(format!("expected four colours, found {count}")));
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteSettings {
    pub selected: String,
    /// Let colour-capable programs keep their own colours.
    #[serde(default)]
    pub prefer_dmg_colors: bool,
    pub schemes: Vec<Palette>,
}

impl Default for PaletteSettings {
    fn default() -> Self {
        Self {
            selected: "Green".into(),
            prefer_dmg_colors: false,
            schemes: default_palettes(),
        }
    }
}

impl PaletteSettings {
    pub fn get(&self, name: &str) -> Option<&Palette> {
        self.schemes.iter().find(|p| p.name == name)
    }

    pub fn selected(&self) -> Option<&Palette> {
        self.get(&self.selected)
    }

    /// Adds a scheme or replaces the one with the same name.
    pub fn upsert(&mut self, palette: Palette) -> Result<(), ConfigError> {
        palette.rgb()?;
        match self.schemes.iter_mut().find(|p| p.name == palette.name) {
            Some(slot) => *slot = palette,
            None => self.schemes.push(palette),
        }
        Ok(())
    }

    /// Deletes a scheme. Deleting the selected one selects the first
    /// remaining scheme.
    pub fn remove(&mut self, name: &str) -> Result<(), ConfigError> {
        let before = self.schemes.len();
        self.schemes.retain(|p| p.name != name);
        if self.schemes.len() == before {
            return Err(ConfigError::UnknownPalette(name.into()));
        }
        if self.selected == name
            && let Some(first) = self.schemes.first()
        {
            self.selected = first.name.clone();
        }
        Ok(())
    }

    pub fn select(&mut self, name: &str) -> Result<(), ConfigError> {
        if self.get(name).is_none() {
            return Err(ConfigError::UnknownPalette(name.into()));
        }
        self.selected = name.into();
        Ok(())
    }
}

pub fn default_palettes() -> Vec<Palette> {
    vec![
        Palette::new("Green", "afcb46 79aa6d 226f5f 082955"),
        Palette::new("Grey", "e8e8e8 a0a0a0 585858 101010"),
        Palette::new("Yellow", "f8f078 b0a848 686830 202010"),
        Palette::new("Red", "ffc0c0 ff6060 c00000 600000"),
        Palette::new("Blue", "c0c0ff 5f60ff 0000c0 000060"),
    ]
}
