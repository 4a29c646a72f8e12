//! Slot-based save states keyed by program title.
//!
//! Slot files live at `<dir>/<title>.s<slot>` and wrap the core's opaque
//! snapshot in a small postcard envelope carrying the title, so a slot file
//! copied between programs is refused instead of loaded.

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    time::{Duration, Instant, SystemTime},
};

use serde::{Deserialize, Serialize};

use crate::{emulator::EmulationCore, error::SaveStateError};

pub const SLOT_COUNT: u8 = 5;
/// Delay between a save and the next slot metadata scan.
pub const REFRESH_DEBOUNCE: Duration = Duration::from_millis(150);

const SLOT_FILE_VERSION: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotIndex(u8);

impl SlotIndex {
    pub fn new(slot: u8) -> Result<Self, SaveStateError> {
        if (1..=SLOT_COUNT).contains(&slot) {
            Ok(Self(slot))
        } else {
            Err(SaveStateError::InvalidSlot(slot))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn all() -> impl Iterator<Item = SlotIndex> {
        (1..=SLOT_COUNT).map(SlotIndex)
    }
}

impl TryFrom<u8> for SlotIndex {
    type Error = SaveStateError;

    fn try_from(slot: u8) -> Result<Self, Self::Error> {
        Self::new(slot)
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Serialize, Deserialize)]
struct SlotFile {
    version: u16,
    title: String,
    state: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    /// Nothing saved in that slot; the core was not touched.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotInfo {
    pub slot: SlotIndex,
    pub path: PathBuf,
    pub modified: Option<SystemTime>,
}

impl SlotInfo {
    pub fn is_empty(&self) -> bool {
        self.modified.is_none()
    }
}

/// Makes a program title safe to use as a file stem.
fn file_stem(title: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if stem.is_empty() || stem.chars().all(|c| c == '.') {
        "untitled".to_string()
    } else {
        stem
    }
}

pub struct SaveStateManager {
    dir: PathBuf,
    slots: Vec<SlotInfo>,
    scanned_title: Option<String>,
    refresh_due: Option<Instant>,
}

impl SaveStateManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            slots: Vec::new(),
            scanned_title: None,
            refresh_due: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Points future saves and loads at `dir`. Slot metadata is rescanned
    /// on the next poll.
    pub fn set_dir(&mut self, dir: impl Into<PathBuf>) {
        self.dir = dir.into();
        self.slots.clear();
        self.scanned_title = None;
        self.refresh_due = None;
    }

    pub fn slot_path(&self, title: &str, slot: SlotIndex) -> PathBuf {
        self.dir.join(format!("{}.s{}", file_stem(title), slot))
    }

    /// Serializes `core` into `slot`. The caller must hold the core paused.
    pub fn save(
        &mut self,
        core: &mut dyn EmulationCore,
        title: &str,
        slot: SlotIndex,
    ) -> Result<PathBuf, SaveStateError> {
        let path = self.slot_path(title, slot);
        let file = SlotFile {
            version: SLOT_FILE_VERSION,
            title: title.to_string(),
            state: core.save_state()?,
        };
        let bytes = postcard::to_stdvec(&file).map_err(|e| SaveStateError::Corrupt {
            path: path.clone(),
            error: e.to_string(),
        })?;

        fs::create_dir_all(&self.dir)?;
        let tmp = path.with_extension(format!("s{slot}.tmp"));
        write_replacing(&tmp, &path, &bytes)?;

        tracing::info!(%slot, path = %path.display(), bytes = bytes.len(), "state saved");
        self.refresh_due = Some(Instant::now() + REFRESH_DEBOUNCE);
        Ok(path)
    }

    /// Restores `slot` into `core`. The caller must hold the core paused.
    pub fn load(
        &mut self,
        core: &mut dyn EmulationCore,
        title: &str,
        slot: SlotIndex,
    ) -> Result<LoadOutcome, SaveStateError> {
        let path = self.slot_path(title, slot);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(%slot, "slot is empty");
                return Ok(LoadOutcome::Empty);
            }
            Err(e) => return Err(e.into()),
        };

        let file: SlotFile = postcard::from_bytes(&bytes).map_err(|e| SaveStateError::Corrupt {
            path: path.clone(),
            error: e.to_string(),
        })?;
        if file.version != SLOT_FILE_VERSION {
            return Err(SaveStateError::Corrupt {
                path,
                error: format!("unsupported version {}", file.version),
            });
        }
        if file.title != title {
            return Err(SaveStateError::TitleMismatch {
                expected: title.to_string(),
                found: file.title,
            });
        }

        core.load_state(&file.state)?;
        tracing::info!(%slot, path = %path.display(), "state loaded");
        Ok(LoadOutcome::Loaded)
    }

    /// Rescans slot metadata for `title` now.
    pub fn refresh(&mut self, title: &str) -> &[SlotInfo] {
        self.slots = SlotIndex::all()
            .map(|slot| {
                let path = self.slot_path(title, slot);
                let modified = fs::metadata(&path).and_then(|m| m.modified()).ok();
                SlotInfo {
                    slot,
                    path,
                    modified,
                }
            })
            .collect();
        self.scanned_title = Some(title.to_string());
        self.refresh_due = None;
        tracing::debug!(title, "slot metadata refreshed");
        &self.slots
    }

    /// Rescans if a save's debounce has elapsed or the program changed.
    /// Returns whether a scan happened.
    pub fn poll_refresh(&mut self, title: &str, now: Instant) -> bool {
        let program_changed = self.scanned_title.as_deref() != Some(title);
        let debounce_elapsed = self.refresh_due.is_some_and(|due| now >= due);
        if program_changed || debounce_elapsed {
            self.refresh(title);
            true
        } else {
            false
        }
    }

    /// Slot metadata as of the last scan.
    pub fn slots(&self) -> &[SlotInfo] {
        &self.slots
    }
}

/// Writes `bytes` to `tmp` and renames it over `path`. A failure at either
/// step leaves no temporary file behind.
fn write_replacing(tmp: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    let result = fs::write(tmp, bytes).and_then(|()| fs::rename(tmp, path));
    if result.is_err() {
        let _ = fs::remove_file(tmp);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_bounds() {
        assert!(SlotIndex::new(0).is_err());
        assert!(SlotIndex::new(6).is_err());
        assert_eq!(SlotIndex::all().map(SlotIndex::get).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn titles_become_safe_stems() {
        assert_eq!(file_stem("TETRIS"), "TETRIS");
        assert_eq!(file_stem("A/B:C"), "A_B_C");
        assert_eq!(file_stem("  "), "untitled");
        assert_eq!(file_stem(".."), "untitled");
    }

    #[test]
    fn slot_path_layout() {
        let mgr = SaveStateManager::new("/saves");
        let slot = SlotIndex::new(3).expect("slot");
        assert_eq!(mgr.slot_path("POKEMON", slot), Path::new("/saves/POKEMON.s3"));
    }

    #[test]
    fn failed_replace_leaves_no_temp_file() {
        let dir = std::env::temp_dir().join(format!("gbhost-replace-{}", std::process::id()));
        let target = dir.join("GAME.s1");
        // A non-empty directory cannot be replaced by a file.
        fs::create_dir_all(target.join("occupied")).expect("create target dir");
        let tmp = dir.join("GAME.s1.tmp");

        assert!(write_replacing(&tmp, &target, b"state").is_err());
        assert!(!tmp.exists());
        assert!(target.is_dir());

        fs::remove_dir_all(&dir).expect("cleanup");
    }

    #[test]
    fn refresh_waits_for_debounce() {
        let mut mgr = SaveStateManager::new(std::env::temp_dir().join("gbhost-refresh-debounce"));
        let now = Instant::now();
        assert!(mgr.poll_refresh("GAME", now));
        assert!(!mgr.poll_refresh("GAME", now));
        mgr.refresh_due = Some(now + REFRESH_DEBOUNCE);
        assert!(!mgr.poll_refresh("GAME", now));
        assert!(mgr.poll_refresh("GAME", now + REFRESH_DEBOUNCE));
        assert!(mgr.refresh_due.is_none());
        assert!(mgr.poll_refresh("OTHER", now));
    }
}
