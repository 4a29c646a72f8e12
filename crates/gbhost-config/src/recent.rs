use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const MAX_RECENT: usize = 10;

/// Most recently opened programs, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecentPrograms {
    entries: Vec<PathBuf>,
}

impl RecentPrograms {
    /// Moves `path` to the front, dropping the oldest entry past the limit.
    pub fn promote(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        self.entries.retain(|p| *p != path);
        self.entries.insert(0, path);
        self.entries.truncate(MAX_RECENT);
    }

    pub fn remove(&mut self, path: &Path) -> bool {
        let before = self.entries.len();
        self.entries.retain(|p| p != path);
        before != self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Applies the length limit to a list read from disk.
    pub(crate) fn normalize(&mut self) {
        let mut seen = Vec::with_capacity(self.entries.len());
        self.entries.retain(|p| {
            if seen.contains(p) {
                false
            } else {
                seen.push(p.clone());
                true
            }
        });
        self.entries.truncate(MAX_RECENT);
    }
}
