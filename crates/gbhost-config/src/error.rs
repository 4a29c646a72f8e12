use std::{io, path::PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("settings I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("settings file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid palette {name:?}: {reason}")]
    InvalidPalette { name: String, reason: String },
    #[error("unknown palette {0:?}")]
    UnknownPalette(String),
    #[error("sound channel must be 1..=4 (got {0})")]
    InvalidChannel(u8),
}
