//! Error types for the entity store.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or persisting the store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to create the data directory.
    #[error("Failed to create data directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to read a mirror file.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write or replace a mirror file.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to encode a collection as JSON.
    #[error("Failed to serialize {kind}: {source}")]
    Serialize {
        kind: &'static str,
        source: serde_json::Error,
    },

    /// The configured backend has no implementation in this build.
    #[error("Storage backend '{0}' is not supported")]
    UnsupportedBackend(String),
}

impl StoreError {
    /// Whether the error came from the filesystem. These are transient from
    /// the store's point of view: the data stays dirty and the next save or
    /// autosave tick tries again.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Self::CreateDir { .. } | Self::Read { .. } | Self::Write { .. }
        )
    }
}
