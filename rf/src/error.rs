//! Rolling file error types

use std::io;
use std::num::ParseIntError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while writing or rotating a rolling file
#[derive(Debug, Error)]
pub enum RollError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to rename {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to compress {path}: {source}")]
    Compress {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to remove archive {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Not an archive file name: {name}")]
    NotArchive { name: String },

    #[error("Invalid archive index in {name}: {source}")]
    InvalidIndex {
        name: String,
        #[source]
        source: ParseIntError,
    },

    #[error("Invalid archive pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Rolling file {path} is closed")]
    Closed { path: PathBuf },

    #[error("Rolling file {path} is unusable after a failed rotation")]
    Poisoned { path: PathBuf },
}

impl RollError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| RollError::Io { path, source }
    }

    /// Check if this error came out of the rotation sequence
    pub fn is_rotation_failure(&self) -> bool {
        matches!(
            self,
            RollError::Rename { .. } | RollError::Compress { .. } | RollError::Remove { .. }
        )
    }

    /// Check if the rolling file can no longer accept writes
    pub fn is_terminal(&self) -> bool {
        matches!(self, RollError::Closed { .. } | RollError::Poisoned { .. })
    }
}

/// Error returned when a human-readable size cannot be parsed
#[derive(Debug, Error)]
#[error("Invalid size '{value}': expected bytes or a number with a kb/mb/gb suffix")]
pub struct ParseSizeError {
    pub value: String,
}
