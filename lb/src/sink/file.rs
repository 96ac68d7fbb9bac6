//! Sink over rolling files

use std::path::Path;

use rollfile::{RollPolicy, RollingFile};
use tracing::debug;

use super::{LineFormat, LogWriter, Output};
use crate::error::SinkError;

impl Output for RollingFile {
    fn write_bytes(&self, bytes: &[u8]) -> Result<usize, SinkError> {
        Ok(self.write(bytes)?)
    }

    fn close(&self) -> Result<(), SinkError> {
        Ok(RollingFile::close(self)?)
    }
}

/// Sink writing uncolored lines to size-bounded rolling files
pub type FileSink = LogWriter<RollingFile>;

impl LogWriter<RollingFile> {
    /// Open a file sink at `path`
    pub fn open(path: impl AsRef<Path>, policy: RollPolicy) -> Result<Self, SinkError> {
        debug!(path = ?path.as_ref(), ?policy, "FileSink::open: called");
        let output = RollingFile::open(path, policy)?;
        Ok(Self::new(output, None, LineFormat::plain()))
    }

    /// Open a file sink with errors going to a separate rolling file
    pub fn open_with_errors(
        path: impl AsRef<Path>,
        error_path: impl AsRef<Path>,
        policy: RollPolicy,
    ) -> Result<Self, SinkError> {
        debug!(path = ?path.as_ref(), error_path = ?error_path.as_ref(), "FileSink::open_with_errors: called");
        let output = RollingFile::open(path, policy)?;
        let error_output = RollingFile::open(error_path, policy)?;
        Ok(Self::new(output, Some(error_output), LineFormat::plain()))
    }
}
