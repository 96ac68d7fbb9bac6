//! Sink over process streams or any `Write`

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};

use super::{LineFormat, LogWriter, Output};
use crate::error::SinkError;

/// A shared `Write` destination
pub struct Stream {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl Stream {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl Output for Stream {
    fn write_bytes(&self, bytes: &[u8]) -> Result<usize, SinkError> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(bytes)?;
        writer.flush()?;
        Ok(bytes.len())
    }

    fn close(&self) -> Result<(), SinkError> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner).flush()?;
        Ok(())
    }
}

/// Sink writing to stdout/stderr or arbitrary writers
pub type StreamSink = LogWriter<Stream>;

impl LogWriter<Stream> {
    /// Output to stdout, errors to stderr, colored lines
    pub fn stdio() -> Self {
        Self::new(Stream::stdout(), Some(Stream::stderr()), LineFormat::default())
    }

    /// Output and errors both to `writer`
    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self::new(Stream::new(writer), None, LineFormat::default())
    }

    /// Separate output and error writers
    pub fn from_writers(output: impl Write + Send + 'static, error_output: impl Write + Send + 'static) -> Self {
        Self::new(Stream::new(output), Some(Stream::new(error_output)), LineFormat::default())
    }
}
