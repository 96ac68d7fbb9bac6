//! Sinks: where formatted diagnostics end up
//!
//! The agent never writes bytes itself. It renders through a [`Sink`], which
//! owns the line format, the color policy and the byte destinations.

mod file;
mod format;
mod pool;
mod stream;
mod writer;

use std::fmt;

use chrono::{DateTime, Utc};
use colored::Color;

use crate::error::SinkError;

pub use file::FileSink;
pub use format::{DEFAULT_TIME_FORMAT, LineFormat};
pub use pool::{BufferPool, DEFAULT_BUFFER_SIZE, DEFAULT_POOL_SIZE};
pub use stream::{Stream, StreamSink};
pub use writer::LogWriter;

/// Destination for formatted diagnostics
pub trait Sink: Send + Sync {
    /// Write a formatted line to the output stream, stamped with `timestamp`
    fn printf_at(&self, timestamp: DateTime<Utc>, args: fmt::Arguments<'_>) -> Result<(), SinkError>;

    /// Write a formatted line to the error stream (or the output stream if there is none)
    fn errorf_at(&self, timestamp: DateTime<Utc>, args: fmt::Arguments<'_>) -> Result<(), SinkError>;

    /// Write raw bytes to the output stream
    fn write(&self, bytes: &[u8]) -> Result<usize, SinkError>;

    /// Write `bytes` as the body of a prefixed line
    fn write_at(&self, timestamp: DateTime<Utc>, bytes: &[u8]) -> Result<usize, SinkError>;

    fn colorize(&self, text: &str, color: Color) -> String;

    fn colorize_by_status_code(&self, status_code: u16, text: &str) -> String;

    /// Lease a scratch buffer
    fn get_buffer(&self) -> Vec<u8>;

    /// Return a leased buffer
    fn put_buffer(&self, buf: Vec<u8>);

    /// Flush and release the underlying outputs
    fn close(&self) -> Result<(), SinkError>;

    fn printf(&self, args: fmt::Arguments<'_>) -> Result<(), SinkError> {
        self.printf_at(Utc::now(), args)
    }

    fn errorf(&self, args: fmt::Arguments<'_>) -> Result<(), SinkError> {
        self.errorf_at(Utc::now(), args)
    }
}

/// A byte destination a [`LogWriter`] can write lines to
pub trait Output: Send + Sync {
    fn write_bytes(&self, bytes: &[u8]) -> Result<usize, SinkError>;

    fn close(&self) -> Result<(), SinkError>;
}
