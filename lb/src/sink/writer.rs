//! The line writer behind both stream and file sinks

use std::fmt;

use chrono::{DateTime, Utc};
use colored::Color;
use tracing::debug;

use super::{BufferPool, LineFormat, Output, Sink};
use crate::error::SinkError;

/// Renders lines with a [`LineFormat`] and writes them to an output and an optional error output
pub struct LogWriter<O> {
    output: O,
    error_output: Option<O>,
    format: LineFormat,
    pool: BufferPool,
}

impl<O: Output> LogWriter<O> {
    pub fn new(output: O, error_output: Option<O>, format: LineFormat) -> Self {
        Self {
            output,
            error_output,
            format,
            pool: BufferPool::default(),
        }
    }

    pub fn with_format(mut self, format: LineFormat) -> Self {
        self.format = format;
        self
    }

    pub fn format(&self) -> &LineFormat {
        &self.format
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn error_output(&self) -> Option<&O> {
        self.error_output.as_ref()
    }

    fn line_to(&self, output: &O, timestamp: DateTime<Utc>, args: fmt::Arguments<'_>) -> Result<(), SinkError> {
        let mut buf = self.pool.get();
        let result = if self.format.render(&mut buf, timestamp, args) {
            output.write_bytes(&buf).map(|_| ())
        } else {
            Ok(())
        };
        self.pool.put(buf);
        result
    }
}

impl<O: Output> Sink for LogWriter<O> {
    fn printf_at(&self, timestamp: DateTime<Utc>, args: fmt::Arguments<'_>) -> Result<(), SinkError> {
        self.line_to(&self.output, timestamp, args)
    }

    fn errorf_at(&self, timestamp: DateTime<Utc>, args: fmt::Arguments<'_>) -> Result<(), SinkError> {
        let output = self.error_output.as_ref().unwrap_or(&self.output);
        self.line_to(output, timestamp, args)
    }

    fn write(&self, bytes: &[u8]) -> Result<usize, SinkError> {
        self.output.write_bytes(bytes)
    }

    fn write_at(&self, timestamp: DateTime<Utc>, bytes: &[u8]) -> Result<usize, SinkError> {
        if bytes.is_empty() {
            return Ok(0);
        }
        let mut buf = self.pool.get();
        self.format.write_prefix(&mut buf, timestamp);
        buf.extend_from_slice(bytes);
        buf.push(b'\n');
        let result = self.output.write_bytes(&buf);
        self.pool.put(buf);
        result
    }

    fn colorize(&self, text: &str, color: Color) -> String {
        self.format.colorize(text, color)
    }

    fn colorize_by_status_code(&self, status_code: u16, text: &str) -> String {
        self.format.colorize_by_status_code(status_code, text)
    }

    fn get_buffer(&self) -> Vec<u8> {
        self.pool.get()
    }

    fn put_buffer(&self, buf: Vec<u8>) {
        self.pool.put(buf);
    }

    fn close(&self) -> Result<(), SinkError> {
        debug!("LogWriter::close: called");
        let out = self.output.close();
        let err = match &self.error_output {
            Some(error_output) => error_output.close(),
            None => Ok(()),
        };
        out.and(err)
    }
}
