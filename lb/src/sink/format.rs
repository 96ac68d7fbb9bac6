//! Line formatting shared by every sink
//!
//! A line is `[timestamp ][label ]message\n`.

use std::fmt::Write as _;
use std::io::Write;

use chrono::{DateTime, Utc};
use colored::{Color, Colorize};

/// Default timestamp format (RFC 3339, UTC, second precision)
pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// How sinks render lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineFormat {
    pub use_color: bool,
    pub show_timestamp: bool,
    pub show_label: bool,
    /// Application label printed after the timestamp
    pub label: String,
    /// `chrono` strftime format for timestamps
    pub time_format: String,
}

impl Default for LineFormat {
    fn default() -> Self {
        Self {
            use_color: true,
            show_timestamp: true,
            show_label: false,
            label: String::new(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }
}

impl LineFormat {
    /// Default format without ANSI colors, used for files
    pub fn plain() -> Self {
        Self {
            use_color: false,
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self.show_label = true;
        self
    }

    pub fn colorize(&self, text: &str, color: Color) -> String {
        if self.use_color {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }

    /// Green for 2xx, red for 500, yellow otherwise
    pub fn colorize_by_status_code(&self, status_code: u16, text: &str) -> String {
        let color = match status_code {
            200..=299 => Color::Green,
            500 => Color::Red,
            _ => Color::Yellow,
        };
        self.colorize(text, color)
    }

    /// Format `at`, falling back to the default format if `time_format` is invalid
    pub fn timestamp(&self, at: DateTime<Utc>) -> String {
        let mut text = String::new();
        if write!(text, "{}", at.format(&self.time_format)).is_err() {
            text = at.format(DEFAULT_TIME_FORMAT).to_string();
        }
        self.colorize(&text, Color::BrightBlack)
    }

    /// Write the `[timestamp ][label ]` prefix into `buf`
    pub fn write_prefix(&self, buf: &mut Vec<u8>, at: DateTime<Utc>) {
        if self.show_timestamp {
            buf.extend_from_slice(self.timestamp(at).as_bytes());
            buf.push(b' ');
        }
        if self.show_label && !self.label.is_empty() {
            buf.extend_from_slice(self.colorize(&self.label, Color::Blue).as_bytes());
            buf.push(b' ');
        }
    }

    /// Render a full line into `buf`; returns false (leaving `buf` empty) if the message is empty
    pub fn render(&self, buf: &mut Vec<u8>, at: DateTime<Utc>, message: std::fmt::Arguments<'_>) -> bool {
        self.write_prefix(buf, at);
        let start = buf.len();
        if buf.write_fmt(message).is_err() || buf.len() == start {
            buf.clear();
            return false;
        }
        buf.push(b'\n');
        true
    }
}
