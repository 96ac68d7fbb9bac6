//! Event payloads
//!
//! Every event carries one [`Payload`] variant. Well-known events get typed
//! variants; user flags fall back to `Message`, `Fields` or `Bytes`.

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::flags::EventFlag;

/// An HTTP request as seen when it starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestEvent {
    pub method: String,
    pub path: String,
    pub remote_addr: Option<String>,
}

impl RequestEvent {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            remote_addr: None,
        }
    }

    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }
}

/// An HTTP request once the response has been sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestCompleteEvent {
    pub request: RequestEvent,
    pub status_code: u16,
    pub content_length: u64,
    pub elapsed: Duration,
}

/// An error and the chain of errors that caused it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    pub message: String,
    pub causes: Vec<String>,
}

impl ErrorEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            causes: Vec::new(),
        }
    }

    /// Capture an error's message and its `source()` chain
    pub fn from_error(err: &dyn StdError) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }
        Self {
            message: err.to_string(),
            causes,
        }
    }
}

impl fmt::Display for ErrorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        for cause in &self.causes {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

/// The data attached to an event
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Payload {
    #[default]
    Empty,
    Message(String),
    Request(RequestEvent),
    RequestComplete(RequestCompleteEvent),
    /// A request or response body
    Body(Vec<u8>),
    Error(ErrorEvent),
    /// Generic key/value pairs
    Fields(Vec<(String, String)>),
    Bytes(Vec<u8>),
}

impl Payload {
    pub fn fields<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Payload::Fields(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn as_message(&self) -> Option<&str> {
        match self {
            Payload::Message(message) => Some(message),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Payload::Empty)
    }

    /// Short variant name, used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Empty => "empty",
            Payload::Message(_) => "message",
            Payload::Request(_) => "request",
            Payload::RequestComplete(_) => "request_complete",
            Payload::Body(_) => "body",
            Payload::Error(_) => "error",
            Payload::Fields(_) => "fields",
            Payload::Bytes(_) => "bytes",
        }
    }
}

impl From<()> for Payload {
    fn from(_: ()) -> Self {
        Payload::Empty
    }
}

impl From<String> for Payload {
    fn from(message: String) -> Self {
        Payload::Message(message)
    }
}

impl From<&str> for Payload {
    fn from(message: &str) -> Self {
        Payload::Message(message.to_string())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<RequestEvent> for Payload {
    fn from(request: RequestEvent) -> Self {
        Payload::Request(request)
    }
}

impl From<RequestCompleteEvent> for Payload {
    fn from(complete: RequestCompleteEvent) -> Self {
        Payload::RequestComplete(complete)
    }
}

impl From<ErrorEvent> for Payload {
    fn from(error: ErrorEvent) -> Self {
        Payload::Error(error)
    }
}

/// One emitted occurrence of a flag
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub flag: EventFlag,
    /// When the event was emitted, not when it was dispatched
    pub timestamp: DateTime<Utc>,
    pub payload: Payload,
}

impl Event {
    pub fn new(flag: impl Into<EventFlag>, payload: impl Into<Payload>) -> Self {
        Self::at(flag, Utc::now(), payload)
    }

    pub fn at(flag: impl Into<EventFlag>, timestamp: DateTime<Utc>, payload: impl Into<Payload>) -> Self {
        Self {
            flag: flag.into(),
            timestamp,
            payload: payload.into(),
        }
    }
}
