//! LogBus - a verbosity-gated diagnostics event bus
//!
//! Applications raise events through an [`Agent`]. Each event carries an
//! [`EventFlag`]; the agent's [`EventFlagSet`] decides whether it is live. Live
//! events are written through a [`Sink`] and fanned out to the listeners
//! registered for their flag on a [`DispatchQueue`].
//!
//! Sinks write either to process streams ([`StreamSink`]) or to size-bounded
//! rolling files ([`FileSink`], backed by the `rollfile` crate).

pub mod agent;
pub mod config;
pub mod dispatch;
mod error;
pub mod flags;
pub mod global;
pub mod listeners;
pub mod payload;
pub mod sink;

pub use agent::{Agent, ErrorListener, Listener, SyncAgent};
pub use config::{Config, FileConfig, OutputConfig};
pub use dispatch::{DispatchConfig, DispatchMode, DispatchQueue, Task, UNBOUNDED_CAPACITY};
pub use error::{AgentFailure, DispatchError, FlagSetParseError, SinkError};
pub use flags::{EventFlag, EventFlagSet};
pub use payload::{ErrorEvent, Event, Payload, RequestCompleteEvent, RequestEvent};
pub use sink::{BufferPool, FileSink, LineFormat, LogWriter, Output, Sink, Stream, StreamSink};

pub use rollfile::{RollPolicy, RollingFile};
