//! The diagnostics agent
//!
//! An [`Agent`] owns the verbosity set, the listener registry, a dispatch
//! queue and a sink. Applications emit through it and subscribe to it.
//!
//! ```ignore
//! use logbus::{Agent, EventFlag, EventFlagSet};
//!
//! let agent = Agent::new("all,-debug".parse()?)?;
//! agent.add_event_listener(EventFlag::ERROR, |sink, event| {
//!     sink.errorf(format_args!("alert: {:?}", event.payload))?;
//!     Ok(())
//! });
//! agent.errorf(format_args!("disk at {}%", 97));
//! agent.close()?;
//! ```

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use colored::Color;
use tracing::{debug, error};

use crate::config::Config;
use crate::dispatch::{DispatchConfig, DispatchQueue, panic_message};
use crate::error::{AgentFailure, DispatchError, SinkError};
use crate::flags::{EventFlag, EventFlagSet};
use crate::payload::{ErrorEvent, Event, Payload};
use crate::sink::{FileSink, Sink, StreamSink};

/// A registered event listener
pub type Listener = Arc<dyn Fn(&dyn Sink, &Event) -> eyre::Result<()> + Send + Sync>;

/// A registered error-channel listener
pub type ErrorListener = Arc<dyn Fn(&AgentFailure) + Send + Sync>;

type ErrorListeners = Arc<RwLock<Vec<ErrorListener>>>;

/// Label and color a convenience writer prints in front of its message
#[derive(Debug, Clone, Copy)]
struct Style {
    label: &'static str,
    color: Color,
}

const INFO_STYLE: Style = Style {
    label: "Info",
    color: Color::White,
};
const DEBUG_STYLE: Style = Style {
    label: "Debug",
    color: Color::BrightYellow,
};
const WARNING_STYLE: Style = Style {
    label: "Warning",
    color: Color::Yellow,
};
const ERROR_STYLE: Style = Style {
    label: "Error",
    color: Color::Red,
};
const FATAL_STYLE: Style = Style {
    label: "Fatal Error",
    color: Color::Red,
};

/// Which stream a line goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Output,
    Error,
}

/// Verbosity-gated event bus
pub struct Agent {
    verbosity: RwLock<EventFlagSet>,
    listeners: RwLock<HashMap<EventFlag, Vec<Listener>>>,
    error_listeners: ErrorListeners,
    sink: Arc<dyn Sink>,
    queue: DispatchQueue,
    closed: AtomicBool,
}

impl Agent {
    /// Agent writing to stdout/stderr with synchronous dispatch
    pub fn new(verbosity: EventFlagSet) -> Result<Self, DispatchError> {
        Self::with_sink(verbosity, StreamSink::stdio())
    }

    pub fn with_sink(verbosity: EventFlagSet, sink: impl Sink + 'static) -> Result<Self, DispatchError> {
        Self::with_dispatch(verbosity, sink, DispatchConfig::default())
    }

    pub fn with_dispatch(
        verbosity: EventFlagSet,
        sink: impl Sink + 'static,
        dispatch: DispatchConfig,
    ) -> Result<Self, DispatchError> {
        Self::with_shared_sink(verbosity, Arc::new(sink), dispatch)
    }

    /// Build from an already shared sink
    pub fn with_shared_sink(
        verbosity: EventFlagSet,
        sink: Arc<dyn Sink>,
        dispatch: DispatchConfig,
    ) -> Result<Self, DispatchError> {
        debug!(%verbosity, ?dispatch, "Agent::new: called");
        Ok(Self {
            verbosity: RwLock::new(verbosity),
            listeners: RwLock::new(HashMap::new()),
            error_listeners: Arc::new(RwLock::new(Vec::new())),
            sink,
            queue: DispatchQueue::new(dispatch)?,
            closed: AtomicBool::new(false),
        })
    }

    /// Build an agent from configuration, opening a file sink if one is configured
    pub fn from_config(config: &Config) -> eyre::Result<Self> {
        debug!("Agent::from_config: called");
        let sink: Arc<dyn Sink> = match &config.file {
            Some(file) => {
                let policy = file.roll_policy()?;
                let sink = match &file.error_path {
                    Some(error_path) => FileSink::open_with_errors(&file.path, error_path, policy)?,
                    None => FileSink::open(&file.path, policy)?,
                };
                Arc::new(sink.with_format(config.output.line_format(false)))
            }
            None => Arc::new(StreamSink::stdio().with_format(config.output.line_format(true))),
        };
        Ok(Self::with_shared_sink(config.events.clone(), sink, config.dispatch.clone())?)
    }

    // === Registry ===

    /// Register a listener; listeners for one flag run in registration order
    pub fn add_event_listener<F>(&self, flag: impl Into<EventFlag>, listener: F)
    where
        F: Fn(&dyn Sink, &Event) -> eyre::Result<()> + Send + Sync + 'static,
    {
        let flag = flag.into();
        debug!(%flag, "Agent::add_event_listener: called");
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(flag)
            .or_default()
            .push(Arc::new(listener));
    }

    pub fn remove_listeners(&self, flag: impl AsRef<str>) {
        debug!(flag = flag.as_ref(), "Agent::remove_listeners: called");
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(flag.as_ref());
    }

    pub fn has_listener(&self, flag: impl AsRef<str>) -> bool {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(flag.as_ref())
            .is_some_and(|l| !l.is_empty())
    }

    /// Register a listener for failures on the side error channel
    pub fn add_error_listener<F>(&self, listener: F)
    where
        F: Fn(&AgentFailure) + Send + Sync + 'static,
    {
        debug!("Agent::add_error_listener: called");
        self.error_listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    // === Verbosity ===

    pub fn is_enabled(&self, flag: impl AsRef<str>) -> bool {
        self.verbosity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_enabled(flag)
    }

    pub fn set_verbosity(&self, verbosity: EventFlagSet) {
        debug!(%verbosity, "Agent::set_verbosity: called");
        *self.verbosity.write().unwrap_or_else(PoisonError::into_inner) = verbosity;
    }

    pub fn verbosity(&self) -> EventFlagSet {
        self.verbosity.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn enable_event(&self, flag: impl Into<EventFlag>) {
        self.verbosity
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .enable(flag);
    }

    pub fn disable_event(&self, flag: impl Into<EventFlag>) {
        self.verbosity
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .disable(flag);
    }

    // === Emission ===

    /// Raise an event
    ///
    /// Disabled flags return after the verbosity check. Enabled flags without
    /// listeners are not queued.
    pub fn on_event(&self, flag: impl Into<EventFlag>, payload: impl Into<Payload>) {
        let flag = flag.into();
        if !self.should_emit(&flag) {
            return;
        }
        self.dispatch(Event::new(flag, payload), false);
    }

    /// Write a labelled line to the output stream and raise the flag with the message
    pub fn eventf(&self, flag: impl Into<EventFlag>, label: &str, color: Color, message: impl fmt::Display) {
        self.write_event(flag.into(), label, color, Target::Output, message, false);
    }

    /// Like [`Agent::eventf`] but the line goes to the error stream
    pub fn error_eventf(&self, flag: impl Into<EventFlag>, label: &str, color: Color, message: impl fmt::Display) {
        self.write_event(flag.into(), label, color, Target::Error, message, false);
    }

    pub fn infof(&self, message: impl fmt::Display) {
        self.styled(EventFlag::INFO, INFO_STYLE, Target::Output, message, false);
    }

    pub fn debugf(&self, message: impl fmt::Display) {
        self.styled(EventFlag::DEBUG, DEBUG_STYLE, Target::Output, message, false);
    }

    pub fn warningf(&self, message: impl fmt::Display) {
        self.styled(EventFlag::WARNING, WARNING_STYLE, Target::Error, message, false);
    }

    pub fn errorf(&self, message: impl fmt::Display) {
        self.styled(EventFlag::ERROR, ERROR_STYLE, Target::Error, message, false);
    }

    pub fn fatalf(&self, message: impl fmt::Display) {
        self.styled(EventFlag::FATAL, FATAL_STYLE, Target::Error, message, false);
    }

    /// Write an error and its cause chain, then raise `error` with an [`ErrorEvent`]
    pub fn error(&self, err: &dyn StdError) {
        self.write_error(EventFlag::ERROR, ERROR_STYLE, err, false);
    }

    pub fn warning(&self, err: &dyn StdError) {
        self.write_error(EventFlag::WARNING, WARNING_STYLE, err, false);
    }

    pub fn fatal(&self, err: &dyn StdError) {
        self.write_error(EventFlag::FATAL, FATAL_STYLE, err, false);
    }

    /// Pretty-print a value as a debug event
    pub fn debug_dump(&self, value: &dyn fmt::Debug) {
        if self.is_enabled(EventFlag::DEBUG) {
            self.debugf(format_args!("{:#?}", value));
        }
    }

    /// A view of this agent that fires listeners on the calling thread
    pub fn sync(&self) -> SyncAgent<'_> {
        SyncAgent { agent: self }
    }

    // === Lifecycle ===

    pub fn sink(&self) -> &dyn Sink {
        self.sink.as_ref()
    }

    pub fn queue(&self) -> &DispatchQueue {
        &self.queue
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Drain queued events and close the sink; later events are dropped
    pub fn close(&self) -> Result<(), SinkError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        debug!(backlog = self.queue.len(), "Agent::close: called");
        self.queue.drain();
        self.sink.close()
    }

    // === Internals ===

    fn should_emit(&self, flag: &EventFlag) -> bool {
        !self.is_closed() && self.is_enabled(flag)
    }

    fn styled(&self, flag: EventFlag, style: Style, target: Target, message: impl fmt::Display, inline: bool) {
        self.write_event(flag, style.label, style.color, target, message, inline);
    }

    fn write_event(
        &self,
        flag: EventFlag,
        label: &str,
        color: Color,
        target: Target,
        message: impl fmt::Display,
        inline: bool,
    ) {
        if !self.should_emit(&flag) {
            return;
        }
        let message = message.to_string();
        if message.is_empty() {
            return;
        }

        let now = Utc::now();
        let label = self.sink.colorize(label, color);
        self.write_line(&flag, now, target, format_args!("{} {}", label, message));
        self.dispatch(Event::at(flag, now, message), inline);
    }

    fn write_error(&self, flag: EventFlag, style: Style, err: &dyn StdError, inline: bool) {
        if !self.should_emit(&flag) {
            return;
        }
        let now = Utc::now();
        let event = ErrorEvent::from_error(err);
        let label = self.sink.colorize(style.label, style.color);
        self.write_line(&flag, now, Target::Error, format_args!("{} {}", label, event.message));
        for cause in &event.causes {
            self.write_line(&flag, now, Target::Error, format_args!("{} caused by: {}", label, cause));
        }
        self.dispatch(Event::at(flag, now, event), inline);
    }

    fn write_line(&self, flag: &EventFlag, at: DateTime<Utc>, target: Target, args: fmt::Arguments<'_>) {
        let result = match target {
            Target::Output => self.sink.printf_at(at, args),
            Target::Error => self.sink.errorf_at(at, args),
        };
        if let Err(source) = result {
            report(
                &self.error_listeners,
                AgentFailure::SinkWrite {
                    flag: flag.clone(),
                    source,
                },
            );
        }
    }

    fn snapshot(&self, flag: &EventFlag) -> Option<Vec<Listener>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(flag)
            .filter(|l| !l.is_empty())
            .cloned()
    }

    fn dispatch(&self, event: Event, inline: bool) {
        let Some(listeners) = self.snapshot(&event.flag) else {
            return;
        };

        if inline {
            fire(&listeners, self.sink.as_ref(), &event, &self.error_listeners);
            return;
        }

        let sink = Arc::clone(&self.sink);
        let error_listeners = Arc::clone(&self.error_listeners);
        let flag = event.flag.clone();
        let task = Box::new(move || fire(&listeners, sink.as_ref(), &event, &error_listeners));
        if let Err(e) = self.queue.enqueue(task) {
            debug!(%flag, error = %e, "Agent::dispatch: event dropped");
        }
    }
}

/// Invoke each listener, isolating failures from one another
fn fire(listeners: &[Listener], sink: &dyn Sink, event: &Event, error_listeners: &ErrorListeners) {
    for listener in listeners {
        let failure = match panic::catch_unwind(AssertUnwindSafe(|| listener(sink, event))) {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => AgentFailure::ListenerFailed {
                flag: event.flag.clone(),
                message: format!("{:#}", e),
            },
            Err(payload) => AgentFailure::ListenerPanicked {
                flag: event.flag.clone(),
                message: panic_message(payload.as_ref()),
            },
        };
        report(error_listeners, failure);
    }
}

/// Send a failure to the log and to every error listener, never to the queue
fn report(error_listeners: &ErrorListeners, failure: AgentFailure) {
    error!(flag = %failure.flag(), error = %failure, "Agent: failure");
    let listeners = error_listeners.read().unwrap_or_else(PoisonError::into_inner).clone();
    for listener in listeners {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(&failure))) {
            error!(panic = %panic_message(payload.as_ref()), "Agent: error listener panicked");
        }
    }
}

/// An agent view that runs listeners inline on the calling thread
///
/// Useful when the caller must observe the effects of its own events before
/// continuing. Verbosity, registry and sink are shared with the agent.
#[derive(Clone, Copy)]
pub struct SyncAgent<'a> {
    agent: &'a Agent,
}

impl SyncAgent<'_> {
    pub fn on_event(&self, flag: impl Into<EventFlag>, payload: impl Into<Payload>) {
        let flag = flag.into();
        if !self.agent.should_emit(&flag) {
            return;
        }
        self.agent.dispatch(Event::new(flag, payload), true);
    }

    pub fn eventf(&self, flag: impl Into<EventFlag>, label: &str, color: Color, message: impl fmt::Display) {
        self.agent
            .write_event(flag.into(), label, color, Target::Output, message, true);
    }

    pub fn infof(&self, message: impl fmt::Display) {
        self.agent
            .styled(EventFlag::INFO, INFO_STYLE, Target::Output, message, true);
    }

    pub fn debugf(&self, message: impl fmt::Display) {
        self.agent
            .styled(EventFlag::DEBUG, DEBUG_STYLE, Target::Output, message, true);
    }

    pub fn warningf(&self, message: impl fmt::Display) {
        self.agent
            .styled(EventFlag::WARNING, WARNING_STYLE, Target::Error, message, true);
    }

    pub fn errorf(&self, message: impl fmt::Display) {
        self.agent
            .styled(EventFlag::ERROR, ERROR_STYLE, Target::Error, message, true);
    }

    pub fn fatalf(&self, message: impl fmt::Display) {
        self.agent
            .styled(EventFlag::FATAL, FATAL_STYLE, Target::Error, message, true);
    }

    pub fn error(&self, err: &dyn StdError) {
        self.agent.write_error(EventFlag::ERROR, ERROR_STYLE, err, true);
    }
}
