//! Error types for the diagnostics bus

use std::io;

use rollfile::RollError;
use thiserror::Error;

use crate::flags::EventFlag;

/// Errors returned by sinks
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Rolling file error: {0}")]
    Roll(#[from] RollError),
}

impl SinkError {
    /// Check if the sink can no longer accept writes
    pub fn is_terminal(&self) -> bool {
        match self {
            SinkError::Roll(e) => e.is_terminal(),
            SinkError::Io(_) => false,
        }
    }
}

/// Errors returned by the dispatch queue
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Dispatch queue is closed")]
    Closed,

    #[error("Failed to spawn dispatch worker: {0}")]
    Spawn(#[source] io::Error),
}

/// Error returned for a malformed verbosity specification
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FlagSetParseError {
    #[error("Empty flag name after '-' in event specification '{spec}'")]
    EmptyFlag { spec: String },
}

/// A failure reported on the agent's error channel
///
/// These never travel through the dispatch queue, so reporting one cannot
/// trigger further events.
#[derive(Debug, Error)]
pub enum AgentFailure {
    #[error("Listener for '{flag}' failed: {message}")]
    ListenerFailed { flag: EventFlag, message: String },

    #[error("Listener for '{flag}' panicked: {message}")]
    ListenerPanicked { flag: EventFlag, message: String },

    #[error("Sink write for '{flag}' failed: {source}")]
    SinkWrite {
        flag: EventFlag,
        #[source]
        source: SinkError,
    },
}

impl AgentFailure {
    /// The event flag being handled when the failure happened
    pub fn flag(&self) -> &EventFlag {
        match self {
            AgentFailure::ListenerFailed { flag, .. }
            | AgentFailure::ListenerPanicked { flag, .. }
            | AgentFailure::SinkWrite { flag, .. } => flag,
        }
    }

    /// Check if the failure came from a listener rather than the sink
    pub fn is_listener_failure(&self) -> bool {
        matches!(
            self,
            AgentFailure::ListenerFailed { .. } | AgentFailure::ListenerPanicked { .. }
        )
    }
}
