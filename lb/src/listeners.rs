//! Typed listener adapters
//!
//! Each adapter wraps a closure that takes one payload type and returns a
//! listener for [`Agent::add_event_listener`](crate::Agent::add_event_listener).
//! Events carrying a different payload are ignored.

use chrono::{DateTime, Utc};

use crate::payload::{ErrorEvent, Event, Payload, RequestCompleteEvent, RequestEvent};
use crate::sink::Sink;

pub fn request_listener<F>(f: F) -> impl Fn(&dyn Sink, &Event) -> eyre::Result<()> + Send + Sync + 'static
where
    F: Fn(&dyn Sink, DateTime<Utc>, &RequestEvent) -> eyre::Result<()> + Send + Sync + 'static,
{
    move |sink: &dyn Sink, event: &Event| match &event.payload {
        Payload::Request(request) => f(sink, event.timestamp, request),
        _ => Ok(()),
    }
}

pub fn request_complete_listener<F>(f: F) -> impl Fn(&dyn Sink, &Event) -> eyre::Result<()> + Send + Sync + 'static
where
    F: Fn(&dyn Sink, DateTime<Utc>, &RequestCompleteEvent) -> eyre::Result<()> + Send + Sync + 'static,
{
    move |sink: &dyn Sink, event: &Event| match &event.payload {
        Payload::RequestComplete(complete) => f(sink, event.timestamp, complete),
        _ => Ok(()),
    }
}

/// Request and response bodies
pub fn body_listener<F>(f: F) -> impl Fn(&dyn Sink, &Event) -> eyre::Result<()> + Send + Sync + 'static
where
    F: Fn(&dyn Sink, DateTime<Utc>, &[u8]) -> eyre::Result<()> + Send + Sync + 'static,
{
    move |sink: &dyn Sink, event: &Event| match &event.payload {
        Payload::Body(body) => f(sink, event.timestamp, body),
        _ => Ok(()),
    }
}

pub fn error_listener<F>(f: F) -> impl Fn(&dyn Sink, &Event) -> eyre::Result<()> + Send + Sync + 'static
where
    F: Fn(&dyn Sink, DateTime<Utc>, &ErrorEvent) -> eyre::Result<()> + Send + Sync + 'static,
{
    move |sink: &dyn Sink, event: &Event| match &event.payload {
        Payload::Error(error) => f(sink, event.timestamp, error),
        _ => Ok(()),
    }
}

/// Plain text messages, as raised by `infof`, `errorf` and friends
pub fn message_listener<F>(f: F) -> impl Fn(&dyn Sink, &Event) -> eyre::Result<()> + Send + Sync + 'static
where
    F: Fn(&dyn Sink, DateTime<Utc>, &str) -> eyre::Result<()> + Send + Sync + 'static,
{
    move |sink: &dyn Sink, event: &Event| match &event.payload {
        Payload::Message(message) => f(sink, event.timestamp, message),
        _ => Ok(()),
    }
}
