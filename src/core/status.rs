//! Where progress and problems from a generation get reported.

use tracing::{info, warn};

use crate::core::error::ErrorKind;

/// Where the session coordinator reports progress. Fire-and-forget.
pub trait StatusSink {
    fn status(&mut self, message: &str);
    fn error(&mut self, kind: ErrorKind, message: &str);
    /// Non-fatal conditions, e.g. the document changed during generation.
    fn notice(&mut self, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    Status(String),
    Error(ErrorKind, String),
    Notice(String),
}

/// Keeps every report in order; handy for tests and for front ends that render later.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<StatusEvent>,
}

impl RecordingSink {
    pub fn notices(&self) -> impl Iterator<Item = &str> {
        self.events.iter().filter_map(|event| match event {
            StatusEvent::Notice(message) => Some(message.as_str()),
            _ => None,
        })
    }

    pub fn last_status(&self) -> Option<&str> {
        self.events.iter().rev().find_map(|event| match event {
            StatusEvent::Status(message) => Some(message.as_str()),
            _ => None,
        })
    }
}

impl StatusSink for RecordingSink {
    fn status(&mut self, message: &str) {
        self.events.push(StatusEvent::Status(message.to_string()));
    }

    fn error(&mut self, kind: ErrorKind, message: &str) {
        self.events
            .push(StatusEvent::Error(kind, message.to_string()));
    }

    fn notice(&mut self, message: &str) {
        self.events.push(StatusEvent::Notice(message.to_string()));
    }
}

/// Sends reports to the tracing subscriber only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn status(&mut self, message: &str) {
        info!(target: "ai_writer::status", "{message}");
    }

    fn error(&mut self, kind: ErrorKind, message: &str) {
        warn!(target: "ai_writer::status", %kind, "{message}");
    }

    fn notice(&mut self, message: &str) {
        info!(target: "ai_writer::status", notice = true, "{message}");
    }
}
