//! Event source boundary and an in-memory stream.

use auditview_core::AuditEvent;

/// A lazy sequence of audit events
pub trait EventSource {
    /// Pull the next event.
    ///
    /// `Ok(None)` marks the end of the sequence and is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the next event cannot be produced.
    fn next_event(&mut self) -> Result<Option<AuditEvent>, SourceError>;
}

impl<S: EventSource + ?Sized> EventSource for Box<S> {
    fn next_event(&mut self) -> Result<Option<AuditEvent>, SourceError> {
        (**self).next_event()
    }
}

impl<S: EventSource + ?Sized> EventSource for &mut S {
    fn next_event(&mut self) -> Result<Option<AuditEvent>, SourceError> {
        (**self).next_event()
    }
}

/// Event source errors
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Reading the underlying input failed
    #[error("failed to read audit events: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be decoded
    #[error("invalid audit event on line {line}: {source}")]
    Decode {
        /// 1-based line number of the record
        line: usize,
        /// Decoder error
        source: serde_json::Error,
    },

    /// The remote end refused or failed the request
    #[error("failed to fetch audit events: {0}")]
    Fetch(String),
}

/// Event source over events already held in memory
pub struct EventStream {
    events: std::vec::IntoIter<AuditEvent>,
}

impl EventStream {
    /// Yield `events` in order
    pub fn new(events: Vec<AuditEvent>) -> Self {
        Self {
            events: events.into_iter(),
        }
    }
}

impl EventSource for EventStream {
    fn next_event(&mut self) -> Result<Option<AuditEvent>, SourceError> {
        Ok(self.events.next())
    }
}
