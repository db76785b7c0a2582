//! Security event reporting for the KeyTrust agent.
//!
//! The session machine decides *what* happened; an [`EventSink`] decides where
//! it goes. [`SecurityLog`] is the sink the binary uses: a JSONL file plus
//! in-process counters.

pub mod event;
pub mod log;

// Re-export commonly used types
pub use event::{EventLevel, SecurityEvent};
pub use log::{
    create_shared_log_with_file, last_scored_event, read_events, read_tail, LogStats, SecurityLog,
    SharedSecurityLog,
};

use std::sync::Arc;

/// Destination for security events.
///
/// A failing sink never changes an authentication decision; callers log the
/// error and carry on.
pub trait EventSink {
    fn emit(&self, event: &SecurityEvent) -> Result<(), SinkError>;
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn emit(&self, event: &SecurityEvent) -> Result<(), SinkError> {
        (**self).emit(event)
    }
}

impl<T: EventSink + ?Sized> EventSink for &T {
    fn emit(&self, event: &SecurityEvent) -> Result<(), SinkError> {
        (**self).emit(event)
    }
}

/// Errors that can occur while writing security events.
#[derive(Debug)]
pub enum SinkError {
    Io(String),
    Serialize(String),
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Io(e) => write!(f, "Security log IO error: {e}"),
            SinkError::Serialize(e) => write!(f, "Security log serialization error: {e}"),
        }
    }
}

impl std::error::Error for SinkError {}
