//! Keystroke capture for the KeyTrust agent.
//!
//! OS-level key hooks live outside this crate. This module defines the seam the
//! rest of the agent talks to ([`KeystrokeSource`]) and a few sources built on it:
//! a channel-fed source for platform collectors, a replay source for recorded
//! phrases, and a noop source for platforms without a collector.

pub mod channel;
pub mod noop;
pub mod replay;
pub mod types;

pub use channel::{spawn_event_reader, CaptureConfig, ChannelCapture};
pub use noop::NoopCapture;
pub use replay::ReplayCapture;
pub use types::{pair_strokes, KeyStroke, KeyboardEvent};

/// A blocking source of typed phrases.
///
/// `capture` waits until the user has typed `phrase` (or the source gives up)
/// and returns the strokes in typing order. An empty result is reported as
/// [`CaptureError::NoData`] rather than `Ok(vec![])`.
pub trait KeystrokeSource {
    fn capture(&mut self, phrase: &str) -> Result<Vec<KeyStroke>, CaptureError>;
}

impl<S: KeystrokeSource + ?Sized> KeystrokeSource for Box<S> {
    fn capture(&mut self, phrase: &str) -> Result<Vec<KeyStroke>, CaptureError> {
        (**self).capture(phrase)
    }
}

/// Errors that can occur during capture.
#[derive(Debug)]
pub enum CaptureError {
    /// The user typed nothing usable before the source gave up
    NoData,
    /// The event feed was closed
    Disconnected,
    /// No collector exists on this platform
    Unavailable,
    /// A recording could not be read
    Io(String),
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::NoData => write!(f, "No keystroke data captured"),
            CaptureError::Disconnected => write!(f, "Keyboard event feed disconnected"),
            CaptureError::Unavailable => {
                write!(f, "Keystroke capture is not available on this platform")
            }
            CaptureError::Io(e) => write!(f, "Capture IO error: {e}"),
        }
    }
}

impl std::error::Error for CaptureError {}
