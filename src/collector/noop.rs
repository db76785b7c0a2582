//! Capture source for platforms without a keyboard collector.
//!
//! Every capture reports [`CaptureError::Unavailable`], which the session
//! machine treats as "no data": verification fails and active sessions lock.

use crate::collector::{CaptureError, KeyStroke, KeystrokeSource};

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCapture;

impl NoopCapture {
    pub fn new() -> Self {
        Self
    }
}

impl KeystrokeSource for NoopCapture {
    fn capture(&mut self, phrase: &str) -> Result<Vec<KeyStroke>, CaptureError> {
        tracing::debug!(phrase, "noop capture: no collector on this platform");
        Err(CaptureError::Unavailable)
    }
}
