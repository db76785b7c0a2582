//! Replay of recorded phrases.
//!
//! A recording file is a JSON array of phrases, each phrase an array of
//! [`KeyStroke`]s. Every call to `capture` consumes the next phrase; once the
//! recording is exhausted the source reports [`CaptureError::NoData`].

use crate::collector::{CaptureError, KeyStroke, KeystrokeSource};
use std::collections::VecDeque;
use std::path::Path;

#[derive(Debug, Default, Clone)]
pub struct ReplayCapture {
    recordings: VecDeque<Vec<KeyStroke>>,
}

impl ReplayCapture {
    pub fn new(recordings: impl IntoIterator<Item = Vec<KeyStroke>>) -> Self {
        Self {
            recordings: recordings.into_iter().collect(),
        }
    }

    /// Load recordings from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, CaptureError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| CaptureError::Io(e.to_string()))?;
        let recordings: Vec<Vec<KeyStroke>> =
            serde_json::from_str(&content).map_err(|e| CaptureError::Io(e.to_string()))?;
        Ok(Self::new(recordings))
    }

    /// Number of phrases left to play back.
    pub fn remaining(&self) -> usize {
        self.recordings.len()
    }
}

impl KeystrokeSource for ReplayCapture {
    fn capture(&mut self, phrase: &str) -> Result<Vec<KeyStroke>, CaptureError> {
        match self.recordings.pop_front() {
            Some(strokes) if !strokes.is_empty() => {
                tracing::debug!(phrase, strokes = strokes.len(), "replaying recorded phrase");
                Ok(strokes)
            }
            _ => Err(CaptureError::NoData),
        }
    }
}
