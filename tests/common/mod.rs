//! Shared helpers for integration tests.

#![allow(dead_code)]

use chrono::{Duration, Utc};
use keytrust_agent::collector::{CaptureError, KeyStroke, KeystrokeSource};
use keytrust_agent::session::SessionCanceller;
use keytrust_agent::Config;
use std::collections::VecDeque;
use std::path::Path;

pub const PHRASE: &str = "zero trust systems rely on continuous verification";
pub const REVERIFY_PHRASE: &str = "trust no one verify always";

/// Strokes for `text` typed with a fixed dwell and release-to-press gap (ms).
pub fn typed(text: &str, dwell_ms: i64, flight_ms: i64) -> Vec<KeyStroke> {
    let mut at = Utc::now();
    text.chars()
        .map(|key| {
            let stroke = KeyStroke::new(key, at, at + Duration::milliseconds(dwell_ms));
            at = stroke.released_at + Duration::milliseconds(flight_ms);
            stroke
        })
        .collect()
}

/// The registered user: 90 ms dwell, 180 ms flight.
pub fn owner(text: &str) -> Vec<KeyStroke> {
    typed(text, 90, 180)
}

/// Someone else: slower and heavier on the keys.
pub fn impostor(text: &str) -> Vec<KeyStroke> {
    typed(text, 140, 350)
}

pub fn test_config(data_dir: &Path) -> Config {
    Config {
        data_path: data_dir.to_path_buf(),
        ..Config::default()
    }
}

/// What a scripted capture does when called.
pub enum Step {
    Type(Vec<KeyStroke>),
    Nothing,
    /// Cancel the session, then hand back the strokes
    CancelThenType(SessionCanceller, Vec<KeyStroke>),
}

/// Capture source that plays a fixed script and records the phrases asked for.
pub struct ScriptedSource {
    steps: VecDeque<Step>,
    pub prompts: Vec<String>,
}

impl ScriptedSource {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            prompts: Vec::new(),
        }
    }
}

impl KeystrokeSource for ScriptedSource {
    fn capture(&mut self, phrase: &str) -> Result<Vec<KeyStroke>, CaptureError> {
        self.prompts.push(phrase.to_string());
        match self.steps.pop_front() {
            Some(Step::Type(strokes)) => Ok(strokes),
            Some(Step::CancelThenType(canceller, strokes)) => {
                canceller.cancel();
                Ok(strokes)
            }
            Some(Step::Nothing) | None => Err(CaptureError::NoData),
        }
    }
}
