//! Key timing event types for the KeyTrust agent.
//!
//! Platform collectors produce [`KeyboardEvent`]s (one per key-down or key-up).
//! Feature extraction works on [`KeyStroke`]s, which pair a press with its release.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// A single key-down or key-up event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyboardEvent {
    /// Timestamp when the event occurred
    pub timestamp: DateTime<Utc>,
    /// Whether this is a key press (true) or release (false)
    pub is_key_down: bool,
    /// Character produced by the key, `None` for modifiers and other special keys
    pub key: Option<char>,
}

impl KeyboardEvent {
    pub fn new(key: Option<char>, is_key_down: bool) -> Self {
        Self {
            timestamp: Utc::now(),
            is_key_down,
            key,
        }
    }

    /// Create an event at an explicit time.
    pub fn at(key: Option<char>, is_key_down: bool, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            is_key_down,
            key,
        }
    }
}

/// One typed character: which key, when it went down, when it came back up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyStroke {
    pub key: char,
    pub pressed_at: DateTime<Utc>,
    pub released_at: DateTime<Utc>,
}

impl KeyStroke {
    pub fn new(key: char, pressed_at: DateTime<Utc>, released_at: DateTime<Utc>) -> Self {
        Self {
            key,
            pressed_at,
            released_at,
        }
    }
}

/// Pair raw key events into strokes.
///
/// Each release is matched with the earliest unmatched press of the same key.
/// Events without a character are skipped, releases without a press are ignored
/// and presses that are never released are dropped. The result is ordered by
/// press time.
pub fn pair_strokes(events: &[KeyboardEvent]) -> Vec<KeyStroke> {
    let mut pending: HashMap<char, VecDeque<DateTime<Utc>>> = HashMap::new();
    let mut strokes = Vec::new();

    for event in events {
        let Some(key) = event.key else {
            continue;
        };

        if event.is_key_down {
            pending.entry(key).or_default().push_back(event.timestamp);
        } else if let Some(pressed_at) = pending.get_mut(&key).and_then(|q| q.pop_front()) {
            strokes.push(KeyStroke::new(key, pressed_at, event.timestamp));
        }
    }

    strokes.sort_by_key(|s| s.pressed_at);
    strokes
}
