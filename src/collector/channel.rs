//! Capture source fed by a platform collector over a crossbeam channel.
//!
//! A platform hook pushes [`KeyboardEvent`]s into the channel; `capture`
//! collects them until the user presses Enter, stops typing for
//! `idle_finish`, or `timeout` expires, then pairs them into strokes.

use crate::collector::types::{pair_strokes, KeyboardEvent};
use crate::collector::{CaptureError, KeyStroke, KeystrokeSource};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::io::BufRead;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Key that ends a phrase.
const FINISH_KEY: char = '\n';

/// Timing limits for one capture.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Upper bound on the whole capture
    pub timeout: Duration,
    /// Silence after the first key that ends the capture
    pub idle_finish: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(90),
            idle_finish: Duration::from_secs(5),
        }
    }
}

impl CaptureConfig {
    /// Take the overall timeout from the agent configuration.
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            timeout: config.capture_timeout,
            ..Self::default()
        }
    }
}

pub struct ChannelCapture {
    config: CaptureConfig,
    receiver: Receiver<KeyboardEvent>,
}

impl ChannelCapture {
    pub fn new(config: CaptureConfig, receiver: Receiver<KeyboardEvent>) -> Self {
        Self { config, receiver }
    }

    /// Collect raw events for one phrase.
    fn collect(&self) -> Result<Vec<KeyboardEvent>, CaptureError> {
        // Keys typed before the prompt belong to nobody.
        while self.receiver.try_recv().is_ok() {}

        let deadline = Instant::now() + self.config.timeout;
        let mut events = Vec::new();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let wait = if events.is_empty() {
                remaining
            } else {
                remaining.min(self.config.idle_finish)
            };

            match self.receiver.recv_timeout(wait) {
                Ok(event) => {
                    if event.key == Some(FINISH_KEY) {
                        if event.is_key_down {
                            break;
                        }
                        continue;
                    }
                    events.push(event);
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    if events.is_empty() {
                        return Err(CaptureError::Disconnected);
                    }
                    break;
                }
            }
        }

        Ok(events)
    }
}

impl KeystrokeSource for ChannelCapture {
    fn capture(&mut self, phrase: &str) -> Result<Vec<KeyStroke>, CaptureError> {
        tracing::debug!(phrase, "waiting for keyboard events");
        let events = self.collect()?;
        let strokes = pair_strokes(&events);
        if strokes.is_empty() {
            return Err(CaptureError::NoData);
        }
        tracing::debug!(events = events.len(), strokes = strokes.len(), "capture complete");
        Ok(strokes)
    }
}

/// Forward a JSON Lines feed of [`KeyboardEvent`]s into `sender` from a
/// background thread.
///
/// This is how an external key hook (writing to a pipe or FIFO) reaches a
/// [`ChannelCapture`]. Lines that do not parse are skipped. The thread ends at
/// end of input or once the receiving side is gone, which the capture then
/// sees as a disconnected feed.
pub fn spawn_event_reader<R>(reader: R, sender: Sender<KeyboardEvent>) -> JoinHandle<()>
where
    R: BufRead + Send + 'static,
{
    std::thread::spawn(move || {
        for (number, line) in reader.lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("keyboard event feed read failed: {e}");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<KeyboardEvent>(&line) {
                Ok(event) => {
                    if sender.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!(line = number + 1, "skipping malformed key event: {e}"),
            }
        }
        tracing::debug!("keyboard event feed closed");
    })
}
