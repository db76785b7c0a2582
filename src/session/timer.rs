//! Re-verification timer and session control channel.
//!
//! The control thread blocks on a single channel of [`SessionSignal`]s. The
//! timer thread and the Ctrl+C handler both send into it. Each arming of the
//! timer gets a new generation number so a firing that raced with a cancel
//! or a re-arm can be recognised and dropped.

use crossbeam_channel::{after, bounded, select, unbounded, Receiver, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

/// Message delivered to the session control thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    TimerFired { generation: u64 },
    Cancel,
}

/// The channel a session is driven from.
#[derive(Debug)]
pub struct SessionControl {
    sender: Sender<SessionSignal>,
    receiver: Receiver<SessionSignal>,
}

impl SessionControl {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Handle for cancelling the session from another thread.
    pub fn canceller(&self) -> SessionCanceller {
        SessionCanceller {
            sender: self.sender.clone(),
        }
    }

    pub(crate) fn sender(&self) -> Sender<SessionSignal> {
        self.sender.clone()
    }

    /// Block until the next signal.
    pub(crate) fn recv(&self) -> Option<SessionSignal> {
        self.receiver.recv().ok()
    }

    /// Drain pending signals and report whether a cancel was among them.
    pub(crate) fn take_cancel(&self) -> bool {
        let mut cancelled = false;
        while let Ok(signal) = self.receiver.try_recv() {
            if signal == SessionSignal::Cancel {
                cancelled = true;
            }
        }
        cancelled
    }
}

impl Default for SessionControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable cancel handle, safe to move into a signal handler.
#[derive(Debug, Clone)]
pub struct SessionCanceller {
    sender: Sender<SessionSignal>,
}

impl SessionCanceller {
    /// Request cancellation. Returns false if the session is already gone.
    pub fn cancel(&self) -> bool {
        self.sender.send(SessionSignal::Cancel).is_ok()
    }
}

/// One-shot timer that re-arms only when asked.
#[derive(Debug)]
pub struct ReverifyTimer {
    signals: Sender<SessionSignal>,
    generation: u64,
    armed: Option<ArmedTimer>,
}

#[derive(Debug)]
struct ArmedTimer {
    // Dropping this sender wakes the timer thread.
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl ReverifyTimer {
    pub fn new(signals: Sender<SessionSignal>) -> Self {
        Self {
            signals,
            generation: 0,
            armed: None,
        }
    }

    /// Arm the timer, replacing any earlier arming. Returns its generation.
    pub fn schedule(&mut self, interval: Duration) -> u64 {
        self.cancel();
        self.generation += 1;

        let generation = self.generation;
        let signals = self.signals.clone();
        let (stop, stopped) = bounded::<()>(1);

        let handle = std::thread::spawn(move || {
            select! {
                recv(stopped) -> _ => {}
                recv(after(interval)) -> _ => {
                    let _ = signals.send(SessionSignal::TimerFired { generation });
                }
            }
        });

        tracing::debug!(generation, ?interval, "re-verification timer armed");
        self.armed = Some(ArmedTimer { stop, handle });
        generation
    }

    /// Disarm the timer. A firing already in the channel stays there and is
    /// recognised as stale by its generation.
    pub fn cancel(&mut self) {
        if let Some(armed) = self.armed.take() {
            drop(armed.stop);
            let _ = armed.handle.join();
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Whether a firing belongs to the live arming of this timer.
    pub fn is_current(&self, generation: u64) -> bool {
        self.is_armed() && generation == self.generation
    }
}

impl Drop for ReverifyTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_fires_with_generation() {
        let control = SessionControl::new();
        let mut timer = ReverifyTimer::new(control.sender());

        let generation = timer.schedule(Duration::from_millis(10));
        assert_eq!(generation, 1);
        assert_eq!(
            control.recv(),
            Some(SessionSignal::TimerFired { generation: 1 })
        );
        assert!(timer.is_current(1));
    }

    #[test]
    fn test_cancelled_timer_does_not_fire() {
        let control = SessionControl::new();
        let mut timer = ReverifyTimer::new(control.sender());

        timer.schedule(Duration::from_millis(50));
        timer.cancel();
        assert!(!timer.is_armed());

        std::thread::sleep(Duration::from_millis(100));
        assert!(control.receiver.try_recv().is_err());
    }

    #[test]
    fn test_rearm_makes_old_generation_stale() {
        let control = SessionControl::new();
        let mut timer = ReverifyTimer::new(control.sender());

        timer.schedule(Duration::from_secs(60));
        let second = timer.schedule(Duration::from_millis(10));
        assert_eq!(second, 2);
        assert!(!timer.is_current(1));

        assert_eq!(
            control.recv(),
            Some(SessionSignal::TimerFired { generation: 2 })
        );
    }

    #[test]
    fn test_canceller_delivers_cancel() {
        let control = SessionControl::new();
        let canceller = control.canceller();

        let handle = std::thread::spawn(move || canceller.cancel());
        assert!(handle.join().unwrap());
        assert_eq!(control.recv(), Some(SessionSignal::Cancel));
    }

    #[test]
    fn test_take_cancel_drains() {
        let control = SessionControl::new();
        assert!(!control.take_cancel());

        control
            .sender()
            .send(SessionSignal::TimerFired { generation: 7 })
            .unwrap();
        control.canceller().cancel();
        assert!(control.take_cancel());
        assert!(!control.take_cancel());
    }
}
