//! Session state machine.
//!
//! Wraps the pure transition table with the session identity and the
//! re-verification counter, and turns requested effects into concrete actions
//! with fully formed security events.

use crate::audit::{EventLevel, SecurityEvent};
use crate::session::state::{transition, Effect, SessionState, TransitionError, Trigger};
use uuid::Uuid;

/// Work the driver has to carry out after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Capture and score the phrase for the current state
    Capture,
    /// Record a security event
    Emit(SecurityEvent),
    /// Arm the re-verification timer
    ScheduleReverify,
    /// Disarm the re-verification timer
    CancelReverify,
}

/// One authentication session, from IDLE to its final state.
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    id: Uuid,
    state: SessionState,
    /// Re-verifications started so far
    rechecks: u32,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Idle,
            rechecks: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn rechecks(&self) -> u32 {
        self.rechecks
    }

    /// Apply a trigger. On error the state is unchanged.
    pub fn apply(&mut self, trigger: Trigger) -> Result<Vec<SessionAction>, TransitionError> {
        let from = self.state;
        let next = transition(from, &trigger)?;

        if from == SessionState::SessionActive && next.to == SessionState::ReVerifying {
            self.rechecks += 1;
        }
        self.state = next.to;

        if from != next.to {
            tracing::debug!(
                session = %self.id,
                %from,
                to = %next.to,
                trigger = trigger.name(),
                "session transition"
            );
        }

        Ok(next
            .effects
            .into_iter()
            .map(|effect| match effect {
                Effect::Capture => SessionAction::Capture,
                Effect::Log(level) => SessionAction::Emit(self.event(from, level, &trigger)),
                Effect::StartTimer => SessionAction::ScheduleReverify,
                Effect::StopTimer => SessionAction::CancelReverify,
            })
            .collect())
    }

    fn event(&self, from: SessionState, level: EventLevel, trigger: &Trigger) -> SecurityEvent {
        let n = self.rechecks;
        let reverifying = from == SessionState::ReVerifying;

        let message = match (level, trigger) {
            (EventLevel::Info, _) if reverifying => format!("Re-verification #{n} passed"),
            (EventLevel::Info, _) => "Login successful".to_string(),
            (EventLevel::Warn, _) => "No keystroke data captured during login".to_string(),
            (EventLevel::Alert, Trigger::NoData) if reverifying => {
                format!("Re-verification #{n} failed - no keystroke data")
            }
            (EventLevel::Alert, Trigger::NoData) => "Login failed - no behavioral data".to_string(),
            (EventLevel::Alert, _) if reverifying => {
                format!("Re-verification #{n} failed - behavioral mismatch")
            }
            (EventLevel::Alert, _) => "Login failed - behavioral mismatch".to_string(),
            (EventLevel::Lock, _) => format!("Session locked after re-verification #{n}"),
            (EventLevel::Exit, _) => {
                format!("Session terminated by user after {n} re-verifications")
            }
        };

        let event = SecurityEvent::new(level, message).with_session(self.id);
        match trigger {
            Trigger::Scored {
                risk, threshold, ..
            } => event.with_score(*risk, *threshold),
            _ => event,
        }
    }
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
