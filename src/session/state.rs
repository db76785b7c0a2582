//! Session states and the transition table.
//!
//! [`transition`] is a pure function: it takes the current state and a
//! trigger and returns the next state together with the side effects the
//! caller has to perform. It never performs them itself.

use crate::audit::EventLevel;
use crate::core::risk::RiskStatus;
use serde::{Deserialize, Serialize};

/// Lifecycle state of one authentication session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Idle,
    Verifying,
    Trusted,
    Suspicious,
    SessionActive,
    ReVerifying,
    Locked,
}

impl SessionState {
    /// No trigger is accepted once a session has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Suspicious | SessionState::Locked)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "IDLE",
            SessionState::Verifying => "VERIFYING",
            SessionState::Trusted => "TRUSTED",
            SessionState::Suspicious => "SUSPICIOUS",
            SessionState::SessionActive => "SESSION_ACTIVE",
            SessionState::ReVerifying => "RE_VERIFYING",
            SessionState::Locked => "LOCKED",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that happened to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    /// The caller asked for a verification
    StartVerification,
    /// A captured phrase was scored
    Scored {
        status: RiskStatus,
        risk: f64,
        threshold: f64,
    },
    /// The capture produced nothing usable
    NoData,
    /// The caller asked to enter continuous session mode
    EnterSession,
    /// The re-verification timer fired
    TimerFired,
    /// The user cancelled (Ctrl+C)
    Cancel,
}

impl Trigger {
    pub fn name(&self) -> &'static str {
        match self {
            Trigger::StartVerification => "start verification",
            Trigger::Scored { .. } => "capture scored",
            Trigger::NoData => "no data",
            Trigger::EnterSession => "enter session",
            Trigger::TimerFired => "timer fired",
            Trigger::Cancel => "cancel",
        }
    }
}

/// Side effect requested by a transition, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Capture and score a phrase
    Capture,
    /// Record a security event at this level
    Log(EventLevel),
    /// Arm the re-verification timer
    StartTimer,
    /// Disarm the re-verification timer
    StopTimer,
}

/// Result of an accepted trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub to: SessionState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn new(to: SessionState, effects: Vec<Effect>) -> Self {
        Self { to, effects }
    }
}

/// Compute the next state for `trigger` in `from`.
pub fn transition(from: SessionState, trigger: &Trigger) -> Result<Transition, TransitionError> {
    use Effect::*;
    use EventLevel::*;
    use SessionState::*;

    if from.is_terminal() {
        return Err(TransitionError::Terminal(from));
    }

    let next = match (from, trigger) {
        (Idle, Trigger::StartVerification) => Transition::new(Verifying, vec![Capture]),

        (Verifying, Trigger::Scored { status, .. }) => match status {
            RiskStatus::Trusted => Transition::new(Trusted, vec![Log(Info)]),
            RiskStatus::Suspicious => Transition::new(Suspicious, vec![Log(Alert)]),
        },
        (Verifying, Trigger::NoData) => Transition::new(Suspicious, vec![Log(Warn), Log(Alert)]),
        (Verifying, Trigger::Cancel) => Transition::new(Idle, Vec::new()),

        (Trusted, Trigger::EnterSession) => Transition::new(SessionActive, vec![StartTimer]),

        (SessionActive, Trigger::TimerFired) => Transition::new(ReVerifying, vec![Capture]),

        (ReVerifying, Trigger::Scored { status, .. }) => match status {
            RiskStatus::Trusted => Transition::new(SessionActive, vec![Log(Info), StartTimer]),
            RiskStatus::Suspicious => Transition::new(Locked, vec![Log(Alert), Log(Lock)]),
        },
        (ReVerifying, Trigger::NoData) => Transition::new(Locked, vec![Log(Alert), Log(Lock)]),
        // A late firing while a re-check is already running.
        (ReVerifying, Trigger::TimerFired) => Transition::new(ReVerifying, Vec::new()),

        (SessionActive | ReVerifying, Trigger::Cancel) => {
            Transition::new(Idle, vec![Log(Exit), StopTimer])
        }

        (from, trigger) => {
            return Err(TransitionError::Invalid {
                from,
                trigger: trigger.name(),
            })
        }
    };

    Ok(next)
}

/// A trigger that the current state does not accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The session already ended in SUSPICIOUS or LOCKED
    Terminal(SessionState),
    /// The trigger is not defined for this state
    Invalid {
        from: SessionState,
        trigger: &'static str,
    },
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitionError::Terminal(state) => {
                write!(f, "Session is in terminal state {state}; start a new session")
            }
            TransitionError::Invalid { from, trigger } => {
                write!(f, "Invalid transition: '{trigger}' in state {from}")
            }
        }
    }
}

impl std::error::Error for TransitionError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(status: RiskStatus) -> Trigger {
        Trigger::Scored {
            status,
            risk: 0.1,
            threshold: 0.1,
        }
    }

    fn to(from: SessionState, trigger: Trigger) -> (SessionState, Vec<Effect>) {
        let t = transition(from, &trigger).unwrap();
        (t.to, t.effects)
    }

    #[test]
    fn test_transition_table() {
        use Effect::*;
        use EventLevel::*;
        use SessionState::*;

        let table = vec![
            (Idle, Trigger::StartVerification, Verifying, vec![Capture]),
            (Verifying, scored(RiskStatus::Trusted), Trusted, vec![Log(Info)]),
            (Verifying, scored(RiskStatus::Suspicious), Suspicious, vec![Log(Alert)]),
            (Verifying, Trigger::NoData, Suspicious, vec![Log(Warn), Log(Alert)]),
            (Verifying, Trigger::Cancel, Idle, vec![]),
            (Trusted, Trigger::EnterSession, SessionActive, vec![StartTimer]),
            (SessionActive, Trigger::TimerFired, ReVerifying, vec![Capture]),
            (
                ReVerifying,
                scored(RiskStatus::Trusted),
                SessionActive,
                vec![Log(Info), StartTimer],
            ),
            (
                ReVerifying,
                scored(RiskStatus::Suspicious),
                Locked,
                vec![Log(Alert), Log(Lock)],
            ),
            (ReVerifying, Trigger::NoData, Locked, vec![Log(Alert), Log(Lock)]),
            (SessionActive, Trigger::Cancel, Idle, vec![Log(Exit), StopTimer]),
            (ReVerifying, Trigger::Cancel, Idle, vec![Log(Exit), StopTimer]),
        ];

        for (from, trigger, expected_state, expected_effects) in table {
            let (state, effects) = to(from, trigger.clone());
            assert_eq!(state, expected_state, "{from} + {}", trigger.name());
            assert_eq!(effects, expected_effects, "{from} + {}", trigger.name());
        }
    }

    #[test]
    fn test_timer_during_reverify_is_ignored() {
        let (state, effects) = to(SessionState::ReVerifying, Trigger::TimerFired);
        assert_eq!(state, SessionState::ReVerifying);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        let triggers = [
            Trigger::StartVerification,
            scored(RiskStatus::Trusted),
            Trigger::NoData,
            Trigger::EnterSession,
            Trigger::TimerFired,
            Trigger::Cancel,
        ];
        for state in [SessionState::Suspicious, SessionState::Locked] {
            for trigger in &triggers {
                assert_eq!(
                    transition(state, trigger),
                    Err(TransitionError::Terminal(state))
                );
            }
        }
    }

    #[test]
    fn test_unlisted_triggers_are_invalid() {
        let invalid = [
            (SessionState::Idle, Trigger::TimerFired),
            (SessionState::Idle, Trigger::Cancel),
            (SessionState::Idle, Trigger::EnterSession),
            (SessionState::Verifying, Trigger::TimerFired),
            (SessionState::Trusted, Trigger::StartVerification),
            (SessionState::Trusted, Trigger::Cancel),
            (SessionState::SessionActive, scored(RiskStatus::Trusted)),
            (SessionState::SessionActive, Trigger::NoData),
            (SessionState::ReVerifying, Trigger::EnterSession),
        ];
        for (state, trigger) in invalid {
            assert!(
                matches!(
                    transition(state, &trigger),
                    Err(TransitionError::Invalid { from, .. }) if from == state
                ),
                "{state} + {} should be rejected",
                trigger.name()
            );
        }
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::SessionActive.to_string(), "SESSION_ACTIVE");
        assert_eq!(SessionState::ReVerifying.to_string(), "RE_VERIFYING");
        assert_eq!(
            serde_json::to_string(&SessionState::ReVerifying).unwrap(),
            "\"RE_VERIFYING\""
        );
    }
}
