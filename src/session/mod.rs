//! Authentication session lifecycle.
//!
//! This module contains:
//! - The session states and the pure transition table
//! - The state machine that turns transitions into actions and events
//! - The cancellable re-verification timer and the session control channel

pub mod machine;
pub mod state;
pub mod timer;

// Re-export commonly used types
pub use machine::{SessionAction, SessionStateMachine};
pub use state::{transition, Effect, SessionState, Transition, TransitionError, Trigger};
pub use timer::{ReverifyTimer, SessionCanceller, SessionControl, SessionSignal};
