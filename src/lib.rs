//! KeyTrust Agent - keystroke-dynamics authentication with continuous re-verification.
//!
//! This library verifies a user by *how* they type a known phrase rather than
//! by what they type. Registration stores a statistical typing profile; each
//! later verification scores a fresh sample against it, and a session keeps
//! re-verifying on a timer until a check fails or the user leaves.
//!
//! # Privacy Guarantees
//!
//! - **Timing only**: The profile holds averages of key timings, never text
//! - **Local**: Profiles and the security log stay on this machine
//! - **Auditable**: Every decision is written to an append-only security log
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        KeyTrust Agent                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐         │
//! │  │  Collector  │──▶│  Features   │──▶│    Risk     │         │
//! │  │  (capture)  │   │  (extract)  │   │  (score)    │         │
//! │  └─────────────┘   └─────────────┘   └─────────────┘         │
//! │                           │                 │                │
//! │                           ▼                 ▼                │
//! │                    ┌─────────────┐   ┌─────────────┐         │
//! │                    │  Baseline   │   │   Session   │──▶ Audit│
//! │                    │   Store     │   │   Machine   │    Log  │
//! │                    └─────────────┘   └─────────────┘         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use keytrust_agent::{audit::SecurityLog, collector::ReplayCapture, Config, TrustAgent};
//!
//! let source = ReplayCapture::from_file("recording.json".as_ref())?;
//! let mut agent = TrustAgent::new(Config::load()?, source, SecurityLog::new())?;
//!
//! agent.register("trust no one verify always")?;
//! let outcome = agent.verify("trust no one verify always")?;
//! println!("{}", outcome.final_state);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod agent;
pub mod audit;
pub mod collector;
pub mod config;
pub mod core;
pub mod session;
pub mod store;

// Re-export key types at crate root for convenience
pub use agent::{AuthError, SessionOutcome, TrustAgent};
pub use audit::{EventLevel, EventSink, SecurityEvent, SecurityLog, SharedSecurityLog};
pub use collector::{CaptureError, KeyStroke, KeystrokeSource};
pub use config::{Config, ConfigError};
pub use core::{Baseline, BaselineError, FeatureExtractor, KeystrokeSample, RiskAssessment};
pub use session::{SessionControl, SessionState};
pub use store::BaselineStore;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Privacy notice that can be displayed to users.
pub const PRIVACY_NOTICE: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║                 KEYTRUST AGENT - PRIVACY NOTICE                  ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  This agent recognises you by the rhythm of your typing.         ║
║                                                                  ║
║  ✓ WHAT WE STORE:                                                ║
║    • Average time each key is held down                          ║
║    • Average time between consecutive keys                       ║
║    • Average timing of letter pairs in the prompt phrase         ║
║    • A log of verification results and risk scores               ║
║                                                                  ║
║  ✗ WHAT WE NEVER STORE:                                          ║
║    • Anything you type outside the prompt phrase                 ║
║    • Raw keystroke recordings                                    ║
║    • Passwords, messages or screen content                       ║
║                                                                  ║
║  All data is processed and kept locally.                         ║
║                                                                  ║
║  You can review every security decision with:                    ║
║    keytrust logs                                                 ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
