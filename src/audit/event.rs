//! Security event records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of a security event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventLevel {
    /// A verification passed
    Info,
    /// Capture produced nothing usable
    Warn,
    /// A verification failed
    Alert,
    /// A session was locked
    Lock,
    /// A session was ended by the user
    Exit,
}

impl EventLevel {
    pub const ALL: [EventLevel; 5] = [
        EventLevel::Info,
        EventLevel::Warn,
        EventLevel::Alert,
        EventLevel::Lock,
        EventLevel::Exit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventLevel::Info => "INFO",
            EventLevel::Warn => "WARN",
            EventLevel::Alert => "ALERT",
            EventLevel::Lock => "LOCK",
            EventLevel::Exit => "EXIT",
        }
    }
}

impl std::fmt::Display for EventLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the security log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub level: EventLevel,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

impl SecurityEvent {
    pub fn new(level: EventLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            message: message.into(),
            session_id: None,
            risk: None,
            threshold: None,
        }
    }

    /// Attach the score that led to this event.
    pub fn with_score(mut self, risk: f64, threshold: f64) -> Self {
        self.risk = Some(risk);
        self.threshold = Some(threshold);
        self
    }

    pub fn with_session(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }
}

impl std::fmt::Display for SecurityEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.level,
            self.message
        )?;
        if let (Some(risk), Some(threshold)) = (self.risk, self.threshold) {
            write!(f, " | Risk={risk:.4} | Threshold={threshold:.4}")?;
        }
        Ok(())
    }
}
