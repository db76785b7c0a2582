//! Append-only security event log.
//!
//! Every event is counted per level, kept in a bounded in-memory buffer and,
//! when a file is configured, appended to it as one JSON object per line.
//! Events are also mirrored to `tracing`.

use crate::audit::event::{EventLevel, SecurityEvent};
use crate::audit::{EventSink, SinkError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Number of recent events kept in memory.
const RECENT_CAPACITY: usize = 50;

/// Security event log for the current process.
#[derive(Debug)]
pub struct SecurityLog {
    info: AtomicU64,
    warn: AtomicU64,
    alert: AtomicU64,
    lock: AtomicU64,
    exit: AtomicU64,
    /// Most recent events, oldest first
    recent: Mutex<VecDeque<SecurityEvent>>,
    /// When this log was opened
    opened_at: DateTime<Utc>,
    /// JSONL file events are appended to
    path: Option<PathBuf>,
}

impl SecurityLog {
    /// Create an in-memory log.
    pub fn new() -> Self {
        Self {
            info: AtomicU64::new(0),
            warn: AtomicU64::new(0),
            alert: AtomicU64::new(0),
            lock: AtomicU64::new(0),
            exit: AtomicU64::new(0),
            recent: Mutex::new(VecDeque::with_capacity(RECENT_CAPACITY)),
            opened_at: Utc::now(),
            path: None,
        }
    }

    /// Create a log that appends to `path`.
    ///
    /// Events already in the file are replayed into the counters and the
    /// recent buffer, so statistics cover the whole history.
    pub fn with_file(path: PathBuf) -> Self {
        let mut log = Self::new();

        match read_events(&path) {
            Ok(events) => {
                for event in events {
                    log.record(event);
                }
            }
            Err(e) => tracing::warn!("could not load previous security events: {e}"),
        }

        log.path = Some(path);
        log
    }

    fn counter(&self, level: EventLevel) -> &AtomicU64 {
        match level {
            EventLevel::Info => &self.info,
            EventLevel::Warn => &self.warn,
            EventLevel::Alert => &self.alert,
            EventLevel::Lock => &self.lock,
            EventLevel::Exit => &self.exit,
        }
    }

    /// Count the event and keep it in the recent buffer.
    fn record(&self, event: SecurityEvent) {
        self.counter(event.level).fetch_add(1, Ordering::Relaxed);

        let mut recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
        if recent.len() == RECENT_CAPACITY {
            recent.pop_front();
        }
        recent.push_back(event);
    }

    fn append(&self, path: &Path, event: &SecurityEvent) -> Result<(), SinkError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SinkError::Io(e.to_string()))?;
        }

        let line =
            serde_json::to_string(event).map_err(|e| SinkError::Serialize(e.to_string()))?;

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| SinkError::Io(e.to_string()))?;
        writeln!(file, "{line}").map_err(|e| SinkError::Io(e.to_string()))
    }

    /// Number of events recorded at `level`.
    pub fn count(&self, level: EventLevel) -> u64 {
        self.counter(level).load(Ordering::Relaxed)
    }

    /// The most recent events, oldest first, at most `limit` of them.
    pub fn recent(&self, limit: usize) -> Vec<SecurityEvent> {
        let recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
        let skip = recent.len().saturating_sub(limit);
        recent.iter().skip(skip).cloned().collect()
    }

    /// Get the current statistics.
    pub fn stats(&self) -> LogStats {
        LogStats {
            info: self.count(EventLevel::Info),
            warn: self.count(EventLevel::Warn),
            alert: self.count(EventLevel::Alert),
            lock: self.count(EventLevel::Lock),
            exit: self.count(EventLevel::Exit),
            opened_at: self.opened_at,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Security Event Statistics:\n\
             - Successful verifications (INFO): {}\n\
             - Capture warnings (WARN): {}\n\
             - Failed verifications (ALERT): {}\n\
             - Session locks (LOCK): {}\n\
             - User exits (EXIT): {}\n\
             - Total events: {}\n\
             \n\
             Privacy Guarantee:\n\
             - Typed characters are never written to the log\n\
             - Only timing statistics and risk scores are retained",
            stats.info,
            stats.warn,
            stats.alert,
            stats.lock,
            stats.exit,
            stats.total()
        )
    }

    /// Reset all counters and drop the recent buffer. The file is untouched.
    pub fn reset(&self) {
        for level in EventLevel::ALL {
            self.counter(level).store(0, Ordering::Relaxed);
        }
        self.recent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

impl Default for SecurityLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for SecurityLog {
    fn emit(&self, event: &SecurityEvent) -> Result<(), SinkError> {
        match event.level {
            EventLevel::Info | EventLevel::Exit => {
                tracing::info!(event_level = %event.level, risk = ?event.risk, "{}", event.message)
            }
            EventLevel::Warn | EventLevel::Alert => {
                tracing::warn!(event_level = %event.level, risk = ?event.risk, "{}", event.message)
            }
            EventLevel::Lock => {
                tracing::error!(event_level = %event.level, risk = ?event.risk, "{}", event.message)
            }
        }

        self.record(event.clone());

        match &self.path {
            Some(path) => self.append(path, event),
            None => Ok(()),
        }
    }
}

/// Snapshot of security log statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogStats {
    pub info: u64,
    pub warn: u64,
    pub alert: u64,
    pub lock: u64,
    pub exit: u64,
    pub opened_at: DateTime<Utc>,
}

impl LogStats {
    pub fn total(&self) -> u64 {
        self.info + self.warn + self.alert + self.lock + self.exit
    }
}

/// Read every event from a JSONL log. A missing file has no events;
/// lines that do not parse are skipped.
pub fn read_events(path: &Path) -> Result<Vec<SecurityEvent>, SinkError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(SinkError::Io(e.to_string())),
    };

    let mut events = Vec::new();
    for (number, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<SecurityEvent>(line) {
            Ok(event) => events.push(event),
            Err(e) => tracing::warn!(line = number + 1, "skipping malformed log entry: {e}"),
        }
    }
    Ok(events)
}

/// The last `n` events of a JSONL log, oldest first.
pub fn read_tail(path: &Path, n: usize) -> Result<Vec<SecurityEvent>, SinkError> {
    let mut events = read_events(path)?;
    let skip = events.len().saturating_sub(n);
    Ok(events.split_off(skip))
}

/// The most recent event that carries a risk score, if any.
pub fn last_scored_event(path: &Path) -> Result<Option<SecurityEvent>, SinkError> {
    let events = read_events(path)?;
    Ok(events.into_iter().rev().find(|event| event.risk.is_some()))
}

/// Thread-safe shared security log.
pub type SharedSecurityLog = Arc<SecurityLog>;

/// Create a new shared security log backed by a file.
pub fn create_shared_log_with_file(path: PathBuf) -> SharedSecurityLog {
    Arc::new(SecurityLog::with_file(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_log_counting() {
        let log = SecurityLog::new();

        log.emit(&SecurityEvent::new(EventLevel::Info, "ok")).unwrap();
        log.emit(&SecurityEvent::new(EventLevel::Info, "ok")).unwrap();
        log.emit(&SecurityEvent::new(EventLevel::Lock, "locked")).unwrap();

        let stats = log.stats();
        assert_eq!(stats.info, 2);
        assert_eq!(stats.lock, 1);
        assert_eq!(stats.alert, 0);
        assert_eq!(stats.total(), 3);
    }

    #[test]
    fn test_security_log_reset() {
        let log = SecurityLog::new();
        log.emit(&SecurityEvent::new(EventLevel::Alert, "failed")).unwrap();
        log.reset();

        assert_eq!(log.stats().total(), 0);
        assert!(log.recent(10).is_empty());
    }

    #[test]
    fn test_recent_is_bounded() {
        let log = SecurityLog::new();
        for i in 0..(RECENT_CAPACITY + 5) {
            log.emit(&SecurityEvent::new(EventLevel::Info, format!("event {i}")))
                .unwrap();
        }

        let recent = log.recent(usize::MAX);
        assert_eq!(recent.len(), RECENT_CAPACITY);
        assert_eq!(recent[0].message, "event 5");

        let last_two = log.recent(2);
        assert_eq!(last_two[1].message, format!("event {}", RECENT_CAPACITY + 4));
    }

    #[test]
    fn test_file_append_and_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("security_log.jsonl");

        let log = SecurityLog::with_file(path.clone());
        log.emit(&SecurityEvent::new(EventLevel::Info, "first")).unwrap();
        log.emit(&SecurityEvent::new(EventLevel::Alert, "second").with_score(0.2, 0.1))
            .unwrap();
        log.emit(&SecurityEvent::new(EventLevel::Lock, "third")).unwrap();

        let tail = read_tail(&path, 2).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].message, "second");
        assert_eq!(tail[0].risk, Some(0.2));
        assert_eq!(tail[1].level, EventLevel::Lock);

        // reopening restores the counters from the file
        let reopened = SecurityLog::with_file(path);
        assert_eq!(reopened.stats().total(), 3);
        assert_eq!(reopened.count(EventLevel::Alert), 1);
    }

    #[test]
    fn test_read_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("security_log.jsonl");
        let good = serde_json::to_string(&SecurityEvent::new(EventLevel::Exit, "bye")).unwrap();
        std::fs::write(&path, format!("not json\n\n{good}\n")).unwrap();

        let events = read_events(&path).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].level, EventLevel::Exit);

        assert!(read_tail(&dir.path().join("missing.jsonl"), 5)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_last_scored_event_skips_unscored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("security_log.jsonl");
        assert!(last_scored_event(&path).unwrap().is_none());

        let log = SecurityLog::with_file(path.clone());
        log.emit(&SecurityEvent::new(EventLevel::Info, "login").with_score(0.01, 0.05))
            .unwrap();
        log.emit(&SecurityEvent::new(EventLevel::Alert, "recheck").with_score(0.09, 0.05))
            .unwrap();
        log.emit(&SecurityEvent::new(EventLevel::Exit, "user left")).unwrap();

        let last = last_scored_event(&path).unwrap().unwrap();
        assert_eq!(last.level, EventLevel::Alert);
        assert_eq!(last.risk, Some(0.09));
        assert_eq!(last.threshold, Some(0.05));
    }

    #[test]
    fn test_summary_format() {
        let log = SecurityLog::new();
        let summary = log.summary();

        assert!(summary.contains("Failed verifications (ALERT)"));
        assert!(summary.contains("Session locks (LOCK)"));
        assert!(summary.contains("Privacy Guarantee"));
    }
}
