//! Bounded, injectable diagnostics log.
//!
//! Components record what they decided (skipped folders, failed probes, healed URLs) into a
//! shared ring buffer that a UI or CLI can display. Every record is also emitted through
//! `tracing`, so nothing is lost when nobody reads the buffer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, PoisonError};

pub const DEFAULT_DIAGNOSTICS_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for DiagLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagLevel::Debug => "debug",
            DiagLevel::Info => "info",
            DiagLevel::Warn => "warn",
            DiagLevel::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticEntry {
    pub ts: DateTime<Utc>,
    pub level: DiagLevel,
    pub component: &'static str,
    pub message: String,
}

/// Fixed-capacity log; the oldest entries are dropped first.
#[derive(Debug)]
pub struct DiagnosticsLog {
    capacity: usize,
    entries: Mutex<VecDeque<DiagnosticEntry>>,
}

impl Default for DiagnosticsLog {
    fn default() -> Self {
        Self::new(DEFAULT_DIAGNOSTICS_CAPACITY)
    }
}

impl DiagnosticsLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn record(&self, level: DiagLevel, component: &'static str, message: impl Into<String>) {
        let message = message.into();
        match level {
            DiagLevel::Debug => tracing::debug!(component, "{}", message),
            DiagLevel::Info => tracing::info!(component, "{}", message),
            DiagLevel::Warn => tracing::warn!(component, "{}", message),
            DiagLevel::Error => tracing::error!(component, "{}", message),
        }

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(DiagnosticEntry {
            ts: Utc::now(),
            level,
            component,
            message,
        });
    }

    pub fn debug(&self, component: &'static str, message: impl Into<String>) {
        self.record(DiagLevel::Debug, component, message);
    }

    pub fn info(&self, component: &'static str, message: impl Into<String>) {
        self.record(DiagLevel::Info, component, message);
    }

    pub fn warn(&self, component: &'static str, message: impl Into<String>) {
        self.record(DiagLevel::Warn, component, message);
    }

    pub fn error(&self, component: &'static str, message: impl Into<String>) {
        self.record(DiagLevel::Error, component, message);
    }

    /// Copy of the buffered entries, oldest first.
    pub fn snapshot(&self) -> Vec<DiagnosticEntry> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.iter().cloned().collect()
    }

    /// Buffered entries at or above `level`.
    pub fn at_least(&self, level: DiagLevel) -> Vec<DiagnosticEntry> {
        self.snapshot()
            .into_iter()
            .filter(|e| e.level >= level)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oldest_entries_dropped() {
        let log = DiagnosticsLog::new(3);
        for i in 0..5 {
            log.info("test", format!("entry {i}"));
        }
        let messages: Vec<String> = log.snapshot().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["entry 2", "entry 3", "entry 4"]);
    }

    #[test]
    fn test_level_filter() {
        let log = DiagnosticsLog::default();
        log.debug("a", "quiet");
        log.warn("b", "loud");
        log.error("c", "louder");
        assert_eq!(log.at_least(DiagLevel::Warn).len(), 2);
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let log = DiagnosticsLog::new(0);
        log.info("x", "kept");
        assert_eq!(log.len(), 1);
    }
}
