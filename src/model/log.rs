// src/model/log.rs

//! Append-only structured log attached to optimisations and engine runs.
//!
//! Every interesting mutation (state change, failure, deletion, progress
//! stage) appends one entry. Admin tooling renders these entries; the
//! orchestration itself only ever appends and, rarely, scans for a marker
//! event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEvent {
    StateChange,
    RouteStateChange,
    RefreshStateChange,
    Progress,
    Exception,
    ExceptionOnDeletion,
    DeleteOptimisation,
    TerminateOptimisation,
    NotifyCustomers,
    ApiUsage,
    RemovePoint,
    Message,
}

/// Progress stages written by the runners, mirrored by admin tooling.
pub mod progress_stage {
    pub const START: &str = "start";
    pub const CLUSTERING: &str = "clustering";
    pub const ENGINES_CREATE: &str = "engines_create";
    pub const ASSIGN: &str = "assign";
    pub const FINISH: &str = "finish";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub event: LogEvent,
    pub timestamp: DateTime<Utc>,
    pub payload: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimisationLog {
    entries: Vec<LogEntry>,
}

impl OptimisationLog {
    pub fn append(&mut self, event: LogEvent, payload: Value) {
        self.entries.push(LogEntry {
            event,
            timestamp: Utc::now(),
            payload,
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn contains_event(&self, event: LogEvent) -> bool {
        self.entries.iter().any(|e| e.event == event)
    }

    pub fn count_event(&self, event: LogEvent) -> usize {
        self.entries.iter().filter(|e| e.event == event).count()
    }

    /// Merge another log's entries into this one, preserving their order.
    /// Used to fold a transient refresh log into the source optimisation.
    pub fn merge(&mut self, other: OptimisationLog) {
        self.entries.extend(other.entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn append_and_scan() {
        let mut log = OptimisationLog::default();
        log.append(LogEvent::StateChange, json!({"state": "OPTIMISING"}));
        log.append(LogEvent::Progress, json!({"stage": progress_stage::START}));
        assert_eq!(log.entries().len(), 2);
        assert!(log.contains_event(LogEvent::StateChange));
        assert!(!log.contains_event(LogEvent::TerminateOptimisation));
    }

    #[test]
    fn merge_preserves_order() {
        let mut a = OptimisationLog::default();
        a.append(LogEvent::StateChange, json!({"n": 1}));
        let mut b = OptimisationLog::default();
        b.append(LogEvent::Message, json!({"n": 2}));
        b.append(LogEvent::Message, json!({"n": 3}));
        a.merge(b);
        assert_eq!(a.entries().len(), 3);
        assert_eq!(a.entries()[2].payload["n"], 3);
    }
}
