// src/model/task.rs

//! The per-optimisation task record tracking dispatched queue work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{CorrelationId, OptimisationId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Created,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskLogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// 1:1 companion of an optimisation. Tracks which queue units were
/// dispatched for it and whether finalization has happened.
///
/// The status field is only ever advanced through `Store::claim_finalize`
/// and `Store::complete_task`; once `Completed` it never changes again,
/// which is what makes finalization at-most-once.
#[derive(Debug, Clone)]
pub struct OptimisationTask {
    pub optimisation_id: OptimisationId,
    pub status: TaskStatus,
    pub dispatched: Vec<CorrelationId>,
    pub log: Vec<TaskLogEntry>,
}

impl OptimisationTask {
    pub fn new(optimisation_id: OptimisationId) -> Self {
        Self {
            optimisation_id,
            status: TaskStatus::Created,
            dispatched: Vec::new(),
            log: Vec::new(),
        }
    }

    /// Record that a unit of queue work was dispatched for this task.
    pub fn register_correlation(&mut self, correlation: CorrelationId) {
        self.dispatched.push(correlation);
        if self.status == TaskStatus::Created {
            self.status = TaskStatus::InProgress;
        }
        self.append_log(format!("dispatched work unit {correlation}"));
    }

    pub fn append_log(&mut self, message: impl Into<String>) {
        self.log.push(TaskLogEntry {
            timestamp: Utc::now(),
            message: message.into(),
        });
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registering_work_moves_task_in_progress() {
        let mut task = OptimisationTask::new(7);
        assert_eq!(task.status, TaskStatus::Created);
        task.register_correlation(1);
        task.register_correlation(2);
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.dispatched, vec![1, 2]);
        assert_eq!(task.log.len(), 2);
    }
}
