// src/model/engine_run.rs

//! One unit of solver work dispatched by a runner.

use serde_json::json;

use crate::engine::result::{AssignmentResult, Failure};
use crate::engine::EngineOptions;
use crate::model::log::{LogEvent, OptimisationLog};
use crate::types::{EngineRunId, OptimisationId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineRunState {
    Created,
    Optimising,
    Completed,
    Failed,
}

impl EngineRunState {
    /// A run in this state is still being worked on.
    pub fn is_calculating(self) -> bool {
        matches!(self, EngineRunState::Created | EngineRunState::Optimising)
    }
}

/// One engine invocation over a parameter group.
///
/// After reaching `Completed` or `Failed` a run is never mutated again;
/// fan-in reads runs, it does not write them.
#[derive(Debug, Clone)]
pub struct EngineRun {
    pub id: EngineRunId,
    pub optimisation_id: OptimisationId,
    pub state: EngineRunState,
    pub options: EngineOptions,
    pub result: Option<AssignmentResult>,
    pub failure: Option<Failure>,
    pub log: OptimisationLog,
}

impl EngineRun {
    pub fn new(id: EngineRunId, optimisation_id: OptimisationId, options: EngineOptions) -> Self {
        Self {
            id,
            optimisation_id,
            state: EngineRunState::Created,
            options,
            result: None,
            failure: None,
            log: OptimisationLog::default(),
        }
    }

    pub fn start(&mut self) {
        self.state = EngineRunState::Optimising;
        self.log
            .append(LogEvent::StateChange, json!({ "state": "OPTIMISING" }));
    }

    pub fn finish(&mut self, result: AssignmentResult) {
        self.result = Some(result);
        self.state = EngineRunState::Completed;
        self.log
            .append(LogEvent::StateChange, json!({ "state": "COMPLETED" }));
    }

    pub fn fail(&mut self, failure: Failure) {
        self.log.append(
            LogEvent::Exception,
            json!({ "kind": failure.kind, "message": failure.message }),
        );
        self.failure = Some(failure);
        self.state = EngineRunState::Failed;
        self.log
            .append(LogEvent::StateChange, json!({ "state": "FAILED" }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calculating_set() {
        assert!(EngineRunState::Created.is_calculating());
        assert!(EngineRunState::Optimising.is_calculating());
        assert!(!EngineRunState::Completed.is_calculating());
        assert!(!EngineRunState::Failed.is_calculating());
    }
}
