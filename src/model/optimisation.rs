// src/model/optimisation.rs

//! The `RouteOptimisation` entity, its lifecycle state machine, and the
//! context trait shared with the transient refresh object.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::errors::{OptimisationError, Result};
use crate::model::log::{LogEvent, OptimisationLog};
use crate::types::{DriverId, MemberId, MerchantId, OptimisationId, OptimisationType};

/// Lifecycle state of an optimisation.
///
/// `Failed` and `Removed` are terminal: no transition leads out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptimisationState {
    Created,
    Validation,
    Optimising,
    Completed,
    Running,
    Finished,
    Failed,
    Removed,
}

impl OptimisationState {
    /// Whether `self -> to` is an edge of the lifecycle graph.
    pub fn can_transition(self, to: OptimisationState) -> bool {
        use OptimisationState::*;
        match (self, to) {
            (Created, Validation) => true,
            (Created, Optimising) => true,
            (Validation, Optimising) => true,
            (Optimising, Completed) => true,
            (Optimising, Failed) => true,
            (Completed, Running) => true,
            (Running, Finished) => true,
            (Created | Validation | Optimising | Completed | Running, Removed) => true,
            _ => false,
        }
    }
}

/// Optional reference to the external system an optimisation was created
/// from (e.g. an import pipeline).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalSource {
    pub source: String,
    pub id: u64,
}

/// One optimisation attempt for a merchant and a day.
#[derive(Debug, Clone)]
pub struct RouteOptimisation {
    pub id: OptimisationId,
    pub optimisation_type: OptimisationType,
    pub merchant_id: MerchantId,
    pub created_by: Option<MemberId>,
    pub day: NaiveDate,
    /// Opaque configuration blob from the submission.
    pub options: Value,
    /// Validated snapshot of the engine input (jobs, drivers, constraints).
    pub optimisation_options: Value,
    pub state: OptimisationState,
    pub customers_notified: bool,
    /// Soft mutex: a removal is in flight. Persisted immediately so that
    /// concurrent delete calls observe it.
    pub is_removing_currently: bool,
    /// Set by `terminate`; read by the fan-in step to short-circuit late
    /// engine-run completions.
    pub terminated: bool,
    pub external_source: Option<ExternalSource>,
    /// External-API usage counters (cost accounting).
    pub api_usage: std::collections::HashMap<String, u64>,
    pub log: OptimisationLog,
}

impl RouteOptimisation {
    /// Transition to `state`, appending a structured log entry.
    ///
    /// Illegal edges are refused; callers are expected to check the current
    /// state first where a no-op is wanted.
    pub fn state_to(&mut self, state: OptimisationState, actor: Option<MemberId>) -> Result<()> {
        if !self.state.can_transition(state) {
            return Err(OptimisationError::IllegalTransition {
                from: self.state,
                to: state,
            });
        }
        info!(optimisation = self.id, from = ?self.state, to = ?state, "optimisation state change");
        self.state = state;
        self.log.append(
            LogEvent::StateChange,
            json!({ "state": state, "actor": actor }),
        );
        Ok(())
    }

    /// Removal in flight, from an observer's point of view.
    pub fn removing_currently(&self) -> bool {
        if self.state == OptimisationState::Removed {
            return false;
        }
        self.is_removing_currently
    }
}

/// Shared contract between a persisted optimisation and the disposable
/// refresh context. The runners only need identity, state handling and a
/// log to write into.
pub trait OptimisationContext {
    fn id(&self) -> OptimisationId;
    fn optimisation_type(&self) -> OptimisationType;
    fn day(&self) -> NaiveDate;
    fn merchant_id(&self) -> MerchantId;
    fn state(&self) -> OptimisationState;
    fn set_state(&mut self, state: OptimisationState, actor: Option<MemberId>) -> Result<()>;
    fn log_mut(&mut self) -> &mut OptimisationLog;
}

impl OptimisationContext for RouteOptimisation {
    fn id(&self) -> OptimisationId {
        self.id
    }

    fn optimisation_type(&self) -> OptimisationType {
        self.optimisation_type
    }

    fn day(&self) -> NaiveDate {
        self.day
    }

    fn merchant_id(&self) -> MerchantId {
        self.merchant_id
    }

    fn state(&self) -> OptimisationState {
        self.state
    }

    fn set_state(&mut self, state: OptimisationState, actor: Option<MemberId>) -> Result<()> {
        self.state_to(state, actor)
    }

    fn log_mut(&mut self) -> &mut OptimisationLog {
        &mut self.log
    }
}

/// Disposable, non-persisted optimisation context used by the refresh path.
///
/// Identity (`id`, `type`, `merchant`, `day`) proxies the source
/// optimisation; state and log are private to the refresh and the log is
/// merged into the source afterwards.
#[derive(Debug, Clone)]
pub struct TransientOptimisation {
    pub source_id: OptimisationId,
    pub source_type: OptimisationType,
    pub merchant_id: MerchantId,
    pub day: NaiveDate,
    pub initiator: Option<MemberId>,
    pub optimisation_options: Value,
    pub drivers: Vec<DriverId>,
    pub state: OptimisationState,
    pub log: OptimisationLog,
}

impl TransientOptimisation {
    pub fn for_source(source: &RouteOptimisation, initiator: Option<MemberId>) -> Self {
        Self {
            source_id: source.id,
            source_type: source.optimisation_type,
            merchant_id: source.merchant_id,
            day: source.day,
            initiator,
            optimisation_options: Value::Null,
            drivers: Vec::new(),
            state: OptimisationState::Created,
            log: OptimisationLog::default(),
        }
    }

    /// Take the accumulated log, leaving the transient context empty.
    pub fn take_log(&mut self) -> OptimisationLog {
        std::mem::take(&mut self.log)
    }
}

impl OptimisationContext for TransientOptimisation {
    fn id(&self) -> OptimisationId {
        self.source_id
    }

    fn optimisation_type(&self) -> OptimisationType {
        self.source_type
    }

    fn day(&self) -> NaiveDate {
        self.day
    }

    fn merchant_id(&self) -> MerchantId {
        self.merchant_id
    }

    fn state(&self) -> OptimisationState {
        self.state
    }

    fn set_state(&mut self, state: OptimisationState, actor: Option<MemberId>) -> Result<()> {
        // Refresh contexts are throwaway: record the change, skip edge
        // enforcement so a failed refresh can be retried from scratch.
        info!(optimisation = self.source_id, to = ?state, "refresh state change");
        self.state = state;
        self.log.append(
            LogEvent::RefreshStateChange,
            json!({ "state": state, "actor": actor }),
        );
        Ok(())
    }

    fn log_mut(&mut self) -> &mut OptimisationLog {
        &mut self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use OptimisationState::*;

    #[test]
    fn transition_graph_edges() {
        assert!(Created.can_transition(Optimising));
        assert!(Created.can_transition(Validation));
        assert!(Validation.can_transition(Optimising));
        assert!(Optimising.can_transition(Completed));
        assert!(Optimising.can_transition(Failed));
        assert!(Completed.can_transition(Running));
        assert!(Running.can_transition(Finished));
        for state in [Created, Validation, Optimising, Completed, Running] {
            assert!(state.can_transition(Removed), "{state:?} -> REMOVED");
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for to in [
            Created, Validation, Optimising, Completed, Running, Finished, Failed, Removed,
        ] {
            assert!(!Failed.can_transition(to));
            assert!(!Removed.can_transition(to));
        }
    }

    #[test]
    fn running_requires_completed() {
        // RUNNING is only reachable from COMPLETED.
        for from in [Created, Validation, Optimising, Finished, Failed, Removed] {
            assert!(!from.can_transition(Running));
        }
    }
}
