// src/dispatch.rs

//! The work queue.
//!
//! Orchestration steps never call each other directly; they enqueue work
//! units and a background worker loop picks them up. Dispatch is
//! fire-and-forget; the correlation id ties a unit back to the task record
//! of its optimisation.

use tokio::sync::mpsc;
use tracing::warn;

use crate::errors::Result;
use crate::types::{CorrelationId, EngineRunId, JobId, MemberId, OptimisationId};

/// One unit of queue work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    /// Entry point after creation: validate, cluster, dispatch engine runs.
    RunOptimisation {
        optimisation: OptimisationId,
    },
    /// Execute one engine run under the soft time limit.
    ExecuteEngineRun {
        optimisation: OptimisationId,
        engine_run: EngineRunId,
    },
    /// Fan-in: combine finished runs and finalize the optimisation.
    HandleResults {
        optimisation: OptimisationId,
    },
    /// Re-optimise a single driver's route on the source optimisation.
    Refresh {
        optimisation: OptimisationId,
        driver: crate::types::DriverId,
        initiator: Option<MemberId>,
    },
    /// React to a job status change from the order domain.
    TrackJobStatus {
        job: JobId,
    },
}

impl WorkItem {
    /// The optimisation this unit belongs to, for correlation bookkeeping.
    pub fn optimisation_id(&self) -> Option<OptimisationId> {
        match self {
            WorkItem::RunOptimisation { optimisation }
            | WorkItem::ExecuteEngineRun { optimisation, .. }
            | WorkItem::HandleResults { optimisation }
            | WorkItem::Refresh { optimisation, .. } => Some(*optimisation),
            WorkItem::TrackJobStatus { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkUnit {
    pub correlation: CorrelationId,
    pub item: WorkItem,
}

/// Sending half of the work queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<WorkUnit>,
}

impl Dispatcher {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<WorkUnit>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Enqueue a unit of work. Errors only when the worker loop is gone,
    /// which callers treat as shutdown.
    pub async fn dispatch(&self, item: WorkItem, correlation: CorrelationId) -> Result<()> {
        let unit = WorkUnit { correlation, item };
        if let Err(e) = self.tx.send(unit).await {
            warn!(correlation, "work queue closed, dropping unit");
            return Err(anyhow::anyhow!("work queue closed: {e}").into());
        }
        Ok(())
    }
}
