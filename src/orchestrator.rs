// src/orchestrator.rs

//! Wiring: services, the work queue, and the worker loop.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::backends::BackendContext;
use crate::config::OrchestratorConfig;
use crate::dispatch::{Dispatcher, WorkItem, WorkUnit};
use crate::engine::{Clusterer, Solver};
use crate::errors::Result;
use crate::events::EventSink;
use crate::jobs::JobDomain;
use crate::orchestration::{refresh, runner};
use crate::store::Store;
use crate::tracking;
use crate::types::CorrelationId;

/// Owns the collaborators and the queue; every work unit executes against
/// this.
pub struct Orchestrator {
    pub store: Arc<Store>,
    pub solver: Arc<dyn Solver>,
    pub clusterer: Arc<dyn Clusterer>,
    pub jobs: Arc<dyn JobDomain>,
    pub events: Arc<dyn EventSink>,
    pub config: OrchestratorConfig,
    dispatcher: Dispatcher,
}

impl Orchestrator {
    /// Build the orchestrator and spawn its worker loop. Each received
    /// unit runs in its own task, so units never block each other.
    pub fn spawn(
        store: Arc<Store>,
        solver: Arc<dyn Solver>,
        clusterer: Arc<dyn Clusterer>,
        jobs: Arc<dyn JobDomain>,
        events: Arc<dyn EventSink>,
        config: OrchestratorConfig,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let (dispatcher, rx) = Dispatcher::new(config.queue.capacity);
        let orchestrator = Arc::new(Self {
            store,
            solver,
            clusterer,
            jobs,
            events,
            config,
            dispatcher,
        });
        let worker = tokio::spawn(worker_loop(Arc::clone(&orchestrator), rx));
        (orchestrator, worker)
    }

    /// Register a correlation id on the optimisation's task and enqueue the
    /// unit.
    pub async fn enqueue(&self, item: WorkItem) -> Result<CorrelationId> {
        let correlation = self.store.next_correlation_id();
        if let Some(optimisation) = item.optimisation_id() {
            self.store
                .update_task(optimisation, |task| task.register_correlation(correlation))?;
        }
        self.dispatcher.dispatch(item, correlation).await?;
        Ok(correlation)
    }

    pub fn backend_ctx(&self) -> BackendContext<'_> {
        BackendContext {
            store: &self.store,
            jobs: &*self.jobs,
            events: &*self.events,
        }
    }

    async fn execute(self: Arc<Self>, unit: WorkUnit) {
        debug!(correlation = unit.correlation, item = ?unit.item, "executing work unit");
        let outcome = match unit.item.clone() {
            WorkItem::RunOptimisation { optimisation } => {
                runner::run_optimisation(&self, optimisation).await
            }
            WorkItem::ExecuteEngineRun {
                optimisation,
                engine_run,
            } => runner::execute_engine_run(&self, optimisation, engine_run).await,
            WorkItem::HandleResults { optimisation } => {
                runner::handle_results(&self, optimisation).await
            }
            WorkItem::Refresh {
                optimisation,
                driver,
                initiator,
            } => refresh::run_refresh(&self, optimisation, driver, initiator).await,
            WorkItem::TrackJobStatus { job } => tracking::state_change::track_job_status(
                &self.store,
                &*self.jobs,
                &*self.events,
                job,
            ),
        };
        if let Err(e) = outcome {
            error!(correlation = unit.correlation, item = ?unit.item, error = %e, "work unit failed");
        }
    }
}

async fn worker_loop(orchestrator: Arc<Orchestrator>, mut rx: mpsc::Receiver<WorkUnit>) {
    while let Some(unit) = rx.recv().await {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(orchestrator.execute(unit));
    }
}
