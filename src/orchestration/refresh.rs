// src/orchestration/refresh.rs

//! Refresh: re-optimise a single driver's route on a finished optimisation.
//!
//! The whole refresh runs against a disposable [`TransientOptimisation`];
//! only a successful outcome touches the source (route replacement plus the
//! merged log). A failed refresh leaves the source exactly as it was.

use serde_json::json;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::backends::{backend_for, replace_driver_route};
use crate::engine::result::Failure;
use crate::engine::{EngineOptions, EngineParameters};
use crate::errors::{OptimisationError, Result};
use crate::events::DomainEvent;
use crate::model::log::{progress_stage, LogEvent, OptimisationLog};
use crate::model::optimisation::{OptimisationContext, OptimisationState};
use crate::model::TransientOptimisation;
use crate::orchestrator::Orchestrator;
use crate::store::Store;
use crate::types::{DriverId, JobId, MemberId, OptimisationId, OptimisationType};

/// Fold the transient refresh log into the source optimisation's log.
pub fn merge_transient_log(
    store: &Store,
    source: OptimisationId,
    log: OptimisationLog,
) -> Result<()> {
    store.update_optimisation(source, |opt| opt.log.merge(log))
}

/// Job ids currently sitting on the driver's routes of the optimisation.
fn jobs_on_driver_routes(
    store: &Store,
    optimisation: OptimisationId,
    driver: DriverId,
) -> Vec<JobId> {
    let route_ids: Vec<_> = store
        .routes_for_optimisation(optimisation)
        .into_iter()
        .filter(|r| r.driver_id == driver)
        .map(|r| r.id)
        .collect();
    store.with_points(|table| {
        let mut jobs: Vec<JobId> = Vec::new();
        for route in &route_ids {
            for point in table.route_points(*route) {
                if let Some(job) = point.subject.and_then(|s| s.job_id()) {
                    jobs.push(job);
                }
            }
        }
        jobs
    })
}

pub async fn run_refresh(
    orch: &Orchestrator,
    optimisation: OptimisationId,
    driver: DriverId,
    initiator: Option<MemberId>,
) -> Result<()> {
    let source = orch.store.optimisation(optimisation)?;
    if !matches!(
        source.state,
        OptimisationState::Completed | OptimisationState::Running
    ) {
        warn!(optimisation, state = ?source.state, "refresh refused in this state");
        return Ok(());
    }

    let mut transient = TransientOptimisation::for_source(&source, initiator);
    transient.drivers = vec![driver];
    transient.optimisation_options = source.optimisation_options.clone();
    transient.set_state(OptimisationState::Optimising, initiator)?;

    match refresh_driver_route(orch, &mut transient, driver).await {
        Ok(()) => {
            transient.set_state(OptimisationState::Completed, initiator)?;
            transient.log_mut().append(
                LogEvent::Progress,
                json!({ "stage": progress_stage::FINISH }),
            );
            merge_transient_log(&orch.store, optimisation, transient.take_log())?;
            orch.events
                .emit(DomainEvent::OptimisationChanged { optimisation });
            info!(optimisation, driver, "route refreshed");
            Ok(())
        }
        Err(e) => {
            // The source stays untouched; the failure lives and dies with
            // the transient context.
            let failure = Failure::classify(&e);
            transient.log_mut().append(
                LogEvent::Exception,
                json!({ "kind": failure.kind, "message": failure.message }),
            );
            transient.set_state(OptimisationState::Failed, initiator)?;
            warn!(optimisation, driver, error = %e, "refresh failed");
            Ok(())
        }
    }
}

async fn refresh_driver_route(
    orch: &Orchestrator,
    transient: &mut TransientOptimisation,
    driver: DriverId,
) -> Result<()> {
    let mut params = EngineParameters::from_options(&transient.optimisation_options)?;
    params.drivers.retain(|d| d.id == driver);
    if params.drivers.is_empty() {
        return Err(OptimisationError::Validation(format!(
            "driver {driver} is not part of the optimisation"
        )));
    }
    let current_jobs = jobs_on_driver_routes(&orch.store, transient.source_id, driver);
    params.jobs.retain(|j| current_jobs.contains(&j.id));
    if params.jobs.is_empty() {
        return Err(OptimisationError::Validation(format!(
            "driver {driver} has no jobs left to re-route"
        )));
    }

    let backend = backend_for(OptimisationType::Refresh);
    let options = EngineOptions {
        params,
        algorithm: backend.algorithm(),
    };
    let limit = orch.config.soft_time_limit();
    let result = match timeout(limit, orch.solver.solve(options)).await {
        Ok(solved) => solved?,
        Err(_) => return Err(OptimisationError::SoftTimeout(limit)),
    };
    let tour = result
        .tours
        .iter()
        .find(|t| t.driver_id == driver)
        .ok_or_else(|| {
            OptimisationError::Solver(format!("refresh produced no tour for driver {driver}"))
        })?;
    replace_driver_route(&orch.store, transient.source_id, driver, tour)?;
    Ok(())
}
