// src/lifecycle.rs

//! Creation, deletion, termination and customer notification.

use chrono::NaiveDate;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::backends::{backend_for, BackendContext};
use crate::dispatch::WorkItem;
use crate::errors::Result;
use crate::events::{DomainEvent, EventSink};
use crate::jobs::JobDomain;
use crate::model::log::LogEvent;
use crate::model::optimisation::{ExternalSource, OptimisationState, RouteOptimisation};
use crate::model::route::RouteState;
use crate::model::OptimisationLog;
use crate::orchestrator::Orchestrator;
use crate::store::Store;
use crate::types::{JobId, MemberId, MerchantId, OptimisationId, OptimisationType};

/// Submission payload for a new optimisation.
#[derive(Debug, Clone)]
pub struct NewOptimisation {
    pub optimisation_type: OptimisationType,
    pub merchant_id: MerchantId,
    pub created_by: Option<MemberId>,
    pub day: NaiveDate,
    pub options: Value,
    pub optimisation_options: Value,
    pub external_source: Option<ExternalSource>,
}

/// Create the entity and its task, run the backend's creation hook, and
/// enqueue the optimisation run.
pub async fn create_optimisation(
    orch: &Orchestrator,
    new: NewOptimisation,
) -> Result<OptimisationId> {
    let optimisation = orch.store.insert_optimisation(RouteOptimisation {
        id: 0,
        optimisation_type: new.optimisation_type,
        merchant_id: new.merchant_id,
        created_by: new.created_by,
        day: new.day,
        options: new.options,
        optimisation_options: new.optimisation_options,
        state: OptimisationState::Created,
        customers_notified: false,
        is_removing_currently: false,
        terminated: false,
        external_source: new.external_source,
        api_usage: Default::default(),
        log: OptimisationLog::default(),
    });
    info!(optimisation, merchant = new.merchant_id, "optimisation created");
    orch.events
        .emit(DomainEvent::OptimisationCreated { optimisation });

    let backend = backend_for(new.optimisation_type);
    backend.on_create(&orch.backend_ctx(), optimisation)?;
    orch.enqueue(WorkItem::RunOptimisation { optimisation })
        .await?;
    Ok(optimisation)
}

/// Delete an optimisation and everything hanging off it.
///
/// Idempotent: deleting a removed optimisation, or one that another caller
/// is already removing, is a no-op. The `is_removing_currently` flag is
/// always cleared on the way out, and an incomplete removal leaves a
/// change event behind so observers re-read the entity.
pub fn delete_optimisation(
    store: &Store,
    jobs: &dyn JobDomain,
    events: &dyn EventSink,
    optimisation: OptimisationId,
    initiator: Option<MemberId>,
    unassign: bool,
) -> Result<()> {
    let opt = store.optimisation(optimisation)?;
    if opt.state == OptimisationState::Removed {
        return Ok(());
    }
    if opt.removing_currently() {
        warn!(optimisation, "delete skipped, removal already in flight");
        return Ok(());
    }
    store.update_optimisation(optimisation, |o| o.is_removing_currently = true)?;

    let outcome = delete_inner(store, jobs, events, optimisation, initiator, unassign);

    let removed = store
        .optimisation(optimisation)
        .map(|o| o.state == OptimisationState::Removed)
        .unwrap_or(false);
    store.update_optimisation(optimisation, |o| o.is_removing_currently = false)?;
    if let Err(e) = &outcome {
        store.update_optimisation(optimisation, |o| {
            o.log.append(
                LogEvent::ExceptionOnDeletion,
                json!({ "message": e.to_string() }),
            );
        })?;
    }
    if !removed {
        events.emit(DomainEvent::OptimisationChanged { optimisation });
    }
    outcome
}

fn delete_inner(
    store: &Store,
    jobs: &dyn JobDomain,
    events: &dyn EventSink,
    optimisation: OptimisationId,
    initiator: Option<MemberId>,
    unassign: bool,
) -> Result<()> {
    let opt = store.optimisation(optimisation)?;
    let routes = store.routes_for_optimisation(optimisation);
    for route in &routes {
        if unassign {
            let assigned: Vec<JobId> = store.with_points(|table| {
                table
                    .route_points(route.id)
                    .iter()
                    .filter_map(|p| p.subject.and_then(|s| s.job_id()))
                    .collect()
            });
            let pending: Vec<JobId> = assigned
                .into_iter()
                .filter(|&job| !jobs.is_deleted(job))
                .filter(|&job| !jobs.status(job).is_some_and(|s| s.is_terminal()))
                .collect();
            if !pending.is_empty() {
                jobs.bulk_unassign(route.driver_id, &pending);
            }
        }
        // Tell the driver's app only when the day is already underway.
        if route.state == RouteState::Running {
            events.emit(DomainEvent::RouteRemoved {
                optimisation,
                route: route.id,
                driver: route.driver_id,
            });
        }
        store.delete_route(route.id);
    }

    let backend = backend_for(opt.optimisation_type);
    let ctx = BackendContext {
        store,
        jobs,
        events,
    };
    backend.on_delete(&ctx, optimisation, initiator, unassign)?;
    store.update_optimisation(optimisation, |o| {
        o.state_to(OptimisationState::Removed, initiator)
    })??;
    store.complete_task(optimisation)?;
    events.emit(DomainEvent::OptimisationDeleted { optimisation });
    info!(optimisation, "optimisation deleted");
    Ok(())
}

/// Terminate a run that is still optimising. Dispatched engine runs keep
/// running; the terminated flag makes their fan-in a no-op.
pub fn terminate_optimisation(
    store: &Store,
    jobs: &dyn JobDomain,
    events: &dyn EventSink,
    optimisation: OptimisationId,
    initiator: Option<MemberId>,
) -> Result<()> {
    let opt = store.optimisation(optimisation)?;
    if !matches!(
        opt.state,
        OptimisationState::Validation | OptimisationState::Optimising
    ) {
        warn!(optimisation, state = ?opt.state, "terminate is a no-op in this state");
        return Ok(());
    }
    store.update_optimisation(optimisation, |o| o.terminated = true)?;
    let backend = backend_for(opt.optimisation_type);
    let ctx = BackendContext {
        store,
        jobs,
        events,
    };
    backend.on_terminate(&ctx, optimisation, initiator)?;
    // Completing the task here means any late fan-in loses its claim.
    store.complete_task(optimisation)?;
    store.update_optimisation(optimisation, |o| {
        o.state_to(OptimisationState::Removed, initiator)
    })??;
    events.emit(DomainEvent::OptimisationDeleted { optimisation });
    Ok(())
}

/// Record the decision to notify customers about their routes. Returns
/// whether this call flipped the flag; delivery itself is external.
pub fn notify_customers(
    store: &Store,
    events: &dyn EventSink,
    optimisation: OptimisationId,
    initiator: Option<MemberId>,
) -> Result<bool> {
    let opt = store.optimisation(optimisation)?;
    if opt.customers_notified {
        return Ok(false);
    }
    store.update_optimisation(optimisation, |o| {
        o.customers_notified = true;
        o.log.append(
            LogEvent::NotifyCustomers,
            json!({ "initiator": initiator }),
        );
    })?;
    events.emit(DomainEvent::CustomersNotified { optimisation });
    Ok(true)
}
