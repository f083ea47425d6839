// src/tracking/state_change.rs

//! Reacting to job status changes from the order domain.
//!
//! A driver starting work on any job promotes the route and the
//! optimisation to RUNNING; the last terminal job finishes them.

use serde_json::json;
use tracing::{debug, info};

use crate::errors::Result;
use crate::events::{DomainEvent, EventSink};
use crate::jobs::JobDomain;
use crate::model::log::LogEvent;
use crate::model::optimisation::OptimisationState;
use crate::model::route::RouteState;
use crate::store::Store;
use crate::types::{JobId, OptimisationId, RouteId};

/// A job point and the entities above it, resolved for the reactor.
struct TrackedPoint {
    route: RouteId,
    optimisation: OptimisationId,
}

/// Find the point carrying this job under an optimisation that is
/// `Completed` or `Running`. Older removed optimisations may still hold
/// stale points for the same job; those are skipped.
fn find_tracked_point(store: &Store, job: JobId) -> Option<TrackedPoint> {
    let candidates: Vec<RouteId> = store.with_points(|table| {
        table
            .iter()
            .filter(|p| p.subject.and_then(|s| s.job_id()) == Some(job))
            .map(|p| p.route_id)
            .collect()
    });
    for route_id in candidates {
        let Ok(route) = store.route(route_id) else {
            continue;
        };
        let Ok(opt) = store.optimisation(route.optimisation_id) else {
            continue;
        };
        if matches!(
            opt.state,
            OptimisationState::Completed | OptimisationState::Running
        ) {
            return Some(TrackedPoint {
                route: route_id,
                optimisation: opt.id,
            });
        }
    }
    None
}

fn log_route_state(
    store: &Store,
    optimisation: OptimisationId,
    route: RouteId,
    state: RouteState,
) -> Result<()> {
    store.update_optimisation(optimisation, |opt| {
        opt.log.append(
            LogEvent::RouteStateChange,
            json!({ "route": route, "state": state }),
        );
    })
}

/// Promote route and optimisation to RUNNING when the driver starts
/// working.
fn process_possible_running(
    store: &Store,
    events: &dyn EventSink,
    tracked: &TrackedPoint,
) -> Result<()> {
    let route = store.route(tracked.route)?;
    if route.state == RouteState::Created {
        store.update_route(tracked.route, |r| r.state = RouteState::Running)?;
        log_route_state(store, tracked.optimisation, tracked.route, RouteState::Running)?;
        info!(route = tracked.route, "route running");
    }
    let opt = store.optimisation(tracked.optimisation)?;
    if opt.state == OptimisationState::Completed {
        store.update_optimisation(tracked.optimisation, |o| {
            o.state_to(OptimisationState::Running, None)
        })??;
        events.emit(DomainEvent::OptimisationChanged {
            optimisation: tracked.optimisation,
        });
    }
    Ok(())
}

/// Whether every job point of the route is settled: the job is either
/// deleted in the order domain or in a terminal status. Returns the
/// settled flag and how many job points the route has.
pub(crate) fn route_jobs_settled_locked(
    table: &crate::store::PointTable,
    jobs: &dyn JobDomain,
    route: RouteId,
) -> (bool, usize) {
    let job_ids: Vec<JobId> = table
        .route_points(route)
        .iter()
        .filter_map(|p| p.subject.and_then(|s| s.job_id()))
        .collect();
    let remaining = job_ids
        .iter()
        .filter(|&&job| !jobs.is_deleted(job))
        .filter(|&&job| !jobs.status(job).is_some_and(|s| s.is_terminal()))
        .count();
    (remaining == 0, job_ids.len())
}

fn route_jobs_settled(store: &Store, jobs: &dyn JobDomain, route: RouteId) -> (bool, usize) {
    store.with_points(|table| route_jobs_settled_locked(table, jobs, route))
}

/// Finish the route if nothing on it can change anymore. A route whose
/// job points have all disappeared is deleted instead of finished.
pub(crate) fn process_possible_finished_route(
    store: &Store,
    jobs: &dyn JobDomain,
    events: &dyn EventSink,
    optimisation: OptimisationId,
    route_id: RouteId,
) -> Result<()> {
    let route = store.route(route_id)?;
    let (settled, job_points) = route_jobs_settled(store, jobs, route_id);
    if job_points == 0 {
        store.delete_route(route_id);
        store.update_optimisation(optimisation, |opt| {
            opt.log.append(
                LogEvent::Message,
                json!({ "code": "route_deleted", "route": route_id }),
            );
        })?;
        events.emit(DomainEvent::RouteRemoved {
            optimisation,
            route: route_id,
            driver: route.driver_id,
        });
        return Ok(());
    }
    // Only live routes finish; a failed route keeps its verdict.
    if settled && matches!(route.state, RouteState::Created | RouteState::Running) {
        store.update_route(route_id, |r| r.state = RouteState::Finished)?;
        log_route_state(store, optimisation, route_id, RouteState::Finished)?;
        info!(route = route_id, "route finished");
    }
    Ok(())
}

/// Finish the optimisation once every job on every remaining route is
/// settled.
pub(crate) fn process_possible_finished_optimisation(
    store: &Store,
    jobs: &dyn JobDomain,
    events: &dyn EventSink,
    optimisation: OptimisationId,
) -> Result<()> {
    let opt = store.optimisation(optimisation)?;
    if opt.state != OptimisationState::Running {
        return Ok(());
    }
    let all_settled = store
        .routes_for_optimisation(optimisation)
        .iter()
        .all(|route| route_jobs_settled(store, jobs, route.id).0);
    if all_settled {
        store.update_optimisation(optimisation, |o| {
            o.state_to(OptimisationState::Finished, None)
        })??;
        events.emit(DomainEvent::OptimisationChanged { optimisation });
        info!(optimisation, "optimisation finished");
    }
    Ok(())
}

/// React to one job status change.
pub fn track_job_status(
    store: &Store,
    jobs: &dyn JobDomain,
    events: &dyn EventSink,
    job: JobId,
) -> Result<()> {
    let Some(status) = jobs.status(job) else {
        debug!(job, "job unknown to the order domain");
        return Ok(());
    };
    let Some(tracked) = find_tracked_point(store, job) else {
        debug!(job, "job not tracked by any active optimisation");
        return Ok(());
    };

    if status.is_route_start() {
        process_possible_running(store, events, &tracked)?;
    }
    if status.is_terminal() {
        process_possible_finished_route(store, jobs, events, tracked.optimisation, tracked.route)?;
        process_possible_finished_optimisation(store, jobs, events, tracked.optimisation)?;
    }
    Ok(())
}
