// src/tracking/remove_point.rs

//! Removing route points when their subject disappears from the order
//! domain (deleted or unassigned jobs).
//!
//! The whole operation runs under the exclusive route-point table lock:
//! removal, renumbering of the remaining points, and the follow-up
//! finished/deleted evaluation of every affected route. Concurrent
//! removals can never interleave their renumbering.

use std::collections::BTreeSet;

use serde_json::json;
use tracing::info;

use crate::errors::Result;
use crate::events::{DomainEvent, EventSink};
use crate::jobs::JobDomain;
use crate::model::log::LogEvent;
use crate::model::optimisation::OptimisationState;
use crate::model::point::PointSubject;
use crate::model::route::RouteState;
use crate::store::Store;
use crate::tracking::state_change::route_jobs_settled_locked;
use crate::types::{OptimisationId, RemovalReason, RouteId};

/// Remove every point whose subject is in `subjects`, renumber the
/// remaining points of each touched route, and re-evaluate the affected
/// routes and optimisations.
pub fn remove_route_points(
    store: &Store,
    jobs: &dyn JobDomain,
    events: &dyn EventSink,
    subjects: &[PointSubject],
    reason: RemovalReason,
) -> Result<()> {
    let affected = store.with_points(|table| -> Result<BTreeSet<(OptimisationId, RouteId)>> {
        // Match points, skipping optimisations that are already removed.
        let mut matched = Vec::new();
        for point in table.iter() {
            let Some(subject) = point.subject else {
                continue;
            };
            if !subjects.contains(&subject) {
                continue;
            }
            let route = store.route(point.route_id)?;
            let opt = store.optimisation(route.optimisation_id)?;
            if opt.state == OptimisationState::Removed {
                continue;
            }
            matched.push((point.id, route.optimisation_id));
        }

        let mut affected = BTreeSet::new();
        for (point_id, optimisation) in matched {
            // Numbers shift as earlier removals land, so re-read the point
            // instead of trusting the matched snapshot.
            let Some(point) = table.get(point_id).cloned() else {
                continue;
            };
            // Later points on the same route slide down one position.
            for other in table.iter_mut() {
                if other.route_id == point.route_id && other.number > point.number {
                    other.number -= 1;
                }
            }
            table.remove(point.id);
            store.update_optimisation(optimisation, |opt| {
                opt.log.append(
                    LogEvent::RemovePoint,
                    json!({
                        "route": point.route_id,
                        "subject": point.subject,
                        "number": point.number,
                        "reason": reason,
                    }),
                );
            })?;
            info!(
                route = point.route_id,
                number = point.number,
                ?reason,
                "route point removed"
            );
            affected.insert((optimisation, point.route_id));
        }

        // Re-evaluate every touched route before the lock is released.
        for &(optimisation, route_id) in &affected {
            let route = store.route(route_id)?;
            let (settled, job_points) = route_jobs_settled_locked(table, jobs, route_id);
            if job_points == 0 {
                table.remove_route(route_id);
                store.remove_route_record(route_id);
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
            } else if settled && matches!(route.state, RouteState::Created | RouteState::Running) {
                store.update_route(route_id, |r| r.state = RouteState::Finished)?;
            }
        }
        Ok(affected)
    })?;

    let optimisations: BTreeSet<OptimisationId> =
        affected.iter().map(|(opt, _)| *opt).collect();
    for optimisation in optimisations {
        super::state_change::process_possible_finished_optimisation(
            store,
            jobs,
            events,
            optimisation,
        )?;
        events.emit(DomainEvent::OptimisationChanged { optimisation });
    }
    Ok(())
}
