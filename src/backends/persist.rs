// src/backends/persist.rs

//! Turning a solver result into persisted routes and points.

use serde_json::json;
use tracing::info;

use crate::engine::result::{AssignmentResult, DriverTour};
use crate::errors::Result;
use crate::model::log::LogEvent;
use crate::model::route::{DriverRoute, RouteColorPicker, RouteState};
use crate::model::point::RoutePoint;
use crate::store::Store;
use crate::types::{DriverId, OptimisationId, RouteId};

/// Persist one tour as a route plus its numbered points.
fn persist_tour(
    store: &Store,
    optimisation: OptimisationId,
    tour: &DriverTour,
    color: String,
) -> RouteId {
    let route_id = store.insert_route(DriverRoute {
        id: 0,
        optimisation_id: optimisation,
        driver_id: tour.driver_id,
        color,
        state: RouteState::Created,
        total_time_secs: Some(tour.full_time_secs),
        driving_time_secs: Some(tour.driving_time_secs),
        driving_distance_meters: Some(tour.driving_distance_meters),
        start_time: tour.start_time,
        end_time: tour.end_time,
    });
    store.with_points(|table| {
        for (idx, stop) in tour.stops.iter().enumerate() {
            table.insert(RoutePoint {
                id: 0,
                route_id,
                kind: stop.kind,
                subject: stop.subject,
                number: (idx + 1) as u32,
                service_time_secs: stop.service_time_secs,
                driving_time_secs: stop.driving_time_secs,
                distance_meters: stop.distance_meters,
                start_time: stop.start_time,
                end_time: stop.end_time,
                path_polyline: stop.polyline.clone(),
            });
        }
    });
    route_id
}

/// Persist a combined assignment: one route per tour, colors unique within
/// the optimisation, points numbered 1..N in visit order. Skipped jobs are
/// always written to the optimisation log, even for a good result.
pub fn persist_assignment(
    store: &Store,
    optimisation: OptimisationId,
    result: &AssignmentResult,
) -> Result<()> {
    let mut picker = RouteColorPicker::new();
    let used = store.used_colors(optimisation);
    for tour in &result.tours {
        let color = picker.pick(&used);
        let route_id = persist_tour(store, optimisation, tour, color);
        info!(
            optimisation,
            route = route_id,
            driver = tour.driver_id,
            stops = tour.stops.len(),
            "route persisted"
        );
    }
    if !result.skipped.is_empty() || !result.skipped_drivers.is_empty() {
        store.update_optimisation(optimisation, |opt| {
            opt.log.append(
                LogEvent::Message,
                json!({
                    "code": "skipped_jobs",
                    "jobs": result.skipped,
                    "drivers": result.skipped_drivers,
                }),
            );
        })?;
    }
    Ok(())
}

/// Replace a single driver's route with a freshly computed tour. Used by
/// the refresh path; the rest of the optimisation stays untouched.
pub fn replace_driver_route(
    store: &Store,
    optimisation: OptimisationId,
    driver: DriverId,
    tour: &DriverTour,
) -> Result<RouteId> {
    let old: Vec<DriverRoute> = store
        .routes_for_optimisation(optimisation)
        .into_iter()
        .filter(|r| r.driver_id == driver)
        .collect();
    // Keep the driver's color stable across refreshes where possible.
    let color = match old.first() {
        Some(route) => route.color.clone(),
        None => RouteColorPicker::new().pick(&store.used_colors(optimisation)),
    };
    for route in &old {
        store.delete_route(route.id);
    }
    Ok(persist_tour(store, optimisation, tour, color))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::result::TourStop;
    use crate::model::point::{PointKind, PointSubject};

    fn tour(driver: DriverId, jobs: &[u64]) -> DriverTour {
        DriverTour {
            driver_id: driver,
            stops: jobs
                .iter()
                .map(|&j| TourStop {
                    kind: PointKind::Delivery,
                    subject: Some(PointSubject::Job(j)),
                    service_time_secs: 300,
                    driving_time_secs: 600,
                    distance_meters: 4000,
                    start_time: None,
                    end_time: None,
                    polyline: None,
                })
                .collect(),
            full_time_secs: 3600,
            driving_time_secs: 1800,
            driving_distance_meters: 12000,
            start_time: None,
            end_time: None,
        }
    }

    #[test]
    fn persisted_points_are_numbered_from_one() {
        let store = Store::new();
        let result = AssignmentResult {
            tours: vec![tour(1, &[10, 11, 12]), tour(2, &[20])],
            ..Default::default()
        };
        persist_assignment(&store, 1, &result).unwrap();
        let routes = store.routes_for_optimisation(1);
        assert_eq!(routes.len(), 2);
        assert_ne!(routes[0].color, routes[1].color);
        let numbers: Vec<u32> = store.with_points(|t| {
            t.route_points(routes[0].id).iter().map(|p| p.number).collect()
        });
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn replace_keeps_driver_color() {
        let store = Store::new();
        let result = AssignmentResult {
            tours: vec![tour(1, &[10, 11])],
            ..Default::default()
        };
        persist_assignment(&store, 1, &result).unwrap();
        let before = store.routes_for_optimisation(1);
        let new_route = replace_driver_route(&store, 1, 1, &tour(1, &[11, 10])).unwrap();
        let after = store.route(new_route).unwrap();
        assert_eq!(after.color, before[0].color);
        assert_eq!(store.routes_for_optimisation(1).len(), 1);
    }
}
