// src/store.rs

//! In-memory persistence with the locking semantics the orchestration
//! relies on.
//!
//! Three guarantees matter here:
//! - `claim_finalize` is a conditional update on the task status, so exactly
//!   one caller can ever win finalization for an optimisation;
//! - the route-point table sits behind a single exclusive lock, so removal,
//!   renumbering and the follow-up scans happen as one atomic unit;
//! - everything else is plain read-modify-write, last writer wins.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};

use crate::errors::{OptimisationError, Result};
use crate::model::{
    DriverRoute, EngineRun, OptimisationTask, RouteOptimisation, RoutePoint, TaskStatus,
};
use crate::types::{
    CorrelationId, EngineRunId, OptimisationId, PointId, RouteId,
};

/// The route-point table. Only reachable through [`Store::with_points`],
/// which holds the exclusive lock for the duration of the closure.
#[derive(Debug, Default)]
pub struct PointTable {
    points: HashMap<PointId, RoutePoint>,
    next_id: u64,
}

impl PointTable {
    pub fn insert(&mut self, mut point: RoutePoint) -> PointId {
        self.next_id += 1;
        point.id = self.next_id;
        let id = point.id;
        self.points.insert(id, point);
        id
    }

    pub fn get(&self, id: PointId) -> Option<&RoutePoint> {
        self.points.get(&id)
    }

    pub fn remove(&mut self, id: PointId) -> Option<RoutePoint> {
        self.points.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoutePoint> {
        self.points.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RoutePoint> {
        self.points.values_mut()
    }

    /// Points of one route in visit order.
    pub fn route_points(&self, route: RouteId) -> Vec<RoutePoint> {
        let mut points: Vec<RoutePoint> = self
            .points
            .values()
            .filter(|p| p.route_id == route)
            .cloned()
            .collect();
        points.sort_by_key(|p| p.number);
        points
    }

    /// Drop all points of a route (route deletion cascades here).
    pub fn remove_route(&mut self, route: RouteId) {
        self.points.retain(|_, p| p.route_id != route);
    }
}

#[derive(Debug, Default)]
pub struct Store {
    optimisations: RwLock<HashMap<OptimisationId, RouteOptimisation>>,
    routes: RwLock<HashMap<RouteId, DriverRoute>>,
    engine_runs: RwLock<HashMap<EngineRunId, EngineRun>>,
    points: Mutex<PointTable>,
    tasks: Mutex<HashMap<OptimisationId, OptimisationTask>>,
    next_optimisation_id: AtomicU64,
    next_route_id: AtomicU64,
    next_engine_run_id: AtomicU64,
    next_correlation_id: AtomicU64,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_correlation_id(&self) -> CorrelationId {
        self.next_correlation_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    // --- optimisations -----------------------------------------------------

    /// Insert a new optimisation, assigning its id and creating the 1:1
    /// task record.
    pub fn insert_optimisation(&self, mut opt: RouteOptimisation) -> OptimisationId {
        let id = self.next_optimisation_id.fetch_add(1, Ordering::Relaxed) + 1;
        opt.id = id;
        self.optimisations.write().unwrap().insert(id, opt);
        self.tasks
            .lock()
            .unwrap()
            .insert(id, OptimisationTask::new(id));
        id
    }

    pub fn optimisation(&self, id: OptimisationId) -> Result<RouteOptimisation> {
        self.optimisations
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| OptimisationError::not_found("optimisation", id))
    }

    pub fn update_optimisation<R>(
        &self,
        id: OptimisationId,
        f: impl FnOnce(&mut RouteOptimisation) -> R,
    ) -> Result<R> {
        let mut guard = self.optimisations.write().unwrap();
        let opt = guard
            .get_mut(&id)
            .ok_or_else(|| OptimisationError::not_found("optimisation", id))?;
        Ok(f(opt))
    }

    pub fn optimisation_ids(&self) -> Vec<OptimisationId> {
        self.optimisations.read().unwrap().keys().copied().collect()
    }

    // --- routes ------------------------------------------------------------

    pub fn insert_route(&self, mut route: DriverRoute) -> RouteId {
        let id = self.next_route_id.fetch_add(1, Ordering::Relaxed) + 1;
        route.id = id;
        self.routes.write().unwrap().insert(id, route);
        id
    }

    pub fn route(&self, id: RouteId) -> Result<DriverRoute> {
        self.routes
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| OptimisationError::not_found("route", id))
    }

    pub fn update_route<R>(
        &self,
        id: RouteId,
        f: impl FnOnce(&mut DriverRoute) -> R,
    ) -> Result<R> {
        let mut guard = self.routes.write().unwrap();
        let route = guard
            .get_mut(&id)
            .ok_or_else(|| OptimisationError::not_found("route", id))?;
        Ok(f(route))
    }

    pub fn routes_for_optimisation(&self, optimisation: OptimisationId) -> Vec<DriverRoute> {
        let mut routes: Vec<DriverRoute> = self
            .routes
            .read()
            .unwrap()
            .values()
            .filter(|r| r.optimisation_id == optimisation)
            .cloned()
            .collect();
        routes.sort_by_key(|r| r.id);
        routes
    }

    /// Delete a route and all its points.
    ///
    /// Lock order is points before routes, everywhere. Callers already
    /// inside [`Store::with_points`] must clear the points themselves and
    /// use [`Store::remove_route_record`] instead.
    pub fn delete_route(&self, id: RouteId) {
        let mut points = self.points.lock().unwrap();
        points.remove_route(id);
        self.routes.write().unwrap().remove(&id);
    }

    /// Remove only the route record. Safe to call while holding the point
    /// table lock.
    pub fn remove_route_record(&self, id: RouteId) {
        self.routes.write().unwrap().remove(&id);
    }

    /// Colors already taken inside an optimisation.
    pub fn used_colors(&self, optimisation: OptimisationId) -> Vec<String> {
        self.routes
            .read()
            .unwrap()
            .values()
            .filter(|r| r.optimisation_id == optimisation)
            .map(|r| r.color.clone())
            .collect()
    }

    // --- points ------------------------------------------------------------

    /// Run `f` while holding the exclusive route-point table lock.
    pub fn with_points<R>(&self, f: impl FnOnce(&mut PointTable) -> R) -> R {
        let mut guard = self.points.lock().unwrap();
        f(&mut guard)
    }

    // --- engine runs -------------------------------------------------------

    pub fn insert_engine_run(&self, mut run: EngineRun) -> EngineRunId {
        let id = self.next_engine_run_id.fetch_add(1, Ordering::Relaxed) + 1;
        run.id = id;
        self.engine_runs.write().unwrap().insert(id, run);
        id
    }

    pub fn engine_run(&self, id: EngineRunId) -> Result<EngineRun> {
        self.engine_runs
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| OptimisationError::not_found("engine run", id))
    }

    pub fn update_engine_run<R>(
        &self,
        id: EngineRunId,
        f: impl FnOnce(&mut EngineRun) -> R,
    ) -> Result<R> {
        let mut guard = self.engine_runs.write().unwrap();
        let run = guard
            .get_mut(&id)
            .ok_or_else(|| OptimisationError::not_found("engine run", id))?;
        Ok(f(run))
    }

    pub fn engine_runs_for(&self, optimisation: OptimisationId) -> Vec<EngineRun> {
        let mut runs: Vec<EngineRun> = self
            .engine_runs
            .read()
            .unwrap()
            .values()
            .filter(|r| r.optimisation_id == optimisation)
            .cloned()
            .collect();
        runs.sort_by_key(|r| r.id);
        runs
    }

    /// Whether any engine run of the optimisation is still in the
    /// calculating set.
    pub fn any_run_calculating(&self, optimisation: OptimisationId) -> bool {
        self.engine_runs
            .read()
            .unwrap()
            .values()
            .any(|r| r.optimisation_id == optimisation && r.state.is_calculating())
    }

    // --- tasks -------------------------------------------------------------

    pub fn task(&self, optimisation: OptimisationId) -> Result<OptimisationTask> {
        self.tasks
            .lock()
            .unwrap()
            .get(&optimisation)
            .cloned()
            .ok_or_else(|| OptimisationError::not_found("task", optimisation))
    }

    pub fn update_task<R>(
        &self,
        optimisation: OptimisationId,
        f: impl FnOnce(&mut OptimisationTask) -> R,
    ) -> Result<R> {
        let mut guard = self.tasks.lock().unwrap();
        let task = guard
            .get_mut(&optimisation)
            .ok_or_else(|| OptimisationError::not_found("task", optimisation))?;
        Ok(f(task))
    }

    /// Conditional update: move the task to `Completed` and report whether
    /// this call was the one that did it.
    ///
    /// Callers that get `false` must not run finalization; somebody else
    /// already owns it.
    pub fn claim_finalize(&self, optimisation: OptimisationId) -> Result<bool> {
        let mut guard = self.tasks.lock().unwrap();
        let task = guard
            .get_mut(&optimisation)
            .ok_or_else(|| OptimisationError::not_found("task", optimisation))?;
        if task.status == TaskStatus::Completed {
            return Ok(false);
        }
        task.status = TaskStatus::Completed;
        task.append_log("finalization claimed");
        Ok(true)
    }

    /// Mark the task completed without caring who wins (termination and the
    /// small path use this).
    pub fn complete_task(&self, optimisation: OptimisationId) -> Result<()> {
        self.update_task(optimisation, |task| {
            if task.status != TaskStatus::Completed {
                task.status = TaskStatus::Completed;
                task.append_log("task completed");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::optimisation::OptimisationState;
    use crate::model::OptimisationLog;
    use crate::types::OptimisationType;
    use chrono::NaiveDate;

    fn sample_optimisation() -> RouteOptimisation {
        RouteOptimisation {
            id: 0,
            optimisation_type: OptimisationType::Advanced,
            merchant_id: 1,
            created_by: None,
            day: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
            options: serde_json::Value::Null,
            optimisation_options: serde_json::Value::Null,
            state: OptimisationState::Created,
            customers_notified: false,
            is_removing_currently: false,
            terminated: false,
            external_source: None,
            api_usage: HashMap::new(),
            log: OptimisationLog::default(),
        }
    }

    #[test]
    fn insert_assigns_ids_and_creates_task() {
        let store = Store::new();
        let a = store.insert_optimisation(sample_optimisation());
        let b = store.insert_optimisation(sample_optimisation());
        assert_ne!(a, b);
        assert_eq!(store.task(a).unwrap().status, TaskStatus::Created);
        assert_eq!(store.task(b).unwrap().status, TaskStatus::Created);
    }

    #[test]
    fn claim_finalize_wins_exactly_once() {
        let store = Store::new();
        let id = store.insert_optimisation(sample_optimisation());
        assert!(store.claim_finalize(id).unwrap());
        assert!(!store.claim_finalize(id).unwrap());
        assert!(!store.claim_finalize(id).unwrap());
    }

    #[test]
    fn claim_finalize_races_have_one_winner() {
        use std::sync::Arc;
        let store = Arc::new(Store::new());
        let id = store.insert_optimisation(sample_optimisation());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                store.claim_finalize(id).unwrap()
            }));
        }
        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
    }
}
