#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use routeflow::engine::result::{AssignmentResult, DriverTour, TourStop};
use routeflow::engine::{Clusterer, EngineOptions, EngineParameters, Solver};
use routeflow::engine::ApiUsage;
use routeflow::errors::{OptimisationError, Result};
use routeflow::events::{DomainEvent, EventSink};
use routeflow::jobs::JobDomain;
use routeflow::model::point::{PointKind, PointSubject};
use routeflow::types::{DriverId, JobId, JobStatus};

/// What the fake solver should do for a given driver's cluster.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    /// Assign every job in the cluster to its first driver.
    Assign,
    /// Fail with a validation error.
    Validation(String),
    /// Fail with a solver error.
    SolverError(String),
    /// Sleep, then assign. Long enough sleeps trip the soft time limit.
    Delay(Duration),
}

/// Build the trivial assignment: all jobs of the cluster on the first
/// driver, in input order.
pub fn echo_assignment(params: &EngineParameters) -> AssignmentResult {
    let Some(driver) = params.drivers.first() else {
        return AssignmentResult::default();
    };
    let stops: Vec<TourStop> = params
        .jobs
        .iter()
        .map(|job| TourStop {
            kind: PointKind::Delivery,
            subject: Some(PointSubject::Job(job.id)),
            service_time_secs: job.service_time_secs,
            driving_time_secs: 600,
            distance_meters: 5000,
            start_time: None,
            end_time: None,
            polyline: None,
        })
        .collect();
    AssignmentResult {
        tours: vec![DriverTour {
            driver_id: driver.id,
            driving_time_secs: 600 * stops.len() as u64,
            driving_distance_meters: 5000 * stops.len() as u64,
            full_time_secs: stops.iter().map(|s| s.service_time_secs + 600).sum(),
            start_time: None,
            end_time: None,
            stops,
        }],
        skipped: vec![],
        skipped_drivers: params.drivers.iter().skip(1).map(|d| d.id).collect(),
    }
}

/// Scripted solver. Outcomes are keyed by the first driver of the cluster;
/// unscripted clusters get the trivial assignment.
#[derive(Default)]
pub struct FakeSolver {
    script: Mutex<HashMap<DriverId, ScriptedOutcome>>,
}

impl FakeSolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_for_driver(&self, driver: DriverId, outcome: ScriptedOutcome) {
        self.script.lock().unwrap().insert(driver, outcome);
    }
}

impl Solver for FakeSolver {
    fn solve(
        &self,
        options: EngineOptions,
    ) -> Pin<Box<dyn Future<Output = Result<AssignmentResult>> + Send + '_>> {
        let outcome = options
            .params
            .drivers
            .first()
            .and_then(|d| self.script.lock().unwrap().get(&d.id).cloned())
            .unwrap_or(ScriptedOutcome::Assign);
        Box::pin(async move {
            match outcome {
                ScriptedOutcome::Assign => Ok(echo_assignment(&options.params)),
                ScriptedOutcome::Validation(msg) => Err(OptimisationError::Validation(msg)),
                ScriptedOutcome::SolverError(msg) => Err(OptimisationError::Solver(msg)),
                ScriptedOutcome::Delay(duration) => {
                    tokio::time::sleep(duration).await;
                    Ok(echo_assignment(&options.params))
                }
            }
        })
    }
}

/// Clusterer splitting one group per driver. Jobs are distributed
/// round-robin over the groups.
#[derive(Default)]
pub struct FakeClusterer {
    pub api_calls: u64,
}

impl FakeClusterer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_calls(api_calls: u64) -> Self {
        Self { api_calls }
    }
}

impl Clusterer for FakeClusterer {
    fn estimate(&self, params: &EngineParameters) -> usize {
        params.drivers.len()
    }

    fn split(&self, params: EngineParameters) -> Result<(Vec<EngineParameters>, ApiUsage)> {
        let mut usage = ApiUsage::default();
        if self.api_calls > 0 {
            usage.record("directions", self.api_calls);
        }
        if params.drivers.len() <= 1 {
            return Ok((vec![params], usage));
        }
        let mut groups: Vec<EngineParameters> = params
            .drivers
            .iter()
            .map(|driver| EngineParameters {
                jobs: vec![],
                drivers: vec![driver.clone()],
                constraints: params.constraints.clone(),
            })
            .collect();
        for (idx, job) in params.jobs.into_iter().enumerate() {
            let group = idx % groups.len();
            groups[group].jobs.push(job);
        }
        Ok((groups, usage))
    }
}

#[derive(Default)]
struct JobsInner {
    statuses: HashMap<JobId, JobStatus>,
    deleted: HashSet<JobId>,
    unassigned: Vec<(DriverId, Vec<JobId>)>,
}

/// In-memory stand-in for the order domain.
#[derive(Default)]
pub struct InMemoryJobs {
    inner: Mutex<JobsInner>,
}

impl InMemoryJobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, job: JobId, status: JobStatus) {
        self.inner.lock().unwrap().statuses.insert(job, status);
    }

    pub fn delete(&self, job: JobId) {
        self.inner.lock().unwrap().deleted.insert(job);
    }

    /// Unassign calls recorded so far, in call order.
    pub fn unassign_calls(&self) -> Vec<(DriverId, Vec<JobId>)> {
        self.inner.lock().unwrap().unassigned.clone()
    }
}

impl JobDomain for InMemoryJobs {
    fn status(&self, job: JobId) -> Option<JobStatus> {
        self.inner.lock().unwrap().statuses.get(&job).copied()
    }

    fn is_deleted(&self, job: JobId) -> bool {
        self.inner.lock().unwrap().deleted.contains(&job)
    }

    fn bulk_unassign(&self, driver: DriverId, jobs: &[JobId]) {
        let mut inner = self.inner.lock().unwrap();
        for job in jobs {
            inner.statuses.insert(*job, JobStatus::NotAssigned);
        }
        inner.unassigned.push((driver, jobs.to_vec()));
    }
}

/// Event sink that records everything it is given.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&DomainEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| predicate(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: DomainEvent) {
        self.events.lock().unwrap().push(event);
    }
}
