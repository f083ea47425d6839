// src/jobs.rs

//! Boundary to the order/job domain.
//!
//! The orchestration never owns jobs; it only asks about their status and,
//! on deletion, pushes previously unassigned ones back to the pool.

use crate::types::{DriverId, JobId, JobStatus};

pub trait JobDomain: Send + Sync {
    /// Current status of a job, or `None` if the job is unknown.
    fn status(&self, job: JobId) -> Option<JobStatus>;

    /// Whether the job has been deleted in the order domain. Deleted jobs
    /// are ignored by the possible-finished scan.
    fn is_deleted(&self, job: JobId) -> bool;

    /// Return the given jobs to the unassigned pool, detaching them from
    /// `driver`. Only called for jobs the optimisation itself assigned.
    fn bulk_unassign(&self, driver: DriverId, jobs: &[JobId]);
}
