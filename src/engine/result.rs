// src/engine/result.rs

//! Solver output and failure classification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::OptimisationError;
use crate::model::point::{PointKind, PointSubject};
use crate::types::{DriverId, JobId};

/// One stop of a computed tour, in visit order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TourStop {
    pub kind: PointKind,
    pub subject: Option<PointSubject>,
    pub service_time_secs: u64,
    pub driving_time_secs: u64,
    pub distance_meters: u64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub polyline: Option<String>,
}

/// One driver's computed tour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverTour {
    pub driver_id: DriverId,
    pub stops: Vec<TourStop>,
    pub full_time_secs: u64,
    pub driving_time_secs: u64,
    pub driving_distance_meters: u64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// A job the solver could not place on any tour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedJob {
    pub job_id: JobId,
    pub reason: String,
}

/// The combined outcome of one or more engine runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentResult {
    pub tours: Vec<DriverTour>,
    pub skipped: Vec<SkippedJob>,
    /// Drivers that ended up without a tour.
    #[serde(default)]
    pub skipped_drivers: Vec<DriverId>,
}

impl AssignmentResult {
    /// A result is good when it produced at least one tour. Skipped jobs
    /// alone do not make a result bad.
    pub fn is_good(&self) -> bool {
        !self.tours.is_empty()
    }
}

/// How an engine run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Validation,
    Solver,
    SoftTimeout,
    Unexpected,
}

impl FailureKind {
    /// Severity for picking the failure reported to the merchant when
    /// several runs failed for different reasons. Higher wins.
    pub fn priority(self) -> u8 {
        match self {
            FailureKind::Validation => 3,
            FailureKind::Solver => 2,
            FailureKind::SoftTimeout => 1,
            FailureKind::Unexpected => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn classify(err: &OptimisationError) -> Self {
        let kind = match err {
            OptimisationError::Validation(_) => FailureKind::Validation,
            OptimisationError::Solver(_) => FailureKind::Solver,
            OptimisationError::SoftTimeout(_) => FailureKind::SoftTimeout,
            _ => FailureKind::Unexpected,
        };
        Failure {
            kind,
            message: err.to_string(),
        }
    }
}
