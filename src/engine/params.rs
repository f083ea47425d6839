// src/engine/params.rs

//! Validated engine input: the job/driver snapshot an optimisation was
//! submitted with.
//!
//! These structs deserialize straight from the optimisation's
//! `optimisation_options` blob, so field names are part of the submission
//! format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{OptimisationError, Result};
use crate::types::{DriverId, HubId, JobId};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// One job to be routed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub id: JobId,
    #[serde(default)]
    pub pickup: Option<LatLng>,
    pub delivery: LatLng,
    #[serde(default)]
    pub window: Option<TimeWindow>,
    #[serde(default)]
    pub service_time_secs: u64,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub capacity: u32,
}

/// One driver available for routing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverSpec {
    pub id: DriverId,
    #[serde(default)]
    pub start_hub: Option<HubId>,
    #[serde(default)]
    pub end_hub: Option<HubId>,
    #[serde(default)]
    pub window: Option<TimeWindow>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub capacity: u32,
    #[serde(default)]
    pub breaks: Vec<TimeWindow>,
}

/// The full validated engine input for one optimisation or one cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineParameters {
    pub jobs: Vec<JobSpec>,
    pub drivers: Vec<DriverSpec>,
    /// Constraint knobs passed through to the solver untouched.
    #[serde(default)]
    pub constraints: Value,
}

impl EngineParameters {
    /// Deserialize parameters from an optimisation's options blob.
    pub fn from_options(options: &Value) -> Result<Self> {
        serde_json::from_value(options.clone())
            .map_err(|e| OptimisationError::Validation(format!("bad optimisation options: {e}")))
    }

    pub fn job_ids(&self) -> Vec<JobId> {
        self.jobs.iter().map(|j| j.id).collect()
    }

    pub fn driver_ids(&self) -> Vec<DriverId> {
        self.drivers.iter().map(|d| d.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_minimal_options_blob() {
        let blob = json!({
            "jobs": [{"id": 11, "delivery": {"lat": 59.9, "lng": 10.7}}],
            "drivers": [{"id": 3}],
        });
        let params = EngineParameters::from_options(&blob).unwrap();
        assert_eq!(params.job_ids(), vec![11]);
        assert_eq!(params.driver_ids(), vec![3]);
    }

    #[test]
    fn rejects_malformed_blob() {
        let err = EngineParameters::from_options(&json!({"jobs": 5})).unwrap_err();
        assert!(matches!(err, OptimisationError::Validation(_)));
    }
}
