#![allow(dead_code)]

use chrono::NaiveDate;
use serde_json::{json, Value};

use routeflow::lifecycle::NewOptimisation;
use routeflow::types::{DriverId, JobId, OptimisationType};

/// Builder for the submission payload of an optimisation, including its
/// options blob.
pub struct OptimisationBuilder {
    optimisation_type: OptimisationType,
    merchant_id: u64,
    created_by: Option<u64>,
    day: NaiveDate,
    jobs: Vec<Value>,
    drivers: Vec<Value>,
    constraints: Value,
}

impl OptimisationBuilder {
    pub fn new(optimisation_type: OptimisationType) -> Self {
        Self {
            optimisation_type,
            merchant_id: 1,
            created_by: None,
            day: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            jobs: Vec::new(),
            drivers: Vec::new(),
            constraints: Value::Null,
        }
    }

    pub fn advanced() -> Self {
        Self::new(OptimisationType::Advanced)
    }

    pub fn solo() -> Self {
        Self::new(OptimisationType::Solo)
    }

    pub fn merchant(mut self, merchant_id: u64) -> Self {
        self.merchant_id = merchant_id;
        self
    }

    pub fn created_by(mut self, member: u64) -> Self {
        self.created_by = Some(member);
        self
    }

    pub fn day(mut self, day: NaiveDate) -> Self {
        self.day = day;
        self
    }

    pub fn with_job(mut self, id: JobId) -> Self {
        self.jobs.push(json!({
            "id": id,
            "delivery": {"lat": 59.91 + id as f64 * 0.001, "lng": 10.75},
            "service_time_secs": 300,
        }));
        self
    }

    pub fn with_jobs(mut self, ids: impl IntoIterator<Item = JobId>) -> Self {
        for id in ids {
            self = self.with_job(id);
        }
        self
    }

    pub fn with_driver(mut self, id: DriverId) -> Self {
        self.drivers.push(json!({"id": id, "capacity": 20}));
        self
    }

    pub fn with_drivers(mut self, ids: impl IntoIterator<Item = DriverId>) -> Self {
        for id in ids {
            self = self.with_driver(id);
        }
        self
    }

    pub fn constraints(mut self, constraints: Value) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn build(self) -> NewOptimisation {
        let optimisation_options = json!({
            "jobs": self.jobs,
            "drivers": self.drivers,
            "constraints": self.constraints,
        });
        NewOptimisation {
            optimisation_type: self.optimisation_type,
            merchant_id: self.merchant_id,
            created_by: self.created_by,
            day: self.day,
            options: Value::Null,
            optimisation_options,
            external_source: None,
        }
    }
}
