// src/engine/mod.rs

//! Engine-facing traits and types.
//!
//! The solver and clusterer are external collaborators: production wires in
//! real implementations, tests provide fakes. Orchestration only ever talks
//! to the traits.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::errors::Result;

pub mod params;
pub mod result;

pub use params::{DriverSpec, EngineParameters, JobSpec, LatLng, TimeWindow};
pub use result::{AssignmentResult, DriverTour, Failure, FailureKind, SkippedJob, TourStop};

/// Which solver algorithm to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Full multi-driver assignment.
    Default,
    /// Re-route a single driver, keeping everyone else untouched.
    OneDriver,
}

/// Everything one engine run needs: parameters plus the algorithm choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineOptions {
    pub params: EngineParameters,
    pub algorithm: Algorithm,
}

/// Counters of external-API calls made on behalf of an optimisation
/// (distance matrices, geocoding). Used for cost accounting only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiUsage {
    counters: HashMap<String, u64>,
}

impl ApiUsage {
    pub fn record(&mut self, api: impl Into<String>, calls: u64) {
        *self.counters.entry(api.into()).or_insert(0) += calls;
    }

    pub fn merge_into(self, target: &mut HashMap<String, u64>) {
        for (api, calls) in self.counters {
            *target.entry(api).or_insert(0) += calls;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    pub fn counters(&self) -> &HashMap<String, u64> {
        &self.counters
    }
}

/// Trait abstracting the routing engine.
///
/// Production code wraps the real engine; tests provide scripted fakes.
pub trait Solver: Send + Sync {
    /// Run one assignment over the given options.
    ///
    /// The caller enforces the soft time limit; implementations should just
    /// run to completion.
    fn solve(
        &self,
        options: EngineOptions,
    ) -> Pin<Box<dyn Future<Output = Result<AssignmentResult>> + Send + '_>>;
}

/// Trait abstracting geographic clustering of the engine input.
pub trait Clusterer: Send + Sync {
    /// Cheap estimate of how many clusters `split` would produce.
    fn estimate(&self, params: &EngineParameters) -> usize;

    /// Split the parameters into per-cluster groups. Returns the groups and
    /// the external-API usage incurred while clustering.
    fn split(&self, params: EngineParameters) -> Result<(Vec<EngineParameters>, ApiUsage)>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_usage_merges_counters() {
        let mut usage = ApiUsage::default();
        usage.record("directions", 3);
        usage.record("directions", 2);
        let mut target = HashMap::new();
        target.insert("directions".to_string(), 1);
        usage.merge_into(&mut target);
        assert_eq!(target["directions"], 6);
    }
}
