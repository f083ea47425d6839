// src/lib.rs

//! Route-optimisation orchestration.
//!
//! The crate coordinates the lifecycle of route optimisations: validation
//! and clustering, fan-out of engine runs over a work queue, at-most-once
//! finalization of their combined results, single-driver refreshes, and
//! the reactors that keep routes in sync with the order domain. The
//! solver, clusterer, job domain and event delivery are external
//! collaborators behind traits.

pub mod backends;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod errors;
pub mod events;
pub mod jobs;
pub mod lifecycle;
pub mod logging;
pub mod model;
pub mod orchestration;
pub mod orchestrator;
pub mod store;
pub mod tracking;
pub mod types;

pub use config::OrchestratorConfig;
pub use dispatch::{Dispatcher, WorkItem};
pub use errors::{OptimisationError, Result};
pub use orchestrator::Orchestrator;
pub use store::Store;
