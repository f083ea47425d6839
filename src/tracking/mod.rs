// src/tracking/mod.rs

//! Reactors keeping optimisations in sync with the order domain.

pub mod remove_point;
pub mod state_change;

pub use remove_point::remove_route_points;
pub use state_change::track_job_status;
